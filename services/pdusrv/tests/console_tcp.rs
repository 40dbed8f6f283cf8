//! Driver end to end over a real TCP console

#![allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable

mod common;

use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use pdusrv::core::console::{ConsolePdu, ConsoleSettings, SessionOptions};
use pdusrv::core::transport::TransportOptions;
use pdusrv::{Pdu, PduError, PollOptions, PolledPdu};

use common::spawn_console;

fn session_options() -> SessionOptions {
    SessionOptions {
        read_timeout: Duration::from_millis(50),
        logout_grace: Duration::from_millis(10),
    }
}

async fn connect(address: &str) -> ConsolePdu {
    ConsolePdu::connect(
        address,
        &TransportOptions {
            read_timeout: Duration::from_millis(50),
            connect_timeout: Duration::from_secs(2),
            ..Default::default()
        },
        session_options(),
        &ConsoleSettings::default(),
    )
    .await
    .unwrap()
}

#[tokio::test]
async fn test_login_status_and_close() {
    let (address, console) = spawn_console("admin", "secret").await;
    let pdu = connect(&address).await;

    assert_eq!(pdu.who_am_i().await.unwrap_err(), PduError::LoginRequired);

    let login = pdu.as_login().unwrap();
    login.login("admin", "secret").await.unwrap();
    assert_eq!(pdu.who_am_i().await.unwrap(), "admin");

    let status = pdu.status(true).await.unwrap();
    assert_eq!(status.breakers.len(), 3);
    assert_eq!(status.groups.len(), 4);
    assert_eq!(status.outlets.len(), 7);
    assert!((pdu.temperature().await.unwrap() - 30.0).abs() < 1e-9);

    pdu.switch_outlet("3", true).await.unwrap();
    pdu.lock_outlet("all", false).await.unwrap();
    assert_eq!(
        pdu.reboot_outlet("21").await.unwrap_err(),
        PduError::InvalidOutletId("21".to_string())
    );

    let stats = pdu.transport_stats().await;
    assert!(stats.bytes_sent > 0);
    assert!(stats.bytes_received > stats.bytes_sent);

    pdu.close().await.unwrap();

    let lines = console.lines();
    assert!(lines.contains(&"On 3".to_string()));
    assert!(lines.contains(&"Unlock 0".to_string()));
    assert!(!lines.iter().any(|l| l.starts_with("Reboot")));
    assert_eq!(lines.last().map(String::as_str), Some("Logout"));
    assert_eq!(console.current_user(), None);
}

#[tokio::test]
async fn test_bad_password() {
    let (address, console) = spawn_console("admin", "secret").await;
    let pdu = connect(&address).await;

    let err = pdu.as_login().unwrap().login("admin", "guess").await.unwrap_err();
    assert_eq!(err, PduError::InvalidPassword);
    assert_eq!(console.current_user(), None);

    pdu.close().await.unwrap();
}

#[tokio::test]
async fn test_with_login_brackets_body() {
    let (address, console) = spawn_console("admin", "secret").await;
    let pdu = Arc::new(connect(&address).await);

    let inner = Arc::clone(&pdu);
    pdu.as_login()
        .unwrap()
        .with_login(
            "admin",
            "secret",
            async move {
                inner.clear_maximum_currents().await.unwrap();
            }
            .boxed(),
        )
        .await
        .unwrap();

    let lines = console.lines();
    let clear = lines.iter().position(|l| l == "Clear").unwrap();
    let secret = lines.iter().position(|l| l == "secret").unwrap();
    assert!(secret < clear);
    assert_eq!(lines.last().map(String::as_str), Some("Logout"));

    pdu.close().await.unwrap();
}

#[tokio::test]
async fn test_poller_over_console() {
    let (address, console) = spawn_console("admin", "secret").await;
    let driver: Arc<dyn Pdu> = Arc::new(connect(&address).await);

    let poller = PolledPdu::start(
        driver,
        PollOptions {
            interval: Duration::from_secs(60),
            username: Some("admin".to_string()),
            password: Some("secret".to_string()),
            refresh_queue: 4,
        },
        None,
    );

    let mut snapshots = poller.subscribe();
    tokio::time::timeout(Duration::from_secs(5), snapshots.wait_for(|s| s.is_some()))
        .await
        .unwrap()
        .unwrap();

    let summary = poller.status(false).await.unwrap();
    assert!(summary.outlets.is_empty());
    assert_eq!(poller.status(true).await.unwrap().outlets.len(), 7);

    poller.close().await.unwrap();
    assert_eq!(console.current_user(), None);
    assert!(console.lines().contains(&"Ostatus".to_string()));
}
