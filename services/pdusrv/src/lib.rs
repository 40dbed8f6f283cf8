//! PDU Service Library
//!
//! Client for rack power distribution units that only speak an
//! interactive console protocol over telnet or a serial line.
//!
//! # Architecture
//!
//! - **`core::transport`**: byte streams (TCP, serial, scripted mock)
//! - **`core::console`**: prompt-framed sessions, login handshake, report grammar
//! - **`core::cache`** / **`core::poller`**: freshness layers over a [`Pdu`]
//! - **`core::energy`**: per-group and per-outlet energy from power readings
//! - **`acl`**: identity/operation/outlet authorization
//! - **`config`**: figment-layered service configuration
//!
//! Every layer implements [`Pdu`], so they compose by wrapping:
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use pdusrv::core::console::{ConsolePdu, ConsoleSettings, SessionOptions};
//! use pdusrv::core::transport::TransportOptions;
//! use pdusrv::{CachedPdu, Pdu};
//!
//! # async fn run() -> pdusrv::Result<()> {
//! let driver = ConsolePdu::connect(
//!     "tcp://10.0.0.5:23",
//!     &TransportOptions::default(),
//!     SessionOptions::default(),
//!     &ConsoleSettings::default(),
//! )
//! .await?;
//! let pdu = CachedPdu::new(Arc::new(driver), Duration::from_secs(60));
//! let status = pdu.status(false).await?;
//! println!("{} °C", status.temperature);
//! # Ok(())
//! # }
//! ```

pub mod acl;
pub mod config;
pub mod core;
pub mod error;

pub use acl::{AccessControlEntry, AccessControlList, OutletRule};
pub use config::AppConfig;
pub use core::{
    CachedPdu, ConsolePdu, LoginPdu, Operation, Pdu, PollOptions, PolledPdu, Status,
    StatusCallback, ALL_OUTLETS,
};
pub use error::{PduError, Result};
