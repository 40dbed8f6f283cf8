//! Background poller
//!
//! One task owns the device session: it logs in once, fetches a detailed
//! snapshot every interval (or sooner when a mutation asks for a refresh)
//! and publishes it through a watch channel. Readers never touch the
//! network.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::core::pdu::Pdu;
use crate::core::status::Status;
use crate::error::{PduError, Result};

/// Invoked with the previous and the new snapshot before publication
pub type StatusCallback = Box<dyn FnMut(Option<&Status>, &mut Status) + Send>;

/// Latest published snapshot
pub type Snapshot = Option<Arc<Status>>;

#[derive(Debug, Clone)]
pub struct PollOptions {
    pub interval: Duration,
    /// Console credentials for the poll session, if the device needs one
    pub username: Option<String>,
    pub password: Option<String>,
    /// Pending refresh requests kept before further ones are dropped
    pub refresh_queue: usize,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            username: None,
            password: None,
            refresh_queue: 16,
        }
    }
}

impl PollOptions {
    fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.username, &self.password) {
            (Some(user), Some(pass)) => Some((user.as_str(), pass.as_str())),
            _ => None,
        }
    }
}

/// Continuously refreshed view of a [`Pdu`]
pub struct PolledPdu {
    inner: Arc<dyn Pdu>,
    snapshot: watch::Receiver<Snapshot>,
    trigger: mpsc::Sender<()>,
    shutdown: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl PolledPdu {
    /// Spawn the poll task
    pub fn start(
        inner: Arc<dyn Pdu>,
        options: PollOptions,
        on_status: Option<StatusCallback>,
    ) -> Self {
        let (snapshot_tx, snapshot_rx) = watch::channel(None);
        let (trigger_tx, trigger_rx) = mpsc::channel(options.refresh_queue.max(1));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let worker = PollWorker {
            inner: Arc::clone(&inner),
            options,
            snapshot: snapshot_tx,
            trigger: trigger_rx,
            shutdown: shutdown_rx,
            on_status,
        };
        let task = tokio::spawn(worker.run());

        Self {
            inner,
            snapshot: snapshot_rx,
            trigger: trigger_tx,
            shutdown: shutdown_tx,
            task: Mutex::new(Some(task)),
        }
    }

    /// Receiver that observes every published snapshot
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshot.clone()
    }

    /// Ask for a poll ahead of the next tick
    pub fn request_refresh(&self) {
        match self.trigger.try_send(()) {
            Ok(()) => {},
            // A refresh is already queued
            Err(mpsc::error::TrySendError::Full(())) => {},
            Err(mpsc::error::TrySendError::Closed(())) => {
                debug!("Poll task stopped, refresh request ignored");
            },
        }
    }

    fn latest(&self) -> Result<Arc<Status>> {
        self.snapshot
            .borrow()
            .as_ref()
            .map(Arc::clone)
            .ok_or(PduError::NotPolledYet)
    }

    async fn stop(&self) {
        self.shutdown.send_replace(true);
        if let Some(task) = self.task.lock().await.take() {
            if let Err(e) = task.await {
                error!("Poll task ended abnormally: {}", e);
            }
        }
    }
}

#[async_trait]
impl Pdu for PolledPdu {
    async fn close(&self) -> Result<()> {
        self.stop().await;
        self.inner.close().await
    }

    async fn switch_outlet(&self, id: &str, state: bool) -> Result<()> {
        self.inner.switch_outlet(id, state).await?;
        self.request_refresh();
        Ok(())
    }

    async fn lock_outlet(&self, id: &str, state: bool) -> Result<()> {
        self.inner.lock_outlet(id, state).await?;
        self.request_refresh();
        Ok(())
    }

    async fn reboot_outlet(&self, id: &str) -> Result<()> {
        self.inner.reboot_outlet(id).await?;
        self.request_refresh();
        Ok(())
    }

    async fn status(&self, detailed: bool) -> Result<Status> {
        let latest = self.latest()?;
        Ok(if detailed {
            (*latest).clone()
        } else {
            latest.summary()
        })
    }

    async fn clear_maximum_currents(&self) -> Result<()> {
        self.inner.clear_maximum_currents().await?;
        self.request_refresh();
        Ok(())
    }

    async fn temperature(&self) -> Result<f64> {
        Ok(self.latest()?.temperature)
    }

    async fn who_am_i(&self) -> Result<String> {
        self.inner.who_am_i().await
    }
}

struct PollWorker {
    inner: Arc<dyn Pdu>,
    options: PollOptions,
    snapshot: watch::Sender<Snapshot>,
    trigger: mpsc::Receiver<()>,
    shutdown: watch::Receiver<bool>,
    on_status: Option<StatusCallback>,
}

impl PollWorker {
    async fn run(mut self) {
        let authenticated =
            self.inner.as_login().is_some() && self.options.credentials().is_some();
        info!(
            interval_ms = self.options.interval.as_millis() as u64,
            authenticated, "PDU poller started"
        );

        if authenticated && !self.login().await {
            info!("PDU poller stopped before login");
            return;
        }

        let mut ticker = tokio::time::interval(self.options.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            if *self.shutdown.borrow() {
                break;
            }

            match self.inner.status(true).await {
                Ok(status) => self.publish(status),
                Err(e) => {
                    error!("Failed to get status: {}", e);
                    if self.backoff().await {
                        break;
                    }
                    if authenticated && e.is_auth() && !self.login().await {
                        break;
                    }
                    // Ticks that came due while backing off must not fire early
                    ticker.reset();
                    continue;
                },
            }

            tokio::select! {
                _ = self.shutdown.changed() => break,
                _ = ticker.tick() => {},
                Some(()) = self.trigger.recv() => debug!("Refresh requested"),
            }
        }

        if authenticated {
            if let Some(login) = self.inner.as_login() {
                if let Err(e) = login.logout().await {
                    warn!("Logout after polling failed: {}", e);
                }
            }
        }
        info!("PDU poller stopped");
    }

    fn publish(&mut self, mut status: Status) {
        let previous = self.snapshot.borrow().clone();
        if let Some(on_status) = self.on_status.as_mut() {
            on_status(previous.as_deref(), &mut status);
        }
        self.snapshot.send_replace(Some(Arc::new(status)));
    }

    /// Log in, retrying every interval; false if stopped meanwhile
    async fn login(&mut self) -> bool {
        let inner = Arc::clone(&self.inner);
        let Some(login) = inner.as_login() else {
            return true;
        };
        let Some((username, password)) = self
            .options
            .credentials()
            .map(|(u, p)| (u.to_string(), p.to_string()))
        else {
            return true;
        };

        loop {
            match login.login(&username, &password).await {
                Ok(()) => return true,
                Err(e) => {
                    error!("Failed to login: {}", e);
                    if self.backoff().await {
                        return false;
                    }
                },
            }
        }
    }

    /// Wait one interval; true if asked to stop meanwhile
    async fn backoff(&mut self) -> bool {
        tokio::select! {
            _ = self.shutdown.changed() => true,
            _ = tokio::time::sleep(self.options.interval) => false,
        }
    }
}
