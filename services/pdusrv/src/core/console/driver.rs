//! Console PDU driver
//!
//! Maps the [`Pdu`] capability onto the console's command vocabulary and
//! owns the login lock, which brackets a whole login → commands → logout
//! sequence so no other identity can interleave with it.

use async_trait::async_trait;
use futures::future::BoxFuture;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::grammar::ReportGrammar;
use super::session::{ConsoleSession, SessionOptions, LOGOUT_COMMAND};
use super::topology::Topology;
use super::ConsoleSettings;
use crate::core::pdu::{LoginPdu, Pdu, ALL_OUTLETS};
use crate::core::status::Status;
use crate::core::transport::{Transport, TransportFactory, TransportOptions, TransportStats};
use crate::error::{PduError, Result};

/// Outlet number the console uses for "every outlet"
const ALL_OUTLETS_ID: u32 = 0;

pub struct ConsolePdu {
    session: ConsoleSession,
    grammar: ReportGrammar,
    topology: Topology,
    login_lock: Mutex<()>,
}

impl std::fmt::Debug for ConsolePdu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsolePdu")
            .field("session", &self.session)
            .field("topology", &self.topology)
            .finish_non_exhaustive()
    }
}

impl ConsolePdu {
    /// Open a console at `address` (`tcp://host:port` or a serial device)
    pub async fn connect(
        address: &str,
        transport: &TransportOptions,
        session: SessionOptions,
        settings: &ConsoleSettings,
    ) -> Result<Self> {
        let transport = TransportFactory::new().create(address, transport)?;
        Self::with_transport(transport, session, settings).await
    }

    /// Build a driver over an unconnected transport and connect it
    pub async fn with_transport(
        transport: Box<dyn Transport>,
        session: SessionOptions,
        settings: &ConsoleSettings,
    ) -> Result<Self> {
        settings.validate()?;
        let grammar = ReportGrammar::compile(&settings.grammar)?;

        let session = ConsoleSession::new(transport, settings.prompts.clone(), session);
        session.connect().await?;

        Ok(Self {
            session,
            grammar,
            topology: settings.topology.clone(),
            login_lock: Mutex::new(()),
        })
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub async fn transport_stats(&self) -> TransportStats {
        self.session.stats().await
    }

    /// Console outlet number for an outlet identifier
    pub fn lookup_id(&self, id: &str) -> Result<u32> {
        if id == ALL_OUTLETS {
            return Ok(ALL_OUTLETS_ID);
        }

        match id.parse::<i64>() {
            Ok(n) => u32::try_from(n)
                .ok()
                .filter(|&n| n <= self.topology.max_outlet())
                .ok_or_else(|| PduError::InvalidOutletId(id.to_string())),
            Err(_) => Err(PduError::NotFound(id.to_string())),
        }
    }

    async fn outlet_command(&self, verb: &str, id: &str) -> Result<()> {
        let outlet = self.lookup_id(id)?;
        self.session.execute(&format!("{verb} {outlet}")).await?;
        Ok(())
    }

    /// Login without taking the login lock; the caller holds it
    async fn login_locked(&self, username: &str, password: &str) -> Result<()> {
        match self.who_am_i().await {
            Ok(current) if current == username => {
                debug!("Already logged in as {}", username);
                return Ok(());
            },
            Ok(current) => {
                debug!("Logged in as {}, logging out first", current);
                self.logout_locked().await?;
            },
            Err(PduError::LoginRequired) => {},
            Err(e) => return Err(e),
        }

        debug!("Logging in as {}", username);
        self.session.authenticate(username, password).await?;

        let confirmed = self.who_am_i().await?;
        if confirmed != username {
            warn!(
                "Console reports user {} after logging in as {}",
                confirmed, username
            );
        }
        info!("Logged in to PDU as {}", confirmed);
        Ok(())
    }

    async fn logout_locked(&self) -> Result<()> {
        self.session.execute(LOGOUT_COMMAND).await?;
        debug!("Logged out of PDU console");
        Ok(())
    }
}

#[async_trait]
impl Pdu for ConsolePdu {
    async fn close(&self) -> Result<()> {
        let _login = self.login_lock.lock().await;

        let logout = match self.logout_locked().await {
            // Nobody logged in: nothing to undo
            Err(PduError::LoginRequired) => Ok(()),
            other => other,
        };
        let disconnect = self.session.disconnect().await;

        if let Err(e) = &logout {
            warn!("Logout before close failed: {}", e);
        }
        info!("PDU console closed");
        logout.and(disconnect)
    }

    async fn switch_outlet(&self, id: &str, state: bool) -> Result<()> {
        self.outlet_command(if state { "On" } else { "Off" }, id)
            .await
    }

    async fn lock_outlet(&self, id: &str, state: bool) -> Result<()> {
        self.outlet_command(if state { "Lock" } else { "Unlock" }, id)
            .await
    }

    async fn reboot_outlet(&self, id: &str) -> Result<()> {
        self.outlet_command("Reboot", id).await
    }

    async fn status(&self, detailed: bool) -> Result<Status> {
        let report = self.session.execute("Status").await?;
        let mut status = self.grammar.parse_status(&report, &self.topology)?;

        if detailed {
            let report = self.session.execute("Ostatus").await?;
            status.outlets = self.grammar.parse_outlets(&report, &self.topology)?;
        }

        Ok(status)
    }

    async fn clear_maximum_currents(&self) -> Result<()> {
        self.session.execute("Clear").await?;
        Ok(())
    }

    async fn temperature(&self) -> Result<f64> {
        let report = self.session.execute("Temp").await?;
        self.grammar.parse_temperature(&report)
    }

    async fn who_am_i(&self) -> Result<String> {
        let report = self.session.execute("Whoami").await?;
        self.grammar.parse_whoami(&report)
    }

    fn as_login(&self) -> Option<&dyn LoginPdu> {
        Some(self)
    }
}

#[async_trait]
impl LoginPdu for ConsolePdu {
    async fn login(&self, username: &str, password: &str) -> Result<()> {
        let _login = self.login_lock.lock().await;
        self.login_locked(username, password).await
    }

    async fn logout(&self) -> Result<()> {
        let _login = self.login_lock.lock().await;
        self.logout_locked().await
    }

    async fn with_login<'a>(
        &'a self,
        username: &'a str,
        password: &'a str,
        body: BoxFuture<'a, ()>,
    ) -> Result<()> {
        let _login = self.login_lock.lock().await;

        self.login_locked(username, password).await?;
        body.await;
        self.logout_locked().await
    }
}
