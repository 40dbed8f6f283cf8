//! Serial console transport
//!
//! RS-232 link to the PDU's console port. The console always runs 8 data
//! bits and one stop bit; parity and flow control are the only line
//! settings that vary between installations.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_serial::{DataBits, FlowControl, Parity, SerialPortBuilderExt, SerialStream, StopBits};
use tracing::{debug, error, info, trace};

use super::traits::{Transport, TransportError, TransportStats};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineParity {
    #[default]
    None,
    Even,
    Odd,
}

impl From<LineParity> for Parity {
    fn from(parity: LineParity) -> Self {
        match parity {
            LineParity::None => Parity::None,
            LineParity::Even => Parity::Even,
            LineParity::Odd => Parity::Odd,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Handshake {
    #[default]
    None,
    /// XON/XOFF
    Software,
    /// RTS/CTS
    Hardware,
}

impl From<Handshake> for FlowControl {
    fn from(handshake: Handshake) -> Self {
        match handshake {
            Handshake::None => FlowControl::None,
            Handshake::Software => FlowControl::Software,
            Handshake::Hardware => FlowControl::Hardware,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialTransportConfig {
    /// Device path, e.g. `/dev/ttyS0`
    pub path: String,
    pub baud_rate: u32,
    pub parity: LineParity,
    pub handshake: Handshake,
    /// Idle deadline when the caller passes none
    pub read_timeout: Duration,
    pub write_timeout: Duration,
}

impl Default for SerialTransportConfig {
    fn default() -> Self {
        Self {
            path: "/dev/ttyS0".to_string(),
            baud_rate: 9600,
            parity: LineParity::None,
            handshake: Handshake::None,
            read_timeout: Duration::from_millis(300),
            write_timeout: Duration::from_secs(1),
        }
    }
}

impl SerialTransportConfig {
    pub fn validate(&self) -> Result<(), TransportError> {
        if self.path.trim().is_empty() {
            return Err(TransportError::ConfigError(
                "serial device path is empty".to_string(),
            ));
        }
        if self.baud_rate == 0 {
            return Err(TransportError::ConfigError(format!(
                "invalid baud rate for {}",
                self.path
            )));
        }
        if self.read_timeout.is_zero() {
            return Err(TransportError::ConfigError(
                "serial read timeout must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct SerialTransport {
    config: SerialTransportConfig,
    stream: Option<SerialStream>,
    stats: TransportStats,
}

impl SerialTransport {
    pub fn new(config: SerialTransportConfig) -> Result<Self, TransportError> {
        config.validate()?;
        Ok(Self {
            config,
            stream: None,
            stats: TransportStats::new(),
        })
    }

    fn drop_line(&mut self, reason: String) -> String {
        error!("Serial console {}: {}", self.config.path, reason);
        self.stream = None;
        self.stats.record_disconnection();
        reason
    }
}

#[async_trait]
impl Transport for SerialTransport {
    fn transport_type(&self) -> &str {
        "serial"
    }

    fn name(&self) -> &str {
        &self.config.path
    }

    async fn connect(&mut self) -> Result<(), TransportError> {
        if self.stream.is_some() {
            return Ok(());
        }
        self.stats.record_connection_attempt();
        debug!("Opening serial console {}", self.config.path);

        let opened = tokio_serial::new(&self.config.path, self.config.baud_rate)
            .data_bits(DataBits::Eight)
            .stop_bits(StopBits::One)
            .parity(self.config.parity.into())
            .flow_control(self.config.handshake.into())
            .timeout(self.config.read_timeout)
            .open_native_async();

        match opened {
            Ok(stream) => {
                self.stream = Some(stream);
                self.stats.record_successful_connection();
                info!(
                    "Serial console {} open at {} baud",
                    self.config.path, self.config.baud_rate
                );
                Ok(())
            },
            Err(e) => {
                self.stats.record_failed_connection();
                Err(TransportError::ConnectionFailed(format!(
                    "{}: {e}",
                    self.config.path
                )))
            },
        }
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        if self.stream.take().is_some() {
            self.stats.record_disconnection();
            info!("Serial console {} closed", self.config.path);
        }
        Ok(())
    }

    async fn send(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        let write_timeout = self.config.write_timeout;
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| TransportError::SendFailed("serial console not open".to_string()))?;

        let written = tokio::time::timeout(write_timeout, async {
            stream.write_all(data).await?;
            stream.flush().await
        })
        .await;

        match written {
            Ok(Ok(())) => {
                self.stats.record_bytes_sent(data.len());
                trace!(bytes = data.len(), "serial tx");
                Ok(data.len())
            },
            Ok(Err(e)) => Err(TransportError::SendFailed(self.drop_line(format!("write: {e}")))),
            Err(_) => Err(TransportError::SendFailed(format!(
                "write stalled for {write_timeout:?}"
            ))),
        }
    }

    async fn receive(
        &mut self,
        buffer: &mut [u8],
        timeout: Option<Duration>,
    ) -> Result<usize, TransportError> {
        let deadline = timeout.unwrap_or(self.config.read_timeout);
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| TransportError::ReceiveFailed("serial console not open".to_string()))?;

        match tokio::time::timeout(deadline, stream.read(buffer)).await {
            // No EOF on a serial line: an empty read is just silence
            Ok(Ok(0)) => {
                self.stats.record_idle_read();
                Err(TransportError::Timeout("serial line idle".to_string()))
            },
            Ok(Ok(n)) => {
                self.stats.record_bytes_received(n);
                trace!(bytes = n, "serial rx");
                Ok(n)
            },
            Ok(Err(e)) if e.kind() == ErrorKind::TimedOut => {
                self.stats.record_idle_read();
                Err(TransportError::Timeout(e.to_string()))
            },
            Ok(Err(e)) => Err(TransportError::ReceiveFailed(
                self.drop_line(format!("read: {e}")),
            )),
            Err(_) => {
                self.stats.record_idle_read();
                Err(TransportError::Timeout(format!("nothing within {deadline:?}")))
            },
        }
    }

    async fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    async fn stats(&self) -> TransportStats {
        self.stats.clone()
    }
}
