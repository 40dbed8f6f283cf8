//! TCP Transport Implementation
//!
//! Console servers and terminal multiplexers expose the PDU's serial
//! console on a raw TCP port; this transport speaks to those.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, error, info, trace, warn};

use super::traits::{Transport, TransportError, TransportStats};

/// TCP transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TcpTransportConfig {
    /// Remote host name or address
    pub host: String,
    /// Remote port number
    pub port: u16,
    /// Connection timeout
    pub connect_timeout: Duration,
    /// Read deadline used when the caller passes none
    pub read_timeout: Duration,
}

impl Default for TcpTransportConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 23,
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_millis(300),
        }
    }
}

impl TcpTransportConfig {
    pub fn validate(&self) -> Result<(), TransportError> {
        if self.host.is_empty() {
            return Err(TransportError::ConfigError(
                "Host cannot be empty".to_string(),
            ));
        }

        if self.port == 0 {
            return Err(TransportError::ConfigError(
                "Port cannot be zero".to_string(),
            ));
        }

        if self.connect_timeout.is_zero() || self.read_timeout.is_zero() {
            return Err(TransportError::ConfigError(
                "Timeouts must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

/// TCP transport implementation
#[derive(Debug)]
pub struct TcpTransport {
    config: TcpTransportConfig,
    endpoint: String,
    stream: Option<TcpStream>,
    stats: TransportStats,
}

impl TcpTransport {
    /// Create new TCP transport with configuration
    pub fn new(config: TcpTransportConfig) -> Result<Self, TransportError> {
        config.validate()?;

        let endpoint = format!("{}:{}", config.host, config.port);
        Ok(Self {
            config,
            endpoint,
            stream: None,
            stats: TransportStats::new(),
        })
    }

    /// Drop a broken stream so later calls report "not connected"
    fn mark_broken(&mut self) {
        self.stream = None;
        self.stats.record_failed_connection();
    }
}

#[async_trait]
impl Transport for TcpTransport {
    fn transport_type(&self) -> &str {
        "tcp"
    }

    fn name(&self) -> &str {
        &self.endpoint
    }

    async fn connect(&mut self) -> Result<(), TransportError> {
        self.stats.record_connection_attempt();
        debug!("Connecting to TCP endpoint: {}", self.endpoint);

        match timeout(self.config.connect_timeout, TcpStream::connect(&self.endpoint)).await {
            Ok(Ok(stream)) => {
                if let Err(e) = stream.set_nodelay(true) {
                    warn!("Failed to set TCP_NODELAY: {e}");
                }
                self.stream = Some(stream);
                self.stats.record_successful_connection();

                info!("Connected to TCP endpoint: {}", self.endpoint);
                Ok(())
            },
            Ok(Err(e)) => {
                let error_msg = format!("Failed to connect to {}: {e}", self.endpoint);
                error!("{error_msg}");
                self.stats.record_failed_connection();
                Err(TransportError::ConnectionFailed(error_msg))
            },
            Err(_) => {
                let error_msg = format!(
                    "Connection to {} timed out after {:?}",
                    self.endpoint, self.config.connect_timeout
                );
                warn!("{error_msg}");
                self.stats.record_failed_connection();
                Err(TransportError::ConnectionFailed(error_msg))
            },
        }
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.shutdown().await {
                warn!("Error during TCP shutdown: {e}");
            }
            info!("Disconnected from TCP endpoint: {}", self.endpoint);
        }
        self.stats.record_disconnection();
        Ok(())
    }

    async fn send(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        let Some(stream) = self.stream.as_mut() else {
            return Err(TransportError::SendFailed("Not connected".to_string()));
        };

        match stream.write_all(data).await {
            Ok(()) => {
                self.stats.record_bytes_sent(data.len());
                trace!(length = data.len(), direction = "send", "[TCP Transport] chunk");
                Ok(data.len())
            },
            Err(e) => {
                let error_msg = format!("Failed to send data: {e}");
                error!("{error_msg}");
                self.mark_broken();
                Err(TransportError::SendFailed(error_msg))
            },
        }
    }

    async fn receive(
        &mut self,
        buffer: &mut [u8],
        timeout_duration: Option<Duration>,
    ) -> Result<usize, TransportError> {
        let receive_timeout = timeout_duration.unwrap_or(self.config.read_timeout);
        let Some(stream) = self.stream.as_mut() else {
            return Err(TransportError::ReceiveFailed("Not connected".to_string()));
        };

        match timeout(receive_timeout, stream.read(buffer)).await {
            Ok(Ok(0)) => {
                warn!("TCP connection closed by peer");
                self.stream = None;
                self.stats.record_disconnection();
                Err(TransportError::ConnectionLost(
                    "Connection closed by peer".to_string(),
                ))
            },
            Ok(Ok(bytes_read)) => {
                self.stats.record_bytes_received(bytes_read);
                trace!(length = bytes_read, direction = "recv", "[TCP Transport] chunk");
                Ok(bytes_read)
            },
            Ok(Err(e)) => {
                let error_msg = format!("Failed to receive data: {e}");
                error!("{error_msg}");
                self.mark_broken();
                Err(TransportError::ReceiveFailed(error_msg))
            },
            Err(_) => {
                // Idle gaps are routine on a console; keep them out of normal logs
                self.stats.record_idle_read();
                Err(TransportError::Timeout(format!(
                    "No data within {receive_timeout:?}"
                )))
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
