//! Transport Factory
//!
//! Selects and builds a transport from a PDU address:
//!
//! - `tcp://host:port`
//! - `serial:///dev/ttyUSB0`
//! - `/dev/ttyUSB0` (bare device path, serial)

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

use super::serial::{SerialTransport, SerialTransportConfig};
use super::tcp::{TcpTransport, TcpTransportConfig};
use super::traits::{Transport, TransportError};

/// Supported transport types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransportType {
    /// TCP network transport
    Tcp,
    /// Serial port transport
    Serial,
}

impl fmt::Display for TransportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportType::Tcp => write!(f, "tcp"),
            TransportType::Serial => write!(f, "serial"),
        }
    }
}

/// Parsed PDU address
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportAddress {
    Tcp { host: String, port: u16 },
    Serial { path: String },
}

impl TransportAddress {
    pub fn transport_type(&self) -> TransportType {
        match self {
            TransportAddress::Tcp { .. } => TransportType::Tcp,
            TransportAddress::Serial { .. } => TransportType::Serial,
        }
    }
}

impl FromStr for TransportAddress {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unsupported = || TransportError::ConfigError(format!("Unsupported PDU address: {s}"));

        if let Some(rest) = s.strip_prefix("tcp://") {
            let rest = rest.trim_end_matches('/');
            let (host, port) = rest.rsplit_once(':').ok_or_else(unsupported)?;
            let port = port.parse::<u16>().map_err(|e| {
                TransportError::ConfigError(format!("Invalid port in address {s}: {e}"))
            })?;
            if host.is_empty() {
                return Err(unsupported());
            }
            return Ok(TransportAddress::Tcp {
                host: host.to_string(),
                port,
            });
        }

        let path = match s.strip_prefix("serial://") {
            Some(path) => path,
            None if s.contains("://") => return Err(unsupported()),
            None => s.strip_prefix("serial:").unwrap_or(s),
        };
        if path.is_empty() {
            return Err(unsupported());
        }
        Ok(TransportAddress::Serial {
            path: path.to_string(),
        })
    }
}

/// Line parameters shared by all transport kinds
#[derive(Debug, Clone)]
pub struct TransportOptions {
    pub read_timeout: Duration,
    pub connect_timeout: Duration,
    pub baud_rate: u32,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_millis(300),
            connect_timeout: Duration::from_secs(10),
            baud_rate: 9600,
        }
    }
}

/// Builds boxed transports from addresses
#[derive(Debug, Default)]
pub struct TransportFactory;

impl TransportFactory {
    pub fn new() -> Self {
        Self
    }

    /// Create an unconnected transport for `address`
    pub fn create(
        &self,
        address: &str,
        options: &TransportOptions,
    ) -> Result<Box<dyn Transport>, TransportError> {
        let parsed: TransportAddress = address.parse()?;
        debug!(
            "Creating {} transport for {}",
            parsed.transport_type(),
            address
        );

        match parsed {
            TransportAddress::Tcp { host, port } => {
                let transport = TcpTransport::new(TcpTransportConfig {
                    host,
                    port,
                    connect_timeout: options.connect_timeout,
                    read_timeout: options.read_timeout,
                })?;
                Ok(Box::new(transport))
            },
            TransportAddress::Serial { path } => {
                let transport = SerialTransport::new(SerialTransportConfig {
                    path,
                    baud_rate: options.baud_rate,
                    read_timeout: options.read_timeout,
                    ..Default::default()
                })?;
                Ok(Box::new(transport))
            },
        }
    }
}
