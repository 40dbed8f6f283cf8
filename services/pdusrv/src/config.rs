//! Service configuration
//!
//! Layered with figment: built-in defaults, then an optional YAML file,
//! then `PDUSRV_` environment variables (`PDUSRV_PDU__ADDRESS=...`).

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};

use common::logging::LogConfig;

use crate::acl::{AccessControlEntry, AccessControlList};
use crate::core::console::{ConsoleSettings, SessionOptions};
use crate::core::poller::PollOptions;
use crate::core::transport::{TransportAddress, TransportOptions};
use crate::error::{PduError, Result};

/// Environment variable prefix
pub const ENV_PREFIX: &str = "PDUSRV_";

/// Device connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PduConfig {
    /// `tcp://host:port`, `serial:///dev/ttyS0` or a bare device path
    pub address: String,
    pub username: String,
    pub password: String,
    pub read_timeout_ms: u64,
    pub connect_timeout_ms: u64,
    pub logout_grace_ms: u64,
    pub baud_rate: u32,
}

impl Default for PduConfig {
    fn default() -> Self {
        Self {
            address: "tcp://127.0.0.1:23".to_string(),
            username: "admin".to_string(),
            password: "admin".to_string(),
            read_timeout_ms: 300,
            connect_timeout_ms: 10_000,
            logout_grace_ms: 500,
            baud_rate: 9600,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub enabled: bool,
    pub interval_ms: u64,
    /// Pending refresh requests kept before further ones are dropped
    pub refresh_queue: usize,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: 10_000,
            refresh_queue: 16,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Zero disables caching
    pub ttl_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { ttl_ms: 60_000 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// Daily-rolling log files go here when set
    pub dir: Option<PathBuf>,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            dir: None,
            json: false,
        }
    }
}

/// Complete service configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub pdu: PduConfig,
    pub console: ConsoleSettings,
    pub polling: PollingConfig,
    pub cache: CacheConfig,
    pub acl: Vec<AccessControlEntry>,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Provider stack: defaults, then `path`, then the environment
    pub fn figment(path: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(AppConfig::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Load and validate
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            if !path.exists() {
                return Err(PduError::config(format!(
                    "configuration file not found: {}",
                    path.display()
                )));
            }
        }
        Self::from_figment(Self::figment(path))
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: AppConfig = figment
            .extract()
            .map_err(|e| PduError::config(format!("failed to load configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.pdu
            .address
            .parse::<TransportAddress>()
            .map_err(|e| PduError::config(format!("pdu.address: {e}")))?;
        if self.pdu.read_timeout_ms == 0 {
            return Err(PduError::config("pdu.read_timeout_ms must be positive"));
        }
        if self.pdu.baud_rate == 0 {
            return Err(PduError::config("pdu.baud_rate must be positive"));
        }
        if self.polling.enabled && self.polling.interval_ms == 0 {
            return Err(PduError::config("polling.interval_ms must be positive"));
        }
        if self.polling.refresh_queue == 0 {
            return Err(PduError::config("polling.refresh_queue must be positive"));
        }
        self.console.validate()?;
        AccessControlList::new(&self.acl)?;
        Ok(())
    }

    pub fn transport_options(&self) -> TransportOptions {
        TransportOptions {
            read_timeout: Duration::from_millis(self.pdu.read_timeout_ms),
            connect_timeout: Duration::from_millis(self.pdu.connect_timeout_ms),
            baud_rate: self.pdu.baud_rate,
        }
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            read_timeout: Duration::from_millis(self.pdu.read_timeout_ms),
            logout_grace: Duration::from_millis(self.pdu.logout_grace_ms),
        }
    }

    pub fn poll_options(&self) -> PollOptions {
        PollOptions {
            interval: Duration::from_millis(self.polling.interval_ms),
            username: Some(self.pdu.username.clone()),
            password: Some(self.pdu.password.clone()),
            refresh_queue: self.polling.refresh_queue,
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache.ttl_ms)
    }

    pub fn access_control(&self) -> Result<AccessControlList> {
        AccessControlList::new(&self.acl)
    }

    pub fn log_config(&self) -> LogConfig {
        LogConfig {
            level: self.logging.level.clone(),
            log_dir: self.logging.dir.clone(),
            enable_json: self.logging.json,
            ..LogConfig::default()
        }
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::core::pdu::Operation;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn yaml_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        config.validate().unwrap();
        assert_eq!(config.session_options().read_timeout, Duration::from_millis(300));
        assert_eq!(config.session_options().logout_grace, Duration::from_millis(500));
        assert_eq!(config.poll_options().interval, Duration::from_secs(10));
        assert_eq!(config.cache_ttl(), Duration::from_secs(60));
        assert_eq!(config.console.topology.locate(7), Some((1, 2)));
    }

    #[test]
    fn test_yaml_overrides_defaults() {
        let file = yaml_file(
            r#"
pdu:
  address: serial:///dev/ttyUSB0
  username: operator
  baud_rate: 19200
polling:
  interval_ms: 2500
console:
  prompts:
    ready: "RPC-28>"
acl:
  - name: "^client1$"
    outlets:
      - id: ".*"
        operations: [switch]
logging:
  level: debug
  json: true
"#,
        );

        let config = AppConfig::from_figment(
            Figment::from(Serialized::defaults(AppConfig::default()))
                .merge(Yaml::file(file.path())),
        )
        .unwrap();

        assert_eq!(config.pdu.address, "serial:///dev/ttyUSB0");
        assert_eq!(config.pdu.username, "operator");
        assert_eq!(config.pdu.password, "admin");
        assert_eq!(config.transport_options().baud_rate, 19200);
        assert_eq!(config.poll_options().interval, Duration::from_millis(2500));
        assert_eq!(config.console.prompts.ready, "RPC-28>");
        assert_eq!(config.console.prompts.username, "Enter user name: ");
        assert_eq!(config.log_config().level, "debug");
        assert!(config.log_config().enable_json);

        let acl = config.access_control().unwrap();
        assert!(acl.check("client1", Operation::Switch, Some("3")));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = AppConfig::load(Some(Path::new("/nonexistent/pdusrv.yaml"))).unwrap_err();
        assert!(matches!(err, PduError::Config(_)));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.pdu.address = "http://pdu.local".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.polling.interval_ms = 0;
        assert!(config.validate().is_err());
        config.polling.enabled = false;
        config.validate().unwrap();

        let mut config = AppConfig::default();
        config.console.grammar.breaker_row = "([".to_string();
        assert!(matches!(config.validate(), Err(PduError::Config(_))));

        let mut config = AppConfig::default();
        config.acl.push(AccessControlEntry {
            name: "[".to_string(),
            operations: vec![],
            outlets: vec![],
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_operation_fails_to_load() {
        let file = yaml_file(
            r#"
acl:
  - name: ".*"
    operations: [shutdown]
"#,
        );
        let result = AppConfig::from_figment(
            Figment::from(Serialized::defaults(AppConfig::default()))
                .merge(Yaml::file(file.path())),
        );
        assert!(matches!(result, Err(PduError::Config(_))));
    }
}
