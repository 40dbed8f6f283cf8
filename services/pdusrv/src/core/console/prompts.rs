//! Console prompt markers
//!
//! The strings depend on firmware, so they are configuration rather than
//! constants.

use serde::{Deserialize, Serialize};

use crate::error::{PduError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Prompts {
    /// Printed when the console accepts a command
    pub ready: String,
    pub username: String,
    pub password: String,
    /// Printed after rejected credentials
    pub invalid: String,
}

impl Default for Prompts {
    fn default() -> Self {
        Self {
            ready: "MMP-14>".to_string(),
            username: "Enter user name: ".to_string(),
            password: "Enter Password: ".to_string(),
            invalid: "Invalid user/password!".to_string(),
        }
    }
}

impl Prompts {
    pub fn validate(&self) -> Result<()> {
        let markers = [
            ("ready", &self.ready),
            ("username", &self.username),
            ("password", &self.password),
            ("invalid", &self.invalid),
        ];
        for (name, marker) in markers {
            if marker.is_empty() {
                return Err(PduError::config(format!("{name} prompt cannot be empty")));
            }
        }
        Ok(())
    }

    /// Console is waiting at its login screen
    pub fn at_login_screen(&self, buffer: &str) -> bool {
        buffer.ends_with(&self.username) || buffer.ends_with(&self.password)
    }
}
