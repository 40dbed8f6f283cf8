//! PDU console protocol
//!
//! - [`session`]: prompt-framed command exchange and login handshake
//! - [`grammar`]: report decoding
//! - [`topology`]: outlet banking
//! - [`driver`]: [`ConsolePdu`], the [`crate::core::pdu::Pdu`] implementation

pub mod driver;
pub mod grammar;
pub mod prompts;
pub mod session;
pub mod topology;

use serde::{Deserialize, Serialize};

pub use driver::ConsolePdu;
pub use grammar::{GrammarConfig, ReportGrammar};
pub use prompts::Prompts;
pub use session::{ConsoleSession, SessionOptions};
pub use topology::{OutletBank, Topology};

use crate::error::Result;

/// Firmware-specific console data: prompts, report patterns, banking
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleSettings {
    pub prompts: Prompts,
    pub grammar: GrammarConfig,
    pub topology: Topology,
}

impl ConsoleSettings {
    pub fn validate(&self) -> Result<()> {
        self.prompts.validate()?;
        self.topology.validate()?;
        ReportGrammar::compile(&self.grammar)?;
        Ok(())
    }
}
