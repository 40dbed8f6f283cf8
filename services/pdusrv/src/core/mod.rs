//! Core PDU client
//!
//! ```text
//! caller ─► CachedPdu / PolledPdu ─► ConsolePdu ─► ConsoleSession ─► Transport
//!                                        │
//!                               ReportGrammar + Topology ─► Status
//! ```

pub mod cache;
pub mod console;
pub mod energy;
pub mod pdu;
pub mod poller;
pub mod status;
pub mod transport;

pub use cache::CachedPdu;
pub use console::ConsolePdu;
pub use pdu::{LoginPdu, Operation, Pdu, ALL_OUTLETS};
pub use poller::{PollOptions, PolledPdu, StatusCallback};
pub use status::{BreakerStatus, GroupStatus, Measurements, OutletStatus, Status};
