//! Shared plumbing for the pdusrv workspace
//!
//! Provides the pieces every service needs regardless of what it talks to:
//! - logging initialisation and runtime level changes
//! - graceful shutdown signal handling

pub mod logging;
pub mod shutdown;

pub use shutdown::wait_for_shutdown;
