//! Transport Layer Module
//!
//! Byte-stream access to the PDU console, separated from the console
//! protocol itself.
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │   Console session (prompts, login, reports) │
//! └─────────────────────────────────────────────┘
//!                       │
//!                       ▼
//! ┌─────────────────────────────────────────────┐
//! │   Transport trait                           │
//! │   connect(), send(), receive(deadline)      │
//! └─────────────────────────────────────────────┘
//!          │                 │              │
//!          ▼                 ▼              ▼
//!     ┌─────────┐     ┌───────────┐   ┌───────────┐
//!     │   TCP   │     │  Serial   │   │   Mock    │
//!     └─────────┘     └───────────┘   └───────────┘
//! ```

pub mod factory;
#[cfg(any(test, feature = "test-utils"))]
pub mod mock;
pub mod serial;
pub mod tcp;
pub mod traits;

// Re-export commonly used types
pub use factory::{TransportAddress, TransportFactory, TransportOptions, TransportType};
#[cfg(any(test, feature = "test-utils"))]
pub use mock::{ConsoleSimulator, MockHandle, MockTransport};
pub use serial::SerialTransport;
pub use tcp::TcpTransport;
pub use traits::{ConnectionState, Transport, TransportError, TransportStats};
