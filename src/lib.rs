//! Decoder for live racing-simulator telemetry.
//!
//! racebridge reads the self-describing binary frames a simulator publishes,
//! tracks when their layout or the session configuration changes, and encodes
//! broadcast commands back to the simulator.
//!
//! # Features
//!
//! - **Variable directory**: name and index lookup over the producer's header records
//! - **Bounds-checked decoding**: every read is validated against the frame length
//! - **Session tracking**: reconnects, layout changes and configuration versions
//! - **Legacy text**: Windows-1252 configuration text decoded to `String`
//! - **Broadcast commands**: validated and packed into the producer's message format
//!
//! The connection itself (shared memory, data-ready event, window messages) is a
//! [`Transport`] supplied by the caller.
//!
//! # Example
//!
//! ```rust,no_run
//! use racebridge::{PollResult, SessionTracker, Transport};
//! use std::time::Duration;
//!
//! fn run(transport: impl Transport) -> racebridge::Result<()> {
//!     let mut tracker = SessionTracker::new(transport);
//!     loop {
//!         if tracker.poll(Duration::from_millis(16))? == PollResult::Stable {
//!             if let Some(snapshot) = tracker.snapshot() {
//!                 let rpm: f32 = snapshot.get("RPM")?;
//!                 println!("RPM {rpm}");
//!             }
//!         }
//!     }
//! }
//! ```

// Core types and error handling
mod error;
pub mod encoding;
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod types;

// Frame decoding
pub mod decoder;
pub mod directory;

// Session tracking and the producer connection
pub mod config;
pub mod driver;
pub mod session;
pub mod session_info;
pub mod transport;

// Outbound commands
pub mod broadcast;

pub use error::*;
pub use types::*;

pub use broadcast::{ArgShape, BroadcastArgs, BroadcastKind, BroadcastMessage, CommandArg, encode};
pub use config::TrackerConfig;
pub use decoder::DecodedValue;
pub use directory::VariableDirectory;
pub use driver::{CommandRequest, Driver, DriverChannels};
pub use encoding::decode_windows_1252;
pub use session::{ConnectionState, PollResult, SessionTracker, Snapshot};
pub use session_info::{DriverEntry, DriverInfo, SessionInfo, WeekendInfo};
pub use transport::{HeaderSnapshot, Transport, WaitResult};
