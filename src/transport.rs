//! Transport collaborator contract
//!
//! The transport owns the actual connection to the simulator (shared memory
//! mapping, data-ready event, window-message broadcast). racebridge never talks
//! to the operating system itself; it drives a [`Transport`] and interprets what
//! comes back.

use std::time::Duration;

use crate::Result;
use crate::broadcast::BroadcastMessage;

/// Result of waiting for a new frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitResult {
    /// A frame was copied into the destination buffer
    Signaled,
    /// No frame arrived within the timeout
    Timeout,
}

/// Header metadata as currently published by the producer.
#[derive(Debug, Clone, Copy)]
pub struct HeaderSnapshot<'a> {
    /// Length in bytes of one telemetry frame
    pub declared_length: usize,
    /// Number of variable header records
    pub variable_count: usize,
    /// `variable_count` packed variable header records (144 bytes each)
    pub descriptors: &'a [u8],
}

/// Connection to a live telemetry producer.
///
/// Implementations are driven by a single [`SessionTracker`](crate::SessionTracker);
/// no method is called concurrently with another.
pub trait Transport {
    /// Open the connection if it is not already open. Returns whether it is usable.
    fn connect(&mut self) -> bool;

    /// Close the connection and release producer resources.
    fn disconnect(&mut self);

    /// Whether the producer reports an active session.
    fn is_connected(&self) -> bool;

    /// Current header metadata.
    fn header_snapshot(&self) -> Result<HeaderSnapshot<'_>>;

    /// Block up to `timeout` for a new frame and copy it into `dest`.
    ///
    /// When the frame and `dest` differ in length only the common prefix is copied;
    /// the tracker detects the mismatch through [`header_snapshot`](Self::header_snapshot).
    fn wait_for_frame(&mut self, timeout: Duration, dest: &mut [u8]) -> Result<WaitResult>;

    /// Producer's session-configuration version counter.
    fn config_version(&self) -> i32;

    /// Raw Windows-1252 session configuration text, if the producer has any.
    fn config_text_raw(&mut self) -> Option<Vec<u8>>;

    /// Deliver an encoded broadcast command to the producer.
    fn send_command(&mut self, message: &BroadcastMessage) -> Result<()>;
}
