//! Session state tracking
//!
//! [`SessionTracker`] owns a [`Transport`] and the frame buffer, and is the only
//! thing that mutates connection state. Each [`poll`](SessionTracker::poll)
//! waits for one frame and reports what happened:
//!
//! ```text
//!                 connect ok                 frame, same length
//!  Disconnected ─────────────► AwaitingFrame ─────────────────► Ready ◄─┐
//!       ▲                        │      ▲                         │     │ frame
//!       │ lost / timeout         │      │ frame, new length       └─────┘
//!       │ without a frame        │      │ (LayoutChanged)
//!       └────────────────────────┘      └──── (from Ready too)
//! ```
//!
//! Decoding goes through [`Snapshot`]s. A snapshot shares the current frame
//! bytes and directory; the tracker never writes into bytes a snapshot can see.
//! When no snapshot is outstanding the buffer is refreshed in place, otherwise
//! a fresh buffer is allocated for the next frame.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

use crate::broadcast::{self, BroadcastMessage, CommandArg};
use crate::decoder::{self, DecodedValue};
use crate::encoding::{decode_windows_1252, until_nul};
use crate::transport::{Transport, WaitResult};
use crate::{Result, SessionInfo, TelemetryError, VarData, VariableDirectory};

/// Connection state of a [`SessionTracker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    AwaitingFrame,
    Ready,
}

/// Outcome of one [`SessionTracker::poll`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollResult {
    /// A frame is available; [`SessionTracker::snapshot`] returns it.
    Stable,
    /// The producer is gone or never delivered a frame. Keep polling to reconnect.
    ConnectionLost,
    /// The frame length changed. The directory was rebuilt; poll again before reading.
    LayoutChanged,
    /// No new frame within the timeout while connected. The previous frame stays valid.
    Timeout,
}

/// Immutable view of one frame and the directory describing it.
#[derive(Debug, Clone)]
pub struct Snapshot {
    frame: Arc<[u8]>,
    directory: Arc<VariableDirectory>,
    generation: u64,
}

impl Snapshot {
    /// Raw frame bytes.
    pub fn frame(&self) -> &[u8] {
        &self.frame
    }

    /// Directory for this frame's layout.
    pub fn directory(&self) -> &Arc<VariableDirectory> {
        &self.directory
    }

    /// Connection generation the frame belongs to.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Decode element `index` of the variable called `name`.
    pub fn read(&self, name: &str, index: usize) -> Result<DecodedValue<'_>> {
        decoder::read(&self.frame, self.directory.get(name)?, index)
    }

    /// Decode all elements of the variable called `name`.
    pub fn read_variable(&self, name: &str) -> Result<DecodedValue<'_>> {
        decoder::read_variable(&self.frame, self.directory.get(name)?)
    }

    /// Decode every variable, keyed by name.
    pub fn read_all(&self) -> Result<HashMap<String, DecodedValue<'_>>> {
        decoder::read_all(&self.frame, &self.directory)
    }

    /// Typed extraction of the variable called `name`.
    pub fn get<T: VarData>(&self, name: &str) -> Result<T> {
        T::from_bytes(&self.frame, self.directory.get(name)?)
    }
}

/// Per-connection session state: buffer, directory, generation and config cache.
pub struct SessionTracker<T> {
    transport: T,
    state: ConnectionState,
    buffer: Option<Arc<[u8]>>,
    directory: Arc<VariableDirectory>,
    generation: u64,
    config_version: Option<i32>,
    config_text: Option<Arc<str>>,
}

fn zeroed(len: usize) -> Arc<[u8]> {
    vec![0u8; len].into()
}

impl<T: Transport> SessionTracker<T> {
    /// Create a tracker; nothing is connected until the first poll.
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            state: ConnectionState::Disconnected,
            buffer: None,
            directory: Arc::default(),
            generation: 0,
            config_version: None,
            config_text: None,
        }
    }

    /// Wait up to `timeout` for the next frame and advance the state machine.
    pub fn poll(&mut self, timeout: Duration) -> Result<PollResult> {
        if self.state == ConnectionState::Disconnected {
            if !self.transport.connect() {
                trace!("Transport connect failed");
                return Ok(PollResult::ConnectionLost);
            }
            debug!("Transport connected, awaiting first frame");
            self.state = ConnectionState::AwaitingFrame;
        }

        if !self.transport.is_connected() {
            self.enter_disconnected("producer reports no active session");
            return Ok(PollResult::ConnectionLost);
        }

        let held = self.buffer.take();
        let had_buffer = held.is_some();
        let (mut frame, shared) = match held {
            Some(mut buf) => {
                if Arc::get_mut(&mut buf).is_some() {
                    (buf, None)
                } else {
                    // A snapshot still sees these bytes; never write into them
                    (zeroed(buf.len()), Some(buf))
                }
            }
            None => (zeroed(self.transport.header_snapshot()?.declared_length), None),
        };
        let dest = Arc::get_mut(&mut frame).ok_or_else(|| {
            TelemetryError::buffer_operation_error("frame buffer unexpectedly shared")
        })?;

        let waited = self.transport.wait_for_frame(timeout, dest);
        if !matches!(waited, Ok(WaitResult::Signaled)) && had_buffer {
            self.buffer = Some(shared.unwrap_or(frame));
            return match waited {
                Err(e) => Err(e),
                Ok(_) if self.transport.is_connected() => {
                    trace!("Wait timed out, keeping current frame");
                    Ok(PollResult::Timeout)
                }
                Ok(_) => {
                    self.enter_disconnected("producer stopped publishing");
                    Ok(PollResult::ConnectionLost)
                }
            };
        }

        match waited? {
            WaitResult::Timeout => {
                self.enter_disconnected("no frame before timeout");
                Ok(PollResult::ConnectionLost)
            }
            WaitResult::Signaled => self.accept_frame(frame, shared, had_buffer),
        }
    }

    /// Check a freshly copied frame against the header.
    ///
    /// On error the tracker keeps a buffer whenever it held one before the poll,
    /// so `Ready` always has a frame behind it.
    fn accept_frame(
        &mut self,
        frame: Arc<[u8]>,
        shared: Option<Arc<[u8]>>,
        had_buffer: bool,
    ) -> Result<PollResult> {
        let header = match self.transport.header_snapshot() {
            Ok(header) => header,
            Err(e) => {
                if had_buffer {
                    self.buffer = Some(shared.unwrap_or(frame));
                }
                return Err(e);
            }
        };
        let declared = header.declared_length;

        if had_buffer && frame.len() == declared {
            trace!(generation = self.generation, len = declared, "Frame refreshed");
            self.buffer = Some(frame);
            self.state = ConnectionState::Ready;
            return Ok(PollResult::Stable);
        }

        let directory = match VariableDirectory::from_header(&header) {
            Ok(directory) => directory,
            Err(e) => {
                // The held frame no longer matches the header; retry the rebuild next poll
                warn!(error = %e, declared, "Header rejected, frame layout not rebuilt");
                if had_buffer {
                    self.buffer = Some(shared.unwrap_or(frame));
                }
                self.state = ConnectionState::AwaitingFrame;
                return Err(e);
            }
        };
        self.directory = Arc::new(directory);
        self.generation += 1;
        self.config_version = None;
        self.config_text = None;

        if !had_buffer && frame.len() == declared {
            info!(
                generation = self.generation,
                frame_len = declared,
                variables = self.directory.count(),
                "Session started"
            );
            self.buffer = Some(frame);
            self.state = ConnectionState::Ready;
            Ok(PollResult::Stable)
        } else {
            info!(
                generation = self.generation,
                old_len = frame.len(),
                new_len = declared,
                variables = self.directory.count(),
                "Frame layout changed"
            );
            self.buffer = Some(zeroed(declared));
            self.state = ConnectionState::AwaitingFrame;
            Ok(PollResult::LayoutChanged)
        }
    }

    fn enter_disconnected(&mut self, reason: &str) {
        if self.state != ConnectionState::Disconnected || self.buffer.is_some() {
            info!(reason, generation = self.generation, "Session ended");
        }
        self.state = ConnectionState::Disconnected;
        self.buffer = None;
        self.config_version = None;
        self.config_text = None;
    }

    /// Snapshot of the current frame, available after a `Stable` poll.
    pub fn snapshot(&self) -> Option<Snapshot> {
        if self.state != ConnectionState::Ready {
            return None;
        }
        self.buffer.as_ref().map(|frame| Snapshot {
            frame: Arc::clone(frame),
            directory: Arc::clone(&self.directory),
            generation: self.generation,
        })
    }

    /// Session configuration text, decoded from Windows-1252.
    ///
    /// Re-fetched only when the producer's version counter moves. An absent
    /// configuration decodes to the empty string.
    pub fn session_config_text(&mut self) -> Arc<str> {
        let latest = self.transport.config_version();
        if let (Some(version), Some(text)) = (self.config_version, &self.config_text) {
            if version == latest {
                debug!(version, "Using cached session configuration");
                return Arc::clone(text);
            }
        }

        let raw = self.transport.config_text_raw();
        let text: Arc<str> = match raw.as_deref() {
            Some(bytes) => decode_windows_1252(until_nul(bytes)).into(),
            None => Arc::from(""),
        };
        debug!(
            previous = ?self.config_version,
            version = latest,
            len = text.len(),
            "Session configuration updated"
        );

        self.config_version = Some(latest);
        self.config_text = Some(Arc::clone(&text));
        text
    }

    /// Parse the current session configuration text.
    pub fn session_info(&mut self) -> Result<SessionInfo> {
        SessionInfo::parse(&self.session_config_text())
    }

    /// Encode a broadcast command and hand it to the transport.
    ///
    /// Rejected commands are never sent.
    pub fn broadcast(
        &mut self,
        kind: impl Into<i32>,
        arg1: CommandArg,
        arg2: Option<CommandArg>,
        arg3: Option<CommandArg>,
    ) -> Result<BroadcastMessage> {
        let message = broadcast::encode(kind, arg1, arg2, arg3).inspect_err(|e| {
            warn!(error = %e, "Broadcast command rejected");
        })?;
        debug!(kind = ?message.kind, args = ?message.args, "Sending broadcast command");
        self.transport.send_command(&message).inspect_err(|e| {
            warn!(error = %e, kind = ?message.kind, "Broadcast send failed");
        })?;
        Ok(message)
    }

    /// Disconnect from the producer and release the buffer.
    pub fn stop(&mut self) {
        self.transport.disconnect();
        self.enter_disconnected("stopped");
    }

    /// Current state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Whether the producer reports an active session.
    pub fn is_running(&self) -> bool {
        self.transport.is_connected()
    }

    /// Incremented on every new session and layout change.
    pub fn connection_generation(&self) -> u64 {
        self.generation
    }

    /// Configuration version last fetched, `None` until fetched for this layout.
    pub fn config_version(&self) -> Option<i32> {
        self.config_version
    }

    /// Directory for the current layout (empty before the first frame).
    pub fn directory(&self) -> &Arc<VariableDirectory> {
        &self.directory
    }

    /// Length of the held frame buffer, if any.
    pub fn frame_len(&self) -> Option<usize> {
        self.buffer.as_ref().map(|b| b.len())
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Mutable access to the underlying transport.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }
}
