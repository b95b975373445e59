//! Test utilities shared by unit tests and benchmarks
//!
//! [`MockTransport`] plays the producer side of a [`Transport`]: it publishes a
//! header built from [`VariableDescriptor`]s, hands out queued frames, and records
//! every broadcast command it receives.

#![cfg(any(test, feature = "benchmark"))]

use std::cell::Cell;
use std::collections::VecDeque;
use std::time::Duration;

use crate::broadcast::BroadcastMessage;
use crate::directory::encode_record;
use crate::transport::{HeaderSnapshot, Transport, WaitResult};
use crate::{Result, TelemetryError, VariableDescriptor, VariableType};

/// Build a descriptor with empty unit and description.
pub fn var(name: &str, data_type: VariableType, offset: usize, count: usize) -> VariableDescriptor {
    VariableDescriptor {
        name: name.to_string(),
        description: String::new(),
        unit: String::new(),
        data_type,
        count,
        offset,
        count_as_time: false,
    }
}

/// Pack descriptors into the producer's header record table.
pub fn header_records(variables: &[VariableDescriptor]) -> Vec<u8> {
    variables.iter().flat_map(encode_record).collect()
}

/// A typical live layout: scalars followed by one per-car array.
pub fn sample_layout(cars: usize) -> (Vec<VariableDescriptor>, usize) {
    let vars = vec![
        var("SessionTime", VariableType::Float64, 0, 1),
        var("SessionTick", VariableType::Int32, 8, 1),
        var("SessionFlags", VariableType::BitField, 12, 1),
        var("Speed", VariableType::Float32, 16, 1),
        var("RPM", VariableType::Float32, 20, 1),
        var("Gear", VariableType::Int32, 24, 1),
        var("IsOnTrack", VariableType::Bool, 28, 1),
        var("CarIdxLapDistPct", VariableType::Float32, 32, cars),
    ];
    (vars, 32 + cars * 4)
}

/// Scripted producer used in place of a real shared-memory connection.
#[derive(Debug)]
pub struct MockTransport {
    /// Whether the producer reports an active session
    pub connected: bool,
    /// Whether `connect` brings the session up
    pub connect_succeeds: bool,
    /// Version counter returned by `config_version`
    pub config_version: i32,
    /// Number of times the configuration text was fetched
    pub config_fetches: usize,
    /// Commands received through `send_command`
    pub sent: Vec<BroadcastMessage>,
    /// Remaining waits that fail with a connection error
    pub failing_waits: usize,
    /// Remaining header reads that fail with a connection error
    pub failing_headers: Cell<usize>,
    /// Remaining sends that fail with a connection error
    pub failing_sends: usize,
    declared_length: usize,
    variable_count: usize,
    records: Vec<u8>,
    frames: VecDeque<Vec<u8>>,
    config_text: Option<Vec<u8>>,
}

impl MockTransport {
    pub fn new(variables: Vec<VariableDescriptor>, frame_len: usize) -> Self {
        Self {
            connected: false,
            connect_succeeds: true,
            config_version: 0,
            config_fetches: 0,
            sent: Vec::new(),
            failing_waits: 0,
            failing_headers: Cell::new(0),
            failing_sends: 0,
            declared_length: frame_len,
            variable_count: variables.len(),
            records: header_records(&variables),
            frames: VecDeque::new(),
            config_text: None,
        }
    }

    /// Publish a new header layout, as the producer does between sessions.
    pub fn set_layout(&mut self, variables: Vec<VariableDescriptor>, frame_len: usize) {
        self.declared_length = frame_len;
        self.variable_count = variables.len();
        self.records = header_records(&variables);
    }

    /// Publish header fields and record bytes exactly as given.
    pub fn set_raw_header(
        &mut self,
        declared_length: usize,
        variable_count: usize,
        records: Vec<u8>,
    ) {
        self.declared_length = declared_length;
        self.variable_count = variable_count;
        self.records = records;
    }

    /// Queue a frame for the next successful wait.
    pub fn push_frame(&mut self, frame: Vec<u8>) {
        self.frames.push_back(frame);
    }

    pub fn pending_frames(&self) -> usize {
        self.frames.len()
    }

    pub fn set_config(&mut self, version: i32, text: &[u8]) {
        self.config_version = version;
        self.config_text = Some(text.to_vec());
    }

    pub fn clear_config(&mut self, version: i32) {
        self.config_version = version;
        self.config_text = None;
    }
}

impl Transport for MockTransport {
    fn connect(&mut self) -> bool {
        if self.connect_succeeds {
            self.connected = true;
        }
        self.connected
    }

    fn disconnect(&mut self) {
        self.connected = false;
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn header_snapshot(&self) -> Result<HeaderSnapshot<'_>> {
        let failing = self.failing_headers.get();
        if failing > 0 {
            self.failing_headers.set(failing - 1);
            return Err(TelemetryError::connection_failed("mock header failure"));
        }
        Ok(HeaderSnapshot {
            declared_length: self.declared_length,
            variable_count: self.variable_count,
            descriptors: &self.records,
        })
    }

    fn wait_for_frame(&mut self, _timeout: Duration, dest: &mut [u8]) -> Result<WaitResult> {
        if self.failing_waits > 0 {
            self.failing_waits -= 1;
            return Err(TelemetryError::connection_failed("mock wait failure"));
        }
        if !self.connected {
            return Ok(WaitResult::Timeout);
        }
        match self.frames.pop_front() {
            Some(frame) => {
                let n = frame.len().min(dest.len());
                dest[..n].copy_from_slice(&frame[..n]);
                Ok(WaitResult::Signaled)
            }
            None => Ok(WaitResult::Timeout),
        }
    }

    fn config_version(&self) -> i32 {
        self.config_version
    }

    fn config_text_raw(&mut self) -> Option<Vec<u8>> {
        self.config_fetches += 1;
        self.config_text.clone()
    }

    fn send_command(&mut self, message: &BroadcastMessage) -> Result<()> {
        if self.failing_sends > 0 {
            self.failing_sends -= 1;
            return Err(TelemetryError::connection_failed("mock send failure"));
        }
        self.sent.push(*message);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_copies_common_prefix() {
        let mut mock = MockTransport::new(vec![var("Gear", VariableType::Int32, 0, 1)], 4);
        assert!(mock.connect());
        mock.push_frame(vec![1, 2, 3, 4, 5, 6]);

        let mut dest = [0u8; 4];
        let result = mock.wait_for_frame(Duration::ZERO, &mut dest).unwrap();
        assert_eq!(result, WaitResult::Signaled);
        assert_eq!(dest, [1, 2, 3, 4]);
        assert_eq!(mock.wait_for_frame(Duration::ZERO, &mut dest).unwrap(), WaitResult::Timeout);
    }

    #[test]
    fn header_records_are_fixed_width() {
        let (vars, frame_len) = sample_layout(4);
        let mock = MockTransport::new(vars.clone(), frame_len);
        let header = mock.header_snapshot().unwrap();

        assert_eq!(header.declared_length, 48);
        assert_eq!(header.variable_count, vars.len());
        assert_eq!(header.descriptors.len(), vars.len() * crate::directory::VAR_HEADER_SIZE);
    }
}
