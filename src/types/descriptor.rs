//! Telemetry variable descriptor

use serde::{Deserialize, Serialize};
use std::ops::Range;

use super::VariableType;
use crate::{Result, TelemetryError};

/// Static metadata for one named telemetry variable.
///
/// Descriptors are rebuilt whenever the producer changes the frame layout; within
/// one directory generation they are immutable and safe to cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct VariableDescriptor {
    /// Variable name as defined by the simulator
    pub name: String,
    /// Human-readable description
    pub description: String,
    /// Units of measurement (e.g., "m/s", "C", "N*m")
    pub unit: String,
    /// Data type of each element
    pub data_type: VariableType,
    /// Number of elements (1 for scalar, >1 for arrays)
    pub count: usize,
    /// Byte offset of element 0 within the frame
    pub offset: usize,
    /// Whether the simulator treats the sample count as elapsed time
    pub count_as_time: bool,
}

impl VariableDescriptor {
    /// Total bytes occupied by all elements, saturating at `usize::MAX`.
    pub fn byte_len(&self) -> usize {
        self.count.saturating_mul(self.data_type.size())
    }

    /// Byte range of the whole variable, checked against `frame_len`.
    pub fn byte_range(&self, frame_len: usize) -> Result<Range<usize>> {
        let len = self.count.checked_mul(self.data_type.size()).ok_or_else(|| {
            TelemetryError::out_of_bounds(&self.name, self.offset, usize::MAX, frame_len)
        })?;
        self.checked_range(self.offset, len, frame_len)
    }

    /// Byte range of one element, checked against the element count and `frame_len`.
    ///
    /// The element offset is `offset + index * width`, applied exactly once.
    pub fn element_range(&self, index: usize, frame_len: usize) -> Result<Range<usize>> {
        let width = self.data_type.size();
        if index >= self.count {
            let offset = self.offset.saturating_add(index.saturating_mul(width));
            return Err(TelemetryError::out_of_bounds(&self.name, offset, width, frame_len));
        }
        // Whole-variable bounds first so a truncated frame rejects every element
        self.byte_range(frame_len)?;
        self.checked_range(self.offset + index * width, width, frame_len)
    }

    fn checked_range(&self, start: usize, len: usize, frame_len: usize) -> Result<Range<usize>> {
        match start.checked_add(len) {
            Some(end) if end <= frame_len => Ok(start..end),
            _ => Err(TelemetryError::out_of_bounds(&self.name, start, len, frame_len)),
        }
    }
}
