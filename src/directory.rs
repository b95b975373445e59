//! Variable directory built from the producer's header
//!
//! Each variable header record follows the SDK's C layout:
//! ```c
//! typedef struct irsdk_varHeader
//! {
//!     int type;                           // irsdk_VarType enum value
//!     int offset;                         // offset in bytes from buffer start
//!     int count;                          // number of elements (1 for scalar)
//!     bool countAsTime;                   // plus 3 bytes of padding
//!     char name[IRSDK_MAX_STRING];        // variable name (32 bytes)
//!     char desc[IRSDK_MAX_DESC];          // description (64 bytes)
//!     char unit[IRSDK_MAX_STRING];        // units (32 bytes)
//! } irsdk_varHeader;
//! ```
//!
//! Records are read field by field from little-endian bytes, never by casting
//! pointers into the header region. Strings are NUL-terminated Windows-1252.
//!
//! The directory keeps the producer's record order, so `describe(i)` follows the
//! header table, and a name index for O(1) lookup. It is immutable: the
//! [`SessionTracker`](crate::SessionTracker) builds a fresh one on every layout change.

use std::collections::HashMap;
use tracing::{debug, trace, warn};

use crate::encoding::{decode_windows_1252, until_nul};
use crate::transport::HeaderSnapshot;
use crate::{Result, TelemetryError, VariableDescriptor, VariableType};

/// Size constants matching the SDK
const IRSDK_MAX_STRING: usize = 32;
const IRSDK_MAX_DESC: usize = 64;

/// Size of one packed variable header record.
pub const VAR_HEADER_SIZE: usize = 144;

const NAME_OFFSET: usize = 16;
const DESC_OFFSET: usize = NAME_OFFSET + IRSDK_MAX_STRING;
const UNIT_OFFSET: usize = DESC_OFFSET + IRSDK_MAX_DESC;

/// Ordered catalog of the variables in one frame layout.
#[derive(Debug, Clone, Default)]
pub struct VariableDirectory {
    variables: Vec<VariableDescriptor>,
    by_name: HashMap<String, usize>,
    frame_size: usize,
}

impl VariableDirectory {
    /// Build a directory from already-decoded descriptors.
    ///
    /// Duplicate names keep the last descriptor for name lookup; both stay
    /// reachable by index.
    pub fn new(variables: Vec<VariableDescriptor>, frame_size: usize) -> Self {
        let mut by_name = HashMap::with_capacity(variables.len());
        for (index, var) in variables.iter().enumerate() {
            if by_name.insert(var.name.clone(), index).is_some() {
                warn!(name = %var.name, "Duplicate variable name found");
            }
            if var.offset.saturating_add(var.byte_len()) > frame_size {
                warn!(
                    name = %var.name,
                    offset = var.offset,
                    len = var.byte_len(),
                    frame_size,
                    "Variable extends past the declared frame length"
                );
            }
        }
        Self { variables, by_name, frame_size }
    }

    /// Parse the producer's variable header table.
    ///
    /// Records with empty names or non-positive counts are skipped, as are records
    /// with negative offsets. A table shorter than `variable_count` records is a
    /// parse error.
    pub fn from_header(header: &HeaderSnapshot<'_>) -> Result<Self> {
        debug!(
            variable_count = header.variable_count,
            declared_length = header.declared_length,
            "Parsing variable directory from header"
        );

        let needed = header.variable_count.checked_mul(VAR_HEADER_SIZE).ok_or_else(|| {
            TelemetryError::parse(
                "Variable directory",
                format!("Invalid variable count: {}", header.variable_count),
            )
        })?;
        if header.descriptors.len() < needed {
            return Err(TelemetryError::parse(
                "Variable directory",
                format!(
                    "Header table holds {} bytes, {} records need {}",
                    header.descriptors.len(),
                    header.variable_count,
                    needed
                ),
            ));
        }

        let mut variables = Vec::with_capacity(header.variable_count);
        let mut skipped = 0usize;

        for (i, record) in header.descriptors[..needed].chunks_exact(VAR_HEADER_SIZE).enumerate() {
            match parse_record(record) {
                Some(var) => {
                    trace!(index = i, name = %var.name, "Parsed variable header");
                    variables.push(var);
                }
                None => {
                    skipped += 1;
                    warn!(header_index = i, "Skipping malformed variable header");
                }
            }
        }

        if skipped > 0 {
            warn!(skipped, total = header.variable_count, "Some variable headers were skipped");
        }
        debug!(parsed_count = variables.len(), "Variable directory parsing completed");

        Ok(Self::new(variables, header.declared_length))
    }

    /// Number of variables.
    pub fn count(&self) -> usize {
        self.variables.len()
    }

    /// Whether the directory holds no variables.
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Frame length this directory was built for.
    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// Descriptor at `index` in header order.
    pub fn describe(&self, index: usize) -> Result<&VariableDescriptor> {
        self.variables
            .get(index)
            .ok_or_else(|| TelemetryError::index_not_found(index, self.variables.len()))
    }

    /// Index of the variable called `name` (case-sensitive).
    pub fn index_of(&self, name: &str) -> Result<usize> {
        self.by_name.get(name).copied().ok_or_else(|| TelemetryError::not_found(name))
    }

    /// Descriptor of the variable called `name`.
    pub fn get(&self, name: &str) -> Result<&VariableDescriptor> {
        self.index_of(name).map(|index| &self.variables[index])
    }

    /// Check if a variable exists.
    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// All descriptors in header order.
    pub fn iter(&self) -> impl Iterator<Item = &VariableDescriptor> {
        self.variables.iter()
    }

    /// `(name, type)` for every variable, in header order.
    pub fn type_tags(&self) -> impl Iterator<Item = (&str, VariableType)> {
        self.variables.iter().map(|v| (v.name.as_str(), v.data_type))
    }
}

fn read_i32(record: &[u8], at: usize) -> i32 {
    i32::from_le_bytes([record[at], record[at + 1], record[at + 2], record[at + 3]])
}

fn read_string(record: &[u8], at: usize, len: usize) -> String {
    decode_windows_1252(until_nul(&record[at..at + len]))
}

/// Decode one 144-byte record; `None` for records that describe no usable variable.
fn parse_record(record: &[u8]) -> Option<VariableDescriptor> {
    let offset = usize::try_from(read_i32(record, 4)).ok()?;
    let count = usize::try_from(read_i32(record, 8)).ok().filter(|&c| c > 0)?;
    let name = read_string(record, NAME_OFFSET, IRSDK_MAX_STRING);
    if name.is_empty() {
        return None;
    }

    Some(VariableDescriptor {
        name,
        description: read_string(record, DESC_OFFSET, IRSDK_MAX_DESC),
        unit: read_string(record, UNIT_OFFSET, IRSDK_MAX_STRING),
        data_type: VariableType::from_code(read_i32(record, 0)),
        count,
        offset,
        count_as_time: record[12] != 0,
    })
}

/// Encode a descriptor into the producer's packed record layout.
#[cfg(any(test, feature = "benchmark"))]
pub(crate) fn encode_record(var: &VariableDescriptor) -> [u8; VAR_HEADER_SIZE] {
    fn put_str(record: &mut [u8], at: usize, len: usize, value: &str) {
        let bytes = value.as_bytes();
        let n = bytes.len().min(len - 1);
        record[at..at + n].copy_from_slice(&bytes[..n]);
    }

    let mut record = [0u8; VAR_HEADER_SIZE];
    record[0..4].copy_from_slice(&var.data_type.code().to_le_bytes());
    record[4..8].copy_from_slice(&(var.offset as i32).to_le_bytes());
    record[8..12].copy_from_slice(&(var.count as i32).to_le_bytes());
    record[12] = u8::from(var.count_as_time);
    put_str(&mut record, NAME_OFFSET, IRSDK_MAX_STRING, &var.name);
    put_str(&mut record, DESC_OFFSET, IRSDK_MAX_DESC, &var.description);
    put_str(&mut record, UNIT_OFFSET, IRSDK_MAX_STRING, &var.unit);
    record
}
