//! Telemetry variable type definitions

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::BitField;

/// Supported telemetry data types.
/// Maps to the simulator SDK's irsdk_VarType enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub enum VariableType {
    /// 8-bit character (irsdk_char)
    Char,
    /// Boolean stored in one byte (irsdk_bool)
    Bool,
    /// 32-bit signed integer (irsdk_int)
    Int32,
    /// 32-bit bitfield (irsdk_bitField)
    BitField,
    /// 32-bit floating point (irsdk_float)
    Float32,
    /// 64-bit floating point (irsdk_double)
    Float64,
}

impl VariableType {
    /// Returns the size in bytes of one element of this type.
    /// Matches the irsdk_VarTypeBytes array from the SDK.
    pub const fn size(&self) -> usize {
        match self {
            VariableType::Char | VariableType::Bool => 1,
            VariableType::Int32 | VariableType::Float32 | VariableType::BitField => 4,
            VariableType::Float64 => 8,
        }
    }

    /// Map the producer's numeric type code.
    ///
    /// Unknown codes fall back to `Int32`, the width most producer-side additions use.
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => VariableType::Char,
            1 => VariableType::Bool,
            2 => VariableType::Int32,
            3 => VariableType::BitField,
            4 => VariableType::Float32,
            5 => VariableType::Float64,
            _ => {
                warn!(code, "Unknown variable type code, defaulting to Int32");
                VariableType::Int32
            }
        }
    }

    /// The producer's numeric code for this type.
    pub const fn code(&self) -> i32 {
        match self {
            VariableType::Char => 0,
            VariableType::Bool => 1,
            VariableType::Int32 => 2,
            VariableType::BitField => 3,
            VariableType::Float32 => 4,
            VariableType::Float64 => 5,
        }
    }
}

/// Runtime value type that can hold any telemetry data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub enum Value {
    Char(u8),
    Bool(bool),
    Int32(i32),
    BitField(BitField),
    Float32(f32),
    Float64(f64),
    Array(Vec<Value>),
}

impl Value {
    /// Decode exactly one element of `data_type` from `bytes`.
    ///
    /// `bytes` must be exactly `data_type.size()` long; the frame decoder slices it.
    pub(crate) fn from_element(data_type: VariableType, bytes: &[u8]) -> Option<Self> {
        let value = match data_type {
            VariableType::Char => Value::Char(*bytes.first()?),
            VariableType::Bool => Value::Bool(*bytes.first()? != 0),
            VariableType::Int32 => Value::Int32(i32::from_le_bytes(bytes.try_into().ok()?)),
            VariableType::BitField => {
                Value::BitField(BitField(u32::from_le_bytes(bytes.try_into().ok()?)))
            }
            VariableType::Float32 => Value::Float32(f32::from_le_bytes(bytes.try_into().ok()?)),
            VariableType::Float64 => Value::Float64(f64::from_le_bytes(bytes.try_into().ok()?)),
        };
        Some(value)
    }

    /// Numeric view of a scalar value, if it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Char(v) => Some(f64::from(*v)),
            Value::Bool(v) => Some(if *v { 1.0 } else { 0.0 }),
            Value::Int32(v) => Some(f64::from(*v)),
            Value::BitField(v) => Some(f64::from(v.value())),
            Value::Float32(v) => Some(f64::from(*v)),
            Value::Float64(v) => Some(*v),
            Value::Array(_) => None,
        }
    }
}
