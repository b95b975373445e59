//! Core types for telemetry data representation.
//!
//! The type system maps directly to the simulator SDK structures:
//! - [`VariableDescriptor`] describes one variable (type, offset, element count)
//! - [`VariableType`] maps to the SDK's `irsdk_VarType` enum with size information
//! - [`Value`] holds a decoded element or array of elements
//! - [`VarData`] provides typed, bounds-checked extraction from a frame
//! - [`BitField`] handles bitfield variables with flag operations
//!
//! ## Usage Example
//!
//! ```rust
//! use racebridge::types::{VariableDescriptor, VariableType, VarData};
//!
//! let rpm = VariableDescriptor {
//!     name: "RPM".to_string(),
//!     description: "Engine rpm".to_string(),
//!     unit: "revs/min".to_string(),
//!     data_type: VariableType::Float32,
//!     count: 1,
//!     offset: 0,
//!     count_as_time: false,
//! };
//!
//! let frame = 4500.0f32.to_le_bytes();
//! assert_eq!(f32::from_bytes(&frame, &rpm).unwrap(), 4500.0);
//! ```

mod bitfield;
mod descriptor;
mod var_data;
mod variable_type;

pub use bitfield::BitField;
pub use descriptor::VariableDescriptor;
pub use var_data::VarData;
pub use variable_type::{Value, VariableType};

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const ALL_TYPES: [VariableType; 6] = [
        VariableType::Char,
        VariableType::Bool,
        VariableType::Int32,
        VariableType::BitField,
        VariableType::Float32,
        VariableType::Float64,
    ];

    #[test]
    fn variable_type_size_returns_correct_values() {
        assert_eq!(VariableType::Char.size(), 1);
        assert_eq!(VariableType::Bool.size(), 1);
        assert_eq!(VariableType::Int32.size(), 4);
        assert_eq!(VariableType::BitField.size(), 4);
        assert_eq!(VariableType::Float32.size(), 4);
        assert_eq!(VariableType::Float64.size(), 8);
    }

    #[test]
    fn type_codes_round_trip() {
        for ty in ALL_TYPES {
            assert_eq!(VariableType::from_code(ty.code()), ty);
        }
        assert_eq!(VariableType::from_code(99), VariableType::Int32);
        assert_eq!(VariableType::from_code(-1), VariableType::Int32);
    }

    #[test]
    fn bitfield_flag_operations_basic() {
        let bitfield = BitField::new(0b1010);
        assert!(bitfield.is_set(1));
        assert!(!bitfield.is_set(0));
        assert!(bitfield.is_set(3));
        assert!(!bitfield.is_set(40));
        assert!(bitfield.has_flag(0b0010));
        assert!(!bitfield.has_flag(0b0100));
    }

    #[test]
    fn element_decoding_respects_type() {
        assert_eq!(Value::from_element(VariableType::Bool, &[2]), Some(Value::Bool(true)));
        assert_eq!(Value::from_element(VariableType::Char, &[b'A']), Some(Value::Char(b'A')));
        assert_eq!(
            Value::from_element(VariableType::Int32, &(-7i32).to_le_bytes()),
            Some(Value::Int32(-7))
        );
        assert_eq!(Value::from_element(VariableType::Float64, &[0; 4]), None);
    }

    proptest! {
        #[test]
        fn prop_bitfield_flag_operations(value in any::<u32>(), bit_index in 0..32u32) {
            let bitfield = BitField::new(value);
            let expected_bit_set = (value & (1 << bit_index)) != 0;
            prop_assert_eq!(bitfield.is_set(bit_index), expected_bit_set);
            prop_assert_eq!(bitfield.has_flag(1 << bit_index), expected_bit_set);
        }
    }
}
