//! Typed variable extraction

use super::{BitField, VariableDescriptor, VariableType};
use crate::{Result, TelemetryError};

/// Trait for types that can be parsed from binary telemetry data.
///
/// Scalar implementations read element 0; `Vec<T>` reads every element.
pub trait VarData: Sized {
    /// Parse this type from a frame using the variable's descriptor.
    fn from_bytes(data: &[u8], desc: &VariableDescriptor) -> Result<Self> {
        Self::from_element(data, desc, 0)
    }

    /// Parse one element of an array variable.
    fn from_element(data: &[u8], desc: &VariableDescriptor, index: usize) -> Result<Self>;
}

fn expect_type(desc: &VariableDescriptor, expected: &[VariableType]) -> Result<()> {
    if expected.contains(&desc.data_type) {
        Ok(())
    } else {
        Err(TelemetryError::TypeConversion {
            details: format!(
                "'{}' is {:?}, expected one of {:?}",
                desc.name, desc.data_type, expected
            ),
        })
    }
}

fn element<'a>(data: &'a [u8], desc: &VariableDescriptor, index: usize) -> Result<&'a [u8]> {
    let range = desc.element_range(index, data.len())?;
    Ok(&data[range])
}

fn element_4(data: &[u8], desc: &VariableDescriptor, index: usize) -> Result<[u8; 4]> {
    let bytes = element(data, desc, index)?;
    Ok([bytes[0], bytes[1], bytes[2], bytes[3]])
}

impl VarData for f32 {
    fn from_element(data: &[u8], desc: &VariableDescriptor, index: usize) -> Result<Self> {
        expect_type(desc, &[VariableType::Float32])?;
        Ok(f32::from_le_bytes(element_4(data, desc, index)?))
    }
}

impl VarData for f64 {
    fn from_element(data: &[u8], desc: &VariableDescriptor, index: usize) -> Result<Self> {
        expect_type(desc, &[VariableType::Float64])?;
        let bytes = element(data, desc, index)?;
        Ok(f64::from_le_bytes([
            bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
        ]))
    }
}

impl VarData for i32 {
    fn from_element(data: &[u8], desc: &VariableDescriptor, index: usize) -> Result<Self> {
        expect_type(desc, &[VariableType::Int32])?;
        Ok(i32::from_le_bytes(element_4(data, desc, index)?))
    }
}

impl VarData for bool {
    fn from_element(data: &[u8], desc: &VariableDescriptor, index: usize) -> Result<Self> {
        expect_type(desc, &[VariableType::Bool])?;
        Ok(element(data, desc, index)?[0] != 0)
    }
}

impl VarData for u8 {
    fn from_element(data: &[u8], desc: &VariableDescriptor, index: usize) -> Result<Self> {
        expect_type(desc, &[VariableType::Char])?;
        Ok(element(data, desc, index)?[0])
    }
}

impl VarData for BitField {
    fn from_element(data: &[u8], desc: &VariableDescriptor, index: usize) -> Result<Self> {
        expect_type(desc, &[VariableType::BitField])?;
        Ok(BitField(u32::from_le_bytes(element_4(data, desc, index)?)))
    }
}

// Array support for VarData
impl<T: VarData> VarData for Vec<T> {
    fn from_bytes(data: &[u8], desc: &VariableDescriptor) -> Result<Self> {
        (0..desc.count).map(|i| T::from_element(data, desc, i)).collect()
    }

    fn from_element(data: &[u8], desc: &VariableDescriptor, index: usize) -> Result<Self> {
        Ok(vec![T::from_element(data, desc, index)?])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn descriptor(data_type: VariableType, offset: usize, count: usize) -> VariableDescriptor {
        VariableDescriptor {
            name: "test".to_string(),
            description: "test".to_string(),
            unit: "test".to_string(),
            data_type,
            count,
            offset,
            count_as_time: false,
        }
    }

    proptest! {
        #[test]
        fn prop_f32_extraction_preserves_bits(value in any::<f32>(), offset in 0..100usize) {
            let mut data = vec![0u8; offset + 4 + 10];
            data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());

            let parsed = f32::from_bytes(&data, &descriptor(VariableType::Float32, offset, 1));
            prop_assert_eq!(parsed.unwrap().to_bits(), value.to_bits());
        }

        #[test]
        fn prop_bitfield_parsing_handles_all_32bit_patterns(value in any::<u32>(), offset in 0..100usize) {
            let mut data = vec![0u8; offset + 4];
            data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());

            let parsed = BitField::from_bytes(&data, &descriptor(VariableType::BitField, offset, 1));
            prop_assert_eq!(parsed.unwrap().value(), value);
        }
    }

    #[test]
    fn vec_reads_every_element() {
        let mut data = vec![0u8; 24];
        for (i, v) in [1.5f64, -2.0, 1e9].iter().enumerate() {
            data[i * 8..i * 8 + 8].copy_from_slice(&v.to_le_bytes());
        }
        let values = Vec::<f64>::from_bytes(&data, &descriptor(VariableType::Float64, 0, 3));
        assert_eq!(values.unwrap(), vec![1.5, -2.0, 1e9]);
    }

    #[test]
    fn type_mismatch_is_conversion_error() {
        let data = vec![0u8; 8];
        let result = f32::from_bytes(&data, &descriptor(VariableType::Int32, 0, 1));
        assert!(matches!(result, Err(TelemetryError::TypeConversion { .. })));
    }

    #[test]
    fn truncated_frame_is_out_of_bounds() {
        let data = vec![0u8; 6];
        let result = Vec::<i32>::from_bytes(&data, &descriptor(VariableType::Int32, 0, 2));
        assert!(matches!(result, Err(TelemetryError::OutOfBounds { .. })));
    }
}
