//! Frame decoding
//!
//! Turns a raw frame plus a [`VariableDescriptor`] into a [`DecodedValue`]. Every
//! read computes `offset + element * width` once, checks the whole variable and
//! the element against the frame length, and only then slices. Nothing here
//! reads past the buffer; a descriptor that does not fit yields `OutOfBounds`.

use std::collections::HashMap;

use crate::{Result, TelemetryError, Value, VariableDescriptor, VariableDirectory};

/// One decoded variable together with the frame bytes it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedValue<'a> {
    /// Scalar for single-element reads, [`Value::Array`] for full-array reads
    pub value: Value,
    /// Exact bytes the value was decoded from
    pub raw: &'a [u8],
}

/// Decode element `index` of `desc`.
pub fn read<'a>(
    frame: &'a [u8],
    desc: &VariableDescriptor,
    index: usize,
) -> Result<DecodedValue<'a>> {
    let raw = &frame[desc.element_range(index, frame.len())?];
    Ok(DecodedValue { value: decode_element(desc, raw)?, raw })
}

/// Decode every element of `desc`.
///
/// Scalars (`count == 1`) decode to a plain value; arrays decode to
/// [`Value::Array`] with exactly `count` elements.
pub fn read_variable<'a>(frame: &'a [u8], desc: &VariableDescriptor) -> Result<DecodedValue<'a>> {
    if desc.count == 1 {
        return read(frame, desc, 0);
    }

    let raw = &frame[desc.byte_range(frame.len())?];
    let values = raw
        .chunks_exact(desc.data_type.size())
        .map(|element| decode_element(desc, element))
        .collect::<Result<Vec<_>>>()?;

    Ok(DecodedValue { value: Value::Array(values), raw })
}

/// Decode every variable in `directory`, keyed by name.
///
/// Stops at the first variable that does not fit in `frame`. Duplicate names
/// (which the producer should never publish) keep the later variable.
pub fn read_all<'a>(
    frame: &'a [u8],
    directory: &VariableDirectory,
) -> Result<HashMap<String, DecodedValue<'a>>> {
    let mut values = HashMap::with_capacity(directory.count());
    for desc in directory.iter() {
        values.insert(desc.name.clone(), read_variable(frame, desc)?);
    }
    Ok(values)
}

fn decode_element(desc: &VariableDescriptor, bytes: &[u8]) -> Result<Value> {
    Value::from_element(desc.data_type, bytes).ok_or_else(|| {
        TelemetryError::out_of_bounds(&desc.name, desc.offset, desc.data_type.size(), bytes.len())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::var;
    use crate::{BitField, VariableType};
    use proptest::prelude::*;

    fn sample_frame() -> (Vec<u8>, VariableDirectory) {
        let dir = VariableDirectory::new(
            vec![
                var("SessionTime", VariableType::Float64, 0, 1),
                var("RPM", VariableType::Float32, 8, 1),
                var("Gear", VariableType::Int32, 12, 1),
                var("OnPitRoad", VariableType::Bool, 16, 1),
                var("SessionFlags", VariableType::BitField, 20, 1),
                var("CarIdxPosition", VariableType::Int32, 24, 3),
                var("DisplayUnits", VariableType::Char, 36, 1),
            ],
            40,
        );

        let mut frame = vec![0u8; 40];
        frame[0..8].copy_from_slice(&1234.5f64.to_le_bytes());
        frame[8..12].copy_from_slice(&6800.0f32.to_le_bytes());
        frame[12..16].copy_from_slice(&4i32.to_le_bytes());
        frame[16] = 1;
        frame[20..24].copy_from_slice(&0x0001_0004u32.to_le_bytes());
        for (i, pos) in [3i32, 1, 2].iter().enumerate() {
            frame[24 + i * 4..28 + i * 4].copy_from_slice(&pos.to_le_bytes());
        }
        frame[36] = b'M';
        (frame, dir)
    }

    #[test]
    fn reads_each_scalar_type() {
        let (frame, dir) = sample_frame();
        let get = |name| read(&frame, dir.get(name).unwrap(), 0).unwrap().value;

        assert_eq!(get("SessionTime"), Value::Float64(1234.5));
        assert_eq!(get("RPM"), Value::Float32(6800.0));
        assert_eq!(get("Gear"), Value::Int32(4));
        assert_eq!(get("OnPitRoad"), Value::Bool(true));
        assert_eq!(get("SessionFlags"), Value::BitField(BitField(0x0001_0004)));
        assert_eq!(get("DisplayUnits"), Value::Char(b'M'));
    }

    #[test]
    fn array_elements_use_single_width_step() {
        let (frame, dir) = sample_frame();
        let desc = dir.get("CarIdxPosition").unwrap();

        let second = read(&frame, desc, 1).unwrap();
        assert_eq!(second.value, Value::Int32(1));
        assert_eq!(second.raw, &frame[28..32]);

        let third = read(&frame, desc, 2).unwrap();
        assert_eq!(third.value, Value::Int32(2));

        assert!(matches!(read(&frame, desc, 3), Err(TelemetryError::OutOfBounds { .. })));
    }

    #[test]
    fn full_array_read_returns_every_element() {
        let (frame, dir) = sample_frame();
        let decoded = read_variable(&frame, dir.get("CarIdxPosition").unwrap()).unwrap();

        assert_eq!(
            decoded.value,
            Value::Array(vec![Value::Int32(3), Value::Int32(1), Value::Int32(2)])
        );
        assert_eq!(decoded.raw.len(), 12);
    }

    #[test]
    fn read_all_keys_by_name() {
        let (frame, dir) = sample_frame();
        let all = read_all(&frame, &dir).unwrap();

        assert_eq!(all.len(), dir.count());
        assert_eq!(all["Gear"].value, Value::Int32(4));
        assert!(matches!(all["CarIdxPosition"].value, Value::Array(ref v) if v.len() == 3));
    }

    #[test]
    fn descriptor_past_frame_end_is_rejected_without_reading() {
        let frame = vec![0u8; 10];
        let desc = var("LapDist", VariableType::Float64, 4, 1);
        assert!(matches!(read(&frame, &desc, 0), Err(TelemetryError::OutOfBounds { .. })));
        assert!(matches!(read_variable(&frame, &desc), Err(TelemetryError::OutOfBounds { .. })));

        let dir = VariableDirectory::new(vec![desc], 12);
        assert!(read_all(&frame, &dir).is_err());
    }

    proptest! {
        #[test]
        fn prop_reads_stay_inside_declared_range(
            type_code in 0..6i32,
            offset in 0..64usize,
            count in 1..16usize,
            index in 0..20usize,
            frame_len in 0..256usize
        ) {
            let desc = var("X", VariableType::from_code(type_code), offset, count);
            let width = desc.data_type.size();
            let frame = vec![0xAAu8; frame_len];
            let fits = offset + count * width <= frame_len && index < count;

            match read(&frame, &desc, index) {
                Ok(decoded) => {
                    prop_assert!(fits);
                    prop_assert_eq!(decoded.raw.len(), width);
                    let start = decoded.raw.as_ptr() as usize - frame.as_ptr() as usize;
                    prop_assert_eq!(start, offset + index * width);
                    prop_assert!(start + width <= offset + count * width);
                }
                Err(TelemetryError::OutOfBounds { .. }) => prop_assert!(!fits),
                Err(other) => prop_assert!(false, "unexpected error {other}"),
            }
        }
    }
}
