//! Core data types: sample types, axis orders and decoded volumes

use crate::error::{Result, StackError};
use byteorder::{ByteOrder, LittleEndian};
use ndarray::{concatenate, Array5, ArrayView5, Axis};
use num_traits::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Element types a volume can be delivered in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum DataType {
    /// Unsigned 8-bit integer
    U8 = 1,
    /// Unsigned 16-bit integer, the native sample type of 3DU16 files
    U16 = 2,
    /// 32-bit floating point, normalized to [0, 1]
    F32 = 9,
}

impl DataType {
    /// Size in bytes of this data type
    pub fn size_in_bytes(&self) -> usize {
        match self {
            DataType::U8 => 1,
            DataType::U16 => 2,
            DataType::F32 => 4,
        }
    }

    /// Check if this is a floating point type
    pub fn is_float(&self) -> bool {
        matches!(self, DataType::F32)
    }

    /// Check if this is an integer type
    pub fn is_integer(&self) -> bool {
        !self.is_float()
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::U8 => "uint8",
            DataType::U16 => "uint16",
            DataType::F32 => "float32",
        };
        f.write_str(name)
    }
}

/// Axis order of a returned volume
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AxisOrder {
    /// Time, channel, depth, row, column (file order)
    #[default]
    Native,
    /// Time, depth, channel, row, column, as expected by hyperstack writers
    Interchange,
}

impl AxisOrder {
    /// Axis tag as written into interchange metadata
    pub fn tag(&self) -> &'static str {
        match self {
            AxisOrder::Native => "TCZYX",
            AxisOrder::Interchange => "TZCYX",
        }
    }

    /// Axis permutation applied to a TCZYX array
    pub fn permutation(&self) -> [usize; 5] {
        match self {
            AxisOrder::Native => [0, 1, 2, 3, 4],
            AxisOrder::Interchange => [0, 2, 1, 3, 4],
        }
    }
}

/// Value range for a volume
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueRange {
    pub min: f64,
    pub max: f64,
}

impl ValueRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn is_valid(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.min <= self.max
    }
}

/// A decoded batch of volumes, owned and independent of the file it came from
///
/// Always five-dimensional: the leading axis counts frames.
#[derive(Debug, Clone, PartialEq)]
pub enum VolumeData {
    U16(Array5<u16>),
    U8(Array5<u8>),
    F32(Array5<f32>),
}

impl VolumeData {
    /// Element type of the samples
    pub fn data_type(&self) -> DataType {
        match self {
            VolumeData::U16(_) => DataType::U16,
            VolumeData::U8(_) => DataType::U8,
            VolumeData::F32(_) => DataType::F32,
        }
    }

    pub fn shape(&self) -> [usize; 5] {
        let dims = match self {
            VolumeData::U16(a) => a.shape(),
            VolumeData::U8(a) => a.shape(),
            VolumeData::F32(a) => a.shape(),
        };
        [dims[0], dims[1], dims[2], dims[3], dims[4]]
    }

    /// Number of frames along the leading axis
    pub fn frames(&self) -> usize {
        self.shape()[0]
    }

    /// Total number of samples
    pub fn len(&self) -> usize {
        self.shape().iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Size of the samples in bytes
    pub fn size_in_bytes(&self) -> usize {
        self.len() * self.data_type().size_in_bytes()
    }

    pub fn as_u16(&self) -> Option<&Array5<u16>> {
        match self {
            VolumeData::U16(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_u8(&self) -> Option<&Array5<u8>> {
        match self {
            VolumeData::U8(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<&Array5<f32>> {
        match self {
            VolumeData::F32(a) => Some(a),
            _ => None,
        }
    }

    /// Reorder axes of a TCZYX batch into `order`, copying into standard layout
    pub fn into_axis_order(self, order: AxisOrder) -> Self {
        if order == AxisOrder::Native {
            return self;
        }
        let perm = order.permutation();
        match self {
            VolumeData::U16(a) => VolumeData::U16(standard(a.permuted_axes(perm))),
            VolumeData::U8(a) => VolumeData::U8(standard(a.permuted_axes(perm))),
            VolumeData::F32(a) => VolumeData::F32(standard(a.permuted_axes(perm))),
        }
    }

    /// Minimum and maximum sample value, `None` for an empty batch
    pub fn value_range(&self) -> Option<ValueRange> {
        match self {
            VolumeData::U16(a) => range_of(a.view()),
            VolumeData::U8(a) => range_of(a.view()),
            VolumeData::F32(a) => range_of(a.view()),
        }
    }

    /// Serialize samples in logical order as little-endian bytes
    pub fn to_le_bytes(&self) -> Vec<u8> {
        let mut out = vec![0u8; self.size_in_bytes()];
        match self {
            VolumeData::U16(a) => {
                for (dst, v) in out.chunks_exact_mut(2).zip(a.iter()) {
                    LittleEndian::write_u16(dst, *v);
                }
            }
            VolumeData::U8(a) => {
                for (dst, v) in out.iter_mut().zip(a.iter()) {
                    *dst = *v;
                }
            }
            VolumeData::F32(a) => {
                for (dst, v) in out.chunks_exact_mut(4).zip(a.iter()) {
                    LittleEndian::write_f32(dst, *v);
                }
            }
        }
        out
    }

    /// Rebuild a batch from little-endian bytes produced by [`Self::to_le_bytes`]
    pub fn from_le_bytes(data_type: DataType, shape: [usize; 5], bytes: &[u8]) -> Result<Self> {
        let count: usize = shape.iter().product();
        let expected = count * data_type.size_in_bytes();
        if bytes.len() != expected {
            return Err(StackError::Shape(format!(
                "expected {} bytes for shape {:?} ({}), got {}",
                expected,
                shape,
                data_type,
                bytes.len()
            )));
        }

        Ok(match data_type {
            DataType::U8 => VolumeData::U8(Array5::from_shape_vec(shape, bytes.to_vec())?),
            DataType::U16 => {
                let mut samples = vec![0u16; count];
                LittleEndian::read_u16_into(bytes, &mut samples);
                VolumeData::U16(Array5::from_shape_vec(shape, samples)?)
            }
            DataType::F32 => {
                let mut samples = vec![0f32; count];
                LittleEndian::read_f32_into(bytes, &mut samples);
                VolumeData::F32(Array5::from_shape_vec(shape, samples)?)
            }
        })
    }

    /// Join batches of the same element type along the frame axis
    pub fn concatenate(parts: &[VolumeData]) -> Result<Self> {
        let first = parts
            .first()
            .ok_or_else(|| StackError::Shape("nothing to concatenate".to_string()))?;

        macro_rules! join {
            ($variant:ident, $accessor:ident) => {{
                let views = parts
                    .iter()
                    .map(|p| {
                        p.$accessor().map(|a| a.view()).ok_or_else(|| {
                            StackError::Shape(format!(
                                "cannot concatenate {} with {}",
                                first.data_type(),
                                p.data_type()
                            ))
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                VolumeData::$variant(concatenate(Axis(0), &views)?)
            }};
        }

        Ok(match first {
            VolumeData::U16(_) => join!(U16, as_u16),
            VolumeData::U8(_) => join!(U8, as_u8),
            VolumeData::F32(_) => join!(F32, as_f32),
        })
    }
}

fn standard<T: Clone>(a: Array5<T>) -> Array5<T> {
    if a.is_standard_layout() {
        a
    } else {
        a.as_standard_layout().into_owned()
    }
}

fn range_of<T: Copy + ToPrimitive>(a: ArrayView5<'_, T>) -> Option<ValueRange> {
    a.iter()
        .filter_map(|v| v.to_f64())
        .fold(None, |acc: Option<(f64, f64)>, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
        .map(|(lo, hi)| ValueRange::new(lo, hi))
}
