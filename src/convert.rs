//! Intensity conversion of native 16-bit samples through lookup tables

use crate::types::{DataType, VolumeData};
use ndarray::Array5;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;
use tracing::warn;

/// Number of entries in each lookup table, one per u16 value
pub const LUT_LEN: usize = 1 << 16;

/// Requested output sample domain
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Conversion {
    /// Keep the native u16 samples
    #[default]
    Native,
    /// `floor(v / 256)` as u8
    U8,
    /// `v / 65535` as f32
    F32,
    /// A key nobody understands; passes data through with a warning
    Unrecognized(String),
}

impl Conversion {
    /// Interpret a free-form conversion key
    ///
    /// Never fails: unknown keys become [`Conversion::Unrecognized`].
    pub fn from_key(key: &str) -> Self {
        match key {
            "u16" => Conversion::Native,
            "u8" => Conversion::U8,
            "f32" => Conversion::F32,
            other => Conversion::Unrecognized(other.to_string()),
        }
    }

    /// Like [`Self::from_key`], treating `None` as no conversion
    pub fn from_optional_key(key: Option<&str>) -> Self {
        key.map(Self::from_key).unwrap_or_default()
    }

    /// Element type produced by this conversion
    pub fn output_type(&self) -> DataType {
        match self {
            Conversion::U8 => DataType::U8,
            Conversion::F32 => DataType::F32,
            Conversion::Native | Conversion::Unrecognized(_) => DataType::U16,
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, Conversion::Unrecognized(_))
    }
}

impl fmt::Display for Conversion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Conversion::Native => f.write_str("u16"),
            Conversion::U8 => f.write_str("u8"),
            Conversion::F32 => f.write_str("f32"),
            Conversion::Unrecognized(key) => f.write_str(key),
        }
    }
}

/// u16 → u8 table, `floor(i / 256)`
pub fn u8_table() -> &'static [u8] {
    static TABLE: OnceLock<Vec<u8>> = OnceLock::new();
    TABLE.get_or_init(|| (0..LUT_LEN).map(|i| (i / 256) as u8).collect())
}

/// u16 → f32 table, evenly spaced over [0, 1] inclusive
pub fn f32_table() -> &'static [f32] {
    static TABLE: OnceLock<Vec<f32>> = OnceLock::new();
    TABLE.get_or_init(|| {
        let last = (LUT_LEN - 1) as f64;
        (0..LUT_LEN).map(|i| (i as f64 / last) as f32).collect()
    })
}

/// Apply `conversion` to a batch of native samples
pub fn apply(data: Array5<u16>, conversion: &Conversion) -> VolumeData {
    match conversion {
        Conversion::Native => VolumeData::U16(data),
        Conversion::U8 => {
            let table = u8_table();
            VolumeData::U8(data.mapv(|v| table[v as usize]))
        }
        Conversion::F32 => {
            let table = f32_table();
            VolumeData::F32(data.mapv(|v| table[v as usize]))
        }
        Conversion::Unrecognized(key) => {
            warn!(
                conversion = %key,
                "Unsupported conversion: {}, returning native uint16 samples",
                key
            );
            VolumeData::U16(data)
        }
    }
}
