//! Synthetic 3DU16 files for integration tests

#![allow(dead_code)]

use byteorder::{BigEndian, WriteBytesExt};
use std::fs;
use std::path::{Path, PathBuf};

/// Geometry of a synthetic file: scales (z, y, x) and dims (T, C, Z, Y, X)
#[derive(Debug, Clone, Copy)]
pub struct Geometry {
    pub scales: (f64, f64, f64),
    pub dims: [usize; 5],
}

impl Geometry {
    pub fn scenario() -> Self {
        Self {
            scales: (0.9, 0.455, 0.455),
            dims: [11, 2, 3, 5, 7],
        }
    }

    pub fn pixels_per_volume(&self) -> usize {
        self.dims[1..].iter().product()
    }
}

/// Sample `k` (CZYX linear index) of frame `t`: a fixed pattern plus `t`
pub fn pattern(t: usize, k: usize) -> u16 {
    ((k * 37) % 1000 + t) as u16
}

/// Encode a complete file whose samples come from `sample(t, k)`
pub fn encode(geometry: &Geometry, sample: impl Fn(usize, usize) -> u16) -> Vec<u8> {
    let [t, c, z, y, x] = geometry.dims;
    let mut raw = Vec::new();

    raw.write_i32::<BigEndian>(3).unwrap();
    raw.write_f64::<BigEndian>(geometry.scales.0).unwrap();
    raw.write_f64::<BigEndian>(geometry.scales.1).unwrap();
    raw.write_f64::<BigEndian>(geometry.scales.2).unwrap();
    raw.write_i32::<BigEndian>(5).unwrap();
    for d in geometry.dims {
        raw.write_i32::<BigEndian>(d as i32).unwrap();
    }

    for frame in 0..t {
        for d in [c, z, y, x] {
            raw.write_i32::<BigEndian>(d as i32).unwrap();
        }
        for k in 0..geometry.pixels_per_volume() {
            raw.write_u16::<BigEndian>(sample(frame, k)).unwrap();
        }
    }
    raw
}

/// Write a pattern file named `name` into `dir`
pub fn write_stack(dir: &Path, name: &str, geometry: &Geometry) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, encode(geometry, pattern)).unwrap();
    path
}
