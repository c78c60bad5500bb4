//! 3DU16 header decoding
//!
//! The container starts with a fixed 52-byte big-endian header:
//!
//! | Offset | Size | Field                  |
//! |--------|------|------------------------|
//! | 0      | 4    | unused (i32)           |
//! | 4      | 8    | z scale (f64)          |
//! | 12     | 8    | y scale (f64)          |
//! | 20     | 8    | x scale (f64)          |
//! | 28     | 4    | unused (i32)           |
//! | 32     | 20   | T, C, Z, Y, X (5 x i32) |

use crate::error::{Result, StackError};
use crate::layout::{GAP, HEADER_SIZE};
use byteorder::{BigEndian, ReadBytesExt};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{Cursor, Read};
use std::path::Path;
use tracing::warn;

/// File extension of the container, compared case-insensitively
pub const EXTENSION: &str = "3du16";

/// Geometry of a 3DU16 file
///
/// All byte-layout quantities are derived from the stored fields on demand.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImageHeader {
    pub z_scale: f64,
    pub y_scale: f64,
    pub x_scale: f64,
    pub n_frame: usize,
    pub n_channel: usize,
    pub depth: usize,
    pub height: usize,
    pub width: usize,
}

impl ImageHeader {
    /// Read and decode the header of the file at `path`
    ///
    /// Only the first 52 bytes are read and the file is closed again before
    /// returning.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let filename = display_name(path);

        if !has_container_extension(path) {
            return Err(StackError::WrongFileKind { filename });
        }

        let file = File::open(path)?;
        let mut raw = Vec::with_capacity(HEADER_SIZE);
        file.take(HEADER_SIZE as u64).read_to_end(&mut raw)?;

        Self::from_bytes(&raw).map_err(|e| match e {
            StackError::InvalidFormat { reason, .. } => StackError::InvalidFormat { filename, reason },
            other => other,
        })
    }

    /// Decode a header from its raw bytes
    ///
    /// Bytes beyond the first 52 are ignored.
    pub fn from_bytes(raw: &[u8]) -> Result<Self> {
        if raw.len() < HEADER_SIZE {
            return Err(invalid(format!(
                "header needs {} bytes, got {}",
                HEADER_SIZE,
                raw.len()
            )));
        }

        let mut cursor = Cursor::new(&raw[..HEADER_SIZE]);
        let _ = cursor.read_i32::<BigEndian>()?;
        let z_scale = cursor.read_f64::<BigEndian>()?;
        let y_scale = cursor.read_f64::<BigEndian>()?;
        let x_scale = cursor.read_f64::<BigEndian>()?;
        let _ = cursor.read_i32::<BigEndian>()?;

        let mut dims = [0usize; 5];
        for (slot, name) in dims
            .iter_mut()
            .zip(["n_frame", "n_channel", "depth", "height", "width"])
        {
            let value = cursor.read_i32::<BigEndian>()?;
            if value <= 0 {
                return Err(invalid(format!("{} must be positive, got {}", name, value)));
            }
            *slot = value as usize;
        }
        let [n_frame, n_channel, depth, height, width] = dims;

        // Every offset and length in `layout` is bounded by the file length.
        let file_len = [n_channel, depth, height, width, 2]
            .into_iter()
            .try_fold(1usize, |acc, d| acc.checked_mul(d))
            .and_then(|payload| payload.checked_add(GAP))
            .and_then(|bytes_per_volume| bytes_per_volume.checked_mul(n_frame))
            .and_then(|body| body.checked_add(HEADER_SIZE));
        if file_len.is_none() {
            return Err(invalid(String::from(
                "geometry overflows addressable size",
            )));
        }

        for (name, scale) in [("z", z_scale), ("y", y_scale), ("x", x_scale)] {
            if !(scale.is_finite() && scale > 0.0) {
                warn!(axis = name, scale, "3DU16 header carries a non-positive voxel scale");
            }
        }

        Ok(Self {
            z_scale,
            y_scale,
            x_scale,
            n_frame,
            n_channel,
            depth,
            height,
            width,
        })
    }

    /// Bytes in one row of samples
    pub fn bytes_per_row(&self) -> usize {
        self.width * 2
    }

    /// Bytes in one YX plane
    pub fn bytes_per_plane(&self) -> usize {
        self.height * self.width * 2
    }

    /// Bytes in one ZYX stack of a single channel
    pub fn bytes_per_stack(&self) -> usize {
        self.height * self.width * 2 * self.depth
    }

    /// Samples in one volume (all channels)
    pub fn pixels_per_volume(&self) -> usize {
        self.n_channel * self.depth * self.height * self.width
    }

    /// Bytes occupied by one frame on disk, including its leading gap
    pub fn bytes_per_volume(&self) -> usize {
        self.pixels_per_volume() * 2 + GAP
    }

    /// Expected length of a complete file
    pub fn expected_file_len(&self) -> usize {
        HEADER_SIZE + self.n_frame * self.bytes_per_volume()
    }

    /// Logical shape in TCZYX order
    pub fn shape(&self) -> [usize; 5] {
        [
            self.n_frame,
            self.n_channel,
            self.depth,
            self.height,
            self.width,
        ]
    }

    /// Shape of one frame in CZYX order
    pub fn volume_shape(&self) -> [usize; 4] {
        [self.n_channel, self.depth, self.height, self.width]
    }

    /// Whole-series shape in interchange (TZCYX) order
    pub fn interchange_shape(&self) -> [usize; 5] {
        [
            self.n_frame,
            self.depth,
            self.n_channel,
            self.height,
            self.width,
        ]
    }

    /// Voxel scales in z, y, x order
    pub fn scales(&self) -> (f64, f64, f64) {
        (self.z_scale, self.y_scale, self.x_scale)
    }
}

/// Check the `.3du16` suffix without touching the file
pub fn has_container_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(EXTENSION))
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn invalid(reason: String) -> StackError {
    StackError::InvalidFormat {
        filename: String::from("<bytes>"),
        reason,
    }
}
