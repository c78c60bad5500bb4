//! Export metadata handed to interchange writers

use crate::compression::CompressionMethod;
use crate::header::ImageHeader;
use crate::types::{AxisOrder, DataType};
use serde::{Deserialize, Serialize};

/// Physical unit of the voxel scales stored in 3DU16 headers
pub const PHYSICAL_UNIT: &str = "um";

/// Name of the dataset in HDF5-style outputs
pub const DATASET_NAME: &str = "data";

/// Hyperstack metadata in the shape TIFF writers expect
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HyperstackMetadata {
    /// Pixels per unit along x and y
    pub resolution: (f64, f64),
    /// Distance between z planes
    pub spacing: f64,
    pub unit: String,
    pub axes: String,
    pub imagej: bool,
}

/// Everything a sink needs to know before the first batch arrives
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportDescriptor {
    /// Dataset name for container formats
    pub dataset: String,
    /// Full output shape in interchange (TZCYX) order
    pub shape: [usize; 5],
    pub data_type: DataType,
    pub axis_order: AxisOrder,
    /// Voxel scales in z, y, x order
    pub scales: (f64, f64, f64),
    pub unit: String,
    /// Compression a sink should apply, if it compresses at all
    pub compression: CompressionMethod,
    /// Upper bound on frames per batch
    pub chunk_size: usize,
}

impl ExportDescriptor {
    /// Describe an export of `n_frames` frames of `header`
    pub fn new(header: &ImageHeader, n_frames: usize, data_type: DataType) -> Self {
        let [_, z, c, y, x] = header.interchange_shape();
        Self {
            dataset: DATASET_NAME.to_string(),
            shape: [n_frames, z, c, y, x],
            data_type,
            axis_order: AxisOrder::Interchange,
            scales: header.scales(),
            unit: PHYSICAL_UNIT.to_string(),
            compression: CompressionMethod::None,
            chunk_size: n_frames.max(1),
        }
    }

    pub fn with_compression(mut self, compression: CompressionMethod) -> Self {
        self.compression = compression;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Number of frames in the export
    pub fn frames(&self) -> usize {
        self.shape[0]
    }

    /// Shape of one frame in ZCYX order
    pub fn frame_shape(&self) -> [usize; 4] {
        [self.shape[1], self.shape[2], self.shape[3], self.shape[4]]
    }

    /// Uncompressed size of the full export in bytes
    pub fn total_size_bytes(&self) -> usize {
        self.shape.iter().product::<usize>() * self.data_type.size_in_bytes()
    }

    /// Metadata for hyperstack TIFF writers
    pub fn hyperstack(&self) -> HyperstackMetadata {
        let (z, y, x) = self.scales;
        HyperstackMetadata {
            resolution: (1.0 / x, 1.0 / y),
            spacing: z,
            unit: self.unit.clone(),
            axes: self.axis_order.tag().to_string(),
            imagej: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_header() -> ImageHeader {
        ImageHeader {
            z_scale: 0.9,
            y_scale: 0.5,
            x_scale: 0.25,
            n_frame: 11,
            n_channel: 2,
            depth: 3,
            height: 5,
            width: 7,
        }
    }

    #[test]
    fn test_descriptor() {
        let descriptor = ExportDescriptor::new(&create_test_header(), 11, DataType::U8)
            .with_compression(CompressionMethod::Zstd)
            .with_chunk_size(4);

        assert_eq!(descriptor.shape, [11, 3, 2, 5, 7]);
        assert_eq!(descriptor.frame_shape(), [3, 2, 5, 7]);
        assert_eq!(descriptor.frames(), 11);
        assert_eq!(descriptor.total_size_bytes(), 11 * 3 * 2 * 5 * 7);
        assert_eq!(descriptor.dataset, "data");
        assert_eq!(descriptor.chunk_size, 4);
    }

    #[test]
    fn test_hyperstack_metadata() {
        let meta = ExportDescriptor::new(&create_test_header(), 1, DataType::U16).hyperstack();
        assert_eq!(meta.resolution, (4.0, 2.0));
        assert_eq!(meta.spacing, 0.9);
        assert_eq!(meta.unit, "um");
        assert_eq!(meta.axes, "TZCYX");
        assert!(meta.imagej);
    }

    #[test]
    fn test_descriptor_json() {
        let descriptor = ExportDescriptor::new(&create_test_header(), 2, DataType::F32);
        let json = serde_json::to_string(&descriptor).unwrap();
        let back: ExportDescriptor = serde_json::from_str(&json).unwrap();
        assert_eq!(back, descriptor);
    }
}
