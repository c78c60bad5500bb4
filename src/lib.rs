//! scape-stack - 3DU16 volumetric container reader
//!
//! Memory-mapped, random-access decoding of the time-series volumes stored in
//! 3DU16 microscopy containers, with chunked export for conversion into
//! interchange formats.
//!
//! # Features
//!
//! - Single-volume and frame-range retrieval as `ndarray` arrays
//! - TCZYX file order or TZCYX interchange order
//! - Lookup-table intensity conversion to u8 or normalized f32
//! - Bounded-memory export through the [`VolumeSink`] trait
//! - A compressed on-disk chunk store sink (Deflate, Zstd, RLE)
//!
//! # Example
//!
//! ```rust,no_run
//! use scape_stack::{Conversion, ReadOptions, VirtualStack};
//!
//! # fn example() -> scape_stack::Result<()> {
//! let stack = VirtualStack::open("/data/embryo.3DU16")?;
//!
//! // (1, Z, C, Y, X) as 8-bit samples
//! let options = ReadOptions::new().with_conversion(Conversion::U8).interchange();
//! let volume = stack.get_volume(3, &options)?;
//! assert_eq!(volume.frames(), 1);
//! # Ok(())
//! # }
//! ```

pub mod compression;
pub mod convert;
pub mod error;
pub mod export;
pub mod header;
pub mod layout;
pub mod metadata;
pub mod stack;
pub mod store;
pub mod types;
pub mod utils;

// Re-exports
pub use compression::{CompressionLevel, CompressionMethod, Compressor};
pub use convert::Conversion;
pub use error::{Result, StackError};
pub use export::{
    export_series, export_volume, Batch, Chunks, ExportOptions, ExportSummary, MemorySink,
    VolumeSink, DEFAULT_CHUNK_SIZE,
};
pub use header::ImageHeader;
pub use metadata::{ExportDescriptor, HyperstackMetadata};
pub use stack::{ReadOptions, VirtualStack};
pub use store::{ChunkStore, ChunkStoreSink};
pub use types::{AxisOrder, DataType, ValueRange, VolumeData};

/// Version of the scape-stack implementation
pub const SCAPE_STACK_VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!SCAPE_STACK_VERSION.is_empty());
    }
}
