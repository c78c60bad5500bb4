//! Chunk store - an on-disk sink laid out like a chunked HDF5 dataset
//!
//! ```text
//! <root>/metadata.json
//! <root>/chunks/00000000.zst
//! <root>/chunks/00000010.zst
//! ...
//! ```
//!
//! Each chunk file holds one batch of consecutive frames in TZCYX order,
//! little-endian, compressed with the method named in the metadata.

use crate::compression::{get_compressor, CompressionLevel};
use crate::error::{Result, StackError};
use crate::export::{Batch, VolumeSink};
use crate::metadata::ExportDescriptor;
use crate::types::{ValueRange, VolumeData};
use crate::utils::chunk_path;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const METADATA_FILE: &str = "metadata.json";

/// Store layout version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreVersion {
    pub major: u16,
    pub minor: u16,
}

impl StoreVersion {
    pub const CURRENT: Self = Self { major: 1, minor: 0 };

    pub fn is_compatible(&self, other: &Self) -> bool {
        self.major == other.major
    }
}

impl Default for StoreVersion {
    fn default() -> Self {
        Self::CURRENT
    }
}

/// One stored batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub start: usize,
    pub end: usize,
    /// Path relative to the store root
    pub path: String,
    pub compressed_size: usize,
    pub uncompressed_size: usize,
    pub value_range: Option<ValueRange>,
}

impl ChunkRecord {
    pub fn frames(&self) -> usize {
        self.end - self.start + 1
    }

    pub fn compression_ratio(&self) -> f64 {
        if self.compressed_size == 0 {
            0.0
        } else {
            self.uncompressed_size as f64 / self.compressed_size as f64
        }
    }
}

/// Contents of `metadata.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreMetadata {
    pub version: StoreVersion,
    pub descriptor: ExportDescriptor,
    pub compression_level: CompressionLevel,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub complete: bool,
    pub chunks: Vec<ChunkRecord>,
}

impl StoreMetadata {
    fn new(descriptor: ExportDescriptor, compression_level: CompressionLevel) -> Self {
        let now = Utc::now();
        Self {
            version: StoreVersion::default(),
            descriptor,
            compression_level,
            created_at: now,
            modified_at: now,
            complete: false,
            chunks: Vec::new(),
        }
    }

    /// Frames stored so far
    pub fn frames_written(&self) -> usize {
        self.chunks.iter().map(ChunkRecord::frames).sum()
    }

    fn touch(&mut self) {
        self.modified_at = Utc::now();
    }
}

/// [`VolumeSink`] writing a chunk store directory
pub struct ChunkStoreSink {
    root: PathBuf,
    level: CompressionLevel,
    metadata: Option<StoreMetadata>,
}

impl ChunkStoreSink {
    /// Prepare a store at `root`; nothing is written until the export begins
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            level: CompressionLevel::default(),
            metadata: None,
        }
    }

    pub fn with_level(mut self, level: CompressionLevel) -> Self {
        self.level = level;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn metadata(&self) -> Option<&StoreMetadata> {
        self.metadata.as_ref()
    }

    fn write_metadata(&self, metadata: &StoreMetadata) -> Result<()> {
        let json = serde_json::to_vec_pretty(metadata)?;
        fs::write(self.root.join(METADATA_FILE), json)?;
        Ok(())
    }
}

impl VolumeSink for ChunkStoreSink {
    fn begin(&mut self, descriptor: &ExportDescriptor) -> Result<()> {
        fs::create_dir_all(self.root.join("chunks"))?;

        let metadata = StoreMetadata::new(descriptor.clone(), self.level);
        self.write_metadata(&metadata)?;
        self.metadata = Some(metadata);
        Ok(())
    }

    fn write_batch(&mut self, batch: &Batch) -> Result<()> {
        let metadata = self
            .metadata
            .as_mut()
            .ok_or_else(|| StackError::Sink("write_batch called before begin".to_string()))?;
        let descriptor = &metadata.descriptor;

        if batch.data.data_type() != descriptor.data_type {
            return Err(StackError::Sink(format!(
                "batch is {}, store holds {}",
                batch.data.data_type(),
                descriptor.data_type
            )));
        }

        let compressor = get_compressor(descriptor.compression, descriptor.data_type);
        let raw = batch.data.to_le_bytes();
        let compressed = compressor.compress(&raw, self.level)?;

        let path = chunk_path(batch.start, descriptor.compression);
        fs::write(self.root.join(&path), &compressed)?;

        debug!(
            path = %path,
            frames = batch.frames(),
            compressed = compressed.len(),
            uncompressed = raw.len(),
            "stored chunk"
        );

        metadata.chunks.push(ChunkRecord {
            start: batch.start,
            end: batch.end,
            path,
            compressed_size: compressed.len(),
            uncompressed_size: raw.len(),
            value_range: batch.data.value_range(),
        });
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        let mut metadata = self
            .metadata
            .take()
            .ok_or_else(|| StackError::Sink("finish called before begin".to_string()))?;
        metadata.complete = true;
        metadata.touch();
        self.write_metadata(&metadata)?;
        self.metadata = Some(metadata);
        Ok(())
    }
}

/// Read access to a chunk store
#[derive(Debug)]
pub struct ChunkStore {
    root: PathBuf,
    metadata: StoreMetadata,
}

impl ChunkStore {
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let metadata: StoreMetadata = serde_json::from_slice(&fs::read(root.join(METADATA_FILE))?)?;

        if !metadata.version.is_compatible(&StoreVersion::CURRENT) {
            return Err(StackError::Serialization(format!(
                "unsupported store version {}.{}",
                metadata.version.major, metadata.version.minor
            )));
        }

        Ok(Self { root, metadata })
    }

    pub fn metadata(&self) -> &StoreMetadata {
        &self.metadata
    }

    /// Number of stored chunks
    pub fn len(&self) -> usize {
        self.metadata.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metadata.chunks.is_empty()
    }

    /// Decompress chunk `index`
    pub fn read_chunk(&self, index: usize) -> Result<Batch> {
        let record = self.metadata.chunks.get(index).ok_or(StackError::IndexOutOfRange {
            axis: "chunk",
            index,
            frames: self.metadata.chunks.len(),
        })?;
        let descriptor = &self.metadata.descriptor;

        let compressed = fs::read(self.root.join(&record.path))?;
        let raw = get_compressor(descriptor.compression, descriptor.data_type)
            .decompress(&compressed, Some(record.uncompressed_size))?;

        let [_, z, c, y, x] = descriptor.shape;
        let data = VolumeData::from_le_bytes(descriptor.data_type, [record.frames(), z, c, y, x], &raw)?;

        Ok(Batch {
            start: record.start,
            end: record.end,
            data,
        })
    }

    /// Every chunk joined along the frame axis
    pub fn read_all(&self) -> Result<VolumeData> {
        let parts = (0..self.len())
            .map(|i| self.read_chunk(i).map(|batch| batch.data))
            .collect::<Result<Vec<_>>>()?;
        VolumeData::concatenate(&parts)
    }
}
