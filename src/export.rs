//! Chunked export - streams a whole series into a sink a few frames at a time

use crate::compression::CompressionMethod;
use crate::convert::Conversion;
use crate::error::{Result, StackError};
use crate::layout::chunk_ranges;
use crate::metadata::ExportDescriptor;
use crate::stack::{ReadOptions, VirtualStack};
use crate::types::{DataType, VolumeData};
use crate::utils::format_bytes;
use std::vec;
use tracing::{debug, info};

/// Frames per batch when the caller has no preference
pub const DEFAULT_CHUNK_SIZE: usize = 10;

/// A run of consecutive frames in interchange (TZCYX) order
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    /// First frame, inclusive
    pub start: usize,
    /// Last frame, inclusive
    pub end: usize,
    pub data: VolumeData,
}

impl Batch {
    pub fn frames(&self) -> usize {
        self.end - self.start + 1
    }
}

/// Lazy, single-pass iterator over the batches covering a whole series
///
/// Each call to `next` reads exactly one batch from the mapping. Start over by
/// creating a new iterator.
pub struct Chunks<'a> {
    stack: &'a VirtualStack,
    ranges: vec::IntoIter<(usize, usize)>,
    options: ReadOptions,
}

impl<'a> Chunks<'a> {
    pub fn new(stack: &'a VirtualStack, chunk_size: usize, conversion: Conversion) -> Result<Self> {
        if chunk_size == 0 {
            return Err(StackError::InvalidChunkSize(chunk_size));
        }

        Ok(Self {
            stack,
            ranges: chunk_ranges(stack.len(), chunk_size).into_iter(),
            options: ReadOptions::new().with_conversion(conversion).interchange(),
        })
    }

    /// Element type of the batches this iterator yields
    pub fn data_type(&self) -> DataType {
        self.options.conversion.output_type()
    }
}

impl Iterator for Chunks<'_> {
    type Item = Result<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        let (start, end) = self.ranges.next()?;
        Some(
            self.stack
                .get_volume_range(start, end, &self.options)
                .map(|data| Batch { start, end, data }),
        )
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.ranges.size_hint()
    }
}

impl ExactSizeIterator for Chunks<'_> {}

/// Destination of an export, e.g. a TIFF or HDF5 writer
///
/// `begin` is called once, then `write_batch` for each batch in frame order,
/// then `finish`.
pub trait VolumeSink {
    fn begin(&mut self, descriptor: &ExportDescriptor) -> Result<()>;

    fn write_batch(&mut self, batch: &Batch) -> Result<()>;

    fn finish(&mut self) -> Result<()>;
}

/// Export settings
#[derive(Debug, Clone, PartialEq)]
pub struct ExportOptions {
    pub chunk_size: usize,
    pub conversion: Conversion,
    pub compression: CompressionMethod,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            conversion: Conversion::Native,
            compression: CompressionMethod::None,
        }
    }
}

impl ExportOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_conversion(mut self, conversion: Conversion) -> Self {
        self.conversion = conversion;
        self
    }

    pub fn with_compression(mut self, compression: CompressionMethod) -> Self {
        self.compression = compression;
        self
    }
}

/// What an export wrote
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportSummary {
    pub batches: usize,
    pub frames: usize,
    pub bytes: usize,
}

impl ExportSummary {
    pub fn summary(&self) -> String {
        format!(
            "{} frames in {} batches, {} uncompressed",
            self.frames,
            self.batches,
            format_bytes(self.bytes)
        )
    }
}

/// Stream every frame of `stack` into `sink`
pub fn export_series(
    stack: &VirtualStack,
    options: &ExportOptions,
    sink: &mut dyn VolumeSink,
) -> Result<ExportSummary> {
    let chunks = Chunks::new(stack, options.chunk_size, options.conversion.clone())?;
    let descriptor = ExportDescriptor::new(stack.header(), stack.len(), chunks.data_type())
        .with_compression(options.compression)
        .with_chunk_size(options.chunk_size);

    info!(
        path = %stack.path().display(),
        shape = ?descriptor.shape,
        data_type = %descriptor.data_type,
        batches = chunks.len(),
        "exporting series"
    );

    sink.begin(&descriptor)?;

    let mut summary = ExportSummary {
        batches: 0,
        frames: 0,
        bytes: 0,
    };
    for batch in chunks {
        let batch = batch?;
        debug!(start = batch.start, end = batch.end, "writing batch");
        sink.write_batch(&batch)?;
        summary.batches += 1;
        summary.frames += batch.frames();
        summary.bytes += batch.data.size_in_bytes();
    }

    sink.finish()?;
    info!("export finished: {}", summary.summary());
    Ok(summary)
}

/// Write the single frame `index` of `stack` into `sink`
pub fn export_volume(
    stack: &VirtualStack,
    index: usize,
    conversion: &Conversion,
    sink: &mut dyn VolumeSink,
) -> Result<ExportSummary> {
    let options = ReadOptions::new()
        .with_conversion(conversion.clone())
        .interchange();
    let data = stack.get_volume(index, &options)?;
    let descriptor = ExportDescriptor::new(stack.header(), 1, data.data_type());

    sink.begin(&descriptor)?;
    let batch = Batch {
        start: index,
        end: index,
        data,
    };
    sink.write_batch(&batch)?;
    sink.finish()?;

    Ok(ExportSummary {
        batches: 1,
        frames: 1,
        bytes: batch.data.size_in_bytes(),
    })
}

/// Sink that keeps everything in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    pub descriptor: Option<ExportDescriptor>,
    pub batches: Vec<Batch>,
    pub finished: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All received batches joined along the frame axis
    pub fn concatenate(&self) -> Result<VolumeData> {
        let parts: Vec<VolumeData> = self.batches.iter().map(|b| b.data.clone()).collect();
        VolumeData::concatenate(&parts)
    }
}

impl VolumeSink for MemorySink {
    fn begin(&mut self, descriptor: &ExportDescriptor) -> Result<()> {
        self.descriptor = Some(descriptor.clone());
        self.batches.clear();
        self.finished = false;
        Ok(())
    }

    fn write_batch(&mut self, batch: &Batch) -> Result<()> {
        let descriptor = self
            .descriptor
            .as_ref()
            .ok_or_else(|| StackError::Sink("write_batch called before begin".to_string()))?;
        if batch.data.data_type() != descriptor.data_type {
            return Err(StackError::Sink(format!(
                "batch is {}, export declared {}",
                batch.data.data_type(),
                descriptor.data_type
            )));
        }
        self.batches.push(batch.clone());
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.finished = true;
        Ok(())
    }
}
