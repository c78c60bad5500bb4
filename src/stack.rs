//! Virtual stack - memory-mapped random access to the volumes of a 3DU16 file

use crate::convert::{self, Conversion};
use crate::error::{Result, StackError};
use crate::export::Chunks;
use crate::header::ImageHeader;
use crate::layout::{self, GAP, GAP_SAMPLES};
use crate::types::{AxisOrder, VolumeData};
use byteorder::{BigEndian, ByteOrder};
use memmap2::Mmap;
use ndarray::{s, Array, Array2, Array5, Axis};
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Options shared by single and range retrieval
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadOptions {
    pub conversion: Conversion,
    pub axis_order: AxisOrder,
}

impl ReadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the intensity conversion
    pub fn with_conversion(mut self, conversion: Conversion) -> Self {
        self.conversion = conversion;
        self
    }

    /// Set the intensity conversion from a free-form key
    pub fn with_conversion_key(self, key: &str) -> Self {
        self.with_conversion(Conversion::from_key(key))
    }

    /// Set the axis order of returned batches
    pub fn with_axis_order(mut self, axis_order: AxisOrder) -> Self {
        self.axis_order = axis_order;
        self
    }

    /// Return batches in TZCYX order
    pub fn interchange(self) -> Self {
        self.with_axis_order(AxisOrder::Interchange)
    }
}

/// An open 3DU16 file
///
/// The mapping and the file handle are released when the stack is dropped or
/// [closed](Self::close). Every volume handed out is an owned copy.
pub struct VirtualStack {
    path: PathBuf,
    header: ImageHeader,
    mmap: Mmap,
    _file: File,
}

impl VirtualStack {
    /// Parse the header of `path` and map the whole file read-only
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let header = ImageHeader::from_path(&path)?;

        let file = File::open(&path)?;
        // SAFETY: the mapping is read-only and 3DU16 files are not written
        // while they are being read.
        let mmap = unsafe { Mmap::map(&file)? };

        debug!(
            path = %path.display(),
            shape = ?header.shape(),
            scales = ?header.scales(),
            mapped = mmap.len(),
            "opened 3DU16 stack"
        );

        Ok(Self {
            path,
            header,
            mmap,
            _file: file,
        })
    }

    /// Release the mapping and the file handle
    pub fn close(self) {
        debug!(path = %self.path.display(), "closing 3DU16 stack");
    }

    pub fn header(&self) -> &ImageHeader {
        &self.header
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Shape in TCZYX order
    pub fn shape(&self) -> [usize; 5] {
        self.header.shape()
    }

    /// Number of frames
    pub fn len(&self) -> usize {
        self.header.n_frame
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Length of the mapped file in bytes
    pub fn mapped_len(&self) -> usize {
        self.mmap.len()
    }

    /// Read frame `index` as a batch of one
    ///
    /// The result has shape (1, C, Z, Y, X), or (1, Z, C, Y, X) in interchange
    /// order.
    pub fn get_volume(&self, index: usize, options: &ReadOptions) -> Result<VolumeData> {
        self.check_index("index", index)?;

        let raw = self.slice(
            layout::offset_of(&self.header, index),
            layout::volume_payload_len(&self.header),
        )?;

        let mut samples = vec![0u16; self.header.pixels_per_volume()];
        BigEndian::read_u16_into(raw, &mut samples);

        let stack = Array::from_shape_vec(self.header.volume_shape(), samples)?.insert_axis(Axis(0));

        Ok(finish(stack, options))
    }

    /// Read frames `start..=end` as one batch
    ///
    /// Endpoints are an unordered pair: `(7, 2)` reads the same frames as
    /// `(2, 7)`.
    pub fn get_volume_range(
        &self,
        start: usize,
        end: usize,
        options: &ReadOptions,
    ) -> Result<VolumeData> {
        self.check_index("start", start)?;
        self.check_index("end", end)?;

        let (start, end) = if start > end { (end, start) } else { (start, end) };
        let n = end - start + 1;

        let raw = self.slice(
            layout::range_offset_of(&self.header, start),
            layout::range_len(&self.header, n),
        )?;

        let mut samples = vec![0u16; raw.len() / 2];
        BigEndian::read_u16_into(raw, &mut samples);

        // One row per frame; the leading gap slots restate the header.
        let frames = Array2::from_shape_vec((n, samples.len() / n), samples)?;
        let payload: Vec<u16> = frames.slice(s![.., GAP_SAMPLES..]).iter().copied().collect();

        let [c, z, y, x] = self.header.volume_shape();
        let stack = Array::from_shape_vec([n, c, z, y, x], payload)?;

        Ok(finish(stack, options))
    }

    /// The (C, Z, Y, X) restated in the gap preceding frame `index`
    ///
    /// Diagnostic only; decoding never relies on it.
    pub fn frame_header(&self, index: usize) -> Result<[i32; 4]> {
        self.check_index("index", index)?;

        let raw = self.slice(layout::gap_offset_of(&self.header, index), GAP)?;
        let mut fields = [0i32; 4];
        BigEndian::read_i32_into(raw, &mut fields);
        Ok(fields)
    }

    /// Iterate over the whole series in batches of at most `chunk_size` frames
    ///
    /// Batches are always in interchange (TZCYX) order.
    pub fn chunks(&self, chunk_size: usize, conversion: Conversion) -> Result<Chunks<'_>> {
        Chunks::new(self, chunk_size, conversion)
    }

    fn check_index(&self, axis: &'static str, index: usize) -> Result<()> {
        if index >= self.header.n_frame {
            return Err(StackError::IndexOutOfRange {
                axis,
                index,
                frames: self.header.n_frame,
            });
        }
        Ok(())
    }

    fn slice(&self, offset: usize, len: usize) -> Result<&[u8]> {
        offset
            .checked_add(len)
            .and_then(|end| self.mmap.get(offset..end))
            .ok_or(StackError::Truncated {
                offset,
                len,
                file_len: self.mmap.len(),
            })
    }
}

impl std::fmt::Debug for VirtualStack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VirtualStack")
            .field("path", &self.path)
            .field("header", &self.header)
            .field("mapped_len", &self.mmap.len())
            .finish()
    }
}

fn finish(stack: Array5<u16>, options: &ReadOptions) -> VolumeData {
    convert::apply(stack, &options.conversion).into_axis_order(options.axis_order)
}
