//! Volume addressing - byte offsets of frames inside a 3DU16 file
//!
//! Every frame on disk is a `GAP`-byte block restating (C, Z, Y, X) as four
//! big-endian i32, followed by C·Z·Y·X big-endian u16 samples. Nothing here
//! performs I/O or bounds checks.

use crate::header::ImageHeader;

/// Size of the fixed file header in bytes
pub const HEADER_SIZE: usize = 52;

/// Per-frame padding preceding each payload, in bytes
pub const GAP: usize = 16;

/// The per-frame padding measured in u16 sample slots
pub const GAP_SAMPLES: usize = GAP / 2;

/// Absolute offset of the payload of frame `index`, past its gap
pub fn offset_of(header: &ImageHeader, index: usize) -> usize {
    HEADER_SIZE + index * header.bytes_per_volume() + GAP
}

/// Absolute offset of the gap-inclusive block starting at frame `start`
pub fn range_offset_of(header: &ImageHeader, start: usize) -> usize {
    HEADER_SIZE + start * header.bytes_per_volume()
}

/// Absolute offset of the gap of frame `index`
pub fn gap_offset_of(header: &ImageHeader, index: usize) -> usize {
    range_offset_of(header, index)
}

/// Payload bytes of a single frame
pub fn volume_payload_len(header: &ImageHeader) -> usize {
    header.bytes_per_volume() - GAP
}

/// Bytes spanned by `n_frames` consecutive frames, gaps included
pub fn range_len(header: &ImageHeader, n_frames: usize) -> usize {
    n_frames * header.bytes_per_volume()
}

/// Split `[0, n_frames)` into inclusive `(start, end)` runs of at most
/// `chunk_size` frames
///
/// Returns an empty list when `chunk_size` is zero.
pub fn chunk_ranges(n_frames: usize, chunk_size: usize) -> Vec<(usize, usize)> {
    if chunk_size == 0 {
        return Vec::new();
    }

    (0..n_frames)
        .step_by(chunk_size)
        .map(|start| (start, (start + chunk_size - 1).min(n_frames - 1)))
        .collect()
}
