//! Chunked export into memory and chunk-store sinks

mod common;

use common::{write_stack, Geometry};
use scape_stack::{
    export_series, export_volume, ChunkStore, ChunkStoreSink, CompressionMethod, Conversion,
    DataType, ExportOptions, MemorySink, ReadOptions, StackError, VirtualStack,
};
use tempfile::TempDir;

fn open_scenario(dir: &TempDir) -> VirtualStack {
    VirtualStack::open(write_stack(dir.path(), "scenario.3DU16", &Geometry::scenario())).unwrap()
}

#[test]
fn chunks_cover_the_series() {
    let temp_dir = TempDir::new().unwrap();
    let stack = open_scenario(&temp_dir);
    let full = stack
        .get_volume_range(0, 10, &ReadOptions::new().interchange())
        .unwrap();

    for k in [1, 3, 4, 10, 11, 50] {
        let chunks = stack.chunks(k, Conversion::Native).unwrap();
        assert_eq!(chunks.len(), (11 + k - 1) / k);

        let batches: Vec<_> = chunks.map(|b| b.unwrap()).collect();
        assert!(batches.iter().all(|b| b.frames() <= k));
        assert_eq!(batches.first().unwrap().start, 0);
        assert_eq!(batches.last().unwrap().end, 10);

        let parts: Vec<_> = batches.into_iter().map(|b| b.data).collect();
        assert_eq!(scape_stack::VolumeData::concatenate(&parts).unwrap(), full);
    }
}

#[test]
fn chunks_apply_conversion_in_interchange_order() {
    let temp_dir = TempDir::new().unwrap();
    let stack = open_scenario(&temp_dir);

    let mut chunks = stack.chunks(4, Conversion::U8).unwrap();
    assert_eq!(chunks.data_type(), DataType::U8);

    let batch = chunks.next().unwrap().unwrap();
    assert_eq!((batch.start, batch.end), (0, 3));
    assert_eq!(batch.data.shape(), [4, 3, 2, 5, 7]);

    let expected = stack
        .get_volume_range(0, 3, &ReadOptions::new().with_conversion(Conversion::U8).interchange())
        .unwrap();
    assert_eq!(batch.data, expected);
}

#[test]
fn zero_chunk_size_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let stack = open_scenario(&temp_dir);

    assert!(matches!(
        stack.chunks(0, Conversion::Native),
        Err(StackError::InvalidChunkSize(0))
    ));

    let mut sink = MemorySink::new();
    let options = ExportOptions::new().with_chunk_size(0);
    assert!(export_series(&stack, &options, &mut sink).is_err());
    assert!(sink.descriptor.is_none());
}

#[test]
fn export_series_into_memory() {
    let temp_dir = TempDir::new().unwrap();
    let stack = open_scenario(&temp_dir);

    let mut sink = MemorySink::new();
    let options = ExportOptions::new()
        .with_chunk_size(4)
        .with_conversion(Conversion::U8);
    let summary = export_series(&stack, &options, &mut sink).unwrap();

    assert_eq!(summary.batches, 3);
    assert_eq!(summary.frames, 11);
    assert_eq!(summary.bytes, 11 * 2 * 3 * 5 * 7);
    assert!(sink.finished);

    let descriptor = sink.descriptor.as_ref().unwrap();
    assert_eq!(descriptor.shape, [11, 3, 2, 5, 7]);
    assert_eq!(descriptor.data_type, DataType::U8);
    assert_eq!(descriptor.hyperstack().axes, "TZCYX");
    assert_eq!(descriptor.hyperstack().spacing, 0.9);

    let expected = stack
        .get_volume_range(0, 10, &ReadOptions::new().with_conversion(Conversion::U8).interchange())
        .unwrap();
    assert_eq!(sink.concatenate().unwrap(), expected);
}

#[test]
fn unrecognized_conversion_exports_native_samples() {
    let temp_dir = TempDir::new().unwrap();
    let stack = open_scenario(&temp_dir);

    let mut sink = MemorySink::new();
    let options = ExportOptions::new().with_conversion(Conversion::from_key("float16"));
    let summary = export_series(&stack, &options, &mut sink).unwrap();

    assert_eq!(summary.batches, 2);
    assert_eq!(sink.descriptor.as_ref().unwrap().data_type, DataType::U16);
    assert_eq!(sink.concatenate().unwrap().data_type(), DataType::U16);
}

#[test]
fn export_single_volume() {
    let temp_dir = TempDir::new().unwrap();
    let stack = open_scenario(&temp_dir);

    let mut sink = MemorySink::new();
    let summary = export_volume(&stack, 7, &Conversion::F32, &mut sink).unwrap();
    assert_eq!(summary.frames, 1);

    let descriptor = sink.descriptor.as_ref().unwrap();
    assert_eq!(descriptor.shape, [1, 3, 2, 5, 7]);
    assert_eq!(descriptor.data_type, DataType::F32);
    assert_eq!((sink.batches[0].start, sink.batches[0].end), (7, 7));

    assert!(export_volume(&stack, 11, &Conversion::Native, &mut MemorySink::new())
        .unwrap_err()
        .is_index_error());
}

#[test]
fn export_into_chunk_store() {
    let temp_dir = TempDir::new().unwrap();
    let stack = open_scenario(&temp_dir);
    let root = temp_dir.path().join("scenario.store");

    for method in [
        CompressionMethod::None,
        CompressionMethod::Deflate,
        CompressionMethod::RLE,
        CompressionMethod::Zstd,
    ] {
        let mut sink = ChunkStoreSink::new(&root);
        let options = ExportOptions::new()
            .with_chunk_size(5)
            .with_compression(method);
        export_series(&stack, &options, &mut sink).unwrap();

        let store = ChunkStore::open(&root).unwrap();
        assert_eq!(store.len(), 3);
        assert_eq!(store.metadata().descriptor.compression, method);
        assert!(store.metadata().complete);

        let expected = stack
            .get_volume_range(0, 10, &ReadOptions::new().interchange())
            .unwrap();
        assert_eq!(store.read_all().unwrap(), expected);
    }
}
