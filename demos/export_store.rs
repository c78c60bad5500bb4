//! Example: Open a 3DU16 file and export it into a compressed chunk store
//!
//! Run with: cargo run --example export_store [-- path/to/file.3DU16]
//!
//! Without an argument a small synthetic file is generated first.

use anyhow::Context;
use byteorder::{BigEndian, WriteBytesExt};
use scape_stack::{
    export_series, ChunkStore, ChunkStoreSink, CompressionMethod, Conversion, ExportOptions,
    ReadOptions, VirtualStack,
};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let temp_dir = tempfile::tempdir()?;
    let path = match std::env::args().nth(1) {
        Some(path) => PathBuf::from(path),
        None => write_synthetic(temp_dir.path())?,
    };

    let stack = VirtualStack::open(&path).with_context(|| format!("opening {}", path.display()))?;
    let header = stack.header();

    println!("3DU16 stack: {}", path.display());
    println!("  Shape (TCZYX): {:?}", header.shape());
    println!("  Scales (z, y, x): {:?} um", header.scales());
    println!(
        "  Per volume: {}",
        scape_stack::utils::format_bytes(header.bytes_per_volume())
    );
    println!();

    let first = stack.get_volume(0, &ReadOptions::new().interchange())?;
    if let Some(range) = first.value_range() {
        println!("Frame 0 value range: {} - {}", range.min, range.max);
    }

    let root = temp_dir.path().join("export.store");
    let mut sink = ChunkStoreSink::new(&root);
    let options = ExportOptions::new()
        .with_conversion(Conversion::U8)
        .with_compression(CompressionMethod::Zstd);
    let summary = export_series(&stack, &options, &mut sink)?;
    println!("Exported {}", summary.summary());

    let store = ChunkStore::open(&root)?;
    for chunk in &store.metadata().chunks {
        println!(
            "  {}: frames {}-{}, ratio {:.2}",
            chunk.path,
            chunk.start,
            chunk.end,
            chunk.compression_ratio()
        );
    }

    stack.close();
    Ok(())
}

/// 25 frames of 2 x 8 x 32 x 32 samples with a moving bright plane
fn write_synthetic(dir: &Path) -> anyhow::Result<PathBuf> {
    let (t, c, z, y, x) = (25i32, 2i32, 8i32, 32i32, 32i32);
    let mut raw = Vec::new();

    raw.write_i32::<BigEndian>(0)?;
    for scale in [2.0, 0.406, 0.406] {
        raw.write_f64::<BigEndian>(scale)?;
    }
    raw.write_i32::<BigEndian>(0)?;
    for d in [t, c, z, y, x] {
        raw.write_i32::<BigEndian>(d)?;
    }

    for frame in 0..t {
        for d in [c, z, y, x] {
            raw.write_i32::<BigEndian>(d)?;
        }
        for _ in 0..c {
            for plane in 0..z {
                let level: u16 = if plane == frame % z { 40000 } else { 1200 };
                for _ in 0..y * x {
                    raw.write_u16::<BigEndian>(level)?;
                }
            }
        }
    }

    let path = dir.join("synthetic.3DU16");
    std::fs::write(&path, raw)?;
    Ok(path)
}
