//! Walkthrough: author a small container, then read it back
//!
//! ```sh
//! cargo run --example read_volume
//! ```

use anyhow::Result;
use ims5d::{
    Color, ColorInfo, ColorMode, Compression, ContainerWriter, DatasetSpec, ElementKind,
    ImageExtent, ImageReaderU16, Index5D, IndexTCR, Parameters, PyramidLevel, ReadOptions,
    Size5D, TimeInfo,
};

fn main() -> Result<()> {
    env_logger::init();

    let dir = tempfile::tempdir()?;
    let path = dir.path().join("demo.i5d");

    // Two-level pyramid, one channel, one time point
    let fine = PyramidLevel::new(Size5D::new(64, 64, 4, 1, 1), Size5D::new(32, 32, 4, 1, 1));
    let coarse = PyramidLevel::new(Size5D::new(32, 32, 2, 1, 1), Size5D::new(32, 32, 2, 1, 1));

    let mut writer = ContainerWriter::create(&path)?;
    let ds = writer.add_dataset(DatasetSpec {
        element: ElementKind::UInt16,
        levels: vec![fine, coarse],
        compression: Compression::ShuffleGzip(2),
        extent: ImageExtent::new(0.0, 0.0, 0.0, 128.0, 128.0, 8.0),
        time_info: vec![TimeInfo::from_text("2024-03-01 09:00:00.000")?],
        color_info: vec![ColorInfo {
            mode: ColorMode::BaseColor(Color::new(0.2, 1.0, 0.4, 1.0)),
            opacity: 1.0,
            range_min: 0.0,
            range_max: 4096.0,
            gamma_correction: 1.0,
        }],
        extra_sections: Parameters::new(),
    })?;

    for (resolution, level) in [fine, coarse].iter().enumerate() {
        let (gx, gy, gz) = level.block_grid();
        let block = level.block_size;
        for bz in 0..gz {
            for by in 0..gy {
                for bx in 0..gx {
                    // A radial ramp, just to have recognizable content
                    let mut samples = vec![0u16; level.block_element_count()];
                    for z in 0..block.z {
                        for y in 0..block.y {
                            for x in 0..block.x {
                                let (ix, iy) = (bx * block.x + x, by * block.y + y);
                                let (dx, dy) = (ix as f64 - 32.0, iy as f64 - 32.0);
                                samples[(z * block.y + y) * block.x + x] =
                                    (dx * dx + dy * dy).sqrt() as u16 * 64;
                            }
                        }
                    }
                    writer.write_block::<u16>(ds, resolution, 0, 0, (bx, by, bz), &samples)?;
                }
            }
        }
    }
    writer.finish()?;

    // Read it back
    let reader = ImageReaderU16::open(&path, 0, ReadOptions::default())?;
    let metadata = reader.read_metadata()?;
    println!("pyramid:");
    for (r, level) in metadata.pyramid.iter().enumerate() {
        println!(
            "  level {r}: image {} blocks {}",
            level.image_size, level.block_size
        );
    }
    println!("extent: {:?}", metadata.extent);
    println!("acquired: {}", metadata.time_info[0].to_text());
    println!("compression: {:?}", metadata.compression);

    let mut region = vec![0u16; 16 * 16 * 4];
    reader.read_region(
        Index5D::new(24, 24, 0, 0, 0),
        Index5D::new(40, 40, 4, 1, 1),
        0,
        &mut region,
    )?;
    println!(
        "16x16x4 region around the center: first samples {:?}",
        &region[..8]
    );

    let histogram = reader.read_histogram(IndexTCR::new(0, 0, 1))?;
    println!(
        "histogram at coarse level: {} bins over [{}, {}], {} samples",
        histogram.bins.len(),
        histogram.min,
        histogram.max,
        histogram.total_count()
    );

    let thumbnail = reader.read_thumbnail()?;
    println!(
        "thumbnail: {}x{} ({} bytes)",
        thumbnail.size_x,
        thumbnail.size_y,
        thumbnail.interleaved_rgba.len()
    );

    reader.close();
    Ok(())
}
