//! Region-read benchmarks: in-block reads vs reads crossing block seams

use criterion::{criterion_group, criterion_main, Criterion};
use ims5d::{
    ColorInfo, Compression, ContainerWriter, DatasetSpec, ElementKind, ImageExtent,
    ImageReaderU16, Index5D, Parameters, PyramidLevel, ReadOptions, Size5D, TimeInfo,
};
use tempfile::TempDir;

fn build_volume(dir: &TempDir) -> std::path::PathBuf {
    let path = dir.path().join("bench.i5d");
    let level = PyramidLevel::new(Size5D::new(256, 256, 8, 1, 1), Size5D::new(64, 64, 8, 1, 1));
    let mut writer = ContainerWriter::create(&path).unwrap();
    let ds = writer
        .add_dataset(DatasetSpec {
            element: ElementKind::UInt16,
            levels: vec![level],
            compression: Compression::ShuffleGzip(1),
            extent: ImageExtent::new(0.0, 0.0, 0.0, 256.0, 256.0, 8.0),
            time_info: vec![TimeInfo::default()],
            color_info: vec![ColorInfo::default()],
            extra_sections: Parameters::new(),
        })
        .unwrap();

    let (gx, gy, gz) = level.block_grid();
    let block_len = level.block_element_count();
    for bz in 0..gz {
        for by in 0..gy {
            for bx in 0..gx {
                let samples: Vec<u16> = (0..block_len)
                    .map(|i| ((i * 31 + bx * 7 + by * 13 + bz * 17) % 4096) as u16)
                    .collect();
                writer
                    .write_block::<u16>(ds, 0, 0, 0, (bx, by, bz), &samples)
                    .unwrap();
            }
        }
    }
    writer.finish().unwrap();
    path
}

fn bench_read_region(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let path = build_volume(&dir);
    let reader = ImageReaderU16::open(&path, 0, ReadOptions::default()).unwrap();

    let mut group = c.benchmark_group("read_region");

    let mut inside = vec![0u16; 32 * 32 * 8];
    group.bench_function("within_one_block", |b| {
        b.iter(|| {
            reader
                .read_region(
                    Index5D::new(8, 8, 0, 0, 0),
                    Index5D::new(40, 40, 8, 1, 1),
                    0,
                    &mut inside,
                )
                .unwrap();
        })
    });

    let mut crossing = vec![0u16; 64 * 64 * 8];
    group.bench_function("across_four_blocks", |b| {
        b.iter(|| {
            reader
                .read_region(
                    Index5D::new(32, 32, 0, 0, 0),
                    Index5D::new(96, 96, 8, 1, 1),
                    0,
                    &mut crossing,
                )
                .unwrap();
        })
    });

    group.finish();
}

criterion_group!(benches, bench_read_region);
criterion_main!(benches);
