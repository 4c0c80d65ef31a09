//! End-to-end reader tests over writer-built containers
//!
//! Every test authors a small container in a temp directory and exercises it
//! through the public reader API only.

use ims5d::{
    Color, ColorInfo, ColorMode, Compression, ContainerWriter, DatasetSpec, Element, ElementKind,
    ImageExtent, ImageReader, ImageReaderFloat, ImageReaderU16, ImageReaderU8, Index5D, IndexTCR,
    Parameters, PyramidLevel, ReaderError, ReadOptions, Size5D, TimeInfo,
};
use std::path::Path;
use tempfile::TempDir;

/// Deterministic sample value for a global voxel position
fn ramp(t: usize, c: usize, z: usize, y: usize, x: usize) -> u16 {
    (t * 10000 + c * 2000 + z * 400 + y * 20 + x) as u16
}

/// Write every block of one resolution level from a value function,
/// zero-padding the edge blocks
fn fill_level<T, F>(
    writer: &mut ContainerWriter,
    dataset: usize,
    level: &PyramidLevel,
    resolution: usize,
    value: &F,
) where
    T: Element,
    F: Fn(usize, usize, usize, usize, usize) -> T,
{
    let size = level.image_size;
    let block = level.block_size;
    let grid = level.block_grid();
    for t in 0..size.t {
        for c in 0..size.c {
            for bz in 0..grid.2 {
                for by in 0..grid.1 {
                    for bx in 0..grid.0 {
                        let mut samples = vec![T::default(); block.x * block.y * block.z];
                        for z in 0..block.z {
                            for y in 0..block.y {
                                for x in 0..block.x {
                                    let (gx, gy, gz) = (bx * block.x + x, by * block.y + y, bz * block.z + z);
                                    if gx < size.x && gy < size.y && gz < size.z {
                                        samples[(z * block.y + y) * block.x + x] =
                                            value(t, c, gz, gy, gx);
                                    }
                                }
                            }
                        }
                        writer
                            .write_block::<T>(dataset, resolution, t, c, (bx, by, bz), &samples)
                            .unwrap();
                    }
                }
            }
        }
    }
}

fn two_level_spec(compression: Compression) -> DatasetSpec {
    DatasetSpec {
        element: ElementKind::UInt16,
        levels: vec![
            PyramidLevel::new(Size5D::new(8, 8, 2, 2, 2), Size5D::new(4, 4, 2, 1, 1)),
            PyramidLevel::new(Size5D::new(4, 4, 1, 2, 2), Size5D::new(4, 4, 1, 1, 1)),
        ],
        compression,
        extent: ImageExtent::new(0.0, 0.0, -1.0, 16.0, 16.0, 1.0),
        time_info: vec![
            TimeInfo::from_text("2024-03-01 09:00:00.000").unwrap(),
            TimeInfo::from_text("2024-03-01 09:00:30.250").unwrap(),
        ],
        color_info: vec![
            ColorInfo {
                mode: ColorMode::BaseColor(Color::new(1.0, 0.0, 0.0, 1.0)),
                opacity: 1.0,
                range_min: 0.0,
                range_max: 40000.0,
                gamma_correction: 1.0,
            },
            ColorInfo {
                mode: ColorMode::Table(vec![
                    Color::new(0.0, 0.0, 0.0, 1.0),
                    Color::new(0.0, 1.0, 0.0, 1.0),
                ]),
                opacity: 0.5,
                range_min: 0.0,
                range_max: 40000.0,
                gamma_correction: 1.2,
            },
        ],
        extra_sections: Parameters::new(),
    }
}

/// Author the standard two-level u16 fixture and return its path
fn write_fixture(dir: &Path, compression: Compression) -> std::path::PathBuf {
    let path = dir.join("fixture.i5d");
    let mut writer = ContainerWriter::create(&path).unwrap();
    let spec = two_level_spec(compression);
    let levels = spec.levels.clone();
    let ds = writer.add_dataset(spec).unwrap();
    for (r, level) in levels.iter().enumerate() {
        fill_level::<u16, _>(&mut writer, ds, level, r, &ramp);
    }
    writer.finish().unwrap();
    path
}

#[test]
fn four_chunk_stitch_matches_reference() {
    // The concrete scenario: 8x8x1 volume over 4x4x1 chunks, region
    // (2,2,0,0,0)..(6,6,1,1,1) spanning all four chunks
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("scenario.i5d");
    let level = PyramidLevel::new(Size5D::new(8, 8, 1, 1, 1), Size5D::new(4, 4, 1, 1, 1));
    let coarse = PyramidLevel::new(Size5D::new(4, 4, 1, 1, 1), Size5D::new(4, 4, 1, 1, 1));

    let mut writer = ContainerWriter::create(&path).unwrap();
    let ds = writer
        .add_dataset(DatasetSpec {
            element: ElementKind::UInt16,
            levels: vec![level, coarse],
            compression: Compression::Gzip(2),
            extent: ImageExtent::new(0.0, 0.0, 0.0, 8.0, 8.0, 1.0),
            time_info: vec![TimeInfo::default()],
            color_info: vec![ColorInfo::default()],
            extra_sections: Parameters::new(),
        })
        .unwrap();
    fill_level::<u16, _>(&mut writer, ds, &level, 0, &ramp);
    fill_level::<u16, _>(&mut writer, ds, &coarse, 1, &ramp);
    writer.finish().unwrap();

    let reader = ImageReaderU16::open(&path, 0, ReadOptions::default()).unwrap();
    let mut out = vec![0u16; 16];
    reader
        .read_region(
            Index5D::new(2, 2, 0, 0, 0),
            Index5D::new(6, 6, 1, 1, 1),
            0,
            &mut out,
        )
        .unwrap();

    let expected: Vec<u16> = (2..6)
        .flat_map(|y| (2..6).map(move |x| ramp(0, 0, 0, y, x)))
        .collect();
    assert_eq!(out, expected);
}

#[test]
fn full_read_is_idempotent_and_ordered() {
    let dir = TempDir::new().unwrap();
    let path = write_fixture(dir.path(), Compression::Gzip(2));
    let reader = ImageReaderU16::open(&path, 0, ReadOptions::default()).unwrap();

    let size = Size5D::new(8, 8, 2, 2, 2);
    let end = Index5D::new(size.x, size.y, size.z, size.c, size.t);
    let mut first = vec![0u16; size.element_count()];
    reader.read_region(Index5D::zero(), end, 0, &mut first).unwrap();
    let mut second = vec![0u16; size.element_count()];
    reader.read_region(Index5D::zero(), end, 0, &mut second).unwrap();
    assert_eq!(first, second);

    // Row-major (T, C, Z, Y, X), X fastest
    let mut cursor = 0;
    for t in 0..size.t {
        for c in 0..size.c {
            for z in 0..size.z {
                for y in 0..size.y {
                    for x in 0..size.x {
                        assert_eq!(first[cursor], ramp(t, c, z, y, x), "at t={t} c={c} z={z} y={y} x={x}");
                        cursor += 1;
                    }
                }
            }
        }
    }
}

#[test]
fn one_chunk_and_four_chunk_layouts_agree() {
    let dir = TempDir::new().unwrap();
    let value = |t: usize, c: usize, z: usize, y: usize, x: usize| ramp(t, c, z, y, x);

    let mut paths = Vec::new();
    for (name, block) in [("single.i5d", 8), ("quad.i5d", 4)] {
        let path = dir.path().join(name);
        let level = PyramidLevel::new(Size5D::new(8, 8, 1, 1, 1), Size5D::new(block, block, 1, 1, 1));
        let mut writer = ContainerWriter::create(&path).unwrap();
        let ds = writer
            .add_dataset(DatasetSpec {
                element: ElementKind::UInt16,
                levels: vec![level],
                compression: Compression::None,
                extent: ImageExtent::new(0.0, 0.0, 0.0, 8.0, 8.0, 1.0),
                time_info: vec![TimeInfo::default()],
                color_info: vec![ColorInfo::default()],
                extra_sections: Parameters::new(),
            })
            .unwrap();
        fill_level::<u16, _>(&mut writer, ds, &level, 0, &value);
        writer.finish().unwrap();
        paths.push(path);
    }

    let begin = Index5D::new(1, 2, 0, 0, 0);
    let end = Index5D::new(7, 6, 1, 1, 1);
    let mut outputs = Vec::new();
    for path in &paths {
        let reader = ImageReaderU16::open(path, 0, ReadOptions::default()).unwrap();
        let mut out = vec![0u16; 24];
        reader.read_region(begin, end, 0, &mut out).unwrap();
        outputs.push(out);
    }
    assert_eq!(outputs[0], outputs[1]);
}

#[test]
fn range_error_leaves_buffer_untouched() {
    let dir = TempDir::new().unwrap();
    let path = write_fixture(dir.path(), Compression::None);
    let reader = ImageReaderU16::open(&path, 0, ReadOptions::default()).unwrap();

    let sentinel = 0xABCDu16;
    let mut out = vec![sentinel; 64];

    // end.x beyond the level size
    let result = reader.read_region(
        Index5D::zero(),
        Index5D::new(9, 8, 1, 1, 1),
        0,
        &mut out,
    );
    assert!(matches!(result, Err(ReaderError::OutOfBounds(_))));
    assert!(out.iter().all(|&v| v == sentinel));

    // begin > end
    let result = reader.read_region(
        Index5D::new(4, 0, 0, 0, 0),
        Index5D::new(2, 8, 1, 1, 1),
        0,
        &mut out,
    );
    assert!(matches!(result, Err(ReaderError::OutOfBounds(_))));
    assert!(out.iter().all(|&v| v == sentinel));

    // resolution beyond the pyramid
    let result = reader.read_region(Index5D::zero(), Index5D::new(1, 1, 1, 1, 1), 2, &mut out);
    assert!(matches!(result, Err(ReaderError::OutOfBounds(_))));
    assert!(out.iter().all(|&v| v == sentinel));

    // undersized output buffer
    let mut small = vec![sentinel; 3];
    let result = reader.read_region(
        Index5D::zero(),
        Index5D::new(2, 2, 1, 1, 1),
        0,
        &mut small,
    );
    assert!(matches!(result, Err(ReaderError::BufferTooSmall { required: 4, actual: 3 })));
    assert!(small.iter().all(|&v| v == sentinel));
}

#[test]
fn zero_extent_region_succeeds() {
    let dir = TempDir::new().unwrap();
    let path = write_fixture(dir.path(), Compression::None);
    let reader = ImageReaderU16::open(&path, 0, ReadOptions::default()).unwrap();

    let at = Index5D::new(8, 8, 2, 2, 2);
    let mut out: Vec<u16> = Vec::new();
    reader.read_region(at, at, 0, &mut out).unwrap();
}

#[test]
fn every_codec_round_trips_through_the_reader() {
    for compression in [
        Compression::None,
        Compression::Gzip(1),
        Compression::Gzip(9),
        Compression::ShuffleGzip(4),
        Compression::Zstd,
        Compression::ShuffleZstd,
    ] {
        let dir = TempDir::new().unwrap();
        let path = write_fixture(dir.path(), compression);
        let reader = ImageReaderU16::open(&path, 0, ReadOptions::default()).unwrap();

        assert_eq!(reader.read_metadata().unwrap().compression, compression);

        let mut out = vec![0u16; 6];
        reader
            .read_region(
                Index5D::new(3, 5, 1, 1, 1),
                Index5D::new(6, 7, 2, 2, 2),
                0,
                &mut out,
            )
            .unwrap();
        let expected: Vec<u16> = (5..7)
            .flat_map(|y| (3..6).map(move |x| ramp(1, 1, 1, y, x)))
            .collect();
        assert_eq!(out, expected, "codec {compression:?}");
    }
}

#[test]
fn metadata_decodes_what_the_writer_encoded() {
    let dir = TempDir::new().unwrap();
    let path = write_fixture(dir.path(), Compression::ShuffleGzip(3));
    let reader = ImageReaderU16::open(&path, 0, ReadOptions::default()).unwrap();
    let metadata = reader.read_metadata().unwrap();

    let spec = two_level_spec(Compression::ShuffleGzip(3));
    assert_eq!(metadata.pyramid, spec.levels);
    assert_eq!(metadata.extent, spec.extent);
    assert_eq!(metadata.time_info, spec.time_info);
    assert_eq!(metadata.color_info, spec.color_info);
    assert_eq!(metadata.compression, spec.compression);

    // Coarser levels never grow, on any axis
    for pair in metadata.pyramid.windows(2) {
        assert!(pair[1].image_size.x <= pair[0].image_size.x);
        assert!(pair[1].image_size.y <= pair[0].image_size.y);
        assert!(pair[1].image_size.z <= pair[0].image_size.z);
    }
    assert_eq!(metadata.time_info.len(), metadata.pyramid[0].image_size.t);
    assert_eq!(metadata.color_info.len(), metadata.pyramid[0].image_size.c);
}

#[test]
fn metadata_is_stable_across_reopen() {
    let dir = TempDir::new().unwrap();
    let path = write_fixture(dir.path(), Compression::Zstd);

    let reader = ImageReaderU16::open(&path, 0, ReadOptions::default()).unwrap();
    let first = reader.read_metadata().unwrap();
    assert_eq!(first, reader.read_metadata().unwrap());
    reader.close();

    let reader = ImageReaderU16::open(&path, 0, ReadOptions::default()).unwrap();
    assert_eq!(first, reader.read_metadata().unwrap());
}

#[test]
fn stored_histogram_wins_and_validates() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("hist.i5d");
    let mut writer = ContainerWriter::create(&path).unwrap();
    let spec = two_level_spec(Compression::None);
    let levels = spec.levels.clone();
    let ds = writer.add_dataset(spec).unwrap();
    for (r, level) in levels.iter().enumerate() {
        fill_level::<u16, _>(&mut writer, ds, level, r, &ramp);
    }
    writer
        .write_histogram(ds, IndexTCR::new(0, 0, 0), 0, 40000, &[100, 20, 8])
        .unwrap();
    writer.finish().unwrap();

    let reader = ImageReaderU16::open(&path, 0, ReadOptions::default()).unwrap();
    let stored = reader.read_histogram(IndexTCR::new(0, 0, 0)).unwrap();
    assert_eq!(stored.bins, vec![100, 20, 8]);
    assert_eq!((stored.min, stored.max), (0, 40000));

    // The stored selection's count never exceeds the selection's voxel count
    assert!(stored.total_count() <= (8 * 8 * 2) as u64);

    // No stored histogram for this selection: computed from the voxels
    let computed = reader.read_histogram(IndexTCR::new(1, 1, 1)).unwrap();
    assert!(!computed.bins.is_empty());
    assert_eq!(computed.total_count(), (4 * 4) as u64);
    assert!(computed.min <= computed.max);

    // All three indices are validated
    assert!(reader.read_histogram(IndexTCR::new(2, 0, 0)).is_err());
    assert!(reader.read_histogram(IndexTCR::new(0, 2, 0)).is_err());
    assert!(reader.read_histogram(IndexTCR::new(0, 0, 2)).is_err());
}

#[test]
fn thumbnail_stored_and_rendered() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("thumb.i5d");
    let mut writer = ContainerWriter::create(&path).unwrap();
    let spec = two_level_spec(Compression::None);
    let levels = spec.levels.clone();
    let ds = writer.add_dataset(spec).unwrap();
    for (r, level) in levels.iter().enumerate() {
        fill_level::<u16, _>(&mut writer, ds, level, r, &ramp);
    }
    let pixels: Vec<u8> = (0..6 * 4 * 4).map(|i| (i % 251) as u8).collect();
    writer.write_thumbnail(ds, 6, 4, &pixels).unwrap();
    writer.finish().unwrap();

    let reader = ImageReaderU16::open(&path, 0, ReadOptions::default()).unwrap();
    let stored = reader.read_thumbnail().unwrap();
    assert_eq!((stored.size_x, stored.size_y), (6, 4));
    assert_eq!(stored.interleaved_rgba, pixels);
    assert!(stored.is_consistent());

    // A container without a stored preview renders one deterministically
    let path = write_fixture(dir.path(), Compression::None);
    let reader = ImageReaderU16::open(&path, 0, ReadOptions::default()).unwrap();
    let rendered = reader.read_thumbnail().unwrap();
    assert!(rendered.is_consistent());
    assert_eq!(
        rendered.interleaved_rgba.len(),
        rendered.size_x as usize * rendered.size_y as usize * 4
    );
    assert_eq!(rendered, reader.read_thumbnail().unwrap());
}

#[test]
fn parameters_round_trip_with_extra_sections() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("params.i5d");
    let mut writer = ContainerWriter::create(&path).unwrap();
    let mut spec = two_level_spec(Compression::None);
    let custom = spec
        .extra_sections
        .entry("Acquisition".to_string())
        .or_default();
    custom.insert("Microscope".to_string(), "LSM-900".to_string());
    custom.insert("Objective".to_string(), "63x/1.4".to_string());
    let levels = spec.levels.clone();
    let ds = writer.add_dataset(spec).unwrap();
    for (r, level) in levels.iter().enumerate() {
        fill_level::<u16, _>(&mut writer, ds, level, r, &ramp);
    }
    writer.finish().unwrap();

    let reader = ImageReaderU16::open(&path, 0, ReadOptions::default()).unwrap();
    let parameters = reader.read_parameters().unwrap();
    assert_eq!(
        parameters["Acquisition"]["Microscope"],
        "LSM-900".to_string()
    );
    assert_eq!(parameters["Image"]["ExtMax0"], "16".to_string());
    assert!(parameters.contains_key("TimeInfo"));
    assert!(parameters.contains_key("Channel 0"));
    assert!(parameters.contains_key("Channel 1"));
}

#[test]
fn unwritten_blocks_read_as_zero() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("sparse.i5d");
    let level = PyramidLevel::new(Size5D::new(8, 8, 1, 1, 1), Size5D::new(4, 4, 1, 1, 1));
    let mut writer = ContainerWriter::create(&path).unwrap();
    let ds = writer
        .add_dataset(DatasetSpec {
            element: ElementKind::UInt16,
            levels: vec![level],
            compression: Compression::None,
            extent: ImageExtent::new(0.0, 0.0, 0.0, 8.0, 8.0, 1.0),
            time_info: vec![TimeInfo::default()],
            color_info: vec![ColorInfo::default()],
            extra_sections: Parameters::new(),
        })
        .unwrap();
    // Only the top-left block exists
    writer
        .write_block::<u16>(ds, 0, 0, 0, (0, 0, 0), &[5u16; 16])
        .unwrap();
    writer.finish().unwrap();

    let reader = ImageReaderU16::open(&path, 0, ReadOptions::default()).unwrap();
    let mut out = vec![0xFFFFu16; 64];
    reader
        .read_region(Index5D::zero(), Index5D::new(8, 8, 1, 1, 1), 0, &mut out)
        .unwrap();
    assert_eq!(out[0], 5);
    assert_eq!(out[3], 5);
    assert_eq!(out[4], 0); // first voxel of the unwritten right block
    assert_eq!(out[63], 0);
}

#[test]
fn swmr_reader_sees_appended_time_points() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("live.i5d");
    let level = PyramidLevel::new(Size5D::new(4, 4, 1, 1, 1), Size5D::new(4, 4, 1, 1, 1));
    let mut writer = ContainerWriter::create(&path).unwrap();
    let ds = writer
        .add_dataset(DatasetSpec {
            element: ElementKind::UInt16,
            levels: vec![level],
            compression: Compression::Gzip(1),
            extent: ImageExtent::new(0.0, 0.0, 0.0, 4.0, 4.0, 1.0),
            time_info: vec![TimeInfo::from_text("2024-03-01 09:00:00").unwrap()],
            color_info: vec![ColorInfo::default()],
            extra_sections: Parameters::new(),
        })
        .unwrap();
    writer
        .write_block::<u16>(ds, 0, 0, 0, (0, 0, 0), &[1u16; 16])
        .unwrap();
    writer.finish().unwrap();

    let reader = ImageReaderU16::open(&path, 0, ReadOptions { swmr: true }).unwrap();
    assert_eq!(reader.read_metadata().unwrap().time_info.len(), 1);

    // A single writer appends one time point while the reader stays open
    let mut writer = ContainerWriter::append(&path).unwrap();
    writer
        .append_time_points(ds, &[TimeInfo::from_text("2024-03-01 09:00:30").unwrap()])
        .unwrap();
    writer
        .write_block::<u16>(ds, 0, 1, 0, (0, 0, 0), &[2u16; 16])
        .unwrap();
    writer.finish().unwrap();

    let metadata = reader.read_metadata().unwrap();
    assert_eq!(metadata.time_info.len(), 2);
    assert_eq!(metadata.pyramid[0].image_size.t, 2);

    let mut out = vec![0u16; 16];
    reader
        .read_region(
            Index5D::new(0, 0, 0, 0, 1),
            Index5D::new(4, 4, 1, 1, 2),
            0,
            &mut out,
        )
        .unwrap();
    assert!(out.iter().all(|&v| v == 2));
}

#[test]
fn multi_dataset_container_binds_by_index_and_type() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("multi.i5d");
    let level_u8 = PyramidLevel::new(Size5D::new(4, 4, 1, 1, 1), Size5D::new(4, 4, 1, 1, 1));
    let level_f32 = PyramidLevel::new(Size5D::new(2, 2, 1, 1, 1), Size5D::new(2, 2, 1, 1, 1));

    let mut writer = ContainerWriter::create(&path).unwrap();
    let first = writer
        .add_dataset(DatasetSpec {
            element: ElementKind::UInt8,
            levels: vec![level_u8],
            compression: Compression::None,
            extent: ImageExtent::new(0.0, 0.0, 0.0, 4.0, 4.0, 1.0),
            time_info: vec![TimeInfo::default()],
            color_info: vec![ColorInfo::default()],
            extra_sections: Parameters::new(),
        })
        .unwrap();
    let second = writer
        .add_dataset(DatasetSpec {
            element: ElementKind::Float32,
            levels: vec![level_f32],
            compression: Compression::None,
            extent: ImageExtent::new(0.0, 0.0, 0.0, 2.0, 2.0, 1.0),
            time_info: vec![TimeInfo::default()],
            color_info: vec![ColorInfo::default()],
            extra_sections: Parameters::new(),
        })
        .unwrap();
    writer
        .write_block::<u8>(first, 0, 0, 0, (0, 0, 0), &[9u8; 16])
        .unwrap();
    writer
        .write_block::<f32>(second, 0, 0, 0, (0, 0, 0), &[0.5f32; 4])
        .unwrap();
    writer.finish().unwrap();

    assert_eq!(
        ims5d::file_images_information(&path, false).unwrap(),
        vec![ElementKind::UInt8, ElementKind::Float32]
    );

    let reader = ImageReaderU8::open(&path, first, ReadOptions::default()).unwrap();
    let mut out = vec![0u8; 16];
    reader
        .read_region(Index5D::zero(), Index5D::new(4, 4, 1, 1, 1), 0, &mut out)
        .unwrap();
    assert!(out.iter().all(|&v| v == 9));

    let reader = ImageReaderFloat::open(&path, second, ReadOptions::default()).unwrap();
    let mut out = vec![0f32; 4];
    reader
        .read_region(Index5D::zero(), Index5D::new(2, 2, 1, 1, 1), 0, &mut out)
        .unwrap();
    assert!(out.iter().all(|&v| v == 0.5));

    // Wrong bindings are rejected at open
    assert!(matches!(
        ImageReaderFloat::open(&path, first, ReadOptions::default()),
        Err(ReaderError::TypeMismatch { .. })
    ));
    assert!(matches!(
        ImageReader::<u32>::open(&path, 2, ReadOptions::default()),
        Err(ReaderError::DatasetIndex { index: 2, count: 2 })
    ));
}

#[test]
fn ndarray_helper_matches_flat_read() {
    let dir = TempDir::new().unwrap();
    let path = write_fixture(dir.path(), Compression::None);
    let reader = ImageReaderU16::open(&path, 0, ReadOptions::default()).unwrap();

    let begin = Index5D::new(1, 2, 0, 0, 0);
    let end = Index5D::new(5, 6, 2, 2, 2);
    let array = reader.read_region_ndarray(begin, end, 0).unwrap();
    assert_eq!(array.shape(), &[2, 2, 2, 4, 4]);
    assert_eq!(array[[1, 0, 1, 3, 2]], ramp(1, 0, 1, 5, 3));

    let mut flat = vec![0u16; 2 * 2 * 2 * 4 * 4];
    reader.read_region(begin, end, 0, &mut flat).unwrap();
    assert_eq!(array.into_raw_vec_and_offset().0, flat);
}
