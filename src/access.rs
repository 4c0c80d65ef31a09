//! Image access - the reader API over one dataset of an open container

use crate::compression::decompress_block;
use crate::container::{BlockKey, ContainerCatalog, ContainerFile, DatasetRecord};
use crate::error::{ReaderError, Result};
use crate::layout::PyramidLevel;
use crate::metadata::{self, DatasetMetadata};
use crate::types::{
    ColorMode, Element, ElementKind, Histogram, Index5D, IndexTCR, Parameters, Size5D, Thumbnail,
};
use log::{debug, trace};
use num_traits::ToPrimitive;
use std::marker::PhantomData;
use std::path::Path;

/// Bin count of histograms computed on demand for containers that carry no
/// stored distribution for a selection
const FALLBACK_HISTOGRAM_BINS: usize = 256;

/// Edge length of thumbnails rendered on demand
const RENDERED_THUMBNAIL_SIZE: u32 = 256;

/// Options controlling how a container is opened
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadOptions {
    /// Tolerate a concurrent single writer appending time points; metadata
    /// and chunk locations are refreshed before each query
    pub swmr: bool,
}

/// Random-access reader over one dataset of an I5D container, bound to one
/// element type.
///
/// The element type is part of the open contract: opening a dataset with a
/// type other than its stored kind is rejected. All queries take `&self` and
/// are safe to issue from multiple threads; independent readers over the
/// same file (any mix of element bindings) do not share state.
///
/// The reader releases its resources on drop; [`close`](Self::close) makes
/// the teardown explicit and, by consuming the reader, makes use after close
/// unrepresentable.
pub struct ImageReader<T: Element> {
    container: ContainerFile,
    dataset_index: usize,
    _element: PhantomData<T>,
}

/// 8-bit unsigned reader
pub type ImageReaderU8 = ImageReader<u8>;
/// 16-bit unsigned reader
pub type ImageReaderU16 = ImageReader<u16>;
/// 32-bit unsigned reader
pub type ImageReaderU32 = ImageReader<u32>;
/// 32-bit float reader
pub type ImageReaderFloat = ImageReader<f32>;

/// Element kind of every dataset in a container, in dataset order.
///
/// Lets callers pick the matching [`ImageReader`] instantiation before
/// opening.
pub fn file_images_information(path: impl AsRef<Path>, swmr: bool) -> Result<Vec<ElementKind>> {
    let container = ContainerFile::open(path, swmr)?;
    let catalog = container.catalog();
    Ok(catalog.datasets.iter().map(|d| d.element).collect())
}

impl<T: Element> ImageReader<T> {
    /// Open dataset `image_index` of the container at `path`.
    ///
    /// The pyramid description is decoded and validated here and bound for
    /// the reader's lifetime, so every later query operates against a known
    /// layout.
    pub fn open(path: impl AsRef<Path>, image_index: usize, options: ReadOptions) -> Result<Self> {
        let container = ContainerFile::open(path.as_ref(), options.swmr)?;
        let catalog = container.catalog();
        let count = catalog.datasets.len();
        let record = catalog
            .datasets
            .get(image_index)
            .ok_or(ReaderError::DatasetIndex {
                index: image_index,
                count,
            })?;
        if record.element != T::KIND {
            return Err(ReaderError::TypeMismatch {
                requested: T::KIND,
                actual: record.element,
            });
        }
        // Surface a broken pyramid or unknown codec at open, not mid-read
        let layout = record.layout()?;
        record.compression()?;

        debug!(
            "opened dataset {} of {} as {:?}: {} level(s), {} channel(s), {} time point(s)",
            image_index,
            path.as_ref().display(),
            T::KIND,
            layout.resolution_count(),
            layout.channel_count(),
            layout.time_count()
        );
        Ok(Self {
            container,
            dataset_index: image_index,
            _element: PhantomData,
        })
    }

    /// Decode the dataset's pyramid, extent, time, color and compression
    /// description.
    ///
    /// Pure query: repeated calls on an unmodified file return identical
    /// values. Under SWMR the description is refreshed first, so appended
    /// time points show up here.
    pub fn read_metadata(&self) -> Result<DatasetMetadata> {
        self.container.refresh()?;
        let catalog = self.container.catalog();
        metadata::decode_dataset_metadata(self.record(&catalog)?)
    }

    /// Copy the half-open region `[begin, end)` at `resolution` into `out`.
    ///
    /// `out` receives `Size5D::between(begin, end).element_count()` samples
    /// in row-major (T, C, Z, Y, X) order with X fastest. Every storage
    /// block intersecting the region is decoded in full and trimmed to its
    /// overlap; blocks the file never stored read as zero. All range checks
    /// happen before the first write to `out`, so a range error leaves the
    /// buffer untouched; after a storage error the buffer contents are
    /// unspecified.
    pub fn read_region(
        &self,
        begin: Index5D,
        end: Index5D,
        resolution: usize,
        out: &mut [T],
    ) -> Result<()> {
        self.container.refresh()?;
        let (catalog, table) = self.container.snapshot();
        let record = self.record(&catalog)?;
        let layout = record.layout()?;
        let compression = record.compression()?;
        let level = *layout.level(resolution)?;

        if !begin.all_le(&end) {
            return Err(ReaderError::OutOfBounds(format!(
                "region begin {begin} exceeds end {end}"
            )));
        }
        if !level.image_size.bounds_end(&end) {
            return Err(ReaderError::OutOfBounds(format!(
                "region end {end} outside image of {} at resolution {resolution}",
                level.image_size
            )));
        }
        let shape = Size5D::between(&begin, &end);
        let required = shape.element_count();
        if out.len() < required {
            return Err(ReaderError::BufferTooSmall {
                required,
                actual: out.len(),
            });
        }
        if required == 0 {
            return Ok(());
        }

        let out = &mut out[..required];
        // Unwritten blocks read as the fill value
        out.fill(T::default());

        let ((bx0, bx1), (by0, by1), (bz0, bz1)) = level.intersecting_blocks(
            (begin.x, begin.y, begin.z),
            (end.x, end.y, end.z),
        );
        trace!(
            "read_region {begin}..{end} r={resolution}: {} block(s) per sub-volume",
            (bx1 - bx0 + 1) * (by1 - by0 + 1) * (bz1 - bz0 + 1)
        );

        let block_bytes = level.block_element_count() * T::BYTES;
        let slab_xyz = shape.x * shape.y * shape.z;
        let slab_xyzc = slab_xyz * shape.c;

        for t in begin.t..end.t {
            let offset_t = (t - begin.t) * slab_xyzc;
            for c in begin.c..end.c {
                let offset_c = offset_t + (c - begin.c) * slab_xyz;
                for bz in bz0..=bz1 {
                    for by in by0..=by1 {
                        for bx in bx0..=bx1 {
                            let key = BlockKey::new(
                                self.dataset_index,
                                resolution,
                                t,
                                c,
                                level.block_index(bx, by, bz),
                            );
                            let Some(blob) = table.blocks.get(&key) else {
                                continue;
                            };
                            let raw = self.container.read_blob(blob)?;
                            let decoded = decompress_block(
                                compression,
                                T::BYTES,
                                &raw,
                                Some(block_bytes),
                            )?;
                            if decoded.len() != block_bytes {
                                return Err(ReaderError::Corrupt(format!(
                                    "block ({bx}, {by}, {bz}) at t={t}, c={c}, r={resolution} \
                                     decoded to {} bytes, expected {block_bytes}",
                                    decoded.len()
                                )));
                            }
                            copy_block_overlap::<T>(
                                &decoded, &level, (bx, by, bz), &begin, &end, &shape, offset_c,
                                out,
                            );
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// [`read_region`](Self::read_region) into a freshly allocated
    /// (t, c, z, y, x) array
    pub fn read_region_ndarray(
        &self,
        begin: Index5D,
        end: Index5D,
        resolution: usize,
    ) -> Result<ndarray::Array5<T>> {
        if !begin.all_le(&end) {
            return Err(ReaderError::OutOfBounds(format!(
                "region begin {begin} exceeds end {end}"
            )));
        }
        let shape = Size5D::between(&begin, &end);
        let mut data = vec![T::default(); shape.element_count()];
        self.read_region(begin, end, resolution, &mut data)?;
        Ok(
            ndarray::Array5::from_shape_vec(
                (shape.t, shape.c, shape.z, shape.y, shape.x),
                data,
            )
            .expect("buffer length matches region shape"),
        )
    }

    /// Voxel-value distribution for one (time, channel, resolution)
    /// selection.
    ///
    /// Returns the distribution stored by the writer when present;
    /// otherwise bins the selection's voxels on demand through the same
    /// block-decode path as [`read_region`](Self::read_region).
    pub fn read_histogram(&self, index: IndexTCR) -> Result<Histogram> {
        self.container.refresh()?;
        let catalog = self.container.catalog();
        let record = self.record(&catalog)?;
        let layout = record.layout()?;
        layout.level(index.r)?;
        if index.t >= layout.time_count() || index.c >= layout.channel_count() {
            return Err(ReaderError::OutOfBounds(format!(
                "histogram selection t={}, c={} outside dataset of {} time point(s), {} channel(s)",
                index.t,
                index.c,
                layout.time_count(),
                layout.channel_count()
            )));
        }

        if let Some(stored) = record.find_histogram(index) {
            let raw = self.container.read_blob(&stored.blob)?;
            if raw.is_empty() || raw.len() % 8 != 0 {
                return Err(ReaderError::Corrupt(format!(
                    "histogram blob of {} bytes is not a u64 sequence",
                    raw.len()
                )));
            }
            let bins = raw
                .chunks_exact(8)
                .map(|chunk| {
                    let mut buf = [0u8; 8];
                    buf.copy_from_slice(chunk);
                    u64::from_le_bytes(buf)
                })
                .collect();
            return Ok(Histogram {
                min: stored.min,
                max: stored.max,
                bins,
            });
        }

        trace!(
            "no stored histogram for t={}, c={}, r={}; binning on demand",
            index.t,
            index.c,
            index.r
        );
        self.compute_histogram(record, index)
    }

    /// RGBA8 preview of the dataset.
    ///
    /// Returns the stored thumbnail when the writer emitted one; otherwise
    /// renders a deterministic preview from the default selection: time
    /// point 0, the coarsest level's middle Z slice, all channels blended
    /// through their color mapping.
    pub fn read_thumbnail(&self) -> Result<Thumbnail> {
        self.container.refresh()?;
        let catalog = self.container.catalog();
        let record = self.record(&catalog)?;

        if let Some(stored) = &record.thumbnail {
            let raw = self.container.read_blob(&stored.blob)?;
            let expected = stored.size_x as usize * stored.size_y as usize * 4;
            if raw.len() != expected {
                return Err(ReaderError::Corrupt(format!(
                    "thumbnail blob of {} bytes, expected {expected}",
                    raw.len()
                )));
            }
            return Ok(Thumbnail {
                size_x: stored.size_x,
                size_y: stored.size_y,
                interleaved_rgba: raw.to_vec(),
            });
        }

        trace!("no stored thumbnail; rendering from the coarsest level");
        self.render_thumbnail(record)
    }

    /// Independent copy of the free-form section/key/value metadata block
    pub fn read_parameters(&self) -> Result<Parameters> {
        self.container.refresh()?;
        let catalog = self.container.catalog();
        Ok(self.record(&catalog)?.info.clone())
    }

    /// Explicitly release the reader.
    ///
    /// Equivalent to dropping it; consuming `self` means a closed reader
    /// cannot be used again by construction.
    pub fn close(self) {
        debug!(
            "closed dataset {} of {}",
            self.dataset_index,
            self.container.path().display()
        );
    }

    fn record<'a>(&self, catalog: &'a ContainerCatalog) -> Result<&'a DatasetRecord> {
        catalog.datasets.get(self.dataset_index).ok_or_else(|| {
            ReaderError::Corrupt(format!(
                "dataset {} no longer present after refresh",
                self.dataset_index
            ))
        })
    }

    fn compute_histogram(&self, record: &DatasetRecord, index: IndexTCR) -> Result<Histogram> {
        let layout = record.layout()?;
        let level = *layout.level(index.r)?;
        let size = level.image_size;

        let begin = Index5D::new(0, 0, 0, index.c, index.t);
        let end = Index5D::new(size.x, size.y, size.z, index.c + 1, index.t + 1);
        let mut samples = vec![T::default(); size.x * size.y * size.z];
        self.read_region(begin, end, index.r, &mut samples)?;

        let mut lo = f64::INFINITY;
        let mut hi = f64::NEG_INFINITY;
        for sample in &samples {
            let value = sample.to_f64().unwrap_or(0.0);
            lo = lo.min(value);
            hi = hi.max(value);
        }

        let span = hi - lo;
        let mut bins = vec![0u64; FALLBACK_HISTOGRAM_BINS];
        for sample in &samples {
            let value = sample.to_f64().unwrap_or(0.0);
            let bin = if span > 0.0 {
                (((value - lo) / span) * (FALLBACK_HISTOGRAM_BINS - 1) as f64).round() as usize
            } else {
                0
            };
            bins[bin.min(FALLBACK_HISTOGRAM_BINS - 1)] += 1;
        }

        let min = lo.floor().clamp(0.0, u32::MAX as f64) as u32;
        let max = hi.ceil().clamp(min as f64, u32::MAX as f64) as u32;
        Ok(Histogram { min, max, bins })
    }

    fn render_thumbnail(&self, record: &DatasetRecord) -> Result<Thumbnail> {
        let layout = record.layout()?;
        let coarsest = layout.resolution_count() - 1;
        let level = *layout.level(coarsest)?;
        let (sx, sy) = (level.image_size.x, level.image_size.y);
        let z = level.image_size.z / 2;
        let colors = metadata::decode_color_info(&record.info, layout.channel_count())?;

        // Blend every channel's middle slice at time point 0 into RGB
        let mut accum = vec![0f32; sx * sy * 3];
        let mut slice = vec![T::default(); sx * sy];
        for (c, info) in colors.iter().enumerate() {
            let begin = Index5D::new(0, 0, z, c, 0);
            let end = Index5D::new(sx, sy, z + 1, c + 1, 1);
            self.read_region(begin, end, coarsest, &mut slice)?;

            let span = info.range_max - info.range_min;
            let gamma = if info.gamma_correction > 0.0 {
                1.0 / info.gamma_correction
            } else {
                1.0
            };
            for (pixel, sample) in slice.iter().enumerate() {
                let value = sample.to_f64().unwrap_or(0.0) as f32;
                let mut norm = if span > 0.0 {
                    ((value - info.range_min) / span).clamp(0.0, 1.0)
                } else {
                    0.0
                };
                norm = norm.powf(gamma);

                let (red, green, blue) = match &info.mode {
                    ColorMode::BaseColor(base) => {
                        (base.red * norm, base.green * norm, base.blue * norm)
                    }
                    ColorMode::Table(table) => {
                        let last = table.len() - 1;
                        let entry = &table[((norm * last as f32).round() as usize).min(last)];
                        (entry.red, entry.green, entry.blue)
                    }
                };
                accum[pixel * 3] += red * info.opacity;
                accum[pixel * 3 + 1] += green * info.opacity;
                accum[pixel * 3 + 2] += blue * info.opacity;
            }
        }

        // Nearest-neighbour resample into the fixed preview size
        let edge = RENDERED_THUMBNAIL_SIZE;
        let mut rgba = Vec::with_capacity(edge as usize * edge as usize * 4);
        for py in 0..edge as usize {
            let src_y = py * sy / edge as usize;
            for px in 0..edge as usize {
                let src_x = px * sx / edge as usize;
                let base = (src_y * sx + src_x) * 3;
                for channel in 0..3 {
                    rgba.push((accum[base + channel].clamp(0.0, 1.0) * 255.0).round() as u8);
                }
                rgba.push(255);
            }
        }

        Ok(Thumbnail {
            size_x: edge,
            size_y: edge,
            interleaved_rgba: rgba,
        })
    }
}

/// Copy the overlap between one decoded full block and the requested region
/// into the output slab of the current (time, channel) pair.
#[allow(clippy::too_many_arguments)]
fn copy_block_overlap<T: Element>(
    decoded: &[u8],
    level: &PyramidLevel,
    block: (usize, usize, usize),
    begin: &Index5D,
    end: &Index5D,
    shape: &Size5D,
    slab_offset: usize,
    out: &mut [T],
) {
    let (bx, by, bz) = block;
    let block_size = level.block_size;
    let origin = (bx * block_size.x, by * block_size.y, bz * block_size.z);

    let x0 = begin.x.max(origin.0);
    let x1 = end.x.min(origin.0 + block_size.x);
    let y0 = begin.y.max(origin.1);
    let y1 = end.y.min(origin.1 + block_size.y);
    let z0 = begin.z.max(origin.2);
    let z1 = end.z.min(origin.2 + block_size.z);
    let run = x1 - x0;

    for z in z0..z1 {
        for y in y0..y1 {
            let src =
                ((z - origin.2) * block_size.y + (y - origin.1)) * block_size.x + (x0 - origin.0);
            let dst = slab_offset
                + ((z - begin.z) * shape.y + (y - begin.y)) * shape.x
                + (x0 - begin.x);
            for i in 0..run {
                let at = (src + i) * T::BYTES;
                out[dst + i] = T::from_le(&decoded[at..at + T::BYTES]);
            }
        }
    }
}
