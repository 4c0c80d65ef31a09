//! Container authoring
//!
//! `ContainerWriter` builds I5D containers for tests, benches and demos, and
//! drives the append path a single SWMR writer uses to add time points to a
//! live file. It is deliberately not a conversion pipeline: blocks are
//! written one full (zero-padded) block at a time.

use crate::compression::{compress_block, Compression};
use crate::container::{
    BlobRef, BlockKey, ChunkTable, ContainerCatalog, ContainerFile, DatasetRecord,
    HistogramRecord, ThumbnailRecord, HEADER_LEN, TRAILER_MAGIC,
};
use crate::error::{ReaderError, Result};
use crate::layout::{DatasetLayout, PyramidLevel};
use crate::metadata;
use crate::types::{ColorInfo, Element, ElementKind, ImageExtent, IndexTCR, Parameters, TimeInfo};
use crate::utils::calculate_checksum;
use chrono::Utc;
use log::debug;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

/// Everything needed to declare one dataset
#[derive(Debug, Clone)]
pub struct DatasetSpec {
    pub element: ElementKind,
    /// Resolution levels, finest first
    pub levels: Vec<PyramidLevel>,
    pub compression: Compression,
    pub extent: ImageExtent,
    /// One entry per time point; length must match the level time count
    pub time_info: Vec<TimeInfo>,
    /// One entry per channel; length must match the level channel count
    pub color_info: Vec<ColorInfo>,
    /// Additional free-form sections merged into the parameters block
    pub extra_sections: Parameters,
}

/// Writes I5D containers
///
/// Blobs go to the file as they are submitted; the catalog, chunk table and
/// trailer are written by [`finish`](Self::finish). A writer dropped without
/// `finish` leaves no valid footer behind (for `append`, the previous footer
/// remains the live one).
pub struct ContainerWriter {
    file: File,
    catalog: ContainerCatalog,
    table: ChunkTable,
    cursor: u64,
}

impl ContainerWriter {
    /// Create a new container, truncating any existing file
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path.as_ref())?;
        file.write_all(crate::I5D_MAGIC)?;
        file.write_all(&crate::I5D_FORMAT_VERSION.to_le_bytes())?;

        Ok(Self {
            file,
            catalog: ContainerCatalog {
                writer: format!("ims5d {}", crate::I5D_VERSION),
                created_at: Utc::now(),
                datasets: Vec::new(),
            },
            table: ChunkTable::default(),
            cursor: HEADER_LEN,
        })
    }

    /// Reopen an existing container for appending.
    ///
    /// New blobs land after the current end of file and the superseded
    /// footer is left in place, so concurrent SWMR readers never observe a
    /// torn trailer at the old file length.
    pub fn append(path: impl AsRef<Path>) -> Result<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path.as_ref())?;

        let mut header = [0u8; HEADER_LEN as usize];
        file.read_exact(&mut header)?;
        if &header[0..4] != crate::I5D_MAGIC {
            return Err(ReaderError::InvalidFormat(format!(
                "{} is not an I5D container",
                path.as_ref().display()
            )));
        }
        let version = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
        if version != crate::I5D_FORMAT_VERSION {
            return Err(ReaderError::UnsupportedVersion(version));
        }

        let (catalog, table, file_len) = ContainerFile::load_footer(&mut file)?;
        Ok(Self {
            file,
            catalog,
            table,
            cursor: file_len,
        })
    }

    /// Declare a dataset; returns its index for subsequent writes
    pub fn add_dataset(&mut self, spec: DatasetSpec) -> Result<usize> {
        let layout = DatasetLayout::new(spec.element, spec.levels.clone())?;
        if spec.time_info.len() != layout.time_count() {
            return Err(ReaderError::InvalidFormat(format!(
                "dataset declares {} time points but {} time stamps",
                layout.time_count(),
                spec.time_info.len()
            )));
        }
        if let Some(bad) = spec.time_info.iter().find(|t| !t.is_valid()) {
            return Err(ReaderError::InvalidFormat(format!(
                "time stamp exceeds one day: {bad:?}"
            )));
        }
        if spec.color_info.len() != layout.channel_count() {
            return Err(ReaderError::InvalidFormat(format!(
                "dataset declares {} channels but {} color entries",
                layout.channel_count(),
                spec.color_info.len()
            )));
        }

        let info = metadata::encode_dataset_info(
            &spec.extent,
            &spec.time_info,
            &spec.color_info,
            spec.extra_sections,
        );
        self.catalog.datasets.push(DatasetRecord {
            element: spec.element,
            compression_code: spec.compression.code(),
            levels: spec.levels,
            info,
            histograms: Vec::new(),
            thumbnail: None,
        });
        Ok(self.catalog.datasets.len() - 1)
    }

    /// Write one full block of samples at the given grid coordinates.
    ///
    /// Edge blocks must be zero-padded to the full block shape by the
    /// caller; `samples` is always `block_element_count()` long and laid out
    /// row-major (z, y, x) with x fastest. Rewriting a block replaces its
    /// table entry (the superseded blob becomes dead bytes).
    pub fn write_block<T: Element>(
        &mut self,
        dataset: usize,
        resolution: usize,
        time: usize,
        channel: usize,
        block: (usize, usize, usize),
        samples: &[T],
    ) -> Result<()> {
        let record = self.dataset(dataset)?;
        if record.element != T::KIND {
            return Err(ReaderError::TypeMismatch {
                requested: T::KIND,
                actual: record.element,
            });
        }
        let compression = record.compression()?;
        let layout = record.layout()?;
        let level = *layout.level(resolution)?;
        if time >= layout.time_count() || channel >= layout.channel_count() {
            return Err(ReaderError::OutOfBounds(format!(
                "block at time {time}, channel {channel} outside dataset of {}x{} (t x c)",
                layout.time_count(),
                layout.channel_count()
            )));
        }
        let (gx, gy, gz) = level.block_grid();
        let (bx, by, bz) = block;
        if bx >= gx || by >= gy || bz >= gz {
            return Err(ReaderError::OutOfBounds(format!(
                "block ({bx}, {by}, {bz}) outside grid of {gx}x{gy}x{gz}"
            )));
        }
        if samples.len() != level.block_element_count() {
            return Err(ReaderError::OutOfBounds(format!(
                "block expects {} samples, got {}",
                level.block_element_count(),
                samples.len()
            )));
        }

        let mut raw = Vec::with_capacity(samples.len() * T::BYTES);
        for sample in samples {
            sample.write_le(&mut raw);
        }
        let compressed = compress_block(compression, T::BYTES, &raw)?;
        let blob = self.write_blob(&compressed)?;
        let key = BlockKey::new(
            dataset,
            resolution,
            time,
            channel,
            level.block_index(bx, by, bz),
        );
        self.table.blocks.insert(key, blob);
        Ok(())
    }

    /// Store the precomputed histogram for one (time, channel, resolution)
    pub fn write_histogram(
        &mut self,
        dataset: usize,
        index: IndexTCR,
        min: u32,
        max: u32,
        bins: &[u64],
    ) -> Result<()> {
        let record = self.dataset(dataset)?;
        let layout = record.layout()?;
        layout.level(index.r)?;
        if index.t >= layout.time_count() || index.c >= layout.channel_count() {
            return Err(ReaderError::OutOfBounds(format!(
                "histogram selection t={}, c={} outside dataset",
                index.t, index.c
            )));
        }
        if bins.is_empty() {
            return Err(ReaderError::InvalidFormat(
                "histogram needs at least one bin".to_string(),
            ));
        }

        let mut raw = Vec::with_capacity(bins.len() * 8);
        for bin in bins {
            raw.extend_from_slice(&bin.to_le_bytes());
        }
        let blob = self.write_blob(&raw)?;
        let record = &mut self.catalog.datasets[dataset];
        record.histograms.retain(|h| {
            !(h.time as usize == index.t
                && h.channel as usize == index.c
                && h.resolution as usize == index.r)
        });
        record.histograms.push(HistogramRecord {
            time: index.t as u32,
            channel: index.c as u32,
            resolution: index.r as u32,
            min,
            max,
            blob,
        });
        Ok(())
    }

    /// Store the RGBA8 thumbnail
    pub fn write_thumbnail(
        &mut self,
        dataset: usize,
        size_x: u32,
        size_y: u32,
        interleaved_rgba: &[u8],
    ) -> Result<()> {
        self.dataset(dataset)?;
        let expected = size_x as usize * size_y as usize * 4;
        if interleaved_rgba.len() != expected {
            return Err(ReaderError::InvalidFormat(format!(
                "thumbnail of {size_x}x{size_y} needs {expected} bytes, got {}",
                interleaved_rgba.len()
            )));
        }

        let blob = self.write_blob(interleaved_rgba)?;
        self.catalog.datasets[dataset].thumbnail = Some(ThumbnailRecord {
            size_x,
            size_y,
            blob,
        });
        Ok(())
    }

    /// Grow a dataset by `time_info.len()` time points (the SWMR append
    /// scenario). Blocks for the new time points are written afterwards with
    /// [`write_block`](Self::write_block).
    pub fn append_time_points(&mut self, dataset: usize, time_info: &[TimeInfo]) -> Result<()> {
        self.dataset(dataset)?;
        if let Some(bad) = time_info.iter().find(|t| !t.is_valid()) {
            return Err(ReaderError::InvalidFormat(format!(
                "time stamp exceeds one day: {bad:?}"
            )));
        }
        let record = &mut self.catalog.datasets[dataset];
        let existing = record.levels[0].image_size.t;
        for level in &mut record.levels {
            level.image_size.t += time_info.len();
        }
        metadata::append_time_info(existing, time_info, &mut record.info);
        Ok(())
    }

    /// Write the catalog, chunk table and trailer, completing the container
    pub fn finish(mut self) -> Result<()> {
        let catalog_bytes = serde_json::to_vec_pretty(&self.catalog)?;
        let table_bytes = bincode::serialize(&self.table)?;

        let catalog_offset = self.cursor;
        self.write_blob(&catalog_bytes)?;
        let table_offset = self.cursor;
        self.write_blob(&table_bytes)?;

        let mut footer = catalog_bytes.clone();
        footer.extend_from_slice(&table_bytes);
        let crc = calculate_checksum(&footer);

        let mut trailer = Vec::with_capacity(40);
        trailer.extend_from_slice(&catalog_offset.to_le_bytes());
        trailer.extend_from_slice(&(catalog_bytes.len() as u64).to_le_bytes());
        trailer.extend_from_slice(&table_offset.to_le_bytes());
        trailer.extend_from_slice(&(table_bytes.len() as u64).to_le_bytes());
        trailer.extend_from_slice(&crc.to_le_bytes());
        trailer.extend_from_slice(TRAILER_MAGIC);
        self.write_blob(&trailer)?;

        self.file.flush()?;
        self.file.sync_all()?;
        debug!(
            "finished container: {} dataset(s), {} block(s), {} bytes",
            self.catalog.datasets.len(),
            self.table.blocks.len(),
            self.cursor
        );
        Ok(())
    }

    fn dataset(&self, index: usize) -> Result<&DatasetRecord> {
        let count = self.catalog.datasets.len();
        self.catalog
            .datasets
            .get(index)
            .ok_or(ReaderError::DatasetIndex { index, count })
    }

    fn write_blob(&mut self, data: &[u8]) -> Result<BlobRef> {
        self.file.seek(SeekFrom::Start(self.cursor))?;
        self.file.write_all(data)?;
        let blob = BlobRef {
            offset: self.cursor,
            len: data.len() as u64,
        };
        self.cursor += data.len() as u64;
        Ok(blob)
    }
}
