//! Single-file I5D container: the storage engine behind the accessor
//!
//! Layout: an 8-byte header (magic + format version), an append-only body of
//! compressed voxel blocks and auxiliary blobs, and a footer written last: a
//! JSON catalog describing every dataset, a bincode chunk table mapping block
//! keys to blob locations, and a fixed trailer holding their offsets and a
//! CRC32. Appending writers emit a fresh footer after the old one, so a
//! reader always finds a complete trailer at the end of a quiescent file.

use crate::compression::Compression;
use crate::error::{ReaderError, Result};
use crate::layout::{DatasetLayout, PyramidLevel};
use crate::types::{ElementKind, IndexTCR, Parameters};
use crate::utils::verify_checksum;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use log::debug;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Header length: magic plus format version
pub(crate) const HEADER_LEN: u64 = 8;

/// Trailer length: four u64 offsets/lengths, CRC32, trailer magic
pub(crate) const TRAILER_LEN: u64 = 40;

/// Marks the trailer at the end of a complete footer
pub(crate) const TRAILER_MAGIC: &[u8; 4] = b"I5DT";

/// Location of one blob in the container body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobRef {
    pub offset: u64,
    pub len: u64,
}

/// Identifies one stored voxel block
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockKey {
    pub dataset: u32,
    pub resolution: u32,
    pub time: u32,
    pub channel: u32,
    /// Linear block index within the (time, channel) sub-volume, x fastest
    pub block: u64,
}

impl BlockKey {
    pub fn new(dataset: usize, resolution: usize, time: usize, channel: usize, block: usize) -> Self {
        Self {
            dataset: dataset as u32,
            resolution: resolution as u32,
            time: time as u32,
            channel: channel as u32,
            block: block as u64,
        }
    }
}

/// Block locations for every dataset in the container (bincode footer part)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChunkTable {
    pub blocks: BTreeMap<BlockKey, BlobRef>,
}

/// Stored histogram for one (time, channel, resolution) selection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistogramRecord {
    pub time: u32,
    pub channel: u32,
    pub resolution: u32,
    pub min: u32,
    pub max: u32,
    /// Little-endian u64 bin counts
    pub blob: BlobRef,
}

/// Stored RGBA8 preview
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThumbnailRecord {
    pub size_x: u32,
    pub size_y: u32,
    pub blob: BlobRef,
}

/// Catalog entry for one image dataset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetRecord {
    pub element: ElementKind,
    pub compression_code: u32,
    /// Resolution levels, finest first
    pub levels: Vec<PyramidLevel>,
    /// Section -> key -> value metadata (extent, time points, channels, ...)
    pub info: Parameters,
    pub histograms: Vec<HistogramRecord>,
    pub thumbnail: Option<ThumbnailRecord>,
}

impl DatasetRecord {
    /// Validated pyramid layout of this dataset
    pub fn layout(&self) -> Result<DatasetLayout> {
        DatasetLayout::new(self.element, self.levels.clone())
    }

    /// Decoded compression setting
    pub fn compression(&self) -> Result<Compression> {
        Compression::from_code(self.compression_code).ok_or_else(|| {
            ReaderError::InvalidFormat(format!(
                "unknown compression code {}",
                self.compression_code
            ))
        })
    }

    /// Stored histogram for the selection, if the writer emitted one
    pub fn find_histogram(&self, index: IndexTCR) -> Option<&HistogramRecord> {
        self.histograms.iter().find(|h| {
            h.time as usize == index.t
                && h.channel as usize == index.c
                && h.resolution as usize == index.r
        })
    }
}

/// Container-wide catalog (JSON footer part)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerCatalog {
    /// Tool that produced the container
    pub writer: String,
    pub created_at: DateTime<Utc>,
    pub datasets: Vec<DatasetRecord>,
}

struct LoadedState {
    file_len: u64,
    catalog: Arc<ContainerCatalog>,
    table: Arc<ChunkTable>,
}

/// An open I5D container file
///
/// Read-only handle shared by every query of an accessor. All blob reads go
/// through one file descriptor behind a mutex; the decoded catalog and chunk
/// table sit behind a read lock so SWMR refreshes can swap them atomically.
pub struct ContainerFile {
    path: PathBuf,
    swmr: bool,
    file: Mutex<File>,
    state: RwLock<LoadedState>,
}

impl ContainerFile {
    /// Open and validate a container.
    ///
    /// With `swmr` set, metadata and chunk locations are re-read from the
    /// footer whenever the file has grown since the last query, so time
    /// points appended by a concurrent writer become visible.
    pub fn open(path: impl AsRef<Path>, swmr: bool) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = File::open(&path)?;

        let mut header = [0u8; HEADER_LEN as usize];
        file.read_exact(&mut header).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                ReaderError::InvalidFormat(format!("{} is not an I5D container", path.display()))
            } else {
                ReaderError::Io(e)
            }
        })?;
        if &header[0..4] != crate::I5D_MAGIC {
            return Err(ReaderError::InvalidFormat(format!(
                "{} is not an I5D container",
                path.display()
            )));
        }
        let version = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
        if version != crate::I5D_FORMAT_VERSION {
            return Err(ReaderError::UnsupportedVersion(version));
        }

        let state = Self::load_state(&mut file)?;
        debug!(
            "opened container {} ({} dataset(s), {} block(s), swmr={})",
            path.display(),
            state.catalog.datasets.len(),
            state.table.blocks.len(),
            swmr
        );

        Ok(Self {
            path,
            swmr,
            file: Mutex::new(file),
            state: RwLock::new(state),
        })
    }

    /// Path this container was opened from
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether SWMR refresh is active
    pub fn swmr(&self) -> bool {
        self.swmr
    }

    /// Current catalog snapshot
    pub fn catalog(&self) -> Arc<ContainerCatalog> {
        Arc::clone(&self.state.read().catalog)
    }

    /// Current chunk table snapshot
    pub fn chunk_table(&self) -> Arc<ChunkTable> {
        Arc::clone(&self.state.read().table)
    }

    /// Catalog and chunk table taken from one footer load, so region reads
    /// never mix generations while a refresh swaps state underneath
    pub fn snapshot(&self) -> (Arc<ContainerCatalog>, Arc<ChunkTable>) {
        let state = self.state.read();
        (Arc::clone(&state.catalog), Arc::clone(&state.table))
    }

    /// Number of datasets in the container
    pub fn dataset_count(&self) -> usize {
        self.state.read().catalog.datasets.len()
    }

    /// Under SWMR, reload the footer when the file has grown; otherwise a
    /// no-op. Readers opened without SWMR never see a file change.
    pub fn refresh(&self) -> Result<()> {
        if !self.swmr {
            return Ok(());
        }
        let current_len = {
            let file = self.file.lock();
            file.metadata()?.len()
        };
        if current_len == self.state.read().file_len {
            return Ok(());
        }
        let new_state = {
            let mut file = self.file.lock();
            Self::load_state(&mut file)?
        };
        debug!(
            "refreshed container {} (file grew to {} bytes, {} block(s))",
            self.path.display(),
            new_state.file_len,
            new_state.table.blocks.len()
        );
        *self.state.write() = new_state;
        Ok(())
    }

    /// Read one blob from the container body
    pub fn read_blob(&self, blob: &BlobRef) -> Result<Bytes> {
        let file_len = self.state.read().file_len;
        let end = blob.offset.checked_add(blob.len).ok_or_else(|| {
            ReaderError::Corrupt(format!("blob offset overflow at {}", blob.offset))
        })?;
        if blob.offset < HEADER_LEN || end > file_len {
            return Err(ReaderError::Corrupt(format!(
                "blob at {}+{} outside container of {} bytes",
                blob.offset, blob.len, file_len
            )));
        }

        let mut data = vec![0u8; blob.len as usize];
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(blob.offset))?;
        file.read_exact(&mut data).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                ReaderError::Corrupt(format!("truncated blob at {}+{}", blob.offset, blob.len))
            } else {
                ReaderError::Io(e)
            }
        })?;
        Ok(Bytes::from(data))
    }

    pub(crate) fn load_footer(file: &mut File) -> Result<(ContainerCatalog, ChunkTable, u64)> {
        let state = Self::load_state(file)?;
        let catalog = (*state.catalog).clone();
        let table = (*state.table).clone();
        Ok((catalog, table, state.file_len))
    }

    fn load_state(file: &mut File) -> Result<LoadedState> {
        let file_len = file.metadata()?.len();
        if file_len < HEADER_LEN + TRAILER_LEN {
            return Err(ReaderError::Corrupt(format!(
                "container truncated at {file_len} bytes"
            )));
        }

        let mut trailer = [0u8; TRAILER_LEN as usize];
        file.seek(SeekFrom::Start(file_len - TRAILER_LEN))?;
        file.read_exact(&mut trailer)?;
        if &trailer[36..40] != TRAILER_MAGIC {
            return Err(ReaderError::Corrupt(
                "container footer trailer missing or incomplete".to_string(),
            ));
        }

        let read_u64 = |at: usize| {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(&trailer[at..at + 8]);
            u64::from_le_bytes(buf)
        };
        let catalog_ref = BlobRef {
            offset: read_u64(0),
            len: read_u64(8),
        };
        let table_ref = BlobRef {
            offset: read_u64(16),
            len: read_u64(24),
        };
        let mut crc = [0u8; 4];
        crc.copy_from_slice(&trailer[32..36]);
        let expected_crc = u32::from_le_bytes(crc);

        for blob in [&catalog_ref, &table_ref] {
            if blob.offset < HEADER_LEN || blob.offset + blob.len > file_len {
                return Err(ReaderError::Corrupt(
                    "container footer points outside the file".to_string(),
                ));
            }
        }

        let mut catalog_bytes = vec![0u8; catalog_ref.len as usize];
        file.seek(SeekFrom::Start(catalog_ref.offset))?;
        file.read_exact(&mut catalog_bytes)?;
        let mut table_bytes = vec![0u8; table_ref.len as usize];
        file.seek(SeekFrom::Start(table_ref.offset))?;
        file.read_exact(&mut table_bytes)?;

        let mut footer = catalog_bytes.clone();
        footer.extend_from_slice(&table_bytes);
        if !verify_checksum(&footer, expected_crc) {
            return Err(ReaderError::Corrupt(
                "container footer checksum mismatch".to_string(),
            ));
        }

        let catalog: ContainerCatalog = serde_json::from_slice(&catalog_bytes)?;
        let table: ChunkTable = bincode::deserialize(&table_bytes)?;

        Ok(LoadedState {
            file_len,
            catalog: Arc::new(catalog),
            table: Arc::new(table),
        })
    }
}
