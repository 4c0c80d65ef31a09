//! ims5d - random access to chunked 5D multi-resolution microscopy volumes
//!
//! A pure Rust reader for the I5D container format: image pyramids over the
//! five logical axes X, Y, Z, Channel and Time, stored as compressed blocks
//! with sidecar metadata.
//!
//! # Features
//!
//! - Typed region reads (u8/u16/u32/f32) assembled from the storage blocks
//!   intersecting the request, at any resolution level
//! - Pyramid, extent, acquisition-time, channel-color and compression
//!   metadata decode
//! - Per-(time, channel, resolution) histograms and RGBA thumbnails
//! - Single-writer/multiple-reader sharing: readers tolerate a concurrent
//!   writer appending time points
//! - Gzip and zstd block codecs, optionally behind a byte-shuffle filter
//!
//! # Example
//!
//! ```rust,ignore
//! use ims5d::{ImageReaderU16, Index5D, ReadOptions};
//!
//! # fn example() -> ims5d::Result<()> {
//! let reader = ImageReaderU16::open("scan.i5d", 0, ReadOptions::default())?;
//! let metadata = reader.read_metadata()?;
//!
//! let size = metadata.pyramid[0].image_size;
//! let mut voxels = vec![0u16; 64 * 64 * size.z];
//! reader.read_region(
//!     Index5D::new(0, 0, 0, 0, 0),
//!     Index5D::new(64, 64, size.z, 1, 1),
//!     0,
//!     &mut voxels,
//! )?;
//! # Ok(())
//! # }
//! ```

pub mod access;
pub mod compression;
pub mod container;
pub mod error;
pub mod layout;
pub mod metadata;
pub mod types;
pub mod utils;
pub mod writer;

// Re-exports
pub use access::{
    file_images_information, ImageReader, ImageReaderFloat, ImageReaderU16, ImageReaderU32,
    ImageReaderU8, ReadOptions,
};
pub use compression::Compression;
pub use container::ContainerFile;
pub use error::{ReaderError, Result};
pub use layout::{DatasetLayout, PyramidLevel};
pub use metadata::DatasetMetadata;
pub use types::{
    Color, ColorInfo, ColorMode, Element, ElementKind, Histogram, ImageExtent, Index5D, IndexTCR,
    ParameterSection, Parameters, Size5D, Thumbnail, TimeInfo,
};
pub use writer::{ContainerWriter, DatasetSpec};

/// Version of the ims5d implementation
pub const I5D_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Magic number at the start of every I5D container
pub const I5D_MAGIC: &[u8; 4] = b"I5D\0";

/// Container format version this crate reads and writes
pub const I5D_FORMAT_VERSION: u32 = 1;
