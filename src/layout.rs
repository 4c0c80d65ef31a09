//! Pyramid layout - how a dataset divides into resolution levels and storage blocks

use crate::error::{ReaderError, Result};
use crate::types::{ElementKind, Size5D};
use crate::utils::ceil_div;
use serde::{Deserialize, Serialize};

/// One resolution level of a dataset
///
/// `image_size` is the logical voxel extent at this level, `block_size` the
/// shape of the storage blocks it is chunked into. Blocks span only the
/// spatial axes: `block_size.c == block_size.t == 1`, one chunked 3D
/// sub-volume per (time point, channel).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PyramidLevel {
    pub image_size: Size5D,
    pub block_size: Size5D,
}

impl PyramidLevel {
    pub fn new(image_size: Size5D, block_size: Size5D) -> Self {
        Self {
            image_size,
            block_size,
        }
    }

    /// Number of blocks along each spatial axis, as (x, y, z)
    pub fn block_grid(&self) -> (usize, usize, usize) {
        (
            ceil_div(self.image_size.x, self.block_size.x),
            ceil_div(self.image_size.y, self.block_size.y),
            ceil_div(self.image_size.z, self.block_size.z),
        )
    }

    /// Total number of blocks in one (time point, channel) sub-volume
    pub fn blocks_per_subvolume(&self) -> usize {
        let (gx, gy, gz) = self.block_grid();
        gx * gy * gz
    }

    /// Linear index of the block at grid coordinates (bx, by, bz); x fastest
    pub fn block_index(&self, bx: usize, by: usize, bz: usize) -> usize {
        let (gx, gy, _) = self.block_grid();
        (bz * gy + by) * gx + bx
    }

    /// Number of voxels one full block holds
    pub fn block_element_count(&self) -> usize {
        self.block_size.x * self.block_size.y * self.block_size.z
    }

    /// Voxel range covered by a block on each spatial axis, clamped to the
    /// image size: ((x0, x1), (y0, y1), (z0, z1)), half-open
    pub fn block_extent(
        &self,
        bx: usize,
        by: usize,
        bz: usize,
    ) -> ((usize, usize), (usize, usize), (usize, usize)) {
        let clamp = |b: usize, step: usize, size: usize| {
            let start = b * step;
            (start, (start + step).min(size))
        };
        (
            clamp(bx, self.block_size.x, self.image_size.x),
            clamp(by, self.block_size.y, self.image_size.y),
            clamp(bz, self.block_size.z, self.image_size.z),
        )
    }

    /// Inclusive grid coordinate ranges of the blocks intersecting the
    /// half-open spatial region `[begin, end)`; callers must pass a
    /// non-empty region.
    pub fn intersecting_blocks(
        &self,
        begin: (usize, usize, usize),
        end: (usize, usize, usize),
    ) -> ((usize, usize), (usize, usize), (usize, usize)) {
        (
            (begin.0 / self.block_size.x, (end.0 - 1) / self.block_size.x),
            (begin.1 / self.block_size.y, (end.1 - 1) / self.block_size.y),
            (begin.2 / self.block_size.z, (end.2 - 1) / self.block_size.z),
        )
    }
}

/// Full pyramid description of one dataset: ordered resolution levels plus
/// the stored element kind. Level 0 is the finest (full) resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetLayout {
    pub element: ElementKind,
    pub levels: Vec<PyramidLevel>,
}

impl DatasetLayout {
    /// Build a layout, validating the pyramid invariants:
    /// at least one level, no zero axis, blocks spanning only spatial axes,
    /// spatial sizes non-increasing towards coarser levels, and channel and
    /// time counts identical across levels.
    pub fn new(element: ElementKind, levels: Vec<PyramidLevel>) -> Result<Self> {
        if levels.is_empty() {
            return Err(ReaderError::InvalidFormat(
                "dataset has no resolution levels".to_string(),
            ));
        }

        for (index, level) in levels.iter().enumerate() {
            let size = &level.image_size;
            if size.x == 0 || size.y == 0 || size.z == 0 || size.c == 0 || size.t == 0 {
                return Err(ReaderError::InvalidFormat(format!(
                    "resolution level {index} has a zero-sized axis ({size})"
                )));
            }
            let block = &level.block_size;
            if block.x == 0 || block.y == 0 || block.z == 0 {
                return Err(ReaderError::InvalidFormat(format!(
                    "resolution level {index} has a zero-sized block axis ({block})"
                )));
            }
            if block.c != 1 || block.t != 1 {
                return Err(ReaderError::InvalidFormat(format!(
                    "resolution level {index} blocks must span one channel and one time point ({block})"
                )));
            }
        }

        for pair in levels.windows(2) {
            let (finer, coarser) = (&pair[0].image_size, &pair[1].image_size);
            if coarser.x > finer.x || coarser.y > finer.y || coarser.z > finer.z {
                return Err(ReaderError::InvalidFormat(format!(
                    "resolution levels not ordered fine to coarse ({finer} then {coarser})"
                )));
            }
            if coarser.c != finer.c || coarser.t != finer.t {
                return Err(ReaderError::InvalidFormat(format!(
                    "channel/time counts differ between resolution levels ({finer} then {coarser})"
                )));
            }
        }

        Ok(Self { element, levels })
    }

    /// Number of resolution levels
    pub fn resolution_count(&self) -> usize {
        self.levels.len()
    }

    /// Level at `resolution`, or a range error when the index exceeds the
    /// pyramid depth
    pub fn level(&self, resolution: usize) -> Result<&PyramidLevel> {
        self.levels.get(resolution).ok_or_else(|| {
            ReaderError::OutOfBounds(format!(
                "resolution index {resolution} exceeds pyramid depth {}",
                self.levels.len()
            ))
        })
    }

    /// Number of time points (identical at every level)
    pub fn time_count(&self) -> usize {
        self.levels[0].image_size.t
    }

    /// Number of channels (identical at every level)
    pub fn channel_count(&self) -> usize {
        self.levels[0].image_size.c
    }
}
