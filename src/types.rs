//! Core value types for 5D image access

use crate::error::{ReaderError, Result};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use num_traits::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Nanoseconds in a day; `TimeInfo::nanoseconds_of_day` is always below this.
pub const NANOSECONDS_PER_DAY: u64 = 86_400 * 1_000_000_000;

/// Offset between chrono's day count from 0001-01-01 and the Julian day number.
const JULIAN_DAY_OF_CE: i64 = 1_721_425;

/// Voxel element types a dataset can store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum ElementKind {
    /// Unsigned 8-bit integer
    UInt8 = 0,
    /// Unsigned 16-bit integer
    UInt16 = 1,
    /// Unsigned 32-bit integer
    UInt32 = 2,
    /// 32-bit floating point
    Float32 = 3,
}

impl ElementKind {
    /// Size in bytes of one sample of this kind
    pub fn size_in_bytes(&self) -> usize {
        match self {
            ElementKind::UInt8 => 1,
            ElementKind::UInt16 => 2,
            ElementKind::UInt32 | ElementKind::Float32 => 4,
        }
    }

    /// Check if this is a floating point kind
    pub fn is_float(&self) -> bool {
        matches!(self, ElementKind::Float32)
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// A sample type an `ImageReader` can be bound to.
///
/// Implemented for `u8`, `u16`, `u32` and `f32`; the trait fixes the wire
/// width and the little-endian codec for one voxel sample.
pub trait Element: Copy + Default + ToPrimitive + Send + Sync + 'static {
    /// The runtime tag matching this type
    const KIND: ElementKind;
    /// Stored width in bytes
    const BYTES: usize;

    /// Decode one sample from `Self::BYTES` little-endian bytes.
    fn from_le(bytes: &[u8]) -> Self;

    /// Append one sample as little-endian bytes.
    fn write_le(self, out: &mut Vec<u8>);
}

impl Element for u8 {
    const KIND: ElementKind = ElementKind::UInt8;
    const BYTES: usize = 1;

    fn from_le(bytes: &[u8]) -> Self {
        bytes[0]
    }

    fn write_le(self, out: &mut Vec<u8>) {
        out.push(self);
    }
}

impl Element for u16 {
    const KIND: ElementKind = ElementKind::UInt16;
    const BYTES: usize = 2;

    fn from_le(bytes: &[u8]) -> Self {
        let mut buf = [0u8; 2];
        buf.copy_from_slice(&bytes[..2]);
        u16::from_le_bytes(buf)
    }

    fn write_le(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }
}

impl Element for u32 {
    const KIND: ElementKind = ElementKind::UInt32;
    const BYTES: usize = 4;

    fn from_le(bytes: &[u8]) -> Self {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(&bytes[..4]);
        u32::from_le_bytes(buf)
    }

    fn write_le(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }
}

impl Element for f32 {
    const KIND: ElementKind = ElementKind::Float32;
    const BYTES: usize = 4;

    fn from_le(bytes: &[u8]) -> Self {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(&bytes[..4]);
        f32::from_le_bytes(buf)
    }

    fn write_le(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }
}

/// A point in the 5D logical voxel space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Index5D {
    pub x: usize,
    pub y: usize,
    pub z: usize,
    pub c: usize,
    pub t: usize,
}

impl Index5D {
    /// Create a new index
    pub fn new(x: usize, y: usize, z: usize, c: usize, t: usize) -> Self {
        Self { x, y, z, c, t }
    }

    /// The origin (0, 0, 0, 0, 0)
    pub fn zero() -> Self {
        Self::new(0, 0, 0, 0, 0)
    }

    /// Component-wise `self <= other`
    pub fn all_le(&self, other: &Index5D) -> bool {
        self.x <= other.x
            && self.y <= other.y
            && self.z <= other.z
            && self.c <= other.c
            && self.t <= other.t
    }
}

impl fmt::Display for Index5D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "(x={}, y={}, z={}, c={}, t={})",
            self.x, self.y, self.z, self.c, self.t
        )
    }
}

/// An extent in the 5D logical voxel space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Size5D {
    pub x: usize,
    pub y: usize,
    pub z: usize,
    pub c: usize,
    pub t: usize,
}

impl Size5D {
    /// Create a new size
    pub fn new(x: usize, y: usize, z: usize, c: usize, t: usize) -> Self {
        Self { x, y, z, c, t }
    }

    /// Shape of the half-open region `[begin, end)`.
    ///
    /// Callers must ensure `begin.all_le(end)` first.
    pub fn between(begin: &Index5D, end: &Index5D) -> Self {
        Self::new(
            end.x - begin.x,
            end.y - begin.y,
            end.z - begin.z,
            end.c - begin.c,
            end.t - begin.t,
        )
    }

    /// Total number of voxels in this extent
    pub fn element_count(&self) -> usize {
        self.x * self.y * self.z * self.c * self.t
    }

    /// Whether `index` lies strictly inside this extent on every axis
    pub fn contains(&self, index: &Index5D) -> bool {
        index.x < self.x
            && index.y < self.y
            && index.z < self.z
            && index.c < self.c
            && index.t < self.t
    }

    /// Component-wise `index <= self`, for validating region end points
    pub fn bounds_end(&self, end: &Index5D) -> bool {
        end.x <= self.x && end.y <= self.y && end.z <= self.z && end.c <= self.c && end.t <= self.t
    }
}

impl fmt::Display for Size5D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{}x{}x{}x{}",
            self.x, self.y, self.z, self.c, self.t
        )
    }
}

/// Identifies one (time point, channel, resolution level) selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexTCR {
    pub t: usize,
    pub c: usize,
    pub r: usize,
}

impl IndexTCR {
    pub fn new(t: usize, c: usize, r: usize) -> Self {
        Self { t, c, r }
    }
}

/// Physical bounding box of a dataset
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct ImageExtent {
    pub min_x: f32,
    pub min_y: f32,
    pub min_z: f32,
    pub max_x: f32,
    pub max_y: f32,
    pub max_z: f32,
}

impl ImageExtent {
    pub fn new(min_x: f32, min_y: f32, min_z: f32, max_x: f32, max_y: f32, max_z: f32) -> Self {
        Self {
            min_x,
            min_y,
            min_z,
            max_x,
            max_y,
            max_z,
        }
    }

    /// min <= max on every axis, all bounds finite
    pub fn is_valid(&self) -> bool {
        self.min_x.is_finite()
            && self.max_x.is_finite()
            && self.min_y.is_finite()
            && self.max_y.is_finite()
            && self.min_z.is_finite()
            && self.max_z.is_finite()
            && self.min_x <= self.max_x
            && self.min_y <= self.max_y
            && self.min_z <= self.max_z
    }
}

/// Acquisition timestamp of one time point
///
/// Calendar date as a Julian day number plus nanoseconds from midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TimeInfo {
    pub julian_day: u32,
    pub nanoseconds_of_day: u64,
}

impl TimeInfo {
    pub fn new(julian_day: u32, nanoseconds_of_day: u64) -> Self {
        Self {
            julian_day,
            nanoseconds_of_day,
        }
    }

    /// Whether the time part lies within one day
    pub fn is_valid(&self) -> bool {
        self.nanoseconds_of_day < NANOSECONDS_PER_DAY
    }

    /// Parse the textual form `"2011-11-27 15:42:37.285"`.
    ///
    /// A date-only string sets the time to midnight; a time-only string sets
    /// the date to Julian day zero. The fractional second part is optional.
    pub fn from_text(text: &str) -> Result<Self> {
        let trimmed = text.trim();
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%.f") {
            return Ok(Self::from_date_time(dt.date(), dt.time()));
        }
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
            return Ok(Self::new(julian_day_of(date), 0));
        }
        if let Ok(time) = NaiveTime::parse_from_str(trimmed, "%H:%M:%S%.f") {
            return Ok(Self::new(0, nanoseconds_of(time)));
        }
        Err(ReaderError::InvalidFormat(format!(
            "unparseable timestamp: {trimmed:?}"
        )))
    }

    /// Render as `"2011-11-27 15:42:37.285"` (millisecond precision).
    pub fn to_text(&self) -> String {
        let date = NaiveDate::from_num_days_from_ce_opt(self.julian_day as i32 - JULIAN_DAY_OF_CE as i32);
        let seconds = (self.nanoseconds_of_day / 1_000_000_000) as u32;
        let nanos = (self.nanoseconds_of_day % 1_000_000_000) as u32;
        let time = NaiveTime::from_num_seconds_from_midnight_opt(seconds, nanos);
        match (date, time) {
            (Some(d), Some(t)) => format!("{} {}", d.format("%Y-%m-%d"), t.format("%H:%M:%S%.3f")),
            _ => String::new(),
        }
    }

    fn from_date_time(date: NaiveDate, time: NaiveTime) -> Self {
        Self::new(julian_day_of(date), nanoseconds_of(time))
    }
}

fn julian_day_of(date: NaiveDate) -> u32 {
    let days = chrono::Datelike::num_days_from_ce(&date) as i64 + JULIAN_DAY_OF_CE;
    days.max(0) as u32
}

fn nanoseconds_of(time: NaiveTime) -> u64 {
    time.num_seconds_from_midnight() as u64 * 1_000_000_000 + time.nanosecond() as u64
}

/// One RGBA color, components conventionally in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub red: f32,
    pub green: f32,
    pub blue: f32,
    pub alpha: f32,
}

impl Color {
    pub fn new(red: f32, green: f32, blue: f32, alpha: f32) -> Self {
        Self {
            red,
            green,
            blue,
            alpha,
        }
    }

    /// Opaque white, the conventional fallback channel color
    pub fn white() -> Self {
        Self::new(1.0, 1.0, 1.0, 1.0)
    }
}

/// How a channel maps sample values to colors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColorMode {
    /// One flat color scaled by intensity
    BaseColor(Color),
    /// A lookup table indexed by normalized intensity; never empty
    Table(Vec<Color>),
}

/// Per-channel rendering metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorInfo {
    pub mode: ColorMode,
    pub opacity: f32,
    pub range_min: f32,
    pub range_max: f32,
    pub gamma_correction: f32,
}

impl ColorInfo {
    /// Base-color channel with full opacity, unit gamma and the given range
    pub fn base(color: Color, range_min: f32, range_max: f32) -> Self {
        Self {
            mode: ColorMode::BaseColor(color),
            opacity: 1.0,
            range_min,
            range_max,
            gamma_correction: 1.0,
        }
    }
}

impl Default for ColorInfo {
    fn default() -> Self {
        Self::base(Color::white(), 0.0, 255.0)
    }
}

/// Voxel-value distribution for one (time, channel, resolution) selection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Histogram {
    /// Lower bound of the binned domain
    pub min: u32,
    /// Upper bound of the binned domain
    pub max: u32,
    /// Occupancy counts; at least one bin
    pub bins: Vec<u64>,
}

impl Histogram {
    /// Total number of counted samples
    pub fn total_count(&self) -> u64 {
        self.bins.iter().sum()
    }
}

/// Small RGBA8 preview of a dataset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thumbnail {
    pub size_x: u32,
    pub size_y: u32,
    /// Row-major, interleaved R,G,B,A; length is `size_x * size_y * 4`
    pub interleaved_rgba: Vec<u8>,
}

impl Thumbnail {
    /// Length invariant on the pixel buffer
    pub fn is_consistent(&self) -> bool {
        self.interleaved_rgba.len() == self.size_x as usize * self.size_y as usize * 4
    }
}

/// One named group of string parameters
pub type ParameterSection = BTreeMap<String, String>;

/// Free-form metadata: section name -> key -> value, two levels only
pub type Parameters = BTreeMap<String, ParameterSection>;
