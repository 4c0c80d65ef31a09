//! Dataset metadata and the section/key decoder behind it
//!
//! Containers describe extent, acquisition times and channel rendering as
//! two-level string sections (the same grammar the file's `Parameters` block
//! exposes verbatim). This module owns the translation between those
//! sections and the typed values handed to callers, in both directions: the
//! reader decodes, the writer encodes. Decoded values are independent owned
//! copies; nothing here keeps references into the container.

use crate::compression::Compression;
use crate::container::DatasetRecord;
use crate::error::{ReaderError, Result};
use crate::layout::PyramidLevel;
use crate::types::{
    Color, ColorInfo, ColorMode, ImageExtent, ParameterSection, Parameters, TimeInfo,
};
use crate::utils::split_fields;
use serde::{Deserialize, Serialize};

/// Section holding the physical extent
pub const IMAGE_SECTION: &str = "Image";
/// Section holding per-time-point acquisition stamps
pub const TIME_INFO_SECTION: &str = "TimeInfo";
/// Prefix of the per-channel sections ("Channel 0", "Channel 1", ...)
pub const CHANNEL_SECTION_PREFIX: &str = "Channel ";

/// Everything `read_metadata` returns for one dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetMetadata {
    /// Resolution levels, finest first
    pub pyramid: Vec<PyramidLevel>,
    pub extent: ImageExtent,
    /// One entry per time point at resolution 0
    pub time_info: Vec<TimeInfo>,
    /// One entry per channel
    pub color_info: Vec<ColorInfo>,
    /// Storage codec, informational only; reads decode transparently
    pub compression: Compression,
}

/// Decode the full metadata set of one dataset record
pub fn decode_dataset_metadata(record: &DatasetRecord) -> Result<DatasetMetadata> {
    let layout = record.layout()?;
    Ok(DatasetMetadata {
        pyramid: layout.levels.clone(),
        extent: decode_extent(&record.info)?,
        time_info: decode_time_info(&record.info, layout.time_count())?,
        color_info: decode_color_info(&record.info, layout.channel_count())?,
        compression: record.compression()?,
    })
}

/// Decode the `Image` section into the physical bounding box
pub fn decode_extent(info: &Parameters) -> Result<ImageExtent> {
    let section = info.get(IMAGE_SECTION).ok_or_else(|| {
        ReaderError::InvalidFormat(format!("missing {IMAGE_SECTION:?} metadata section"))
    })?;
    let field = |key: &str| -> Result<f32> {
        let value = section.get(key).ok_or_else(|| {
            ReaderError::InvalidFormat(format!("missing {key:?} in {IMAGE_SECTION:?} section"))
        })?;
        parse_f32(key, value)
    };
    let extent = ImageExtent::new(
        field("ExtMin0")?,
        field("ExtMin1")?,
        field("ExtMin2")?,
        field("ExtMax0")?,
        field("ExtMax1")?,
        field("ExtMax2")?,
    );
    if !extent.is_valid() {
        return Err(ReaderError::InvalidFormat(format!(
            "image extent has min > max or non-finite bounds: {extent:?}"
        )));
    }
    Ok(extent)
}

/// Decode the `TimeInfo` section; keys are `TimePoint1..TimePointN`.
///
/// A missing key yields the zero timestamp (day 0, midnight), matching the
/// fill behaviour of files written without acquisition clocks; a present but
/// unparseable value is an error.
pub fn decode_time_info(info: &Parameters, time_count: usize) -> Result<Vec<TimeInfo>> {
    let section = info.get(TIME_INFO_SECTION);
    let mut result = Vec::with_capacity(time_count);
    for index in 0..time_count {
        let key = format!("TimePoint{}", index + 1);
        match section.and_then(|s| s.get(&key)) {
            Some(text) => result.push(TimeInfo::from_text(text)?),
            None => result.push(TimeInfo::default()),
        }
    }
    Ok(result)
}

/// Decode the per-channel sections into rendering metadata
pub fn decode_color_info(info: &Parameters, channel_count: usize) -> Result<Vec<ColorInfo>> {
    let mut result = Vec::with_capacity(channel_count);
    for channel in 0..channel_count {
        let name = format!("{CHANNEL_SECTION_PREFIX}{channel}");
        match info.get(&name) {
            Some(section) => result.push(decode_channel_section(&name, section)?),
            None => result.push(ColorInfo::default()),
        }
    }
    Ok(result)
}

fn decode_channel_section(name: &str, section: &ParameterSection) -> Result<ColorInfo> {
    let mode = match section.get("ColorMode").map(String::as_str) {
        None | Some("BaseColor") => {
            let color = match section.get("Color") {
                Some(value) => parse_color(name, value)?,
                None => Color::white(),
            };
            ColorMode::BaseColor(color)
        }
        Some("TableColor") => {
            let value = section.get("ColorTable").ok_or_else(|| {
                ReaderError::InvalidFormat(format!("{name}: TableColor without a ColorTable"))
            })?;
            let table = parse_color_table(name, value)?;
            if table.is_empty() {
                return Err(ReaderError::InvalidFormat(format!(
                    "{name}: color table is empty"
                )));
            }
            ColorMode::Table(table)
        }
        Some(other) => {
            return Err(ReaderError::InvalidFormat(format!(
                "{name}: unknown ColorMode {other:?}"
            )))
        }
    };

    let scalar = |key: &str, default: f32| -> Result<f32> {
        match section.get(key) {
            Some(value) => parse_f32(key, value),
            None => Ok(default),
        }
    };
    let (range_min, range_max) = match section.get("ColorRange") {
        Some(value) => {
            let fields = split_fields(value);
            if fields.len() != 2 {
                return Err(ReaderError::InvalidFormat(format!(
                    "{name}: ColorRange needs two fields, got {value:?}"
                )));
            }
            (parse_f32("ColorRange", fields[0])?, parse_f32("ColorRange", fields[1])?)
        }
        None => (0.0, 255.0),
    };

    Ok(ColorInfo {
        mode,
        opacity: scalar("ColorOpacity", 1.0)?,
        range_min,
        range_max,
        gamma_correction: scalar("GammaCorrection", 1.0)?,
    })
}

/// Encode extent, time points, channels and any extra sections into the
/// container's section grammar
pub fn encode_dataset_info(
    extent: &ImageExtent,
    time_info: &[TimeInfo],
    color_info: &[ColorInfo],
    extra: Parameters,
) -> Parameters {
    let mut info = extra;
    encode_extent(extent, &mut info);
    encode_time_info(time_info, &mut info);
    encode_color_info(color_info, &mut info);
    info
}

/// Write the `Image` section
pub fn encode_extent(extent: &ImageExtent, info: &mut Parameters) {
    let section = info.entry(IMAGE_SECTION.to_string()).or_default();
    section.insert("ExtMin0".to_string(), format_f32(extent.min_x));
    section.insert("ExtMin1".to_string(), format_f32(extent.min_y));
    section.insert("ExtMin2".to_string(), format_f32(extent.min_z));
    section.insert("ExtMax0".to_string(), format_f32(extent.max_x));
    section.insert("ExtMax1".to_string(), format_f32(extent.max_y));
    section.insert("ExtMax2".to_string(), format_f32(extent.max_z));
}

/// Write the `TimeInfo` section (keys are 1-based)
pub fn encode_time_info(time_info: &[TimeInfo], info: &mut Parameters) {
    let section = info.entry(TIME_INFO_SECTION.to_string()).or_default();
    for (index, time) in time_info.iter().enumerate() {
        section.insert(format!("TimePoint{}", index + 1), time.to_text());
    }
}

/// Append further time points after the existing `existing_count` entries
pub fn append_time_info(existing_count: usize, time_info: &[TimeInfo], info: &mut Parameters) {
    let section = info.entry(TIME_INFO_SECTION.to_string()).or_default();
    for (index, time) in time_info.iter().enumerate() {
        section.insert(
            format!("TimePoint{}", existing_count + index + 1),
            time.to_text(),
        );
    }
}

/// Write one `Channel <c>` section per channel
pub fn encode_color_info(color_info: &[ColorInfo], info: &mut Parameters) {
    for (channel, color) in color_info.iter().enumerate() {
        let section = info
            .entry(format!("{CHANNEL_SECTION_PREFIX}{channel}"))
            .or_default();
        match &color.mode {
            ColorMode::BaseColor(base) => {
                section.insert("ColorMode".to_string(), "BaseColor".to_string());
                section.insert("Color".to_string(), format_color(base));
            }
            ColorMode::Table(table) => {
                section.insert("ColorMode".to_string(), "TableColor".to_string());
                let flat = table
                    .iter()
                    .map(format_color)
                    .collect::<Vec<_>>()
                    .join(" ");
                section.insert("ColorTable".to_string(), flat);
            }
        }
        section.insert("ColorOpacity".to_string(), format_f32(color.opacity));
        section.insert(
            "ColorRange".to_string(),
            format!(
                "{} {}",
                format_f32(color.range_min),
                format_f32(color.range_max)
            ),
        );
        section.insert(
            "GammaCorrection".to_string(),
            format_f32(color.gamma_correction),
        );
    }
}

fn parse_f32(key: &str, value: &str) -> Result<f32> {
    value.trim().parse::<f32>().map_err(|_| {
        ReaderError::InvalidFormat(format!("{key}: not a number: {value:?}"))
    })
}

fn parse_color(name: &str, value: &str) -> Result<Color> {
    let fields = split_fields(value);
    if fields.len() != 3 {
        return Err(ReaderError::InvalidFormat(format!(
            "{name}: color needs three fields, got {value:?}"
        )));
    }
    Ok(Color::new(
        parse_f32("Color", fields[0])?,
        parse_f32("Color", fields[1])?,
        parse_f32("Color", fields[2])?,
        1.0,
    ))
}

fn parse_color_table(name: &str, value: &str) -> Result<Vec<Color>> {
    let fields = split_fields(value);
    if fields.len() % 3 != 0 {
        return Err(ReaderError::InvalidFormat(format!(
            "{name}: color table length {} is not a multiple of three",
            fields.len()
        )));
    }
    fields
        .chunks_exact(3)
        .map(|rgb| {
            Ok(Color::new(
                parse_f32("ColorTable", rgb[0])?,
                parse_f32("ColorTable", rgb[1])?,
                parse_f32("ColorTable", rgb[2])?,
                1.0,
            ))
        })
        .collect()
}

fn format_f32(value: f32) -> String {
    format!("{value}")
}

fn format_color(color: &Color) -> String {
    format!(
        "{} {} {}",
        format_f32(color.red),
        format_f32(color.green),
        format_f32(color.blue)
    )
}
