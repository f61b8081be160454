//! MPlayer 文字輸出解析
//!
//! MPlayer 沒有版本化的機器可讀輸出，這裡集中所有依賴字串格式的判斷。

use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

pub const FILE_NOT_FOUND_MARKER: &str = "File not found";
pub const DECODE_ERROR_MARKER: &str = "Error while decoding frame";

static REGEX_LENGTH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"ID_LENGTH=([^\r\n]*)").expect("Invalid regex"));

static REGEX_WIDTH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"ID_VIDEO_WIDTH=\s*(\d+)").expect("Invalid regex"));

static REGEX_HEIGHT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"ID_VIDEO_HEIGHT=\s*(\d+)").expect("Invalid regex"));

// 例如: VO: [jpeg] 640x480 => 640x480 Planar YV12
static REGEX_OUTPUT_GEOMETRY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"VO: \[jpeg\] \S+ => (\d+)x(\d+) ").expect("Invalid regex")
});

/// 影像尺寸（像素）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Dimension {
    pub width: u32,
    pub height: u32,
}

impl Dimension {
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// 寬高皆大於 0
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    /// 等比例縮放到指定寬度
    #[must_use]
    pub fn scaled_to_width(&self, width: u32) -> Self {
        let height = u64::from(self.height) * u64::from(width) / u64::from(self.width.max(1));
        Self::new(width, u32::try_from(height).unwrap_or(u32::MAX))
    }
}

/// 解析 `ID_LENGTH=<秒>`，回傳毫秒
#[must_use]
pub fn parse_duration_ms(output: &str) -> Option<u64> {
    let raw = REGEX_LENGTH.captures(output)?.get(1)?.as_str().trim();
    let seconds: f64 = raw.parse().ok()?;
    if !seconds.is_finite() || seconds < 0.0 {
        return None;
    }
    Some((seconds * 1000.0).round() as u64)
}

/// 解析 `ID_VIDEO_WIDTH` / `ID_VIDEO_HEIGHT`，兩者都要有才算
#[must_use]
pub fn parse_dimension(output: &str) -> Option<Dimension> {
    let width = REGEX_WIDTH.captures(output)?.get(1)?.as_str().parse().ok()?;
    let height = REGEX_HEIGHT.captures(output)?.get(1)?.as_str().parse().ok()?;
    Some(Dimension::new(width, height))
}

/// 解析 JPEG 輸出端回報的實際解碼尺寸
#[must_use]
pub fn parse_output_geometry(output: &str) -> Option<Dimension> {
    let caps = REGEX_OUTPUT_GEOMETRY.captures(output)?;
    let width = caps.get(1)?.as_str().parse().ok()?;
    let height = caps.get(2)?.as_str().parse().ok()?;
    Some(Dimension::new(width, height))
}

#[must_use]
pub fn is_file_not_found(output: &str) -> bool {
    output.contains(FILE_NOT_FOUND_MARKER)
}

#[must_use]
pub fn has_decode_error(output: &str) -> bool {
    output.contains(DECODE_ERROR_MARKER)
}

/// 是否在抱怨 `-lavdopts wait_keyframe` 不被支援
#[must_use]
pub fn rejects_wait_keyframe(output: &str) -> bool {
    let lower = output.to_lowercase();
    let complains = ["unknown", "suboption", "error"]
        .iter()
        .any(|marker| lower.contains(marker));
    let mentions_option = lower.contains("lavdopts") || lower.contains("wait_keyframe");
    complains && mentions_option
}

/// 輸出的第一行
#[must_use]
pub fn first_line(output: &str) -> &str {
    output.lines().next().unwrap_or_default().trim_end()
}
