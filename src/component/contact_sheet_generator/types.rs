use crate::config::GridLayout;
use crate::tools::Dimension;
use anyhow::{Result, ensure};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 單張預覽圖最多格數
pub const MAX_GRID_CELLS: u32 = 10_000;
/// JPEG 單邊上限
pub const MAX_SHEET_SIDE: u32 = 65_535;

/// 單張預覽圖的輸出需求
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputSpec {
    pub columns: u32,
    pub rows: u32,
    pub thumb_width: u32,
    pub border: u32,
    pub output_path: PathBuf,
}

impl OutputSpec {
    #[must_use]
    pub fn new(columns: u32, rows: u32, thumb_width: u32, border: u32, output_path: &Path) -> Self {
        Self {
            columns,
            rows,
            thumb_width,
            border,
            output_path: output_path.to_path_buf(),
        }
    }

    #[must_use]
    pub fn from_layout(layout: &GridLayout, output_path: &Path) -> Self {
        Self::new(
            layout.columns,
            layout.rows,
            layout.thumb_width,
            layout.border,
            output_path,
        )
    }

    /// 網格格數
    #[must_use]
    pub const fn cells(&self) -> u32 {
        self.columns.saturating_mul(self.rows)
    }

    /// 預覽圖寬度（含外框），溢位時回傳 `None`
    #[must_use]
    pub fn sheet_width(&self) -> Option<u32> {
        self.thumb_width
            .checked_add(self.border)?
            .checked_mul(self.columns)?
            .checked_add(self.border)?
            .checked_add(2)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.columns > 0 && self.rows > 0,
            "網格欄數與列數必須大於 0: {}",
            self.output_path.display()
        );
        ensure!(
            self.thumb_width > 0,
            "縮圖寬度必須大於 0: {}",
            self.output_path.display()
        );
        ensure!(
            self.columns
                .checked_mul(self.rows)
                .is_some_and(|cells| cells <= MAX_GRID_CELLS),
            "網格格數超過上限 {MAX_GRID_CELLS}: {}",
            self.output_path.display()
        );
        ensure!(
            self.sheet_width().is_some_and(|w| w <= MAX_SHEET_SIDE),
            "預覽圖寬度超過上限 {MAX_SHEET_SIDE}: {}",
            self.output_path.display()
        );
        Ok(())
    }
}

/// 僅讀取影片資訊的結果
///
/// `work_dir` 的所有權交給呼叫端，用完須自行刪除
#[derive(Debug, Clone, Serialize)]
pub struct ProbeResult {
    pub duration_ms: Option<u64>,
    pub dimension: Option<Dimension>,
    /// 實際交給 MPlayer 的路徑（可能是短檔名或符號連結）
    pub input_file: PathBuf,
    pub work_dir: PathBuf,
}

impl ProbeResult {
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.duration_ms.is_some_and(|d| d > 0) && self.dimension.is_some_and(|d| d.is_valid())
    }
}

/// 單張預覽圖的寫入結果
#[derive(Debug, Clone)]
pub struct GridOutput {
    pub output_path: PathBuf,
    pub error: Option<String>,
}

impl GridOutput {
    #[must_use]
    pub const fn is_written(&self) -> bool {
        self.error.is_none()
    }
}

/// 產生預覽圖的結果
#[derive(Debug, Clone)]
pub struct ThumbResult {
    pub success: bool,
    pub duration_ms: Option<u64>,
    pub dimension: Option<Dimension>,
    pub processing_time: Duration,
    pub input_file: PathBuf,
    /// 已於回傳前刪除
    pub work_dir: PathBuf,
    /// 過濾後實際使用的影格數
    pub frame_count: usize,
    pub outputs: Vec<GridOutput>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_spec_validate() {
        let path = Path::new("/out/sheet.jpg");
        assert!(OutputSpec::new(4, 3, 160, 2, path).validate().is_ok());
        assert!(OutputSpec::new(0, 3, 160, 2, path).validate().is_err());
        assert!(OutputSpec::new(4, 3, 0, 2, path).validate().is_err());
        assert_eq!(OutputSpec::new(4, 3, 160, 2, path).cells(), 12);
    }

    #[test]
    fn test_output_spec_rejects_oversized_grid() {
        let path = Path::new("/out/sheet.jpg");
        let huge = OutputSpec::new(100_000, 100_000, 160, 2, path);
        assert!(huge.validate().is_err());
        assert_eq!(huge.cells(), u32::MAX);

        let too_wide = OutputSpec::new(300, 1, 240, 2, path);
        assert_eq!(too_wide.sheet_width(), Some(300 * 242 + 4));
        assert!(too_wide.validate().is_err());

        let overflow = OutputSpec::new(2, 1, u32::MAX, 2, path);
        assert_eq!(overflow.sheet_width(), None);
        assert!(overflow.validate().is_err());

        assert!(OutputSpec::new(100, 100, 16, 0, path).validate().is_ok());
    }

    #[test]
    fn test_probe_result_resolution() {
        let mut probe = ProbeResult {
            duration_ms: Some(0),
            dimension: None,
            input_file: PathBuf::from("/v.avi"),
            work_dir: PathBuf::from("/tmp/x"),
        };
        assert!(!probe.is_resolved());

        probe.duration_ms = Some(1000);
        probe.dimension = Some(Dimension::new(640, 0));
        assert!(!probe.is_resolved());

        probe.dimension = Some(Dimension::new(640, 480));
        assert!(probe.is_resolved());
    }
}
