use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const MAX_RECENT_PATHS: usize = 10;

/// 首次呼叫 MPlayer 時允許的輸出行數（冷啟動會印出大量初始化訊息）
pub const FIRST_CALL_MAX_LINES: usize = 20_000;
pub const MAX_LINES: usize = 2_000;

const DEFAULT_VIDEO_EXTENSIONS: &[&str] = &[
    "3gp", "asf", "avi", "flv", "m2ts", "m4v", "mkv", "mov", "mp4", "mpeg", "mpg", "mts", "ogv",
    "rm", "rmvb", "ts", "vob", "webm", "wmv",
];

/// 影片縮圖產生器設定（呼叫前設定，單次請求不可變更）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThumbsConfig {
    /// MPlayer 執行檔路徑
    pub mplayer: String,
    pub timeout_first_call_ms: u64,
    pub timeout_info_ms: u64,
    pub timeout_process_ms: u64,
    pub verbose: bool,
    /// MPlayer 輸出影格的 JPEG 品質 (0-100)
    pub quality: u8,
    /// 是否過濾空白與重複影格
    pub check_content: bool,
    /// 找不到檔案時是否先查詢 8.3 短檔名（僅 Windows 有意義）
    pub short_name_lookup: bool,
}

impl Default for ThumbsConfig {
    fn default() -> Self {
        Self {
            mplayer: if cfg!(windows) {
                "mplayer.exe".to_string()
            } else {
                "mplayer".to_string()
            },
            timeout_first_call_ms: 180_000,
            timeout_info_ms: 10_000,
            timeout_process_ms: 15_000,
            verbose: false,
            quality: 50,
            check_content: false,
            short_name_lookup: cfg!(windows),
        }
    }
}

impl ThumbsConfig {
    #[must_use]
    pub const fn timeout_first_call(&self) -> Duration {
        Duration::from_millis(self.timeout_first_call_ms)
    }

    #[must_use]
    pub const fn timeout_info(&self) -> Duration {
        Duration::from_millis(self.timeout_info_ms)
    }

    #[must_use]
    pub const fn timeout_process(&self) -> Duration {
        Duration::from_millis(self.timeout_process_ms)
    }

    #[must_use]
    pub fn jpeg_quality(&self) -> u8 {
        self.quality.min(100)
    }
}

/// 預覽圖網格版面
///
/// 文字格式：`COLSxROWS@WIDTH` 或 `COLSxROWS@WIDTH+BORDER`，例如 `4x3@160+2`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridLayout {
    pub columns: u32,
    pub rows: u32,
    pub thumb_width: u32,
    pub border: u32,
}

impl Default for GridLayout {
    fn default() -> Self {
        Self {
            columns: 4,
            rows: 3,
            thumb_width: 240,
            border: 2,
        }
    }
}

impl fmt::Display for GridLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{}@{}+{}",
            self.columns, self.rows, self.thumb_width, self.border
        )
    }
}

impl FromStr for GridLayout {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let (grid, size) = s
            .split_once('@')
            .with_context(|| format!("版面格式錯誤（需要 COLSxROWS@WIDTH）: {s}"))?;
        let (columns, rows) = grid
            .split_once(['x', 'X'])
            .with_context(|| format!("版面格式錯誤（需要 COLSxROWS）: {grid}"))?;
        let (width, border) = size.split_once('+').unwrap_or((size, "0"));

        let layout = Self {
            columns: columns.trim().parse().context("欄數必須為整數")?,
            rows: rows.trim().parse().context("列數必須為整數")?,
            thumb_width: width.trim().parse().context("縮圖寬度必須為整數")?,
            border: border.trim().parse().context("邊框寬度必須為整數")?,
        };

        if layout.columns == 0 || layout.rows == 0 || layout.thumb_width == 0 {
            bail!("欄數、列數與縮圖寬度都必須大於 0: {s}");
        }
        Ok(layout)
    }
}

/// 預覽圖批次產生設定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactSheetSettings {
    pub layouts: Vec<GridLayout>,
    /// 暫存目錄根路徑，未設定時使用系統暫存目錄
    pub temp_root: Option<PathBuf>,
    pub skip_existing: bool,
}

impl Default for ContactSheetSettings {
    fn default() -> Self {
        Self {
            layouts: vec![GridLayout::default()],
            temp_root: None,
            skip_existing: true,
        }
    }
}

impl ContactSheetSettings {
    #[must_use]
    pub fn temp_root(&self) -> PathBuf {
        self.temp_root.clone().unwrap_or_else(std::env::temp_dir)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserSettings {
    pub thumbs: ThumbsConfig,
    pub contact_sheet: ContactSheetSettings,
    pub recent_paths: Vec<String>,
    pub video_extensions: Vec<String>,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            thumbs: ThumbsConfig::default(),
            contact_sheet: ContactSheetSettings::default(),
            recent_paths: Vec::new(),
            video_extensions: DEFAULT_VIDEO_EXTENSIONS
                .iter()
                .map(|ext| (*ext).to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub settings: UserSettings,
}
