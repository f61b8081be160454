//! 取樣計畫與擷取命令列
//!
//! `SamplingPlan` 由影片長度與所有輸出需求一次算出，之後不再改變。
//! `ExtractionPlan` 記錄重試過程中會調整的選項，每次調整都產生新的值。

use super::probe::ALTERNATE_DEMUXER;
use super::types::OutputSpec;
use crate::tools::Dimension;
use std::path::Path;

/// 短於此長度的影片從頭開始取樣
const SHORT_VIDEO_MS: u64 = 5_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplingPlan {
    /// 所有輸出中最多的格數
    pub max_thumbs: u32,
    /// 所有輸出中最寬的縮圖寬度
    pub max_thumb_width: u32,
    /// 取樣間隔（秒）
    pub frequency_secs: u64,
    /// 第一張影格前的跳轉秒數
    pub seek_offset_secs: u64,
    /// 要求 MPlayer 輸出的影格數
    pub frame_budget: u32,
    /// 原始寬度大於最大縮圖寬度時的縮放目標
    pub scale: Option<Dimension>,
}

impl SamplingPlan {
    #[must_use]
    pub fn new(duration_ms: u64, dimension: Dimension, specs: &[OutputSpec]) -> Self {
        let max_thumbs = specs.iter().map(OutputSpec::cells).max().unwrap_or(1);
        let max_thumb_width = specs.iter().map(|s| s.thumb_width).max().unwrap_or(1);
        let frequency_secs = sampling_frequency(duration_ms, max_thumbs);

        Self {
            max_thumbs,
            max_thumb_width,
            frequency_secs,
            seek_offset_secs: seek_offset(duration_ms, frequency_secs),
            frame_budget: max_thumbs.saturating_add(1),
            scale: (dimension.width > max_thumb_width)
                .then(|| dimension.scaled_to_width(max_thumb_width)),
        }
    }

    /// 影格數超過此值才算擷取成功
    #[must_use]
    pub const fn min_frames(&self) -> usize {
        (self.max_thumbs.saturating_sub(1) / 3) as usize
    }
}

/// 取樣間隔（秒），至少 1 秒
#[must_use]
pub fn sampling_frequency(duration_ms: u64, max_thumbs: u32) -> u64 {
    let seconds = duration_ms.saturating_sub(1) as f64 * 0.001 / (f64::from(max_thumbs) + 2.0);
    (seconds.floor() as u64).max(1)
}

#[must_use]
pub const fn seek_offset(duration_ms: u64, frequency_secs: u64) -> u64 {
    if duration_ms < SHORT_VIDEO_MS {
        0
    } else if frequency_secs / 2 > 1 {
        frequency_secs / 2
    } else {
        1
    }
}

/// 命令列中與環境相關、不隨重試改變的部分
#[derive(Debug, Clone, Copy)]
pub struct ExtractionTarget<'a> {
    pub program: &'a str,
    pub input: &'a Path,
    pub out_dir: &'a Path,
    pub quality: u8,
}

/// 擷取命令列的可調整選項
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionPlan {
    pub scale: Option<Dimension>,
    pub wait_keyframe: bool,
    pub step_interval: bool,
    pub alternate_demuxer: bool,
}

impl ExtractionPlan {
    #[must_use]
    pub const fn initial(sampling: &SamplingPlan, wait_keyframe: bool) -> Self {
        Self {
            scale: sampling.scale,
            wait_keyframe,
            step_interval: true,
            alternate_demuxer: false,
        }
    }

    #[must_use]
    pub const fn with_scale(self, scale: Dimension) -> Self {
        Self {
            scale: Some(scale),
            ..self
        }
    }

    #[must_use]
    pub const fn without_wait_keyframe(self) -> Self {
        Self {
            wait_keyframe: false,
            ..self
        }
    }

    /// 不指定取樣間隔，讓 MPlayer 連續輸出
    #[must_use]
    pub const fn without_step_interval(self) -> Self {
        Self {
            step_interval: false,
            ..self
        }
    }

    /// 恢復取樣間隔並改用替代 demuxer
    #[must_use]
    pub const fn with_alternate_demuxer(self) -> Self {
        Self {
            step_interval: true,
            alternate_demuxer: true,
            ..self
        }
    }

    #[must_use]
    pub fn to_args(&self, sampling: &SamplingPlan, target: &ExtractionTarget<'_>) -> Vec<String> {
        let mut args = vec![target.program.to_string()];

        if self.alternate_demuxer {
            args.extend(["-demuxer".to_string(), ALTERNATE_DEMUXER.to_string()]);
        }
        args.extend(["-noconsolecontrols".to_string(), "-noautosub".to_string()]);

        if self.wait_keyframe {
            args.extend(["-lavdopts".to_string(), "wait_keyframe".to_string()]);
        }
        if let Some(scale) = self.scale {
            args.extend([
                "-sws".to_string(),
                "0".to_string(),
                "-vf".to_string(),
                format!("scale={}:{}", scale.width, scale.height),
            ]);
        }

        args.extend([
            "-vo".to_string(),
            jpeg_output_option(target.out_dir, target.quality),
            "-ao".to_string(),
            "null".to_string(),
            "-ss".to_string(),
            sampling.seek_offset_secs.to_string(),
        ]);

        if self.step_interval {
            args.extend(["-sstep".to_string(), sampling.frequency_secs.to_string()]);
        }

        args.extend([
            "-frames".to_string(),
            sampling.frame_budget.to_string(),
            target.input.to_string_lossy().into_owned(),
        ]);
        args
    }
}

fn jpeg_output_option(out_dir: &Path, quality: u8) -> String {
    let dir = out_dir.to_string_lossy();
    let dir = if cfg!(windows) {
        format!("\\\"{}\\\"", dir.replace('\\', "/"))
    } else {
        dir.into_owned()
    };
    format!("jpeg:smooth=50:nobaseline:quality={quality}:outdir={dir}")
}
