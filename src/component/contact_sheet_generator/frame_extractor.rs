//! 影格擷取與自我修正
//!
//! 每次執行後依 MPlayer 的輸出決定下一步：
//! - 實際解碼尺寸與讀取到的不同：更新尺寸，必要時加入縮放濾鏡後重跑（不計次數）
//! - 第一步時 MPlayer 不認得 `-lavdopts wait_keyframe`：移除該選項後重跑（不計次數）
//! - 影格數不足或出現解碼錯誤：第二步拿掉 `-sstep`，第三步恢復 `-sstep` 並改用 lavf demuxer
//!
//! 第三步之後無論影格數多少都接受。

use super::decoder::{CallKind, Decoder, KeyframeWaitSupport};
use super::sampling_plan::{ExtractionPlan, ExtractionTarget, SamplingPlan};
use crate::tools::mplayer_output::{
    has_decode_error, parse_output_geometry, rejects_wait_keyframe,
};
use crate::tools::{CommandRunner, Dimension, ScopedTempDir};
use anyhow::Result;
use log::{debug, info, warn};
use std::path::{Path, PathBuf};

const LAST_STEP: u8 = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepDecision {
    Accept,
    /// 解碼尺寸改變，已寫出的影格作廢
    Rescale(ExtractionPlan),
    DropWaitKeyframe(ExtractionPlan),
    /// 進入下一步
    Relax(ExtractionPlan),
}

#[derive(Debug, Clone)]
pub struct ExtractionController {
    sampling: SamplingPlan,
    dimension: Dimension,
    step: u8,
    geometry_known: bool,
    check_wait_keyframe: bool,
}

impl ExtractionController {
    #[must_use]
    pub const fn new(sampling: SamplingPlan, dimension: Dimension, check_wait_keyframe: bool) -> Self {
        Self {
            geometry_known: sampling.scale.is_some(),
            sampling,
            dimension,
            step: 0,
            check_wait_keyframe,
        }
    }

    #[must_use]
    pub const fn dimension(&self) -> Dimension {
        self.dimension
    }

    #[must_use]
    pub const fn step(&self) -> u8 {
        self.step
    }

    pub fn evaluate(&mut self, plan: &ExtractionPlan, output: &str, frame_count: usize) -> StepDecision {
        if !self.geometry_known
            && let Some(actual) = parse_output_geometry(output)
        {
            self.geometry_known = true;
            if actual.is_valid() && actual != self.dimension {
                debug!("實際解碼尺寸 {actual:?} 與讀取值 {:?} 不同", self.dimension);
                self.dimension = actual;
                if actual.width > self.sampling.max_thumb_width {
                    let scale = actual.scaled_to_width(self.sampling.max_thumb_width);
                    return StepDecision::Rescale(plan.clone().with_scale(scale));
                }
            }
        }

        if self.step == 0
            && self.check_wait_keyframe
            && plan.wait_keyframe
            && rejects_wait_keyframe(output)
        {
            return StepDecision::DropWaitKeyframe(plan.clone().without_wait_keyframe());
        }

        if frame_count > self.sampling.min_frames() && !has_decode_error(output) {
            return StepDecision::Accept;
        }

        match self.step {
            0 => {
                self.step = 1;
                StepDecision::Relax(plan.clone().without_step_interval())
            }
            1 => {
                self.step = LAST_STEP;
                StepDecision::Relax(plan.clone().with_alternate_demuxer())
            }
            _ => StepDecision::Accept,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExtractedFrames {
    /// 依檔名排序（即時間順序）
    pub frames: Vec<PathBuf>,
    /// 修正後的影片尺寸
    pub dimension: Dimension,
    pub runs: usize,
}

/// 執行 MPlayer 擷取影格到暫存目錄
pub fn extract_frames<R: CommandRunner + ?Sized>(
    decoder: &Decoder<'_, R>,
    input: &Path,
    work_dir: &ScopedTempDir,
    sampling: &SamplingPlan,
    dimension: Dimension,
) -> Result<ExtractedFrames> {
    let support = decoder.session.wait_keyframe();
    let mut plan = ExtractionPlan::initial(sampling, support != KeyframeWaitSupport::Unsupported);
    let mut controller = ExtractionController::new(
        *sampling,
        dimension,
        support == KeyframeWaitSupport::Unknown,
    );
    let target = ExtractionTarget {
        program: decoder.program(),
        input,
        out_dir: work_dir.path(),
        quality: decoder.config.jpeg_quality(),
    };
    let mut runs = 0;

    loop {
        let output = decoder.run(&plan.to_args(sampling, &target), CallKind::Extraction)?;
        runs += 1;
        let frames = work_dir.jpeg_files()?;

        match controller.evaluate(&plan, &output, frames.len()) {
            StepDecision::Accept => {
                if plan.wait_keyframe {
                    decoder.session.confirm_wait_keyframe();
                }
                debug!(
                    "擷取完成: {} 張影格，執行 {runs} 次: {}",
                    frames.len(),
                    input.display()
                );
                return Ok(ExtractedFrames {
                    frames,
                    dimension: controller.dimension(),
                    runs,
                });
            }
            StepDecision::Rescale(next) => {
                info!("依實際解碼尺寸重新縮放: {}", input.display());
                work_dir.remove_jpeg_files()?;
                plan = next;
            }
            StepDecision::DropWaitKeyframe(next) => {
                warn!("此 MPlayer 不支援 '-lavdopts wait_keyframe'，已停用");
                decoder.session.disable_wait_keyframe();
                plan = next;
            }
            StepDecision::Relax(next) => {
                debug!(
                    "影格不足（{} 張），進入第 {} 步: {}",
                    frames.len(),
                    controller.step() + 1,
                    input.display()
                );
                plan = next;
            }
        }
    }
}
