//! 影片預覽圖產生器
//!
//! 流程：讀取資訊 → 計算取樣 → 擷取影格（含自我修正）→ 過濾 → 合成每一張輸出。
//! 同一個產生器可在多個執行緒間共用，MPlayer 能力偵測的結果會跨呼叫保留。

use super::decoder::{CallKind, Decoder, DecoderSession};
use super::frame_extractor::extract_frames;
use super::frame_filter::filter_frames;
use super::grid_composer::write_grid;
use super::probe::probe_video;
use super::sampling_plan::SamplingPlan;
use super::types::{GridOutput, OutputSpec, ProbeResult, ThumbResult};
use crate::config::ThumbsConfig;
use crate::tools::mplayer_output::first_line;
use crate::tools::{CommandRunner, ProcessRunner, ScopedTempDir};
use anyhow::{Result, bail};
use log::{debug, info, warn};
use std::fs;
use std::path::Path;
use std::time::Instant;

pub struct VideoThumbsMaker<R: CommandRunner = ProcessRunner> {
    config: ThumbsConfig,
    runner: R,
    session: DecoderSession,
}

impl VideoThumbsMaker<ProcessRunner> {
    #[must_use]
    pub fn new(config: ThumbsConfig) -> Self {
        let runner = ProcessRunner::new(config.verbose);
        Self::with_runner(config, runner)
    }
}

impl<R: CommandRunner> VideoThumbsMaker<R> {
    pub fn with_runner(config: ThumbsConfig, runner: R) -> Self {
        Self {
            config,
            runner,
            session: DecoderSession::default(),
        }
    }

    #[must_use]
    pub const fn config(&self) -> &ThumbsConfig {
        &self.config
    }

    #[must_use]
    pub const fn runner(&self) -> &R {
        &self.runner
    }

    /// 跨呼叫共用的 MPlayer 能力偵測結果
    #[must_use]
    pub const fn session(&self) -> &DecoderSession {
        &self.session
    }

    fn decoder(&self) -> Decoder<'_, R> {
        Decoder {
            runner: &self.runner,
            config: &self.config,
            session: &self.session,
        }
    }

    /// MPlayer 版本（輸出的第一行）
    pub fn version(&self) -> Result<String> {
        let args = [self.config.mplayer.clone()];
        let output = self.decoder().run(&args, CallKind::Info)?;
        Ok(first_line(&output).to_string())
    }

    /// 只讀取影片資訊
    ///
    /// 建立的暫存目錄不會刪除，路徑放在 `ProbeResult::work_dir`。
    pub fn probe(&self, file: &Path, temp_root: &Path) -> Result<ProbeResult> {
        let work_dir = ScopedTempDir::create(temp_root)?;
        let outcome = probe_video(&self.decoder(), file, work_dir.path())?;

        Ok(ProbeResult {
            duration_ms: outcome.duration_ms,
            dimension: outcome.dimension,
            input_file: outcome.input_file,
            work_dir: work_dir.keep(),
        })
    }

    /// 產生一或多張預覽圖
    ///
    /// 參數錯誤或無法啟動 MPlayer 時回傳錯誤；其他失敗以 `success == false` 表示。
    /// 暫存目錄在回傳前一律刪除。
    pub fn create_thumbnails(
        &self,
        file: &Path,
        temp_root: &Path,
        specs: &[OutputSpec],
    ) -> Result<ThumbResult> {
        if specs.is_empty() {
            bail!("至少需要一個輸出設定");
        }
        for spec in specs {
            spec.validate()?;
        }

        let start = Instant::now();
        let work_dir = ScopedTempDir::create(temp_root)?;
        let decoder = self.decoder();

        let probe = probe_video(&decoder, file, work_dir.path())?;
        let mut result = ThumbResult {
            success: false,
            duration_ms: probe.duration_ms,
            dimension: probe.dimension,
            processing_time: start.elapsed(),
            input_file: probe.input_file.clone(),
            work_dir: work_dir.path().to_path_buf(),
            frame_count: 0,
            outputs: Vec::new(),
        };

        let (Some(duration_ms), Some(dimension)) = (probe.duration_ms, probe.dimension) else {
            warn!("無法取得影片資訊: {}", file.display());
            return Ok(result);
        };
        if !probe.is_resolved() {
            warn!("影片長度或尺寸無效: {}", file.display());
            return Ok(result);
        }

        let sampling = SamplingPlan::new(duration_ms, dimension, specs);
        debug!("取樣計畫 {}: {sampling:?}", file.display());

        let extracted = extract_frames(&decoder, &probe.input_file, &work_dir, &sampling, dimension)?;
        result.dimension = Some(extracted.dimension);

        if let Some(link) = &probe.link
            && let Err(e) = fs::remove_file(link)
        {
            warn!("無法刪除符號連結 {}: {e}", link.display());
        }

        let frames = filter_frames(&extracted.frames, self.config.check_content);
        result.frame_count = frames.len();

        if frames.is_empty() {
            warn!("沒有可用的影格: {}", file.display());
            result.processing_time = start.elapsed();
            return Ok(result);
        }

        for spec in specs {
            let error = write_grid(&frames, spec, extracted.dimension)
                .err()
                .map(|e| {
                    warn!("無法產生預覽圖 {}: {e:#}", spec.output_path.display());
                    format!("{e:#}")
                });
            result.outputs.push(GridOutput {
                output_path: spec.output_path.clone(),
                error,
            });
        }

        result.success = result.outputs.iter().any(GridOutput::is_written);
        result.processing_time = start.elapsed();
        info!(
            "預覽圖完成: {} ({} 張影格, {} ms)",
            file.display(),
            result.frame_count,
            result.processing_time.as_millis()
        );
        Ok(result)
    }
}
