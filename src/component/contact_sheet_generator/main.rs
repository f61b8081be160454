use super::thumbs_maker::VideoThumbsMaker;
use super::types::{OutputSpec, ThumbResult};
use crate::config::save::{add_recent_path, save_settings};
use crate::config::{Config, GridLayout};
use crate::signal::is_shutdown_requested;
use crate::tools::{
    VideoFileInfo, ensure_directory_exists, scan_video_files, validate_directory_exists,
};
use anyhow::Result;
use console::style;
use dialoguer::Input;
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// 預覽圖生成結果
#[derive(Debug, Default)]
pub struct GenerationResult {
    pub total_videos: usize,
    pub successful: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// 單一影片的處理結果
#[derive(Debug)]
enum VideoOutcome {
    Created(ThumbResult),
    Skipped,
    Failed(String),
}

/// 批次預覽圖生成器
///
/// 掃描資料夾中的影片，平行呼叫 MPlayer 產生預覽圖。
/// 所有工作執行緒共用同一個 [`VideoThumbsMaker`]。
pub struct ContactSheetGenerator {
    config: Config,
    shutdown_signal: Arc<AtomicBool>,
}

impl ContactSheetGenerator {
    pub const fn new(config: Config, shutdown_signal: Arc<AtomicBool>) -> Self {
        Self {
            config,
            shutdown_signal,
        }
    }

    pub fn run(&mut self) -> Result<()> {
        println!("{}", style("=== 影片預覽圖生成 ===").cyan().bold());

        let input_path = self.prompt_input_path()?;
        let input_dir = PathBuf::from(&input_path);
        validate_directory_exists(&input_dir)?;

        add_recent_path(&mut self.config.settings, &input_path);
        if let Err(e) = save_settings(&self.config.settings) {
            warn!("無法儲存最近使用的路徑: {e:#}");
        }

        let output_path = self.prompt_output_path(&input_path)?;
        let output_dir = PathBuf::from(&output_path);
        ensure_directory_exists(&output_dir)?;

        println!("{}", style("掃描影片檔案中...").dim());
        let video_files = scan_video_files(&input_dir, &self.config.settings.video_extensions)?;

        if video_files.is_empty() {
            println!("{}", style("找不到任何影片檔案").yellow());
            return Ok(());
        }

        println!(
            "{}",
            style(format!(
                "找到 {} 個影片檔案，依檔案大小排序（由小到大）",
                video_files.len()
            ))
            .green()
        );

        let layouts: Vec<String> = self
            .config
            .settings
            .contact_sheet
            .layouts
            .iter()
            .map(ToString::to_string)
            .collect();
        println!("  版面: {}", layouts.join(", "));
        println!();
        println!("{}", style("開始生成預覽圖...").cyan());

        let result = self.process_videos(&video_files, &output_dir);

        self.print_summary(&result);

        Ok(())
    }

    fn prompt_input_path(&self) -> Result<String> {
        let mut input = Input::<String>::new().with_prompt("請輸入影片資料夾路徑");
        if let Some(recent) = self.config.settings.recent_paths.first() {
            input = input.default(recent.clone());
        }
        let path = input.interact_text()?;
        Ok(path.trim().to_string())
    }

    fn prompt_output_path(&self, input_path: &str) -> Result<String> {
        let path: String = Input::new()
            .with_prompt("請輸入預覽圖輸出資料夾路徑")
            .default(input_path.to_string())
            .interact_text()?;
        Ok(path.trim().to_string())
    }

    fn process_videos(&self, videos: &[VideoFileInfo], output_dir: &Path) -> GenerationResult {
        let maker = VideoThumbsMaker::new(self.config.settings.thumbs.clone());
        let settings = &self.config.settings.contact_sheet;
        let temp_root = settings.temp_root();

        match maker.version() {
            Ok(version) => info!("MPlayer: {version}"),
            Err(e) => warn!("無法取得 MPlayer 版本: {e:#}"),
        }

        let progress_bar = ProgressBar::new(videos.len() as u64);
        progress_bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
                .expect("Invalid progress bar template")
                .progress_chars("#>-"),
        );
        progress_bar.set_message("產生預覽圖中...");

        let successful = AtomicUsize::new(0);
        let failed = AtomicUsize::new(0);
        let skipped = AtomicUsize::new(0);

        videos.par_iter().for_each(|video| {
            if is_shutdown_requested(&self.shutdown_signal) {
                return;
            }

            let specs = output_specs(&video.path, output_dir, &settings.layouts);
            let name = video
                .path
                .file_name()
                .unwrap_or_default()
                .to_string_lossy()
                .to_string();

            let outcome = if settings.skip_existing && specs.iter().all(|s| s.output_path.exists())
            {
                VideoOutcome::Skipped
            } else {
                match maker.create_thumbnails(&video.path, &temp_root, &specs) {
                    Ok(result) if result.success => VideoOutcome::Created(result),
                    Ok(result) => VideoOutcome::Failed(failure_reason(&result)),
                    Err(e) => VideoOutcome::Failed(format!("{e:#}")),
                }
            };

            match outcome {
                VideoOutcome::Created(result) => {
                    progress_bar.println(format!(
                        "  {} {} ({} 張影格, {:.1}s)",
                        style("✓").green(),
                        name,
                        result.frame_count,
                        result.processing_time.as_secs_f64()
                    ));
                    successful.fetch_add(1, Ordering::SeqCst);
                }
                VideoOutcome::Skipped => {
                    progress_bar.println(format!("  {} {} 預覽圖已存在，跳過", style("⤳").dim(), name));
                    skipped.fetch_add(1, Ordering::SeqCst);
                }
                VideoOutcome::Failed(reason) => {
                    error!("處理影片失敗 {name}: {reason}");
                    progress_bar.println(format!("  {} {} 處理失敗: {}", style("✗").red(), name, reason));
                    failed.fetch_add(1, Ordering::SeqCst);
                }
            }

            progress_bar.inc(1);
        });

        if is_shutdown_requested(&self.shutdown_signal) {
            progress_bar.abandon_with_message("已中斷");
            warn!("收到中斷訊號，停止處理");
        } else {
            progress_bar.finish_with_message("完成");
        }

        GenerationResult {
            total_videos: videos.len(),
            successful: successful.into_inner(),
            failed: failed.into_inner(),
            skipped: skipped.into_inner(),
        }
    }

    fn print_summary(&self, result: &GenerationResult) {
        println!();
        println!("{}", style("=== 預覽圖生成摘要 ===").cyan().bold());
        println!("  總計: {} 個影片", result.total_videos);
        println!("  成功: {} 個", style(result.successful).green());

        if result.skipped > 0 {
            println!("  跳過: {} 個", style(result.skipped).yellow());
        }

        if result.failed > 0 {
            println!("  失敗: {} 個", style(result.failed).red());
        }

        info!(
            "預覽圖生成完成 - 成功: {}, 跳過: {}, 失敗: {}",
            result.successful, result.skipped, result.failed
        );
    }
}

/// 依版面設定產生輸出路徑
///
/// 只有一種版面時輸出 `{名稱}_contact_sheet.jpg`，
/// 多種版面時以 `{名稱}_{欄}x{列}.jpg` 區分。
#[must_use]
pub fn output_specs(video: &Path, output_dir: &Path, layouts: &[GridLayout]) -> Vec<OutputSpec> {
    let stem = video
        .file_stem()
        .map_or_else(|| "video".to_string(), |s| s.to_string_lossy().to_string());

    match layouts {
        [layout] => vec![OutputSpec::from_layout(
            layout,
            &output_dir.join(format!("{stem}_contact_sheet.jpg")),
        )],
        _ => layouts
            .iter()
            .map(|layout| {
                let name = format!("{stem}_{}x{}.jpg", layout.columns, layout.rows);
                OutputSpec::from_layout(layout, &output_dir.join(name))
            })
            .collect(),
    }
}

fn failure_reason(result: &ThumbResult) -> String {
    if result.duration_ms.is_none_or(|d| d == 0) || result.dimension.is_none() {
        return "無法讀取影片資訊".to_string();
    }
    if result.frame_count == 0 {
        return "無法擷取任何影格".to_string();
    }
    result
        .outputs
        .iter()
        .find_map(|o| o.error.clone())
        .unwrap_or_else(|| "未知錯誤".to_string())
}
