use crate::component::{ContactSheetGenerator, VideoThumbsMaker};
use crate::config::Config;
use crate::pause;
use crate::tools::validate_file_exists;
use anyhow::{Context, Result};
use console::{Term, style};
use dialoguer::Input;
use log::warn;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

pub fn run_contact_sheet_generator(
    term: &Term,
    shutdown_signal: &Arc<AtomicBool>,
    config: &mut Config,
) -> Result<()> {
    let mut generator = ContactSheetGenerator::new(config.clone(), Arc::clone(shutdown_signal));

    if let Err(e) = generator.run() {
        eprintln!("{} {}", style("錯誤:").red().bold(), e);
    }

    // 最近使用的路徑可能已更新
    *config = Config::new()?;

    pause(term)?;
    Ok(())
}

pub fn run_probe(term: &Term, config: &Config) -> Result<()> {
    if let Err(e) = probe_single_file(config) {
        eprintln!("{} {:#}", style("錯誤:").red().bold(), e);
    }

    pause(term)?;
    Ok(())
}

fn probe_single_file(config: &Config) -> Result<()> {
    println!("{}", style("=== 讀取影片資訊 ===").cyan().bold());

    let path: String = Input::new()
        .with_prompt("請輸入影片檔案路徑")
        .interact_text()?;
    let file = PathBuf::from(path.trim());
    validate_file_exists(&file)?;

    let maker = VideoThumbsMaker::new(config.settings.thumbs.clone());
    let result = maker.probe(&file, &config.settings.contact_sheet.temp_root())?;

    let json = serde_json::to_string_pretty(&result).context("無法序列化影片資訊")?;
    println!("{json}");

    if !result.is_resolved() {
        println!("{}", style("無法取得完整的影片長度與尺寸").yellow());
    }

    if let Err(e) = fs::remove_dir_all(&result.work_dir) {
        warn!("無法刪除暫存目錄 {}: {e}", result.work_dir.display());
    }

    Ok(())
}

pub fn run_show_version(term: &Term, config: &Config) -> Result<()> {
    let maker = VideoThumbsMaker::new(config.settings.thumbs.clone());

    match maker.version() {
        Ok(version) if !version.is_empty() => {
            println!("{} {}", style("MPlayer:").cyan().bold(), version);
        }
        Ok(_) => println!("{}", style("MPlayer 沒有輸出任何內容").yellow()),
        Err(e) => eprintln!("{} {:#}", style("錯誤:").red().bold(), e),
    }

    pause(term)?;
    Ok(())
}
