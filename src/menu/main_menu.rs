use crate::config::save::save_settings;
use crate::config::{Config, GridLayout};
use crate::menu::handlers::{run_contact_sheet_generator, run_probe, run_show_version};
use anyhow::Result;
use console::{Term, style};
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Input, Select};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

const ESC_HINT: &str = "（按 ESC 返回）";

pub fn show_main_menu(
    term: &Term,
    shutdown_signal: &Arc<AtomicBool>,
    config: &mut Config,
) -> Result<bool> {
    term.clear_screen()?;

    println!("{}", style("=== 影片預覽圖產生器 ===").cyan().bold());
    println!("{}", style(ESC_HINT).dim());

    let options = vec![
        "產生資料夾內影片的預覽圖",
        "讀取單一影片資訊",
        "顯示 MPlayer 版本",
        "設定",
        "離開",
    ];

    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("請選擇功能")
        .items(&options)
        .default(0)
        .interact_on_opt(term)?;

    match selection {
        Some(0) => {
            run_contact_sheet_generator(term, shutdown_signal, config)?;
            Ok(true)
        }
        Some(1) => {
            run_probe(term, config)?;
            Ok(true)
        }
        Some(2) => {
            run_show_version(term, config)?;
            Ok(true)
        }
        Some(3) => {
            show_settings_menu(term, config)?;
            Ok(true)
        }
        Some(4) | None => Ok(false),
        _ => unreachable!(),
    }
}

/// 設定選單
fn show_settings_menu(term: &Term, config: &mut Config) -> Result<()> {
    loop {
        term.clear_screen()?;

        println!("{}", style("=== 設定 ===").cyan().bold());
        println!("{}", style(ESC_HINT).dim());

        let thumbs = &config.settings.thumbs;
        let sheet = &config.settings.contact_sheet;
        let layouts: Vec<String> = sheet.layouts.iter().map(ToString::to_string).collect();

        let options = vec![
            format!("MPlayer 路徑: {}", thumbs.mplayer),
            format!("過濾空白/重複影格: {}", on_off(thumbs.check_content)),
            format!("影格 JPEG 品質: {}", thumbs.quality),
            format!("詳細輸出: {}", on_off(thumbs.verbose)),
            format!("預覽圖版面: {}", layouts.join(", ")),
            format!("略過已存在的預覽圖: {}", on_off(sheet.skip_existing)),
            format!("暫存目錄: {}", sheet.temp_root().display()),
            "返回".to_string(),
        ];

        let selection = Select::with_theme(&ColorfulTheme::default())
            .with_prompt("請選擇要修改的項目")
            .items(&options)
            .default(0)
            .interact_on_opt(term)?;

        let changed = match selection {
            Some(0) => edit_mplayer_path(config)?,
            Some(1) => {
                config.settings.thumbs.check_content = !config.settings.thumbs.check_content;
                true
            }
            Some(2) => edit_quality(config)?,
            Some(3) => {
                config.settings.thumbs.verbose = !config.settings.thumbs.verbose;
                true
            }
            Some(4) => edit_layouts(config)?,
            Some(5) => {
                config.settings.contact_sheet.skip_existing =
                    !config.settings.contact_sheet.skip_existing;
                true
            }
            Some(6) => edit_temp_root(config)?,
            Some(7) | None => break,
            _ => unreachable!(),
        };

        if changed {
            save_settings(&config.settings)?;
            println!("\n{}", style("設定已儲存").green());
            std::thread::sleep(Duration::from_secs(1));
        }
    }

    Ok(())
}

const fn on_off(value: bool) -> &'static str {
    if value { "開啟" } else { "關閉" }
}

fn edit_mplayer_path(config: &mut Config) -> Result<bool> {
    let path: String = Input::new()
        .with_prompt("MPlayer 執行檔路徑")
        .default(config.settings.thumbs.mplayer.clone())
        .interact_text()?;
    let path = path.trim().to_string();

    if path.is_empty() || path == config.settings.thumbs.mplayer {
        return Ok(false);
    }
    config.settings.thumbs.mplayer = path;
    Ok(true)
}

fn edit_quality(config: &mut Config) -> Result<bool> {
    let quality: u8 = Input::new()
        .with_prompt("影格 JPEG 品質 (0-100)")
        .default(config.settings.thumbs.quality)
        .validate_with(|value: &u8| {
            if *value <= 100 {
                Ok(())
            } else {
                Err("品質必須介於 0 到 100")
            }
        })
        .interact_text()?;

    if quality == config.settings.thumbs.quality {
        return Ok(false);
    }
    config.settings.thumbs.quality = quality;
    Ok(true)
}

fn edit_layouts(config: &mut Config) -> Result<bool> {
    let current: Vec<String> = config
        .settings
        .contact_sheet
        .layouts
        .iter()
        .map(ToString::to_string)
        .collect();

    let text: String = Input::new()
        .with_prompt("版面（COLSxROWS@WIDTH[+BORDER]，多個以逗號分隔）")
        .default(current.join(","))
        .validate_with(|value: &String| parse_layouts(value).map(|_| ()).map_err(|e| e.to_string()))
        .interact_text()?;

    let layouts = parse_layouts(&text)?;
    if layouts == config.settings.contact_sheet.layouts {
        return Ok(false);
    }
    config.settings.contact_sheet.layouts = layouts;
    Ok(true)
}

fn edit_temp_root(config: &mut Config) -> Result<bool> {
    let current = config.settings.contact_sheet.temp_root();
    let text: String = Input::new()
        .with_prompt("暫存目錄（留空使用系統暫存目錄）")
        .default(current.to_string_lossy().to_string())
        .allow_empty(true)
        .interact_text()?;
    let text = text.trim();

    let temp_root = (!text.is_empty() && PathBuf::from(text) != std::env::temp_dir())
        .then(|| PathBuf::from(text));
    if temp_root == config.settings.contact_sheet.temp_root {
        return Ok(false);
    }
    config.settings.contact_sheet.temp_root = temp_root;
    Ok(true)
}

/// 解析以逗號分隔的版面清單
pub fn parse_layouts(text: &str) -> Result<Vec<GridLayout>> {
    let layouts = text
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::parse)
        .collect::<Result<Vec<GridLayout>>>()?;

    anyhow::ensure!(!layouts.is_empty(), "至少需要一種版面");
    Ok(layouts)
}
