use anyhow::{Result, bail};
use std::path::Path;

pub fn validate_directory_exists(path: &Path) -> Result<()> {
    if !path.is_dir() {
        bail!("資料夾不存在: {}", path.display());
    }
    Ok(())
}

pub fn validate_file_exists(path: &Path) -> Result<()> {
    if !path.is_file() {
        bail!("影片檔案不存在: {}", path.display());
    }
    Ok(())
}

/// 建立輸出資料夾（已存在則略過）
pub fn ensure_directory_exists(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path)?;
    Ok(())
}
