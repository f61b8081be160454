//! 找不到檔案時的替代路徑
//!
//! 部分 MPlayer 建置無法開啟含特殊字元的路徑，
//! 此時改用 Windows 短檔名或在暫存目錄中建立符號連結。

use super::process_runner::{CommandRunner, RunLimits};
use super::scoped_temp_dir::unix_millis;
use log::debug;
use std::path::{Path, PathBuf};
use std::time::Duration;

const SHORT_NAME_LIMITS: RunLimits = RunLimits::new(Duration::from_secs(1), 2000);

/// 副檔名（不含點）
#[must_use]
pub fn file_extension(path: &Path) -> Option<&str> {
    path.extension().and_then(|ext| ext.to_str())
}

/// 以 `cmd /c dir /x` 查詢 Windows 8.3 短檔名
pub fn short_name<R: CommandRunner + ?Sized>(runner: &R, file: &Path) -> Option<PathBuf> {
    let args = [
        "cmd".to_string(),
        "/c".to_string(),
        "dir".to_string(),
        "/x".to_string(),
        file.to_string_lossy().to_string(),
    ];
    let listing = runner.run(&args, SHORT_NAME_LIMITS).ok()?;
    let short = parse_short_name(&listing, file_extension(file)?)?;

    Some(file.parent().unwrap_or(Path::new("")).join(short))
}

/// 從 `dir /x` 的輸出中找出短檔名
///
/// 每行格式：日期 時間 大小 短檔名 長檔名
#[must_use]
pub fn parse_short_name(listing: &str, extension: &str) -> Option<String> {
    listing
        .lines()
        .map(str::trim_end)
        .filter(|line| line.ends_with(extension))
        .find_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            let candidate = *fields.get(3).filter(|_| fields.len() > 4)?;
            candidate
                .find('~')
                .filter(|&pos| pos > 0)
                .map(|_| candidate.to_string())
        })
}

/// 在 `dir` 中建立指向 `original` 的符號連結
#[must_use]
pub fn make_link(original: &Path, dir: &Path) -> Option<PathBuf> {
    let target = std::path::absolute(original).ok()?;
    let suffix = file_extension(original)
        .map(|ext| format!(".{ext}"))
        .unwrap_or_default();
    let link = dir.join(format!("vtc{}{suffix}", unix_millis()));

    match create_symlink(&target, &link) {
        Ok(()) => Some(link),
        Err(e) => {
            debug!("無法建立符號連結 {}: {e}", link.display());
            None
        }
    }
}

#[cfg(unix)]
fn create_symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn create_symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::windows::fs::symlink_file(target, link)
}

#[cfg(not(any(unix, windows)))]
fn create_symlink(_target: &Path, _link: &Path) -> std::io::Result<()> {
    Err(std::io::Error::from(std::io::ErrorKind::Unsupported))
}
