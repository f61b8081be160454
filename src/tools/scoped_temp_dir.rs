//! 單次呼叫專用的暫存目錄
//!
//! 目錄名稱以 UUID 加時間戳組成，平行處理多部影片時不會互相衝突。
//! 離開作用域時自動刪除（只刪第一層檔案，再刪目錄本身），
//! 除非呼叫 [`ScopedTempDir::keep`] 把所有權交給呼叫端。

use anyhow::{Context, Result};
use log::{debug, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

const DIR_PREFIX: &str = "_vtm";

#[derive(Debug)]
pub struct ScopedTempDir {
    path: PathBuf,
    armed: bool,
}

impl ScopedTempDir {
    /// 在 `root` 下建立新的暫存目錄
    pub fn create(root: &Path) -> Result<Self> {
        fs::create_dir_all(root)
            .with_context(|| format!("無法建立暫存根目錄: {}", root.display()))?;

        let name = format!("{DIR_PREFIX}{}_{}", Uuid::new_v4().simple(), unix_millis());
        let path = root.join(name);
        fs::create_dir(&path)
            .with_context(|| format!("無法建立暫存目錄: {}", path.display()))?;

        debug!("建立暫存目錄: {}", path.display());
        Ok(Self { path, armed: true })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 目錄中的 JPEG 檔案，依檔名排序（即解碼順序）
    pub fn jpeg_files(&self) -> Result<Vec<PathBuf>> {
        let mut files: Vec<PathBuf> = fs::read_dir(&self.path)
            .with_context(|| format!("無法讀取暫存目錄: {}", self.path.display()))?
            .filter_map(std::result::Result::ok)
            .map(|entry| entry.path())
            .filter(|path| is_jpeg(path))
            .collect();
        files.sort();
        Ok(files)
    }

    /// 刪除目錄中所有 JPEG 檔案
    pub fn remove_jpeg_files(&self) -> Result<()> {
        for file in self.jpeg_files()? {
            fs::remove_file(&file)
                .with_context(|| format!("無法刪除影格: {}", file.display()))?;
        }
        Ok(())
    }

    /// 放棄自動清理，回傳目錄路徑
    #[must_use]
    pub fn keep(mut self) -> PathBuf {
        self.armed = false;
        std::mem::take(&mut self.path)
    }

    fn clean(&self) {
        let Ok(entries) = fs::read_dir(&self.path) else {
            return;
        };

        for entry in entries.filter_map(std::result::Result::ok) {
            if let Err(e) = fs::remove_file(entry.path()) {
                warn!("無法刪除暫存檔案 {}: {e}", entry.path().display());
            }
        }

        match fs::remove_dir(&self.path) {
            Ok(()) => debug!("已刪除暫存目錄: {}", self.path.display()),
            Err(e) => warn!("無法刪除暫存目錄 {}: {e}", self.path.display()),
        }
    }
}

impl Drop for ScopedTempDir {
    fn drop(&mut self) {
        if self.armed {
            self.clean();
        }
    }
}

fn is_jpeg(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("jpg"))
}

pub(crate) fn unix_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}
