//! 影片資訊讀取（identify 模式）
//!
//! 最多兩次嘗試：第一次失敗後加上 `-demuxer lavf` 再試一次。
//! 若 MPlayer 回報找不到檔案，先改用短檔名或符號連結重試同一步，不計入次數。

use super::decoder::{CallKind, Decoder};
use crate::tools::mplayer_output::{is_file_not_found, parse_dimension, parse_duration_ms};
use crate::tools::path_fallback::{make_link, short_name};
use crate::tools::{CommandRunner, Dimension, RunError};
use log::{debug, info};
use std::path::{Path, PathBuf};

const MAX_ATTEMPTS: usize = 2;
pub(crate) const ALTERNATE_DEMUXER: &str = "lavf";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub duration_ms: Option<u64>,
    pub dimension: Option<Dimension>,
    /// 後續所有呼叫都要使用這個路徑
    pub input_file: PathBuf,
    /// 建立的符號連結，用完須刪除
    pub link: Option<PathBuf>,
}

impl ProbeOutcome {
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.duration_ms.is_some_and(|d| d > 0) && self.dimension.is_some_and(|d| d.is_valid())
    }
}

#[must_use]
pub fn identify_args(program: &str, input: &Path, alternate_demuxer: bool) -> Vec<String> {
    let mut args = vec![program.to_string()];
    if alternate_demuxer {
        args.extend(["-demuxer".to_string(), ALTERNATE_DEMUXER.to_string()]);
    }
    args.extend(
        [
            "-noautosub",
            "-noconsolecontrols",
            "-vo",
            "null",
            "-ao",
            "null",
            "-frames",
            "0",
            "-identify",
        ]
        .map(String::from),
    );
    args.push(input.to_string_lossy().into_owned());
    args
}

/// 讀取影片長度與尺寸
///
/// 只有無法啟動 MPlayer 時回傳錯誤；讀不到資訊時回傳未解析的結果。
pub fn probe_video<R: CommandRunner + ?Sized>(
    decoder: &Decoder<'_, R>,
    file: &Path,
    work_dir: &Path,
) -> Result<ProbeOutcome, RunError> {
    let mut outcome = ProbeOutcome {
        duration_ms: None,
        dimension: None,
        input_file: file.to_path_buf(),
        link: None,
    };
    let mut fallback_tried = false;
    let mut attempt = 0;

    while attempt < MAX_ATTEMPTS {
        let args = identify_args(decoder.program(), &outcome.input_file, attempt > 0);
        let output = decoder.run(&args, CallKind::Info)?;

        if attempt == 0 && !fallback_tried && is_file_not_found(&output) {
            fallback_tried = true;

            if decoder.config.short_name_lookup {
                if let Some(short) = short_name(decoder.runner, file) {
                    info!("改用短檔名: {}", short.display());
                    outcome.input_file = short;
                    continue;
                }
            }
            if let Some(link) = make_link(file, work_dir) {
                info!("改用符號連結: {}", link.display());
                outcome.input_file.clone_from(&link);
                outcome.link = Some(link);
                continue;
            }
        }

        // 無效值不覆蓋前一次取得的有效值
        outcome.duration_ms =
            merge(parse_duration_ms(&output), outcome.duration_ms, |&d| d > 0);
        outcome.dimension =
            merge(parse_dimension(&output), outcome.dimension, Dimension::is_valid);

        if outcome.is_resolved() {
            break;
        }

        attempt += 1;
        if attempt < MAX_ATTEMPTS {
            debug!(
                "無法取得完整資訊，改用 {ALTERNATE_DEMUXER} demuxer: {}",
                file.display()
            );
        }
    }

    debug!(
        "影片資訊 {}: duration={:?} ms, dimension={:?}",
        file.display(),
        outcome.duration_ms,
        outcome.dimension
    );
    Ok(outcome)
}

fn merge<T: Copy>(
    current: Option<T>,
    previous: Option<T>,
    usable: impl Fn(&T) -> bool,
) -> Option<T> {
    match (current, previous) {
        (Some(value), _) if usable(&value) => Some(value),
        (_, Some(value)) if usable(&value) => Some(value),
        (current, previous) => current.or(previous),
    }
}
