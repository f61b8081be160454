//! 影格內容過濾
//!
//! 剔除幾乎單色的影格（片頭黑畫面、轉場）以及與上一張保留影格完全相同的影格。
//! 解碼與特徵計算以 rayon 平行處理，選取則依時間順序進行。

use anyhow::{Context, Result};
use log::{debug, warn};
use rayon::prelude::*;
use std::path::{Path, PathBuf};

/// 與參考像素的色差超過此值才算「不同」
const COLOR_DISTANCE_THRESHOLD: u32 = 80;
/// 每隔幾個像素取樣一次
const SAMPLE_STEP: usize = 4;

/// 影格特徵
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameSignature {
    pub width: u32,
    pub height: u32,
    /// 依掃描順序每 4 個像素取一個
    pub samples: Vec<[u8; 3]>,
    pub blank: bool,
}

impl FrameSignature {
    pub fn load(path: &Path) -> Result<Self> {
        let img = image::open(path)
            .with_context(|| format!("無法讀取影格: {}", path.display()))?
            .to_rgb8();
        let (width, height) = img.dimensions();
        let pixels: Vec<[u8; 3]> = img.pixels().map(|p| p.0).collect();
        Ok(Self::from_pixels(width, height, &pixels))
    }

    /// `pixels` 依列優先排列，長度須為 `width * height`
    #[must_use]
    pub fn from_pixels(width: u32, height: u32, pixels: &[[u8; 3]]) -> Self {
        let samples: Vec<[u8; 3]> = pixels.iter().step_by(SAMPLE_STEP).copied().collect();

        let center = (height / 2) as usize * width as usize + (width / 2) as usize;
        let blank = pixels.get(center).is_none_or(|&reference| {
            let limit = pixels.len() / 50 + 1;
            let changed = samples
                .iter()
                .filter(|&&s| color_distance(s, reference) > COLOR_DISTANCE_THRESHOLD)
                .take(limit + 1)
                .count();
            changed <= limit
        });

        Self {
            width,
            height,
            samples,
            blank,
        }
    }

    /// 尺寸相同且所有取樣點完全一致
    #[must_use]
    pub fn repeats(&self, other: &Self) -> bool {
        self.width == other.width && self.height == other.height && self.samples == other.samples
    }
}

#[must_use]
pub fn color_distance(a: [u8; 3], b: [u8; 3]) -> u32 {
    a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| u32::from(x.abs_diff(y)))
        .sum()
}

/// 依時間順序選出要保留的索引
///
/// 比較對象是上一張「保留」的影格，被剔除的影格不會成為比較基準。
#[must_use]
pub fn select_frames(signatures: &[FrameSignature]) -> Vec<usize> {
    let mut previous: Option<&FrameSignature> = None;
    let mut selected = Vec::new();

    for (index, signature) in signatures.iter().enumerate() {
        if signature.blank {
            continue;
        }
        if previous.is_some_and(|prev| signature.repeats(prev)) {
            continue;
        }
        previous = Some(signature);
        selected.push(index);
    }
    selected
}

/// 過濾影格，回傳保留的檔案（維持原順序）
#[must_use]
pub fn filter_frames(frames: &[PathBuf], check_content: bool) -> Vec<PathBuf> {
    if !check_content {
        return frames.to_vec();
    }

    let loaded: Vec<(PathBuf, FrameSignature)> = frames
        .par_iter()
        .filter_map(|path| match FrameSignature::load(path) {
            Ok(signature) => Some((path.clone(), signature)),
            Err(e) => {
                warn!("{e:#}");
                None
            }
        })
        .collect();

    let signatures: Vec<FrameSignature> = loaded.iter().map(|(_, s)| s.clone()).collect();
    let kept: Vec<PathBuf> = select_frames(&signatures)
        .into_iter()
        .map(|index| loaded[index].0.clone())
        .collect();

    debug!("影格過濾: {} -> {}", frames.len(), kept.len());
    kept
}
