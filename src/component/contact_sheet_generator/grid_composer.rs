//! 預覽圖合成
//!
//! 所有格子大小相同，高度依影片比例換算。影格數少於格數時會重複使用，
//! 多於格數時平均跳選。

use super::types::{MAX_SHEET_SIDE, OutputSpec};
use crate::tools::Dimension;
use anyhow::{Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use log::debug;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

const BACKGROUND: Rgb<u8> = Rgb([222, 222, 222]);
const OUTLINE: Rgb<u8> = Rgb([22, 22, 22]);
const SHEET_JPEG_QUALITY: u8 = 75;

/// 預覽圖版面
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridGeometry {
    pub columns: u32,
    pub rows: u32,
    pub cell_width: u32,
    pub cell_height: u32,
    pub border: u32,
}

impl GridGeometry {
    #[must_use]
    pub fn new(spec: &OutputSpec, dimension: Dimension) -> Self {
        let cell_height = u64::from(dimension.height) * u64::from(spec.thumb_width)
            / u64::from(dimension.width.max(1));

        Self {
            columns: spec.columns,
            rows: spec.rows,
            cell_width: spec.thumb_width,
            cell_height: u32::try_from(cell_height).unwrap_or(u32::MAX).max(1),
            border: spec.border,
        }
    }

    /// 整張圖的寬高（含外框），溢位時回傳 `None`
    #[must_use]
    pub fn canvas_size(&self) -> Option<(u32, u32)> {
        let side = |count: u32, cell: u32| {
            cell.checked_add(self.border)?
                .checked_mul(count)?
                .checked_add(self.border)?
                .checked_add(2)
        };
        Some((
            side(self.columns, self.cell_width)?,
            side(self.rows, self.cell_height)?,
        ))
    }

    /// 第 `row` 列第 `column` 欄的左上角
    #[must_use]
    pub const fn cell_origin(&self, row: u32, column: u32) -> (u32, u32) {
        (
            1 + column * (self.cell_width + self.border) + self.border,
            1 + row * (self.cell_height + self.border) + self.border,
        )
    }

    #[must_use]
    pub const fn cells(&self) -> u32 {
        self.columns.saturating_mul(self.rows)
    }
}

/// 每一格使用的影格索引，依列優先順序
#[must_use]
pub fn frame_indices(frame_count: usize, cells: u32) -> Vec<usize> {
    if frame_count == 0 || cells == 0 {
        return Vec::new();
    }

    let rate = frame_count as f64 * 0.999 / f64::from(cells);
    let mut pos = rate * 0.4;
    let mut indices = Vec::with_capacity(cells as usize);

    for _ in 0..cells {
        indices.push((pos as usize).min(frame_count - 1));
        pos += rate;
    }
    indices
}

/// 合成預覽圖
pub fn compose_grid(frames: &[PathBuf], geometry: &GridGeometry) -> Result<RgbImage> {
    anyhow::ensure!(!frames.is_empty(), "沒有可用的影格");

    let (width, height) = geometry
        .canvas_size()
        .filter(|&(w, h)| w <= MAX_SHEET_SIDE && h <= MAX_SHEET_SIDE)
        .with_context(|| format!("預覽圖尺寸超過上限 {MAX_SHEET_SIDE}: {geometry:?}"))?;
    let mut canvas = RgbImage::from_pixel(width, height, BACKGROUND);
    draw_outline(&mut canvas);

    let indices = frame_indices(frames.len(), geometry.cells());
    let mut scaled: HashMap<usize, RgbImage> = HashMap::new();

    for (cell, &index) in indices.iter().enumerate() {
        let cell = cell as u32;
        let (x, y) = geometry.cell_origin(cell / geometry.columns, cell % geometry.columns);

        if !scaled.contains_key(&index) {
            let path = &frames[index];
            let frame = image::open(path)
                .with_context(|| format!("無法讀取影格: {}", path.display()))?
                .to_rgb8();
            let resized = imageops::resize(
                &frame,
                geometry.cell_width,
                geometry.cell_height,
                FilterType::Triangle,
            );
            scaled.insert(index, resized);
        }

        if let Some(thumb) = scaled.get(&index) {
            imageops::replace(&mut canvas, thumb, i64::from(x), i64::from(y));
        }
    }

    Ok(canvas)
}

fn draw_outline(canvas: &mut RgbImage) {
    let (width, height) = canvas.dimensions();
    for x in 0..width {
        canvas.put_pixel(x, 0, OUTLINE);
        canvas.put_pixel(x, height - 1, OUTLINE);
    }
    for y in 0..height {
        canvas.put_pixel(0, y, OUTLINE);
        canvas.put_pixel(width - 1, y, OUTLINE);
    }
}

/// 合成並寫出 JPEG，既有檔案會被覆寫
pub fn write_grid(frames: &[PathBuf], spec: &OutputSpec, dimension: Dimension) -> Result<()> {
    let geometry = GridGeometry::new(spec, dimension);
    let canvas = compose_grid(frames, &geometry)?;

    let file = File::create(&spec.output_path)
        .with_context(|| format!("無法建立輸出檔案: {}", spec.output_path.display()))?;
    let mut encoder = JpegEncoder::new_with_quality(BufWriter::new(file), SHEET_JPEG_QUALITY);
    encoder
        .encode_image(&canvas)
        .with_context(|| format!("無法寫入預覽圖: {}", spec.output_path.display()))?;

    debug!(
        "預覽圖已寫入: {} ({}x{})",
        spec.output_path.display(),
        canvas.width(),
        canvas.height()
    );
    Ok(())
}
