//! 影片預覽圖生成元件
//!
//! 以外部 MPlayer 擷取影格，合成網格預覽圖：
//! A. 讀取影片資訊（identify）
//! B. 計算取樣間隔
//! C. 擷取影格，依輸出自我修正
//! D. 過濾空白與重複影格
//! E. 合成一或多張預覽圖

pub mod decoder;
pub mod frame_extractor;
pub mod frame_filter;
pub mod grid_composer;
mod main;
pub mod probe;
pub mod sampling_plan;
#[cfg(test)]
mod test_support;
mod thumbs_maker;
mod types;

pub use decoder::{DecoderSession, KeyframeWaitSupport};
pub use main::{ContactSheetGenerator, GenerationResult, output_specs};
pub use thumbs_maker::VideoThumbsMaker;
pub use types::{GridOutput, OutputSpec, ProbeResult, ThumbResult};
