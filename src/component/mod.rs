//! 功能元件模組

pub mod contact_sheet_generator;

pub use contact_sheet_generator::{ContactSheetGenerator, VideoThumbsMaker};
