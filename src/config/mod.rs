pub mod load;
pub mod save;
pub mod types;

pub use types::{
    Config, ContactSheetSettings, FIRST_CALL_MAX_LINES, GridLayout, MAX_LINES, MAX_RECENT_PATHS,
    ThumbsConfig, UserSettings,
};
