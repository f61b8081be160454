pub mod mplayer_output;
pub mod path_fallback;
mod path_validator;
pub mod process_runner;
pub mod scoped_temp_dir;
mod video_scanner;

pub use mplayer_output::Dimension;
pub use path_validator::{ensure_directory_exists, validate_directory_exists, validate_file_exists};
pub use process_runner::{CommandRunner, OutputSink, ProcessRunner, RunError, RunLimits};
pub use scoped_temp_dir::ScopedTempDir;
pub use video_scanner::{VideoFileInfo, scan_video_files};
