//! MPlayer 呼叫環境
//!
//! 跨呼叫共用的狀態只有兩個：是否為第一次呼叫（冷啟動），
//! 以及 `-lavdopts wait_keyframe` 是否被支援。兩者都以原子變數保存，
//! 同一個產生器可以被多個執行緒同時使用。

use crate::config::{FIRST_CALL_MAX_LINES, MAX_LINES, ThumbsConfig};
use crate::tools::{CommandRunner, RunError, RunLimits};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Info,
    Extraction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyframeWaitSupport {
    Unknown,
    Supported,
    Unsupported,
}

impl KeyframeWaitSupport {
    const fn to_u8(self) -> u8 {
        match self {
            Self::Unknown => 0,
            Self::Supported => 1,
            Self::Unsupported => 2,
        }
    }

    const fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Supported,
            2 => Self::Unsupported,
            _ => Self::Unknown,
        }
    }
}

#[derive(Debug)]
pub struct DecoderSession {
    first_call: AtomicBool,
    wait_keyframe: AtomicU8,
}

impl Default for DecoderSession {
    fn default() -> Self {
        Self {
            first_call: AtomicBool::new(true),
            wait_keyframe: AtomicU8::new(KeyframeWaitSupport::Unknown.to_u8()),
        }
    }
}

impl DecoderSession {
    /// 回傳是否為第一次呼叫，並清除旗標
    pub fn take_first_call(&self) -> bool {
        self.first_call.swap(false, Ordering::SeqCst)
    }

    pub fn wait_keyframe(&self) -> KeyframeWaitSupport {
        KeyframeWaitSupport::from_u8(self.wait_keyframe.load(Ordering::SeqCst))
    }

    pub fn disable_wait_keyframe(&self) {
        self.wait_keyframe
            .store(KeyframeWaitSupport::Unsupported.to_u8(), Ordering::SeqCst);
    }

    /// 尚未確定時標記為支援
    pub fn confirm_wait_keyframe(&self) {
        let _ = self.wait_keyframe.compare_exchange(
            KeyframeWaitSupport::Unknown.to_u8(),
            KeyframeWaitSupport::Supported.to_u8(),
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }
}

/// 一次呼叫所需的執行器、設定與共用狀態
pub struct Decoder<'a, R: CommandRunner + ?Sized> {
    pub runner: &'a R,
    pub config: &'a ThumbsConfig,
    pub session: &'a DecoderSession,
}

impl<R: CommandRunner + ?Sized> Decoder<'_, R> {
    #[must_use]
    pub fn program(&self) -> &str {
        &self.config.mplayer
    }

    pub fn limits(&self, kind: CallKind) -> RunLimits {
        if self.session.take_first_call() {
            return RunLimits::new(self.config.timeout_first_call(), FIRST_CALL_MAX_LINES);
        }
        match kind {
            CallKind::Info => RunLimits::new(self.config.timeout_info(), MAX_LINES),
            CallKind::Extraction => RunLimits::new(self.config.timeout_process(), MAX_LINES),
        }
    }

    pub fn run(&self, args: &[String], kind: CallKind) -> Result<String, RunError> {
        self.runner.run(args, self.limits(kind))
    }
}
