//! 外部程式執行器
//!
//! 以兩條讀取執行緒同時收集 stdout / stderr，寫入同一個加鎖的輸出緩衝。
//! 主執行緒不做阻塞讀取，而是等待讀取端的訊號，直到程序結束或逾時。

use log::{Level, debug, log, warn};
use std::io::{BufRead, BufReader, Read};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;

/// 出現此字串時立即終止程序
pub const FATAL_OUTPUT_MARKER: &str = "Error while decoding frame!";

/// 讀取端已關閉但程序仍存活時的檢查間隔
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Debug, Error)]
pub enum RunError {
    #[error("命令列為空")]
    EmptyCommand,
    #[error("無法啟動外部程式 {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// 單次執行的限制
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunLimits {
    pub timeout: Duration,
    pub max_lines: usize,
}

impl RunLimits {
    #[must_use]
    pub const fn new(timeout: Duration, max_lines: usize) -> Self {
        Self { timeout, max_lines }
    }
}

/// 執行外部命令並回傳合併後的文字輸出
///
/// `args[0]` 為程式路徑。實作必須能被多個執行緒共用。
pub trait CommandRunner: Send + Sync {
    fn run(&self, args: &[String], limits: RunLimits) -> Result<String, RunError>;
}

/// 提前終止的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminateReason {
    FatalMarker,
    LineLimit,
}

/// 兩條串流共用的輸出緩衝與行數計數
#[derive(Debug)]
pub struct OutputSink {
    text: String,
    lines: usize,
    max_lines: usize,
}

impl OutputSink {
    #[must_use]
    pub const fn new(max_lines: usize) -> Self {
        Self {
            text: String::new(),
            lines: 0,
            max_lines,
        }
    }

    /// 加入一行，回傳是否需要終止程序
    pub fn push_line(&mut self, line: &str) -> Option<TerminateReason> {
        self.lines += 1;
        self.text.push_str(line);
        self.text.push('\n');

        if line.contains(FATAL_OUTPUT_MARKER) {
            Some(TerminateReason::FatalMarker)
        } else if self.lines > self.max_lines {
            Some(TerminateReason::LineLimit)
        } else {
            None
        }
    }

    #[must_use]
    pub const fn line_count(&self) -> usize {
        self.lines
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }
}

enum ReaderSignal {
    Terminate(TerminateReason),
    Closed,
}

/// 以 `std::process` 實際啟動子程序的執行器
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    verbose: bool,
}

impl ProcessRunner {
    #[must_use]
    pub const fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    const fn echo_level(&self) -> Level {
        if self.verbose { Level::Info } else { Level::Trace }
    }
}

impl CommandRunner for ProcessRunner {
    fn run(&self, args: &[String], limits: RunLimits) -> Result<String, RunError> {
        let (program, rest) = args.split_first().ok_or(RunError::EmptyCommand)?;

        log!(
            self.echo_level().min(Level::Debug),
            "CMD = {} (timeout {} ms)",
            args.join(" "),
            limits.timeout.as_millis()
        );

        let mut child = Command::new(program)
            .args(rest)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| RunError::Spawn {
                program: program.clone(),
                source,
            })?;

        let sink = Arc::new(Mutex::new(OutputSink::new(limits.max_lines)));
        let (tx, rx) = mpsc::channel();
        let mut open_readers = 0;

        if let Some(stdout) = child.stdout.take() {
            spawn_reader(stdout, Arc::clone(&sink), tx.clone(), self.echo_level());
            open_readers += 1;
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_reader(stderr, Arc::clone(&sink), tx.clone(), self.echo_level());
            open_readers += 1;
        }
        drop(tx);

        let deadline = Instant::now() + limits.timeout;

        while open_readers > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match rx.recv_timeout(remaining) {
                Ok(ReaderSignal::Closed) => open_readers -= 1,
                Ok(ReaderSignal::Terminate(reason)) => {
                    debug!("提前終止 {program}: {reason:?}");
                    terminate(&mut child);
                    return Ok(snapshot(&sink));
                }
                Err(RecvTimeoutError::Timeout) => {
                    warn!("執行逾時 ({} ms)，終止 {program}", limits.timeout.as_millis());
                    terminate(&mut child);
                    return Ok(snapshot(&sink));
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        wait_for_exit(&mut child, deadline, program);
        Ok(snapshot(&sink))
    }
}

fn spawn_reader<S>(
    stream: S,
    sink: Arc<Mutex<OutputSink>>,
    tx: Sender<ReaderSignal>,
    echo_level: Level,
) where
    S: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut reader = BufReader::new(stream);
        let mut buf = Vec::new();

        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }

            let decoded = String::from_utf8_lossy(&buf);
            let chunk = decoded.trim_end_matches('\n');

            // 狀態列以 \r 覆寫，每段各算一行
            for line in chunk.split('\r').filter(|l| !l.is_empty()) {
                log!(echo_level, "{line}");
                let verdict = sink
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push_line(line);
                if let Some(reason) = verdict {
                    let _ = tx.send(ReaderSignal::Terminate(reason));
                }
            }
        }

        let _ = tx.send(ReaderSignal::Closed);
    });
}

/// 兩條串流都已關閉後，等待程序自行結束（最多到期限為止）
fn wait_for_exit(child: &mut Child, deadline: Instant, program: &str) {
    loop {
        match child.try_wait() {
            Ok(Some(_)) => return,
            Ok(None) if Instant::now() < deadline => thread::sleep(EXIT_POLL_INTERVAL),
            Ok(None) => {
                warn!("執行逾時，終止 {program}");
                terminate(child);
                return;
            }
            Err(e) => {
                warn!("無法檢查程序狀態 {program}: {e}");
                terminate(child);
                return;
            }
        }
    }
}

fn terminate(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

fn snapshot(sink: &Mutex<OutputSink>) -> String {
    sink.lock()
        .unwrap_or_else(PoisonError::into_inner)
        .text()
        .to_string()
}
