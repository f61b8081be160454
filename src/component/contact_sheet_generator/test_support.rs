//! 單元測試用的假 MPlayer

use crate::tools::{CommandRunner, RunError, RunLimits};
use image::{Rgb, RgbImage};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

type Handler = Box<dyn Fn(&[String]) -> String + Send + Sync>;

pub struct ScriptedRunner {
    handler: Handler,
    calls: Mutex<Vec<(Vec<String>, RunLimits)>>,
}

impl Default for ScriptedRunner {
    fn default() -> Self {
        Self::new(|_| String::new())
    }
}

impl ScriptedRunner {
    pub fn new(handler: impl Fn(&[String]) -> String + Send + Sync + 'static) -> Self {
        Self {
            handler: Box::new(handler),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(args, _)| args.clone())
            .collect()
    }

    pub fn limits(&self) -> Vec<RunLimits> {
        self.calls.lock().unwrap().iter().map(|(_, l)| *l).collect()
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, args: &[String], limits: RunLimits) -> Result<String, RunError> {
        self.calls.lock().unwrap().push((args.to_vec(), limits));
        Ok((self.handler)(args))
    }
}

pub fn is_extraction(args: &[String]) -> bool {
    args.iter().any(|a| a.starts_with("jpeg:"))
}

pub fn outdir(args: &[String]) -> Option<PathBuf> {
    args.iter()
        .find_map(|a| a.split_once("outdir=").map(|(_, dir)| PathBuf::from(dir)))
}

/// 產生一張內容不重複的測試影格
pub fn patterned_frame(width: u32, height: u32, seed: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            ((x * 7 + seed * 53) % 256) as u8,
            ((y * 5 + seed * 31) % 256) as u8,
            (((x + y) * 3 + seed * 17) % 256) as u8,
        ])
    })
}

pub fn write_frames(dir: &Path, count: u32, width: u32, height: u32) {
    for i in 1..=count {
        patterned_frame(width, height, i)
            .save(dir.join(format!("{i:08}.jpg")))
            .unwrap();
    }
}
