#![allow(dead_code)]

use anyhow::{anyhow, Result};
use quack_convert::config::Config;
use quack_convert::engine::{ConvertIn, ConvertOut, Engine, EngineDiag};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Stands in for the office suite: copies the staged input to
/// `<stem>.<target>` in the output directory, the way `--convert-to` names
/// its results.
#[derive(Default)]
pub struct CopyEngine {
    pub seen: Mutex<Vec<ConvertIn>>,
}

impl Engine for CopyEngine {
    fn doctor(&self) -> Result<EngineDiag> {
        Ok(EngineDiag {
            exe: "copy".into(),
            version: Some("copy 1.0".into()),
            ok: true,
            error: None,
        })
    }

    fn convert(&self, req: &ConvertIn) -> Result<ConvertOut> {
        self.seen.lock().unwrap().push(req.clone());
        let stem = req.input.file_stem().unwrap().to_string_lossy().into_owned();
        let out = req.out_dir.join(format!("{stem}.{}", req.target_format));
        std::fs::copy(&req.input, out)?;
        Ok(ConvertOut {
            status: Some(0),
            stdout: String::new(),
            stderr: String::new(),
            elapsed_ms: 1,
        })
    }
}

/// Exits cleanly without writing anything.
pub struct SilentEngine;

impl Engine for SilentEngine {
    fn doctor(&self) -> Result<EngineDiag> {
        Err(anyhow!("not installed"))
    }

    fn convert(&self, _req: &ConvertIn) -> Result<ConvertOut> {
        Ok(ConvertOut {
            status: Some(0),
            stdout: String::new(),
            stderr: String::new(),
            elapsed_ms: 1,
        })
    }
}

/// Fails the way a crashed converter does.
pub struct CrashingEngine;

impl Engine for CrashingEngine {
    fn doctor(&self) -> Result<EngineDiag> {
        Err(anyhow!("not installed"))
    }

    fn convert(&self, _req: &ConvertIn) -> Result<ConvertOut> {
        Err(anyhow!("converter exited with Some(81): source file could not be loaded"))
    }
}

/// A [`CopyEngine`] that holds each conversion open for a while and records
/// the highest number of conversions it saw running at once.
#[derive(Default)]
pub struct GateEngine {
    pub inner: CopyEngine,
    active: AtomicUsize,
    pub max_active: AtomicUsize,
}

impl Engine for GateEngine {
    fn doctor(&self) -> Result<EngineDiag> {
        self.inner.doctor()
    }

    fn convert(&self, req: &ConvertIn) -> Result<ConvertOut> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(200));
        let out = self.inner.convert(req);
        self.active.fetch_sub(1, Ordering::SeqCst);
        out
    }
}

pub fn config_with_scratch_root(root: &Path) -> Config {
    let mut cfg = Config::default();
    cfg.paths.scratch_root = root.display().to_string();
    cfg
}

pub fn is_empty_dir(p: &Path) -> bool {
    std::fs::read_dir(p).unwrap().next().is_none()
}
