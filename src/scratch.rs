use crate::util::unix_millis;
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};

/// A per-request staging directory, removed recursively when dropped.
#[derive(Debug)]
pub struct ScratchDir {
    path: PathBuf,
    /// `None` once the directory has been kept.
    dir: Option<TempDir>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScratchEntry {
    pub name: String,
    pub is_file: bool,
}

impl ScratchDir {
    /// Create `<root>/<prefix><millis>-<random>`.
    pub fn create(root: &Path, prefix: &str) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix(&format!("{prefix}{}-", unix_millis()))
            .tempdir_in(root)
            .with_context(|| format!("create scratch dir under {}", root.display()))?;
        let path = dir.path().to_path_buf();
        debug!("scratch dir created: {}", path.display());
        Ok(Self {
            path,
            dir: Some(dir),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn join(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }

    /// Leave the directory on disk after drop.
    pub fn keep(&mut self) {
        if let Some(dir) = self.dir.take() {
            let _ = dir.keep();
        }
    }

    /// Directory contents sorted by name.
    pub fn entries(&self) -> Result<Vec<ScratchEntry>> {
        let mut out = Vec::new();
        let rd = std::fs::read_dir(&self.path)
            .with_context(|| format!("read_dir {}", self.path.display()))?;
        for entry in rd {
            let entry = entry.with_context(|| "read_dir entry")?;
            let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
            out.push(ScratchEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                is_file,
            });
        }
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        let Some(dir) = self.dir.take() else {
            debug!("keeping scratch dir: {}", self.path.display());
            return;
        };
        match dir.close() {
            Ok(()) => debug!("scratch dir removed: {}", self.path.display()),
            Err(e) => warn!("failed to remove scratch dir {}: {e}", self.path.display()),
        }
    }
}
