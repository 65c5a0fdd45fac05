use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: Server,
    #[serde(default)]
    pub paths: Paths,
    #[serde(default)]
    pub engine: Engine,
    #[serde(default)]
    pub formats: Formats,
    #[serde(default)]
    pub output: Output,
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub debug: Debug,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        let cfg: Config = toml::from_str(&raw).with_context(|| "parsing TOML")?;
        Ok(cfg)
    }

    /// Like [`Config::load`], but a missing file yields the built-in defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Directory scratch dirs are created under; empty means the OS temp area.
    pub fn scratch_root(&self) -> PathBuf {
        if self.paths.scratch_root.is_empty() {
            std::env::temp_dir()
        } else {
            PathBuf::from(&self.paths.scratch_root)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Server {
    pub bind_address: String,
    pub convert_path: String,
    pub max_upload_bytes: usize,
    pub max_concurrent_conversions: usize,
}
impl Default for Server {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8080".into(),
            convert_path: "/api/convert".into(),
            max_upload_bytes: 100 * 1024 * 1024,
            max_concurrent_conversions: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Paths {
    pub scratch_root: String,
    pub scratch_prefix: String,
    pub out_dir: String,
}
impl Default for Paths {
    fn default() -> Self {
        Self {
            scratch_root: "".into(),
            scratch_prefix: "quack-convert-".into(),
            out_dir: "out".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Engine {
    pub soffice_exe: String,
    pub launcher_args: Vec<String>,
    pub isolate_profile: bool,
    pub timeout_seconds: u64,
    pub doctor_timeout_seconds: u64,
    pub filters: BTreeMap<String, String>,
    pub env: BTreeMap<String, String>,
}
impl Default for Engine {
    fn default() -> Self {
        Self {
            soffice_exe: "auto".into(),
            launcher_args: Vec::new(),
            isolate_profile: true,
            timeout_seconds: 180,
            doctor_timeout_seconds: 30,
            filters: Default::default(),
            env: Default::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Formats {
    pub mime_overrides: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Output {
    pub use_upload_stem: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Logging {
    pub level: String,
    pub json: bool,
    pub write_to_file: bool,
    pub file_path: String,
}
impl Default for Logging {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
            write_to_file: false,
            file_path: "".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Debug {
    pub keep_scratch_dirs: bool,
    pub log_tool_output: bool,
}
impl Default for Debug {
    fn default() -> Self {
        Self {
            keep_scratch_dirs: false,
            log_tool_output: true,
        }
    }
}
