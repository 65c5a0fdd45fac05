use crate::{
    config::Config,
    engine::{ConvertIn, Engine},
    formats::{mime_for, normalize_format, validate_format},
    report::JobReport,
    scratch::{ScratchDir, ScratchEntry},
    util::upload_stem,
};
use anyhow::{anyhow, Context, Result};
use std::time::Instant;
use tracing::{debug, info};

/// One uploaded document plus the format pair it should move between.
#[derive(Debug, Clone)]
pub struct ConversionRequest {
    pub file_name: Option<String>,
    pub payload: Vec<u8>,
    pub source_format: String,
    pub target_format: String,
}

#[derive(Debug, Clone)]
pub struct ConvertedFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
    pub report: JobReport,
}

pub struct Pipeline<E: Engine> {
    cfg: Config,
    engine: E,
}

impl<E: Engine> Pipeline<E> {
    pub fn new(cfg: &Config, engine: E) -> Self {
        Self {
            cfg: cfg.clone(),
            engine,
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn run_job(&self, req: &ConversionRequest) -> Result<ConvertedFile> {
        let started = Instant::now();

        let source = normalize_format(&req.source_format);
        let target = normalize_format(&req.target_format);
        validate_format(&source).with_context(|| "sourceFormat")?;
        validate_format(&target).with_context(|| "targetFormat")?;

        let mut scratch =
            ScratchDir::create(&self.cfg.scratch_root(), &self.cfg.paths.scratch_prefix)?;
        if self.cfg.debug.keep_scratch_dirs {
            scratch.keep();
        }

        let input_name = format!("input.{source}");
        let input_path = scratch.join(&input_name);
        std::fs::write(&input_path, &req.payload)
            .with_context(|| format!("writing upload: {}", input_path.display()))?;

        info!(
            "convert {source} -> {target} bytes={} scratch={}",
            req.payload.len(),
            scratch.path().display()
        );

        let convert_in = ConvertIn {
            input: input_path,
            out_dir: scratch.path().to_path_buf(),
            target_format: target.clone(),
            profile_dir: self
                .cfg
                .engine
                .isolate_profile
                .then(|| scratch.join("profile")),
        };
        let out = self.engine.convert(&convert_in)?;
        debug!(status = ?out.status, elapsed_ms = out.elapsed_ms, "converter finished");

        let entries = scratch.entries()?;
        debug!(?entries, "scratch listing");

        let produced = select_output(&entries, &input_name, &target).ok_or_else(|| {
            anyhow!(
                "converter produced no .{target} file; scratch dir contained: [{}]",
                entries
                    .iter()
                    .map(|e| e.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            )
        })?;

        let output_path = scratch.join(&produced);
        let bytes = std::fs::read(&output_path)
            .with_context(|| format!("reading output: {}", output_path.display()))?;

        let file_name = if self.cfg.output.use_upload_stem {
            req.file_name
                .as_deref()
                .and_then(upload_stem)
                .map(|stem| format!("{stem}.{target}"))
                .unwrap_or_else(|| produced.clone())
        } else {
            produced.clone()
        };

        let report = JobReport {
            source_format: source,
            target_format: target.clone(),
            input_bytes: req.payload.len() as u64,
            output_bytes: bytes.len() as u64,
            output_name: produced,
            converter_ms: out.elapsed_ms,
            total_ms: started.elapsed().as_millis() as u64,
        };
        info!(
            "converted {} -> {} in {}ms ({} -> {} bytes)",
            report.source_format,
            report.target_format,
            report.total_ms,
            report.input_bytes,
            report.output_bytes
        );

        Ok(ConvertedFile {
            file_name,
            content_type: mime_for(&target, &self.cfg.formats.mime_overrides),
            bytes,
            report,
        })
    }
}

/// First regular file, in name order, carrying the target extension that is
/// not the staged input itself.
pub fn select_output(entries: &[ScratchEntry], input_name: &str, target: &str) -> Option<String> {
    let suffix = format!(".{target}");
    entries
        .iter()
        .filter(|e| e.is_file)
        .find(|e| e.name != input_name && e.name.to_ascii_lowercase().ends_with(&suffix))
        .map(|e| e.name.clone())
}
