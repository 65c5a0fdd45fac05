use super::{types::*, Engine};
use crate::config::Config;
use anyhow::{anyhow, Context, Result};
use std::ffi::OsString;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const WELL_KNOWN_PATHS: &[&str] = &[
    "/usr/bin/soffice",
    "/usr/local/bin/soffice",
    "/usr/lib/libreoffice/program/soffice",
    "/opt/libreoffice/program/soffice",
    "/Applications/LibreOffice.app/Contents/MacOS/soffice",
    "C:\\Program Files\\LibreOffice\\program\\soffice.exe",
];

/// Headless office suite driven through its `--convert-to` batch mode.
pub struct SofficeEngine {
    cfg: Config,
    exe: PathBuf,
}

impl SofficeEngine {
    pub fn new(cfg: &Config) -> Result<Self> {
        let exe = resolve_soffice_exe(&cfg.engine.soffice_exe)?;
        Ok(Self {
            cfg: cfg.clone(),
            exe,
        })
    }

    pub fn exe(&self) -> &Path {
        &self.exe
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.exe);
        cmd.args(&self.cfg.engine.launcher_args);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }
        for (k, v) in &self.cfg.engine.env {
            cmd.env(k, v);
        }
        cmd
    }

    fn convert_args(&self, req: &ConvertIn) -> Result<Vec<OsString>> {
        let input = std::path::absolute(&req.input)
            .with_context(|| format!("absolute path: {}", req.input.display()))?;
        let out_dir = std::path::absolute(&req.out_dir)
            .with_context(|| format!("absolute path: {}", req.out_dir.display()))?;

        let mut args: Vec<OsString> = Vec::new();
        if let Some(profile) = &req.profile_dir {
            let profile = std::path::absolute(profile)
                .with_context(|| format!("absolute path: {}", profile.display()))?;
            args.push(format!("-env:UserInstallation={}", file_url(&profile)).into());
        }
        args.push("--headless".into());
        args.push("--norestore".into());
        args.push("--nolockcheck".into());
        args.push("--convert-to".into());
        args.push(convert_to_arg(&self.cfg, &req.target_format).into());
        args.push("--outdir".into());
        args.push(out_dir.into_os_string());
        args.push(input.into_os_string());
        Ok(args)
    }

    fn run(&self, args: &[OsString], timeout_seconds: u64) -> Result<Output> {
        let mut cmd = self.command();
        cmd.args(args);
        info!("exec {}", render_command(&cmd));

        let mut child = cmd
            .spawn()
            .with_context(|| format!("spawning converter: {}", self.exe.display()))?;

        if timeout_seconds > 0 {
            wait_with_timeout(&mut child, Duration::from_secs(timeout_seconds))
        } else {
            child
                .wait_with_output()
                .with_context(|| "waiting for converter")
        }
    }
}

pub fn resolve_soffice_exe(raw: &str) -> Result<PathBuf> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("auto") {
        if let Ok(env_val) = std::env::var("QUACK_CONVERT_SOFFICE") {
            let p = expand_tilde(&env_val);
            if p.exists() {
                return Ok(p);
            }
            warn!("QUACK_CONVERT_SOFFICE points at a missing file: {}", p.display());
        }
        for candidate in WELL_KNOWN_PATHS {
            let p = PathBuf::from(candidate);
            if p.exists() {
                return Ok(p);
            }
        }
        return Ok(PathBuf::from("soffice"));
    }
    Ok(expand_tilde(raw))
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    PathBuf::from(path)
}

/// `--convert-to` value: the bare target, or `target:filter` when a filter
/// is configured for it.
pub fn convert_to_arg(cfg: &Config, target: &str) -> String {
    match cfg.engine.filters.get(target) {
        Some(filter) if filter.contains(':') => filter.clone(),
        Some(filter) => format!("{target}:{filter}"),
        None => target.to_string(),
    }
}

fn file_url(path: &Path) -> String {
    let s = path.display().to_string().replace('\\', "/");
    if s.starts_with('/') {
        format!("file://{s}")
    } else {
        format!("file:///{s}")
    }
}

fn render_command(cmd: &Command) -> String {
    let mut parts = vec![cmd.get_program().to_string_lossy().into_owned()];
    parts.extend(cmd.get_args().map(|a| a.to_string_lossy().into_owned()));
    parts.join(" ")
}

impl Engine for SofficeEngine {
    fn doctor(&self) -> Result<EngineDiag> {
        let exe = self.exe.display().to_string();
        let args: [OsString; 1] = ["--version".into()];
        match self.run(&args, self.cfg.engine.doctor_timeout_seconds) {
            Ok(out) if out.status.success() => {
                let version = String::from_utf8_lossy(&out.stdout).trim().to_string();
                Ok(EngineDiag {
                    exe,
                    version: (!version.is_empty()).then_some(version),
                    ok: true,
                    error: None,
                })
            }
            Ok(out) => Ok(EngineDiag {
                exe,
                version: None,
                ok: false,
                error: Some(format!(
                    "exit {:?}: {}",
                    out.status.code(),
                    String::from_utf8_lossy(&out.stderr).trim()
                )),
            }),
            Err(e) => Ok(EngineDiag {
                exe,
                version: None,
                ok: false,
                error: Some(format!("{e:#}")),
            }),
        }
    }

    fn convert(&self, req: &ConvertIn) -> Result<ConvertOut> {
        let args = self.convert_args(req)?;
        let started = Instant::now();
        let output = self.run(&args, self.cfg.engine.timeout_seconds)?;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if self.cfg.debug.log_tool_output {
            if !stdout.trim().is_empty() {
                debug!("converter stdout: {}", stdout.trim());
            }
            if !stderr.trim().is_empty() {
                debug!("converter stderr: {}", stderr.trim());
            }
        }

        if !output.status.success() {
            return Err(anyhow!(
                "converter exited with {:?}: {}",
                output.status.code(),
                stderr.trim()
            ));
        }

        Ok(ConvertOut {
            status: output.status.code(),
            stdout,
            stderr,
            elapsed_ms,
        })
    }
}

fn wait_with_timeout(child: &mut Child, timeout: Duration) -> Result<Output> {
    // Drain pipes while waiting so a chatty converter can't block on a full
    // stdout/stderr buffer.
    let stdout_reader = child.stdout.take();
    let stderr_reader = child.stderr.take();

    let stdout_thread = std::thread::spawn(move || -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        if let Some(mut out) = stdout_reader {
            out.read_to_end(&mut buf).with_context(|| "read stdout")?;
        }
        Ok(buf)
    });

    let stderr_thread = std::thread::spawn(move || -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        if let Some(mut err) = stderr_reader {
            err.read_to_end(&mut buf).with_context(|| "read stderr")?;
        }
        Ok(buf)
    });

    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait().with_context(|| "try_wait")? {
            let stdout = stdout_thread
                .join()
                .map_err(|_| anyhow!("stdout reader thread panicked"))??;
            let stderr = stderr_thread
                .join()
                .map_err(|_| anyhow!("stderr reader thread panicked"))??;
            return Ok(Output {
                status,
                stdout,
                stderr,
            });
        }

        if start.elapsed() > timeout {
            warn!("converter timed out after {:?}; killing pid {}", timeout, child.id());
            kill_process_tree(child);
            let status = child.wait().with_context(|| "wait after kill")?;
            // Reader threads are left to finish on their own: a descendant
            // that escaped the kill may still hold the pipes open.
            drop(stdout_thread);
            drop(stderr_thread);
            return Err(anyhow!(
                "converter exceeded timeout ({:?}); killed with status {:?}",
                timeout,
                status.code()
            ));
        }

        std::thread::sleep(Duration::from_millis(50));
    }
}

/// The office launcher forks helper processes that inherit our pipes, so the
/// whole process group started for the converter is signalled.
#[cfg(unix)]
fn kill_process_tree(child: &mut Child) {
    let pgid = child.id() as libc::pid_t;
    // SAFETY: killpg only sends a signal; the group was created by
    // `process_group(0)` when this child was spawned.
    let rc = unsafe { libc::killpg(pgid, libc::SIGKILL) };
    if rc != 0 {
        warn!(
            "killpg({pgid}) failed: {}; killing the direct child only",
            std::io::Error::last_os_error()
        );
        let _ = child.kill();
    }
}

#[cfg(not(unix))]
fn kill_process_tree(child: &mut Child) {
    let _ = child.kill();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn convert_to_uses_configured_filter() {
        let mut cfg = Config::default();
        cfg.engine.filters.insert("txt".into(), "Text".into());
        cfg.engine
            .filters
            .insert("csv".into(), "csv:Text - txt - csv (StarCalc)".into());
        assert_eq!(convert_to_arg(&cfg, "txt"), "txt:Text");
        assert_eq!(convert_to_arg(&cfg, "csv"), "csv:Text - txt - csv (StarCalc)");
        assert_eq!(convert_to_arg(&cfg, "pdf"), "pdf");
    }

    #[test]
    fn file_url_has_three_slashes() {
        assert_eq!(file_url(Path::new("/tmp/x/profile")), "file:///tmp/x/profile");
    }

    #[test]
    fn explicit_exe_is_taken_verbatim() {
        let p = resolve_soffice_exe("/opt/office/soffice").unwrap();
        assert_eq!(p, PathBuf::from("/opt/office/soffice"));
    }
}
