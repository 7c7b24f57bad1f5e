//! Invocation of the external `sapebook2pdf` converter.
//!
//! The web layer never interprets the converter's work; it only prepares a
//! [`ConversionJob`] and hands it to a [`Converter`]. Production uses
//! [`ExternalConverter`], which spawns the binary. Tests and embedders can
//! inject their own implementation through
//! [`crate::config::ServiceConfigBuilder::converter`].
//!
//! Arguments are passed as a fixed-arity argument vector, never through a
//! shell, so user-supplied URLs and file names cannot inject commands.

use crate::config::ServiceConfig;
use crate::error::SapebookError;
use async_trait::async_trait;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Everything the converter needs for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionJob {
    /// Saved cookie file inside the workspace.
    pub cookies: PathBuf,
    /// Base URL of the book to fetch.
    pub base_url: String,
    /// Page selection, forwarded as-is.
    pub pages: String,
    /// Where the converter must write the PDF.
    pub pdf_out: PathBuf,
    /// Working directory for the converter process.
    pub workdir: PathBuf,
}

impl ConversionJob {
    /// The four `--flag=value` arguments, in the order the converter expects.
    pub fn args(&self) -> Vec<OsString> {
        vec![
            flag("--cookies=", self.cookies.as_os_str()),
            flag("--baseurl=", OsStr::new(&self.base_url)),
            flag("--pages=", OsStr::new(&self.pages)),
            flag("--pdfout=", self.pdf_out.as_os_str()),
        ]
    }
}

fn flag(name: &str, value: &OsStr) -> OsString {
    let mut arg = OsString::with_capacity(name.len() + value.len());
    arg.push(name);
    arg.push(value);
    arg
}

/// Runs a [`ConversionJob`] to completion.
///
/// Returning `Ok(())` means the converter reports success; the caller still
/// checks that the PDF exists.
#[async_trait]
pub trait Converter: Send + Sync {
    async fn run(&self, job: &ConversionJob) -> Result<(), SapebookError>;
}

/// Spawns the converter binary as a child process.
#[derive(Debug, Clone)]
pub struct ExternalConverter {
    program: PathBuf,
    timeout: Option<Duration>,
}

impl ExternalConverter {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn from_config(config: &ServiceConfig) -> Self {
        let converter = Self::new(&config.converter_program);
        match config.converter_timeout_secs {
            Some(secs) => converter.with_timeout(Duration::from_secs(secs)),
            None => converter,
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

#[async_trait]
impl Converter for ExternalConverter {
    async fn run(&self, job: &ConversionJob) -> Result<(), SapebookError> {
        info!(
            "Running {} for {} (pages: {:?})",
            self.program.display(),
            job.base_url,
            job.pages
        );

        let child = Command::new(&self.program)
            .args(job.args())
            .current_dir(&job.workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // The workspace is deleted when the request future is dropped;
            // the child must not outlive it.
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| SapebookError::ConverterSpawnFailed {
                program: self.program.clone(),
                source,
            })?;

        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| SapebookError::ConverterTimeout {
                    secs: limit.as_secs(),
                })?,
            None => child.wait_with_output().await,
        }
        .map_err(|source| SapebookError::ConverterSpawnFailed {
            program: self.program.clone(),
            source,
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stdout.trim().is_empty() {
            debug!("converter stdout:\n{}", stdout.trim_end());
        }
        if !stderr.trim().is_empty() {
            debug!("converter stderr:\n{}", stderr.trim_end());
        }

        if !output.status.success() {
            warn!("{} exited with {}", self.program.display(), output.status);
            return Err(SapebookError::ConverterFailed {
                status: output.status.to_string(),
                stderr: tail(&stderr, 2000),
            });
        }

        Ok(())
    }
}

/// Keep at most the last `max` bytes of `s`, on a char boundary.
fn tail(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut start = s.len() - max;
    while !s.is_char_boundary(start) {
        start += 1;
    }
    format!("\u{2026}{}", &s[start..])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(dir: &Path) -> ConversionJob {
        ConversionJob {
            cookies: dir.join("cookies.txt"),
            base_url: "https://example.com".into(),
            pages: "5".into(),
            pdf_out: dir.join("ebook.pdf"),
            workdir: dir.to_path_buf(),
        }
    }

    #[test]
    fn args_are_the_four_flags_in_order() {
        let j = job(Path::new("/tmp/ws"));
        assert_eq!(
            j.args(),
            vec![
                OsString::from("--cookies=/tmp/ws/cookies.txt"),
                OsString::from("--baseurl=https://example.com"),
                OsString::from("--pages=5"),
                OsString::from("--pdfout=/tmp/ws/ebook.pdf"),
            ]
        );
    }

    #[test]
    fn args_keep_shell_metacharacters_literal() {
        let mut j = job(Path::new("/tmp/ws"));
        j.base_url = "https://x.test/?a=1&b=$(rm -rf /)".into();
        j.pages = "1 2; echo".into();
        let args = j.args();
        assert_eq!(args.len(), 4);
        assert_eq!(args[1], OsString::from("--baseurl=https://x.test/?a=1&b=$(rm -rf /)"));
        assert_eq!(args[2], OsString::from("--pages=1 2; echo"));
    }

    #[test]
    fn tail_truncates_on_char_boundary() {
        assert_eq!(tail("short", 10), "short");
        let t = tail("ééééé", 3);
        assert!(t.starts_with('\u{2026}'));
        assert!(t.ends_with('é'));
    }

    #[test]
    fn from_config_carries_timeout() {
        let config = ServiceConfig::builder()
            .converter_program("/usr/local/bin/sapebook2pdf")
            .converter_timeout_secs(90)
            .build()
            .unwrap();
        let c = ExternalConverter::from_config(&config);
        assert_eq!(c.program(), Path::new("/usr/local/bin/sapebook2pdf"));
        assert_eq!(c.timeout, Some(Duration::from_secs(90)));
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_failure() {
        let dir = tempfile::tempdir().unwrap();
        let c = ExternalConverter::new(dir.path().join("no-such-converter"));
        let err = c.run(&job(dir.path())).await.unwrap_err();
        assert!(matches!(err, SapebookError::ConverterSpawnFailed { .. }), "got: {err}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_is_a_converter_failure() {
        let dir = tempfile::tempdir().unwrap();
        let err = ExternalConverter::new("false")
            .run(&job(dir.path()))
            .await
            .unwrap_err();
        assert!(matches!(err, SapebookError::ConverterFailed { .. }), "got: {err}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn zero_exit_is_success() {
        let dir = tempfile::tempdir().unwrap();
        ExternalConverter::new("true")
            .run(&job(dir.path()))
            .await
            .unwrap();
    }

    /// Write an executable shell script that sleeps, then leaves a marker
    /// file next to itself if it was not killed first.
    #[cfg(unix)]
    fn slow_script(dir: &Path, sleep_secs: u32) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let script = dir.join("slow-converter.sh");
        std::fs::write(
            &script,
            format!("#!/bin/sh\nsleep {sleep_secs}\ntouch \"$0.done\"\n"),
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        script
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn timeout_kills_slow_converter() {
        let dir = tempfile::tempdir().unwrap();
        let script = slow_script(dir.path(), 3);
        let started = std::time::Instant::now();

        let err = ExternalConverter::new(&script)
            .with_timeout(Duration::from_secs(1))
            .run(&job(dir.path()))
            .await
            .unwrap_err();

        assert!(matches!(err, SapebookError::ConverterTimeout { secs: 1 }), "got: {err}");
        assert!(started.elapsed() < Duration::from_secs(3));

        // Had the script survived, it would have written the marker by now.
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(!dir.path().join("slow-converter.sh.done").exists());
    }
}
