//! Error types for the sapebook-web service.
//!
//! Every failure is terminal for the request that hit it, so a single
//! [`SapebookError`] enum covers the whole taxonomy. [`ErrorKind`] groups the
//! variants into the three families a caller actually branches on:
//!
//! * **Validation** — the submitted form is unusable. Rendered as
//!   `400 Input Error`; the converter is never started.
//! * **Storage** — the temporary workspace could not be created, written or
//!   read back.
//! * **Subprocess** — `sapebook2pdf` could not be started, exited non-zero,
//!   timed out, or exited cleanly without writing the PDF.
//!
//! Storage and subprocess failures are rendered as `500` with the message.

use axum::http::StatusCode;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the sapebook-web library.
#[derive(Debug, Error)]
pub enum SapebookError {
    // ── Validation errors ─────────────────────────────────────────────────
    /// The submitted form is missing a field or has an empty one.
    #[error("Input Error: {reason}")]
    InvalidInput { reason: String },

    // ── Storage errors ────────────────────────────────────────────────────
    /// Could not create the per-request temporary directory.
    #[error("Failed to create workspace directory: {source}")]
    WorkspaceCreateFailed {
        #[source]
        source: std::io::Error,
    },

    /// Could not persist the uploaded cookie file.
    #[error("Failed to save upload to '{path}': {source}")]
    UploadWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The converter produced a file but it could not be read back.
    #[error("Failed to read converter output '{path}': {source}")]
    OutputReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Subprocess errors ─────────────────────────────────────────────────
    /// The converter binary could not be started at all.
    #[error("Failed to start converter '{program}': {source}\nIs sapebook2pdf installed and on PATH?")]
    ConverterSpawnFailed {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The converter ran but exited unsuccessfully.
    #[error("Converter exited with {status}{}", format_stderr(.stderr))]
    ConverterFailed { status: String, stderr: String },

    /// The converter did not finish within the configured timeout.
    #[error("Converter timed out after {secs}s")]
    ConverterTimeout { secs: u64 },

    /// The converter exited successfully without writing the PDF.
    #[error("Converter finished but produced no output at '{path}'")]
    OutputMissing { path: PathBuf },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

fn format_stderr(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(": {trimmed}")
    }
}

/// Coarse classification of a [`SapebookError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Storage,
    Subprocess,
    Config,
}

impl SapebookError {
    /// Shorthand for an [`SapebookError::InvalidInput`].
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        SapebookError::InvalidInput {
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            SapebookError::InvalidInput { .. } => ErrorKind::Validation,
            SapebookError::WorkspaceCreateFailed { .. }
            | SapebookError::UploadWriteFailed { .. }
            | SapebookError::OutputReadFailed { .. } => ErrorKind::Storage,
            SapebookError::ConverterSpawnFailed { .. }
            | SapebookError::ConverterFailed { .. }
            | SapebookError::ConverterTimeout { .. }
            | SapebookError::OutputMissing { .. } => ErrorKind::Subprocess,
            SapebookError::InvalidConfig(_) => ErrorKind::Config,
        }
    }

    /// HTTP status used when this error ends a request.
    pub fn status_code(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Plain-text body shown to the browser.
    ///
    /// Validation failures keep the terse `Input Error` the form has always
    /// answered with; the detailed reason only goes to the log.
    pub fn public_message(&self) -> String {
        match self.kind() {
            ErrorKind::Validation => "Input Error".to_string(),
            _ => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_maps_to_400_and_terse_body() {
        let e = SapebookError::invalid_input("baseurl is empty");
        assert_eq!(e.kind(), ErrorKind::Validation);
        assert_eq!(e.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(e.public_message(), "Input Error");
        assert!(e.to_string().contains("baseurl is empty"));
    }

    #[test]
    fn converter_failed_display_includes_stderr() {
        let e = SapebookError::ConverterFailed {
            status: "exit status: 2".into(),
            stderr: "login required\n".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("exit status: 2"), "got: {msg}");
        assert!(msg.ends_with("login required"), "got: {msg}");
        assert_eq!(e.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn converter_failed_display_without_stderr() {
        let e = SapebookError::ConverterFailed {
            status: "exit status: 1".into(),
            stderr: "   ".into(),
        };
        assert_eq!(e.to_string(), "Converter exited with exit status: 1");
    }

    #[test]
    fn storage_and_subprocess_kinds() {
        let io = || std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        assert_eq!(
            SapebookError::WorkspaceCreateFailed { source: io() }.kind(),
            ErrorKind::Storage
        );
        assert_eq!(
            SapebookError::OutputMissing {
                path: PathBuf::from("/tmp/x/ebook.pdf")
            }
            .kind(),
            ErrorKind::Subprocess
        );
        let timeout = SapebookError::ConverterTimeout { secs: 30 };
        assert!(timeout.to_string().contains("30s"));
        assert_eq!(timeout.public_message(), timeout.to_string());
    }
}
