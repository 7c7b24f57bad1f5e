//! Service configuration.
//!
//! All runtime behaviour is controlled through [`ServiceConfig`], built via
//! its [`ServiceConfigBuilder`]. The binary maps CLI flags onto the builder;
//! embedders and tests set only the fields they care about and rely on the
//! defaults for the rest.

use crate::converter::Converter;
use crate::error::SapebookError;
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

/// Default name of the external converter binary, looked up on `PATH`.
pub const DEFAULT_CONVERTER_PROGRAM: &str = "sapebook2pdf";

/// Prefix of every per-request workspace directory.
pub const DEFAULT_WORKSPACE_PREFIX: &str = "sapebook2pdf-tmp-";

/// Configuration for an [`crate::EbookService`].
///
/// # Example
/// ```rust
/// use sapebook_web::ServiceConfig;
///
/// let config = ServiceConfig::builder()
///     .converter_program("/opt/sapebook2pdf/sapebook2pdf")
///     .converter_timeout_secs(600)
///     .build()
///     .unwrap();
/// assert_eq!(config.converter_timeout_secs, Some(600));
/// ```
#[derive(Clone)]
pub struct ServiceConfig {
    /// Address the HTTP server listens on. Default: `127.0.0.1:5000`.
    pub bind_addr: SocketAddr,

    /// Path or bare name of the converter executable. Default: `sapebook2pdf`.
    pub converter_program: PathBuf,

    /// Kill the converter after this many seconds. Default: `None` (wait forever).
    ///
    /// Scraping a long book can legitimately take many minutes, so there is no
    /// timeout unless one is asked for.
    pub converter_timeout_secs: Option<u64>,

    /// Maximum accepted request body size in bytes. Default: 10 MiB.
    pub max_upload_bytes: usize,

    /// Directory in which workspaces are created. Default: `None` (OS temp dir).
    pub workspace_root: Option<PathBuf>,

    /// Name prefix for workspace directories. Default: `sapebook2pdf-tmp-`.
    pub workspace_prefix: String,

    /// Expand a single `A-B` page range into `A,A+1,…,B` before handing it to
    /// the converter. Default: false (the value is forwarded verbatim).
    pub expand_page_ranges: bool,

    /// Pre-constructed converter. Takes precedence over `converter_program`.
    pub converter: Option<Arc<dyn Converter>>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 5000)),
            converter_program: PathBuf::from(DEFAULT_CONVERTER_PROGRAM),
            converter_timeout_secs: None,
            max_upload_bytes: 10 * 1024 * 1024,
            workspace_root: None,
            workspace_prefix: DEFAULT_WORKSPACE_PREFIX.to_string(),
            expand_page_ranges: false,
            converter: None,
        }
    }
}

impl fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("bind_addr", &self.bind_addr)
            .field("converter_program", &self.converter_program)
            .field("converter_timeout_secs", &self.converter_timeout_secs)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("workspace_root", &self.workspace_root)
            .field("workspace_prefix", &self.workspace_prefix)
            .field("expand_page_ranges", &self.expand_page_ranges)
            .field("converter", &self.converter.as_ref().map(|_| "<dyn Converter>"))
            .finish()
    }
}

impl ServiceConfig {
    /// Create a new builder for `ServiceConfig`.
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ServiceConfig`].
#[derive(Debug)]
pub struct ServiceConfigBuilder {
    config: ServiceConfig,
}

impl ServiceConfigBuilder {
    pub fn bind_addr(mut self, addr: SocketAddr) -> Self {
        self.config.bind_addr = addr;
        self
    }

    pub fn converter_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.config.converter_program = program.into();
        self
    }

    pub fn converter_timeout_secs(mut self, secs: u64) -> Self {
        self.config.converter_timeout_secs = Some(secs);
        self
    }

    pub fn max_upload_bytes(mut self, bytes: usize) -> Self {
        self.config.max_upload_bytes = bytes;
        self
    }

    pub fn workspace_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.workspace_root = Some(root.into());
        self
    }

    pub fn workspace_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.workspace_prefix = prefix.into();
        self
    }

    pub fn expand_page_ranges(mut self, v: bool) -> Self {
        self.config.expand_page_ranges = v;
        self
    }

    pub fn converter(mut self, converter: Arc<dyn Converter>) -> Self {
        self.config.converter = Some(converter);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ServiceConfig, SapebookError> {
        let c = &self.config;
        if c.max_upload_bytes == 0 {
            return Err(SapebookError::InvalidConfig(
                "max upload size must be ≥ 1 byte".into(),
            ));
        }
        if c.converter_timeout_secs == Some(0) {
            return Err(SapebookError::InvalidConfig(
                "converter timeout must be ≥ 1 second".into(),
            ));
        }
        if c.converter.is_none() && c.converter_program.as_os_str().is_empty() {
            return Err(SapebookError::InvalidConfig(
                "converter program must not be empty".into(),
            ));
        }
        if c.workspace_prefix.contains(['/', '\\']) {
            return Err(SapebookError::InvalidConfig(format!(
                "workspace prefix must not contain path separators, got '{}'",
                c.workspace_prefix
            )));
        }
        Ok(self.config)
    }
}
