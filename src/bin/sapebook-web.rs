//! CLI binary for sapebook-web.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ServiceConfig` and runs the HTTP server until Ctrl-C.

use anyhow::{Context, Result};
use clap::Parser;
use sapebook_web::{serve, EbookService, ServiceConfig};
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const AFTER_HELP: &str = r#"EXAMPLES:
  # Serve on the default address (127.0.0.1:5000)
  sapebook-web

  # Listen on all interfaces, converter outside PATH
  sapebook-web --bind 0.0.0.0:8080 --converter /opt/sapebook2pdf/sapebook2pdf

  # Give up on conversions that take longer than 20 minutes
  sapebook-web --timeout 1200

  # Request a book from the command line
  curl -F cookies=@cookies.txt -F baseurl=https://example.com -F pages=120 \
    http://127.0.0.1:5000/ --output ebook.pdf

ENVIRONMENT VARIABLES:
  SAPEBOOK_WEB_BIND            Listen address
  SAPEBOOK2PDF_BIN             Converter executable
  SAPEBOOK_WEB_TIMEOUT         Converter timeout in seconds
  SAPEBOOK_WEB_MAX_UPLOAD      Maximum request body in bytes
  SAPEBOOK_WEB_WORKSPACE_ROOT  Directory for per-request workspaces
  SAPEBOOK_WEB_EXPAND_RANGES   Expand "A-B" page ranges into lists
  RUST_LOG                     Log filter, overrides --verbose
"#;

/// Serve the sapebook2pdf upload form over HTTP.
#[derive(Parser, Debug)]
#[command(
    name = "sapebook-web",
    version,
    about = "Serve the sapebook2pdf upload form over HTTP",
    long_about = "Accepts a session-cookie file, a base URL and a page selection, runs \
sapebook2pdf in a private temporary directory and returns the resulting PDF as a download.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Address to listen on.
    #[arg(short, long, env = "SAPEBOOK_WEB_BIND", default_value = "127.0.0.1:5000")]
    bind: SocketAddr,

    /// Converter executable (bare name is looked up on PATH).
    #[arg(long, env = "SAPEBOOK2PDF_BIN", default_value = "sapebook2pdf")]
    converter: PathBuf,

    /// Kill the converter after this many seconds (default: no limit).
    #[arg(long, env = "SAPEBOOK_WEB_TIMEOUT",
          value_parser = clap::value_parser!(u64).range(1..))]
    timeout: Option<u64>,

    /// Maximum request body size in bytes.
    #[arg(long, env = "SAPEBOOK_WEB_MAX_UPLOAD", default_value_t = 10 * 1024 * 1024)]
    max_upload: usize,

    /// Create per-request workspaces here instead of the OS temp dir.
    #[arg(long, env = "SAPEBOOK_WEB_WORKSPACE_ROOT")]
    workspace_root: Option<PathBuf>,

    /// Expand a single "A-B" page range into "A,A+1,…,B" before calling the converter.
    #[arg(long, env = "SAPEBOOK_WEB_EXPAND_RANGES")]
    expand_page_ranges: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "SAPEBOOK_WEB_VERBOSE")]
    verbose: bool,
}

impl Cli {
    fn to_config(&self) -> Result<ServiceConfig> {
        let mut builder = ServiceConfig::builder()
            .bind_addr(self.bind)
            .converter_program(&self.converter)
            .max_upload_bytes(self.max_upload)
            .expand_page_ranges(self.expand_page_ranges);
        if let Some(secs) = self.timeout {
            builder = builder.converter_timeout_secs(secs);
        }
        if let Some(ref root) = self.workspace_root {
            builder = builder.workspace_root(root);
        }
        builder.build().context("invalid command-line configuration")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let config = cli.to_config()?;
    if let Some(ref root) = config.workspace_root {
        if !root.is_dir() {
            warn!(
                "Workspace root {} does not exist; every conversion will fail",
                root.display()
            );
        }
    }
    info!("Using converter {}", config.converter_program.display());

    let bind = config.bind_addr;
    serve(EbookService::new(config), shutdown_signal())
        .await
        .with_context(|| format!("server on {bind} failed"))?;

    info!("Shut down cleanly");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Ctrl-C received, finishing in-flight requests");
}
