//! # sapebook-web
//!
//! A small web front-end for the `sapebook2pdf` converter.
//!
//! The converter does the real work (logging in with the session cookies,
//! fetching the pages, assembling the PDF). This crate only receives the
//! upload, stages it in a private temporary directory, runs the converter
//! and hands the PDF back to the browser as a download.
//!
//! ## Request flow
//!
//! ```text
//! POST /  (cookies file, baseurl, pages)
//!  │
//!  ├─ 1. Validate   empty file name or base URL → 400 "Input Error"
//!  ├─ 2. Workspace  fresh temp dir, deleted on every exit path
//!  ├─ 3. Stage      cookie file saved under its own base name
//!  ├─ 4. Convert    sapebook2pdf --cookies= --baseurl= --pages= --pdfout=
//!  └─ 5. Respond    ebook.pdf as an attachment, or 500 with the failure
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sapebook_web::{serve, EbookService, ServiceConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServiceConfig::builder()
//!         .converter_program("/usr/local/bin/sapebook2pdf")
//!         .build()?;
//!     let service = EbookService::new(config);
//!     serve(service, async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `sapebook-web` binary (clap + anyhow + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod converter;
pub mod error;
pub mod form;
pub mod pages;
pub mod server;
pub mod service;
pub mod workspace;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ServiceConfig, ServiceConfigBuilder};
pub use converter::{ConversionJob, Converter, ExternalConverter};
pub use error::{ErrorKind, SapebookError};
pub use server::{router, serve};
pub use service::{EbookService, UploadForm};
pub use workspace::Workspace;
