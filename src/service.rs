//! The upload-and-convert operation, independent of HTTP.
//!
//! [`EbookService`] is built once at startup and shared by every request.
//! It holds no per-request state: each call to [`EbookService::convert`]
//! creates its own [`Workspace`], so concurrent conversions never share files.

use crate::config::ServiceConfig;
use crate::converter::{ConversionJob, Converter, ExternalConverter};
use crate::error::SapebookError;
use crate::pages::normalize_pages;
use crate::workspace::{upload_file_name, Workspace};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// One submitted form.
#[derive(Debug, Clone, Default)]
pub struct UploadForm {
    /// File name the browser sent for the cookie upload.
    pub file_name: String,
    /// Raw bytes of the cookie file.
    pub cookies: Vec<u8>,
    pub base_url: String,
    /// Page selection, opaque to this service.
    pub pages: String,
}

impl UploadForm {
    /// Reject forms the converter cannot possibly use.
    ///
    /// Only the file name and base URL are checked; the page value is
    /// forwarded unvalidated.
    pub fn validate(&self) -> Result<(), SapebookError> {
        if self.file_name.is_empty() {
            return Err(SapebookError::invalid_input("no cookie file selected"));
        }
        if self.base_url.is_empty() {
            return Err(SapebookError::invalid_input("baseurl is empty"));
        }
        upload_file_name(&self.file_name)?;
        Ok(())
    }
}

/// Shared handler state: configuration plus the converter to call.
#[derive(Clone)]
pub struct EbookService {
    config: ServiceConfig,
    converter: Arc<dyn Converter>,
}

impl std::fmt::Debug for EbookService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EbookService")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl EbookService {
    /// Build the service, falling back to the external binary when no
    /// converter was injected.
    pub fn new(config: ServiceConfig) -> Self {
        let converter = resolve_converter(&config);
        Self { config, converter }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Run one conversion and return the PDF bytes.
    ///
    /// The workspace is gone by the time this returns, on success and on
    /// every error path. Only a cancelled request falls back to removing it
    /// inline on drop.
    pub async fn convert(&self, form: UploadForm) -> Result<Vec<u8>, SapebookError> {
        form.validate()?;
        let start = Instant::now();
        info!("Starting conversion of {}", form.base_url);

        let workspace = Workspace::create(
            self.config.workspace_root.as_deref(),
            &self.config.workspace_prefix,
        )?;
        let result = self.convert_in(&workspace, form).await;
        workspace.close().await;

        if let Ok(ref pdf) = result {
            info!(
                "Converted {} bytes in {}ms",
                pdf.len(),
                start.elapsed().as_millis()
            );
        }
        result
    }

    async fn convert_in(
        &self,
        workspace: &Workspace,
        form: UploadForm,
    ) -> Result<Vec<u8>, SapebookError> {
        let cookies = workspace.save_upload(&form.file_name, &form.cookies).await?;

        let job = ConversionJob {
            cookies,
            base_url: form.base_url,
            pages: normalize_pages(&form.pages, self.config.expand_page_ranges),
            pdf_out: workspace.pdf_out(),
            workdir: workspace.path().to_path_buf(),
        };
        debug!("Conversion job: {:?}", job);

        self.converter.run(&job).await?;

        match tokio::fs::read(&job.pdf_out).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(SapebookError::OutputMissing { path: job.pdf_out })
            }
            Err(source) => Err(SapebookError::OutputReadFailed {
                path: job.pdf_out,
                source,
            }),
        }
    }
}

fn resolve_converter(config: &ServiceConfig) -> Arc<dyn Converter> {
    if let Some(ref converter) = config.converter {
        return Arc::clone(converter);
    }
    Arc::new(ExternalConverter::from_config(config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Writes a fixed PDF and remembers every job it saw.
    #[derive(Default)]
    struct FakeConverter {
        jobs: Mutex<Vec<ConversionJob>>,
        write_output: bool,
    }

    #[async_trait]
    impl Converter for FakeConverter {
        async fn run(&self, job: &ConversionJob) -> Result<(), SapebookError> {
            self.jobs.lock().unwrap().push(job.clone());
            assert_eq!(std::fs::read(&job.cookies).unwrap(), b"cookie-data");
            if self.write_output {
                std::fs::write(&job.pdf_out, b"%PDF-1.4 fake").unwrap();
            }
            Ok(())
        }
    }

    fn form() -> UploadForm {
        UploadForm {
            file_name: "cookies.txt".into(),
            cookies: b"cookie-data".to_vec(),
            base_url: "https://example.com".into(),
            pages: "1-3".into(),
        }
    }

    fn service(fake: Arc<FakeConverter>, root: &std::path::Path, expand: bool) -> EbookService {
        let config = ServiceConfig::builder()
            .workspace_root(root)
            .expand_page_ranges(expand)
            .converter(fake)
            .build()
            .unwrap();
        EbookService::new(config)
    }

    #[test]
    fn validate_rejects_empty_name_and_url() {
        let mut f = form();
        f.file_name.clear();
        assert!(f.validate().is_err());

        let mut f = form();
        f.base_url.clear();
        assert!(f.validate().is_err());

        let mut f = form();
        f.file_name = "ebook.pdf".into();
        assert!(f.validate().is_err());

        let mut f = form();
        f.pages.clear();
        assert!(f.validate().is_ok());
    }

    #[tokio::test]
    async fn convert_returns_pdf_and_cleans_up() {
        let root = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeConverter {
            write_output: true,
            ..Default::default()
        });
        let svc = service(fake.clone(), root.path(), false);

        let pdf = svc.convert(form()).await.unwrap();
        assert_eq!(pdf, b"%PDF-1.4 fake");

        let jobs = fake.jobs.lock().unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].pages, "1-3");
        assert_eq!(jobs[0].cookies, jobs[0].workdir.join("cookies.txt"));
        assert_eq!(jobs[0].pdf_out, jobs[0].workdir.join("ebook.pdf"));
        assert!(!jobs[0].workdir.exists());
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn convert_expands_ranges_when_enabled() {
        let root = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeConverter {
            write_output: true,
            ..Default::default()
        });
        service(fake.clone(), root.path(), true)
            .convert(form())
            .await
            .unwrap();
        assert_eq!(fake.jobs.lock().unwrap()[0].pages, "1,2,3");
    }

    #[tokio::test]
    async fn invalid_form_never_reaches_converter() {
        let root = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeConverter::default());
        let mut f = form();
        f.base_url.clear();
        let err = service(fake.clone(), root.path(), false)
            .convert(f)
            .await
            .unwrap_err();
        assert!(matches!(err, SapebookError::InvalidInput { .. }));
        assert!(fake.jobs.lock().unwrap().is_empty());
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn missing_output_is_reported_and_cleaned_up() {
        let root = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeConverter::default());
        let err = service(fake.clone(), root.path(), false)
            .convert(form())
            .await
            .unwrap_err();
        assert!(matches!(err, SapebookError::OutputMissing { .. }), "got: {err}");
        assert!(!fake.jobs.lock().unwrap()[0].workdir.exists());
    }
}
