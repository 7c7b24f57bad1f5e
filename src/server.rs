//! HTTP surface: one route, two methods.
//!
//! | Method | Path | Response |
//! |--------|------|----------|
//! | `GET`  | `/`  | the upload form |
//! | `POST` | `/`  | `application/pdf` attachment `ebook.pdf`, or a plain-text error |
//!
//! # Example
//!
//! ```bash
//! curl -F cookies=@cookies.txt -F baseurl=https://example.com -F pages=120 \
//!   http://127.0.0.1:5000/ --output ebook.pdf
//! ```

use crate::error::SapebookError;
use crate::form::INDEX_HTML;
use crate::service::{EbookService, UploadForm};
use axum::extract::multipart::Field;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use std::future::Future;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Attachment name of every successful download.
pub const DOWNLOAD_FILE_NAME: &str = "ebook.pdf";

/// Build the application router around a shared service.
pub fn router(service: EbookService) -> Router {
    let limit = service.config().max_upload_bytes;
    Router::new()
        .route("/", get(index).post(convert))
        .with_state(Arc::new(service))
        .layer(DefaultBodyLimit::max(limit))
        .layer(TraceLayer::new_for_http())
}

/// Bind the configured address and serve until `shutdown` resolves.
pub async fn serve<F>(service: EbookService, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(service.config().bind_addr).await?;
    info!("Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(service))
        .with_graceful_shutdown(shutdown)
        .await
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn convert(
    State(service): State<Arc<EbookService>>,
    multipart: Multipart,
) -> Result<Response, SapebookError> {
    let form = read_form(multipart).await?;
    let pdf = service.convert(form).await?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{DOWNLOAD_FILE_NAME}\""),
            ),
        ],
        pdf,
    )
        .into_response())
}

/// Collect the three form fields; unknown fields are skipped.
async fn read_form(mut multipart: Multipart) -> Result<UploadForm, SapebookError> {
    let mut file_name = None;
    let mut cookies = None;
    let mut base_url = None;
    let mut pages = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| SapebookError::invalid_input(format!("malformed multipart body: {e}")))?
    {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("cookies") => {
                // A text part in place of a file counts as "no file selected".
                file_name = Some(field.file_name().unwrap_or_default().to_string());
                cookies = Some(field_bytes(field).await?);
            }
            Some("baseurl") => base_url = Some(field_text(field).await?),
            Some("pages") => pages = Some(field_text(field).await?),
            _ => {}
        }
    }

    let missing = |name: &str| SapebookError::invalid_input(format!("missing form field '{name}'"));
    Ok(UploadForm {
        file_name: file_name.ok_or_else(|| missing("cookies"))?,
        cookies: cookies.ok_or_else(|| missing("cookies"))?,
        base_url: base_url.ok_or_else(|| missing("baseurl"))?,
        pages: pages.ok_or_else(|| missing("pages"))?,
    })
}

async fn field_bytes(field: Field<'_>) -> Result<Vec<u8>, SapebookError> {
    field
        .bytes()
        .await
        .map(|b| b.to_vec())
        .map_err(|e| SapebookError::invalid_input(format!("failed to read upload: {e}")))
}

async fn field_text(field: Field<'_>) -> Result<String, SapebookError> {
    field
        .text()
        .await
        .map_err(|e| SapebookError::invalid_input(format!("failed to read form field: {e}")))
}

impl IntoResponse for SapebookError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            warn!("Request failed: {}", self);
        } else {
            info!("Rejected request: {}", self);
        }
        (status, self.public_message()).into_response()
    }
}
