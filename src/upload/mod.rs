//! File upload endpoint: multipart in, UTF-8 text out.
//!
//! # Data Flow
//! ```text
//! POST /load_file (multipart/form-data)
//!     → collect(): gather parts named `source_file`
//!     → select(): presence, uniqueness and size checks
//!     → transcode.rs: re-encode to UTF-8
//! ```
//!
//! Every failure maps to one fixed message; see [`UploadError`].

pub mod transcode;

use axum::body::Bytes;
use axum::extract::multipart::{Multipart, MultipartError};
use axum::http::StatusCode;

pub use transcode::{detect, to_utf8, SourceEncoding};

/// Upload validation failures. The Display text is the response body.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UploadError {
    #[error("Invalid parameters.")]
    InvalidParameters,
    #[error("No file sent.")]
    NoFile,
    #[error("Exceeded filesize limit.")]
    TooLarge,
    #[error("Unknown errors.")]
    Unknown,
}

impl UploadError {
    /// Status used when legacy statuses are off.
    pub fn status(&self) -> StatusCode {
        match self {
            UploadError::TooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            UploadError::Unknown => StatusCode::INTERNAL_SERVER_ERROR,
            UploadError::InvalidParameters | UploadError::NoFile => StatusCode::BAD_REQUEST,
        }
    }

    /// Metrics label.
    pub fn label(&self) -> &'static str {
        match self {
            UploadError::InvalidParameters => "invalid",
            UploadError::NoFile => "no_file",
            UploadError::TooLarge => "too_large",
            UploadError::Unknown => "unknown",
        }
    }
}

/// One multipart part carrying the file field.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: Option<String>,
    pub data: Bytes,
}

impl UploadedFile {
    /// An empty file input submits a part with no file name and no content.
    fn is_blank(&self) -> bool {
        self.file_name.as_deref().unwrap_or("").is_empty() && self.data.is_empty()
    }
}

/// Validate the parts found under the file field and return the content.
pub fn select(mut files: Vec<UploadedFile>, max_bytes: usize) -> Result<UploadedFile, UploadError> {
    if files.len() > 1 {
        return Err(UploadError::InvalidParameters);
    }
    let file = files.pop().ok_or(UploadError::NoFile)?;
    if file.is_blank() {
        return Err(UploadError::NoFile);
    }
    if file.data.len() > max_bytes {
        return Err(UploadError::TooLarge);
    }
    Ok(file)
}

/// Drain a multipart body, keeping the parts named `field`.
pub async fn collect(mut multipart: Multipart, field: &str) -> Result<Vec<UploadedFile>, UploadError> {
    let mut files = Vec::new();
    loop {
        let next = multipart.next_field().await.map_err(multipart_error)?;
        let Some(part) = next else { break };

        if part.name() != Some(field) {
            // Drain and ignore other form fields.
            part.bytes().await.map_err(multipart_error)?;
            continue;
        }
        let file_name = part.file_name().map(str::to_owned);
        let data = part.bytes().await.map_err(multipart_error)?;
        files.push(UploadedFile { file_name, data });
    }
    Ok(files)
}

fn multipart_error(e: MultipartError) -> UploadError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        UploadError::TooLarge
    } else {
        tracing::warn!(error = %e.body_text(), "Malformed upload");
        UploadError::Unknown
    }
}

/// Collect, validate and transcode an upload.
pub async fn process(multipart: Multipart, field: &str, max_bytes: usize) -> Result<String, UploadError> {
    let file = select(collect(multipart, field).await?, max_bytes)?;
    tracing::debug!(
        file_name = file.file_name.as_deref().unwrap_or(""),
        bytes = file.data.len(),
        encoding = ?detect(&file.data),
        "Upload accepted"
    );
    Ok(to_utf8(&file.data).into_owned())
}
