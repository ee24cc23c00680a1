use std::sync::Arc;

use async_trait::async_trait;
use pdfium_render::prelude::*;
use thiserror::Error;
use tokio::task;

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("pdfium library unavailable: {0}")]
    LibraryUnavailable(String),
    #[error("failed to parse pdf: {0}")]
    Parse(String),
    #[error("extraction task aborted: {0}")]
    Aborted(String),
}

/// Pulls plain text out of an uploaded file. Callers treat failures as
/// non-fatal and store the document without extracted content.
#[async_trait]
pub trait TextExtractor: Send + Sync + 'static {
    async fn extract(&self, bytes: Arc<Vec<u8>>) -> Result<String, ExtractionError>;
}

pub struct PdfiumTextExtractor {
    library_dir: Option<String>,
}

impl PdfiumTextExtractor {
    pub fn new(library_dir: Option<String>) -> Self {
        Self { library_dir }
    }
}

fn bind_pdfium(library_dir: Option<&str>) -> Result<Pdfium, ExtractionError> {
    let bindings = match library_dir {
        Some(dir) => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir)),
        None => Pdfium::bind_to_system_library(),
    }
    .map_err(|err| ExtractionError::LibraryUnavailable(err.to_string()))?;
    Ok(Pdfium::new(bindings))
}

#[async_trait]
impl TextExtractor for PdfiumTextExtractor {
    async fn extract(&self, bytes: Arc<Vec<u8>>) -> Result<String, ExtractionError> {
        let library_dir = self.library_dir.clone();
        task::spawn_blocking(move || {
            let pdfium = bind_pdfium(library_dir.as_deref())?;
            extract_pdf_text(&pdfium, &bytes)
        })
        .await
        .map_err(|err| ExtractionError::Aborted(err.to_string()))?
    }
}

fn extract_pdf_text(pdfium: &Pdfium, bytes: &[u8]) -> Result<String, ExtractionError> {
    let document = pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(|err| ExtractionError::Parse(err.to_string()))?;

    let mut combined = String::new();
    for page in document.pages().iter() {
        // Pages without a text layer contribute nothing.
        if let Ok(text) = page.text() {
            combined.push_str(&text.all());
            combined.push('\n');
        }
    }

    Ok(combined.trim().to_string())
}

/// True when the upload is a PDF by declared content type or extension.
pub fn is_pdf(content_type: Option<&str>, filename: &str) -> bool {
    if content_type.is_some_and(|value| value.eq_ignore_ascii_case("application/pdf")) {
        return true;
    }

    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}
