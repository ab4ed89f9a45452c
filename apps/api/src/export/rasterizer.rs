use async_trait::async_trait;
use bytes::Bytes;

use crate::export::ExportError;
use crate::layout::PageGeometry;

/// Turns a print-shell HTML document into PDF bytes.
///
/// Carried by the export pipeline as `Arc<dyn Rasterizer>`.
#[async_trait]
pub trait Rasterizer: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Renders `html` onto pages of exactly `geometry`. Must not add margins
    /// of its own; the document already carries the page box.
    async fn rasterize(&self, html: &str, geometry: &PageGeometry) -> Result<Bytes, ExportError>;
}

/// Used when no rasterizer backend could be configured. Every export fails
/// with `ExportError::Unavailable`; previews keep working.
pub struct UnavailableRasterizer {
    reason: String,
}

impl UnavailableRasterizer {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl Rasterizer for UnavailableRasterizer {
    fn name(&self) -> &'static str {
        "unavailable"
    }

    async fn rasterize(&self, _html: &str, _geometry: &PageGeometry) -> Result<Bytes, ExportError> {
        Err(ExportError::Unavailable(self.reason.clone()))
    }
}

/// Rejects output that is not a PDF document.
pub fn validate_pdf(bytes: &[u8]) -> Result<(), ExportError> {
    if bytes.is_empty() {
        return Err(ExportError::InvalidOutput("empty output".to_string()));
    }
    if !bytes.starts_with(b"%PDF-") {
        return Err(ExportError::InvalidOutput("missing %PDF- header".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::PAGE_GEOMETRY;

    #[test]
    fn test_validate_pdf() {
        assert!(validate_pdf(b"%PDF-1.7\n...").is_ok());
        assert!(matches!(validate_pdf(b""), Err(ExportError::InvalidOutput(_))));
        assert!(matches!(
            validate_pdf(b"<html>oops</html>"),
            Err(ExportError::InvalidOutput(_))
        ));
    }

    #[tokio::test]
    async fn test_unavailable_rasterizer_reports_reason() {
        let rasterizer = UnavailableRasterizer::new("chrome not found");
        let err = rasterizer
            .rasterize("<html></html>", &PAGE_GEOMETRY)
            .await
            .unwrap_err();
        match err {
            ExportError::Unavailable(reason) => assert_eq!(reason, "chrome not found"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
