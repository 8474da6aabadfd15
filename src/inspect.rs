use lopdf::Document as LoDocument;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InspectErrorCode {
    ParseFailed,
    EncryptedUnsupported,
    NoPages,
    PageCountMismatch,
    IoError,
}

impl InspectErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            InspectErrorCode::ParseFailed => "PDF_PARSE_FAILED",
            InspectErrorCode::EncryptedUnsupported => "PDF_ENCRYPTED_UNSUPPORTED",
            InspectErrorCode::NoPages => "PDF_EMPTY_OR_NO_PAGES",
            InspectErrorCode::PageCountMismatch => "PDF_PAGE_COUNT_MISMATCH",
            InspectErrorCode::IoError => "PDF_IO_ERROR",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InspectError {
    pub code: InspectErrorCode,
    pub message: String,
}

impl std::fmt::Display for InspectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for InspectError {}

/// What a PDF reader sees in a produced file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfReport {
    pub pdf_version: String,
    pub page_count: usize,
    pub encrypted: bool,
    pub file_size_bytes: usize,
    pub lang: Option<String>,
    pub has_file_id: bool,
}

pub fn inspect_pdf_bytes(bytes: &[u8]) -> Result<PdfReport, InspectError> {
    let pdf = LoDocument::load_mem(bytes).map_err(|err| InspectError {
        code: InspectErrorCode::ParseFailed,
        message: err.to_string(),
    })?;
    let lang = pdf
        .catalog()
        .ok()
        .and_then(|catalog| catalog.get(b"Lang").ok())
        .and_then(|lang| lang.as_str().ok())
        .map(|lang| String::from_utf8_lossy(lang).into_owned());

    Ok(PdfReport {
        pdf_version: pdf.version.clone(),
        page_count: pdf.get_pages().len(),
        encrypted: pdf.is_encrypted(),
        file_size_bytes: bytes.len(),
        lang,
        has_file_id: pdf.trailer.get(b"ID").is_ok(),
    })
}

pub fn inspect_pdf_path(path: &Path) -> Result<PdfReport, InspectError> {
    let data = std::fs::read(path).map_err(|err| InspectError {
        code: InspectErrorCode::IoError,
        message: err.to_string(),
    })?;
    inspect_pdf_bytes(&data)
}

/// Checks a produced file against the page count the renderer reported.
pub fn verify_report(report: &PdfReport, expected_pages: usize) -> Result<(), InspectError> {
    if report.encrypted {
        return Err(InspectError {
            code: InspectErrorCode::EncryptedUnsupported,
            message: "encrypted output is not expected".to_string(),
        });
    }
    if report.page_count == 0 {
        return Err(InspectError {
            code: InspectErrorCode::NoPages,
            message: "pdf has no pages".to_string(),
        });
    }
    if report.page_count != expected_pages {
        return Err(InspectError {
            code: InspectErrorCode::PageCountMismatch,
            message: format!(
                "pdf has {} pages, renderer reported {expected_pages}",
                report.page_count
            ),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::AssetBundle;
    use crate::canvas::Canvas;
    use crate::font::FontRegistry;
    use crate::pdf::{PdfOptions, document_to_pdf};
    use crate::types::{Pt, Size};

    fn three_page_pdf() -> Vec<u8> {
        let mut canvas = Canvas::new(Size::letter());
        for page in 0..3 {
            if page > 0 {
                canvas.show_page();
            }
            canvas.draw_string(Pt::from_i32(72), Pt::from_i32(72), format!("page {page}"));
        }
        let options = PdfOptions {
            lang: Some("en".to_string()),
            file_id: Some("c0ffee".repeat(6)),
            ..PdfOptions::default()
        };
        document_to_pdf(
            &canvas.finish(),
            &FontRegistry::new(),
            &AssetBundle::default(),
            &options,
        )
        .unwrap()
    }

    #[test]
    fn reads_version_pages_and_catalog_language() {
        let bytes = three_page_pdf();
        let report = inspect_pdf_bytes(&bytes).expect("inspect");
        assert_eq!(report.page_count, 3);
        assert_eq!(report.pdf_version, "1.7");
        assert_eq!(report.lang.as_deref(), Some("en"));
        assert!(report.has_file_id);
        assert!(!report.encrypted);
        assert_eq!(report.file_size_bytes, bytes.len());
        assert!(verify_report(&report, 3).is_ok());
        let err = verify_report(&report, 2).unwrap_err();
        assert_eq!(err.code, InspectErrorCode::PageCountMismatch);
    }

    #[test]
    fn malformed_data_and_missing_files_are_reported() {
        let err = inspect_pdf_bytes(b"not a pdf").unwrap_err();
        assert_eq!(err.code, InspectErrorCode::ParseFailed);
        let missing = std::env::temp_dir().join(format!(
            "quotedoc_inspect_missing_{}.pdf",
            std::process::id()
        ));
        let err = inspect_pdf_path(&missing).unwrap_err();
        assert_eq!(err.code, InspectErrorCode::IoError);
        assert!(err.to_string().starts_with("PDF_IO_ERROR"));
    }

    #[test]
    fn empty_reports_are_rejected() {
        let report = PdfReport {
            pdf_version: "1.7".to_string(),
            page_count: 0,
            encrypted: false,
            file_size_bytes: 0,
            lang: None,
            has_file_id: false,
        };
        assert_eq!(
            verify_report(&report, 0).unwrap_err().code,
            InspectErrorCode::NoPages
        );
    }
}
