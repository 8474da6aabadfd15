use crate::error::Result;
use crate::format::short_reference;
use crate::i18n::Language;
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_FILE_PREFIX: &str = "Quote";
const CUSTOMER_PLACEHOLDER: &str = "Customer";
const PREVIEW_FILE_NAME: &str = "preview.pdf";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmissionMode {
    /// Shown in place (`inline`).
    #[default]
    Preview,
    /// Saved by the user agent (`attachment`).
    Download,
}

impl EmissionMode {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "preview" | "inline" | "view" => Some(EmissionMode::Preview),
            "download" | "attachment" => Some(EmissionMode::Download),
            _ => None,
        }
    }

    pub fn disposition(&self) -> &'static str {
        match self {
            EmissionMode::Preview => "inline",
            EmissionMode::Download => "attachment",
        }
    }
}

/// `{prefix}_{REF8}_{Customer}_{YYYY-MM-DD}[_ar].pdf`.
///
/// The customer part keeps ASCII letters and digits only; when nothing is
/// left it becomes `Customer`. Arabic documents get an `_ar` suffix.
pub fn quote_filename(
    prefix: &str,
    quote_id: &str,
    customer_name: Option<&str>,
    date: DateTime<Utc>,
    lang: Language,
) -> String {
    let customer: String = customer_name
        .unwrap_or_default()
        .chars()
        .filter(|ch| ch.is_ascii_alphanumeric())
        .collect();
    let customer = if customer.is_empty() {
        CUSTOMER_PLACEHOLDER
    } else {
        customer.as_str()
    };
    let suffix = match lang {
        Language::Ar => "_ar",
        Language::En => "",
    };
    format!(
        "{}_{}_{}_{}{}.pdf",
        prefix,
        short_reference(quote_id),
        customer,
        date.format("%Y-%m-%d"),
        suffix
    )
}

/// One rendered quote document.
#[derive(Debug, Clone, PartialEq)]
pub struct PdfArtifact {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub mode: EmissionMode,
    pub page_count: usize,
    /// SHA-256 of the quote payload the document was built from.
    pub fingerprint: String,
}

impl PdfArtifact {
    pub fn content_type(&self) -> &'static str {
        "application/pdf"
    }

    pub fn content_disposition(&self) -> String {
        format!(
            "{}; filename=\"{}\"",
            self.mode.disposition(),
            self.filename.replace('"', "")
        )
    }
}

/// Where a finished artifact goes.
pub trait OutputSink {
    /// Delivers `artifact`; returns the location it was written to, if any.
    fn deliver(&mut self, artifact: &PdfArtifact) -> Result<Option<PathBuf>>;
}

/// Keeps artifacts in memory, for callers that stream the bytes themselves.
#[derive(Debug, Default)]
pub struct BufferSink {
    last: Option<PdfArtifact>,
    delivered: usize,
}

impl BufferSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last(&self) -> Option<&PdfArtifact> {
        self.last.as_ref()
    }

    pub fn take(&mut self) -> Option<PdfArtifact> {
        self.last.take()
    }

    pub fn delivered(&self) -> usize {
        self.delivered
    }
}

impl OutputSink for BufferSink {
    fn deliver(&mut self, artifact: &PdfArtifact) -> Result<Option<PathBuf>> {
        self.last = Some(artifact.clone());
        self.delivered += 1;
        Ok(None)
    }
}

/// Writes artifacts to disk. Downloads land in `root` under their generated
/// file name; previews overwrite one stable file in the preview directory.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    root: PathBuf,
    preview_dir: PathBuf,
}

impl DirectorySink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let preview_dir = root.join("preview");
        Self { root, preview_dir }
    }

    pub fn with_preview_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.preview_dir = dir.into();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn preview_path(&self) -> PathBuf {
        self.preview_dir.join(PREVIEW_FILE_NAME)
    }
}

impl OutputSink for DirectorySink {
    fn deliver(&mut self, artifact: &PdfArtifact) -> Result<Option<PathBuf>> {
        let path = match artifact.mode {
            EmissionMode::Preview => {
                fs::create_dir_all(&self.preview_dir)?;
                self.preview_path()
            }
            EmissionMode::Download => {
                fs::create_dir_all(&self.root)?;
                self.root.join(&artifact.filename)
            }
        };
        fs::write(&path, &artifact.bytes)?;
        tracing::info!(
            path = %path.display(),
            bytes = artifact.bytes.len(),
            mode = artifact.mode.disposition(),
            "quote document written"
        );
        Ok(Some(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn date() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 4, 9, 15, 0).unwrap()
    }

    fn artifact(mode: EmissionMode) -> PdfArtifact {
        PdfArtifact {
            bytes: b"%PDF-1.7 test".to_vec(),
            filename: "Quote_3F2A9B1C_Acme_2026-03-04.pdf".to_string(),
            mode,
            page_count: 1,
            fingerprint: "00".repeat(32),
        }
    }

    fn temp_root(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("quotedoc_emit_{tag}_{}", std::process::id()))
    }

    #[test]
    fn filenames_follow_reference_customer_date_pattern() {
        let id = "3f2a9b1c-77aa-4d0e";
        assert_eq!(
            quote_filename("Quote", id, Some("Acme Steel & Co."), date(), Language::En),
            "Quote_3F2A9B1C_AcmeSteelCo_2026-03-04.pdf"
        );
        assert_eq!(
            quote_filename("Quote", id, Some("شركة الحديد"), date(), Language::Ar),
            "Quote_3F2A9B1C_Customer_2026-03-04_ar.pdf"
        );
        assert_eq!(
            quote_filename("Offer", "ab", None, date(), Language::En),
            "Offer_AB_Customer_2026-03-04.pdf"
        );
    }

    #[test]
    fn disposition_depends_on_mode() {
        assert_eq!(
            artifact(EmissionMode::Preview).content_disposition(),
            "inline; filename=\"Quote_3F2A9B1C_Acme_2026-03-04.pdf\""
        );
        assert!(
            artifact(EmissionMode::Download)
                .content_disposition()
                .starts_with("attachment;")
        );
        assert_eq!(EmissionMode::parse("Download"), Some(EmissionMode::Download));
        assert_eq!(EmissionMode::parse("inline"), Some(EmissionMode::Preview));
        assert_eq!(EmissionMode::parse("print"), None);
    }

    #[test]
    fn buffer_sink_keeps_the_last_artifact() {
        let mut sink = BufferSink::new();
        assert_eq!(sink.deliver(&artifact(EmissionMode::Preview)).unwrap(), None);
        sink.deliver(&artifact(EmissionMode::Download)).unwrap();
        assert_eq!(sink.delivered(), 2);
        assert_eq!(sink.last().map(|a| a.mode), Some(EmissionMode::Download));
        assert!(sink.take().is_some());
        assert!(sink.last().is_none());
    }

    #[test]
    fn directory_sink_separates_preview_and_download() {
        let root = temp_root("dir");
        let mut sink = DirectorySink::new(&root);
        let preview = sink.deliver(&artifact(EmissionMode::Preview)).unwrap().unwrap();
        assert_eq!(preview, root.join("preview").join("preview.pdf"));
        let again = sink.deliver(&artifact(EmissionMode::Preview)).unwrap().unwrap();
        assert_eq!(preview, again);

        let download = sink.deliver(&artifact(EmissionMode::Download)).unwrap().unwrap();
        assert_eq!(download, root.join("Quote_3F2A9B1C_Acme_2026-03-04.pdf"));
        assert_eq!(std::fs::read(&download).unwrap(), b"%PDF-1.7 test");
        let _ = std::fs::remove_dir_all(&root);
    }
}
