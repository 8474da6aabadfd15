mod assets;
mod canvas;
mod config;
mod debug;
mod emit;
mod endpoint;
mod error;
mod font;
mod format;
mod i18n;
mod inspect;
mod layout;
mod metrics;
mod paginate;
mod pdf;
mod source;
mod spec_format;
mod style;
mod text;
mod types;

pub use assets::{Asset, AssetBundle, AssetKind, parse_data_uri};
pub use canvas::{Canvas, Command, Document, Page};
pub use config::{
    DEFAULT_CONFIG, FontConfig, MarginConfig, OutputConfig, PageConfig, PaginationConfig,
    RenderConfig,
};
pub use debug::DebugLogger;
pub use emit::{
    BufferSink, DEFAULT_FILE_PREFIX, DirectorySink, EmissionMode, OutputSink, PdfArtifact,
    quote_filename,
};
pub use endpoint::{EndpointResponse, generate, status_for};
pub use error::{QuoteDocError, Result};
pub use font::{FontRegistry, HELVETICA, HELVETICA_BOLD};
pub use format::{Currency, format_currency, format_date, format_number, truncate_chars};
pub use i18n::{Direction, Labels, Language, labels_for, spec_label, status_label};
pub use inspect::{
    InspectError, InspectErrorCode, PdfReport, inspect_pdf_bytes, inspect_pdf_path,
    verify_report,
};
pub use layout::{Brand, LOGO_RESOURCE, LayoutContext};
pub use metrics::{DocumentMetrics, PageMetrics};
pub use paginate::{LastPageRule, PageCapacity, plan_pages};
pub use pdf::{PdfOptions, document_to_pdf, document_to_pdf_with_metrics};
pub use quotedoc_contract::{
    CONTRACT_ID, CONTRACT_VERSION, ContractError, Product, ProductSpec, QuoteItem, QuoteRequest,
    QuoteResponse, QuoteStatus, SpecBag,
};
pub use source::{InMemoryQuoteSource, JsonDirSource, QuoteSource};
pub use spec_format::{SpecLine, SpecSummary, format_specifications};
pub use style::{Column, Palette, StyleSheet, styles_for};
pub use text::{FontRole, FontSet, TextRun};
pub use types::{Color, Edge, Margins, Pt, Rect, Size, TextAlign};

use chrono::{DateTime, Utc};
use format::short_reference;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;

const ARABIC_SAMPLE: &str = "عرض سعر";

/// Renders quote requests into bilingual PDF documents.
///
/// Immutable once built; the font registry is shared behind an `Arc`, so a
/// renderer can be cloned into worker threads.
#[derive(Clone)]
pub struct QuoteRenderer {
    page_size: Size,
    margins: Margins,
    capacity: PageCapacity,
    last_page_rule: LastPageRule,
    brand: Brand,
    currency: Currency,
    palette: Palette,
    file_prefix: String,
    registry: Arc<FontRegistry>,
    arabic_fonts: Option<(String, String)>,
    strict_arabic: bool,
    assets: AssetBundle,
    debug: Option<Arc<DebugLogger>>,
}

#[derive(Clone)]
enum LogoSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
    DataUri(String),
}

#[derive(Clone)]
pub struct QuoteRendererBuilder {
    page_size: Size,
    margins: Margins,
    capacity: PageCapacity,
    last_page_rule: LastPageRule,
    brand: Brand,
    currency: Currency,
    palette: Palette,
    file_prefix: String,
    font_dirs: Vec<PathBuf>,
    font_files: Vec<PathBuf>,
    font_bytes: Vec<(String, Vec<u8>)>,
    arabic_font: Option<String>,
    arabic_bold_font: Option<String>,
    strict_arabic: bool,
    logo: Option<LogoSource>,
    debug_path: Option<PathBuf>,
}

impl Default for QuoteRendererBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl QuoteRendererBuilder {
    pub fn new() -> Self {
        Self {
            page_size: Size::a4(),
            margins: Margins::all(36.0),
            capacity: PageCapacity::default(),
            last_page_rule: LastPageRule::default(),
            brand: Brand::default(),
            currency: Currency::default(),
            palette: Palette::default(),
            file_prefix: DEFAULT_FILE_PREFIX.to_string(),
            font_dirs: Vec::new(),
            font_files: Vec::new(),
            font_bytes: Vec::new(),
            arabic_font: None,
            arabic_bold_font: None,
            strict_arabic: false,
            logo: None,
            debug_path: None,
        }
    }

    /// Starts from a parsed configuration file.
    pub fn from_config(config: &RenderConfig) -> Result<Self> {
        config.validate()?;
        let mut builder = Self::new()
            .page_size(config.page_size()?)
            .margins(config.margins())
            .page_capacity(config.capacity())
            .last_page_rule(config.pagination.rule)
            .brand(config.brand.clone())
            .currency(config.currency.clone())
            .file_prefix(config.output.file_prefix.clone())
            .strict_arabic_font(config.fonts.strict_arabic);
        builder.font_dirs = config.fonts.dirs.clone();
        builder.font_files = config.fonts.files.clone();
        builder.arabic_font = config.fonts.arabic.clone();
        builder.arabic_bold_font = config.fonts.arabic_bold.clone();
        if let Some(logo) = &config.output.logo {
            builder = builder.logo_file(logo);
        }
        if let Some(path) = &config.output.debug_trace {
            builder = builder.debug_log(path);
        }
        Ok(builder)
    }

    pub fn page_size(mut self, size: Size) -> Self {
        self.page_size = size;
        self
    }

    pub fn margins(mut self, margins: Margins) -> Self {
        self.margins = margins;
        self
    }

    pub fn margin_all(mut self, value: f32) -> Self {
        self.margins = Margins::all(value);
        self
    }

    pub fn page_capacity(mut self, capacity: PageCapacity) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn capacities(mut self, first: usize, middle: usize, last: usize) -> Self {
        self.capacity = PageCapacity {
            first,
            middle,
            last,
        };
        self
    }

    pub fn last_page_rule(mut self, rule: LastPageRule) -> Self {
        self.last_page_rule = rule;
        self
    }

    pub fn brand(mut self, brand: Brand) -> Self {
        self.brand = brand;
        self
    }

    pub fn currency(mut self, currency: Currency) -> Self {
        self.currency = currency;
        self
    }

    pub fn palette(mut self, palette: Palette) -> Self {
        self.palette = palette;
        self
    }

    pub fn file_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.file_prefix = prefix.into();
        self
    }

    pub fn register_font_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.font_dirs.push(path.into());
        self
    }

    pub fn register_font_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.font_files.push(path.into());
        self
    }

    pub fn register_font_bytes(mut self, name: impl Into<String>, data: Vec<u8>) -> Self {
        self.font_bytes.push((name.into(), data));
        self
    }

    /// Registered font names for Arabic text. Unset roles are picked from the
    /// registered fonts that cover Arabic.
    pub fn arabic_fonts(mut self, regular: impl Into<String>, bold: Option<String>) -> Self {
        self.arabic_font = Some(regular.into());
        self.arabic_bold_font = bold;
        self
    }

    /// Fail Arabic renders instead of falling back to Helvetica when no
    /// Arabic-capable font is available.
    pub fn strict_arabic_font(mut self, strict: bool) -> Self {
        self.strict_arabic = strict;
        self
    }

    pub fn logo_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.logo = Some(LogoSource::Path(path.into()));
        self
    }

    pub fn logo_bytes(mut self, data: Vec<u8>) -> Self {
        self.logo = Some(LogoSource::Bytes(data));
        self
    }

    pub fn logo_data_uri(mut self, uri: impl Into<String>) -> Self {
        self.logo = Some(LogoSource::DataUri(uri.into()));
        self
    }

    pub fn debug_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.debug_path = Some(path.into());
        self
    }

    pub fn build(self) -> Result<QuoteRenderer> {
        self.capacity.validate()?;
        config::validate_margins(self.margins, self.page_size)?;
        if self.file_prefix.trim().is_empty() {
            return Err(QuoteDocError::InvalidConfiguration(
                "file prefix must not be empty".to_string(),
            ));
        }

        let mut registry = FontRegistry::new();
        for dir in &self.font_dirs {
            registry.register_dir(dir)?;
        }
        for file in &self.font_files {
            registry.register_file(file)?;
        }
        for (name, data) in self.font_bytes {
            registry.register_bytes(data, Some(name.as_str()))?;
        }
        let arabic_fonts =
            resolve_arabic_fonts(&registry, self.arabic_font, self.arabic_bold_font)?;

        let mut assets = AssetBundle::default();
        if let Some(logo) = self.logo {
            let asset = match logo {
                LogoSource::Path(path) => Asset::image_from_path(LOGO_RESOURCE, path)?,
                LogoSource::Bytes(data) => Asset::image(LOGO_RESOURCE, data)?,
                LogoSource::DataUri(uri) => Asset::image_from_data_uri(LOGO_RESOURCE, &uri)?,
            };
            assets.add(asset);
        }

        let debug = match self.debug_path {
            Some(path) => Some(Arc::new(DebugLogger::new(path)?)),
            None => None,
        };

        tracing::debug!(
            fonts = registry.font_names().count(),
            arabic = ?arabic_fonts.as_ref().map(|(regular, _)| regular),
            asset_bytes = assets.total_bytes(),
            "quote renderer built"
        );
        Ok(QuoteRenderer {
            page_size: self.page_size,
            margins: self.margins,
            capacity: self.capacity,
            last_page_rule: self.last_page_rule,
            brand: self.brand,
            currency: self.currency,
            palette: self.palette,
            file_prefix: self.file_prefix,
            registry: Arc::new(registry),
            arabic_fonts,
            strict_arabic: self.strict_arabic,
            assets,
            debug,
        })
    }
}

fn resolve_arabic_fonts(
    registry: &FontRegistry,
    regular: Option<String>,
    bold: Option<String>,
) -> Result<Option<(String, String)>> {
    for name in regular.iter().chain(bold.iter()) {
        if !registry.is_registered(name) {
            return Err(QuoteDocError::InvalidConfiguration(format!(
                "arabic font {name:?} is not registered"
            )));
        }
    }
    let covering: Vec<&str> = registry
        .font_names()
        .filter(|name| registry.supports_text(name, ARABIC_SAMPLE))
        .collect();
    let (bold_faces, regular_faces): (Vec<&str>, Vec<&str>) =
        covering.iter().copied().partition(|name| is_bold_face(name));
    let regular = regular.or_else(|| {
        regular_faces
            .first()
            .or_else(|| covering.first())
            .map(|name| name.to_string())
    });
    let Some(regular) = regular else {
        return Ok(None);
    };
    let bold = bold
        .or_else(|| bold_faces.first().map(|name| name.to_string()))
        .unwrap_or_else(|| regular.clone());
    Ok(Some((regular, bold)))
}

fn is_bold_face(name: &str) -> bool {
    name.to_ascii_lowercase().contains("bold")
}

impl QuoteRenderer {
    pub fn builder() -> QuoteRendererBuilder {
        QuoteRendererBuilder::new()
    }

    pub fn font_registry(&self) -> &FontRegistry {
        &self.registry
    }

    pub fn has_arabic_font(&self) -> bool {
        self.arabic_fonts.is_some()
    }

    fn font_set(&self, lang: Language) -> Result<FontSet> {
        let mut fonts = FontSet::base14();
        match &self.arabic_fonts {
            Some((regular, bold)) => {
                fonts.arabic = regular.clone();
                fonts.arabic_bold = bold.clone();
            }
            None if lang == Language::Ar => {
                if self.strict_arabic {
                    return Err(QuoteDocError::MissingFont { script: "arabic" });
                }
                tracing::warn!("no Arabic font registered; Arabic text falls back to Helvetica");
                if let Some(debug) = &self.debug {
                    debug.increment("font.arabic_fallback", 1);
                }
            }
            None => {}
        }
        Ok(fonts)
    }

    /// Lays out `quote` without serializing it.
    pub fn build_document(&self, quote: &QuoteRequest, lang: Language) -> Result<Document> {
        quote.validate()?;
        let fonts = self.font_set(lang)?;
        let styles = styles_for(lang.direction(), fonts).with_palette(self.palette);
        let ctx = LayoutContext {
            page_size: self.page_size,
            margins: self.margins,
            capacity: self.capacity,
            last_page_rule: self.last_page_rule,
            brand: &self.brand,
            currency: &self.currency,
            styles: &styles,
            registry: &self.registry,
            logo: self.assets.image(LOGO_RESOURCE).map(|_| LOGO_RESOURCE),
        };
        let document = layout::build_document(quote, lang, &ctx);

        if let Some(debug) = &self.debug {
            for (index, page) in document.pages.iter().enumerate() {
                debug.log(
                    "layout.page",
                    json!({
                        "quote": quote.id,
                        "lang": lang.code(),
                        "index": index,
                        "rows": page.meta_values("table.rows").next().unwrap_or("0"),
                        "first": page.has_meta("page.first", "true"),
                        "last": page.has_meta("page.last", "true"),
                    }),
                );
            }
            debug.increment("pages", document.pages.len() as u64);
        }
        Ok(document)
    }

    /// Builds and serializes one quote document. The filename carries the
    /// current date.
    pub fn render(
        &self,
        quote: &QuoteRequest,
        lang: Language,
        mode: EmissionMode,
    ) -> Result<PdfArtifact> {
        self.render_at(quote, lang, mode, Utc::now())
    }

    /// Like [`QuoteRenderer::render`], with the filename date taken from
    /// `now`. The PDF bytes themselves only depend on the quote.
    pub fn render_at(
        &self,
        quote: &QuoteRequest,
        lang: Language,
        mode: EmissionMode,
        now: DateTime<Utc>,
    ) -> Result<PdfArtifact> {
        tracing::info!(quote = %quote.id, lang = lang.code(), ?mode, "rendering quote");
        let document = self.build_document(quote, lang)?;
        let fingerprint = quotedoc_contract::fingerprint(quote);
        let options = PdfOptions {
            title: Some(format!(
                "{} {}",
                lang.labels().document_title,
                short_reference(&quote.id)
            )),
            lang: Some(lang.code().to_string()),
            file_id: Some(fingerprint.clone()),
            creation_date: quote.document_date(),
            ..PdfOptions::default()
        };
        let (bytes, metrics) =
            pdf::document_to_pdf_with_metrics(&document, &self.registry, &self.assets, &options)?;
        let filename = quote_filename(
            &self.file_prefix,
            &quote.id,
            quote.customer_name.as_deref(),
            now,
            lang,
        );
        if metrics.replaced_chars() > 0 {
            tracing::warn!(
                quote = %quote.id,
                replaced = metrics.replaced_chars(),
                "characters outside the base-14 encoding were replaced"
            );
        }
        if let Some(debug) = &self.debug {
            debug.log(
                "render.artifact",
                json!({
                    "quote": quote.id,
                    "lang": lang.code(),
                    "filename": filename,
                    "mode": mode.disposition(),
                    "metrics": metrics,
                }),
            );
            debug.emit_summary("render");
            debug.flush();
        }
        tracing::info!(
            quote = %quote.id,
            pages = metrics.page_count(),
            bytes = bytes.len(),
            "quote rendered"
        );
        Ok(PdfArtifact {
            bytes,
            filename,
            mode,
            page_count: metrics.page_count(),
            fingerprint,
        })
    }

    /// Renders and hands the artifact to `sink`; returns where it landed.
    pub fn emit(
        &self,
        quote: &QuoteRequest,
        lang: Language,
        mode: EmissionMode,
        sink: &mut dyn OutputSink,
    ) -> Result<Option<PathBuf>> {
        let artifact = self.render(quote, lang, mode)?;
        sink.deliver(&artifact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn quote(items: usize) -> QuoteRequest {
        let items: Vec<_> = (0..items)
            .map(|index| {
                json!({
                    "id": format!("item-{index}"),
                    "quantity": 2,
                    "unit_price": 125.5,
                    "total_price": 251.0,
                    "specifications": "{\"thickness\": 12.345, \"width\": \"very-long-value-exceeding-twenty-characters\"}",
                    "products": { "id": 7, "name": "Steel Plate", "name_ar": "لوح فولاذ" }
                })
            })
            .collect();
        serde_json::from_value(json!({
            "id": "3f2a9b1c-77aa-4d0e-9a55",
            "customer_name": "Acme Steel",
            "status": "quoted",
            "submitted_at": "2026-03-04T09:15:00Z",
            "quote_items": items,
            "quote_responses": { "total_amount": 5000, "validity_days": 30 }
        }))
        .unwrap()
    }

    #[test]
    fn renders_a_parseable_english_document() {
        let renderer = QuoteRenderer::builder().build().unwrap();
        let now = DateTime::parse_from_rfc3339("2026-10-18T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let artifact = renderer
            .render_at(&quote(20), Language::En, EmissionMode::Download, now)
            .unwrap();
        assert_eq!(artifact.filename, "Quote_3F2A9B1C_AcmeSteel_2026-10-18.pdf");
        assert_eq!(artifact.page_count, 3);
        assert!(artifact.content_disposition().starts_with("attachment;"));
        let report = inspect_pdf_bytes(&artifact.bytes).unwrap();
        assert!(verify_report(&report, artifact.page_count).is_ok());
        assert_eq!(report.lang.as_deref(), Some("en"));
        assert_eq!(artifact.fingerprint, quotedoc_contract::fingerprint(&quote(20)));
    }

    #[test]
    fn filename_carries_the_current_date_not_the_quote_date() {
        let renderer = QuoteRenderer::builder().build().unwrap();
        let before = Utc::now().format("%Y-%m-%d").to_string();
        let artifact = renderer
            .render(&quote(1), Language::En, EmissionMode::Download)
            .unwrap();
        let after = Utc::now().format("%Y-%m-%d").to_string();
        assert!(
            artifact.filename.ends_with(&format!("_{before}.pdf"))
                || artifact.filename.ends_with(&format!("_{after}.pdf")),
            "{}",
            artifact.filename
        );
        if before != "2026-03-04" && after != "2026-03-04" {
            assert!(!artifact.filename.contains("2026-03-04"));
        }
    }

    #[test]
    fn arabic_without_font_falls_back_unless_strict() {
        let renderer = QuoteRenderer::builder().build().unwrap();
        assert!(!renderer.has_arabic_font());
        let artifact = renderer
            .render(&quote(1), Language::Ar, EmissionMode::Preview)
            .unwrap();
        assert!(artifact.filename.ends_with("_ar.pdf"));
        assert_eq!(inspect_pdf_bytes(&artifact.bytes).unwrap().lang.as_deref(), Some("ar"));

        let strict = QuoteRenderer::builder()
            .strict_arabic_font(true)
            .build()
            .unwrap();
        let err = strict
            .render(&quote(1), Language::Ar, EmissionMode::Preview)
            .unwrap_err();
        assert_eq!(err.kind(), "missing_font");
        assert!(strict.render(&quote(1), Language::En, EmissionMode::Preview).is_ok());
    }

    #[test]
    fn rendering_is_deterministic_per_quote() {
        let renderer = QuoteRenderer::builder().build().unwrap();
        let first = renderer.render(&quote(3), Language::En, EmissionMode::Preview).unwrap();
        let second = renderer.render(&quote(3), Language::En, EmissionMode::Preview).unwrap();
        assert_eq!(first.bytes, second.bytes);
    }

    #[test]
    fn builder_rejects_invalid_settings() {
        assert!(matches!(
            QuoteRenderer::builder().capacities(8, 0, 8).build(),
            Err(QuoteDocError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            QuoteRenderer::builder().margin_all(500.0).build(),
            Err(QuoteDocError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            QuoteRenderer::builder()
                .arabic_fonts("NotoNaskhArabic", None)
                .build(),
            Err(QuoteDocError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            QuoteRenderer::builder().logo_bytes(b"GIF89a".to_vec()).build(),
            Err(QuoteDocError::Asset(_))
        ));
    }

    #[test]
    fn invalid_quotes_never_reach_emission() {
        let renderer = QuoteRenderer::builder().build().unwrap();
        let mut bad = quote(1);
        bad.items[0].quantity = 0;
        let err = renderer
            .render(&bad, Language::En, EmissionMode::Preview)
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_quote");
    }

    #[test]
    fn config_builds_a_renderer_with_logo_and_trace() {
        let dir = std::env::temp_dir().join(format!("quotedoc_lib_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("logo.png"), assets::tiny_png()).unwrap();
        let config_path = dir.join("render.toml");
        std::fs::write(
            &config_path,
            "[pagination]\nrule = \"strict\"\n[output]\nfile_prefix = \"Offer\"\nlogo = \"logo.png\"\ndebug_trace = \"trace.jsonl\"\n",
        )
        .unwrap();
        let config = RenderConfig::from_path(&config_path).unwrap();
        let renderer = QuoteRendererBuilder::from_config(&config)
            .unwrap()
            .build()
            .unwrap();
        let mut sink = BufferSink::new();
        let written = renderer
            .emit(&quote(20), Language::En, EmissionMode::Preview, &mut sink)
            .unwrap();
        assert_eq!(written, None);
        let artifact = sink.last().unwrap();
        assert!(artifact.filename.starts_with("Offer_"));
        // Strict rule: 8 + 12 items, then an empty summary page.
        assert_eq!(artifact.page_count, 3);
        assert!(artifact.content_disposition().starts_with("inline;"));

        let trace = std::fs::read_to_string(dir.join("trace.jsonl")).unwrap();
        assert!(trace.lines().any(|line| line.contains("\"render.artifact\"")));
        assert_eq!(
            trace.lines().filter(|line| line.contains("\"layout.page\"")).count(),
            3
        );
        let _ = std::fs::remove_dir_all(&dir);
    }
}
