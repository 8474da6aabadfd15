use crate::emit::DEFAULT_FILE_PREFIX;
use crate::error::{QuoteDocError, Result};
use crate::format::Currency;
use crate::layout::Brand;
use crate::paginate::{LastPageRule, PageCapacity};
use crate::types::{Margins, Pt, Size};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Defaults every config file is layered over.
pub const DEFAULT_CONFIG: &str = r#"
[page]
size = "a4"
margins = { top = 36.0, right = 36.0, bottom = 36.0, left = 36.0 }

[pagination]
first = 8
middle = 12
last = 8
rule = "legacy"

[brand]
name = "Steel Products Co."
name_ar = "شركة منتجات الحديد"

[currency]
code = "SAR"
arabic_symbol = "ر.س"

[fonts]
dirs = []
files = []
strict_arabic = false

[output]
file_prefix = "Quote"
"#;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RenderConfig {
    #[serde(default)]
    pub page: PageConfig,
    #[serde(default)]
    pub pagination: PaginationConfig,
    #[serde(default)]
    pub brand: Brand,
    #[serde(default)]
    pub currency: Currency,
    #[serde(default)]
    pub fonts: FontConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PageConfig {
    /// `a4`, `letter` or `a5`.
    pub size: String,
    /// Explicit width/height in points; overrides `size` when both are set.
    pub width: Option<f32>,
    pub height: Option<f32>,
    pub margins: MarginConfig,
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            size: "a4".to_string(),
            width: None,
            height: None,
            margins: MarginConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MarginConfig {
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
    pub left: f32,
}

impl Default for MarginConfig {
    fn default() -> Self {
        Self {
            top: 36.0,
            right: 36.0,
            bottom: 36.0,
            left: 36.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PaginationConfig {
    pub first: usize,
    pub middle: usize,
    pub last: usize,
    pub rule: LastPageRule,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        let capacity = PageCapacity::default();
        Self {
            first: capacity.first,
            middle: capacity.middle,
            last: capacity.last,
            rule: LastPageRule::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FontConfig {
    pub dirs: Vec<PathBuf>,
    pub files: Vec<PathBuf>,
    /// Registered font names for the Arabic roles. When unset, the first
    /// registered font covering Arabic is used.
    pub arabic: Option<String>,
    pub arabic_bold: Option<String>,
    pub strict_arabic: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub file_prefix: String,
    pub logo: Option<PathBuf>,
    pub debug_trace: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            file_prefix: DEFAULT_FILE_PREFIX.to_string(),
            logo: None,
            debug_trace: None,
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            page: PageConfig::default(),
            pagination: PaginationConfig::default(),
            brand: Brand::default(),
            currency: Currency::default(),
            fonts: FontConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl RenderConfig {
    /// The embedded defaults.
    pub fn embedded() -> Result<Self> {
        Self::from_toml_str(DEFAULT_CONFIG)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: RenderConfig = toml::from_str(raw)
            .map_err(|err| QuoteDocError::InvalidConfiguration(err.message().to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a TOML file. Relative font and logo paths resolve against the
    /// file's directory.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|err| {
            QuoteDocError::InvalidConfiguration(format!("cannot read {}: {err}", path.display()))
        })?;
        let mut config = Self::from_toml_str(&raw)?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        Ok(config)
    }

    fn resolve_paths(&mut self, base: &Path) {
        let join = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        self.fonts.dirs.iter_mut().for_each(join);
        self.fonts.files.iter_mut().for_each(join);
        self.output.logo.iter_mut().for_each(join);
        self.output.debug_trace.iter_mut().for_each(join);
    }

    pub fn page_size(&self) -> Result<Size> {
        match (self.page.width, self.page.height) {
            (Some(width), Some(height)) if width > 0.0 && height > 0.0 => Ok(Size {
                width: Pt::from_f32(width),
                height: Pt::from_f32(height),
            }),
            (Some(_), Some(_)) => Err(QuoteDocError::InvalidConfiguration(
                "page width and height must be positive".to_string(),
            )),
            _ => Size::named(&self.page.size).ok_or_else(|| {
                QuoteDocError::InvalidConfiguration(format!(
                    "unknown page size {:?}",
                    self.page.size
                ))
            }),
        }
    }

    pub fn margins(&self) -> Margins {
        let m = self.page.margins;
        Margins {
            top: Pt::from_f32(m.top),
            right: Pt::from_f32(m.right),
            bottom: Pt::from_f32(m.bottom),
            left: Pt::from_f32(m.left),
        }
    }

    pub fn capacity(&self) -> PageCapacity {
        PageCapacity {
            first: self.pagination.first,
            middle: self.pagination.middle,
            last: self.pagination.last,
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.capacity().validate()?;
        let size = self.page_size()?;
        validate_margins(self.margins(), size)?;
        if self.output.file_prefix.trim().is_empty() {
            return Err(QuoteDocError::InvalidConfiguration(
                "output.file_prefix must not be empty".to_string(),
            ));
        }
        if self.brand.name.trim().is_empty() {
            return Err(QuoteDocError::InvalidConfiguration(
                "brand.name must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Each margin must be non-negative and smaller than half the page side it
/// cuts into.
pub fn validate_margins(margins: Margins, size: Size) -> Result<()> {
    let half_width = size.width / 2;
    let half_height = size.height / 2;
    let checks = [
        ("top", margins.top, half_height),
        ("bottom", margins.bottom, half_height),
        ("left", margins.left, half_width),
        ("right", margins.right, half_width),
    ];
    for (name, value, limit) in checks {
        if value < Pt::ZERO || value >= limit {
            return Err(QuoteDocError::InvalidConfiguration(format!(
                "{name} margin {} is outside 0..{}",
                value.to_f32(),
                limit.to_f32()
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_defaults_match_code_defaults() {
        let embedded = RenderConfig::embedded().unwrap();
        assert_eq!(embedded, RenderConfig::default());
        assert_eq!(embedded.capacity(), PageCapacity::new(8, 12, 8).unwrap());
        assert_eq!(embedded.page_size().unwrap(), Size::a4());
        assert_eq!(embedded.pagination.rule, LastPageRule::Legacy);
    }

    #[test]
    fn partial_files_layer_over_defaults() {
        let config = RenderConfig::from_toml_str(
            r#"
            [page]
            size = "letter"
            [pagination]
            middle = 15
            rule = "strict"
            [brand]
            name = "Gulf Steel"
            contact = "+966 11 000 0000"
            [fonts]
            arabic = "NotoNaskhArabic"
            strict_arabic = true
            "#,
        )
        .unwrap();
        assert_eq!(config.page_size().unwrap(), Size::letter());
        assert_eq!(config.capacity(), PageCapacity::new(8, 15, 8).unwrap());
        assert_eq!(config.pagination.rule, LastPageRule::Strict);
        assert_eq!(config.brand.name, "Gulf Steel");
        assert_eq!(config.brand.contact.as_deref(), Some("+966 11 000 0000"));
        assert_eq!(config.currency.code, "SAR");
        assert!(config.fonts.strict_arabic);
        assert_eq!(config.output.file_prefix, "Quote");
    }

    #[test]
    fn invalid_values_are_rejected() {
        let zero = RenderConfig::from_toml_str("[pagination]\nfirst = 0\n");
        assert!(matches!(zero, Err(QuoteDocError::InvalidConfiguration(_))));
        let margins = RenderConfig::from_toml_str("[page.margins]\nleft = 400.0\n");
        assert!(matches!(margins, Err(QuoteDocError::InvalidConfiguration(_))));
        let size = RenderConfig::from_toml_str("[page]\nsize = \"tabloid\"\n");
        assert!(matches!(size, Err(QuoteDocError::InvalidConfiguration(_))));
        let unknown = RenderConfig::from_toml_str("[page]\ncolour = \"red\"\n");
        assert!(matches!(unknown, Err(QuoteDocError::InvalidConfiguration(_))));
    }

    #[test]
    fn relative_paths_resolve_against_the_config_file() {
        let dir = std::env::temp_dir().join(format!("quotedoc_config_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("render.toml");
        std::fs::write(
            &path,
            "[fonts]\ndirs = [\"fonts\"]\n[output]\nlogo = \"/abs/logo.png\"\n",
        )
        .unwrap();
        let config = RenderConfig::from_path(&path).unwrap();
        assert_eq!(config.fonts.dirs, vec![dir.join("fonts")]);
        assert_eq!(config.output.logo, Some(PathBuf::from("/abs/logo.png")));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
