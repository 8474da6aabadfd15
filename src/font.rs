use crate::error::{QuoteDocError, Result};
use crate::types::Pt;
use rustybuzz::{Direction as HbDirection, Face as HbFace, UnicodeBuffer};
use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::Path;
use std::sync::Mutex;
use ttf_parser::GlyphId;

pub const HELVETICA: &str = "Helvetica";
pub const HELVETICA_BOLD: &str = "Helvetica-Bold";

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
struct TextWidthKey {
    font: String,
    size_milli: i64,
    text: String,
}

#[derive(Debug)]
struct TextWidthCache {
    map: HashMap<TextWidthKey, Pt>,
    order: VecDeque<TextWidthKey>,
    max_entries: usize,
}

impl TextWidthCache {
    fn new(max_entries: usize) -> Self {
        Self {
            map: HashMap::new(),
            order: VecDeque::new(),
            max_entries,
        }
    }

    fn get(&self, key: &TextWidthKey) -> Option<Pt> {
        self.map.get(key).copied()
    }

    fn insert(&mut self, key: TextWidthKey, value: Pt) {
        if self.map.contains_key(&key) {
            return;
        }
        self.map.insert(key.clone(), value);
        self.order.push_back(key);
        while self.map.len() > self.max_entries {
            let Some(old) = self.order.pop_front() else {
                break;
            };
            self.map.remove(&old);
        }
    }
}

/// Fonts available to one renderer. Read-only once the renderer is built;
/// only the width cache is mutated, behind a mutex.
#[derive(Debug)]
pub struct FontRegistry {
    fonts: Vec<RegisteredFont>,
    lookup: HashMap<String, usize>,
    text_width_cache: Mutex<TextWidthCache>,
}

#[derive(Debug)]
pub(crate) struct RegisteredFont {
    pub(crate) name: String,
    pub(crate) data: Vec<u8>,
    pub(crate) metrics: FontMetrics,
    pub(crate) program_kind: FontProgramKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FontProgramKind {
    TrueType,
    OpenTypeCff,
}

/// Metrics in 1/1000 em, the unit PDF font dictionaries use.
#[derive(Debug)]
pub(crate) struct FontMetrics {
    pub(crate) ascent: i16,
    pub(crate) descent: i16,
    pub(crate) line_gap: i16,
    pub(crate) cap_height: i16,
    pub(crate) italic_angle: i16,
    pub(crate) stem_v: i16,
    pub(crate) bbox: (i16, i16, i16, i16),
    pub(crate) missing_width: u16,
    pub(crate) is_fixed_pitch: bool,
}

/// One glyph of a shaped run, in visual order.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ShapedGlyph {
    pub gid: u16,
    /// Source text this glyph stands for (empty for the trailing glyphs of a
    /// multi-glyph cluster).
    pub text: String,
    pub x_advance: i32,
    pub x_offset: i32,
}

impl Default for FontRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FontRegistry {
    pub fn new() -> Self {
        Self {
            fonts: Vec::new(),
            lookup: HashMap::new(),
            text_width_cache: Mutex::new(TextWidthCache::new(20_000)),
        }
    }

    /// Registers every `.ttf`/`.otf` file directly inside `path`. Files with
    /// other extensions are skipped; an unparsable font file is an error.
    pub fn register_dir(&mut self, path: impl AsRef<Path>) -> Result<Vec<String>> {
        let path = path.as_ref();
        let entries = fs::read_dir(path).map_err(|err| {
            QuoteDocError::Asset(format!("cannot read font dir {}: {err}", path.display()))
        })?;
        let mut files: Vec<_> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && has_font_extension(path))
            .collect();
        files.sort();
        let mut names = Vec::with_capacity(files.len());
        for file in files {
            names.push(self.register_file(&file)?);
        }
        Ok(names)
    }

    pub fn register_file(&mut self, path: impl AsRef<Path>) -> Result<String> {
        let path = path.as_ref();
        if !has_font_extension(path) {
            return Err(QuoteDocError::Asset(format!(
                "unsupported font file {}",
                path.display()
            )));
        }
        let data = fs::read(path).map_err(|err| {
            QuoteDocError::Asset(format!("cannot read font {}: {err}", path.display()))
        })?;
        let source = path.file_name().and_then(|v| v.to_str());
        self.register_bytes(data, source)
    }

    pub fn register_bytes(&mut self, data: Vec<u8>, source_name: Option<&str>) -> Result<String> {
        let source = source_name.unwrap_or("EmbeddedFont");
        let Ok(face) = ttf_parser::Face::parse(&data, 0) else {
            return Err(QuoteDocError::Asset(format!(
                "invalid font data for {source}"
            )));
        };

        let (name, aliases) = font_names(&face, Path::new(source));
        let (metrics, program_kind) = FontMetrics::from_face(&face);
        let index = self.fonts.len();
        self.fonts.push(RegisteredFont {
            name: name.clone(),
            data,
            metrics,
            program_kind,
        });

        for alias in std::iter::once(name.clone()).chain(aliases) {
            let key = normalize_name(&alias);
            if key.is_empty() || self.lookup.contains_key(&key) {
                continue;
            }
            self.lookup.insert(key, index);
        }
        tracing::debug!(font = %name, source, "registered font");
        Ok(name)
    }

    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }

    pub fn font_names(&self) -> impl Iterator<Item = &str> {
        self.fonts.iter().map(|font| font.name.as_str())
    }

    pub(crate) fn resolve(&self, name: &str) -> Option<&RegisteredFont> {
        let key = normalize_name(name);
        self.lookup
            .get(&key)
            .and_then(|index| self.fonts.get(*index))
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.resolve(name).is_some()
    }

    /// First registered font that has a glyph for every non-whitespace
    /// character of `sample`.
    pub fn find_covering_font(&self, sample: &str) -> Option<&str> {
        self.fonts
            .iter()
            .find(|font| font_covers(font, sample))
            .map(|font| font.name.as_str())
    }

    pub fn supports_text(&self, name: &str, text: &str) -> bool {
        match self.resolve(name) {
            Some(font) => font_covers(font, text),
            None => is_base14(name) && text.chars().all(|ch| winansi_byte(ch).is_some()),
        }
    }

    pub fn measure_text_width(&self, name: &str, font_size: Pt, text: &str) -> Pt {
        if text.is_empty() {
            return Pt::ZERO;
        }
        let cache_key = TextWidthKey {
            font: normalize_name(name),
            size_milli: font_size.to_milli_i64(),
            text: text.to_string(),
        };
        if let Ok(cache) = self.text_width_cache.lock() {
            if let Some(value) = cache.get(&cache_key) {
                return value;
            }
        }
        let units = match self.resolve(name) {
            Some(font) => shaped_advance_units(font, text),
            None => base14_width_units(name, text),
        };
        let value = if units <= 0 {
            Pt::ZERO
        } else {
            font_size.mul_ratio(units, 1000)
        };
        if let Ok(mut cache) = self.text_width_cache.lock() {
            cache.insert(cache_key, value);
        }
        value
    }

    pub fn line_height(&self, name: &str, font_size: Pt, fallback: Pt) -> Pt {
        let Some(font) = self.resolve(name) else {
            return fallback;
        };
        font.metrics.line_height(font_size).max(fallback)
    }

    pub(crate) fn glyph_advance(&self, name: &str, gid: u16) -> u16 {
        let Some(font) = self.resolve(name) else {
            return 0;
        };
        let Ok(face) = ttf_parser::Face::parse(&font.data, 0) else {
            return 0;
        };
        let advance = face.glyph_hor_advance(GlyphId(gid)).unwrap_or(0);
        let units = face.units_per_em().max(1) as i64;
        let scaled = ((advance as i64) * 1000 + (units / 2)) / units;
        scaled.clamp(0, u16::MAX as i64) as u16
    }

    /// Shapes `text` with the registered font `name`. Glyphs come back in
    /// visual order, so right-to-left text is already reversed.
    pub(crate) fn shape(&self, name: &str, text: &str) -> Option<Vec<ShapedGlyph>> {
        let font = self.resolve(name)?;
        shape_with_font(font, text)
    }
}

impl FontMetrics {
    fn from_face(face: &ttf_parser::Face<'_>) -> (Self, FontProgramKind) {
        let units_per_em = face.units_per_em().max(1);
        let scale = 1000.0 / units_per_em as f32;

        let ascent = scale_i16(face.ascender(), scale);
        let descent = scale_i16(face.descender(), scale);
        let line_gap = scale_i16(face.line_gap(), scale);
        let cap_height = face
            .capital_height()
            .map(|value| scale_i16(value, scale))
            .unwrap_or(ascent);
        let bbox = face.global_bounding_box();
        let bbox = (
            scale_i16(bbox.x_min, scale),
            scale_i16(bbox.y_min, scale),
            scale_i16(bbox.x_max, scale),
            scale_i16(bbox.y_max, scale),
        );
        let italic_angle = face
            .italic_angle()
            .map(|value| value.round() as i16)
            .unwrap_or(0);
        let missing_width = face
            .glyph_index(' ')
            .and_then(|id| face.glyph_hor_advance(id))
            .map(|adv| (adv as f32 * scale).round().clamp(0.0, u16::MAX as f32) as u16)
            .unwrap_or(0);

        let program_kind = if face.tables().cff.is_some() {
            FontProgramKind::OpenTypeCff
        } else {
            FontProgramKind::TrueType
        };

        (
            Self {
                ascent,
                descent,
                line_gap,
                cap_height,
                italic_angle,
                stem_v: 80,
                bbox,
                missing_width,
                is_fixed_pitch: face.is_monospaced(),
            },
            program_kind,
        )
    }

    fn line_height(&self, font_size: Pt) -> Pt {
        let height_1000 = self.ascent as i32 - self.descent as i32 + self.line_gap as i32;
        if height_1000 <= 0 {
            return Pt::ZERO;
        }
        font_size.mul_ratio(height_1000, 1000)
    }
}

fn font_covers(font: &RegisteredFont, text: &str) -> bool {
    let Ok(face) = ttf_parser::Face::parse(&font.data, 0) else {
        return false;
    };
    text.chars()
        .filter(|ch| !ch.is_whitespace())
        .all(|ch| face.glyph_index(ch).is_some())
}

fn shaped_advance_units(font: &RegisteredFont, text: &str) -> i32 {
    match shape_with_font(font, text) {
        Some(glyphs) => glyphs
            .iter()
            .fold(0i32, |acc, glyph| acc.saturating_add(glyph.x_advance)),
        None => (font.metrics.missing_width as i32).saturating_mul(text.chars().count() as i32),
    }
}

fn shape_with_font(font: &RegisteredFont, text: &str) -> Option<Vec<ShapedGlyph>> {
    let face = HbFace::from_slice(&font.data, 0)?;
    let units_per_em = face.units_per_em().max(1) as i64;
    let to_thousandths = |value: i32| ((value as i64 * 1000) / units_per_em) as i32;

    let mut buffer = UnicodeBuffer::new();
    buffer.push_str(text);
    buffer.set_direction(detect_direction(text));
    let output = rustybuzz::shape(&face, &[], buffer);
    let infos = output.glyph_infos();
    let positions = output.glyph_positions();
    if infos.is_empty() || infos.len() != positions.len() {
        return None;
    }

    // Cluster values are byte offsets into `text`; a cluster ends where the
    // next larger cluster value starts.
    let mut starts: Vec<usize> = infos.iter().map(|info| info.cluster as usize).collect();
    starts.sort_unstable();
    starts.dedup();
    let cluster_text = |start: usize| -> String {
        let end = starts
            .iter()
            .copied()
            .find(|value| *value > start)
            .unwrap_or(text.len());
        text.get(start.min(text.len())..end.min(text.len()))
            .unwrap_or_default()
            .to_string()
    };

    let mut seen_clusters = std::collections::HashSet::new();
    let mut glyphs = Vec::with_capacity(infos.len());
    for (info, pos) in infos.iter().zip(positions.iter()) {
        let cluster = info.cluster as usize;
        let text = if seen_clusters.insert(cluster) {
            cluster_text(cluster)
        } else {
            String::new()
        };
        glyphs.push(ShapedGlyph {
            gid: info.glyph_id as u16,
            text,
            x_advance: to_thousandths(pos.x_advance),
            x_offset: to_thousandths(pos.x_offset),
        });
    }
    Some(glyphs)
}

/// Right-to-left scripts: Hebrew, Arabic, Syriac, Thaana and their
/// presentation forms.
pub fn is_rtl_char(ch: char) -> bool {
    matches!(
        ch as u32,
        0x0590..=0x08FF | 0xFB1D..=0xFDFF | 0xFE70..=0xFEFF | 0x1EE00..=0x1EEFF
    )
}

fn detect_direction(text: &str) -> HbDirection {
    if text.chars().any(is_rtl_char) {
        HbDirection::RightToLeft
    } else {
        HbDirection::LeftToRight
    }
}

fn has_font_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|v| v.to_str())
        .map(|ext| matches!(ext.to_ascii_lowercase().as_str(), "ttf" | "otf"))
        .unwrap_or(false)
}

fn scale_i16(value: i16, scale: f32) -> i16 {
    let scaled = (value as f32 * scale).round() as i32;
    scaled.clamp(i16::MIN as i32, i16::MAX as i32) as i16
}

fn font_names(face: &ttf_parser::Face<'_>, path: &Path) -> (String, Vec<String>) {
    use ttf_parser::name::name_id;

    let mut family = None;
    let mut full = None;
    let mut post = None;

    for entry in face.names() {
        let Some(name) = entry.to_string() else {
            continue;
        };
        match entry.name_id {
            name_id::TYPOGRAPHIC_FAMILY | name_id::FAMILY => {
                if family.is_none() {
                    family = Some(name);
                }
            }
            name_id::FULL_NAME => {
                if full.is_none() {
                    full = Some(name);
                }
            }
            name_id::POST_SCRIPT_NAME => {
                if post.is_none() {
                    post = Some(name);
                }
            }
            _ => {}
        }
    }

    let stem = path
        .file_stem()
        .and_then(|v| v.to_str())
        .map(|v| v.to_string());
    let primary = post
        .clone()
        .or_else(|| full.clone())
        .or_else(|| family.clone())
        .or_else(|| stem.clone())
        .unwrap_or_else(|| "EmbeddedFont".to_string());

    let aliases = [family, full, post, stem]
        .into_iter()
        .flatten()
        .filter(|candidate| *candidate != primary)
        .collect();

    (primary, aliases)
}

fn normalize_name(name: &str) -> String {
    name.trim()
        .trim_matches('"')
        .trim_matches('\'')
        .to_ascii_lowercase()
}

pub(crate) fn is_base14(name: &str) -> bool {
    matches!(
        normalize_name(name).as_str(),
        "helvetica"
            | "helvetica-bold"
            | "helvetica-oblique"
            | "helvetica-boldoblique"
            | "times-roman"
            | "times-bold"
            | "times-italic"
            | "times-bolditalic"
            | "courier"
            | "courier-bold"
            | "courier-oblique"
            | "courier-boldoblique"
            | "symbol"
            | "zapfdingbats"
    )
}

// Helvetica AFM advance widths for 0x20..=0x7E (WinAnsi).
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // 0x20
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // 0x30
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // 0x40
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // 0x50
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // 0x60
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, // 0x70
];

const HELVETICA_BOLD_WIDTHS: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278, // 0x20
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611, // 0x30
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778, // 0x40
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556, // 0x50
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611, // 0x60
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584, // 0x70
];

/// Width of `text` in 1/1000 em for an unregistered font, using Helvetica
/// metrics (bold variants use Helvetica-Bold). Characters outside printable
/// ASCII get the digit width.
fn base14_width_units(name: &str, text: &str) -> i32 {
    let table = if normalize_name(name).contains("bold") {
        &HELVETICA_BOLD_WIDTHS
    } else {
        &HELVETICA_WIDTHS
    };
    text.chars()
        .map(|ch| {
            let code = ch as u32;
            if (0x20..=0x7E).contains(&code) {
                table[(code - 0x20) as usize] as i32
            } else {
                556
            }
        })
        .sum()
}

/// WinAnsi (cp1252) byte for `ch`, if the base-14 fonts can show it.
pub(crate) fn winansi_byte(ch: char) -> Option<u8> {
    let byte = match ch {
        '\u{0000}'..='\u{007F}' => ch as u8,
        '\u{00A0}'..='\u{00FF}' => ch as u8,
        '\u{20AC}' => 0x80,
        '\u{201A}' => 0x82,
        '\u{0192}' => 0x83,
        '\u{201E}' => 0x84,
        '\u{2026}' => 0x85,
        '\u{2020}' => 0x86,
        '\u{2021}' => 0x87,
        '\u{02C6}' => 0x88,
        '\u{2030}' => 0x89,
        '\u{0160}' => 0x8A,
        '\u{2039}' => 0x8B,
        '\u{0152}' => 0x8C,
        '\u{017D}' => 0x8E,
        '\u{2018}' => 0x91,
        '\u{2019}' => 0x92,
        '\u{201C}' => 0x93,
        '\u{201D}' => 0x94,
        '\u{2022}' => 0x95,
        '\u{2013}' => 0x96,
        '\u{2014}' => 0x97,
        '\u{02DC}' => 0x98,
        '\u{2122}' => 0x99,
        '\u{0161}' => 0x9A,
        '\u{203A}' => 0x9B,
        '\u{0153}' => 0x9C,
        '\u{017E}' => 0x9E,
        '\u{0178}' => 0x9F,
        _ => return None,
    };
    Some(byte)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn helvetica_widths_follow_afm() {
        let registry = FontRegistry::new();
        // "Quote" = 778 + 556 + 556 + 278 + 556 = 2724 units.
        let width = registry.measure_text_width(HELVETICA, Pt::from_i32(10), "Quote");
        assert_eq!(width.to_milli_i64(), 27_240);
        let bold = registry.measure_text_width(HELVETICA_BOLD, Pt::from_i32(10), "Quote");
        assert!(bold > width);
        assert_eq!(
            registry.measure_text_width(HELVETICA, Pt::from_i32(10), ""),
            Pt::ZERO
        );
    }

    #[test]
    fn repeated_measurements_hit_the_cache() {
        let registry = FontRegistry::new();
        let a = registry.measure_text_width(HELVETICA, Pt::from_i32(9), "SAR 1,234.50");
        let b = registry.measure_text_width(HELVETICA, Pt::from_i32(9), "SAR 1,234.50");
        assert_eq!(a, b);
        let cache = registry.text_width_cache.lock().unwrap();
        assert_eq!(cache.map.len(), 1);
    }

    #[test]
    fn cache_evicts_oldest_entries() {
        let mut cache = TextWidthCache::new(2);
        for text in ["a", "b", "c"] {
            cache.insert(
                TextWidthKey {
                    font: "helvetica".into(),
                    size_milli: 1000,
                    text: text.into(),
                },
                Pt::from_i32(1),
            );
        }
        assert_eq!(cache.map.len(), 2);
        assert!(cache.order.iter().all(|key| key.text != "a"));
    }

    #[test]
    fn invalid_font_bytes_are_rejected() {
        let mut registry = FontRegistry::new();
        let err = registry
            .register_bytes(vec![0, 1, 2, 3], Some("broken.ttf"))
            .unwrap_err();
        assert!(matches!(err, QuoteDocError::Asset(_)));
        assert!(registry.is_empty());
        assert!(registry.find_covering_font("مرحبا").is_none());
    }

    #[test]
    fn base14_support_is_limited_to_winansi() {
        let registry = FontRegistry::new();
        assert!(registry.supports_text(HELVETICA, "Steel Plate 12mm"));
        assert!(!registry.supports_text(HELVETICA, "لوح فولاذ"));
        assert!(!registry.supports_text("NotoNaskhArabic", "abc"));
        assert!(is_rtl_char('ل'));
        assert!(!is_rtl_char('1'));
    }
}
