use crate::assets::AssetBundle;
use crate::canvas::{Command, Document, Page};
use crate::error::{QuoteDocError, Result};
use crate::font::{FontProgramKind, FontRegistry, RegisteredFont, ShapedGlyph, winansi_byte};
use crate::metrics::{DocumentMetrics, PageMetrics};
use crate::types::{Color, Pt, Size};
use chrono::{DateTime, Utc};
use fixed::types::I32F32;
use image::GenericImageView;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::io::{self, Write};
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct PdfOptions {
    pub title: Option<String>,
    /// BCP 47 tag written to the catalog `/Lang`.
    pub lang: Option<String>,
    /// Hex digest used for the trailer `/ID`; the same quote always gets the
    /// same id. When unset, the id is a SHA-256 of the page content streams.
    pub file_id: Option<String>,
    pub producer: String,
    pub creation_date: Option<DateTime<Utc>>,
}

impl Default for PdfOptions {
    fn default() -> Self {
        Self {
            title: None,
            lang: None,
            file_id: None,
            producer: concat!("quotedoc ", env!("CARGO_PKG_VERSION")).to_string(),
            creation_date: None,
        }
    }
}

const PDF_CATALOG_ID: usize = 1;
const PDF_PAGES_ID: usize = 2;
const PDF_RESOURCES_ID: usize = 3;
const PDF_FIRST_FREE_ID: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FontEncoding {
    WinAnsi,
    IdentityH,
}

#[derive(Debug, Clone)]
struct FontResource {
    resource: String,
    encoding: FontEncoding,
}

struct ImageData {
    width: u32,
    height: u32,
    color_space: &'static str,
    filter: Option<&'static str>,
    data: Vec<u8>,
    alpha: Option<Vec<u8>>,
}

/// Serializes `document` to PDF bytes.
pub fn document_to_pdf(
    document: &Document,
    registry: &FontRegistry,
    assets: &AssetBundle,
    options: &PdfOptions,
) -> Result<Vec<u8>> {
    document_to_pdf_with_metrics(document, registry, assets, options).map(|(bytes, _)| bytes)
}

pub fn document_to_pdf_with_metrics(
    document: &Document,
    registry: &FontRegistry,
    assets: &AssetBundle,
    options: &PdfOptions,
) -> Result<(Vec<u8>, DocumentMetrics)> {
    let started = Instant::now();
    let mut out = Vec::new();
    let mut metrics = {
        let mut writer = PdfStreamWriter::new(&mut out, document, registry, assets);
        writer.write(options).map_err(|err| QuoteDocError::Pdf(err.to_string()))?
    };
    metrics.total_bytes = out.len();
    metrics.render_ms = started.elapsed().as_secs_f64() * 1000.0;
    tracing::debug!(
        pages = metrics.page_count(),
        bytes = metrics.total_bytes,
        fonts = metrics.font_objects,
        images = metrics.image_objects,
        "pdf written"
    );
    Ok((out, metrics))
}

struct PdfStreamWriter<'a, W: Write> {
    writer: W,
    document: &'a Document,
    registry: &'a FontRegistry,
    assets: &'a AssetBundle,
    offset: usize,
    offsets: Vec<usize>,
    next_id: usize,
    font_map: BTreeMap<String, FontResource>,
    image_map: BTreeMap<String, String>,
}

impl<'a, W: Write> PdfStreamWriter<'a, W> {
    fn new(
        writer: W,
        document: &'a Document,
        registry: &'a FontRegistry,
        assets: &'a AssetBundle,
    ) -> Self {
        Self {
            writer,
            document,
            registry,
            assets,
            offset: 0,
            offsets: vec![0; PDF_FIRST_FREE_ID],
            next_id: PDF_FIRST_FREE_ID,
            font_map: BTreeMap::new(),
            image_map: BTreeMap::new(),
        }
    }

    fn alloc_id(&mut self) -> usize {
        let id = self.next_id;
        self.next_id += 1;
        self.offsets.push(0);
        id
    }

    fn object(&mut self, id: usize, body: &str) -> io::Result<()> {
        write_pdf_object(&mut self.writer, &mut self.offset, &mut self.offsets, id, body)
    }

    fn write(&mut self, options: &PdfOptions) -> io::Result<DocumentMetrics> {
        let mut metrics = DocumentMetrics::default();
        write_bytes(&mut self.writer, b"%PDF-1.7\n%\xE2\xE3\xCF\xD3\n", &mut self.offset)?;

        let mut catalog = format!("<< /Type /Catalog /Pages {PDF_PAGES_ID} 0 R");
        if let Some(lang) = options.lang.as_deref() {
            catalog.push_str(&format!(" /Lang ({})", escape_pdf_string(lang)));
        }
        catalog.push_str(" >>");
        self.object(PDF_CATALOG_ID, &catalog)?;

        let font_resources = self.write_fonts(&mut metrics)?;
        let image_resources = self.write_images(&mut metrics)?;
        let mut resources = format!(
            "<< /ProcSet [/PDF /Text /ImageB /ImageC] /Font {}",
            resource_dict(&font_resources)
        );
        if !image_resources.is_empty() {
            resources.push_str(&format!(" /XObject {}", resource_dict(&image_resources)));
        }
        resources.push_str(" >>");
        self.object(PDF_RESOURCES_ID, &resources)?;

        let document = self.document;
        let mut kids = Vec::with_capacity(document.pages.len());
        let mut content_digest = Sha256::new();
        for (index, page) in document.pages.iter().enumerate() {
            let (content, mut page_metrics) = self.render_page(page, document.page_size.height);
            page_metrics.page_number = index + 1;
            page_metrics.content_bytes = content.len();
            content_digest.update(content.as_bytes());
            let content_id = self.alloc_id();
            self.object(content_id, &stream_object(&content))?;
            let page_id = self.alloc_id();
            let page_dict = format!(
                "<< /Type /Page /Parent {PDF_PAGES_ID} 0 R /MediaBox {} /Resources {PDF_RESOURCES_ID} 0 R /Contents {content_id} 0 R >>",
                media_box(document.page_size)
            );
            self.object(page_id, &page_dict)?;
            kids.push(format!("{page_id} 0 R"));
            metrics.pages.push(page_metrics);
        }
        let pages = format!(
            "<< /Type /Pages /Kids [{}] /Count {} >>",
            kids.join(" "),
            kids.len()
        );
        self.object(PDF_PAGES_ID, &pages)?;

        let info_id = self.alloc_id();
        self.object(info_id, &info_object(options))?;
        // Without a caller-supplied id, derive one from the page contents.
        let file_id = match options.file_id.as_deref() {
            Some(id) => pdf_file_id(id),
            None => pdf_file_id(&format!("{:x}", content_digest.finalize())),
        };
        self.write_trailer(info_id, &file_id)?;
        self.writer.flush()?;
        Ok(metrics)
    }

    fn write_fonts(&mut self, metrics: &mut DocumentMetrics) -> io::Result<Vec<(String, usize)>> {
        let mut names = collect_font_names(self.document);
        if names.is_empty() {
            names.push(crate::font::HELVETICA.to_string());
        }
        let registry = self.registry;
        let mut resources = Vec::new();
        for (index, name) in names.iter().enumerate() {
            let resource = format!("F{}", index + 1);
            let registered = registry
                .resolve(name)
                .filter(|font| font.program_kind == FontProgramKind::TrueType);
            let (font_id, encoding) = match registered {
                Some(font) => {
                    let glyph_map = collect_glyph_map(self.document, registry, name);
                    (self.write_cidfont(font, &glyph_map)?, FontEncoding::IdentityH)
                }
                None => {
                    let unsupported = registry.resolve(name).is_some();
                    if unsupported {
                        tracing::warn!(font = %name, "CFF outlines are not embedded; using Helvetica");
                    }
                    let font_id = self.alloc_id();
                    let base = if unsupported {
                        crate::font::HELVETICA
                    } else {
                        name.as_str()
                    };
                    self.object(font_id, &font_object(base))?;
                    (font_id, FontEncoding::WinAnsi)
                }
            };
            metrics.font_objects += 1;
            self.font_map.insert(
                name.clone(),
                FontResource {
                    resource: resource.clone(),
                    encoding,
                },
            );
            resources.push((resource, font_id));
        }
        Ok(resources)
    }

    fn write_cidfont(
        &mut self,
        font: &RegisteredFont,
        glyph_map: &BTreeMap<u16, String>,
    ) -> io::Result<usize> {
        let font_file_id = self.alloc_id();
        self.object(font_file_id, &font_file_object(&font.data))?;
        let descriptor_id = self.alloc_id();
        self.object(descriptor_id, &font_descriptor_object(font, font_file_id))?;

        let widths: Vec<String> = glyph_map
            .keys()
            .map(|gid| {
                let advance = self.registry.glyph_advance(&font.name, *gid);
                let width = if advance > 0 {
                    advance
                } else {
                    font.metrics.missing_width
                };
                format!("{gid} [{width}]")
            })
            .collect();
        let w_array = if widths.is_empty() {
            String::new()
        } else {
            format!(" /W [{}]", widths.join(" "))
        };
        let base = sanitize_font_name(&font.name);
        let cid_font_id = self.alloc_id();
        self.object(
            cid_font_id,
            &format!(
                "<< /Type /Font /Subtype /CIDFontType2 /BaseFont /{base} /CIDSystemInfo << /Registry (Adobe) /Ordering (Identity) /Supplement 0 >> /FontDescriptor {descriptor_id} 0 R{w_array} /CIDToGIDMap /Identity >>"
            ),
        )?;
        let to_unicode_id = self.alloc_id();
        self.object(to_unicode_id, &stream_object(&to_unicode_cmap(glyph_map)))?;
        let type0_id = self.alloc_id();
        self.object(
            type0_id,
            &format!(
                "<< /Type /Font /Subtype /Type0 /BaseFont /{base} /Encoding /Identity-H /DescendantFonts [{cid_font_id} 0 R] /ToUnicode {to_unicode_id} 0 R >>"
            ),
        )?;
        Ok(type0_id)
    }

    fn write_images(
        &mut self,
        metrics: &mut DocumentMetrics,
    ) -> io::Result<Vec<(String, usize)>> {
        let mut resources = Vec::new();
        for resource_id in collect_image_ids(self.document) {
            let Some(asset) = self.assets.image(&resource_id) else {
                tracing::warn!(image = %resource_id, "image resource not found; skipping");
                continue;
            };
            let Some(image) = decode_image_bytes(&asset.data) else {
                tracing::warn!(image = %resource_id, "image could not be decoded; skipping");
                continue;
            };
            let smask_id = match &image.alpha {
                Some(alpha) => {
                    let id = self.alloc_id();
                    self.object(id, &image_smask_object(&image, alpha))?;
                    Some(id)
                }
                None => None,
            };
            let image_id = self.alloc_id();
            self.object(image_id, &image_object(&image, smask_id))?;
            let name = format!("Im{}", resources.len() + 1);
            self.image_map.insert(resource_id, name.clone());
            resources.push((name, image_id));
            metrics.image_objects += 1;
        }
        Ok(resources)
    }

    fn render_page(&self, page: &Page, page_height: Pt) -> (String, PageMetrics) {
        let mut out = String::new();
        let mut metrics = PageMetrics {
            command_count: page.commands.len(),
            ..PageMetrics::default()
        };
        let mut font_size = Pt::from_i32(12);
        let mut font_name = crate::font::HELVETICA.to_string();

        for command in &page.commands {
            match command {
                Command::SaveState => out.push_str("q\n"),
                Command::RestoreState => out.push_str("Q\n"),
                Command::Meta { .. } => {}
                Command::SetFillColor(color) => out.push_str(&color_to_pdf_fill(*color)),
                Command::SetStrokeColor(color) => out.push_str(&color_to_pdf_stroke(*color)),
                Command::SetLineWidth(width) => {
                    out.push_str(&format!("{} w\n", fmt_pt(*width)));
                }
                Command::SetFontName(name) => font_name = name.clone(),
                Command::SetFontSize(size) => font_size = *size,
                Command::ClipRect {
                    x,
                    y,
                    width,
                    height,
                } => {
                    out.push_str(&format!(
                        "{} {} {} {} re\nW\nn\n",
                        fmt_pt(*x),
                        fmt_pt(page_height - *y - *height),
                        fmt_pt(*width),
                        fmt_pt(*height)
                    ));
                }
                Command::MoveTo { x, y } => {
                    out.push_str(&format!("{} {} m\n", fmt_pt(*x), fmt_pt(page_height - *y)));
                }
                Command::LineTo { x, y } => {
                    out.push_str(&format!("{} {} l\n", fmt_pt(*x), fmt_pt(page_height - *y)));
                }
                Command::Fill => out.push_str("f\n"),
                Command::Stroke => out.push_str("S\n"),
                Command::FillStroke => out.push_str("B\n"),
                Command::DrawRect {
                    x,
                    y,
                    width,
                    height,
                } => {
                    out.push_str(&format!(
                        "{} {} {} {} re\n",
                        fmt_pt(*x),
                        fmt_pt(page_height - *y - *height),
                        fmt_pt(*width),
                        fmt_pt(*height)
                    ));
                }
                Command::DrawString { x, y, text } => {
                    metrics.text_runs += 1;
                    let font = self.font_map.get(&font_name);
                    let resource = font.map(|f| f.resource.as_str()).unwrap_or("F1");
                    out.push_str("BT\n");
                    out.push_str(&format!("/{} {} Tf\n", resource, fmt_pt(font_size)));
                    out.push_str(&format!(
                        "{} {} Td\n",
                        fmt_pt(*x),
                        fmt_pt(page_height - *y - font_size)
                    ));
                    let encoding = font.map(|f| f.encoding).unwrap_or(FontEncoding::WinAnsi);
                    let shaped = match encoding {
                        FontEncoding::IdentityH => self.registry.shape(&font_name, text),
                        FontEncoding::WinAnsi => None,
                    };
                    match shaped {
                        Some(glyphs) => {
                            let tj = glyphs_to_tj(&glyphs, |gid| {
                                self.registry.glyph_advance(&font_name, gid)
                            });
                            out.push_str(&tj);
                        }
                        None => {
                            let (encoded, replaced) = encode_winansi_pdf_string(text);
                            metrics.replaced_chars += replaced;
                            out.push_str(&format!("({encoded}) Tj\n"));
                        }
                    }
                    out.push_str("ET\n");
                }
                Command::DrawImage {
                    x,
                    y,
                    width,
                    height,
                    resource_id,
                } => {
                    if let Some(name) = self.image_map.get(resource_id) {
                        out.push_str(&format!(
                            "q\n{} 0 0 {} {} {} cm\n/{} Do\nQ\n",
                            fmt_pt(*width),
                            fmt_pt(*height),
                            fmt_pt(*x),
                            fmt_pt(page_height - *y - *height),
                            name
                        ));
                    }
                }
            }
        }
        (out, metrics)
    }

    fn write_trailer(&mut self, info_id: usize, file_id: &str) -> io::Result<()> {
        let xref_start = self.offset;
        let count = self.offsets.len();
        let mut xref = format!("xref\n0 {count}\n0000000000 65535 f \n");
        for offset in self.offsets.iter().skip(1) {
            xref.push_str(&format!("{offset:010} 00000 n \n"));
        }
        write_str(&mut self.writer, &xref, &mut self.offset)?;

        let mut trailer =
            format!("trailer\n<< /Size {count} /Root {PDF_CATALOG_ID} 0 R /Info {info_id} 0 R");
        if !file_id.is_empty() {
            trailer.push_str(&format!(" /ID [<{file_id}> <{file_id}>]"));
        }
        trailer.push_str(&format!(" >>\nstartxref\n{xref_start}\n%%EOF\n"));
        write_str(&mut self.writer, &trailer, &mut self.offset)
    }
}

fn collect_font_names(document: &Document) -> Vec<String> {
    let mut names = Vec::new();
    for page in &document.pages {
        for command in &page.commands {
            if let Command::SetFontName(name) = command {
                if !names.contains(name) {
                    names.push(name.clone());
                }
            }
        }
    }
    names
}

fn collect_image_ids(document: &Document) -> BTreeSet<String> {
    document
        .pages
        .iter()
        .flat_map(|page| page.commands.iter())
        .filter_map(|command| match command {
            Command::DrawImage { resource_id, .. } => Some(resource_id.clone()),
            _ => None,
        })
        .collect()
}

/// Glyphs used with `font_name` anywhere in the document, mapped back to the
/// text they stand for. Drives both `/W` and the ToUnicode cmap.
fn collect_glyph_map(
    document: &Document,
    registry: &FontRegistry,
    font_name: &str,
) -> BTreeMap<u16, String> {
    let mut map = BTreeMap::new();
    for page in &document.pages {
        let mut current = String::new();
        for command in &page.commands {
            match command {
                Command::SetFontName(name) => current = name.clone(),
                Command::DrawString { text, .. } if current == font_name => {
                    for glyph in registry.shape(font_name, text).unwrap_or_default() {
                        if glyph.gid != 0 && !glyph.text.is_empty() {
                            map.entry(glyph.gid).or_insert(glyph.text);
                        }
                    }
                }
                _ => {}
            }
        }
    }
    map
}

/// TJ array for shaped glyphs. Positions are in 1/1000 em; advances that
/// differ from the font's default width become kerning adjustments.
fn glyphs_to_tj(glyphs: &[ShapedGlyph], default_advance: impl Fn(u16) -> u16) -> String {
    let mut parts: Vec<String> = Vec::new();
    for glyph in glyphs {
        if glyph.gid == 0 {
            continue;
        }
        if glyph.x_offset != 0 {
            parts.push(format!("{}", -glyph.x_offset));
        }
        parts.push(format!("<{:04X}>", glyph.gid));
        let adjust = default_advance(glyph.gid) as i32 - glyph.x_advance;
        if adjust != 0 {
            parts.push(format!("{adjust}"));
        }
    }
    format!("[{}] TJ\n", parts.join(" "))
}

fn decode_image_bytes(data: &[u8]) -> Option<ImageData> {
    let format = image::guess_format(data).ok()?;
    let decoded = image::load_from_memory(data).ok()?;
    let (width, height) = decoded.dimensions();

    if format == image::ImageFormat::Jpeg {
        let color_space = match decoded.color() {
            image::ColorType::L8 | image::ColorType::La8 => "/DeviceGray",
            _ => "/DeviceRGB",
        };
        return Some(ImageData {
            width,
            height,
            color_space,
            filter: Some("/DCTDecode"),
            data: data.to_vec(),
            alpha: None,
        });
    }

    let rgba = decoded.to_rgba8();
    let mut rgb = Vec::with_capacity((width * height * 3) as usize);
    let mut alpha = Vec::with_capacity((width * height) as usize);
    for pixel in rgba.pixels() {
        let [r, g, b, a] = pixel.0;
        rgb.extend_from_slice(&[r, g, b]);
        alpha.push(a);
    }
    let has_alpha = alpha.iter().any(|a| *a != 255);
    Some(ImageData {
        width,
        height,
        color_space: "/DeviceRGB",
        filter: None,
        data: rgb,
        alpha: has_alpha.then_some(alpha),
    })
}

fn image_filters(filter: Option<&str>) -> String {
    match filter {
        Some(filter) => format!("[/ASCIIHexDecode {filter}]"),
        None => "/ASCIIHexDecode".to_string(),
    }
}

fn image_object(image: &ImageData, smask_id: Option<usize>) -> String {
    let stream_data = encode_stream_data(&image.data);
    let smask = smask_id
        .map(|id| format!(" /SMask {id} 0 R"))
        .unwrap_or_default();
    format!(
        "<< /Type /XObject /Subtype /Image /Width {} /Height {} /ColorSpace {} /BitsPerComponent 8 /Length {} /Filter {}{} >>\nstream\n{}\nendstream",
        image.width,
        image.height,
        image.color_space,
        stream_data.len(),
        image_filters(image.filter),
        smask,
        stream_data
    )
}

fn image_smask_object(image: &ImageData, alpha: &[u8]) -> String {
    let stream_data = encode_stream_data(alpha);
    format!(
        "<< /Type /XObject /Subtype /Image /Width {} /Height {} /ColorSpace /DeviceGray /BitsPerComponent 8 /Length {} /Filter /ASCIIHexDecode >>\nstream\n{}\nendstream",
        image.width,
        image.height,
        stream_data.len(),
        stream_data
    )
}

fn encode_stream_data(data: &[u8]) -> String {
    let mut hex = ascii_hex_encode(data);
    hex.push('>');
    hex
}

fn ascii_hex_encode(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 2 + data.len() / 32);
    for (index, byte) in data.iter().enumerate() {
        use std::fmt::Write;
        let _ = write!(&mut out, "{byte:02X}");
        if index % 32 == 31 {
            out.push('\n');
        }
    }
    out
}

fn font_object(name: &str) -> String {
    format!(
        "<< /Type /Font /Subtype /Type1 /BaseFont /{} /Encoding /WinAnsiEncoding >>",
        sanitize_font_name(name)
    )
}

fn font_descriptor_object(font: &RegisteredFont, font_file_id: usize) -> String {
    let metrics = &font.metrics;
    let mut flags = 32;
    if metrics.is_fixed_pitch {
        flags |= 1;
    }
    format!(
        "<< /Type /FontDescriptor /FontName /{} /Flags {} /FontBBox [{} {} {} {}] /ItalicAngle {} /Ascent {} /Descent {} /CapHeight {} /StemV {} /MissingWidth {} /FontFile2 {} 0 R >>",
        sanitize_font_name(&font.name),
        flags,
        metrics.bbox.0,
        metrics.bbox.1,
        metrics.bbox.2,
        metrics.bbox.3,
        metrics.italic_angle,
        metrics.ascent,
        metrics.descent,
        metrics.cap_height,
        metrics.stem_v,
        metrics.missing_width,
        font_file_id
    )
}

fn font_file_object(data: &[u8]) -> String {
    let stream_data = encode_stream_data(data);
    format!(
        "<< /Length {} /Length1 {} /Filter /ASCIIHexDecode >>\nstream\n{}\nendstream",
        stream_data.len(),
        data.len(),
        stream_data
    )
}

fn resource_dict(entries: &[(String, usize)]) -> String {
    let entries: Vec<String> = entries
        .iter()
        .map(|(name, id)| format!("/{name} {id} 0 R"))
        .collect();
    format!("<< {} >>", entries.join(" "))
}

fn sanitize_font_name(name: &str) -> String {
    let mut out = String::new();
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() || ch == '-' {
            out.push(ch);
        } else if ch == ' ' {
            out.push('-');
        }
    }
    if out.is_empty() {
        "Helvetica".to_string()
    } else {
        out
    }
}

fn media_box(size: Size) -> String {
    format!("[0 0 {} {}]", fmt_pt(size.width), fmt_pt(size.height))
}

fn stream_object(content: &str) -> String {
    format!(
        "<< /Length {} >>\nstream\n{}\nendstream",
        content.len(),
        content
    )
}

fn info_object(options: &PdfOptions) -> String {
    let mut entries = vec![format!("/Producer ({})", escape_pdf_string(&options.producer))];
    if let Some(title) = options.title.as_deref() {
        entries.push(format!("/Title {}", pdf_text_string(title)));
    }
    if let Some(date) = options.creation_date {
        entries.push(format!("/CreationDate ({})", date.format("D:%Y%m%d%H%M%SZ")));
    }
    format!("<< {} >>", entries.join(" "))
}

/// First 32 hex digits of the digest, uppercased.
fn pdf_file_id(digest: &str) -> String {
    digest
        .chars()
        .filter(|ch| ch.is_ascii_hexdigit())
        .take(32)
        .collect::<String>()
        .to_uppercase()
}

fn write_pdf_object<W: Write>(
    writer: &mut W,
    offset: &mut usize,
    offsets: &mut [usize],
    obj_id: usize,
    body: &str,
) -> io::Result<()> {
    if let Some(slot) = offsets.get_mut(obj_id) {
        *slot = *offset;
    }
    write_str(writer, &format!("{obj_id} 0 obj\n"), offset)?;
    write_bytes(writer, body.as_bytes(), offset)?;
    write_bytes(writer, b"\nendobj\n", offset)
}

fn write_bytes<W: Write>(writer: &mut W, data: &[u8], offset: &mut usize) -> io::Result<()> {
    writer.write_all(data)?;
    *offset += data.len();
    Ok(())
}

fn write_str<W: Write>(writer: &mut W, data: &str, offset: &mut usize) -> io::Result<()> {
    write_bytes(writer, data.as_bytes(), offset)
}

fn escape_pdf_string(input: &str) -> String {
    let mut out = String::new();
    for ch in input.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '(' => out.push_str("\\("),
            ')' => out.push_str("\\)"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(ch),
        }
    }
    out
}

/// Metadata strings: plain literal for ASCII, UTF-16BE hex with BOM otherwise.
fn pdf_text_string(input: &str) -> String {
    if input.is_ascii() {
        return format!("({})", escape_pdf_string(input));
    }
    let mut out = String::from("<FEFF");
    for unit in input.encode_utf16() {
        out.push_str(&format!("{unit:04X}"));
    }
    out.push('>');
    out
}

/// Literal string body in WinAnsi, plus how many characters became `?`.
fn encode_winansi_pdf_string(input: &str) -> (String, usize) {
    let mut out = String::new();
    let mut replaced = 0usize;
    for ch in input.chars() {
        let byte = match winansi_byte(ch) {
            Some(byte) => byte,
            None => {
                replaced += 1;
                b'?'
            }
        };
        match byte {
            b'\\' => out.push_str("\\\\"),
            b'(' => out.push_str("\\("),
            b')' => out.push_str("\\)"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b if !(0x20..0x7f).contains(&b) => out.push_str(&format!("\\{b:03o}")),
            b => out.push(b as char),
        }
    }
    (out, replaced)
}

fn to_unicode_cmap(glyph_map: &BTreeMap<u16, String>) -> String {
    let entries: Vec<(&u16, &String)> = glyph_map.iter().collect();
    let mut out = String::new();
    out.push_str("/CIDInit /ProcSet findresource begin\n12 dict begin\nbegincmap\n");
    out.push_str("/CIDSystemInfo << /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def\n");
    out.push_str("/CMapName /Adobe-Identity-UCS def\n/CMapType 2 def\n");
    out.push_str("1 begincodespacerange\n<0000> <FFFF>\nendcodespacerange\n");

    for chunk in entries.chunks(100) {
        out.push_str(&format!("{} beginbfchar\n", chunk.len()));
        for (gid, text) in chunk {
            let mut uni = String::new();
            for unit in text.encode_utf16() {
                uni.push_str(&format!("{unit:04X}"));
            }
            out.push_str(&format!("<{gid:04X}> <{uni}>\n"));
        }
        out.push_str("endbfchar\n");
    }

    out.push_str("endcmap\nCMapName currentdict /CMap defineresource pop\nend\nend\n");
    out
}

fn fmt(value: f32) -> String {
    if !value.is_finite() {
        return "0".to_string();
    }
    let fixed = I32F32::from_num(value);
    let milli: i64 = (fixed * I32F32::from_num(1000)).round().to_num();
    format_milli(milli)
}

fn format_milli(milli: i64) -> String {
    if milli == 0 {
        return "0".to_string();
    }
    let sign = if milli < 0 { "-" } else { "" };
    let abs = milli.abs();
    let int_part = abs / 1000;
    let frac_part = abs % 1000;
    if frac_part == 0 {
        return format!("{sign}{int_part}");
    }
    let frac = format!("{frac_part:03}");
    format!("{sign}{int_part}.{}", frac.trim_end_matches('0'))
}

fn fmt_pt(value: Pt) -> String {
    format_milli(value.to_milli_i64())
}

fn color_to_pdf_fill(color: Color) -> String {
    format!("{} {} {} rg\n", fmt(color.r), fmt(color.g), fmt(color.b))
}

fn color_to_pdf_stroke(color: Color) -> String {
    format!("{} {} {} RG\n", fmt(color.r), fmt(color.g), fmt(color.b))
}
