use crate::canvas::{Canvas, Document};
use crate::font::FontRegistry;
use crate::format::{
    Currency, ELLIPSIS, clean_text, currency_runs, format_date, format_quantity, short_reference,
    split_script_runs, truncate_chars,
};
use crate::i18n::{Labels, Language, status_label};
use crate::paginate::{self, LastPageRule, PageCapacity};
use crate::spec_format::format_specifications;
use crate::style::{Column, StyleSheet};
use crate::text::{FontRole, TextMeasure, TextRun};
use crate::types::{Color, Edge, Margins, Pt, Rect, Size, TextAlign};
use chrono::{DateTime, Duration, Utc};
use quotedoc_contract::{QuoteItem, QuoteRequest};
use serde::Deserialize;

/// Resource id under which the configured logo image is drawn.
pub const LOGO_RESOURCE: &str = "logo";

/// Company identity printed in the header and the branding block.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Brand {
    pub name: String,
    pub name_ar: Option<String>,
    pub contact: Option<String>,
    pub contact_ar: Option<String>,
}

impl Default for Brand {
    fn default() -> Self {
        Self {
            name: "Steel Products Co.".to_string(),
            name_ar: Some("شركة منتجات الحديد".to_string()),
            contact: None,
            contact_ar: None,
        }
    }
}

impl Brand {
    pub fn display_name(&self, lang: Language) -> &str {
        match lang {
            Language::Ar => self.name_ar.as_deref().unwrap_or(&self.name),
            Language::En => &self.name,
        }
    }

    pub fn contact_line(&self, lang: Language) -> Option<&str> {
        let line = match lang {
            Language::Ar => self.contact_ar.as_deref().or(self.contact.as_deref()),
            Language::En => self.contact.as_deref(),
        };
        line.filter(|line| !line.trim().is_empty())
    }

    fn initials(&self) -> String {
        let initials: String = self
            .name
            .split_whitespace()
            .filter_map(|word| word.chars().find(|ch| ch.is_alphanumeric()))
            .take(2)
            .collect();
        initials.to_uppercase()
    }
}

/// Everything the layout needs besides the quote itself.
pub struct LayoutContext<'a> {
    pub page_size: Size,
    pub margins: Margins,
    pub capacity: PageCapacity,
    pub last_page_rule: LastPageRule,
    pub brand: &'a Brand,
    pub currency: &'a Currency,
    pub styles: &'a StyleSheet,
    pub registry: &'a FontRegistry,
    pub logo: Option<&'a str>,
}

/// Lays out `quote` into per-page drawing commands.
///
/// Every page carries the header, the page marker, the item table and the
/// footer. The customer and quote boxes appear on the first page only; the
/// summary and notes blocks on pages the planner marks as last. A planned
/// page whose rows do not fit above the footer continues on extra sheets, so
/// every item is drawn exactly once inside the content area.
pub fn build_document(quote: &QuoteRequest, lang: Language, ctx: &LayoutContext<'_>) -> Document {
    let plan = paginate::plan_pages(&quote.items, ctx.capacity, ctx.last_page_rule);
    let writer = PageWriter {
        ctx,
        quote,
        lang,
        labels: lang.labels(),
        measure: TextMeasure::new(ctx.registry, &ctx.styles.fonts),
    };
    let content = ctx.margins.content_rect(ctx.page_size);
    let frame = writer.frame(content);
    let sheets = writer.sheets(&plan, &frame);
    let total = sheets.len();
    let mut canvas = Canvas::new(ctx.page_size);
    for (index, sheet) in sheets.iter().enumerate() {
        if index > 0 {
            canvas.show_page();
        }
        writer.sheet(&mut canvas, &frame, sheet, index, total);
    }
    canvas.finish()
}

/// Cells wrap to at most this many lines; the rest is elided.
const MAX_CELL_LINES: usize = 6;
/// Info box values longer than this are truncated.
const INFO_VALUE_LIMIT: usize = 80;
const HEADER_SLOT: i32 = 44;

/// Vertical bounds shared by every sheet.
struct Frame {
    content: Rect,
    /// Where the table starts on a sheet without info boxes.
    body_top: Pt,
    /// Lowest y the table or summary may reach; the footer sits below.
    body_bottom: Pt,
    info_height: Pt,
    row_lines: usize,
    notes_lines: usize,
}

/// One physical page. `items` is a slice of a planned page; a planned page
/// spills onto continuation sheets when its rows run out of room.
struct Sheet<'q> {
    plan_index: usize,
    items: &'q [QuoteItem],
    info_boxes: bool,
    table: bool,
    no_items: bool,
    summary: bool,
    continued: bool,
}

struct PageWriter<'a> {
    ctx: &'a LayoutContext<'a>,
    quote: &'a QuoteRequest,
    lang: Language,
    labels: &'static Labels,
    measure: TextMeasure<'a>,
}

struct SummaryRow {
    label: &'static str,
    value: Vec<TextRun>,
    emphasized: bool,
}

struct SummaryLayout {
    rows: Vec<SummaryRow>,
    notes: Option<Vec<Vec<TextRun>>>,
    notes_x: Pt,
    notes_width: Pt,
    summary_x: Pt,
    summary_width: Pt,
    height: Pt,
}

/// Whole lines of `line_height` that fit in `available`, at least one.
fn lines_within(available: Pt, line_height: Pt) -> usize {
    if line_height <= Pt::ZERO {
        return 1;
    }
    let lines = (available.to_f32() / line_height.to_f32()).floor();
    if lines < 1.0 { 1 } else { lines as usize }
}

/// Ends `line` with an ellipsis, dropping as many characters as it adds.
fn mark_elided(line: &mut [TextRun]) {
    if let Some(run) = line.iter_mut().rev().find(|run| !run.text.trim().is_empty()) {
        let text = run.text.trim_end();
        let keep = text.chars().count().saturating_sub(ELLIPSIS.len());
        run.text = text.chars().take(keep).collect::<String>() + ELLIPSIS;
    }
}

impl PageWriter<'_> {
    fn styles(&self) -> &StyleSheet {
        self.ctx.styles
    }

    fn rtl(&self) -> bool {
        self.styles().direction.is_rtl()
    }

    fn frame(&self, content: Rect) -> Frame {
        let styles = self.styles();
        let body_top = self.header_bottom(content);
        let body_bottom = self.footer_top(content) - styles.gap;
        let available = body_bottom - body_top;

        let pad = styles.cell_padding;
        let table_lines = lines_within(
            available - self.table_header_height() - pad * 2,
            self.line_height(styles.sizes.table),
        );

        let box_pad = self.box_padding();
        let notes_lines = lines_within(
            available - box_pad * 2 - self.line_height(styles.sizes.heading) - Pt::from_i32(4),
            self.line_height(styles.sizes.body),
        );

        Frame {
            content,
            body_top,
            body_bottom,
            info_height: self.info_layout(content).2,
            row_lines: table_lines.min(MAX_CELL_LINES),
            notes_lines,
        }
    }

    fn sheets<'q>(&self, plan: &[paginate::Page<'q, QuoteItem>], frame: &Frame) -> Vec<Sheet<'q>> {
        let gap = self.styles().gap;
        let columns = self.styles().column_widths(frame.content.width);
        let summary_height = self.summary_layout(frame).height;
        let mut sheets = Vec::new();

        for page in plan {
            let items: &'q [QuoteItem] = page.items;
            let mut start = 0;
            let mut continued = false;
            loop {
                let info_boxes = page.is_first && !continued;
                let mut cursor = frame.body_top + self.table_header_height();
                if info_boxes {
                    cursor += frame.info_height + gap;
                }
                if items.is_empty() {
                    cursor += self.empty_table_height(frame.content);
                }
                let mut end = start;
                while end < items.len() {
                    let (_, height) = self.row_cells(&items[end], &columns, frame.row_lines);
                    // A sheet without info boxes always takes at least one row.
                    let forced = end == start && !info_boxes;
                    if cursor + height > frame.body_bottom && !forced {
                        break;
                    }
                    cursor += height;
                    end += 1;
                }

                let done = end == items.len();
                let summary_fits = cursor + gap + summary_height <= frame.body_bottom;
                sheets.push(Sheet {
                    plan_index: page.index,
                    items: &items[start..end],
                    info_boxes,
                    table: true,
                    no_items: items.is_empty(),
                    summary: done && page.is_last && summary_fits,
                    continued,
                });
                if done {
                    if page.is_last && !summary_fits {
                        sheets.push(Sheet {
                            plan_index: page.index,
                            items: &items[end..],
                            info_boxes: false,
                            table: false,
                            no_items: false,
                            summary: true,
                            continued: true,
                        });
                    }
                    break;
                }
                start = end;
                continued = true;
            }
        }

        if sheets.len() > plan.len() {
            tracing::debug!(
                planned = plan.len(),
                sheets = sheets.len(),
                "item rows continued onto extra sheets"
            );
        }
        sheets
    }

    fn sheet(&self, canvas: &mut Canvas, frame: &Frame, sheet: &Sheet<'_>, index: usize, total: usize) {
        canvas.meta("page.index", index.to_string());
        canvas.meta("page.plan", sheet.plan_index.to_string());
        if sheet.info_boxes {
            canvas.meta("page.first", "true");
        }
        if sheet.summary {
            canvas.meta("page.last", "true");
        }
        if sheet.continued {
            canvas.meta("page.continued", "true");
        }
        let content = frame.content;
        let gap = self.styles().gap;

        let mut y = self.header(canvas, content, index + 1, total);
        if sheet.info_boxes {
            y = self.info_boxes(canvas, content, y) + gap;
        }
        if sheet.table {
            y = self.table(canvas, frame, y, sheet.items, sheet.no_items) + gap;
        }
        if sheet.summary {
            self.summary_and_notes(canvas, frame, y);
        }
        self.footer(canvas, content);
    }

    fn text(&self, text: &str, bold: bool) -> Vec<TextRun> {
        split_script_runs(&clean_text(text, self.lang), bold)
    }

    fn line_height(&self, size: Pt) -> Pt {
        self.measure.line_height(size)
    }

    fn runs_height(&self, runs: &[TextRun], width: Pt, size: Pt) -> Pt {
        let lines = self.measure.wrap(runs, width, size).len() as i32;
        self.line_height(size) * lines
    }

    /// Wraps `runs`, keeping at most `max_lines` lines. The last kept line
    /// ends with an ellipsis when something was cut.
    fn capped_lines(
        &self,
        runs: &[TextRun],
        width: Pt,
        size: Pt,
        max_lines: usize,
    ) -> Vec<Vec<TextRun>> {
        let mut lines = self.measure.wrap(runs, width, size);
        if lines.len() > max_lines {
            lines.truncate(max_lines.max(1));
            if let Some(last) = lines.last_mut() {
                mark_elided(last);
            }
        }
        lines
    }

    /// Wraps and draws `runs`; returns the height used.
    #[allow(clippy::too_many_arguments)]
    fn draw_runs(
        &self,
        canvas: &mut Canvas,
        runs: &[TextRun],
        x: Pt,
        width: Pt,
        y: Pt,
        size: Pt,
        align: TextAlign,
        color: Color,
    ) -> Pt {
        let lines = self.measure.wrap(runs, width, size);
        self.draw_lines(canvas, &lines, x, width, y, size, align, color)
    }

    #[allow(clippy::too_many_arguments)]
    fn draw_lines(
        &self,
        canvas: &mut Canvas,
        lines: &[Vec<TextRun>],
        x: Pt,
        width: Pt,
        y: Pt,
        size: Pt,
        align: TextAlign,
        color: Color,
    ) -> Pt {
        canvas.set_fill_color(color);
        let line_height = self.line_height(size);
        let mut cursor = y;
        for line in lines {
            self.measure.draw_line(
                canvas,
                line,
                x,
                width,
                cursor,
                size,
                align,
                self.styles().direction,
            );
            cursor += line_height;
        }
        cursor - y
    }

    /// Bottom edge of the header block, where sheet content starts.
    fn header_bottom(&self, content: Rect) -> Pt {
        let title = self.text(self.labels.document_title, true);
        let title_height = self.runs_height(&title, content.width, self.styles().sizes.title);
        content.y + Pt::from_i32(HEADER_SLOT + 6 + 8) + title_height + Pt::from_i32(6)
    }

    fn header(&self, canvas: &mut Canvas, content: Rect, page_number: usize, total: usize) -> Pt {
        let styles = self.styles();
        let palette = styles.palette;
        let sizes = styles.sizes;
        canvas.meta("block", "header");

        let slot = Pt::from_i32(HEADER_SLOT);
        let top = content.y;
        let (lead_x, trail_x) = if self.rtl() {
            (content.right() - slot, content.x)
        } else {
            (content.x, content.right() - slot)
        };
        match self.ctx.logo {
            Some(resource) => {
                canvas.save_state();
                canvas.clip_rect(lead_x, top, slot, slot);
                canvas.draw_image(lead_x, top, slot, slot, resource);
                canvas.restore_state();
            }
            None => {
                self.logo_placeholder(canvas, lead_x, top, slot);
                self.logo_placeholder(canvas, trail_x, top, slot);
            }
        }

        let name_x = content.x + slot + styles.gap;
        let name_width = content.width - (slot + styles.gap) * 2;
        let name_runs = self.text(self.ctx.brand.display_name(self.lang), true);
        let mut y = top + Pt::from_i32(4);
        y += self.draw_runs(
            canvas,
            &name_runs,
            name_x,
            name_width,
            y,
            sizes.company,
            TextAlign::Center,
            palette.primary,
        );
        if let Some(contact) = self.ctx.brand.contact_line(self.lang) {
            let runs = self.text(contact, false);
            self.draw_runs(
                canvas,
                &runs,
                name_x,
                name_width,
                y,
                sizes.small,
                TextAlign::Center,
                palette.muted,
            );
        }

        let mut y = top + slot + Pt::from_i32(6);
        canvas.set_stroke_color(palette.primary);
        canvas.set_line_width(Pt::from_f32(1.5));
        canvas.line(content.x, y, content.right(), y);
        y += Pt::from_i32(8);

        let title = self.text(self.labels.document_title, true);
        self.draw_runs(
            canvas,
            &title,
            content.x,
            content.width,
            y,
            sizes.title,
            styles.text_align,
            palette.primary,
        );
        let marker = split_script_runs(&self.labels.page_marker(page_number, total), false);
        let marker_offset = self.line_height(sizes.title) - self.line_height(sizes.body);
        canvas.meta("page.marker", format!("{page_number}/{total}"));
        self.draw_runs(
            canvas,
            &marker,
            content.x,
            content.width,
            y + marker_offset,
            sizes.body,
            styles.trailing_align(),
            palette.muted,
        );
        self.header_bottom(content)
    }

    fn logo_placeholder(&self, canvas: &mut Canvas, x: Pt, y: Pt, size: Pt) {
        let palette = self.styles().palette;
        canvas.set_fill_color(palette.box_fill);
        canvas.set_stroke_color(palette.border);
        canvas.set_line_width(self.styles().border_width);
        canvas.draw_rect(x, y, size, size);
        canvas.fill_stroke();
        let initials = vec![TextRun::new(self.ctx.brand.initials(), FontRole::LatinBold)];
        let text_size = self.styles().sizes.heading;
        let text_y = y + (size - self.line_height(text_size)) / 2;
        self.draw_runs(
            canvas,
            &initials,
            x,
            size,
            text_y,
            text_size,
            TextAlign::Center,
            palette.primary,
        );
    }

    /// Customer rows, quote rows and the shared box height.
    fn info_layout(&self, content: Rect) -> (Vec<Vec<TextRun>>, Vec<Vec<TextRun>>, Pt) {
        let labels = self.labels;
        let quote = self.quote;
        let half = (content.width - self.styles().gap) / 2;

        let mut customer_rows = vec![
            (labels.name, quote.customer_name.clone()),
            (labels.email, quote.customer_email.clone()),
            (labels.phone, quote.customer_phone.clone()),
            (labels.company, quote.company_name.clone()),
        ];
        if quote.project_name.is_some() {
            customer_rows.push((labels.project, quote.project_name.clone()));
        }
        let customer_rows = self.value_rows(customer_rows);

        let validity = quote
            .response
            .as_ref()
            .and_then(|response| response.validity_days)
            .map(|days| format!("{days} {}", labels.days));
        let quote_rows = self.value_rows(vec![
            (labels.reference, Some(short_reference(&quote.id))),
            (
                labels.date,
                quote.document_date().map(|ts| format_date(ts, self.lang)),
            ),
            (
                labels.status,
                Some(status_label(quote.status, self.lang).to_string()),
            ),
            (labels.validity, validity),
        ]);

        let height = self
            .info_box_height(labels.customer_info, &customer_rows, half)
            .max(self.info_box_height(labels.quote_info, &quote_rows, half));
        (customer_rows, quote_rows, height)
    }

    fn info_boxes(&self, canvas: &mut Canvas, content: Rect, y: Pt) -> Pt {
        let gap = self.styles().gap;
        let half = (content.width - gap) / 2;
        let (customer_x, quote_x) = if self.rtl() {
            (content.x + half + gap, content.x)
        } else {
            (content.x, content.x + half + gap)
        };
        let (customer_rows, quote_rows, height) = self.info_layout(content);
        self.info_box(
            canvas,
            "customer-info",
            self.labels.customer_info,
            &customer_rows,
            Rect::new(customer_x, y, half, height),
        );
        self.info_box(
            canvas,
            "quote-info",
            self.labels.quote_info,
            &quote_rows,
            Rect::new(quote_x, y, half, height),
        );
        y + height
    }

    fn value_rows(&self, rows: Vec<(&'static str, Option<String>)>) -> Vec<Vec<TextRun>> {
        rows.into_iter()
            .map(|(label, value)| {
                let value = value
                    .map(|value| truncate_chars(&clean_text(&value, self.lang), INFO_VALUE_LIMIT))
                    .filter(|value| !value.is_empty())
                    .unwrap_or_else(|| self.labels.empty_value.to_string());
                let mut runs = split_script_runs(&format!("{label}: "), true);
                runs.extend(split_script_runs(&value, false));
                runs
            })
            .collect()
    }

    fn box_padding(&self) -> Pt {
        self.styles().padding + self.styles().accent_width
    }

    fn info_box_height(&self, heading: &str, rows: &[Vec<TextRun>], width: Pt) -> Pt {
        let sizes = self.styles().sizes;
        let inner = width - self.box_padding() * 2;
        let heading_runs = self.text(heading, true);
        let rows_height: Pt = rows
            .iter()
            .map(|row| self.runs_height(row, inner, sizes.body))
            .sum();
        self.box_padding() * 2
            + self.runs_height(&heading_runs, inner, sizes.heading)
            + Pt::from_i32(4)
            + rows_height
    }

    fn accent_box(&self, canvas: &mut Canvas, rect: Rect) {
        let styles = self.styles();
        canvas.fill_rect(rect.x, rect.y, rect.width, rect.height, styles.palette.box_fill);
        let bar_x = match styles.accent_edge {
            Edge::Left => rect.x,
            Edge::Right => rect.right() - styles.accent_width,
        };
        canvas.fill_rect(bar_x, rect.y, styles.accent_width, rect.height, styles.palette.accent);
    }

    fn info_box(
        &self,
        canvas: &mut Canvas,
        block: &str,
        heading: &str,
        rows: &[Vec<TextRun>],
        rect: Rect,
    ) {
        let styles = self.styles();
        canvas.meta("block", block);
        self.accent_box(canvas, rect);
        let pad = self.box_padding();
        let inner = rect.inset(pad, pad);
        let mut y = inner.y;
        let heading_runs = self.text(heading, true);
        y += self.draw_runs(
            canvas,
            &heading_runs,
            inner.x,
            inner.width,
            y,
            styles.sizes.heading,
            styles.text_align,
            styles.palette.primary,
        );
        y += Pt::from_i32(4);
        for row in rows {
            y += self.draw_runs(
                canvas,
                row,
                inner.x,
                inner.width,
                y,
                styles.sizes.body,
                styles.text_align,
                styles.palette.text,
            );
        }
    }

    fn cell_runs(&self, item: &QuoteItem, column: Column) -> Vec<TextRun> {
        let labels = self.labels;
        match column {
            Column::Product => {
                let name = match &item.product {
                    Some(product) => match (self.lang, product.name_ar.as_deref()) {
                        (Language::Ar, Some(name_ar)) if !name_ar.trim().is_empty() => name_ar,
                        _ => product.name.as_str(),
                    },
                    None => labels.unknown_product,
                };
                let mut runs = self.text(name, true);
                if let Some(notes) = item.notes.as_deref() {
                    let notes = clean_text(notes, self.lang);
                    if !notes.is_empty() {
                        runs.push(TextRun::new("\n", FontRole::Latin));
                        runs.extend(split_script_runs(
                            &format!("{} {notes}", labels.item_note),
                            false,
                        ));
                    }
                }
                runs
            }
            Column::Specifications => {
                format_specifications(&item.specifications, self.lang, item.product.as_ref())
                    .runs()
            }
            Column::Quantity => vec![TextRun::new(
                format_quantity(item.quantity),
                FontRole::Latin,
            )],
            Column::UnitPrice => self.amount_runs(item.unit_price, false),
            Column::Total => self.amount_runs(item.total_price, true),
        }
        .into_iter()
        .filter(|run| !run.text.is_empty())
        .collect()
    }

    fn amount_runs(&self, amount: Option<f64>, bold: bool) -> Vec<TextRun> {
        match amount {
            Some(amount) => currency_runs(amount, self.lang, self.ctx.currency, bold),
            None => split_script_runs(self.labels.to_be_priced, false),
        }
    }

    fn table_header_height(&self) -> Pt {
        self.line_height(self.styles().sizes.table) + self.styles().cell_padding * 2
    }

    fn no_items_runs(&self) -> Vec<TextRun> {
        self.text(self.labels.no_items, false)
    }

    fn empty_table_height(&self, content: Rect) -> Pt {
        let styles = self.styles();
        let pad = styles.cell_padding;
        self.runs_height(&self.no_items_runs(), content.width - pad * 2, styles.sizes.table)
            + pad * 2
    }

    /// Wrapped cells of one item row and the row height.
    fn row_cells(
        &self,
        item: &QuoteItem,
        columns: &[(Column, Pt)],
        max_lines: usize,
    ) -> (Vec<(Column, Pt, Vec<Vec<TextRun>>)>, Pt) {
        let styles = self.styles();
        let size = styles.sizes.table;
        let pad = styles.cell_padding;
        let cells: Vec<(Column, Pt, Vec<Vec<TextRun>>)> = columns
            .iter()
            .map(|(column, width)| {
                let runs = self.cell_runs(item, *column);
                let lines = self.capped_lines(&runs, *width - pad * 2, size, max_lines);
                (*column, *width, lines)
            })
            .collect();
        let lines = cells
            .iter()
            .map(|(_, _, lines)| lines.len())
            .max()
            .unwrap_or(1)
            .max(1);
        let height = self.line_height(size) * lines as i32 + pad * 2;
        (cells, height)
    }

    fn table(
        &self,
        canvas: &mut Canvas,
        frame: &Frame,
        y: Pt,
        items: &[QuoteItem],
        no_items: bool,
    ) -> Pt {
        let styles = self.styles();
        let palette = styles.palette;
        let size = styles.sizes.table;
        let pad = styles.cell_padding;
        let content = frame.content;
        let columns = styles.column_widths(content.width);

        canvas.meta("block", "table");
        canvas.meta("table.columns", styles.column_keys());
        canvas.meta("table.rows", items.len().to_string());

        let header_height = self.table_header_height();
        canvas.fill_rect(content.x, y, content.width, header_height, palette.primary);
        let mut x = content.x;
        for (column, width) in &columns {
            let runs = self.text(column.label(self.labels), true);
            let lines = self.measure.wrap(&runs, *width - pad * 2, size);
            if let Some(first) = lines.first() {
                canvas.set_fill_color(palette.header_text);
                self.measure.draw_line(
                    canvas,
                    first,
                    x + pad,
                    *width - pad * 2,
                    y + pad,
                    size,
                    styles.cell_align(*column),
                    styles.direction,
                );
            }
            x += *width;
        }
        let mut y = y + header_height;

        if no_items {
            self.draw_runs(
                canvas,
                &self.no_items_runs(),
                content.x + pad,
                content.width - pad * 2,
                y + pad,
                size,
                TextAlign::Center,
                palette.muted,
            );
            y += self.empty_table_height(content);
            self.row_rule(canvas, content, y);
            return y;
        }

        for (row_index, item) in items.iter().enumerate() {
            let (cells, row_height) = self.row_cells(item, &columns, frame.row_lines);
            if row_index % 2 == 1 {
                canvas.fill_rect(content.x, y, content.width, row_height, palette.row_alt);
            }
            let mut x = content.x;
            for (column, width, lines) in &cells {
                self.draw_lines(
                    canvas,
                    lines,
                    x + pad,
                    *width - pad * 2,
                    y + pad,
                    size,
                    styles.cell_align(*column),
                    palette.text,
                );
                x += *width;
            }
            y += row_height;
            self.row_rule(canvas, content, y);
        }
        y
    }

    fn row_rule(&self, canvas: &mut Canvas, content: Rect, y: Pt) {
        canvas.set_stroke_color(self.styles().palette.border);
        canvas.set_line_width(self.styles().border_width);
        canvas.line(content.x, y, content.right(), y);
    }

    fn summary_rows(&self) -> Vec<SummaryRow> {
        let labels = self.labels;
        let response = self.quote.response.as_ref();
        let known_totals: Vec<f64> = self
            .quote
            .items
            .iter()
            .filter_map(|item| item.total_price)
            .collect();
        let subtotal = (!known_totals.is_empty()).then(|| known_totals.iter().sum::<f64>());
        let total = response.and_then(|r| r.total_amount).or(subtotal);
        let validity_days = response.and_then(|r| r.validity_days);
        let expires = response
            .and_then(|r| r.expires_at)
            .or_else(|| expiry_from_validity(self.quote.quoted_at, validity_days));

        let text_or_empty = |value: Option<String>| {
            split_script_runs(
                &value.unwrap_or_else(|| labels.empty_value.to_string()),
                false,
            )
        };
        vec![
            SummaryRow {
                label: labels.subtotal,
                value: self.amount_runs(subtotal, false),
                emphasized: false,
            },
            SummaryRow {
                label: labels.validity,
                value: text_or_empty(validity_days.map(|days| format!("{days} {}", labels.days))),
                emphasized: false,
            },
            SummaryRow {
                label: labels.valid_until,
                value: text_or_empty(expires.map(|ts| format_date(ts, self.lang))),
                emphasized: false,
            },
            SummaryRow {
                label: labels.total,
                value: self.amount_runs(total, true),
                emphasized: true,
            },
        ]
    }

    fn summary_layout(&self, frame: &Frame) -> SummaryLayout {
        let styles = self.styles();
        let sizes = styles.sizes;
        let gap = styles.gap;
        let content = frame.content;
        let notes_width = content.width.percent(55) - gap / 2;
        let summary_width = content.width - notes_width - gap;
        let (notes_x, summary_x) = if self.rtl() {
            (content.right() - notes_width, content.x)
        } else {
            (content.x, content.x + notes_width + gap)
        };
        let pad = self.box_padding();
        let boxed = pad * 2 + self.line_height(sizes.heading) + Pt::from_i32(4);

        let rows = self.summary_rows();
        let body_line = self.line_height(sizes.body);
        let summary_height = boxed + (body_line + Pt::from_i32(3)) * rows.len() as i32;

        let notes = self
            .quote
            .response_notes()
            .map(|notes| clean_text(notes, self.lang))
            .filter(|notes| !notes.is_empty())
            .map(|notes| {
                let runs = split_script_runs(&notes, false);
                self.capped_lines(&runs, notes_width - pad * 2, sizes.body, frame.notes_lines)
            });
        let notes_height = match &notes {
            Some(lines) => boxed + body_line * lines.len() as i32,
            None => Pt::ZERO,
        };

        SummaryLayout {
            rows,
            notes,
            notes_x,
            notes_width,
            summary_x,
            summary_width,
            height: summary_height.max(notes_height),
        }
    }

    fn summary_and_notes(&self, canvas: &mut Canvas, frame: &Frame, y: Pt) {
        let layout = self.summary_layout(frame);
        self.summary_box(
            canvas,
            &layout.rows,
            Rect::new(layout.summary_x, y, layout.summary_width, layout.height),
        );
        let notes_rect = Rect::new(layout.notes_x, y, layout.notes_width, layout.height);
        match &layout.notes {
            Some(lines) => self.notes_box(canvas, lines, notes_rect),
            None => self.branding_box(canvas, notes_rect),
        }
    }

    fn summary_box(&self, canvas: &mut Canvas, rows: &[SummaryRow], rect: Rect) {
        let styles = self.styles();
        let palette = styles.palette;
        let sizes = styles.sizes;
        canvas.meta("block", "summary");
        self.accent_box(canvas, rect);
        let pad = self.box_padding();
        let inner = rect.inset(pad, pad);
        let mut y = inner.y;
        let heading = self.text(self.labels.summary, true);
        y += self.draw_runs(
            canvas,
            &heading,
            inner.x,
            inner.width,
            y,
            sizes.heading,
            styles.text_align,
            palette.primary,
        );
        y += Pt::from_i32(4);
        let line = self.line_height(sizes.body);
        for row in rows {
            let color = if row.emphasized {
                canvas.set_stroke_color(palette.border);
                canvas.set_line_width(styles.border_width);
                canvas.line(inner.x, y, inner.right(), y);
                palette.primary
            } else {
                palette.text
            };
            let label = self.text(row.label, row.emphasized);
            canvas.set_fill_color(color);
            self.measure.draw_line(
                canvas,
                &label,
                inner.x,
                inner.width,
                y + Pt::from_f32(1.5),
                sizes.body,
                styles.text_align,
                styles.direction,
            );
            self.measure.draw_line(
                canvas,
                &row.value,
                inner.x,
                inner.width,
                y + Pt::from_f32(1.5),
                sizes.body,
                styles.trailing_align(),
                styles.direction,
            );
            y += line + Pt::from_i32(3);
        }
    }

    fn notes_box(&self, canvas: &mut Canvas, lines: &[Vec<TextRun>], rect: Rect) {
        let styles = self.styles();
        canvas.meta("block", "notes");
        self.accent_box(canvas, rect);
        let pad = self.box_padding();
        let inner = rect.inset(pad, pad);
        let heading = self.text(self.labels.notes, true);
        let mut y = inner.y;
        y += self.draw_runs(
            canvas,
            &heading,
            inner.x,
            inner.width,
            y,
            styles.sizes.heading,
            styles.text_align,
            styles.palette.primary,
        );
        y += Pt::from_i32(4);
        self.draw_lines(
            canvas,
            lines,
            inner.x,
            inner.width,
            y,
            styles.sizes.body,
            styles.text_align,
            styles.palette.text,
        );
    }

    fn branding_box(&self, canvas: &mut Canvas, rect: Rect) {
        let styles = self.styles();
        let palette = styles.palette;
        canvas.meta("block", "notes-branding");
        canvas.fill_rect(rect.x, rect.y, rect.width, rect.height, palette.primary);
        let inner = rect.inset(styles.padding, styles.padding);
        let name = self.text(self.ctx.brand.display_name(self.lang), true);
        let tagline = self.text(self.labels.branding_tagline, false);
        let content_height = self.runs_height(&name, inner.width, styles.sizes.heading)
            + self.runs_height(&tagline, inner.width, styles.sizes.body);
        let mut y = inner.y + ((inner.height - content_height) / 2).max(Pt::ZERO);
        y += self.draw_runs(
            canvas,
            &name,
            inner.x,
            inner.width,
            y,
            styles.sizes.heading,
            TextAlign::Center,
            palette.header_text,
        );
        self.draw_runs(
            canvas,
            &tagline,
            inner.x,
            inner.width,
            y,
            styles.sizes.body,
            TextAlign::Center,
            palette.header_text,
        );
    }

    /// Y of the rule above the footer text.
    fn footer_top(&self, content: Rect) -> Pt {
        content.bottom() - self.footer_height(content) - Pt::from_i32(4)
    }

    fn footer_height(&self, content: Rect) -> Pt {
        let runs = self.text(self.labels.footer, false);
        self.runs_height(&runs, content.width, self.styles().sizes.small)
    }

    fn footer(&self, canvas: &mut Canvas, content: Rect) {
        let styles = self.styles();
        let runs = self.text(self.labels.footer, false);
        let y = content.bottom() - self.footer_height(content);
        canvas.meta("block", "footer");
        canvas.set_stroke_color(styles.palette.border);
        canvas.set_line_width(styles.border_width);
        let rule_y = self.footer_top(content);
        canvas.line(content.x, rule_y, content.right(), rule_y);
        self.draw_runs(
            canvas,
            &runs,
            content.x,
            content.width,
            y,
            styles.sizes.small,
            TextAlign::Center,
            styles.palette.muted,
        );
    }
}

fn expiry_from_validity(
    quoted_at: Option<DateTime<Utc>>,
    validity_days: Option<u32>,
) -> Option<DateTime<Utc>> {
    let quoted_at = quoted_at?;
    let days = validity_days?;
    quoted_at.checked_add_signed(Duration::days(days as i64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Command;
    use crate::i18n::Direction;
    use crate::style::styles_for;
    use crate::text::FontSet;
    use serde_json::json;

    fn quote(items: usize, notes: Option<&str>) -> QuoteRequest {
        let items: Vec<_> = (0..items)
            .map(|index| {
                json!({
                    "id": format!("item-{index}"),
                    "quantity": index + 1,
                    "unit_price": 10.0,
                    "total_price": 10.0 * (index + 1) as f64,
                    "specifications": { "thickness": 12, "grade": "S355" },
                    "products": { "id": index, "name": format!("Plate {index}"), "name_ar": "لوح" }
                })
            })
            .collect();
        serde_json::from_value(json!({
            "id": "3f2a9b1c-77aa-4d0e",
            "customer_name": "Acme Steel",
            "status": "quoted",
            "created_at": "2026-03-04T09:15:00Z",
            "quoted_at": "2026-03-05T09:15:00Z",
            "quote_items": items,
            "quote_responses": [{ "validity_days": 15, "notes": notes }]
        }))
        .expect("fixture parses")
    }

    fn render(quote: &QuoteRequest, lang: Language) -> Document {
        let registry = FontRegistry::default();
        let styles = styles_for(lang.direction(), FontSet::base14());
        let brand = Brand::default();
        let currency = Currency::default();
        let ctx = LayoutContext {
            page_size: Size::a4(),
            margins: Margins::all(36.0),
            capacity: PageCapacity::default(),
            last_page_rule: LastPageRule::Legacy,
            brand: &brand,
            currency: &currency,
            styles: &styles,
            registry: &registry,
            logo: None,
        };
        build_document(quote, lang, &ctx)
    }

    #[test]
    fn empty_quote_renders_one_complete_page() {
        let doc = render(&quote(0, None), Language::En);
        assert_eq!(doc.pages.len(), 1);
        let page = &doc.pages[0];
        for block in ["header", "customer-info", "quote-info", "table", "summary", "footer"] {
            assert!(page.has_meta("block", block), "missing {block}");
        }
        assert!(page.has_meta("table.rows", "0"));
        assert!(page.strings().any(|text| text.contains("No items")));
    }

    #[test]
    fn info_boxes_only_on_first_page_and_summary_on_last() {
        let doc = render(&quote(20, Some("Delivery in two weeks")), Language::En);
        assert_eq!(doc.pages.len(), 3);
        assert!(doc.pages[0].has_meta("block", "customer-info"));
        assert!(!doc.pages[1].has_meta("block", "customer-info"));
        assert!(!doc.pages[0].has_meta("block", "summary"));
        for page in &doc.pages {
            assert_eq!(
                page.has_meta("page.last", "true"),
                page.has_meta("block", "summary")
            );
            assert!(page.has_meta("block", "footer"));
        }
        assert!(doc.pages[2].has_meta("block", "notes"));
        assert!(doc.pages[0].has_meta("page.marker", "1/3"));
        let rows: usize = doc
            .pages
            .iter()
            .flat_map(|page| page.meta_values("table.rows"))
            .map(|rows| rows.parse::<usize>().unwrap())
            .sum();
        assert_eq!(rows, 20);
    }

    fn long_note_quote(items: usize) -> QuoteRequest {
        let note = "Cut to length with bevelled edges, mill certificate required, \
                    deliver to the north gate between seven and noon, \
                    stack on timber bearers and keep away from standing water, \
                    notify site office two days ahead of dispatch for crane booking";
        let items: Vec<_> = (0..items)
            .map(|index| {
                json!({
                    "id": format!("row-{index}"),
                    "quantity": 1,
                    "unit_price": 5.0,
                    "total_price": 5.0,
                    "notes": format!("{note} {note}"),
                    "products": { "id": index, "name": format!("Item-{index:02}") }
                })
            })
            .collect();
        serde_json::from_value(json!({
            "id": "77aa0000",
            "customer_name": "Acme Steel",
            "quote_items": items,
            "quote_responses": [{ "notes": "Long terms. ".repeat(200) }]
        }))
        .expect("fixture parses")
    }

    #[test]
    fn tall_rows_continue_on_extra_sheets_inside_the_content_area() {
        let quote = long_note_quote(8);
        let doc = render(&quote, Language::En);
        let content = Margins::all(36.0).content_rect(Size::a4());

        assert!(doc.pages.len() > 1);
        assert!(doc.pages.iter().any(|page| page.has_meta("page.continued", "true")));
        let total = doc.pages.len();
        assert!(doc.pages[0].has_meta("page.marker", &format!("1/{total}")));

        let mut size = Pt::from_i32(12);
        for page in &doc.pages {
            for command in &page.commands {
                match command {
                    Command::SetFontSize(next) => size = *next,
                    Command::DrawString { y, text, .. } => {
                        assert!(*y >= content.y, "{text:?} above the content area");
                        assert!(
                            *y + size.mul_ratio(125, 100) <= content.bottom(),
                            "{text:?} drawn at {} below {}",
                            y.to_f32(),
                            content.bottom().to_f32()
                        );
                    }
                    _ => {}
                }
            }
        }

        for index in 0..8 {
            let name = format!("Item-{index:02}");
            let drawn = doc
                .pages
                .iter()
                .flat_map(|page| page.strings())
                .filter(|text| text.contains(&name))
                .count();
            assert_eq!(drawn, 1, "{name}");
        }
        let rows: usize = doc
            .pages
            .iter()
            .flat_map(|page| page.meta_values("table.rows"))
            .map(|rows| rows.parse::<usize>().unwrap())
            .sum();
        assert_eq!(rows, 8);
        let summaries = doc
            .pages
            .iter()
            .filter(|page| page.has_meta("block", "summary"))
            .count();
        assert_eq!(summaries, 1);
        assert!(doc.pages.iter().any(|page| page.strings().any(|text| text.ends_with(ELLIPSIS))));
    }

    #[test]
    fn oversized_cells_are_elided() {
        let mut line = vec![
            TextRun::new("Plate", FontRole::LatinBold),
            TextRun::new("edges ", FontRole::Latin),
        ];
        mark_elided(&mut line);
        assert_eq!(line[1].text, "ed...");
        assert_eq!(lines_within(Pt::from_i32(100), Pt::from_i32(30)), 3);
        assert_eq!(lines_within(Pt::from_i32(10), Pt::from_i32(30)), 1);
    }

    #[test]
    fn arabic_layout_mirrors_columns_and_brands_empty_notes() {
        let doc = render(&quote(2, Some("  ")), Language::Ar);
        let page = &doc.pages[0];
        assert_eq!(Language::Ar.direction(), Direction::Rtl);
        assert!(page.has_meta(
            "table.columns",
            "total,unit_price,quantity,specifications,product"
        ));
        assert!(page.has_meta("block", "notes-branding"));
        assert!(!page.has_meta("block", "notes"));
        assert!(page.strings().any(|text| text.contains("صفحة")));
    }

    #[test]
    fn reference_row_prints_short_id_and_prices_use_ascii_digits() {
        let doc = render(&quote(1, None), Language::En);
        let page = &doc.pages[0];
        assert!(page.strings().any(|text| text.contains("3F2A9B1C")));
        assert!(page.strings().any(|text| text.contains("SAR 10.00")));
        assert!(!page.strings().any(|text| text.contains("TBD")));
    }

    #[test]
    fn logo_is_drawn_when_configured() {
        let registry = FontRegistry::default();
        let styles = styles_for(Direction::Ltr, FontSet::base14());
        let brand = Brand::default();
        let currency = Currency::default();
        let ctx = LayoutContext {
            page_size: Size::a4(),
            margins: Margins::all(36.0),
            capacity: PageCapacity::default(),
            last_page_rule: LastPageRule::Strict,
            brand: &brand,
            currency: &currency,
            styles: &styles,
            registry: &registry,
            logo: Some(LOGO_RESOURCE),
        };
        let doc = build_document(&quote(1, None), Language::En, &ctx);
        assert!(doc.pages[0].commands.iter().any(|command| matches!(
            command,
            Command::DrawImage { resource_id, .. } if resource_id == LOGO_RESOURCE
        )));
        assert!(doc.pages[0]
            .commands
            .iter()
            .any(|command| matches!(command, Command::ClipRect { .. })));
        assert_eq!(brand.initials(), "SP");
        assert_eq!(
            expiry_from_validity(quote(0, None).quoted_at, Some(15)).map(|ts| ts.to_rfc3339()),
            Some("2026-03-20T09:15:00+00:00".to_string())
        );
    }
}
