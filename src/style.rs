use crate::i18n::{Direction, Labels};
use crate::text::FontSet;
use crate::types::{Color, Edge, Pt, TextAlign};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Product,
    Specifications,
    Quantity,
    UnitPrice,
    Total,
}

/// Logical (LTR) column order.
pub const COLUMNS: [Column; 5] = [
    Column::Product,
    Column::Specifications,
    Column::Quantity,
    Column::UnitPrice,
    Column::Total,
];

impl Column {
    /// Share of the table width, in percent. The five columns sum to 100.
    pub fn percent(self) -> u32 {
        match self {
            Column::Product => 30,
            Column::Specifications => 28,
            Column::Quantity => 10,
            Column::UnitPrice => 16,
            Column::Total => 16,
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            Column::Product => "product",
            Column::Specifications => "specifications",
            Column::Quantity => "quantity",
            Column::UnitPrice => "unit_price",
            Column::Total => "total",
        }
    }

    pub fn label(self, labels: &Labels) -> &'static str {
        match self {
            Column::Product => labels.col_product,
            Column::Specifications => labels.col_specifications,
            Column::Quantity => labels.col_quantity,
            Column::UnitPrice => labels.col_unit_price,
            Column::Total => labels.col_total,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Palette {
    pub primary: Color,
    pub accent: Color,
    pub text: Color,
    pub muted: Color,
    pub border: Color,
    pub header_text: Color,
    pub box_fill: Color,
    pub row_alt: Color,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            primary: Color::rgb(0.118, 0.227, 0.541),
            accent: Color::rgb(0.961, 0.620, 0.043),
            text: Color::rgb(0.122, 0.161, 0.216),
            muted: Color::rgb(0.420, 0.447, 0.502),
            border: Color::rgb(0.820, 0.835, 0.859),
            header_text: Color::WHITE,
            box_fill: Color::rgb(0.973, 0.980, 0.988),
            row_alt: Color::rgb(0.953, 0.957, 0.965),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FontSizes {
    pub title: Pt,
    pub company: Pt,
    pub heading: Pt,
    pub body: Pt,
    pub table: Pt,
    pub small: Pt,
}

impl Default for FontSizes {
    fn default() -> Self {
        Self {
            title: Pt::from_i32(16),
            company: Pt::from_i32(14),
            heading: Pt::from_i32(11),
            body: Pt::from_i32(9),
            table: Pt::from_f32(8.5),
            small: Pt::from_i32(7),
        }
    }
}

/// Resolved, immutable styling for one direction. Built once per document.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleSheet {
    pub direction: Direction,
    pub fonts: FontSet,
    pub palette: Palette,
    pub sizes: FontSizes,
    pub text_align: TextAlign,
    pub accent_edge: Edge,
    pub columns: [Column; 5],
    pub padding: Pt,
    pub cell_padding: Pt,
    pub accent_width: Pt,
    pub gap: Pt,
    pub border_width: Pt,
}

pub fn styles_for(direction: Direction, fonts: FontSet) -> StyleSheet {
    let rtl = direction.is_rtl();
    let mut columns = COLUMNS;
    if rtl {
        columns.reverse();
    }
    StyleSheet {
        direction,
        fonts,
        palette: Palette::default(),
        sizes: FontSizes::default(),
        text_align: if rtl { TextAlign::Right } else { TextAlign::Left },
        accent_edge: if rtl { Edge::Right } else { Edge::Left },
        columns,
        padding: Pt::from_i32(8),
        cell_padding: Pt::from_i32(4),
        accent_width: Pt::from_i32(3),
        gap: Pt::from_i32(10),
        border_width: Pt::from_f32(0.5),
    }
}

impl StyleSheet {
    pub fn with_palette(mut self, palette: Palette) -> Self {
        self.palette = palette;
        self
    }

    /// Alignment of a table cell: text columns follow the reading direction,
    /// quantities are centered and amounts sit on the trailing edge.
    pub fn cell_align(&self, column: Column) -> TextAlign {
        match column {
            Column::Quantity => TextAlign::Center,
            Column::UnitPrice | Column::Total => self.trailing_align(),
            Column::Product | Column::Specifications => self.text_align,
        }
    }

    pub fn trailing_align(&self) -> TextAlign {
        match self.text_align {
            TextAlign::Left => TextAlign::Right,
            TextAlign::Right => TextAlign::Left,
            TextAlign::Center => TextAlign::Center,
        }
    }

    /// Column widths in drawing order (left to right).
    pub fn column_widths(&self, table_width: Pt) -> Vec<(Column, Pt)> {
        self.columns
            .iter()
            .map(|column| (*column, table_width.percent(column.percent())))
            .collect()
    }

    pub fn column_keys(&self) -> String {
        self.columns
            .iter()
            .map(|column| column.key())
            .collect::<Vec<_>>()
            .join(",")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_shares_sum_to_one_hundred() {
        assert_eq!(COLUMNS.iter().map(|c| c.percent()).sum::<u32>(), 100);
    }

    #[test]
    fn rtl_reverses_columns_and_mirrors_edges() {
        let ltr = styles_for(Direction::Ltr, FontSet::base14());
        let rtl = styles_for(Direction::Rtl, FontSet::base14());
        assert_eq!(ltr.column_keys(), "product,specifications,quantity,unit_price,total");
        assert_eq!(rtl.column_keys(), "total,unit_price,quantity,specifications,product");
        assert_eq!(ltr.accent_edge, Edge::Left);
        assert_eq!(rtl.accent_edge, Edge::Right);
        assert_eq!(rtl.text_align, TextAlign::Right);
        assert_eq!(rtl.cell_align(Column::Total), TextAlign::Left);
        assert_eq!(ltr.cell_align(Column::Quantity), TextAlign::Center);
    }

    #[test]
    fn widths_keep_proportions_in_both_directions() {
        let width = Pt::from_i32(500);
        let rtl = styles_for(Direction::Rtl, FontSet::base14()).column_widths(width);
        assert_eq!(rtl[0], (Column::Total, Pt::from_i32(80)));
        assert_eq!(rtl[4], (Column::Product, Pt::from_i32(150)));
        assert_eq!(rtl.iter().map(|(_, w)| *w).sum::<Pt>(), width);
    }
}
