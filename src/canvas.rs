use crate::types::{Color, Pt, Size};

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SaveState,
    RestoreState,
    // Non-rendered metadata marking layout blocks. Ignored by the PDF writer.
    Meta {
        key: String,
        value: String,
    },
    SetFillColor(Color),
    SetStrokeColor(Color),
    SetLineWidth(Pt),
    SetFontName(String),
    SetFontSize(Pt),
    ClipRect {
        x: Pt,
        y: Pt,
        width: Pt,
        height: Pt,
    },
    MoveTo {
        x: Pt,
        y: Pt,
    },
    LineTo {
        x: Pt,
        y: Pt,
    },
    Fill,
    Stroke,
    FillStroke,
    // (x, y) is the top-left of the line box; text is in logical order.
    DrawString {
        x: Pt,
        y: Pt,
        text: String,
    },
    DrawRect {
        x: Pt,
        y: Pt,
        width: Pt,
        height: Pt,
    },
    DrawImage {
        x: Pt,
        y: Pt,
        width: Pt,
        height: Pt,
        resource_id: String,
    },
}

#[derive(Debug, Clone, Default)]
pub struct Page {
    pub commands: Vec<Command>,
}

impl Page {
    /// Values of every `Meta` record with `key`, in drawing order.
    pub fn meta_values<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.commands.iter().filter_map(move |command| match command {
            Command::Meta { key: k, value } if k == key => Some(value.as_str()),
            _ => None,
        })
    }

    pub fn has_meta(&self, key: &str, value: &str) -> bool {
        self.meta_values(key).any(|v| v == value)
    }

    /// Every string drawn on the page, in drawing order.
    pub fn strings(&self) -> impl Iterator<Item = &str> {
        self.commands.iter().filter_map(|command| match command {
            Command::DrawString { text, .. } => Some(text.as_str()),
            _ => None,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Document {
    pub page_size: Size,
    pub pages: Vec<Page>,
}

#[derive(Debug, Clone)]
struct GraphicsState {
    fill_color: Color,
    stroke_color: Color,
    line_width: Pt,
    font_size: Pt,
    font_name: String,
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self {
            fill_color: Color::BLACK,
            stroke_color: Color::BLACK,
            line_width: Pt::from_f32(1.0),
            font_size: Pt::from_f32(12.0),
            font_name: "Helvetica".to_string(),
        }
    }
}

/// Records drawing commands page by page. State setters drop no-op changes
/// so the emitted content streams stay small.
pub struct Canvas {
    page_size: Size,
    pages: Vec<Page>,
    current: Page,
    state_stack: Vec<GraphicsState>,
    current_state: GraphicsState,
}

impl Canvas {
    pub fn new(page_size: Size) -> Self {
        Self {
            page_size,
            pages: Vec::new(),
            current: Page::default(),
            state_stack: Vec::new(),
            current_state: GraphicsState::default(),
        }
    }

    pub fn page_size(&self) -> Size {
        self.page_size
    }

    pub fn save_state(&mut self) {
        self.state_stack.push(self.current_state.clone());
        self.current.commands.push(Command::SaveState);
    }

    pub fn restore_state(&mut self) {
        if let Some(state) = self.state_stack.pop() {
            self.current_state = state;
            self.current.commands.push(Command::RestoreState);
        }
    }

    pub fn meta(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.current.commands.push(Command::Meta {
            key: key.into(),
            value: value.into(),
        });
    }

    pub fn set_fill_color(&mut self, color: Color) {
        if self.current_state.fill_color == color {
            return;
        }
        self.current_state.fill_color = color;
        self.current.commands.push(Command::SetFillColor(color));
    }

    pub fn set_stroke_color(&mut self, color: Color) {
        if self.current_state.stroke_color == color {
            return;
        }
        self.current_state.stroke_color = color;
        self.current.commands.push(Command::SetStrokeColor(color));
    }

    pub fn set_line_width(&mut self, width: Pt) {
        let width = width.max(Pt::ZERO);
        if self.current_state.line_width == width {
            return;
        }
        self.current_state.line_width = width;
        self.current.commands.push(Command::SetLineWidth(width));
    }

    pub fn set_font_name(&mut self, name: &str) {
        if self.current_state.font_name == name {
            return;
        }
        self.current_state.font_name = name.to_string();
        self.current
            .commands
            .push(Command::SetFontName(self.current_state.font_name.clone()));
    }

    pub fn set_font_size(&mut self, size: Pt) {
        if self.current_state.font_size == size {
            return;
        }
        self.current_state.font_size = size;
        self.current.commands.push(Command::SetFontSize(size));
    }

    pub fn clip_rect(&mut self, x: Pt, y: Pt, width: Pt, height: Pt) {
        self.current.commands.push(Command::ClipRect {
            x,
            y,
            width,
            height,
        });
    }

    pub fn line(&mut self, x1: Pt, y1: Pt, x2: Pt, y2: Pt) {
        self.current.commands.push(Command::MoveTo { x: x1, y: y1 });
        self.current.commands.push(Command::LineTo { x: x2, y: y2 });
        self.current.commands.push(Command::Stroke);
    }

    pub fn draw_rect(&mut self, x: Pt, y: Pt, width: Pt, height: Pt) {
        self.current.commands.push(Command::DrawRect {
            x,
            y,
            width,
            height,
        });
    }

    pub fn fill(&mut self) {
        self.current.commands.push(Command::Fill);
    }

    pub fn fill_stroke(&mut self) {
        self.current.commands.push(Command::FillStroke);
    }

    pub fn fill_rect(&mut self, x: Pt, y: Pt, width: Pt, height: Pt, color: Color) {
        self.set_fill_color(color);
        self.draw_rect(x, y, width, height);
        self.fill();
    }

    pub fn draw_string(&mut self, x: Pt, y: Pt, text: impl Into<String>) {
        let text = text.into();
        if text.is_empty() {
            return;
        }
        self.current
            .commands
            .push(Command::DrawString { x, y, text });
    }

    pub fn draw_image(
        &mut self,
        x: Pt,
        y: Pt,
        width: Pt,
        height: Pt,
        resource_id: impl Into<String>,
    ) {
        self.current.commands.push(Command::DrawImage {
            x,
            y,
            width,
            height,
            resource_id: resource_id.into(),
        });
    }

    pub fn show_page(&mut self) {
        let current = std::mem::take(&mut self.current);
        self.pages.push(current);
        self.state_stack.clear();
        self.current_state = GraphicsState::default();
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn finish(mut self) -> Document {
        if !self.current.commands.is_empty() || self.pages.is_empty() {
            self.show_page();
        }
        Document {
            page_size: self.page_size,
            pages: self.pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redundant_state_changes_are_elided() {
        let mut canvas = Canvas::new(Size::a4());
        canvas.set_fill_color(Color::BLACK);
        canvas.set_font_name("Helvetica");
        canvas.set_font_size(Pt::from_i32(12));
        canvas.set_font_size(Pt::from_i32(9));
        canvas.set_font_size(Pt::from_i32(9));
        let doc = canvas.finish();
        assert_eq!(doc.pages.len(), 1);
        assert_eq!(doc.pages[0].commands, vec![Command::SetFontSize(Pt::from_i32(9))]);
    }

    #[test]
    fn restore_reverts_tracked_state() {
        let mut canvas = Canvas::new(Size::a4());
        canvas.save_state();
        canvas.set_fill_color(Color::WHITE);
        canvas.restore_state();
        canvas.set_fill_color(Color::BLACK);
        let doc = canvas.finish();
        assert_eq!(
            doc.pages[0].commands,
            vec![
                Command::SaveState,
                Command::SetFillColor(Color::WHITE),
                Command::RestoreState
            ]
        );
    }

    #[test]
    fn meta_records_are_queryable_per_page() {
        let mut canvas = Canvas::new(Size::a4());
        canvas.meta("block", "header");
        canvas.draw_string(Pt::ZERO, Pt::ZERO, "Quote");
        canvas.draw_string(Pt::ZERO, Pt::ZERO, "");
        canvas.show_page();
        canvas.meta("block", "summary");
        let doc = canvas.finish();
        assert_eq!(doc.pages.len(), 2);
        assert!(doc.pages[0].has_meta("block", "header"));
        assert!(!doc.pages[0].has_meta("block", "summary"));
        assert_eq!(doc.pages[0].strings().collect::<Vec<_>>(), vec!["Quote"]);
        assert!(doc.pages[1].has_meta("block", "summary"));
    }
}
