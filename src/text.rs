use crate::canvas::Canvas;
use crate::font::{FontRegistry, HELVETICA, HELVETICA_BOLD};
use crate::i18n::Direction;
use crate::types::{Pt, TextAlign};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FontRole {
    Latin,
    LatinBold,
    Arabic,
    ArabicBold,
}

impl FontRole {
    pub fn for_script(arabic: bool, bold: bool) -> Self {
        match (arabic, bold) {
            (false, false) => FontRole::Latin,
            (false, true) => FontRole::LatinBold,
            (true, false) => FontRole::Arabic,
            (true, true) => FontRole::ArabicBold,
        }
    }
}

/// Font names per role. Arabic roles fall back to Helvetica when no
/// Arabic-capable font is registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontSet {
    pub latin: String,
    pub latin_bold: String,
    pub arabic: String,
    pub arabic_bold: String,
}

impl FontSet {
    pub fn base14() -> Self {
        Self {
            latin: HELVETICA.to_string(),
            latin_bold: HELVETICA_BOLD.to_string(),
            arabic: HELVETICA.to_string(),
            arabic_bold: HELVETICA_BOLD.to_string(),
        }
    }

    pub fn name(&self, role: FontRole) -> &str {
        match role {
            FontRole::Latin => &self.latin,
            FontRole::LatinBold => &self.latin_bold,
            FontRole::Arabic => &self.arabic,
            FontRole::ArabicBold => &self.arabic_bold,
        }
    }
}

impl Default for FontSet {
    fn default() -> Self {
        Self::base14()
    }
}

/// A piece of text drawn with a single font.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextRun {
    pub text: String,
    pub role: FontRole,
}

impl TextRun {
    pub fn new(text: impl Into<String>, role: FontRole) -> Self {
        Self {
            text: text.into(),
            role,
        }
    }
}

pub fn runs_text(runs: &[TextRun]) -> String {
    runs.iter().map(|run| run.text.as_str()).collect()
}

/// Measures and draws run sequences for one renderer.
pub struct TextMeasure<'a> {
    pub registry: &'a FontRegistry,
    pub fonts: &'a FontSet,
}

impl<'a> TextMeasure<'a> {
    pub fn new(registry: &'a FontRegistry, fonts: &'a FontSet) -> Self {
        Self { registry, fonts }
    }

    pub fn run_width(&self, run: &TextRun, size: Pt) -> Pt {
        self.registry
            .measure_text_width(self.fonts.name(run.role), size, &run.text)
    }

    pub fn width(&self, runs: &[TextRun], size: Pt) -> Pt {
        runs.iter().map(|run| self.run_width(run, size)).sum()
    }

    pub fn line_height(&self, size: Pt) -> Pt {
        let fallback = size.mul_ratio(125, 100);
        self.registry
            .line_height(&self.fonts.latin, size, fallback)
            .max(self.registry.line_height(&self.fonts.arabic, size, fallback))
    }

    /// Greedy word wrap. Explicit `\n` always breaks; a word wider than the
    /// line is split between characters.
    pub fn wrap(&self, runs: &[TextRun], max_width: Pt, size: Pt) -> Vec<Vec<TextRun>> {
        let mut lines: Vec<Vec<TextRun>> = Vec::new();
        let mut line: Vec<TextRun> = Vec::new();
        let mut line_width = Pt::ZERO;

        for token in tokenize(runs) {
            match token {
                Token::Break => {
                    lines.push(finish_line(std::mem::take(&mut line)));
                    line_width = Pt::ZERO;
                }
                Token::Word(word) => {
                    let word_width = self.run_width(&word, size);
                    let trimmed = TextRun::new(word.text.trim_end(), word.role);
                    let visible_width = self.run_width(&trimmed, size);
                    if line_width + visible_width <= max_width || line.is_empty() {
                        if visible_width > max_width && line.is_empty() {
                            for piece in self.split_long_word(&word, max_width, size) {
                                if !line.is_empty() {
                                    lines.push(finish_line(std::mem::take(&mut line)));
                                }
                                line_width = self.run_width(&piece, size);
                                push_run(&mut line, piece);
                            }
                            continue;
                        }
                        line_width += word_width;
                        push_run(&mut line, word);
                    } else {
                        lines.push(finish_line(std::mem::take(&mut line)));
                        line_width = word_width;
                        push_run(&mut line, word);
                    }
                }
            }
        }
        if !line.is_empty() || lines.is_empty() {
            lines.push(finish_line(line));
        }
        lines
    }

    fn split_long_word(&self, word: &TextRun, max_width: Pt, size: Pt) -> Vec<TextRun> {
        let mut pieces = Vec::new();
        let mut current = String::new();
        for ch in word.text.chars() {
            let mut candidate = current.clone();
            candidate.push(ch);
            let width = self
                .registry
                .measure_text_width(self.fonts.name(word.role), size, &candidate);
            if width > max_width && !current.is_empty() {
                pieces.push(TextRun::new(std::mem::take(&mut current), word.role));
                current.push(ch);
            } else {
                current = candidate;
            }
        }
        if !current.is_empty() {
            pieces.push(TextRun::new(current, word.role));
        }
        pieces
    }

    /// Draws one line inside `[x, x + width]` with its top at `y`.
    ///
    /// Runs are laid out in logical order from the start edge of the
    /// direction: left to right for LTR, right to left for RTL. Text inside a
    /// run is ordered by the shaper.
    #[allow(clippy::too_many_arguments)]
    pub fn draw_line(
        &self,
        canvas: &mut Canvas,
        line: &[TextRun],
        x: Pt,
        width: Pt,
        y: Pt,
        size: Pt,
        align: TextAlign,
        direction: Direction,
    ) {
        let widths: Vec<Pt> = line.iter().map(|run| self.run_width(run, size)).collect();
        let total: Pt = widths.iter().copied().sum();
        let start = match align {
            TextAlign::Left => x,
            TextAlign::Right => x + width - total,
            TextAlign::Center => x + (width - total) / 2,
        };
        canvas.set_font_size(size);
        let mut cursor = if direction.is_rtl() { start + total } else { start };
        for (run, run_width) in line.iter().zip(widths) {
            let draw_x = if direction.is_rtl() {
                cursor -= run_width;
                cursor
            } else {
                let at = cursor;
                cursor += run_width;
                at
            };
            if run.text.trim().is_empty() {
                continue;
            }
            canvas.set_font_name(self.fonts.name(run.role));
            canvas.draw_string(draw_x, y, run.text.clone());
        }
    }
}

enum Token {
    Word(TextRun),
    Break,
}

// Words keep their trailing spaces so widths add up across a line.
fn tokenize(runs: &[TextRun]) -> Vec<Token> {
    let mut tokens = Vec::new();
    for run in runs {
        let mut word = String::new();
        let mut in_space = false;
        for ch in run.text.chars() {
            if ch == '\n' {
                if !word.is_empty() {
                    tokens.push(Token::Word(TextRun::new(std::mem::take(&mut word), run.role)));
                }
                tokens.push(Token::Break);
                in_space = false;
                continue;
            }
            if ch.is_whitespace() {
                in_space = true;
                word.push(' ');
                continue;
            }
            if in_space && !word.is_empty() {
                tokens.push(Token::Word(TextRun::new(std::mem::take(&mut word), run.role)));
            }
            in_space = false;
            word.push(ch);
        }
        if !word.is_empty() {
            tokens.push(Token::Word(TextRun::new(word, run.role)));
        }
    }
    tokens
}

fn push_run(line: &mut Vec<TextRun>, run: TextRun) {
    if let Some(last) = line.last_mut() {
        if last.role == run.role {
            last.text.push_str(&run.text);
            return;
        }
    }
    line.push(run);
}

fn finish_line(mut line: Vec<TextRun>) -> Vec<TextRun> {
    if let Some(last) = line.last_mut() {
        let trimmed = last.text.trim_end().len();
        last.text.truncate(trimmed);
    }
    line.retain(|run| !run.text.is_empty());
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Command;
    use crate::types::Size;

    fn latin(text: &str) -> TextRun {
        TextRun::new(text, FontRole::Latin)
    }

    #[test]
    fn wrap_breaks_on_words_and_newlines() {
        let registry = FontRegistry::new();
        let fonts = FontSet::base14();
        let measure = TextMeasure::new(&registry, &fonts);
        let size = Pt::from_i32(10);
        let lines = measure.wrap(&[latin("Steel Plate\nS355")], Pt::from_i32(35), size);
        let texts: Vec<String> = lines.iter().map(|line| runs_text(line)).collect();
        assert_eq!(texts, vec!["Steel", "Plate", "S355"]);
    }

    #[test]
    fn long_words_are_split() {
        let registry = FontRegistry::new();
        let fonts = FontSet::base14();
        let measure = TextMeasure::new(&registry, &fonts);
        let lines = measure.wrap(&[latin("AAAAAAAAAA")], Pt::from_i32(20), Pt::from_i32(10));
        assert!(lines.len() > 1);
        let joined: String = lines.iter().map(|line| runs_text(line)).collect();
        assert_eq!(joined, "AAAAAAAAAA");
    }

    #[test]
    fn empty_input_yields_one_empty_line() {
        let registry = FontRegistry::new();
        let fonts = FontSet::base14();
        let measure = TextMeasure::new(&registry, &fonts);
        let lines = measure.wrap(&[], Pt::from_i32(100), Pt::from_i32(10));
        assert_eq!(lines, vec![Vec::<TextRun>::new()]);
    }

    #[test]
    fn rtl_lines_place_first_run_rightmost() {
        let registry = FontRegistry::new();
        let fonts = FontSet::base14();
        let measure = TextMeasure::new(&registry, &fonts);
        let mut canvas = Canvas::new(Size::a4());
        let line = vec![
            TextRun::new("A", FontRole::Arabic),
            TextRun::new("B", FontRole::Latin),
        ];
        measure.draw_line(
            &mut canvas,
            &line,
            Pt::ZERO,
            Pt::from_i32(100),
            Pt::ZERO,
            Pt::from_i32(10),
            TextAlign::Right,
            Direction::Rtl,
        );
        let doc = canvas.finish();
        let xs: Vec<(String, Pt)> = doc.pages[0]
            .commands
            .iter()
            .filter_map(|command| match command {
                Command::DrawString { x, text, .. } => Some((text.clone(), *x)),
                _ => None,
            })
            .collect();
        assert_eq!(xs[0].0, "A");
        assert_eq!(xs[1].0, "B");
        assert!(xs[0].1 > xs[1].1);
        // Right aligned: the first run ends at the right edge.
        let a_width = registry.measure_text_width(HELVETICA, Pt::from_i32(10), "A");
        assert_eq!(xs[0].1 + a_width, Pt::from_i32(100));
    }
}
