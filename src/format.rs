use crate::font::is_rtl_char;
use crate::i18n::{Language, month_name};
use crate::text::{FontRole, TextRun};
use chrono::{DateTime, Datelike, Utc};
use serde::Deserialize;

pub const ELLIPSIS: &str = "...";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Currency {
    pub code: String,
    pub arabic_symbol: String,
}

impl Default for Currency {
    fn default() -> Self {
        Self {
            code: "SAR".to_string(),
            arabic_symbol: "ر.س".to_string(),
        }
    }
}

fn is_bidi_control(ch: char) -> bool {
    matches!(
        ch,
        '\u{061C}' | '\u{200E}' | '\u{200F}' | '\u{202A}'..='\u{202E}' | '\u{2066}'..='\u{2069}'
    )
}

fn is_arabic_diacritic(ch: char) -> bool {
    matches!(
        ch,
        '\u{0610}'..='\u{061A}' | '\u{064B}'..='\u{065F}' | '\u{0670}' | '\u{06D6}'..='\u{06ED}'
    )
}

/// Strips directional control marks from free text (and, for Arabic,
/// combining diacritics the fonts may not position), then trims.
pub fn clean_text(text: &str, lang: Language) -> String {
    let cleaned: String = text
        .chars()
        .filter(|ch| !is_bidi_control(*ch))
        .filter(|ch| lang != Language::Ar || !is_arabic_diacritic(*ch))
        .collect();
    cleaned.trim().to_string()
}

/// Cuts `text` to `max_chars` characters, appending `...` when anything was
/// removed.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars).collect();
    out.push_str(ELLIPSIS);
    out
}

/// ASCII digits, `,` thousands grouping, `.` decimal point.
pub fn format_number(value: f64, decimals: usize) -> String {
    let value = if value.is_finite() { value } else { 0.0 };
    let fixed = format!("{:.*}", decimals, value.abs());
    let (int_part, frac_part) = match fixed.split_once('.') {
        Some((int_part, frac_part)) => (int_part, Some(frac_part)),
        None => (fixed.as_str(), None),
    };
    let mut out = String::with_capacity(fixed.len() + fixed.len() / 3 + 1);
    let negative = value < 0.0 && fixed.chars().any(|ch| ch.is_ascii_digit() && ch != '0');
    if negative {
        out.push('-');
    }
    out.push_str(&group_thousands(int_part));
    if let Some(frac) = frac_part {
        out.push('.');
        out.push_str(frac);
    }
    out
}

pub fn format_quantity(quantity: u32) -> String {
    group_thousands(&quantity.to_string())
}

fn group_thousands(digits: &str) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);
    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (len - index) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// `SAR 1,234.50` in English, `1,234.50 ر.س` in Arabic.
pub fn format_currency(amount: f64, lang: Language, currency: &Currency) -> String {
    let number = format_number(amount, 2);
    match lang {
        Language::En => format!("{} {}", currency.code, number),
        Language::Ar => format!("{} {}", number, currency.arabic_symbol),
    }
}

/// The currency string split so the amount always uses the Latin font and
/// the Arabic abbreviation the Arabic font.
pub fn currency_runs(amount: f64, lang: Language, currency: &Currency, bold: bool) -> Vec<TextRun> {
    let number = format_number(amount, 2);
    match lang {
        Language::En => vec![TextRun::new(
            format!("{} {}", currency.code, number),
            FontRole::for_script(false, bold),
        )],
        Language::Ar => vec![
            TextRun::new(number, FontRole::for_script(false, bold)),
            TextRun::new(
                format!(" {}", currency.arabic_symbol),
                FontRole::for_script(true, bold),
            ),
        ],
    }
}

/// Gregorian date with ASCII digits in both languages.
pub fn format_date(timestamp: DateTime<Utc>, lang: Language) -> String {
    let month = month_name(timestamp.month(), lang);
    match lang {
        Language::En => format!("{} {}, {}", month, timestamp.day(), timestamp.year()),
        Language::Ar => format!("{} {} {}", timestamp.day(), month, timestamp.year()),
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Script {
    Arabic,
    Latin,
    Neutral,
}

fn script_of(ch: char) -> Script {
    if is_rtl_char(ch) {
        // Arabic-Indic digits and punctuation inside the block still belong
        // to the Arabic font.
        Script::Arabic
    } else if ch.is_alphanumeric() {
        Script::Latin
    } else {
        Script::Neutral
    }
}

/// Splits free text into font runs: Arabic letters to the Arabic font,
/// digits and Latin letters to the Latin font. Neutral characters (spaces,
/// punctuation) stay with the run they follow; leading neutrals join the
/// first strong run.
pub fn split_script_runs(text: &str, bold: bool) -> Vec<TextRun> {
    let first_strong = text
        .chars()
        .map(script_of)
        .find(|script| *script != Script::Neutral)
        .unwrap_or(Script::Latin);

    let mut runs: Vec<TextRun> = Vec::new();
    let mut current = first_strong;
    for ch in text.chars() {
        let script = match script_of(ch) {
            Script::Neutral => current,
            strong => strong,
        };
        current = script;
        let role = FontRole::for_script(script == Script::Arabic, bold);
        match runs.last_mut() {
            Some(run) if run.role == role => run.text.push(ch),
            _ => runs.push(TextRun::new(ch.to_string(), role)),
        }
    }
    runs
}

/// First eight characters of a quote id, uppercased. Used as the printed
/// reference and in file names.
pub fn short_reference(id: &str) -> String {
    id.trim().chars().take(8).collect::<String>().to_uppercase()
}

pub fn contains_arabic(text: &str) -> bool {
    text.chars().any(is_rtl_char)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn clean_text_strips_controls_and_arabic_marks() {
        assert_eq!(clean_text("\u{200F} Steel\u{202B} ", Language::En), "Steel");
        assert_eq!(clean_text("مُحَمَّد", Language::Ar), "محمد");
        // Diacritics survive in English documents; only controls go.
        assert_eq!(clean_text("مُ\u{2066}", Language::En), "مُ");
    }

    #[test]
    fn truncation_keeps_threshold_then_marker() {
        let long = "very-long-value-exceeding-twenty-characters";
        let cut = truncate_chars(long, 20);
        assert_eq!(cut, "very-long-value-exce...");
        assert_eq!(cut.chars().count(), 23);
        assert_eq!(truncate_chars("short", 20), "short");
        assert_eq!(truncate_chars("لوح فولاذ مجلفن", 3), "لوح...");
    }

    #[test]
    fn numbers_group_with_ascii_digits() {
        assert_eq!(format_number(1234.5, 2), "1,234.50");
        assert_eq!(format_number(1234567.891, 2), "1,234,567.89");
        assert_eq!(format_number(-0.001, 2), "0.00");
        assert_eq!(format_number(-950.0, 0), "-950");
        assert_eq!(format_number(f64::NAN, 2), "0.00");
        assert_eq!(format_quantity(12000), "12,000");
    }

    #[test]
    fn currency_uses_ascii_digits_in_both_languages() {
        let sar = Currency::default();
        assert_eq!(format_currency(1234.5, Language::En, &sar), "SAR 1,234.50");
        assert_eq!(format_currency(1234.5, Language::Ar, &sar), "1,234.50 ر.س");
        for lang in [Language::En, Language::Ar] {
            let text = format_currency(98765.43, lang, &sar);
            assert!(text.contains("98,765.43"));
            assert!(!text.chars().any(|ch| ('\u{0660}'..='\u{0669}').contains(&ch)));
        }
    }

    #[test]
    fn arabic_currency_runs_split_by_font() {
        let runs = currency_runs(10.0, Language::Ar, &Currency::default(), true);
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0], TextRun::new("10.00", FontRole::LatinBold));
        assert_eq!(runs[1].role, FontRole::ArabicBold);
    }

    #[test]
    fn dates_are_gregorian_in_both_languages() {
        let ts = Utc.with_ymd_and_hms(2026, 10, 18, 9, 30, 0).unwrap();
        assert_eq!(format_date(ts, Language::En), "October 18, 2026");
        assert_eq!(format_date(ts, Language::Ar), "18 أكتوبر 2026");
        for lang in [Language::En, Language::Ar] {
            assert!(format_date(ts, lang).contains("2026"));
        }
    }

    #[test]
    fn script_runs_assign_digits_to_latin() {
        let runs = split_script_runs("لوح 12 مم", false);
        let roles: Vec<FontRole> = runs.iter().map(|run| run.role).collect();
        assert_eq!(
            roles,
            vec![FontRole::Arabic, FontRole::Latin, FontRole::Arabic]
        );
        assert_eq!(runs[0].text, "لوح ");
        assert_eq!(runs[1].text, "12 ");
        assert_eq!(runs[2].text, "مم");

        let plain = split_script_runs("(S355)", true);
        assert_eq!(plain, vec![TextRun::new("(S355)", FontRole::LatinBold)]);
        assert!(contains_arabic("Steel لوح"));
        assert_eq!(short_reference("3f2a9b1c-77aa-4d0e"), "3F2A9B1C");
        assert_eq!(short_reference("q1"), "Q1");
    }
}
