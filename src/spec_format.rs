use crate::format::{clean_text, split_script_runs, truncate_chars};
use crate::i18n::{Language, labels_for, normalize_spec_key, spec_label};
use crate::text::{FontRole, TextRun};
use quotedoc_contract::{Product, SpecBag};
use serde_json::Value;

pub const RAW_TEXT_LIMIT: usize = 80;
pub const VALUE_LIMIT: usize = 20;
pub const MAX_LINES: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecLine {
    pub label: Option<String>,
    pub value: String,
}

/// The specification cell of one table row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecSummary {
    pub lines: Vec<SpecLine>,
}

impl SpecSummary {
    fn single(value: String) -> Self {
        Self {
            lines: vec![SpecLine { label: None, value }],
        }
    }

    pub fn to_text(&self) -> String {
        self.lines
            .iter()
            .map(|line| match &line.label {
                Some(label) => format!("{label}: {}", line.value),
                None => line.value.clone(),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Font runs for the cell. Labels and values are split by script, so an
    /// Arabic label keeps the Arabic font and a numeric value the Latin font.
    pub fn runs(&self) -> Vec<TextRun> {
        let mut runs = Vec::new();
        for (index, line) in self.lines.iter().enumerate() {
            if index > 0 {
                runs.push(TextRun::new("\n", FontRole::Latin));
            }
            if let Some(label) = &line.label {
                runs.extend(split_script_runs(&format!("{label}: "), false));
            }
            runs.extend(split_script_runs(&line.value, false));
        }
        runs
    }
}

pub fn format_specifications(
    bag: &SpecBag,
    lang: Language,
    product: Option<&Product>,
) -> SpecSummary {
    let not_available = || SpecSummary::single(labels_for(lang).not_available.to_string());
    match bag {
        SpecBag::Empty => not_available(),
        SpecBag::Raw(text) => {
            let cleaned = clean_text(text, lang);
            if cleaned.is_empty() {
                return not_available();
            }
            SpecSummary::single(truncate_chars(&cleaned, RAW_TEXT_LIMIT))
        }
        SpecBag::Decoded(map) => {
            if map.is_empty() {
                return not_available();
            }
            let lines = map
                .iter()
                .take(MAX_LINES)
                .map(|(key, value)| SpecLine {
                    label: Some(clean_text(&spec_label(key, lang), lang)),
                    value: format_value(key, value, lang, product),
                })
                .collect();
            SpecSummary { lines }
        }
    }
}

fn format_value(key: &str, value: &Value, lang: Language, product: Option<&Product>) -> String {
    let text = match value {
        Value::Null => return labels_for(lang).empty_value.to_string(),
        Value::String(text) => clean_text(text, lang),
        Value::Number(number) => number.to_string(),
        Value::Bool(flag) => flag.to_string(),
        nested => nested.to_string(),
    };
    let truncated = truncate_chars(&text, VALUE_LIMIT);
    match unit_for(key, product) {
        Some(unit) => format!("{truncated} {unit}"),
        None => truncated,
    }
}

fn unit_for<'a>(key: &str, product: Option<&'a Product>) -> Option<&'a str> {
    let wanted = normalize_spec_key(key);
    product?
        .specs
        .iter()
        .find(|spec| normalize_spec_key(&spec.name) == wanted)
        .and_then(|spec| spec.unit.as_deref())
        .map(str::trim)
        .filter(|unit| !unit.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use quotedoc_contract::ProductSpec;
    use serde_json::json;

    fn decoded(value: Value) -> SpecBag {
        SpecBag::from_value(value)
    }

    #[test]
    fn two_entries_render_two_lines_with_truncation() {
        let bag = decoded(json!({
            "thickness": 12.345,
            "width": "very-long-value-exceeding-twenty-characters"
        }));
        let summary = format_specifications(&bag, Language::En, None);
        assert_eq!(summary.lines.len(), 2);
        assert_eq!(
            summary.to_text(),
            "Thickness: 12.345\nWidth: very-long-value-exce..."
        );
        let value = &summary.lines[1].value;
        assert!(value.ends_with("..."));
        assert_eq!(value.chars().count(), VALUE_LIMIT + 3);
    }

    #[test]
    fn more_than_three_entries_cap_at_three_in_order() {
        let bag = decoded(json!({
            "grade": "S355",
            "length": 6000,
            "coating": true,
            "finish": "painted",
            "standard": "EN 10025"
        }));
        let summary = format_specifications(&bag, Language::En, None);
        assert_eq!(summary.lines.len(), MAX_LINES);
        assert_eq!(summary.to_text(), "Grade: S355\nLength: 6000\nCoating: true");
    }

    #[test]
    fn raw_text_truncates_at_eighty() {
        let raw = "x".repeat(100);
        let summary = format_specifications(&SpecBag::Raw(raw), Language::En, None);
        let text = summary.to_text();
        assert_eq!(text.chars().count(), RAW_TEXT_LIMIT + 3);
        assert!(text.ends_with("..."));
        assert!(summary.lines[0].label.is_none());
    }

    #[test]
    fn empty_inputs_read_not_available() {
        for bag in [
            SpecBag::Empty,
            SpecBag::Raw("   ".into()),
            SpecBag::Decoded(Default::default()),
        ] {
            assert_eq!(format_specifications(&bag, Language::En, None).to_text(), "N/A");
            assert_eq!(format_specifications(&bag, Language::Ar, None).to_text(), "غير محدد");
        }
    }

    #[test]
    fn units_follow_the_truncated_value() {
        let product = Product {
            id: "p1".into(),
            name: "Plate".into(),
            name_ar: None,
            types: vec![],
            category_id: None,
            category: None,
            specs: vec![ProductSpec {
                name: "Thickness".into(),
                unit: Some("mm".into()),
                min_value: None,
                max_value: None,
                notes: None,
            }],
        };
        let bag = decoded(json!({"thickness": 12, "grade": null, "extra": {"a": 1}}));
        let summary = format_specifications(&bag, Language::Ar, Some(&product));
        assert_eq!(summary.lines[0].label.as_deref(), Some("السماكة"));
        assert_eq!(summary.lines[0].value, "12 mm");
        assert_eq!(summary.lines[1].value, "-");
        assert_eq!(summary.lines[2].label.as_deref(), Some("extra"));
        assert_eq!(summary.lines[2].value, r#"{"a":1}"#);
    }

    #[test]
    fn arabic_lines_split_label_and_numeric_value() {
        let bag = decoded(json!({"thickness": 8}));
        let runs = format_specifications(&bag, Language::Ar, None).runs();
        assert_eq!(runs[0].role, FontRole::Arabic);
        assert!(runs[0].text.starts_with("السماكة"));
        assert_eq!(runs.last().map(|run| run.role), Some(FontRole::Latin));
        assert_eq!(runs.last().map(|run| run.text.as_str()), Some("8"));
    }
}
