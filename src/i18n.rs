use crate::error::{QuoteDocError, Result};
use quotedoc_contract::QuoteStatus;
use std::borrow::Cow;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    En,
    Ar,
}

impl Language {
    /// Accepts `en`, `ar` and region-tagged forms such as `en-US` or `ar_SA`.
    pub fn parse(tag: &str) -> Result<Self> {
        let primary = tag
            .trim()
            .split(['-', '_'])
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        match primary.as_str() {
            "en" => Ok(Language::En),
            "ar" => Ok(Language::Ar),
            _ => Err(QuoteDocError::UnknownLanguage(tag.to_string())),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Ar => "ar",
        }
    }

    pub fn direction(&self) -> Direction {
        match self {
            Language::En => Direction::Ltr,
            Language::Ar => Direction::Rtl,
        }
    }

    pub fn labels(&self) -> &'static Labels {
        labels_for(*self)
    }
}

impl FromStr for Language {
    type Err = QuoteDocError;

    fn from_str(s: &str) -> Result<Self> {
        Language::parse(s)
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Ltr,
    Rtl,
}

impl Direction {
    pub fn is_rtl(&self) -> bool {
        matches!(self, Direction::Rtl)
    }
}

/// Every static string a quote document shows, for one language.
#[derive(Debug)]
pub struct Labels {
    pub document_title: &'static str,
    pub customer_info: &'static str,
    pub quote_info: &'static str,
    pub name: &'static str,
    pub email: &'static str,
    pub phone: &'static str,
    pub company: &'static str,
    pub project: &'static str,
    pub reference: &'static str,
    pub date: &'static str,
    pub status: &'static str,
    pub validity: &'static str,
    pub days: &'static str,
    pub col_product: &'static str,
    pub col_specifications: &'static str,
    pub col_quantity: &'static str,
    pub col_unit_price: &'static str,
    pub col_total: &'static str,
    pub summary: &'static str,
    pub subtotal: &'static str,
    pub total: &'static str,
    pub valid_until: &'static str,
    pub notes: &'static str,
    pub item_note: &'static str,
    pub to_be_priced: &'static str,
    pub not_available: &'static str,
    pub unknown_product: &'static str,
    pub empty_value: &'static str,
    pub no_items: &'static str,
    pub footer: &'static str,
    pub branding_tagline: &'static str,
    page_of: (&'static str, &'static str),
}

impl Labels {
    /// "Page 2 of 3" / "صفحة 2 من 3", digits always ASCII.
    pub fn page_marker(&self, page: usize, total: usize) -> String {
        format!("{} {} {} {}", self.page_of.0, page, self.page_of.1, total)
    }
}

static EN_LABELS: Labels = Labels {
    document_title: "Price Quotation",
    customer_info: "Customer Information",
    quote_info: "Quote Information",
    name: "Name",
    email: "Email",
    phone: "Phone",
    company: "Company",
    project: "Project",
    reference: "Quote No.",
    date: "Date",
    status: "Status",
    validity: "Validity",
    days: "days",
    col_product: "Product",
    col_specifications: "Specifications",
    col_quantity: "Qty",
    col_unit_price: "Unit Price",
    col_total: "Total",
    summary: "Quote Summary",
    subtotal: "Subtotal",
    total: "Total Amount",
    valid_until: "Valid Until",
    notes: "Notes",
    item_note: "Note:",
    to_be_priced: "TBD",
    not_available: "N/A",
    unknown_product: "Unavailable product",
    empty_value: "-",
    no_items: "No items in this quote",
    footer: "Thank you for your business. Prices are subject to the validity period stated above.",
    branding_tagline: "Quality steel products for every project",
    page_of: ("Page", "of"),
};

static AR_LABELS: Labels = Labels {
    document_title: "عرض سعر",
    customer_info: "معلومات العميل",
    quote_info: "معلومات العرض",
    name: "الاسم",
    email: "البريد الإلكتروني",
    phone: "الهاتف",
    company: "الشركة",
    project: "المشروع",
    reference: "رقم العرض",
    date: "التاريخ",
    status: "الحالة",
    validity: "مدة الصلاحية",
    days: "يوم",
    col_product: "المنتج",
    col_specifications: "المواصفات",
    col_quantity: "الكمية",
    col_unit_price: "سعر الوحدة",
    col_total: "الإجمالي",
    summary: "ملخص العرض",
    subtotal: "المجموع الفرعي",
    total: "المبلغ الإجمالي",
    valid_until: "صالح حتى",
    notes: "ملاحظات",
    item_note: "ملاحظة:",
    to_be_priced: "يحدد لاحقا",
    not_available: "غير محدد",
    unknown_product: "منتج غير متوفر",
    empty_value: "-",
    no_items: "لا توجد منتجات في هذا العرض",
    footer: "شكرا لتعاملكم معنا. الأسعار سارية خلال مدة الصلاحية المذكورة أعلاه.",
    branding_tagline: "منتجات حديد عالية الجودة لكل مشروع",
    page_of: ("صفحة", "من"),
};

pub fn labels_for(lang: Language) -> &'static Labels {
    match lang {
        Language::En => &EN_LABELS,
        Language::Ar => &AR_LABELS,
    }
}

// (normalized key, English, Arabic)
const SPEC_LABELS: &[(&str, &str, &str)] = &[
    ("thickness", "Thickness", "السماكة"),
    ("width", "Width", "العرض"),
    ("length", "Length", "الطول"),
    ("height", "Height", "الارتفاع"),
    ("diameter", "Diameter", "القطر"),
    ("grade", "Grade", "الدرجة"),
    ("weight", "Weight", "الوزن"),
    ("type", "Type", "النوع"),
    ("size", "Size", "المقاس"),
    ("finish", "Finish", "التشطيب"),
    ("coating", "Coating", "الطلاء"),
    ("material", "Material", "المادة"),
    ("standard", "Standard", "المعيار"),
    ("color", "Color", "اللون"),
    ("unit", "Unit", "الوحدة"),
    ("quantity", "Quantity", "الكمية"),
    ("shape", "Shape", "الشكل"),
    ("tolerance", "Tolerance", "التفاوت"),
    ("wall_thickness", "Wall Thickness", "سماكة الجدار"),
    ("outer_diameter", "Outer Diameter", "القطر الخارجي"),
];

pub fn normalize_spec_key(key: &str) -> String {
    key.trim()
        .to_lowercase()
        .chars()
        .map(|ch| if ch == ' ' || ch == '-' { '_' } else { ch })
        .collect()
}

/// Display label for a specification field; untranslated keys come back as
/// given (trimmed).
pub fn spec_label(key: &str, lang: Language) -> Cow<'_, str> {
    let normalized = normalize_spec_key(key);
    SPEC_LABELS
        .iter()
        .find(|(k, _, _)| *k == normalized)
        .map(|(_, en, ar)| match lang {
            Language::En => Cow::Borrowed(*en),
            Language::Ar => Cow::Borrowed(*ar),
        })
        .unwrap_or_else(|| Cow::Borrowed(key.trim()))
}

/// Status label; a missing or unrecognized status reads as pending.
pub fn status_label(status: Option<QuoteStatus>, lang: Language) -> &'static str {
    let status = match status {
        None | Some(QuoteStatus::Other) => QuoteStatus::Pending,
        Some(status) => status,
    };
    match (lang, status) {
        (Language::En, QuoteStatus::Draft) => "Draft",
        (Language::En, QuoteStatus::Submitted) => "Submitted",
        (Language::En, QuoteStatus::Quoted) | (Language::En, QuoteStatus::Responded) => "Quoted",
        (Language::En, QuoteStatus::Accepted) => "Accepted",
        (Language::En, QuoteStatus::Rejected) => "Rejected",
        (Language::En, _) => "Pending",
        (Language::Ar, QuoteStatus::Draft) => "مسودة",
        (Language::Ar, QuoteStatus::Submitted) => "مرسل",
        (Language::Ar, QuoteStatus::Quoted) | (Language::Ar, QuoteStatus::Responded) => "تم التسعير",
        (Language::Ar, QuoteStatus::Accepted) => "مقبول",
        (Language::Ar, QuoteStatus::Rejected) => "مرفوض",
        (Language::Ar, _) => "قيد الانتظار",
    }
}

const EN_MONTHS: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

const AR_MONTHS: [&str; 12] = [
    "يناير",
    "فبراير",
    "مارس",
    "أبريل",
    "مايو",
    "يونيو",
    "يوليو",
    "أغسطس",
    "سبتمبر",
    "أكتوبر",
    "نوفمبر",
    "ديسمبر",
];

/// Gregorian month name, `month` in 1..=12.
pub fn month_name(month: u32, lang: Language) -> &'static str {
    let table = match lang {
        Language::En => &EN_MONTHS,
        Language::Ar => &AR_MONTHS,
    };
    let index = month.clamp(1, 12) as usize - 1;
    table[index]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn language_tags_parse_with_regions() {
        assert_eq!(Language::parse("en").unwrap(), Language::En);
        assert_eq!(Language::parse("AR").unwrap(), Language::Ar);
        assert_eq!("en-US".parse::<Language>().unwrap(), Language::En);
        assert_eq!("ar_SA".parse::<Language>().unwrap(), Language::Ar);
        assert!(matches!(
            Language::parse("fr"),
            Err(QuoteDocError::UnknownLanguage(tag)) if tag == "fr"
        ));
        assert!(Language::parse("").is_err());
    }

    #[test]
    fn direction_follows_language() {
        assert!(Language::Ar.direction().is_rtl());
        assert!(!Language::En.direction().is_rtl());
    }

    #[test]
    fn spec_keys_are_normalized_before_lookup() {
        assert_eq!(spec_label(" Thickness ", Language::En), "Thickness");
        assert_eq!(spec_label("wall-thickness", Language::Ar), "سماكة الجدار");
        assert_eq!(spec_label("Outer Diameter", Language::En), "Outer Diameter");
        assert_eq!(spec_label("heat_number", Language::Ar), "heat_number");
    }

    #[test]
    fn unknown_status_reads_as_pending() {
        assert_eq!(status_label(None, Language::En), "Pending");
        assert_eq!(status_label(Some(QuoteStatus::Other), Language::Ar), "قيد الانتظار");
        assert_eq!(status_label(Some(QuoteStatus::Responded), Language::En), "Quoted");
        assert_eq!(status_label(Some(QuoteStatus::Pending), Language::En), "Pending");
    }

    #[test]
    fn page_marker_uses_ascii_digits() {
        assert_eq!(labels_for(Language::En).page_marker(2, 3), "Page 2 of 3");
        assert_eq!(labels_for(Language::Ar).page_marker(1, 4), "صفحة 1 من 4");
        assert_eq!(month_name(10, Language::Ar), "أكتوبر");
        assert_eq!(month_name(1, Language::En), "January");
    }
}
