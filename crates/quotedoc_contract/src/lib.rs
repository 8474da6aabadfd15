use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

pub const CONTRACT_ID: &str = "quotedoc.quote_projection";
pub const CONTRACT_VERSION: &str = "1";

#[derive(Debug, thiserror::Error)]
pub enum ContractError {
    #[error("invalid quote payload: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("quote request has an empty id")]
    MissingId,
    #[error("quote item {item} has a non-positive quantity")]
    NonPositiveQuantity { item: String },
}

/// Quote request status as stored by the relational backend.
///
/// `Pending` and `Responded` are legacy spellings that older rows still carry;
/// they rank like `Submitted` and `Quoted` respectively. Anything unknown is
/// kept as `Other` so a stray value never blocks rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuoteStatus {
    Draft,
    Submitted,
    Quoted,
    Accepted,
    Rejected,
    Pending,
    Responded,
    Other,
}

impl QuoteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuoteStatus::Draft => "draft",
            QuoteStatus::Submitted => "submitted",
            QuoteStatus::Quoted => "quoted",
            QuoteStatus::Accepted => "accepted",
            QuoteStatus::Rejected => "rejected",
            QuoteStatus::Pending => "pending",
            QuoteStatus::Responded => "responded",
            QuoteStatus::Other => "other",
        }
    }

    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "draft" => QuoteStatus::Draft,
            "submitted" => QuoteStatus::Submitted,
            "quoted" => QuoteStatus::Quoted,
            "accepted" => QuoteStatus::Accepted,
            "rejected" => QuoteStatus::Rejected,
            "pending" => QuoteStatus::Pending,
            "responded" => QuoteStatus::Responded,
            _ => QuoteStatus::Other,
        }
    }

    fn rank(&self) -> Option<u8> {
        match self {
            QuoteStatus::Draft => Some(0),
            QuoteStatus::Submitted | QuoteStatus::Pending => Some(1),
            QuoteStatus::Quoted | QuoteStatus::Responded => Some(2),
            QuoteStatus::Accepted | QuoteStatus::Rejected => Some(3),
            QuoteStatus::Other => None,
        }
    }

    /// Statuses only move forward one step at a time:
    /// draft -> submitted -> quoted -> accepted | rejected.
    pub fn can_transition_to(&self, next: QuoteStatus) -> bool {
        match (self.rank(), next.rank()) {
            (Some(current), Some(target)) => target == current + 1,
            _ => false,
        }
    }
}

impl std::fmt::Display for QuoteStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for QuoteStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for QuoteStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(QuoteStatus::parse(&raw))
    }
}

/// Requested specification overrides of one quote item.
///
/// The backend stores these as a JSON column that is sometimes a native
/// object and sometimes a JSON-encoded string (or free text typed by hand).
/// Ingestion resolves the shape once so later stages never re-parse.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SpecBag {
    #[default]
    Empty,
    Decoded(Map<String, Value>),
    Raw(String),
}

impl SpecBag {
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Null => SpecBag::Empty,
            Value::Object(map) => SpecBag::Decoded(map),
            Value::String(text) => SpecBag::from_text(&text),
            other => SpecBag::Raw(other.to_string()),
        }
    }

    pub fn from_text(text: &str) -> Self {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return SpecBag::Empty;
        }
        match serde_json::from_str::<Value>(trimmed) {
            Ok(Value::Object(map)) => SpecBag::Decoded(map),
            Ok(Value::Null) => SpecBag::Empty,
            _ => SpecBag::Raw(text.to_string()),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            SpecBag::Empty => true,
            SpecBag::Decoded(map) => map.is_empty(),
            SpecBag::Raw(text) => text.trim().is_empty(),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            SpecBag::Empty => Value::Null,
            SpecBag::Decoded(map) => Value::Object(map.clone()),
            SpecBag::Raw(text) => Value::String(text.clone()),
        }
    }
}

impl Serialize for SpecBag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SpecBag {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(value.map(SpecBag::from_value).unwrap_or_default())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductSpec {
    pub name: String,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub min_value: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub max_value: Option<f64>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    #[serde(default, deserialize_with = "de_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub name_ar: Option<String>,
    #[serde(default, deserialize_with = "de_vec_or_null")]
    pub types: Vec<String>,
    #[serde(default, deserialize_with = "de_opt_id")]
    pub category_id: Option<String>,
    #[serde(default, alias = "categories", deserialize_with = "de_category_name")]
    pub category: Option<String>,
    #[serde(default, alias = "product_specs", deserialize_with = "de_vec_or_null")]
    pub specs: Vec<ProductSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteItem {
    #[serde(default, deserialize_with = "de_id")]
    pub id: String,
    #[serde(default, deserialize_with = "de_opt_id")]
    pub product_id: Option<String>,
    #[serde(deserialize_with = "de_quantity")]
    pub quantity: u32,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub unit_price: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub total_price: Option<f64>,
    #[serde(default)]
    pub specifications: SpecBag,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default, alias = "products")]
    pub product: Option<Product>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QuoteResponse {
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub total_amount: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_u32")]
    pub validity_days: Option<u32>,
    #[serde(default, deserialize_with = "de_opt_timestamp")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default, alias = "response_notes")]
    pub notes: Option<String>,
}

/// One quote request with its items and (at most one) response, as the
/// relational data API returns it for a single nested read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteRequest {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(default)]
    pub customer_phone: Option<String>,
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub project_name: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub status: Option<QuoteStatus>,
    #[serde(default, deserialize_with = "de_opt_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "de_opt_timestamp")]
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "de_opt_timestamp")]
    pub quoted_at: Option<DateTime<Utc>>,
    #[serde(default, alias = "quote_items", deserialize_with = "de_vec_or_null")]
    pub items: Vec<QuoteItem>,
    #[serde(default, alias = "quote_responses", deserialize_with = "de_first_response")]
    pub response: Option<QuoteResponse>,
}

impl QuoteRequest {
    pub fn from_json(raw: &str) -> Result<Self, ContractError> {
        let request: QuoteRequest = serde_json::from_str(raw)?;
        request.validate()?;
        Ok(request)
    }

    pub fn validate(&self) -> Result<(), ContractError> {
        if self.id.trim().is_empty() {
            return Err(ContractError::MissingId);
        }
        for item in &self.items {
            if item.quantity == 0 {
                return Err(ContractError::NonPositiveQuantity {
                    item: item.id.clone(),
                });
            }
        }
        Ok(())
    }

    /// The date shown on the document: submission, then creation.
    pub fn document_date(&self) -> Option<DateTime<Utc>> {
        self.submitted_at.or(self.created_at)
    }

    pub fn response_notes(&self) -> Option<&str> {
        self.response
            .as_ref()
            .and_then(|response| response.notes.as_deref())
            .filter(|notes| !notes.trim().is_empty())
    }
}

/// Lowercase hex SHA-256 of the canonical JSON form of a request.
pub fn fingerprint(request: &QuoteRequest) -> String {
    let bytes = serde_json::to_vec(request).unwrap_or_default();
    hex_sha256(&bytes)
}

fn hex_sha256(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    let mut out = String::with_capacity(digest.len() * 2);
    for b in digest {
        use std::fmt::Write;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

fn de_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(de_opt_id(deserializer)?.unwrap_or_default())
}

fn de_opt_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(text)) => Ok(Some(text)),
        Some(Value::Number(number)) => Ok(Some(number.to_string())),
        Some(other) => Err(D::Error::custom(format!("expected an id, found {other}"))),
    }
}

fn de_opt_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(number)) => Ok(number.as_f64()),
        Some(Value::String(text)) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            trimmed
                .parse::<f64>()
                .map(Some)
                .map_err(|_| D::Error::custom(format!("expected a number, found {text:?}")))
        }
        Some(other) => Err(D::Error::custom(format!("expected a number, found {other}"))),
    }
}

fn de_opt_u32<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u32>, D::Error> {
    let Some(value) = de_opt_f64(deserializer)? else {
        return Ok(None);
    };
    if value < 0.0 || value.fract() != 0.0 || value > u32::MAX as f64 {
        return Err(D::Error::custom(format!(
            "expected a whole non-negative number, found {value}"
        )));
    }
    Ok(Some(value as u32))
}

fn de_quantity<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    de_opt_u32(deserializer)?.ok_or_else(|| D::Error::custom("quantity is required"))
}

fn de_vec_or_null<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

fn de_category_name<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(name)) => Ok(Some(name)),
        Some(Value::Object(map)) => Ok(map
            .get("name")
            .and_then(|name| name.as_str())
            .map(|name| name.to_string())),
        _ => Ok(None),
    }
}

fn de_first_response<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<QuoteResponse>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        Many(Vec<QuoteResponse>),
        One(QuoteResponse),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        None => None,
        Some(OneOrMany::Many(responses)) => responses.into_iter().next(),
        Some(OneOrMany::One(response)) => Some(response),
    })
}

fn de_opt_timestamp<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error> {
    let Some(raw) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    parse_timestamp(trimmed)
        .map(Some)
        .ok_or_else(|| D::Error::custom(format!("unrecognized timestamp {raw:?}")))
}

/// Accepts RFC 3339 and the timezone-less forms Postgres hands back; naive
/// values are read as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(parsed) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f%#z") {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
