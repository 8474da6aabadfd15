use crate::QuoteRenderer;
use crate::emit::EmissionMode;
use crate::error::QuoteDocError;
use crate::i18n::Language;
use crate::source::QuoteSource;
use serde_json::json;

/// Transport-neutral response for the quote PDF endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl EndpointResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    fn error(err: &QuoteDocError) -> Self {
        let body = json!({ "error": err.kind(), "message": err.to_string() });
        Self {
            status: status_for(err),
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            body: body.to_string().into_bytes(),
        }
    }
}

/// HTTP status an error maps to.
pub fn status_for(err: &QuoteDocError) -> u16 {
    match err {
        QuoteDocError::InvalidRequest(_)
        | QuoteDocError::UnknownLanguage(_)
        | QuoteDocError::InvalidConfiguration(_) => 400,
        QuoteDocError::QuoteNotFound(_) => 404,
        QuoteDocError::SourceUnavailable(_) | QuoteDocError::Contract(_) => 502,
        QuoteDocError::MissingFont { .. }
        | QuoteDocError::Asset(_)
        | QuoteDocError::Pdf(_)
        | QuoteDocError::Io(_) => 500,
    }
}

/// Fetches one quote, renders it in `language_code` and answers with the PDF
/// bytes or a JSON error body.
pub fn generate(
    source: &dyn QuoteSource,
    renderer: &QuoteRenderer,
    quote_id: &str,
    language_code: &str,
    mode: EmissionMode,
) -> EndpointResponse {
    let quote_id = quote_id.trim();
    let result = (|| {
        if quote_id.is_empty() {
            return Err(QuoteDocError::InvalidRequest(
                "quote id must not be empty".to_string(),
            ));
        }
        let lang = Language::parse(language_code)?;
        let quote = source.fetch_quote(quote_id)?;
        renderer.render(&quote, lang, mode)
    })();

    match result {
        Ok(artifact) => {
            tracing::info!(
                quote = %quote_id,
                file = %artifact.filename,
                bytes = artifact.bytes.len(),
                "quote pdf served"
            );
            EndpointResponse {
                status: 200,
                headers: vec![
                    ("Content-Type".to_string(), artifact.content_type().to_string()),
                    ("Content-Disposition".to_string(), artifact.content_disposition()),
                    ("Content-Length".to_string(), artifact.bytes.len().to_string()),
                ],
                body: artifact.bytes,
            }
        }
        Err(err) => {
            let response = EndpointResponse::error(&err);
            if response.status >= 500 {
                tracing::error!(quote = %quote_id, error = %err, "quote pdf failed");
            } else {
                tracing::warn!(quote = %quote_id, error = %err, "quote pdf rejected");
            }
            response
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::InMemoryQuoteSource;
    use quotedoc_contract::QuoteRequest;

    struct DownSource;

    impl QuoteSource for DownSource {
        fn fetch_quote(&self, _id: &str) -> crate::Result<QuoteRequest> {
            Err(QuoteDocError::SourceUnavailable("connection refused".to_string()))
        }
    }

    fn source() -> InMemoryQuoteSource {
        let quote = QuoteRequest::from_json(
            r#"{
                "id": "ab12cd34-0000",
                "customer_name": "Gulf Works",
                "created_at": "2026-01-10T08:00:00Z",
                "quote_items": [{ "id": "i1", "quantity": 4, "unit_price": 10, "total_price": 40 }]
            }"#,
        )
        .unwrap();
        [quote].into_iter().collect()
    }

    fn error_kind(response: &EndpointResponse) -> String {
        let body: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
        body["error"].as_str().unwrap().to_string()
    }

    #[test]
    fn serves_pdf_with_disposition_headers() {
        let renderer = QuoteRenderer::builder().build().unwrap();
        let response = generate(&source(), &renderer, "ab12cd34-0000", "en", EmissionMode::Download);
        assert_eq!(response.status, 200);
        assert!(response.body.starts_with(b"%PDF-"));
        assert_eq!(response.header("content-type"), Some("application/pdf"));
        let disposition = response.header("Content-Disposition").unwrap();
        assert!(disposition.starts_with("attachment; filename=\"Quote_AB12CD34_GulfWorks_"));
        let today = chrono::Utc::now().format("%Y-%m-%d").to_string();
        let yesterday = (chrono::Utc::now() - chrono::Duration::days(1))
            .format("%Y-%m-%d")
            .to_string();
        assert!(
            disposition.ends_with(&format!("_{today}.pdf\""))
                || disposition.ends_with(&format!("_{yesterday}.pdf\"")),
            "{disposition}"
        );
        assert!(!disposition.contains("2026-01-10"));
        let preview = generate(&source(), &renderer, "ab12cd34-0000", "ar", EmissionMode::Preview);
        assert!(preview.header("Content-Disposition").unwrap().starts_with("inline;"));
        assert!(preview.header("Content-Disposition").unwrap().contains("_ar.pdf"));
    }

    #[test]
    fn maps_failures_to_status_codes() {
        let renderer = QuoteRenderer::builder().build().unwrap();
        let unknown_lang = generate(&source(), &renderer, "ab12cd34-0000", "fr", EmissionMode::Preview);
        assert_eq!(unknown_lang.status, 400);
        assert_eq!(error_kind(&unknown_lang), "unknown_language");

        let empty = generate(&source(), &renderer, "  ", "en", EmissionMode::Preview);
        assert_eq!(empty.status, 400);
        assert_eq!(error_kind(&empty), "invalid_request");

        let missing = generate(&source(), &renderer, "nope", "en", EmissionMode::Preview);
        assert_eq!(missing.status, 404);
        assert_eq!(error_kind(&missing), "not_found");
        assert_eq!(missing.header("Content-Type"), Some("application/json"));

        let down = generate(&DownSource, &renderer, "ab12cd34-0000", "en", EmissionMode::Preview);
        assert_eq!(down.status, 502);

        let strict = QuoteRenderer::builder()
            .strict_arabic_font(true)
            .build()
            .unwrap();
        let no_font = generate(&source(), &strict, "ab12cd34-0000", "ar", EmissionMode::Preview);
        assert_eq!(no_font.status, 500);
        assert_eq!(error_kind(&no_font), "missing_font");
    }
}
