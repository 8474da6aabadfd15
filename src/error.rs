use quotedoc_contract::ContractError;

#[derive(Debug, thiserror::Error)]
pub enum QuoteDocError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("unsupported language tag {0:?}")]
    UnknownLanguage(String),
    #[error("no font covering {script} text is registered")]
    MissingFont { script: &'static str },
    #[error("asset error: {0}")]
    Asset(String),
    #[error(transparent)]
    Contract(#[from] ContractError),
    #[error("quote {0} not found")]
    QuoteNotFound(String),
    #[error("quote source unavailable: {0}")]
    SourceUnavailable(String),
    #[error("pdf error: {0}")]
    Pdf(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl QuoteDocError {
    /// Stable machine-readable kind, used in endpoint error bodies and traces.
    pub fn kind(&self) -> &'static str {
        match self {
            QuoteDocError::InvalidConfiguration(_) => "invalid_configuration",
            QuoteDocError::InvalidRequest(_) => "invalid_request",
            QuoteDocError::UnknownLanguage(_) => "unknown_language",
            QuoteDocError::MissingFont { .. } => "missing_font",
            QuoteDocError::Asset(_) => "asset",
            QuoteDocError::Contract(_) => "invalid_quote",
            QuoteDocError::QuoteNotFound(_) => "not_found",
            QuoteDocError::SourceUnavailable(_) => "source_unavailable",
            QuoteDocError::Pdf(_) => "pdf",
            QuoteDocError::Io(_) => "io",
        }
    }
}

pub type Result<T> = std::result::Result<T, QuoteDocError>;
