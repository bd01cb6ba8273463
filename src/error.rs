//! Crate-wide error type

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The selector engine rejected the pattern; validation cannot run
    #[error("unsupported selector: {0}")]
    UnsupportedSelector(String),

    /// A submit was attempted while another extraction is in flight
    #[error("an extraction is already in progress")]
    ExtractionPending,

    #[error("HTML input is required")]
    EmptyHtml,

    #[error("at least one field to extract is required")]
    NoFields,

    #[error("unsupported model: {0}")]
    UnsupportedModel(String),

    /// Non-success response from the extraction API
    #[error("extraction API error {code}: {message}")]
    Api { code: String, message: String },

    /// Success response that carried no result payload
    #[error("extraction API returned success without data")]
    EmptyResponse,

    #[error("transport error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body that is not the expected envelope
    #[error("malformed API response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid API URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("key store error: {0}")]
    KeyStore(#[from] std::io::Error),
}
