//! Extraction API client
//!
//! Thin blocking wrapper around `POST /api/v1/extract`. The API wraps every
//! response in a success envelope and sends declared failures with non-2xx
//! statuses; this client parses the envelope first, whatever the status, and
//! turns declared failures and empty payloads into typed errors.

use reqwest::blocking::Client;
use reqwest::StatusCode;
use tracing::{debug, info};
use url::Url;

use crate::config::Config;
use crate::error::Error;
use crate::types::{ApiResponse, ExtractRequest, ExtractionResult};

pub struct ExtractClient {
    base: Url,
    http: Client,
}

impl ExtractClient {
    pub fn new(config: &Config) -> Result<Self, Error> {
        let base = Url::parse(&config.api_url)?;
        let http = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self { base, http })
    }

    /// Submit an extraction request and unwrap the response envelope
    pub fn extract(
        &self,
        api_key: &str,
        request: &ExtractRequest,
    ) -> Result<ExtractionResult, Error> {
        let endpoint = self.base.join("api/v1/extract")?;
        info!(
            model = %request.model,
            fields = request.fields_to_extract_selectors_for.len(),
            html_bytes = request.html.len(),
            "submitting extraction request"
        );

        let response = self
            .http
            .post(endpoint)
            .header("x-api-key", api_key)
            .json(request)
            .send()?;
        let status = response.status();
        let body = response.text()?;

        let result = unwrap_envelope(status, &body)?;
        debug!(
            fields = result.fields.len(),
            input_tokens = result.usage.input_tokens,
            output_tokens = result.usage.output_tokens,
            total_price = result.total_price,
            "extraction completed"
        );
        Ok(result)
    }
}

/// Unwrap the response envelope into a result or a typed error.
///
/// Declared failures (400, 422, 429, 500) carry the same envelope as success
/// responses, so the body is parsed regardless of status; the status stands in
/// only when the body is not the envelope at all.
fn unwrap_envelope(status: StatusCode, body: &str) -> Result<ExtractionResult, Error> {
    let envelope: ApiResponse = match serde_json::from_str(body) {
        Ok(envelope) => envelope,
        Err(e) if status.is_success() => return Err(Error::Decode(e)),
        Err(_) => {
            return Err(Error::Api {
                code: status.as_u16().to_string(),
                message: format!("unexpected response: {}", snippet(body)),
            })
        }
    };
    if !envelope.success {
        let (code, message) = match envelope.error {
            Some(error) => (error.code, error.message),
            None => ("UNKNOWN".to_string(), "unspecified API error".to_string()),
        };
        return Err(Error::Api { code, message });
    }
    envelope.data.ok_or(Error::EmptyResponse)
}

fn snippet(body: &str) -> String {
    let flat = body.trim().replace('\n', " ");
    if flat.chars().count() > 120 {
        flat.chars().take(120).collect()
    } else {
        flat
    }
}
