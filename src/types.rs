//! Data model shared between the form session, the extraction API and the
//! validation engine.
//!
//! JSON field names follow the extraction API wire format, so everything here
//! round-trips through `serde_json` unchanged.

use serde::{Deserialize, Serialize};

/// Kind of value a user-declared field should hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    #[default]
    Text,
    Number,
    Link,
    Image,
}

/// User-declared field to extract selectors for
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Field {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(rename = "additionalInfo")]
    pub additional_info: String,
}

/// Overflow chunk of HTML input, created when a paste exceeds the size threshold
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub id: String,
    pub content: String,
}

impl Attachment {
    /// Truncated content shown in attachment listings
    pub fn preview(&self) -> String {
        self.content.chars().take(150).collect()
    }
}

/// How content is read off a matched element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ExtractMethod {
    #[default]
    #[serde(rename = "textContent")]
    TextContent,
    #[serde(rename = "innerHTML")]
    InnerHtml,
    #[serde(rename = "innerText")]
    InnerText,
    #[serde(rename = "javascript")]
    Javascript,
}

/// Whether a regex pulls a substring out of content or strips it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegexMode {
    #[default]
    Extract,
    Omit,
}

/// Model reasoning attached to each extracted field
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldAnalysis {
    #[serde(default)]
    pub observations: Vec<String>,
    #[serde(default)]
    pub selectors_considered: Vec<String>,
    #[serde(default)]
    pub chosen_selector_rationale: String,
}

/// One field's extraction recipe as produced by the extraction API.
/// Immutable once received; validation never writes back into it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedSelector {
    #[serde(default)]
    pub field_analysis: FieldAnalysis,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub field_type: Option<FieldType>,
    #[serde(default)]
    pub field: String,
    #[serde(default)]
    pub selector: String,
    #[serde(default)]
    pub attribute_to_get: String,
    #[serde(default)]
    pub regex: String,
    #[serde(default)]
    pub regex_match_index_to_use: usize,
    #[serde(default)]
    pub extract_method: ExtractMethod,
    #[serde(default)]
    pub regex_use: RegexMode,
    #[serde(default)]
    pub java_script_function: String,
    #[serde(default)]
    pub type_script_function: String,
    #[serde(default)]
    pub python_function: String,
    #[serde(default)]
    pub go_function: String,
}

impl ExtractedSelector {
    /// True when any of the per-language functions is present
    pub fn has_code(&self) -> bool {
        !self.java_script_function.is_empty()
            || !self.type_script_function.is_empty()
            || !self.python_function.is_empty()
            || !self.go_function.is_empty()
    }
}

/// Token counts reported by the extraction API
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// One complete extraction run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionResult {
    pub fields: Vec<ExtractedSelector>,
    pub usage: TokenUsage,
    pub price_input_tokens: f64,
    pub price_output_tokens: f64,
    pub total_price: f64,
    pub model: String,
}

/// Extraction run plus the HTML snapshot it was produced from.
/// Versions are 1-based, unique and strictly increasing; stored in insertion
/// order regardless of how they are later sorted for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionedExtractionResult {
    pub version: u32,
    pub result: ExtractionResult,
    pub html_input: String,
}

/// Field shape the extraction API expects (no client-side id)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldForApi {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(rename = "additionalInfo")]
    pub additional_info: String,
}

impl From<&Field> for FieldForApi {
    fn from(field: &Field) -> Self {
        Self {
            name: field.name.clone(),
            field_type: field.field_type,
            additional_info: field.additional_info.clone(),
        }
    }
}

/// Request body for `POST /api/v1/extract`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractRequest {
    pub html: String,
    pub fields_to_extract_selectors_for: Vec<FieldForApi>,
    pub model: String,
    pub attachments: Vec<Attachment>,
    pub html_input: String,
    pub fields: Vec<Field>,
}

/// Error payload inside a non-success API response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

/// Envelope every extraction API response is wrapped in
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    #[serde(default)]
    pub data: Option<ExtractionResult>,
    #[serde(default)]
    pub error: Option<ApiError>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracted_selector_wire_names() {
        let json = r#"{
            "field": "Price",
            "selector": ".price",
            "attributeToGet": "",
            "regex": "(\\d+)",
            "regexMatchIndexToUse": 1,
            "extractMethod": "innerHTML",
            "regexUse": "omit",
            "javaScriptFunction": "function() { return 1; }",
            "typeScriptFunction": "",
            "pythonFunction": "",
            "goFunction": "",
            "fieldAnalysis": {
                "observations": ["price is in a span"],
                "selectorsConsidered": [".price", "span.amount"],
                "chosenSelectorRationale": "shortest stable selector"
            }
        }"#;

        let parsed: ExtractedSelector = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.field, "Price");
        assert_eq!(parsed.regex_match_index_to_use, 1);
        assert_eq!(parsed.extract_method, ExtractMethod::InnerHtml);
        assert_eq!(parsed.regex_use, RegexMode::Omit);
        assert!(parsed.has_code());
        assert_eq!(parsed.field_analysis.selectors_considered.len(), 2);

        let back = serde_json::to_value(&parsed).unwrap();
        assert_eq!(back["attributeToGet"], "");
        assert_eq!(back["regexUse"], "omit");
        assert_eq!(back["extractMethod"], "innerHTML");
    }

    #[test]
    fn missing_fields_default() {
        let parsed: ExtractedSelector =
            serde_json::from_str(r#"{"field": "Title", "selector": "h1"}"#).unwrap();
        assert_eq!(parsed.extract_method, ExtractMethod::TextContent);
        assert_eq!(parsed.regex_use, RegexMode::Extract);
        assert_eq!(parsed.regex_match_index_to_use, 0);
        assert!(!parsed.has_code());
    }

    #[test]
    fn api_response_error_envelope() {
        let json = r#"{"success": false, "error": {"code": "VALIDATION_ERROR", "message": "HTML is required"}}"#;
        let parsed: ApiResponse = serde_json::from_str(json).unwrap();
        assert!(!parsed.success);
        assert!(parsed.data.is_none());
        assert_eq!(parsed.error.unwrap().code, "VALIDATION_ERROR");
    }

    #[test]
    fn attachment_preview_is_bounded() {
        let attachment = Attachment {
            id: "1".into(),
            content: "x".repeat(5000),
        };
        assert_eq!(attachment.preview().len(), 150);
    }
}
