//! Model catalog
//!
//! The fixed set of models the extraction API accepts, with the per-token
//! prices used to estimate the cost of a run. Prices are USD per million
//! tokens and track the upstream provider's published rates.

use crate::types::TokenUsage;

/// Rough intelligence tier shown next to each model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceIndicator {
    Low,
    Medium,
    High,
}

/// One selectable model
#[derive(Debug, Clone, Copy)]
pub struct Model {
    /// Provider-qualified identifier sent to the API
    pub id: &'static str,
    /// Human-readable label for pickers
    pub label: &'static str,
    pub indicator: PriceIndicator,
    /// USD per million input tokens
    pub price_input: f64,
    /// USD per million output tokens
    pub price_output: f64,
    pub is_default: bool,
}

impl Model {
    /// Estimated cost of a run in USD
    pub fn price(&self, usage: TokenUsage) -> f64 {
        let input = usage.input_tokens as f64 / 1_000_000.0 * self.price_input;
        let output = usage.output_tokens as f64 / 1_000_000.0 * self.price_output;
        input + output
    }
}

/// Every model the extraction API accepts, in display order
pub const MODELS: &[Model] = &[
    Model {
        id: "x-ai/grok-3-mini",
        label: "Grok 3 Mini",
        indicator: PriceIndicator::Low,
        price_input: 0.3,
        price_output: 0.5,
        is_default: true,
    },
    Model {
        id: "google/gemini-2.5-flash",
        label: "Gemini 2.5 Flash",
        indicator: PriceIndicator::Medium,
        price_input: 0.3,
        price_output: 2.5,
        is_default: false,
    },
    Model {
        id: "google/gemini-2.5-flash-preview-05-20",
        label: "Gemini 2.5 Flash Preview",
        indicator: PriceIndicator::Low,
        price_input: 0.15,
        price_output: 0.6,
        is_default: false,
    },
    Model {
        id: "google/gemini-2.5-flash-lite-preview-06-17",
        label: "Gemini 2.5 Flash Lite",
        indicator: PriceIndicator::Low,
        price_input: 0.1,
        price_output: 0.4,
        is_default: false,
    },
    Model {
        id: "google/gemini-2.5-pro",
        label: "Gemini 2.5 Pro",
        indicator: PriceIndicator::High,
        price_input: 1.25,
        price_output: 10.0,
        is_default: false,
    },
];

/// Look a model up by its provider-qualified id
pub fn find(id: &str) -> Option<&'static Model> {
    MODELS.iter().find(|model| model.id == id)
}

pub fn is_supported(id: &str) -> bool {
    find(id).is_some()
}

/// The model preselected for new sessions
pub fn default_model() -> &'static Model {
    // The catalog always carries exactly one default
    MODELS
        .iter()
        .find(|model| model.is_default)
        .unwrap_or(&MODELS[0])
}
