//! Client-side validation engine
//!
//! For every field the extraction API returns, the selectors, regexes and
//! extraction functions it proposed are checked against the HTML snapshot the
//! request was made from. The outcome is a tri-state flag plus an optional
//! extracted value, purely for display; the underlying extraction result is
//! never mutated.

mod code;
mod js;
mod regex;
mod selector;

pub use code::validate_code;
pub use regex::validate_regex;
pub use selector::validate_selector;

use crate::html::Document;
use crate::types::{ExtractMethod, ExtractedSelector, RegexMode};

/// Extracted values longer than this collapse to a preview until expanded
pub const PREVIEW_CHAR_LIMIT: usize = 100;
/// Lines shown for a collapsed preview
pub const PREVIEW_LINE_LIMIT: usize = 5;

/// Tri-state validation result.
///
/// `Indeterminate` means the validator could not run (for example the selector
/// uses a pseudo-class the engine does not implement); it is distinct from
/// `Invalid`, which means the validator ran and found nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validity {
    Valid,
    Invalid,
    Indeterminate,
}

/// What a validator concluded about one datum
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationOutcome {
    pub validity: Validity,
    pub extracted: Option<String>,
}

impl ValidationOutcome {
    pub fn valid(extracted: impl Into<String>) -> Self {
        Self {
            validity: Validity::Valid,
            extracted: Some(extracted.into()),
        }
    }

    /// Valid with nothing to show (e.g. an empty regex pattern)
    pub fn valid_empty() -> Self {
        Self {
            validity: Validity::Valid,
            extracted: None,
        }
    }

    pub fn invalid() -> Self {
        Self {
            validity: Validity::Invalid,
            extracted: None,
        }
    }

    pub fn indeterminate() -> Self {
        Self {
            validity: Validity::Indeterminate,
            extracted: None,
        }
    }
}

/// One datum to validate, dispatched by a closed tag.
///
/// The original UI discriminated on a free-text label, which let a mistyped
/// label silently skip validation; a tagged variant carrying exactly the
/// fields each validator needs closes that hole.
#[derive(Debug, Clone)]
pub enum ValidationTarget<'a> {
    Selector {
        selector: &'a str,
        method: ExtractMethod,
    },
    Regex {
        pattern: &'a str,
        selector: &'a str,
        method: ExtractMethod,
        mode: RegexMode,
        match_index: usize,
    },
    Code {
        source: &'a str,
    },
}

/// Parse the snapshot and run the validator the target calls for
pub fn validate(html_input: &str, target: &ValidationTarget<'_>) -> ValidationOutcome {
    let doc = Document::parse(html_input);
    validate_in(&doc, target)
}

/// Run a validator against an already-parsed document
pub fn validate_in(doc: &Document, target: &ValidationTarget<'_>) -> ValidationOutcome {
    match target {
        ValidationTarget::Selector { selector, method } => {
            validate_selector(doc, selector, *method)
        }
        ValidationTarget::Regex {
            pattern,
            selector,
            method,
            mode,
            match_index,
        } => validate_regex(doc, pattern, selector, *method, *mode, *match_index),
        ValidationTarget::Code { source } => validate_code(doc, source),
    }
}

/// User-facing explanation of an outcome, or `None` when there is nothing to say
pub fn outcome_message(target: &ValidationTarget<'_>, outcome: &ValidationOutcome) -> Option<&'static str> {
    match (target, outcome.validity) {
        (ValidationTarget::Selector { .. }, Validity::Invalid) => {
            Some("Selector not found in HTML")
        }
        (ValidationTarget::Selector { .. }, Validity::Indeterminate) => {
            Some("Cannot validate: unsupported selector")
        }
        (ValidationTarget::Regex { .. }, Validity::Invalid) => {
            Some("Regex doesn't match any content")
        }
        (ValidationTarget::Regex { .. }, Validity::Indeterminate) => {
            Some("Cannot validate: unsupported selector")
        }
        (ValidationTarget::Code { .. }, Validity::Invalid) => {
            Some("Code failed or returned null")
        }
        (ValidationTarget::Code { .. }, Validity::Indeterminate) => Some("Cannot validate code"),
        (_, Validity::Valid) => None,
    }
}

/// Validation results for everything one displayed field carries
#[derive(Debug, Clone, Default)]
pub struct FieldValidation {
    pub selector: Option<ValidationOutcome>,
    pub regex: Option<ValidationOutcome>,
    pub code: Option<ValidationOutcome>,
}

/// Validate one extracted field against the snapshot it was produced from.
///
/// The snapshot is parsed once per field; each datum present on the field gets
/// the validator its kind calls for. The code path always checks the
/// JavaScript variant, matching the original behavior of the code panel.
pub fn validate_field(html_input: &str, field: &ExtractedSelector) -> FieldValidation {
    let doc = Document::parse(html_input);
    let mut validation = FieldValidation::default();

    if !field.selector.is_empty() {
        validation.selector = Some(validate_selector(&doc, &field.selector, field.extract_method));
    }
    if !field.regex.is_empty() {
        validation.regex = Some(validate_regex(
            &doc,
            &field.regex,
            &field.selector,
            field.extract_method,
            field.regex_use,
            field.regex_match_index_to_use,
        ));
    }
    if field.has_code() {
        validation.code = Some(validate_code(&doc, &field.java_script_function));
    }

    validation
}

/// Per-datum display state: the latest outcome plus an independent
/// expanded/collapsed flag for long extracted values
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationState {
    pub outcome: ValidationOutcome,
    pub expanded: bool,
}

impl Default for ValidationState {
    /// Neutral default shown before validation runs or when it is turned off
    fn default() -> Self {
        Self {
            outcome: ValidationOutcome::valid_empty(),
            expanded: false,
        }
    }
}

impl ValidationState {
    /// Re-run validation from scratch. Any change to the validated value, the
    /// method, the mode or the selector goes through here; with no HTML
    /// context the state resets to the neutral default instead of keeping a
    /// stale result.
    pub fn refresh(&mut self, html_input: Option<&str>, target: Option<&ValidationTarget<'_>>) {
        self.outcome = match (html_input, target) {
            (Some(html), Some(target)) if !html.is_empty() => validate(html, target),
            _ => ValidationOutcome::valid_empty(),
        };
    }

    pub fn toggle_expanded(&mut self) {
        self.expanded = !self.expanded;
    }

    /// True when the extracted value is long enough to collapse
    pub fn needs_expansion(&self) -> bool {
        self.outcome
            .extracted
            .as_ref()
            .is_some_and(|v| v.chars().count() > PREVIEW_CHAR_LIMIT)
    }

    /// Extracted value as shown: full when expanded or short, otherwise the
    /// first few lines
    pub fn preview(&self) -> Option<String> {
        let value = self.outcome.extracted.as_ref()?;
        if self.expanded || !self.needs_expansion() {
            return Some(value.clone());
        }
        Some(
            value
                .lines()
                .take(PREVIEW_LINE_LIMIT)
                .collect::<Vec<_>>()
                .join("\n"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HTML: &str = r#"
        <html><body>
            <h1>Title</h1>
            <span class="price">Price: 42</span>
            <a href="/p/1" class="link">Product</a>
        </body></html>
    "#;

    fn selector_target(selector: &str) -> ValidationTarget<'_> {
        ValidationTarget::Selector {
            selector,
            method: ExtractMethod::TextContent,
        }
    }

    #[test]
    fn dispatches_by_tag() {
        let outcome = validate(HTML, &selector_target("h1"));
        assert_eq!(outcome, ValidationOutcome::valid("Title"));

        let outcome = validate(
            HTML,
            &ValidationTarget::Regex {
                pattern: r"(\d+)",
                selector: ".price",
                method: ExtractMethod::TextContent,
                mode: RegexMode::Extract,
                match_index: 0,
            },
        );
        assert_eq!(outcome, ValidationOutcome::valid("42"));

        let outcome = validate(
            HTML,
            &ValidationTarget::Code {
                source: "function() { return null; }",
            },
        );
        assert_eq!(outcome.validity, Validity::Invalid);
    }

    #[test]
    fn validation_is_idempotent() {
        let target = selector_target("h1");
        let first = validate(HTML, &target);
        let second = validate(HTML, &target);
        assert_eq!(first, second);
    }

    #[test]
    fn field_validation_gates_on_present_data() {
        let field = ExtractedSelector {
            field: "Title".into(),
            selector: "h1".into(),
            ..Default::default()
        };
        let validation = validate_field(HTML, &field);
        assert!(validation.selector.is_some());
        assert!(validation.regex.is_none());
        assert!(validation.code.is_none());
    }

    #[test]
    fn state_resets_to_neutral_without_context() {
        let mut state = ValidationState::default();
        state.refresh(Some(HTML), Some(&selector_target(".missing")));
        assert_eq!(state.outcome.validity, Validity::Invalid);

        state.refresh(None, None);
        assert_eq!(state.outcome, ValidationOutcome::valid_empty());
    }

    #[test]
    fn preview_collapses_long_values() {
        let mut state = ValidationState::default();
        state.outcome = ValidationOutcome::valid(
            (1..=8).map(|i| format!("line {i} {}", "x".repeat(20))).collect::<Vec<_>>().join("\n"),
        );
        assert!(state.needs_expansion());
        assert_eq!(state.preview().unwrap().lines().count(), PREVIEW_LINE_LIMIT);

        state.toggle_expanded();
        assert_eq!(state.preview().unwrap().lines().count(), 8);
    }

    #[test]
    fn messages_distinguish_failure_from_cannot_validate() {
        let target = selector_target("h1:contains('x')");
        let outcome = validate(HTML, &target);
        assert_eq!(outcome.validity, Validity::Indeterminate);
        assert_eq!(
            outcome_message(&target, &outcome),
            Some("Cannot validate: unsupported selector")
        );

        let target = selector_target(".missing");
        let outcome = validate(HTML, &target);
        assert_eq!(
            outcome_message(&target, &outcome),
            Some("Selector not found in HTML")
        );
    }
}
