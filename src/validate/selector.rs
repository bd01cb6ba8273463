//! CSS selector validation
//!
//! Applies a selector to the parsed snapshot and reports whether it finds
//! anything. Only the first match is ever used; there is no fallback to
//! subsequent matches.

use crate::error::Error;
use crate::html::{extract_content, Document};
use crate::types::ExtractMethod;

use super::ValidationOutcome;

/// Validate a selector and extract the first match's content.
///
/// Empty selector → invalid. Selector the engine cannot parse → indeterminate.
/// Zero matches → invalid. One or more matches → valid, with the first match's
/// content per the extraction method, trimmed for display.
pub fn validate_selector(doc: &Document, selector: &str, method: ExtractMethod) -> ValidationOutcome {
    if selector.is_empty() {
        return ValidationOutcome::invalid();
    }

    match doc.query_first(selector) {
        Err(Error::UnsupportedSelector(_)) => ValidationOutcome::indeterminate(),
        Err(_) => ValidationOutcome::invalid(),
        Ok(None) => ValidationOutcome::invalid(),
        Ok(Some(element)) => {
            let content = extract_content(element, method);
            ValidationOutcome::valid(content.trim())
        }
    }
}
