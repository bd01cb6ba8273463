//! Extraction function validation
//!
//! The API returns extraction code as a plain `function(document) { ... }`
//! string. The body is lifted out with a shape check, run in the sandboxed
//! interpreter, and the result classified: a nullish return means the code ran
//! but found nothing, a throw or syntax error means it failed, and code the
//! sandbox cannot express cannot be judged either way.

use regex::Regex;

use crate::html::Document;

use super::js::{run_function, Completion, JsError};
use super::ValidationOutcome;

/// Lift the parameter list and body out of a `function(...) { ... }` string.
/// Anonymous classic functions only; arrows and named functions do not match.
fn function_parts(source: &str) -> Option<(&str, &str)> {
    // Static pattern, compiles by construction
    let shape = Regex::new(r"(?s)function\s*\(([^)]*)\)\s*\{(.*)\}$").unwrap();
    let caps = shape.captures(source)?;
    let params = caps.get(1).map(|m| m.as_str()).unwrap_or("");
    let body = caps.get(2).map(|m| m.as_str()).unwrap_or("");
    Some((params, body))
}

/// Validate an extraction function against the parsed snapshot.
///
/// Empty source or source that is not an anonymous function is invalid, as is
/// code that throws, fails to parse, or returns `null`/`undefined`. Code that
/// leans on constructs the sandbox does not model is indeterminate. Any other
/// return value is stringified and trimmed for display.
pub fn validate_code(doc: &Document, source: &str) -> ValidationOutcome {
    let Some((params, body)) = function_parts(source.trim()) else {
        return ValidationOutcome::invalid();
    };
    let param = params.split(',').next().unwrap_or("").trim();

    match run_function(doc, param, body) {
        Ok(Completion::Value(value)) => ValidationOutcome::valid(value.trim()),
        Ok(Completion::Nullish) => ValidationOutcome::invalid(),
        Err(JsError::Throw(_)) | Err(JsError::Syntax) => ValidationOutcome::invalid(),
        Err(JsError::Unsupported(_)) => ValidationOutcome::indeterminate(),
    }
}
