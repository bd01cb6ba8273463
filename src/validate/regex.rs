//! Regex validation
//!
//! Runs a pattern against the normalized content of the element its selector
//! resolves to, either pulling a substring out (`extract`) or stripping one
//! (`omit`). The pattern is used verbatim; a pattern this engine cannot
//! compile counts as a caught evaluation failure, not an error.

use regex::Regex;

use crate::error::Error;
use crate::html::{extract_content, Document};
use crate::types::{ExtractMethod, RegexMode};

use super::ValidationOutcome;

/// Normalize raw element content before the regex runs: trim, collapse
/// whitespace runs (including non-breaking spaces) to a single space, and
/// flatten any literal `&nbsp;` entities that survived parsing.
fn normalize_content(raw: &str) -> String {
    let ws = Regex::new(r"\s+").unwrap();
    ws.replace_all(raw.trim(), " ").replace("&nbsp;", " ")
}

/// Validate a regex against the content its selector locates.
///
/// An empty pattern is trivially valid with no extracted value, distinct from
/// "ran and matched nothing". A missing selector or an unmatched one is
/// invalid; unsupported selector syntax propagates as indeterminate.
pub fn validate_regex(
    doc: &Document,
    pattern: &str,
    selector: &str,
    method: ExtractMethod,
    mode: RegexMode,
    match_index: usize,
) -> ValidationOutcome {
    if pattern.is_empty() {
        return ValidationOutcome::valid_empty();
    }
    if selector.is_empty() {
        return ValidationOutcome::invalid();
    }

    let element = match doc.query_first(selector) {
        Err(Error::UnsupportedSelector(_)) => return ValidationOutcome::indeterminate(),
        Err(_) | Ok(None) => return ValidationOutcome::invalid(),
        Ok(Some(element)) => element,
    };

    let content = normalize_content(&extract_content(element, method));

    let regex = match Regex::new(pattern) {
        Ok(regex) => regex,
        // Malformed pattern: caught here, downgraded to invalid
        Err(_) => return ValidationOutcome::invalid(),
    };

    match mode {
        RegexMode::Extract => match regex.captures(&content) {
            Some(caps) => {
                // Fall back to the whole match when the requested group is
                // absent or empty, mirroring `match[i] || match[0]`
                let group = caps
                    .get(match_index)
                    .map(|m| m.as_str())
                    .filter(|s| !s.is_empty())
                    .or_else(|| caps.get(0).map(|m| m.as_str()))
                    .unwrap_or_default();
                ValidationOutcome::valid(group.trim())
            }
            None => ValidationOutcome::invalid(),
        },
        RegexMode::Omit => {
            // First occurrence only: the original built its RegExp without
            // the global flag
            let cleaned = regex.replace(&content, "").trim().to_string();
            if cleaned != content {
                ValidationOutcome::valid(cleaned)
            } else {
                ValidationOutcome::invalid()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::Validity;

    const HTML: &str = r#"
        <html><body>
            <span class="price">
                Price:&nbsp;  42
            </span>
            <div class="cost">Cost $42 today</div>
        </body></html>
    "#;

    fn run(pattern: &str, selector: &str, mode: RegexMode, index: usize) -> ValidationOutcome {
        let doc = Document::parse(HTML);
        validate_regex(&doc, pattern, selector, ExtractMethod::TextContent, mode, index)
    }

    #[test]
    fn normalization_collapses_whitespace_and_nbsp() {
        assert_eq!(normalize_content("  a \n\t b  "), "a b");
        assert_eq!(normalize_content("a\u{a0}b"), "a b");
        assert_eq!(normalize_content("a&nbsp;b"), "a b");
    }

    #[test]
    fn extract_mode_capture_group() {
        let outcome = run(r"(\d+)", ".price", RegexMode::Extract, 1);
        assert_eq!(outcome, ValidationOutcome::valid("42"));
    }

    #[test]
    fn extract_mode_group_zero_is_full_match() {
        let outcome = run(r"(\d+)", ".price", RegexMode::Extract, 0);
        // Content normalized to "Price: 42"; group 0 is the full match
        assert_eq!(outcome, ValidationOutcome::valid("42"));
    }

    #[test]
    fn extract_mode_out_of_range_index_falls_back_to_full_match() {
        let outcome = run(r"Price: (\d+)", ".price", RegexMode::Extract, 7);
        assert_eq!(outcome, ValidationOutcome::valid("Price: 42"));
    }

    #[test]
    fn extract_mode_no_match_is_invalid() {
        let outcome = run(r"[A-Z]{10}", ".price", RegexMode::Extract, 0);
        assert_eq!(outcome.validity, Validity::Invalid);
    }

    #[test]
    fn omit_mode_removes_first_match() {
        let outcome = run(r"\$\d+", ".cost", RegexMode::Omit, 0);
        assert_eq!(outcome, ValidationOutcome::valid("Cost  today"));
    }

    #[test]
    fn omit_result_never_contains_the_pattern() {
        let outcome = run(r"\$\d+", ".cost", RegexMode::Omit, 0);
        let cleaned = outcome.extracted.unwrap();
        assert!(!Regex::new(r"\$\d+").unwrap().is_match(&cleaned));
    }

    #[test]
    fn omit_mode_nothing_removed_is_invalid() {
        let outcome = run(r"XYZ", ".cost", RegexMode::Omit, 0);
        assert_eq!(outcome.validity, Validity::Invalid);
    }

    #[test]
    fn empty_pattern_is_trivially_valid() {
        let outcome = run("", ".price", RegexMode::Extract, 0);
        assert_eq!(outcome, ValidationOutcome::valid_empty());
    }

    #[test]
    fn missing_selector_is_invalid() {
        let outcome = run(r"\d+", "", RegexMode::Extract, 0);
        assert_eq!(outcome.validity, Validity::Invalid);

        let outcome = run(r"\d+", ".missing", RegexMode::Extract, 0);
        assert_eq!(outcome.validity, Validity::Invalid);
    }

    #[test]
    fn unsupported_selector_propagates_as_indeterminate() {
        let outcome = run(r"\d+", ".price:contains('42')", RegexMode::Extract, 0);
        assert_eq!(outcome.validity, Validity::Indeterminate);
    }

    #[test]
    fn malformed_pattern_is_caught_as_invalid() {
        let outcome = run(r"(\d+", ".price", RegexMode::Extract, 0);
        assert_eq!(outcome.validity, Validity::Invalid);
        assert!(outcome.extracted.is_none());
    }
}
