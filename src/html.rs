//! HTML parser adapter
//!
//! Wraps the scraper/html5ever document parser behind the small query surface
//! the validators need. Parsing is lenient by design: malformed or empty input
//! still yields a best-effort tree, so this never fails. Documents are
//! re-parsed per validation call; input sizes are bounded by the paste limits
//! of the form, so the redundant work is acceptable.

use scraper::{ElementRef, Html, Selector};

use crate::error::Error;
use crate::types::ExtractMethod;

/// A parsed HTML snapshot, queryable by CSS selector
pub struct Document {
    html: Html,
}

impl Document {
    /// Parse a raw HTML string (possibly a fragment, possibly garbage)
    pub fn parse(input: &str) -> Self {
        Self {
            html: Html::parse_document(input),
        }
    }

    pub(crate) fn tree(&self) -> &Html {
        &self.html
    }

    /// First element matching the selector.
    ///
    /// `Err` means the selector engine rejected the pattern (for example a
    /// pseudo-class it does not implement) and validation cannot run at all;
    /// that is distinct from `Ok(None)`, which means the selector parsed but
    /// matched nothing.
    pub fn query_first(&self, selector: &str) -> Result<Option<ElementRef<'_>>, Error> {
        let parsed = Selector::parse(selector)
            .map_err(|e| Error::UnsupportedSelector(e.to_string()))?;
        Ok(self.html.select(&parsed).next())
    }

    /// All elements matching the selector
    pub fn query_all(&self, selector: &str) -> Result<Vec<ElementRef<'_>>, Error> {
        let parsed = Selector::parse(selector)
            .map_err(|e| Error::UnsupportedSelector(e.to_string()))?;
        Ok(self.html.select(&parsed).collect())
    }

    /// Outer HTML of the first element matching the selector, for display.
    /// Mirrors the result view's raw-HTML panel, messages included.
    pub fn element_html(&self, selector: &str) -> String {
        if selector.is_empty() {
            return "No selector provided".to_string();
        }
        match self.query_first(selector) {
            Ok(Some(element)) => element.html(),
            Ok(None) => "No HTML content found".to_string(),
            Err(_) => format!("Unsupported selector: {selector}"),
        }
    }

    /// `src` of the first matching element, if it is an `<img>`
    pub fn image_src(&self, selector: &str) -> Option<String> {
        if selector.is_empty() {
            return None;
        }
        let element = self.query_first(selector).ok().flatten()?;
        if element.value().name().eq_ignore_ascii_case("img") {
            element.value().attr("src").map(String::from)
        } else {
            None
        }
    }
}

/// Read content off an element per the configured extraction method.
///
/// There is no layout engine here, so `innerText` falls back to the same
/// concatenated text nodes as `textContent`.
pub fn extract_content(element: ElementRef<'_>, method: ExtractMethod) -> String {
    match method {
        ExtractMethod::InnerHtml => element.inner_html(),
        ExtractMethod::TextContent
        | ExtractMethod::InnerText
        | ExtractMethod::Javascript => element.text().collect::<String>(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_malformed_input_without_failing() {
        let doc = Document::parse("<div><p>unclosed");
        assert!(doc.query_first("p").unwrap().is_some());

        let empty = Document::parse("");
        assert!(empty.query_first("p").unwrap().is_none());

        let garbage = Document::parse(">>>%%% not html at all");
        assert!(garbage.query_first("div").unwrap().is_none());
    }

    #[test]
    fn query_first_takes_first_match_only() {
        let doc = Document::parse(r#"<div class="price">$19.99</div><div class="price">$29.99</div>"#);
        let first = doc.query_first(".price").unwrap().unwrap();
        assert_eq!(extract_content(first, ExtractMethod::TextContent), "$19.99");
        assert_eq!(doc.query_all(".price").unwrap().len(), 2);
    }

    #[test]
    fn unsupported_selector_is_an_error_not_a_miss() {
        let doc = Document::parse("<p>hi</p>");
        assert!(matches!(
            doc.query_first("p:contains('hi')"),
            Err(Error::UnsupportedSelector(_))
        ));
    }

    #[test]
    fn element_html_messages() {
        let doc = Document::parse("<h1>Title</h1>");
        assert_eq!(doc.element_html("h1"), "<h1>Title</h1>");
        assert_eq!(doc.element_html(".missing"), "No HTML content found");
        assert_eq!(doc.element_html(""), "No selector provided");
        assert!(doc.element_html("h1:contains('x')").starts_with("Unsupported selector"));
    }

    #[test]
    fn image_src_only_for_img_elements() {
        let doc = Document::parse(r#"<img class="hero" src="/a.png"><div class="hero"></div>"#);
        assert_eq!(doc.image_src("img.hero"), Some("/a.png".to_string()));
        assert_eq!(doc.image_src("div.hero"), None);
        assert_eq!(doc.image_src(""), None);
    }

    #[test]
    fn extract_methods() {
        let doc = Document::parse("<div><b>bold</b> text</div>");
        let el = doc.query_first("div").unwrap().unwrap();
        assert_eq!(extract_content(el, ExtractMethod::TextContent), "bold text");
        assert_eq!(extract_content(el, ExtractMethod::InnerHtml), "<b>bold</b> text");
    }
}
