//! Body normalization
//!
//! Turns the raw HTML and text bodies into the single lowercase stream the
//! code rules scan. Only the text a reader sees survives: attributes
//! (tracking pixel IDs, colours, widths) and script/style blocks never reach
//! the rules, and entities such as `&#8217;` are decoded rather than scanned.

use scraper::node::Node;
use scraper::{Html, Selector};
use std::sync::LazyLock;

static BODY_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("body").unwrap());

/// Treat absent, empty and whitespace-only bodies alike
pub fn non_empty(body: Option<&str>) -> Option<&str> {
    body.filter(|b| !b.trim().is_empty())
}

/// Cut a body down to `max_bytes`, backing off to a char boundary
pub fn truncate_body(body: &str, max_bytes: usize) -> &str {
    if body.len() <= max_bytes {
        return body;
    }
    let mut end = max_bytes;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}

/// Visible text of an HTML body, one space between text nodes
pub fn visible_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let Some(body) = document.select(&BODY_SELECTOR).next() else {
        return String::new();
    };

    let mut text_parts = Vec::new();

    // Walk all descendants, skip script/style/noscript subtrees
    for node_ref in body.descendants() {
        if let Node::Text(text_node) = node_ref.value() {
            let in_excluded = node_ref.ancestors().any(|ancestor| {
                ancestor
                    .value()
                    .as_element()
                    .map(|el| matches!(el.name(), "script" | "style" | "noscript"))
                    .unwrap_or(false)
            });

            if !in_excluded {
                let trimmed = text_node.trim();
                if !trimmed.is_empty() {
                    text_parts.push(trimmed.to_string());
                }
            }
        }
    }

    text_parts.join(" ")
}

/// Lowercase text body followed by the visible text of the HTML body
pub fn clean_content(html: Option<&str>, text: Option<&str>) -> String {
    let mut content = String::new();
    if let Some(text) = text {
        content.push_str(text);
    }
    if let Some(html) = html {
        if !content.is_empty() {
            content.push(' ');
        }
        content.push_str(&visible_text(html));
    }
    content.to_lowercase()
}

/// Decode the `&amp;` escapes a URL picks up inside an HTML attribute
pub fn decode_amp(url: &str) -> String {
    url.replace("&amp;", "&")
}

/// Collapse runs of whitespace to single spaces
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visible_text_hides_attribute_digits() {
        let html = r#"<img src="https://t.example/p.gif?id=998877" width="1"><p>Hello</p>"#;
        let stripped = visible_text(html);
        assert!(!stripped.contains("998877"));
        assert!(stripped.contains("Hello"));
    }

    #[test]
    fn test_visible_text_drops_style_blocks() {
        let html = "<style>\n.btn { color: #123456; }\n</style><p>Welcome</p><script>var n = 654321;</script><noscript>112233</noscript>";
        let stripped = visible_text(html);
        assert!(!stripped.contains("123456"));
        assert!(!stripped.contains("654321"));
        assert!(!stripped.contains("112233"));
        assert!(stripped.contains("Welcome"));
    }

    #[test]
    fn test_visible_text_decodes_entities() {
        let html = "<p>We&#8217;re glad &#8212; welcome &#128075;&#8203;</p><p>Tom &amp; Jerry</p>";
        let text = visible_text(html);
        assert_eq!(text, "We\u{2019}re glad \u{2014} welcome \u{1f44b}\u{200b} Tom & Jerry");
        assert!(!text.chars().any(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_clean_content_concatenates_and_lowercases() {
        let content = clean_content(Some("<b>Your CODE</b>"), Some("Plain PART"));
        assert_eq!(normalize_whitespace(&content), "plain part your code");
    }

    #[test]
    fn test_non_empty() {
        assert_eq!(non_empty(Some("  \n\t ")), None);
        assert_eq!(non_empty(None), None);
        assert_eq!(non_empty(Some(" x ")), Some(" x "));
    }

    #[test]
    fn test_truncate_body_respects_char_boundary() {
        let body = "ab\u{e9}cd";
        assert_eq!(truncate_body(body, 3), "ab");
        assert_eq!(truncate_body(body, 4), "ab\u{e9}");
        assert_eq!(truncate_body(body, 100), body);
    }

    #[test]
    fn test_decode_amp() {
        assert_eq!(decode_amp("https://ex.com/a?x=1&amp;y=2"), "https://ex.com/a?x=1&y=2");
    }
}
