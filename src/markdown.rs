//! Markdown to sanitized HTML.
//!
//! Book descriptions and review texts are stored as markdown and rendered on
//! every display. The output only ever contains the tags in
//! [`ALLOWED_HTML_TAGS`], without attributes.

use crate::constants::ALLOWED_HTML_TAGS;
use ammonia::Builder;
use once_cell::sync::Lazy;
use pulldown_cmark::{html, Options, Parser};

static SANITIZER: Lazy<Builder<'static>> = Lazy::new(|| {
    let mut builder = Builder::empty();
    builder
        .add_tags(ALLOWED_HTML_TAGS.iter().copied())
        .add_clean_content_tags(["script", "style"].iter().copied())
        .strip_comments(true);
    builder
});

/// Generates a string of sanitized HTML from an &str of markdown.
pub fn render(input: &str) -> String {
    let parser = Parser::new_ext(input, Options::empty());
    let mut unsafe_html = String::with_capacity(input.len() * 3 / 2);
    html::push_html(&mut unsafe_html, parser);
    SANITIZER.clean(&unsafe_html).to_string()
}

#[cfg(test)]
mod tests {
    use super::render;

    #[test]
    fn test_paragraph_and_emphasis() {
        let out = render("Hello **bold** and *em*");
        assert!(out.starts_with("<p>Hello <strong>bold</strong> and <em>em</em></p>"));
    }

    #[test]
    fn test_headings_lists_and_code_survive() {
        let out = render("# Title\n\n- one\n- two\n\n```\nlet x = 1;\n```\n");
        assert!(out.contains("<h1>Title</h1>"));
        assert!(out.contains("<ul>"));
        assert!(out.contains("<li>one</li>"));
        assert!(out.contains("<pre><code>let x = 1;\n</code></pre>"));
    }

    #[test]
    fn test_links_and_images_are_stripped_not_escaped() {
        let out = render("[site](http://example.com) ![alt](http://example.com/x.png)");
        assert!(!out.contains("<a"));
        assert!(!out.contains("<img"));
        assert!(!out.contains("&lt;a"));
        assert!(out.contains("site"));
    }

    #[test]
    fn test_raw_html_is_sanitized() {
        let out = render("<script>alert(1)</script>\n\n<p onclick=\"x()\">hi</p>");
        assert!(!out.contains("script"));
        assert!(!out.contains("alert"));
        assert!(!out.contains("onclick"));
        assert!(out.contains("hi"));
    }

    #[test]
    fn test_h4_is_not_allowed() {
        let out = render("#### Small");
        assert!(!out.contains("<h4>"));
        assert!(out.contains("Small"));
    }
}
