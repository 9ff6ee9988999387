use std::sync::LazyLock;

use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd};
use regex::Regex;

static HTML_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->|<[^>]*>").unwrap());

/// Render markdown to the plain text a reader would see.
///
/// Keeps prose, link text, inline code and code block contents. Drops link
/// targets, images and markup. Raw HTML keeps its text but loses its tags.
/// Every block ends with a newline.
#[must_use]
pub fn to_plain_text(input: &str) -> String {
    let parser = Parser::new_ext(input, Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH);
    let mut renderer = PlainTextRenderer::new(input.len());
    for event in parser {
        renderer.push_event(event);
    }
    renderer.finish()
}

struct PlainTextRenderer {
    output: String,
    html: String,
    image_depth: usize,
}

impl PlainTextRenderer {
    fn new(capacity: usize) -> Self {
        Self {
            output: String::with_capacity(capacity),
            html: String::new(),
            image_depth: 0,
        }
    }

    fn push_event(&mut self, event: Event<'_>) {
        if let Event::Html(raw) | Event::InlineHtml(raw) = &event {
            self.html.push_str(raw);
            return;
        }
        self.flush_html();

        match event {
            Event::Start(Tag::Image { .. }) => self.image_depth += 1,
            Event::End(TagEnd::Image) => self.image_depth = self.image_depth.saturating_sub(1),
            Event::Text(text) | Event::Code(text) if self.image_depth == 0 => {
                self.output.push_str(&text);
            }
            Event::SoftBreak | Event::HardBreak if self.image_depth == 0 => {
                self.output.push('\n');
            }
            Event::End(
                TagEnd::Paragraph
                | TagEnd::Heading(_)
                | TagEnd::BlockQuote(_)
                | TagEnd::CodeBlock
                | TagEnd::HtmlBlock
                | TagEnd::Item
                | TagEnd::TableHead
                | TagEnd::TableRow,
            )
            | Event::Start(Tag::List(_))
            | Event::Rule => self.end_block(),
            Event::End(TagEnd::TableCell) => self.output.push(' '),
            _ => {}
        }
    }

    fn end_block(&mut self) {
        if !self.output.is_empty() && !self.output.ends_with('\n') {
            self.output.push('\n');
        }
    }

    fn flush_html(&mut self) {
        if self.html.is_empty() {
            return;
        }
        let text = HTML_TAG.replace_all(&self.html, "");
        self.output.push_str(&text);
        self.html.clear();
    }

    fn finish(mut self) -> String {
        self.flush_html();
        self.end_block();
        self.output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heading_and_paragraph() {
        let text = to_plain_text("# Title\n\nSome *emphasis* and **bold** text.");
        assert_eq!(text, "Title\nSome emphasis and bold text.\n");
    }

    #[test]
    fn link_keeps_text_drops_url() {
        let text = to_plain_text("See [the docs](https://example.com/docs) now.");
        assert_eq!(text, "See the docs now.\n");
        assert!(!text.contains("example.com"));
    }

    #[test]
    fn image_is_dropped() {
        let text = to_plain_text("Before ![logo alt](logo.png) after");
        assert_eq!(text, "Before  after\n");
    }

    #[test]
    fn code_is_kept() {
        let text = to_plain_text("Call `foo()`:\n\n```rust\nfoo();\nbar();\n```\n");
        assert_eq!(text, "Call foo():\nfoo();\nbar();\n");
    }

    #[test]
    fn html_tags_stripped_text_kept() {
        let text = to_plain_text("<div align=\"center\">\n<b>Hello</b>\n</div>\n\nBody");
        assert!(text.contains("Hello"));
        assert!(text.contains("Body"));
        assert!(!text.contains('<'));
        assert!(!text.contains("center"));
    }

    #[test]
    fn inline_html_stripped() {
        let text = to_plain_text("a <kbd>Ctrl</kbd> b");
        assert_eq!(text, "a Ctrl b\n");
    }

    #[test]
    fn list_items_on_separate_lines() {
        let text = to_plain_text("- one\n- two\n- three\n");
        assert_eq!(text, "one\ntwo\nthree\n");
    }

    #[test]
    fn nested_list_items_do_not_run_together() {
        let text = to_plain_text("- outer\n  - inner\n");
        assert_eq!(text, "outer\ninner\n");
    }

    #[test]
    fn single_paragraph_gains_one_newline() {
        let body = "x".repeat(299);
        assert_eq!(to_plain_text(&body).len(), 300);
    }

    #[test]
    fn empty_input_is_empty() {
        assert_eq!(to_plain_text(""), "");
    }

    #[test]
    fn entities_are_decoded() {
        assert_eq!(to_plain_text("a &amp; b"), "a & b\n");
    }
}
