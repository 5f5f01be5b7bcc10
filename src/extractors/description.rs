// src/extractors/description.rs
//! Job detail pages: the `<article>` body as light markdown and the job
//! object embedded in the page's `__NEXT_DATA__` script.

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Node, Selector};
use serde::Deserialize;

use crate::utils::error::ExtractError;

static ARTICLE_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("article").expect("Failed to parse ARTICLE_SELECTOR")
});

static NEXT_DATA_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("script#__NEXT_DATA__").expect("Failed to parse NEXT_DATA_SELECTOR")
});

#[derive(Debug, Clone)]
pub struct JobDetail {
    /// Markdown rendering of the article; empty when the page has none.
    pub description: String,
    /// `props.pageProps.job`, if the page embeds it.
    pub job: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct NextData {
    props: NextProps,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NextProps {
    page_props: PageProps,
}

#[derive(Deserialize)]
struct PageProps {
    job: Option<serde_json::Value>,
}

pub fn extract_detail(html: &str) -> Result<JobDetail, ExtractError> {
    let document = Html::parse_document(html);

    let description = document
        .select(&ARTICLE_SELECTOR)
        .next()
        .map(article_to_markdown)
        .unwrap_or_default();

    let job = match document.select(&NEXT_DATA_SELECTOR).next() {
        Some(script) => {
            let text: String = script.text().collect();
            let data: NextData = serde_json::from_str(&text)
                .map_err(|e| ExtractError::HtmlParse(format!("__NEXT_DATA__: {}", e)))?;
            data.props.page_props.job
        }
        None => {
            tracing::debug!("No __NEXT_DATA__ script on detail page");
            None
        }
    };

    Ok(JobDetail { description, job })
}

/// Replaces the invisible and typographic characters the site sprinkles
/// into descriptions.
pub fn sanitize_text(text: &str) -> String {
    text.replace(['\u{a0}', '\u{200b}', '\u{202f}'], " ").replace('\u{2019}', "'")
}

pub fn article_to_markdown(article: ElementRef<'_>) -> String {
    let mut md = MarkdownWriter::default();
    md.walk(article);
    md.finish()
}

#[derive(Default)]
struct MarkdownWriter {
    blocks: Vec<(String, bool)>,
    line: String,
    in_item: bool,
    list_depth: usize,
}

impl MarkdownWriter {
    fn walk(&mut self, element: ElementRef<'_>) {
        for child in element.children() {
            match child.value() {
                Node::Text(text) => self.push_text(&sanitize_text(text)),
                Node::Element(_) => {
                    if let Some(el) = ElementRef::wrap(child) {
                        self.element(el);
                    }
                }
                _ => {}
            }
        }
    }

    fn element(&mut self, el: ElementRef<'_>) {
        let name = el.value().name();
        match name {
            "script" | "style" => {}
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let level = name[1..].parse::<usize>().unwrap_or(1);
                self.flush();
                self.line.push_str(&"#".repeat(level));
                self.line.push(' ');
                self.walk(el);
                self.flush();
            }
            "ul" | "ol" => {
                self.flush();
                self.list_depth += 1;
                self.walk(el);
                self.list_depth -= 1;
                self.flush();
            }
            "li" => {
                self.flush();
                self.line.push_str(&"  ".repeat(self.list_depth.saturating_sub(1)));
                self.line.push_str("- ");
                self.in_item = true;
                self.walk(el);
                self.flush();
            }
            "p" | "div" | "section" | "article" => {
                self.flush();
                self.walk(el);
                self.flush();
            }
            "br" => self.line.push('\n'),
            "strong" | "b" => self.wrap(el, "**"),
            "em" | "i" => self.wrap(el, "*"),
            _ => self.walk(el),
        }
    }

    fn wrap(&mut self, el: ElementRef<'_>, marker: &str) {
        let inner: String = el.text().collect::<String>();
        if inner.trim().is_empty() {
            return;
        }
        self.push_text(" ");
        self.line.push_str(marker);
        self.walk(el);
        self.line.truncate(self.line.trim_end().len());
        self.line.push_str(marker);
    }

    fn push_text(&mut self, text: &str) {
        let words: Vec<&str> = text.split_whitespace().collect();
        let leading = text.starts_with(char::is_whitespace);
        let trailing = text.ends_with(char::is_whitespace);

        let open = self.line.is_empty() || self.line.ends_with([' ', '\n']);
        if (leading || words.is_empty()) && !open && !text.is_empty() {
            self.line.push(' ');
        }
        self.line.push_str(&words.join(" "));
        if trailing && !words.is_empty() {
            self.line.push(' ');
        }
    }

    fn flush(&mut self) {
        let trimmed = self.line.trim();
        let content = trimmed != "-" && !trimmed.trim_start_matches('#').trim().is_empty();
        if content {
            let block = self.line.trim_end().trim_start_matches('\n').to_string();
            self.blocks.push((block, self.in_item));
        }
        self.line.clear();
        self.in_item = false;
    }

    fn finish(mut self) -> String {
        self.flush();
        let mut out = String::new();
        let mut prev_item = false;
        for (i, (block, item)) in self.blocks.iter().enumerate() {
            if i > 0 {
                out.push_str(if prev_item && *item { "\n" } else { "\n\n" });
            }
            out.push_str(block);
            prev_item = *item;
        }
        if !out.is_empty() {
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><body>
        <article>
          <h2>About the role</h2>
          <p>We build   anvils.&nbsp;It’s <strong>fun</strong>.</p>
          <ul>
            <li>Rust</li>
            <li>SQL<ul><li>Postgres</li></ul></li>
          </ul>
          <p>Apply\u{200b}today</p>
        </article>
        <script id="__NEXT_DATA__" type="application/json">
          {"props":{"pageProps":{"job":{"id":"abc","job_information":{"title":"Data Scientist"}}}}}
        </script>
    </body></html>"#;

    #[test]
    fn article_renders_as_markdown() {
        let detail = extract_detail(&PAGE.replace("\\u{200b}", "\u{200b}")).unwrap();
        assert_eq!(
            detail.description,
            "## About the role\n\nWe build anvils. It's **fun**.\n\n- Rust\n- SQL\n  - Postgres\n\nApply today\n"
        );
    }

    #[test]
    fn next_data_job_is_extracted() {
        let detail = extract_detail(PAGE).unwrap();
        let job = detail.job.unwrap();
        assert_eq!(job["id"], "abc");
        assert_eq!(job["job_information"]["title"], "Data Scientist");
    }

    #[test]
    fn missing_parts_are_empty_not_errors() {
        let detail = extract_detail("<html><body><p>gone</p></body></html>").unwrap();
        assert!(detail.description.is_empty());
        assert!(detail.job.is_none());
    }

    #[test]
    fn malformed_next_data_is_an_error() {
        let html = r#"<script id="__NEXT_DATA__">{not json</script>"#;
        assert!(matches!(extract_detail(html), Err(ExtractError::HtmlParse(_))));
    }

    #[test]
    fn sanitize_replaces_invisible_characters() {
        assert_eq!(sanitize_text("a\u{a0}b\u{202f}c\u{200b}d’s"), "a b c d's");
    }
}
