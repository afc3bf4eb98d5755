//! Rendering of the API's HTML name strings.
//!
//! Names arrive as small HTML fragments (`<span class="wfo-name"><i>Rosa</i></span> L.`).
//! Pages need two forms: plain text for file names and link targets, and
//! markdown for headings.

use scraper::Html;

/// Visible text of an HTML fragment with whitespace collapsed.
pub fn html_to_plain(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let text: String = fragment.root_element().text().collect();
    collapse_whitespace(&text)
}

/// Markdown for an HTML fragment; falls back to plain text if conversion fails.
pub fn html_to_markdown(html: &str) -> String {
    let conv = htmd::HtmlToMarkdown::builder().build();
    match conv.convert(html) {
        Ok(md) => collapse_whitespace(&md),
        Err(e) => {
            tracing::debug!("markdown conversion failed, using plain text: {e}");
            html_to_plain(html)
        }
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
