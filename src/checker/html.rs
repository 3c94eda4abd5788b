// src/checker/html.rs
// =============================================================================
// This module extracts link references from HTML pages.
//
// We use the `scraper` crate which:
// - Parses HTML into a DOM (Document Object Model)
// - Supports CSS selectors for finding elements
// - Is built on html5ever (Mozilla's HTML parser)
//
// What counts as a reference:
// - <a href>, <img src>, <script src>, <iframe src>
// - <link href> for stylesheets and icons (not preconnect/dns-prefetch hints,
//   those point at hosts, not documents)
//
// References are resolved against <base href> (if the page has one) or the
// page URL. A reference that cannot be resolved is returned untouched so the
// crawler can still count it as ignored.
// =============================================================================

use scraper::{Html, Selector};
use std::sync::OnceLock;
use url::Url;

// (CSS selector, attribute holding the URL)
const SOURCES: &[(&str, &str)] = &[
    ("a[href]", "href"),
    ("img[src]", "src"),
    ("script[src]", "src"),
    ("iframe[src]", "src"),
    ("link[rel~=\"stylesheet\"][href]", "href"),
    ("link[rel~=\"icon\"][href]", "href"),
];

static SELECTORS: OnceLock<Vec<(Selector, &'static str)>> = OnceLock::new();

fn selectors() -> &'static [(Selector, &'static str)] {
    SELECTORS.get_or_init(|| {
        SOURCES
            .iter()
            .filter_map(|(css, attr)| Selector::parse(css).ok().map(|s| (s, *attr)))
            .collect()
    })
}

// Extracts all link references from HTML content
//
// Parameters:
//   html: the HTML content to parse
//   page_url: the URL the page was fetched from
//
// Returns: absolute URLs where possible, raw references otherwise, in
// document order (duplicates included; dedup is the crawl index's job)
//
// Example:
//   html = "<a href='/docs'>Docs</a>"
//   page_url = "https://example.com/page"
//   result = ["https://example.com/docs"]
pub fn extract_links(html: &str, page_url: &Url) -> Vec<String> {
    let document = Html::parse_document(html);
    let base = document_base(&document, page_url);

    let mut links = Vec::new();
    for (selector, attr) in selectors() {
        for element in document.select(selector) {
            if let Some(reference) = element.value().attr(attr) {
                if let Some(link) = resolve_reference(&base, reference) {
                    links.push(link);
                }
            }
        }
    }

    links
}

// Honors <base href="..."> if present and valid
fn document_base(document: &Html, page_url: &Url) -> Url {
    let Ok(selector) = Selector::parse("base[href]") else {
        return page_url.clone();
    };

    document
        .select(&selector)
        .next()
        .and_then(|element| element.value().attr("href"))
        .and_then(|href| page_url.join(href.trim()).ok())
        .unwrap_or_else(|| page_url.clone())
}

// Resolves a possibly-relative reference
//
// Examples, base = "https://example.com/page":
//   "/docs"             -> Some("https://example.com/docs")
//   "#section"          -> None (same page)
//   ""                  -> None
//   "mailto:a@b.c"      -> Some("mailto:a@b.c") (the crawler ignores it)
//   "http://[broken"    -> Some("http://[broken") (kept raw)
fn resolve_reference(base: &Url, reference: &str) -> Option<String> {
    let reference = reference.trim();
    if reference.is_empty() || reference.starts_with('#') {
        return None;
    }

    match base.join(reference) {
        Ok(url) => Some(url.to_string()),
        Err(_) => Some(reference.to_string()),
    }
}
