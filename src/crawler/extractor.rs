//! Content extraction from fetched HTML
//!
//! This module turns a page's markup into a [`PageRecord`] plus the raw
//! lists of outbound links and image references:
//! - Title (falls back to `Untitled`) and meta description
//! - Main-content text from the first matching content-area selector
//! - Heading outline (h1 to h6) in document order
//! - Anchor targets and image sources, resolved to absolute http(s) URLs
//!
//! Malformed markup never fails extraction; missing parts come back empty.

use crate::storage::{Heading, PageRecord};
use chrono::Utc;
use scraper::{ElementRef, Html, Node, Selector};
use std::collections::HashSet;
use url::Url;

/// Title used when a page has no `<title>`
pub const UNTITLED: &str = "Untitled";

/// Elements whose text never counts as page content
const NON_CONTENT_TAGS: &[&str] = &["script", "style", "nav", "footer", "header", "aside"];

/// Content-area selectors, most specific first; `body` is the fallback
const CONTENT_SELECTORS: &[&str] = &[
    "main",
    "article",
    ".content",
    ".main-content",
    "#content",
    "#main",
    ".post-content",
    ".entry-content",
    "div[role=\"main\"]",
];

/// Everything extracted from one page
#[derive(Debug, Clone)]
pub struct ExtractedPage {
    pub record: PageRecord,
    /// Anchor targets in document order, unfiltered
    pub links: Vec<Url>,
    /// Image sources in document order, deduplicated
    pub images: Vec<Url>,
}

/// Extracts page data from HTML
///
/// # Arguments
///
/// * `html` - The page markup
/// * `url` - The URL the page was requested at (stored on the record)
/// * `base_url` - The URL relative references resolve against (after redirects)
/// * `depth` - The depth the page was fetched at
/// * `status_code` - The HTTP status of the response
///
/// # Example
///
/// ```
/// use pagefold::crawler::extract_page;
/// use url::Url;
///
/// let html = r#"<html><head><title>Docs</title></head>
///               <body><main><h1>Intro</h1><p>Hello</p><a href="/next">Next</a></main></body></html>"#;
/// let url = Url::parse("https://example.com/").unwrap();
/// let page = extract_page(html, &url, &url, 0, 200);
/// assert_eq!(page.record.title, "Docs");
/// assert_eq!(page.record.content, "Intro Hello Next");
/// assert_eq!(page.links[0].as_str(), "https://example.com/next");
/// ```
pub fn extract_page(
    html: &str,
    url: &Url,
    base_url: &Url,
    depth: u32,
    status_code: u16,
) -> ExtractedPage {
    let document = Html::parse_document(html);

    let images = extract_images(&document, base_url);

    let record = PageRecord {
        url: url.to_string(),
        title: extract_title(&document),
        description: extract_description(&document),
        content: extract_content(&document),
        headings: extract_headings(&document),
        depth,
        fetched_at: Utc::now(),
        status_code,
        images: images.iter().map(Url::to_string).collect(),
    };

    ExtractedPage {
        record,
        links: extract_links(&document, base_url),
        images,
    }
}

fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn is_non_content(element: &ElementRef<'_>) -> bool {
    NON_CONTENT_TAGS.contains(&element.value().name())
}

/// True if the element or any ancestor is a non-content element
fn inside_non_content(element: &ElementRef<'_>) -> bool {
    if is_non_content(element) {
        return true;
    }
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .any(|ancestor| is_non_content(&ancestor))
}

/// Collects text nodes below `element`, skipping non-content subtrees
fn collect_text(element: ElementRef<'_>, out: &mut Vec<String>) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => {
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    out.push(trimmed.to_string());
                }
            }
            Node::Element(_) => {
                if let Some(child_element) = ElementRef::wrap(child) {
                    if !is_non_content(&child_element) {
                        collect_text(child_element, out);
                    }
                }
            }
            _ => {}
        }
    }
}

fn extract_title(document: &Html) -> String {
    selector("title")
        .and_then(|sel| {
            document
                .select(&sel)
                .next()
                .map(|el| collapse_whitespace(&el.text().collect::<String>()))
        })
        .filter(|title| !title.is_empty())
        .unwrap_or_else(|| UNTITLED.to_string())
}

fn extract_description(document: &Html) -> String {
    selector("meta[name=\"description\"]")
        .and_then(|sel| {
            document
                .select(&sel)
                .next()
                .and_then(|el| el.value().attr("content"))
                .map(|content| content.trim().to_string())
        })
        .unwrap_or_default()
}

fn extract_content(document: &Html) -> String {
    let content_root = CONTENT_SELECTORS
        .iter()
        .filter_map(|css| selector(css))
        .find_map(|sel| {
            document
                .select(&sel)
                .find(|el| !inside_non_content(el))
        })
        .or_else(|| selector("body").and_then(|sel| document.select(&sel).next()));

    let Some(root) = content_root else {
        return String::new();
    };

    let mut parts = Vec::new();
    collect_text(root, &mut parts);
    collapse_whitespace(&parts.join(" "))
}

fn extract_headings(document: &Html) -> Vec<Heading> {
    let Some(sel) = selector("h1, h2, h3, h4, h5, h6") else {
        return Vec::new();
    };

    document
        .select(&sel)
        .filter(|el| !inside_non_content(el))
        .filter_map(|el| {
            let level = el.value().name().strip_prefix('h')?.parse::<u8>().ok()?;
            Some(Heading {
                level,
                text: collapse_whitespace(&el.text().collect::<String>()),
                anchor: el.value().attr("id").unwrap_or_default().to_string(),
            })
        })
        .collect()
}

fn extract_links(document: &Html, base_url: &Url) -> Vec<Url> {
    let Some(sel) = selector("a[href]") else {
        return Vec::new();
    };

    document
        .select(&sel)
        .filter(|el| el.value().attr("download").is_none())
        .filter_map(|el| el.value().attr("href"))
        .filter_map(|href| resolve_reference(href, base_url))
        .collect()
}

fn extract_images(document: &Html, base_url: &Url) -> Vec<Url> {
    let Some(sel) = selector("img[src]") else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    document
        .select(&sel)
        .filter_map(|el| el.value().attr("src"))
        .filter_map(|src| resolve_reference(src, base_url))
        .filter(|url| seen.insert(url.to_string()))
        .collect()
}

/// Resolves an href or src to an absolute http(s) URL
///
/// Returns None for empty references, `javascript:`, `mailto:`, `tel:` and
/// `data:` schemes, fragment-only references and unparseable URLs.
fn resolve_reference(reference: &str, base_url: &Url) -> Option<Url> {
    let reference = reference.trim();

    if reference.is_empty() || reference.starts_with('#') {
        return None;
    }

    let lowered = reference.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lowered.starts_with(scheme))
    {
        return None;
    }

    let absolute = base_url.join(reference).ok()?;
    matches!(absolute.scheme(), "http" | "https").then_some(absolute)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_url() -> Url {
        Url::parse("https://example.com/page").unwrap()
    }

    fn extract(html: &str) -> ExtractedPage {
        extract_page(html, &base_url(), &base_url(), 1, 200)
    }

    #[test]
    fn test_title_and_description() {
        let page = extract(
            r#"<html><head><title>  Test
                Page </title><meta name="description" content=" About us "></head></html>"#,
        );
        assert_eq!(page.record.title, "Test Page");
        assert_eq!(page.record.description, "About us");
        assert_eq!(page.record.depth, 1);
        assert_eq!(page.record.status_code, 200);
    }

    #[test]
    fn test_missing_title_uses_placeholder() {
        let page = extract("<html><head></head><body><p>x</p></body></html>");
        assert_eq!(page.record.title, UNTITLED);
        assert_eq!(page.record.description, "");
    }

    #[test]
    fn test_content_prefers_main_and_drops_chrome() {
        let html = r#"
            <html><body>
                <header>Site header</header>
                <nav>Menu</nav>
                <main>
                    <h1>Welcome</h1>
                    <p>First   paragraph.</p>
                    <script>var x = 1;</script>
                    <aside>Related</aside>
                    <p>Second
                       paragraph.</p>
                </main>
                <footer>Copyright</footer>
            </body></html>"#;
        let page = extract(html);
        assert_eq!(
            page.record.content,
            "Welcome First paragraph. Second paragraph."
        );
    }

    #[test]
    fn test_content_selector_order() {
        let html = r#"<body><div id="content">From id</div><article>From article</article></body>"#;
        assert_eq!(extract(html).record.content, "From article");

        let html = r#"<body><div role="main">Role main</div><p>Other</p></body>"#;
        assert_eq!(extract(html).record.content, "Role main");
    }

    #[test]
    fn test_content_falls_back_to_body() {
        let html = "<body><div>Plain <b>body</b> text</div><style>p{}</style></body>";
        assert_eq!(extract(html).record.content, "Plain body text");
    }

    #[test]
    fn test_headings_in_document_order() {
        let html = r#"<body>
            <header><h1>Logo</h1></header>
            <h2 id="b">Beta</h2>
            <h1 id="a">Alpha</h1>
            <h6>Tiny</h6>
        </body>"#;
        let headings = extract(html).record.headings;
        assert_eq!(headings.len(), 3);
        assert_eq!(headings[0].level, 2);
        assert_eq!(headings[0].text, "Beta");
        assert_eq!(headings[0].anchor, "b");
        assert_eq!(headings[1].level, 1);
        assert_eq!(headings[2].anchor, "");
    }

    #[test]
    fn test_extract_links_resolved() {
        let html = r#"<body>
            <a href="/other">Root relative</a>
            <a href="sibling">Relative</a>
            <a href="https://other.com/page">Absolute</a>
            <nav><a href="/nav-link">Nav</a></nav>
        </body>"#;
        let links: Vec<String> = extract(html).links.iter().map(Url::to_string).collect();
        assert_eq!(
            links,
            vec![
                "https://example.com/other",
                "https://example.com/sibling",
                "https://other.com/page",
                "https://example.com/nav-link",
            ]
        );
    }

    #[test]
    fn test_skip_special_links() {
        let html = r##"<body>
            <a href="javascript:void(0)">JS</a>
            <a href="mailto:test@example.com">Mail</a>
            <a href="TEL:+123">Call</a>
            <a href="data:text/html,hi">Data</a>
            <a href="#section">Jump</a>
            <a href="/file.pdf" download>Download</a>
            <a href="ftp://example.com/file">FTP</a>
        </body>"##;
        assert!(extract(html).links.is_empty());
    }

    #[test]
    fn test_images_deduplicated_and_recorded() {
        let html = r#"<body>
            <img src="/logo.png">
            <img src="logo.png">
            <img src="data:image/png;base64,AAAA">
            <img src="https://cdn.example.com/photo.jpg">
            <img alt="no source">
        </body>"#;
        let page = extract(html);
        assert_eq!(page.images.len(), 2);
        assert_eq!(page.images[0].as_str(), "https://example.com/logo.png");
        assert_eq!(
            page.record.images,
            vec![
                "https://example.com/logo.png".to_string(),
                "https://cdn.example.com/photo.jpg".to_string()
            ]
        );
    }

    #[test]
    fn test_malformed_markup_degrades() {
        let page = extract("<html><body><div><p>Unclosed <b>tags");
        assert_eq!(page.record.content, "Unclosed tags");
        assert!(page.links.is_empty());
    }

    #[test]
    fn test_links_resolve_against_redirect_target() {
        let requested = Url::parse("https://example.com/old").unwrap();
        let landed = Url::parse("https://example.com/new/").unwrap();
        let page = extract_page(r#"<a href="child">c</a>"#, &requested, &landed, 0, 200);

        assert_eq!(page.record.url, "https://example.com/old");
        assert_eq!(page.links[0].as_str(), "https://example.com/new/child");
    }
}
