//! Markdown document generation
//!
//! Lays the corpus out as one document: a title page, a table of contents, a
//! conversion summary, then one section per page. Pages are separated by
//! horizontal rules so converters that paginate on `---` start each on a new
//! page.

use crate::output::traits::{DocumentContext, DocumentRenderer, RenderResult};
use crate::storage::PageRecord;
use crate::url::extract_host;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use url::Url;

/// File name of the rendered document inside the job working directory
pub const DOCUMENT_FILE: &str = "document.md";

/// Titles longer than this are truncated in the table of contents
const TOC_TITLE_LIMIT: usize = 60;
const TOC_TITLE_KEEP: usize = 57;

const PAGE_BREAK: &str = "\n---\n\n";

/// Renders the corpus as a single Markdown file
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownRenderer;

impl DocumentRenderer for MarkdownRenderer {
    fn render(&self, work_dir: &Path) -> RenderResult<PathBuf> {
        let context = DocumentContext::load(work_dir)?;
        let document = format_document(&context);

        let path = work_dir.join(DOCUMENT_FILE);
        fs::write(&path, document)?;

        tracing::info!(
            path = %path.display(),
            pages = context.pages.len(),
            "Rendered document"
        );
        Ok(path)
    }

    fn extension(&self) -> &str {
        "md"
    }
}

/// Formats the whole document
pub fn format_document(ctx: &DocumentContext) -> String {
    let mut md = String::new();

    write_title_page(&mut md, ctx);
    md.push_str(PAGE_BREAK);
    write_table_of_contents(&mut md, ctx);
    write_summary(&mut md, ctx);

    for (index, page) in ctx.pages.iter().enumerate() {
        md.push_str(PAGE_BREAK);
        write_page(&mut md, ctx, index + 1, page);
    }

    md
}

fn write_title_page(md: &mut String, ctx: &DocumentContext) {
    let domain = Url::parse(&ctx.summary.start_url)
        .ok()
        .and_then(|url| extract_host(&url))
        .unwrap_or_else(|| ctx.summary.start_url.clone());

    let _ = writeln!(md, "# {}\n", domain);
    let _ = writeln!(md, "- **Source**: <{}>", ctx.summary.start_url);
    let _ = writeln!(md, "- **Domain**: {}", domain);
    let _ = writeln!(
        md,
        "- **Crawled**: {}",
        ctx.summary.crawled_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    let _ = writeln!(
        md,
        "- **Generated**: {}",
        ctx.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
}

fn write_table_of_contents(md: &mut String, ctx: &DocumentContext) {
    md.push_str("## Table of Contents\n\n");

    if ctx.pages.is_empty() {
        md.push_str("_No pages were crawled._\n\n");
        return;
    }

    for (index, page) in ctx.pages.iter().enumerate() {
        let indent = "  ".repeat(page.depth as usize);
        let _ = writeln!(
            md,
            "{}- [{}](#page-{})",
            indent,
            toc_title(&page.title),
            index + 1
        );
    }
    md.push('\n');
}

fn write_summary(md: &mut String, ctx: &DocumentContext) {
    md.push_str("## Conversion Summary\n\n");
    md.push_str("| Metric | Value |\n");
    md.push_str("|--------|-------|\n");
    let _ = writeln!(md, "| Pages | {} |", ctx.pages.len());
    let _ = writeln!(md, "| Max depth | {} |", ctx.summary.max_depth);
    let _ = writeln!(md, "| Images | {} |", ctx.images.len());
    let _ = writeln!(md, "| Images OCR'd | {} |", ctx.images_processed());
    let _ = writeln!(md, "| Images with text | {} |", ctx.images_with_text());
    let _ = writeln!(md, "| Failures | {} |", ctx.summary.failures);
}

fn write_page(md: &mut String, ctx: &DocumentContext, number: usize, page: &PageRecord) {
    let _ = writeln!(md, "<a id=\"page-{}\"></a>\n", number);
    let _ = writeln!(md, "## {}\n", page.title);
    let _ = writeln!(md, "- **URL**: <{}>", page.url);
    let _ = writeln!(md, "- **Depth**: {}", page.depth);
    let _ = writeln!(
        md,
        "- **Fetched**: {}",
        page.fetched_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    if !page.description.is_empty() {
        let _ = writeln!(md, "\n> {}", page.description);
    }
    md.push('\n');

    if !page.headings.is_empty() {
        md.push_str("### Outline\n\n");
        for heading in &page.headings {
            let indent = "  ".repeat(heading.level.saturating_sub(1) as usize);
            let _ = writeln!(md, "{}- {}", indent, heading.text);
        }
        md.push('\n');
    }

    if !page.content.is_empty() {
        md.push_str("### Content\n\n");
        md.push_str(&page.content);
        md.push_str("\n\n");
    }

    let recovered = ctx.recovered_text_for(page);
    if !recovered.is_empty() {
        md.push_str("### Text from images\n\n");
        for result in recovered {
            let _ = writeln!(
                md,
                "**{}** (confidence {:.1}%)\n\n{}\n",
                result.filename,
                result.confidence_avg * 100.0,
                result.full_text
            );
        }
    }
}

/// Truncates long titles to 57 characters plus an ellipsis
fn toc_title(title: &str) -> String {
    if title.chars().count() > TOC_TITLE_LIMIT {
        let kept: String = title.chars().take(TOC_TITLE_KEEP).collect();
        format!("{}...", kept)
    } else {
        title.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::{BoundingBox, OcrResult, OcrSummary, TextRegion};
    use crate::storage::{open_storage, CrawlSummary, Heading, ImageRecord, Storage};
    use chrono::Utc;

    fn summary() -> CrawlSummary {
        CrawlSummary {
            start_url: "https://example.test/".to_string(),
            max_depth: 1,
            pages_crawled: 2,
            images_downloaded: 1,
            failures: 0,
            config_hash: "abc".to_string(),
            crawled_at: Utc::now(),
        }
    }

    fn page(url: &str, title: &str, depth: u32, images: Vec<String>) -> PageRecord {
        PageRecord {
            url: url.to_string(),
            title: title.to_string(),
            description: String::new(),
            content: format!("Body of {}", title),
            headings: vec![
                Heading {
                    level: 1,
                    text: title.to_string(),
                    anchor: String::new(),
                },
                Heading {
                    level: 2,
                    text: "Details".to_string(),
                    anchor: "details".to_string(),
                },
            ],
            depth,
            fetched_at: Utc::now(),
            status_code: 200,
            images,
        }
    }

    fn context() -> DocumentContext {
        DocumentContext {
            summary: summary(),
            pages: vec![
                page(
                    "https://example.test/",
                    "Home",
                    0,
                    vec!["https://example.test/banner.png".to_string()],
                ),
                page("https://example.test/a", "About", 1, vec![]),
            ],
            images: vec![ImageRecord {
                url: "https://example.test/banner.png".to_string(),
                filename: "banner.png".to_string(),
                page_url: "https://example.test/".to_string(),
                size: 42,
            }],
            ocr_results: vec![OcrResult::from_regions(
                "banner.png",
                vec![TextRegion {
                    text: "Grand Opening".to_string(),
                    confidence: 0.875,
                    bbox: BoundingBox::default(),
                }],
            )],
            images_dir: PathBuf::from("/tmp/images"),
            generated_at: Utc::now(),
        }
    }

    #[test]
    fn test_toc_title_truncation() {
        assert_eq!(toc_title("Short"), "Short");
        let exact = "x".repeat(60);
        assert_eq!(toc_title(&exact), exact);
        let long = "y".repeat(61);
        assert_eq!(toc_title(&long), format!("{}...", "y".repeat(57)));
    }

    #[test]
    fn test_document_layout() {
        let md = format_document(&context());

        assert!(md.starts_with("# example.test"));
        assert!(md.contains("- [Home](#page-1)"));
        assert!(md.contains("  - [About](#page-2)"));
        assert!(md.contains("| Images OCR'd | 1 |"));
        assert!(md.contains("| Images with text | 1 |"));
        assert!(md.contains("  - Details"));
        assert_eq!(md.matches(PAGE_BREAK).count(), 3);
    }

    #[test]
    fn test_recovered_text_only_under_referencing_page() {
        let md = format_document(&context());
        let about = md.find("## About").unwrap();
        let text = md.find("Grand Opening").unwrap();

        assert!(text < about);
        assert!(md.contains("(confidence 87.5%)"));
        assert_eq!(md.matches("### Text from images").count(), 1);
    }

    #[test]
    fn test_empty_corpus() {
        let mut ctx = context();
        ctx.pages.clear();
        let md = format_document(&ctx);
        assert!(md.contains("_No pages were crawled._"));
    }

    #[test]
    fn test_render_writes_document() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut storage = open_storage(dir.path()).unwrap();
            storage.save_summary(&summary()).unwrap();
            storage
                .insert_page(&page("https://example.test/", "Home", 0, vec![]))
                .unwrap();
            storage.save_ocr_summary(&OcrSummary::default()).unwrap();
        }

        let path = MarkdownRenderer.render(dir.path()).unwrap();
        assert_eq!(path, dir.path().join(DOCUMENT_FILE));
        let written = std::fs::read_to_string(path).unwrap();
        assert!(written.contains("## Home"));
    }
}
