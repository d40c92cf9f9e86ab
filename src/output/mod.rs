//! Output module for rendering a job's corpus into a document
//!
//! This module handles:
//! - Loading the persisted corpus of a job working directory
//! - Scoping recovered image text to the pages that referenced the images
//! - Writing the final Markdown document

mod markdown;
mod traits;

pub use markdown::{format_document, MarkdownRenderer, DOCUMENT_FILE};
pub use traits::{DocumentContext, DocumentRenderer, RenderError, RenderResult};
