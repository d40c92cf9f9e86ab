//! Image text recovery
//!
//! Text recovery is an optional capability. Each job probes it once through
//! an [`OcrEngine`], which answers with a [`Capability`]: either a handle to a
//! [`TextRecognizer`] or the reason recovery is unavailable. Both branches are
//! ordinary outcomes for the job pipeline; neither fails the job.

mod tesseract;
mod types;

pub use tesseract::{parse_tsv, TesseractEngine};
pub use types::{BoundingBox, OcrResult, OcrSummary, TextRegion};

use crate::config::OcrConfig;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// File extensions treated as recognizable images
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "webp"];

/// Text recovery errors
#[derive(Debug, Error)]
pub enum OcrError {
    #[error("Recognition failed: {0}")]
    Recognition(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Recognizes text regions in a single image
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    async fn recognize(&self, image: &Path) -> Result<Vec<TextRegion>, OcrError>;
}

/// Result of probing for the text recovery capability
#[derive(Clone)]
pub enum Capability {
    Available(Arc<dyn TextRecognizer>),
    Unavailable(String),
}

impl std::fmt::Debug for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Available(_) => f.write_str("Available"),
            Self::Unavailable(reason) => f.debug_tuple("Unavailable").field(reason).finish(),
        }
    }
}

/// Source of the text recovery capability
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Checks once per job whether recognition can run
    async fn probe(&self) -> Capability;
}

/// Engine used when recovery is switched off in the configuration
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledOcr;

#[async_trait]
impl OcrEngine for DisabledOcr {
    async fn probe(&self) -> Capability {
        Capability::Unavailable("disabled by configuration".to_string())
    }
}

/// Builds the engine described by the `[ocr]` configuration section
pub fn engine_from_config(config: &OcrConfig) -> Arc<dyn OcrEngine> {
    if config.enabled {
        Arc::new(TesseractEngine::new(config))
    } else {
        Arc::new(DisabledOcr)
    }
}

/// Lists the recognizable images in `dir`, sorted by filename
pub async fn list_images(dir: &Path) -> Result<Vec<PathBuf>, OcrError> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut images = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let recognizable = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
            .unwrap_or(false);
        if recognizable && entry.file_type().await?.is_file() {
            images.push(path);
        }
    }

    images.sort();
    Ok(images)
}

/// Runs `recognizer` over every image in `images_dir`
///
/// A failure on one image is recorded in that image's result and does not
/// stop the others. Only an unreadable directory fails the whole stage.
pub async fn recover_text(
    recognizer: &dyn TextRecognizer,
    images_dir: &Path,
) -> Result<OcrSummary, OcrError> {
    let images = list_images(images_dir).await?;
    let mut summary = OcrSummary::default();

    for image in images {
        let filename = image
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        let result = match recognizer.recognize(&image).await {
            Ok(regions) => OcrResult::from_regions(filename, regions),
            Err(e) => {
                tracing::warn!(image = %image.display(), error = %e, "Text recognition failed");
                OcrResult::failed(filename, e)
            }
        };
        summary.push(result);
    }

    tracing::info!(
        total = summary.total,
        processed = summary.processed,
        failed = summary.failed,
        "Text recovery finished"
    );

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedRecognizer;

    #[async_trait]
    impl TextRecognizer for FixedRecognizer {
        async fn recognize(&self, image: &Path) -> Result<Vec<TextRegion>, OcrError> {
            let name = image.file_name().unwrap().to_string_lossy().to_string();
            if name.starts_with("bad") {
                return Err(OcrError::Recognition("unreadable".to_string()));
            }
            Ok(vec![TextRegion {
                text: name,
                confidence: 0.5,
                bbox: BoundingBox::default(),
            }])
        }
    }

    #[tokio::test]
    async fn test_list_images_filters_extensions() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.PNG", "a.jpg", "notes.txt", "c.webp"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        std::fs::create_dir(dir.path().join("nested.png")).unwrap();

        let names: Vec<String> = list_images(dir.path())
            .await
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.jpg", "b.PNG", "c.webp"]);
    }

    #[tokio::test]
    async fn test_recover_text_isolates_failures() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["bad.png", "good.jpg"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }

        let summary = recover_text(&FixedRecognizer, dir.path()).await.unwrap();
        assert_eq!(summary.total, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.results[0].filename, "bad.png");
        assert_eq!(
            summary.results[0].error.as_deref(),
            Some("Recognition failed: unreadable")
        );
        assert_eq!(summary.results[1].full_text, "good.jpg");
    }

    #[tokio::test]
    async fn test_missing_directory_fails_stage() {
        let result = recover_text(&FixedRecognizer, Path::new("/nonexistent/pagefold/images")).await;
        assert!(matches!(result, Err(OcrError::Io(_))));
    }

    #[tokio::test]
    async fn test_disabled_engine_is_unavailable() {
        assert!(matches!(DisabledOcr.probe().await, Capability::Unavailable(_)));

        let config = OcrConfig {
            enabled: false,
            ..OcrConfig::default()
        };
        assert!(matches!(
            engine_from_config(&config).probe().await,
            Capability::Unavailable(_)
        ));
    }
}
