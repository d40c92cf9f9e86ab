//! Text recovery result types

/// Pixel rectangle of a recognized region
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BoundingBox {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

/// One recognized word or line
#[derive(Debug, Clone, PartialEq)]
pub struct TextRegion {
    pub text: String,
    /// In 0.0..=1.0
    pub confidence: f64,
    pub bbox: BoundingBox,
}

/// Recovery outcome for a single image, keyed by its filename
#[derive(Debug, Clone, PartialEq)]
pub struct OcrResult {
    pub filename: String,
    pub success: bool,
    pub error: Option<String>,
    pub full_text: String,
    pub confidence_avg: f64,
    /// Ordered top-to-bottom, then left-to-right
    pub regions: Vec<TextRegion>,
}

impl OcrResult {
    /// Builds a successful result from unordered regions
    ///
    /// Regions are sorted by `(top, left)`, their text is whitespace-collapsed
    /// and joined with single spaces, and the average confidence is 0.0 when
    /// nothing was recognized.
    pub fn from_regions(filename: impl Into<String>, mut regions: Vec<TextRegion>) -> Self {
        regions.retain(|r| !r.text.trim().is_empty());
        regions.sort_by_key(|r| (r.bbox.top, r.bbox.left));

        let full_text = regions
            .iter()
            .map(|r| r.text.split_whitespace().collect::<Vec<_>>().join(" "))
            .collect::<Vec<_>>()
            .join(" ");

        let confidence_avg = if regions.is_empty() {
            0.0
        } else {
            regions.iter().map(|r| r.confidence).sum::<f64>() / regions.len() as f64
        };

        Self {
            filename: filename.into(),
            success: true,
            error: None,
            full_text,
            confidence_avg,
            regions,
        }
    }

    pub fn failed(filename: impl Into<String>, error: impl ToString) -> Self {
        Self {
            filename: filename.into(),
            success: false,
            error: Some(error.to_string()),
            full_text: String::new(),
            confidence_avg: 0.0,
            regions: Vec::new(),
        }
    }

    /// True if recognition succeeded and produced any text
    pub fn has_text(&self) -> bool {
        self.success && !self.full_text.is_empty()
    }
}

/// Totals for one text recovery run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OcrSummary {
    pub total: usize,
    pub processed: usize,
    pub failed: usize,
    pub results: Vec<OcrResult>,
}

impl OcrSummary {
    pub fn push(&mut self, result: OcrResult) {
        self.total += 1;
        if result.success {
            self.processed += 1;
        } else {
            self.failed += 1;
        }
        self.results.push(result);
    }

    pub fn with_text(&self) -> usize {
        self.results.iter().filter(|r| r.has_text()).count()
    }
}
