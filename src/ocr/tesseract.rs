//! Text recovery through the `tesseract` command-line tool

use crate::config::OcrConfig;
use crate::ocr::{BoundingBox, Capability, OcrEngine, OcrError, TextRecognizer, TextRegion};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tokio::process::Command;

/// Word-level rows in tesseract's TSV output
const WORD_LEVEL: u32 = 5;

/// Probes for and drives a local tesseract installation
#[derive(Debug, Clone)]
pub struct TesseractEngine {
    command: String,
    languages: Vec<String>,
}

impl TesseractEngine {
    pub fn new(config: &OcrConfig) -> Self {
        Self {
            command: config.command.clone(),
            languages: config.languages.clone(),
        }
    }

    fn language_arg(&self) -> String {
        if self.languages.is_empty() {
            "eng".to_string()
        } else {
            self.languages.join("+")
        }
    }
}

#[async_trait]
impl OcrEngine for TesseractEngine {
    async fn probe(&self) -> Capability {
        match Command::new(&self.command).arg("--version").output().await {
            Ok(output) if output.status.success() => {
                tracing::debug!(command = %self.command, "Text recognizer available");
                Capability::Available(Arc::new(self.clone()))
            }
            Ok(output) => Capability::Unavailable(format!(
                "{} --version exited with {}",
                self.command, output.status
            )),
            Err(e) => Capability::Unavailable(format!("{} could not be started: {}", self.command, e)),
        }
    }
}

#[async_trait]
impl TextRecognizer for TesseractEngine {
    async fn recognize(&self, image: &Path) -> Result<Vec<TextRegion>, OcrError> {
        let output = Command::new(&self.command)
            .arg(image)
            .arg("stdout")
            .arg("-l")
            .arg(self.language_arg())
            .arg("tsv")
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OcrError::Recognition(format!(
                "{} exited with {}: {}",
                self.command,
                output.status,
                stderr.trim()
            )));
        }

        Ok(parse_tsv(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Parses tesseract TSV output into word regions
///
/// Keeps word-level rows with a non-negative confidence and non-blank text.
/// Confidence is rescaled from 0..100 to 0..1.
pub fn parse_tsv(tsv: &str) -> Vec<TextRegion> {
    tsv.lines()
        .skip_while(|line| line.starts_with("level"))
        .filter_map(parse_row)
        .collect()
}

fn parse_row(line: &str) -> Option<TextRegion> {
    let columns: Vec<&str> = line.split('\t').collect();
    if columns.len() < 12 {
        return None;
    }

    if columns[0].trim().parse::<u32>().ok()? != WORD_LEVEL {
        return None;
    }

    let confidence = columns[10].trim().parse::<f64>().ok()?;
    let text = columns[11..].join("\t");
    let text = text.trim();
    if confidence < 0.0 || text.is_empty() {
        return None;
    }

    Some(TextRegion {
        text: text.to_string(),
        confidence: (confidence / 100.0).clamp(0.0, 1.0),
        bbox: BoundingBox {
            left: columns[6].trim().parse().ok()?,
            top: columns[7].trim().parse().ok()?,
            width: columns[8].trim().parse().ok()?,
            height: columns[9].trim().parse().ok()?,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext
1\t1\t0\t0\t0\t0\t0\t0\t640\t480\t-1\t
4\t1\t1\t1\t1\t0\t20\t30\t200\t24\t-1\t
5\t1\t1\t1\t1\t1\t20\t30\t90\t24\t96.5\tSummer
5\t1\t1\t1\t1\t2\t120\t30\t60\t24\t88\tSale
5\t1\t1\t1\t1\t3\t190\t30\t10\t24\t-1\t 
5\t1\t1\t1\t2\t1\t20\t70\t40\t20\t41.25\t50%";

    #[test]
    fn test_parse_tsv_keeps_words() {
        let regions = parse_tsv(SAMPLE);
        assert_eq!(regions.len(), 3);
        assert_eq!(regions[0].text, "Summer");
        assert!((regions[0].confidence - 0.965).abs() < 1e-9);
        assert_eq!(
            regions[1].bbox,
            BoundingBox {
                left: 120,
                top: 30,
                width: 60,
                height: 24
            }
        );
        assert_eq!(regions[2].text, "50%");
    }

    #[test]
    fn test_parse_tsv_ignores_garbage() {
        assert!(parse_tsv("").is_empty());
        assert!(parse_tsv("not\ttsv").is_empty());
        assert!(parse_tsv("5\t1\t1\t1\t1\t1\tx\t0\t1\t1\t90\tword").is_empty());
    }

    #[test]
    fn test_language_arg() {
        let mut config = OcrConfig::default();
        config.languages = vec!["eng".to_string(), "deu".to_string()];
        assert_eq!(TesseractEngine::new(&config).language_arg(), "eng+deu");

        config.languages.clear();
        assert_eq!(TesseractEngine::new(&config).language_arg(), "eng");
    }

    #[tokio::test]
    async fn test_missing_binary_is_unavailable() {
        let config = OcrConfig {
            command: "pagefold-no-such-recognizer".to_string(),
            ..OcrConfig::default()
        };
        let capability = TesseractEngine::new(&config).probe().await;
        assert!(matches!(capability, Capability::Unavailable(_)));
    }
}
