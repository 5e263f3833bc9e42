//! Language classification.
//!
//! The pipeline only consumes the top label of a classifier. The default
//! implementation runs `whatlang` locally and maps its ISO 639-3 codes to
//! the two-letter codes rules are written with.

use crate::error::ClassificationError;

/// Top label produced by a classifier.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    /// ISO 639-1 code when one exists, otherwise the classifier's own code.
    pub language: String,
    pub confidence: f64,
}

/// Anything that can label the language of a piece of text.
pub trait LanguageClassifier: Send + Sync {
    fn classify(&self, text: &str) -> Result<Classification, ClassificationError>;
}

/// Offline trigram classifier backed by `whatlang`.
#[derive(Debug, Default, Clone, Copy)]
pub struct WhatlangClassifier;

impl WhatlangClassifier {
    pub fn new() -> Self {
        Self
    }
}

impl LanguageClassifier for WhatlangClassifier {
    fn classify(&self, text: &str) -> Result<Classification, ClassificationError> {
        let info = whatlang::detect(text).ok_or(ClassificationError::Undetermined)?;
        Ok(Classification {
            language: iso639_1(info.lang().code()).to_string(),
            confidence: info.confidence(),
        })
    }
}

/// Map an ISO 639-3 code to ISO 639-1 for the languages rules are likely
/// to target. Unknown codes pass through unchanged.
fn iso639_1(code: &str) -> &str {
    match code {
        "spa" => "es",
        "eng" => "en",
        "por" => "pt",
        "fra" => "fr",
        "ita" => "it",
        "deu" => "de",
        "cat" => "ca",
        "nld" => "nl",
        "ron" => "ro",
        "rus" => "ru",
        "ukr" => "uk",
        "pol" => "pl",
        "tur" => "tr",
        "jpn" => "ja",
        "cmn" => "zh",
        "ara" => "ar",
        other => other,
    }
}
