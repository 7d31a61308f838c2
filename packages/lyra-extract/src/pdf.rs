use crate::error::{ExtractError, Result};

/// PDF → text, plus an OCR tier for scanned PDFs that carry no
/// extractable text layer (spec 4.9).
pub fn extract_pdf_text(bytes: &[u8]) -> Result<String> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))
}

/// Abstracts the OCR backend so the default build stays free of the
/// heavyweight model-loading dependency; a real implementation wires
/// in `ocrs` (the OCR crate used for scanned-document recall
/// elsewhere in the pack) behind a feature flag.
pub trait OcrEngine: Send + Sync {
    fn recognize_page(&self, page_image: &[u8]) -> Result<String>;
}

pub struct NullOcrEngine;

impl OcrEngine for NullOcrEngine {
    fn recognize_page(&self, _page_image: &[u8]) -> Result<String> {
        Ok(String::new())
    }
}

/// Decides whether the OCR tier should run: only when direct text
/// extraction came back effectively empty, since OCR is far more
/// expensive than the text layer.
pub fn needs_ocr_tier(extracted_text: &str, min_chars: usize) -> bool {
    extracted_text.trim().chars().count() < min_chars
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_triggers_ocr_tier() {
        assert!(needs_ocr_tier("", 50));
        assert!(needs_ocr_tier("  \n  ", 50));
    }

    #[test]
    fn substantial_text_skips_ocr_tier() {
        let text = "a".repeat(200);
        assert!(!needs_ocr_tier(&text, 50));
    }

    #[test]
    fn null_ocr_engine_returns_empty_string() {
        let engine = NullOcrEngine;
        assert_eq!(engine.recognize_page(&[]).unwrap(), "");
    }
}
