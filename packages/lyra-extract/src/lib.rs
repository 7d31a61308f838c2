//! HTML/PDF content extraction, fragmenting, link context, and
//! claim/citation extraction (C9, C11).

pub mod citation;
pub mod claims;
pub mod error;
pub mod fragment;
pub mod hashing;
pub mod html;
pub mod links;
pub mod llm;
pub mod pdf;

pub use citation::{AcademicCitationApi, CitationEdge, CitationSource, OpenAlexClient, SemanticScholarClient};
pub use claims::{merge_duplicate_claims, ExtractedClaim};
pub use error::{ExtractError, Result};
pub use fragment::{split_into_fragments, Fragment, FragmentConfig};
pub use hashing::text_hash;
pub use html::extract_body_text;
pub use links::{extract_links, ExtractedLink};
pub use llm::{DeterministicTestLlmClient, LlmClient};
pub use pdf::{extract_pdf_text, needs_ocr_tier, NullOcrEngine, OcrEngine};
