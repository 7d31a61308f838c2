use sha2::{Digest, Sha256};

/// Content hash for an extracted text unit, used to dedup fragments
/// that recur verbatim across pages (spec 4.9: "hashed (text_hash) for
/// dedup").
pub fn text_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_text_hashes_identically() {
        assert_eq!(text_hash("same content"), text_hash("same content"));
    }

    #[test]
    fn different_text_hashes_differently() {
        assert_ne!(text_hash("a"), text_hash("b"));
    }
}
