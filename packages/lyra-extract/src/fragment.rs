use crate::hashing::text_hash;

#[derive(Debug, Clone)]
pub struct FragmentConfig {
    pub target_min_chars: usize,
    pub target_max_chars: usize,
}

impl Default for FragmentConfig {
    fn default() -> Self {
        Self {
            target_min_chars: 400,
            target_max_chars: 1200,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Fragment {
    pub text: String,
    pub text_hash: String,
    pub ordinal: usize,
}

/// Splits `text` into fragments whose length stays within the
/// configured target range: paragraphs are merged forward until the
/// running fragment reaches `target_min_chars`, and any paragraph that
/// alone exceeds `target_max_chars` is hard-split on sentence
/// boundaries (spec 4.9: "split into fragments (target length range,
/// configurable)").
pub fn split_into_fragments(text: &str, config: &FragmentConfig) -> Vec<Fragment> {
    let paragraphs: Vec<&str> = text
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();

    let mut chunks: Vec<String> = Vec::new();
    let mut current = String::new();

    for paragraph in paragraphs {
        if paragraph.len() > config.target_max_chars {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            chunks.extend(hard_split(paragraph, config.target_max_chars));
            continue;
        }

        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(paragraph);

        if current.len() >= config.target_min_chars {
            chunks.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
        .into_iter()
        .enumerate()
        .map(|(ordinal, text)| {
            let hash = text_hash(&text);
            Fragment {
                text,
                text_hash: hash,
                ordinal,
            }
        })
        .collect()
}

fn hard_split(paragraph: &str, max_chars: usize) -> Vec<String> {
    let sentences: Vec<&str> = paragraph.split(". ").collect();
    let mut chunks = Vec::new();
    let mut current = String::new();
    for sentence in sentences {
        if current.len() + sentence.len() > max_chars && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push_str(". ");
        }
        current.push_str(sentence);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_paragraphs_merge_up_to_the_minimum() {
        let config = FragmentConfig {
            target_min_chars: 20,
            target_max_chars: 1000,
        };
        let text = "First short one.\n\nSecond short one.\n\nThird, pushing it over twenty chars.";
        let fragments = split_into_fragments(text, &config);
        assert!(fragments.iter().all(|f| f.text.len() >= 20 || f.ordinal == fragments.len() - 1));
    }

    #[test]
    fn oversized_paragraph_is_hard_split() {
        let config = FragmentConfig {
            target_min_chars: 10,
            target_max_chars: 30,
        };
        let long = "Sentence one here. Sentence two here. Sentence three here.";
        let fragments = split_into_fragments(long, &config);
        assert!(fragments.len() > 1);
        assert!(fragments.iter().all(|f| f.text.len() <= 40));
    }

    #[test]
    fn fragments_carry_stable_text_hashes() {
        let config = FragmentConfig::default();
        let fragments = split_into_fragments("One paragraph of reasonable length for a single fragment.", &config);
        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].text_hash, text_hash(&fragments[0].text));
    }
}
