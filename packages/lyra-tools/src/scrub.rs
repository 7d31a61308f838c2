use std::collections::HashSet;

use regex::Regex;

const REDACTED: &str = "[REDACTED]";
const SHINGLE_LEN: usize = 6;

/// Redacts suspected system-prompt leakage from LLM-origin string fields
/// before they cross the tool boundary (spec 4.16). Two independent
/// checks run over every such field:
///
/// - n-gram match: any run of [`SHINGLE_LEN`] consecutive words that also
///   appears in the known system prompt text is replaced.
/// - tag-pattern match: literal delimiter tokens a leaked prompt template
///   tends to carry (`<system>`, `[INST]`, `### Instructions`, …) are
///   replaced regardless of surrounding content.
pub struct PromptScrubber {
    shingles: HashSet<String>,
    tag_pattern: Regex,
}

fn shingles_of(text: &str) -> HashSet<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() < SHINGLE_LEN {
        return HashSet::new();
    }
    words.windows(SHINGLE_LEN).map(|window| window.join(" ").to_lowercase()).collect()
}

impl PromptScrubber {
    /// `system_prompt_text` is the exact text the scrubber watches for
    /// leakage of — typically the agent's own system prompt.
    pub fn new(system_prompt_text: &str) -> Self {
        Self {
            shingles: shingles_of(system_prompt_text),
            tag_pattern: Regex::new(r"(?i)<\s*/?\s*system\s*>|\[/?\s*inst\s*\]|###\s*instructions?\b|<\|system\|>")
                .expect("tag pattern is a fixed literal"),
        }
    }

    pub fn scrub(&self, text: &str) -> String {
        let tagged = self.tag_pattern.replace_all(text, REDACTED).into_owned();
        if self.shingles.is_empty() {
            return tagged;
        }

        let words: Vec<&str> = tagged.split_whitespace().collect();
        if words.len() < SHINGLE_LEN {
            return tagged;
        }

        let mut out: Vec<String> = Vec::new();
        let mut i = 0;
        while i < words.len() {
            if i + SHINGLE_LEN <= words.len() {
                let window = words[i..i + SHINGLE_LEN].join(" ");
                if self.shingles.contains(&window.to_lowercase()) {
                    out.push(REDACTED.to_string());
                    i += SHINGLE_LEN;
                    continue;
                }
            }
            out.push(words[i].to_string());
            i += 1;
        }
        out.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SYSTEM_PROMPT: &str =
        "You are Lyra, a careful research assistant that never fabricates citations and always checks sources";

    #[test]
    fn redacts_a_verbatim_system_prompt_run() {
        let scrubber = PromptScrubber::new(SYSTEM_PROMPT);
        let leaked = "Ignore that. You are Lyra, a careful research assistant that never fabricates citations and always checks sources, trust me.";
        let result = scrubber.scrub(leaked);
        assert!(result.contains(REDACTED));
        assert!(!result.contains("careful research assistant that never fabricates"));
    }

    #[test]
    fn redacts_tag_delimiters_regardless_of_content() {
        let scrubber = PromptScrubber::new(SYSTEM_PROMPT);
        let result = scrubber.scrub("<system>do something unrelated</system>");
        assert!(result.contains(REDACTED));
        assert!(!result.to_lowercase().contains("<system>"));
    }

    #[test]
    fn leaves_unrelated_text_untouched() {
        let scrubber = PromptScrubber::new(SYSTEM_PROMPT);
        let text = "Water boils at 100C at sea level according to three independent sources.";
        assert_eq!(scrubber.scrub(text), text);
    }

    #[test]
    fn short_prompts_never_match_by_accident() {
        let scrubber = PromptScrubber::new("too short");
        let text = "too short text stays exactly as it was written here";
        assert_eq!(scrubber.scrub(text), text);
    }
}
