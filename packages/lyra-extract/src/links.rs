use scraper::{Html, Selector};

#[derive(Debug, Clone)]
pub struct ExtractedLink {
    pub url: String,
    pub anchor_text: String,
    /// Plain text immediately surrounding the anchor, for the later
    /// citation-detection LLM call (spec 4.9: "in-body links with the
    /// surrounding context").
    pub surrounding_context: String,
}

const CONTEXT_WINDOW_CHARS: usize = 200;

/// Extracts every `<a href>` in the document body along with a window
/// of the parent block's text around it.
pub fn extract_links(html: &str) -> Vec<ExtractedLink> {
    let document = Html::parse_document(html);
    let anchor_selector = Selector::parse("a[href]").expect("static selector is valid");

    let mut links = Vec::new();
    for anchor in document.select(&anchor_selector) {
        let url = match anchor.value().attr("href") {
            Some(href) if !href.trim().is_empty() && !href.starts_with('#') => href.to_string(),
            _ => continue,
        };
        let anchor_text = anchor.text().collect::<String>().trim().to_string();

        let parent_text = anchor
            .parent()
            .and_then(scraper::ElementRef::wrap)
            .map(|parent| parent.text().collect::<String>())
            .unwrap_or_else(|| anchor_text.clone());

        let surrounding_context = windowed(&parent_text, &anchor_text, CONTEXT_WINDOW_CHARS);

        links.push(ExtractedLink {
            url,
            anchor_text,
            surrounding_context,
        });
    }
    links
}

fn windowed(full_text: &str, anchor_text: &str, window: usize) -> String {
    let trimmed = full_text.trim();
    if trimmed.len() <= window * 2 {
        return trimmed.to_string();
    }
    match trimmed.find(anchor_text) {
        Some(pos) => {
            let start = pos.saturating_sub(window);
            let end = (pos + anchor_text.len() + window).min(trimmed.len());
            trimmed[start..end].to_string()
        }
        None => trimmed.chars().take(window * 2).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_href_and_anchor_text() {
        let html = r#"<html><body><p>See <a href="https://example.com/paper">the paper</a> for details.</p></body></html>"#;
        let links = extract_links(html);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].url, "https://example.com/paper");
        assert_eq!(links[0].anchor_text, "the paper");
        assert!(links[0].surrounding_context.contains("the paper"));
    }

    #[test]
    fn fragment_only_anchors_are_skipped() {
        let html = r#"<html><body><a href="#top">Back to top</a></body></html>"#;
        assert!(extract_links(html).is_empty());
    }
}
