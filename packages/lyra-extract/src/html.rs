use scraper::{Html, Selector};

/// Tags whose text content is never part of the readable body (spec
/// 4.9: "HTML → clean body text using a readability-style extractor").
/// This is a boilerplate-stripping heuristic, not a full Readability
/// port: drop obvious chrome, then take whatever text remains in
/// document order.
const NOISE_TAGS: &[&str] = &[
    "script", "style", "noscript", "nav", "header", "footer", "aside", "form", "iframe", "svg",
];

/// Extracts clean body text from an HTML document, stripping script,
/// style, and common chrome elements (nav/header/footer/aside/forms).
pub fn extract_body_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let noise_selector = Selector::parse(&NOISE_TAGS.join(", ")).expect("static selector list is valid");
    let noise_ids: std::collections::HashSet<_> = document.select(&noise_selector).map(|el| el.id()).collect();

    let body_selector = Selector::parse("body").unwrap_or_else(|_| Selector::parse("html").unwrap());
    let root = document.select(&body_selector).next();

    let mut text = String::new();
    if let Some(root) = root {
        for descendant in root.descendants() {
            if let Some(text_node) = descendant.value().as_text() {
                let parent_is_noise = descendant
                    .ancestors()
                    .any(|ancestor| noise_ids.contains(&ancestor.id()));
                if parent_is_noise {
                    continue;
                }
                let trimmed = text_node.trim();
                if !trimmed.is_empty() {
                    if !text.is_empty() {
                        text.push(' ');
                    }
                    text.push_str(trimmed);
                }
            }
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_script_and_nav_but_keeps_body_text() {
        let html = r#"
            <html><body>
              <nav>Home About Contact</nav>
              <script>var x = 1;</script>
              <article><p>The real content lives here.</p></article>
              <footer>Copyright 2026</footer>
            </body></html>
        "#;
        let text = extract_body_text(html);
        assert!(text.contains("The real content lives here."));
        assert!(!text.contains("Home About Contact"));
        assert!(!text.contains("var x = 1"));
        assert!(!text.contains("Copyright 2026"));
    }

    #[test]
    fn empty_document_yields_empty_text() {
        assert_eq!(extract_body_text("<html><body></body></html>"), "");
    }
}
