use scraper::{Html, Selector};

use crate::error::{Result, SearchError};
use crate::types::{EngineConfig, SearchItem};

fn compile(engine: &str, field: &str, raw: &str) -> Result<Selector> {
    Selector::parse(raw).map_err(|e| SearchError::BadSelector {
        engine: engine.to_string(),
        selector: field.to_string(),
        reason: format!("{e:?}"),
    })
}

/// Parses a SERP HTML body into ranked result items using the engine's
/// declared selectors (spec 4.5: "result selectors (container/title/
/// URL/snippet)... declared in an external config").
pub fn parse_results(engine: &EngineConfig, html: &str) -> Result<Vec<SearchItem>> {
    let document = Html::parse_document(html);
    let container = compile(&engine.name, "result_container", &engine.selectors.result_container)?;
    let title_sel = compile(&engine.name, "title", &engine.selectors.title)?;
    let url_sel = compile(&engine.name, "url", &engine.selectors.url)?;
    let snippet_sel = compile(&engine.name, "snippet", &engine.selectors.snippet)?;

    let mut items = Vec::new();
    for (rank, result) in document.select(&container).enumerate() {
        let title = result
            .select(&title_sel)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .unwrap_or_default();
        let url = result
            .select(&url_sel)
            .next()
            .and_then(|el| el.value().attr("href"))
            .map(str::to_string)
            .unwrap_or_default();
        let snippet = result
            .select(&snippet_sel)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .unwrap_or_default();

        if url.is_empty() {
            continue;
        }
        items.push(SearchItem {
            title,
            url,
            snippet,
            rank,
        });
    }
    Ok(items)
}

/// Detects whether `html` carries one of the engine's declared CAPTCHA
/// signatures, matching either as a CSS selector or a raw body
/// substring depending on which the pattern compiles as.
pub fn detect_captcha<'a>(engine: &'a EngineConfig, html: &str) -> Option<&'a str> {
    for sig in &engine.captcha_signatures {
        if let Ok(selector) = Selector::parse(&sig.pattern) {
            let document = Html::parse_document(html);
            if document.select(&selector).next().is_some() {
                return Some(&sig.provider_hint);
            }
        } else if html.contains(&sig.pattern) {
            return Some(&sig.provider_hint);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CaptchaSignature, PaginationStyle, SerpSelectors};

    fn engine() -> EngineConfig {
        EngineConfig {
            name: "duckduckgo".to_string(),
            url_template: "https://duckduckgo.com/html/?q={query}".to_string(),
            results_per_page: 10,
            pagination_style: PaginationStyle::Offset,
            selectors: SerpSelectors {
                result_container: "div.result".to_string(),
                title: "a.result__a".to_string(),
                url: "a.result__a".to_string(),
                snippet: "a.result__snippet".to_string(),
                diagnostic: None,
            },
            captcha_signatures: vec![CaptchaSignature {
                pattern: "unusual traffic".to_string(),
                provider_hint: "ddg_rate_limit".to_string(),
            }],
            base_weight: 1.0,
        }
    }

    #[test]
    fn parses_results_in_document_order() {
        let html = r#"
            <html><body>
            <div class="result"><a class="result__a" href="https://a.example">A</a>
              <a class="result__snippet">snippet a</a></div>
            <div class="result"><a class="result__a" href="https://b.example">B</a>
              <a class="result__snippet">snippet b</a></div>
            </body></html>
        "#;
        let engine = engine();
        let items = parse_results(&engine, html).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].url, "https://a.example");
        assert_eq!(items[0].rank, 0);
        assert_eq!(items[1].rank, 1);
    }

    #[test]
    fn skips_results_with_no_url() {
        let html = r#"<div class="result"><a class="result__a">no href</a></div>"#;
        let items = parse_results(&engine(), html).unwrap();
        assert!(items.is_empty());
    }

    #[test]
    fn detects_substring_captcha_signature() {
        let html = "<html><body>we have detected unusual traffic from your network</body></html>";
        assert_eq!(detect_captcha(&engine(), html), Some("ddg_rate_limit"));
    }

    #[test]
    fn clean_page_has_no_captcha() {
        let html = "<html><body>normal results page</body></html>";
        assert_eq!(detect_captcha(&engine(), html), None);
    }
}
