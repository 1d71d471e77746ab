use regex::Regex;
use scraper::{Html, Selector};
use std::sync::OnceLock;

/// How a value was obtained: a site-specific selector or the generic
/// full-page fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confidence {
    Selector,
    Fallback,
}

#[derive(Debug, Clone)]
pub struct SmartExtract {
    pub name: Option<String>,
    pub price_text: Option<String>,
}

fn price_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        // A currency symbol or code next to digits, optionally with
        // thousands separators and decimals
        Regex::new(
            r"(?:[₦$€£¥₹]|NGN|USD|EUR|GBP|JPY|CAD|AUD|CHF|CNY)\s*\d{1,3}(?:[,.]\d{3})*(?:\.\d{1,2})?",
        )
        .expect("price pattern is valid")
    })
}

/// Try each selector in order; return the first match whose trimmed text is
/// non-empty. None is "absent", not an error.
pub fn extract_field(document: &Html, selectors: &[String]) -> Option<String> {
    for selector_str in selectors {
        let Ok(selector) = Selector::parse(selector_str) else {
            continue;
        };
        for element in document.select(&selector) {
            let text = element.text().collect::<Vec<_>>().join(" ").trim().to_string();
            if !text.is_empty() {
                return Some(text);
            }
        }
    }
    None
}

/// Price variant: the matched text must contain a recognizable currency or
/// digit pattern, rejecting decorative matches like "Price:" labels.
pub fn extract_price_field(document: &Html, selectors: &[String]) -> Option<String> {
    for selector_str in selectors {
        let Ok(selector) = Selector::parse(selector_str) else {
            continue;
        };
        for element in document.select(&selector) {
            let text = element.text().collect::<Vec<_>>().join(" ").trim().to_string();
            if !text.is_empty() && looks_like_price(&text) {
                return Some(text);
            }
        }
    }
    None
}

fn looks_like_price(text: &str) -> bool {
    price_pattern().is_match(text) || text.chars().any(|c| c.is_ascii_digit())
}

/// Generic fallback for when every site-specific selector failed: take the
/// page title or first h1 as name, scan the full text for a currency pattern
/// as price. Structurally identical to a selector match but lower-confidence.
pub fn smart_extract(document: &Html) -> SmartExtract {
    let name = extract_field(document, &["title".to_string()])
        .or_else(|| extract_field(document, &["h1".to_string()]));

    let full_text = document
        .root_element()
        .text()
        .collect::<Vec<_>>()
        .join(" ");
    let price_text = price_pattern()
        .find(&full_text)
        .map(|m| m.as_str().trim().to_string());

    SmartExtract { name, price_text }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(html: &str) -> Html {
        Html::parse_document(html)
    }

    #[test]
    fn test_first_matching_selector_wins() {
        let document = doc(r#"
            <div class="name">Kettle 1.7L</div>
            <h2 class="product-title">Ignored</h2>
        "#);
        let selectors = vec![
            ".product-title-missing".to_string(),
            ".name".to_string(),
            ".product-title".to_string(),
        ];
        assert_eq!(
            extract_field(&document, &selectors),
            Some("Kettle 1.7L".to_string())
        );
    }

    #[test]
    fn test_empty_matches_are_skipped() {
        let document = doc(r#"
            <div class="name">   </div>
            <div class="title">Rice Cooker</div>
        "#);
        let selectors = vec![".name".to_string(), ".title".to_string()];
        assert_eq!(
            extract_field(&document, &selectors),
            Some("Rice Cooker".to_string())
        );
    }

    #[test]
    fn test_absent_when_nothing_matches() {
        let document = doc("<p>no product here</p>");
        assert_eq!(extract_field(&document, &[".name".to_string()]), None);
    }

    #[test]
    fn test_invalid_selector_is_skipped() {
        let document = doc(r#"<div class="price">₦500</div>"#);
        let selectors = vec![">>>".to_string(), ".price".to_string()];
        assert_eq!(extract_field(&document, &selectors), Some("₦500".to_string()));
    }

    #[test]
    fn test_price_field_rejects_decorative_match() {
        let document = doc(r#"
            <span class="price">Best price!</span>
            <span class="amount">₦50,000.00</span>
        "#);
        let selectors = vec![".price".to_string(), ".amount".to_string()];
        assert_eq!(
            extract_price_field(&document, &selectors),
            Some("₦50,000.00".to_string())
        );
    }

    #[test]
    fn test_smart_extract_uses_title_and_page_scan() {
        let document = doc(r#"
            <html>
              <head><title>Table Fan - MegaStore</title></head>
              <body>
                <p>Limited offer today only</p>
                <p>Now ₦12,500.00 while stocks last</p>
              </body>
            </html>
        "#);
        let result = smart_extract(&document);
        assert_eq!(result.name, Some("Table Fan - MegaStore".to_string()));
        assert_eq!(result.price_text, Some("₦12,500.00".to_string()));
    }

    #[test]
    fn test_smart_extract_falls_back_to_h1() {
        let document = doc("<body><h1>Gas Cooker</h1><p>USD 120.00</p></body>");
        let result = smart_extract(&document);
        assert_eq!(result.name, Some("Gas Cooker".to_string()));
        assert_eq!(result.price_text, Some("USD 120.00".to_string()));
    }

    #[test]
    fn test_smart_extract_absent_price() {
        let document = doc("<body><h1>Contact Us</h1><p>No numbers here</p></body>");
        let result = smart_extract(&document);
        assert_eq!(result.price_text, None);
    }
}
