use regex::Regex;
use scraper::{Html, Selector};
use serde_json::Value;

/// Raw price/currency pair as it appears on the page, normalized: the price
/// keeps digits only ("2 350" becomes "2350"), the currency is trimmed but
/// otherwise left alone (ISO code or bare symbol).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceData {
    pub price: String,
    pub currency: String,
}

impl PriceData {
    /// A 200 page can parse cleanly and still carry nothing; expired
    /// listings often keep the markup but drop the values.
    pub fn is_blank(&self) -> bool {
        self.price.trim().is_empty() || self.currency.trim().is_empty()
    }
}

/// Ordered fallback list for markup extraction, most reliable first: the
/// dedicated price container marker, then legacy style hooks.
const CONTENT_SELECTORS: &[&str] = &[
    r#"[data-testid="ad-price-container"]"#,
    ".price-wrapper .price h3",
    ".css-okktvh-Text",
    ".css-10b0gli",
    ".pricelabel__value",
];

/// Recovers a price/currency pair from listing markup.
///
/// Embedded JSON-LD is preferred: it is machine-oriented and survives the
/// visual redesigns that churn class names. Content selectors are the
/// fallback for pages that ship no usable structured data.
pub struct Extractor {
    json_ld_selector: Selector,
    content_selectors: Vec<Selector>,
    price_regex: Regex,
}

impl Extractor {
    pub fn new() -> Self {
        Self {
            json_ld_selector: Selector::parse(r#"script[type="application/ld+json"]"#)
                .expect("static selector"),
            content_selectors: CONTENT_SELECTORS
                .iter()
                .map(|s| Selector::parse(s).expect("static selector"))
                .collect(),
            price_regex: Regex::new(r"([0-9\s,.]+)\s*([A-Za-z$€£¥₽]+)").expect("static regex"),
        }
    }

    /// `None` means both strategies came up empty.
    pub fn extract(&self, html: &str) -> Option<PriceData> {
        let document = Html::parse_document(html);
        self.extract_json_ld(&document)
            .or_else(|| self.extract_markup(&document))
    }

    // Strategy A: the first JSON-LD block whose "offers" object carries both
    // price fields wins. Pages routinely embed several blocks (breadcrumbs,
    // organization info); only an offer with both fields counts.
    fn extract_json_ld(&self, document: &Html) -> Option<PriceData> {
        for script in document.select(&self.json_ld_selector) {
            let raw: String = script.text().collect();
            let json: Value = match serde_json::from_str(&raw) {
                Ok(value) => value,
                Err(_) => continue,
            };

            let Some(offers) = json.get("offers") else {
                continue;
            };

            if let (Some(price), Some(currency)) = (
                scalar_to_string(offers.get("price")),
                scalar_to_string(offers.get("priceCurrency")),
            ) {
                return Some(PriceData {
                    price: keep_digits(&price),
                    currency: currency.trim().to_string(),
                });
            }
        }
        None
    }

    // Strategy B: first selector with an element whose text matches the
    // price regex. A selector hit without a regex match is a miss, not an
    // error; fall through to the next rule.
    fn extract_markup(&self, document: &Html) -> Option<PriceData> {
        for selector in &self.content_selectors {
            let Some(element) = document.select(selector).next() else {
                continue;
            };

            let text = element
                .text()
                .collect::<Vec<_>>()
                .join(" ")
                .trim()
                .to_string();

            if let Some(captures) = self.price_regex.captures(&text) {
                let price = captures.get(1).map(|m| keep_digits(m.as_str()))?;
                let currency = captures
                    .get(2)
                    .map(|m| m.as_str().trim().to_string())?;
                return Some(PriceData { price, currency });
            }
        }
        None
    }
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new()
    }
}

fn scalar_to_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn keep_digits(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}
