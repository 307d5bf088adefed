pub mod intent;
pub mod text;

use regex::Regex;

use crate::catalog::KnowledgeBase;

pub use intent::{classify, Intent};
pub use text::{analyze_sentiment, clean_text, Sentiment};

#[derive(Debug, Clone)]
pub struct ProcessedMessage {
    pub text: String,
    pub cleaned: String,
    pub intent: Intent,
    pub confidence: f64,
    pub sentiment: Sentiment,
    /// Catalog names mentioned in the message
    pub products: Vec<String>,
    pub normalized: String,
    pub expanded_query: String,
}

impl ProcessedMessage {
    pub fn summary(&self) -> String {
        let mut out = format!(
            "Intent: {}, Sentiment: {}",
            self.intent.as_str(),
            self.sentiment.as_str()
        );
        if !self.products.is_empty() {
            out.push_str(&format!(", Products: {}", self.products.join(", ")));
        }
        out
    }
}

/// Runs cleanup, intent, sentiment and product recognition over a message.
pub struct NlpProcessor {
    product_patterns: Vec<(String, Regex)>,
}

impl NlpProcessor {
    pub fn new(kb: &KnowledgeBase) -> Self {
        let product_patterns = kb
            .all()
            .iter()
            .filter_map(|p| {
                // "Солберри-H" also matches "солберри h" and "солберриh"
                let pattern = p
                    .name
                    .split(|c: char| c == '-' || c.is_whitespace())
                    .filter(|part| !part.is_empty())
                    .map(regex::escape)
                    .collect::<Vec<_>>()
                    .join(r"[\s\-]*");
                Regex::new(&format!("(?i){}", pattern))
                    .ok()
                    .map(|re| (p.name.clone(), re))
            })
            .collect();
        Self { product_patterns }
    }

    pub fn find_products(&self, text: &str) -> Vec<String> {
        self.product_patterns
            .iter()
            .filter(|(_, re)| re.is_match(text))
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn process(&self, text: &str) -> ProcessedMessage {
        let cleaned = clean_text(text);
        let (intent, confidence) = classify(&cleaned);
        ProcessedMessage {
            text: text.to_string(),
            intent,
            confidence,
            sentiment: analyze_sentiment(&cleaned),
            products: self.find_products(&cleaned),
            normalized: text::normalize_text(&cleaned),
            expanded_query: text::expand_health_terms(&cleaned),
            cleaned,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Product;

    #[test]
    fn process_collects_everything() {
        let kb = KnowledgeBase::from_products(vec![
            Product::new("Солберри-H", "Иммунитет", ""),
            Product::new("Битерон-H", "Печень", ""),
        ]);
        let nlp = NlpProcessor::new(&kb);

        let msg = nlp.process("Солберри h не помогает, разочарован");
        assert_eq!(msg.products, vec!["Солберри-H".to_string()]);
        assert_eq!(msg.intent, Intent::Complaint);
        assert_eq!(msg.sentiment, Sentiment::Negative);
        assert!(msg.summary().contains("Products: Солберри-H"));
    }
}
