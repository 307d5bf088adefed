use serde::{Deserialize, Serialize};

use crate::catalog::{KnowledgeBase, Product};

const NAME_HIT_BONUS: u32 = 10;
const HEAVY_FIELD_WEIGHT: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Relevance {
    High,
    Medium,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub product: Product,
    pub score: f64,
    pub relevance: Relevance,
}

impl SearchHit {
    pub fn new(product: Product, score: f64) -> Self {
        let relevance = if score > 0.7 {
            Relevance::High
        } else {
            Relevance::Medium
        };
        Self {
            product,
            score,
            relevance,
        }
    }
}

/// Weighted substring count of query terms over the searchable fields.
pub fn raw_score(product: &Product, terms: &[String]) -> u32 {
    let benefits = product.benefits.join(" ");
    let fields: [(&str, bool); 6] = [
        (product.name.as_str(), false),
        (product.description.as_str(), true),
        (product.short_description.as_str(), false),
        (product.category.as_str(), false),
        (benefits.as_str(), true),
        (product.composition.as_str(), false),
    ];

    let mut score = 0;
    for (i, (text, heavy)) in fields.iter().enumerate() {
        if text.is_empty() {
            continue;
        }
        let lower = text.to_lowercase();
        let matches = terms.iter().filter(|t| lower.contains(t.as_str())).count() as u32;
        if i == 0 && matches > 0 {
            score += NAME_HIT_BONUS;
        }
        score += if *heavy {
            matches * HEAVY_FIELD_WEIGHT
        } else {
            matches
        };
    }
    score
}

pub fn normalize_score(raw: u32) -> f64 {
    (0.3 + raw as f64 * 0.05).min(0.95)
}

/// Rank the catalog against `query`. Products without a single hit are
/// dropped; ties keep catalog order.
pub fn search_local(
    kb: &KnowledgeBase,
    query: &str,
    category: Option<&str>,
    limit: usize,
) -> Vec<SearchHit> {
    let terms: Vec<String> = query.to_lowercase().split_whitespace().map(str::to_string).collect();
    if terms.is_empty() {
        return Vec::new();
    }
    let category = category.map(str::to_lowercase);

    let mut hits: Vec<SearchHit> = kb
        .all()
        .iter()
        .filter(|p| match &category {
            Some(c) => p.category.to_lowercase().contains(c.as_str()),
            None => true,
        })
        .filter_map(|p| {
            let raw = raw_score(p, &terms);
            (raw > 0).then(|| SearchHit::new(p.clone(), normalize_score(raw)))
        })
        .collect();

    hits.sort_by(|a, b| b.score.total_cmp(&a.score));
    hits.truncate(limit);
    tracing::debug!("Local search for '{}' found {} products", query, hits.len());
    hits
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kb() -> KnowledgeBase {
        let mut solberry = Product::new("Солберри-H", "Иммунитет", "Облепиховое масло для иммунитета");
        solberry.benefits = vec!["поддержка иммунитета".into()];
        let biteron = Product::new("Битерон-H", "Печень", "Поддержка печени и желчного пузыря");
        let omega = Product::new("Омега-3", "Омега", "Рыбий жир");
        KnowledgeBase::from_products(vec![solberry, biteron, omega])
    }

    fn terms(q: &str) -> Vec<String> {
        q.split_whitespace().map(str::to_string).collect()
    }

    #[test]
    fn name_hit_gets_bonus_on_top_of_field_weight() {
        let p = Product::new("Битерон-H", "", "");
        assert_eq!(raw_score(&p, &terms("битерон")), 11);
    }

    #[test]
    fn description_and_benefits_weigh_triple() {
        let kb = kb();
        let solberry = kb.find_by_name("Солберри-H").unwrap();
        // description(3) + category(1) + benefits(3)
        assert_eq!(raw_score(solberry, &terms("иммунитет")), 7);
    }

    #[test]
    fn ranking_sorts_and_scores() {
        let hits = search_local(&kb(), "Печени битерон", None, 10);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].product.name, "Битерон-H");
        assert_eq!(hits[0].relevance, Relevance::High);
        assert!(hits[0].score <= 0.95);
    }

    #[test]
    fn score_is_capped() {
        assert!((normalize_score(1) - 0.35).abs() < 1e-9);
        assert_eq!(normalize_score(1000), 0.95);
        assert_eq!(SearchHit::new(Product::default(), 0.7).relevance, Relevance::Medium);
    }

    #[test]
    fn limit_category_and_empty_query() {
        let kb = kb();
        assert_eq!(search_local(&kb, "h", None, 1).len(), 1);
        assert!(search_local(&kb, "   ", None, 5).is_empty());
        let only_liver = search_local(&kb, "поддержка", Some("печень"), 5);
        assert_eq!(only_liver.len(), 1);
        assert_eq!(only_liver[0].product.name, "Битерон-H");
    }
}
