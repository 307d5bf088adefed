use std::collections::HashSet;

use regex::Regex;

use crate::catalog::{KnowledgeBase, Product};

const MAX_MENTIONS: usize = 5;

fn name_variants(name: &str) -> Vec<String> {
    let lower = name.to_lowercase();
    let mut variants = vec![lower.clone(), lower.replace('-', " "), lower.replace('-', "")];
    if lower.contains(' ') {
        if let Some(first) = lower.split_whitespace().next() {
            variants.push(first.to_string());
        }
    }
    variants.dedup();
    variants
}

fn mentions_word(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    match Regex::new(&format!(r"\b{}\b", regex::escape(needle))) {
        Ok(re) => re.is_match(haystack),
        Err(_) => haystack.contains(needle),
    }
}

/// Catalog products named in an answer, in catalog order.
pub fn extract_mentioned_products(answer: &str, kb: &KnowledgeBase) -> Vec<Product> {
    let answer = answer.to_lowercase();
    let mut seen = HashSet::new();

    kb.all()
        .iter()
        .filter(|p| {
            name_variants(&p.name)
                .iter()
                .any(|v| mentions_word(&answer, v))
        })
        .filter(|p| seen.insert(p.name.clone()))
        .take(MAX_MENTIONS)
        .cloned()
        .collect()
}

/// Products whose name contains any word of the request longer than two chars.
pub fn find_products_for_link(text: &str, kb: &KnowledgeBase) -> Vec<Product> {
    let words: Vec<String> = text
        .to_lowercase()
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric() && c != '-').to_string())
        .filter(|w| w.chars().count() > 2)
        .collect();

    kb.all()
        .iter()
        .filter(|p| {
            let name = p.name.to_lowercase();
            words.iter().any(|w| name.contains(w.as_str()))
        })
        .cloned()
        .collect()
}

/// Shortest text that may pick a shown product by part of its name.
const MIN_NAME_FRAGMENT_CHARS: usize = 3;

/// Pick a product from a previously shown list by 1-based number or by name.
pub fn select_product<'a>(text: &str, products: &'a [Product]) -> Option<&'a Product> {
    let text = text.trim();
    if let Ok(n) = text.parse::<usize>() {
        if n >= 1 {
            if let Some(p) = products.get(n - 1) {
                return Some(p);
            }
        }
    }
    let lower = text.to_lowercase();
    if lower.chars().count() < MIN_NAME_FRAGMENT_CHARS {
        return None;
    }
    products.iter().find(|p| {
        let name = p.name.to_lowercase();
        name.contains(&lower) || lower.contains(&name)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kb() -> KnowledgeBase {
        KnowledgeBase::from_products(vec![
            Product::new("Аргент-Макс", "Иммунитет", ""),
            Product::new("Солберри-H", "Иммунитет", ""),
            Product::new("Лист Черного Ореха", "Паразиты", ""),
            Product::new("Гель", "Кожа", ""),
        ])
    }

    #[test]
    fn finds_hyphen_and_first_word_variants() {
        let answer = "Рекомендую Аргент Макс и лист для очищения. Также подойдет СОЛБЕРРИ-H.";
        let names: Vec<String> = extract_mentioned_products(answer, &kb())
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["Аргент-Макс", "Солберри-H", "Лист Черного Ореха"]);
    }

    #[test]
    fn whole_words_only() {
        assert!(extract_mentioned_products("гелевая форма", &kb()).is_empty());
    }

    #[test]
    fn link_lookup_ignores_short_words() {
        let found = find_products_for_link("дай ссылку на солберри", &kb());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Солберри-H");
        assert!(find_products_for_link("на и в", &kb()).is_empty());
    }

    #[test]
    fn selection_by_number_or_name() {
        let products = kb().all().to_vec();
        assert_eq!(select_product("2", &products).unwrap().name, "Солберри-H");
        assert_eq!(select_product("аргент", &products).unwrap().name, "Аргент-Макс");
        assert!(select_product("9", &products).is_none());
        assert!(select_product("0", &products).is_none());
        assert!(select_product("h", &products).is_none());
        assert!(select_product("-", &products).is_none());
    }
}
