//! Product knowledge base loaded from flat JSON files.

use std::collections::{BTreeSet, HashSet};
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Product {
    #[serde(alias = "product", deserialize_with = "lenient_string")]
    pub name: String,
    pub id: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub category: String,
    #[serde(deserialize_with = "lenient_string")]
    pub description: String,
    #[serde(deserialize_with = "lenient_string")]
    pub short_description: String,
    #[serde(deserialize_with = "lenient_list")]
    pub benefits: Vec<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub composition: String,
    #[serde(deserialize_with = "lenient_string")]
    pub dosage: String,
    #[serde(deserialize_with = "lenient_string")]
    pub contraindications: String,
    #[serde(deserialize_with = "lenient_string")]
    pub form: String,
    #[serde(deserialize_with = "lenient_price")]
    pub price: Option<f64>,
    #[serde(deserialize_with = "lenient_string")]
    pub url: String,
    pub image_id: Option<String>,
}

impl Product {
    pub fn new(name: &str, category: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            category: category.to_string(),
            description: description.to_string(),
            ..Default::default()
        }
    }

    /// Stable identifier used by the REST backend.
    pub fn slug(&self) -> String {
        self.id
            .clone()
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| slug(&self.name))
    }

    /// Short description if present, otherwise the head of the full one.
    pub fn summary(&self, max_chars: usize) -> String {
        let source = if self.short_description.is_empty() {
            &self.description
        } else {
            &self.short_description
        };
        truncate_chars(source, max_chars)
    }
}

pub fn slug(name: &str) -> String {
    name.trim().to_lowercase().replace([' ', '_'], "-")
}

pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let mut out: String = text.chars().take(max_chars).collect();
        out.push_str("...");
        out
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CatalogFile {
    List(Vec<Product>),
    Wrapped { products: Vec<Product> },
}

#[derive(Debug, Clone, Default)]
pub struct KnowledgeBase {
    products: Vec<Product>,
}

impl KnowledgeBase {
    pub fn from_products(products: Vec<Product>) -> Self {
        let mut kb = Self::default();
        kb.merge(products);
        kb
    }

    /// Load and merge every readable file. Missing or malformed files are
    /// logged and skipped so the bot still starts with a partial catalog.
    pub fn load<P: AsRef<Path>>(paths: &[P]) -> Self {
        let mut kb = Self::default();
        for path in paths {
            let path = path.as_ref();
            match Self::read_file(path) {
                Ok(products) => {
                    let before = kb.products.len();
                    kb.merge(products);
                    tracing::info!(
                        "Loaded {} products from {}",
                        kb.products.len() - before,
                        path.display()
                    );
                }
                Err(e) => tracing::warn!("Skipping knowledge base {}: {}", path.display(), e),
            }
        }
        if kb.products.is_empty() {
            tracing::warn!("Knowledge base is empty");
        }
        kb
    }

    fn read_file(path: &Path) -> anyhow::Result<Vec<Product>> {
        let raw = std::fs::read_to_string(path)?;
        let file: CatalogFile = serde_json::from_str(&raw)?;
        Ok(match file {
            CatalogFile::List(p) => p,
            CatalogFile::Wrapped { products } => products,
        })
    }

    /// First occurrence of a name wins; nameless entries are dropped.
    fn merge(&mut self, products: Vec<Product>) {
        let mut seen: HashSet<String> = self
            .products
            .iter()
            .map(|p| p.name.trim().to_lowercase())
            .collect();
        for product in products {
            let key = product.name.trim().to_lowercase();
            if key.is_empty() || !seen.insert(key) {
                continue;
            }
            self.products.push(product);
        }
    }

    pub fn all(&self) -> &[Product] {
        &self.products
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    pub fn find_by_name(&self, name: &str) -> Option<&Product> {
        let needle = name.trim().to_lowercase();
        self.products.iter().find(|p| p.name.to_lowercase() == needle)
    }

    pub fn categories(&self) -> Vec<String> {
        self.products
            .iter()
            .filter(|p| !p.category.is_empty())
            .map(|p| p.category.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn by_category(&self, category: &str) -> Vec<&Product> {
        let needle = category.to_lowercase();
        self.products
            .iter()
            .filter(|p| p.category.to_lowercase() == needle)
            .collect()
    }
}

// ── Lenient field decoding ─────────────────────────────────────────
// Catalog files were edited by hand: fields show up as null, numbers,
// or a single string where a list is expected.

fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(match serde_json::Value::deserialize(d)? {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        serde_json::Value::Array(items) => items
            .iter()
            .map(value_to_text)
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    })
}

fn lenient_list<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
    Ok(match serde_json::Value::deserialize(d)? {
        serde_json::Value::Array(items) => items.iter().map(value_to_text).collect(),
        serde_json::Value::Null => Vec::new(),
        serde_json::Value::String(s) if s.is_empty() => Vec::new(),
        other => vec![value_to_text(&other)],
    })
}

fn lenient_price<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    Ok(match serde_json::Value::deserialize(d)? {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => {
            let digits: String = s
                .chars()
                .filter(|c| c.is_ascii_digit() || *c == '.')
                .collect();
            digits.parse().ok()
        }
        _ => None,
    })
}

fn value_to_text(v: &serde_json::Value) -> String {
    match v {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn decodes_legacy_product_key_and_loose_fields() {
        let raw = r#"[{"product": "Солберри-H", "category": "Иммунитет",
                       "benefits": "укрепляет иммунитет", "composition": ["облепиха", "витамин C"],
                       "dosage": null, "price": 1200.0}]"#;
        let products: Vec<Product> = serde_json::from_str(raw).unwrap();
        let p = &products[0];
        assert_eq!(p.name, "Солберри-H");
        assert_eq!(p.benefits, vec!["укрепляет иммунитет"]);
        assert_eq!(p.composition, "облепиха, витамин C");
        assert_eq!(p.dosage, "");
        assert_eq!(p.slug(), "солберри-h");
    }

    #[test]
    fn load_merges_files_and_skips_broken_ones() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("kb.json");
        let second = dir.path().join("kb_new.json");
        let broken = dir.path().join("broken.json");

        std::fs::File::create(&first)
            .unwrap()
            .write_all(r#"[{"product": "Битерон-H", "category": "Печень"}]"#.as_bytes())
            .unwrap();
        std::fs::File::create(&second)
            .unwrap()
            .write_all(
                r#"{"products": [{"name": "битерон-h", "category": "Другое"},
                                {"name": "Омега-3", "category": "Омега"}]}"#
                    .as_bytes(),
            )
            .unwrap();
        std::fs::write(&broken, "not json").unwrap();

        let kb = KnowledgeBase::load(&[first, second, broken, dir.path().join("missing.json")]);
        assert_eq!(kb.len(), 2);
        assert_eq!(kb.find_by_name("БИТЕРОН-H").unwrap().category, "Печень");
        assert_eq!(kb.categories(), vec!["Омега".to_string(), "Печень".to_string()]);
    }

    #[test]
    fn slug_replaces_separators() {
        assert_eq!(slug("Omega 3_Plus"), "omega-3-plus");
    }

    #[test]
    fn summary_prefers_short_description() {
        let mut p = Product::new("X", "", "длинное описание продукта");
        assert_eq!(p.summary(7), "длинное...");
        p.short_description = "кратко".into();
        assert_eq!(p.summary(100), "кратко");
    }
}
