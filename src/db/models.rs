use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;

use crate::catalog::Product;

// ── Users ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub user_id: i64,
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub started_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
    pub is_active: bool,
    pub preferences: Json<serde_json::Value>,
    pub metadata: Json<serde_json::Value>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct UserStat {
    pub id: i64,
    pub user_id: i64,
    pub action: String,
    pub timestamp: DateTime<Utc>,
    pub metadata: Json<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewUser {
    pub user_id: i64,
    pub username: Option<String>,
    pub full_name: Option<String>,
    #[serde(default)]
    pub preferences: Option<serde_json::Value>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

/// Partial update; `None` leaves the column untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserUpdate {
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub is_active: Option<bool>,
    pub preferences: Option<serde_json::Value>,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionCount {
    pub action: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserActivity {
    pub user_id: i64,
    pub total_queries: i64,
    pub last_activity: Option<DateTime<Utc>>,
    pub popular_actions: Vec<ActionCount>,
}

// ── Products ───────────────────────────────────────────────────────

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ProductRecord {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub short_description: Option<String>,
    pub category: Option<String>,
    pub price: Option<f64>,
    pub benefits: Json<Vec<String>>,
    pub short_benefits: Json<Vec<String>>,
    pub indications: Json<Vec<String>>,
    pub properties: Json<Vec<String>>,
    pub components: Json<Vec<String>>,
    pub tags: Json<Vec<String>>,
    pub composition: Option<String>,
    pub dosage: Option<String>,
    pub contraindications: Option<String>,
    pub image_id: Option<String>,
    pub url: Option<String>,
    pub form: Option<String>,
    pub weight: Option<String>,
    pub volume: Option<String>,
    pub is_available: bool,
    pub rating: f64,
    pub review_count: i64,
    pub product_metadata: Json<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProductRecord {
    /// Fields searched by free-text queries.
    pub(crate) fn text_fields(&self) -> [Option<&str>; 5] {
        [
            Some(self.name.as_str()),
            self.description.as_deref(),
            self.short_description.as_deref(),
            self.category.as_deref(),
            self.composition.as_deref(),
        ]
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NewProduct {
    pub id: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub short_description: Option<String>,
    pub category: Option<String>,
    pub price: Option<f64>,
    pub benefits: Vec<String>,
    pub short_benefits: Vec<String>,
    pub indications: Vec<String>,
    pub properties: Vec<String>,
    pub components: Vec<String>,
    pub tags: Vec<String>,
    pub composition: Option<String>,
    pub dosage: Option<String>,
    pub contraindications: Option<String>,
    pub image_id: Option<String>,
    pub url: Option<String>,
    pub form: Option<String>,
    pub weight: Option<String>,
    pub volume: Option<String>,
    pub is_available: Option<bool>,
    pub rating: Option<f64>,
    pub review_count: Option<i64>,
    pub product_metadata: Option<serde_json::Value>,
}

fn non_empty(s: &str) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

impl From<&Product> for NewProduct {
    fn from(p: &Product) -> Self {
        Self {
            id: Some(p.slug()),
            name: p.name.clone(),
            description: non_empty(&p.description),
            short_description: non_empty(&p.short_description),
            category: non_empty(&p.category),
            price: p.price,
            benefits: p.benefits.clone(),
            composition: non_empty(&p.composition),
            dosage: non_empty(&p.dosage),
            contraindications: non_empty(&p.contraindications),
            image_id: p.image_id.clone(),
            url: non_empty(&p.url),
            form: non_empty(&p.form),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub short_description: Option<String>,
    pub category: Option<String>,
    pub price: Option<f64>,
    pub benefits: Option<Vec<String>>,
    pub short_benefits: Option<Vec<String>>,
    pub indications: Option<Vec<String>>,
    pub properties: Option<Vec<String>>,
    pub components: Option<Vec<String>>,
    pub tags: Option<Vec<String>>,
    pub composition: Option<String>,
    pub dosage: Option<String>,
    pub contraindications: Option<String>,
    pub image_id: Option<String>,
    pub url: Option<String>,
    pub form: Option<String>,
    pub weight: Option<String>,
    pub volume: Option<String>,
    pub is_available: Option<bool>,
    pub rating: Option<f64>,
    pub review_count: Option<i64>,
    pub product_metadata: Option<serde_json::Value>,
}

fn default_limit() -> i64 {
    10
}

/// Conjunction of optional filters used by `Database::search_products`.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductFilter {
    #[serde(default)]
    pub query: String,
    pub category: Option<String>,
    pub price_min: Option<f64>,
    pub price_max: Option<f64>,
    pub is_available: Option<bool>,
    pub tags: Option<Vec<String>>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

impl Default for ProductFilter {
    fn default() -> Self {
        Self {
            query: String::new(),
            category: None,
            price_min: None,
            price_max: None,
            is_available: None,
            tags: None,
            limit: default_limit(),
            offset: 0,
        }
    }
}

impl ProductFilter {
    pub fn text(query: &str, limit: i64) -> Self {
        Self {
            query: query.to_string(),
            limit,
            ..Default::default()
        }
    }

    pub fn matches(&self, p: &ProductRecord) -> bool {
        let query = self.query.trim().to_lowercase();
        if !query.is_empty()
            && !p
                .text_fields()
                .iter()
                .flatten()
                .any(|field| field.to_lowercase().contains(&query))
        {
            return false;
        }
        if let Some(category) = self.category.as_deref().filter(|c| !c.is_empty()) {
            let needle = category.to_lowercase();
            match &p.category {
                Some(c) if c.to_lowercase().contains(&needle) => {}
                _ => return false,
            }
        }
        if let Some(min) = self.price_min {
            if !p.price.is_some_and(|price| price >= min) {
                return false;
            }
        }
        if let Some(max) = self.price_max {
            if !p.price.is_some_and(|price| price <= max) {
                return false;
            }
        }
        if let Some(available) = self.is_available {
            if p.is_available != available {
                return false;
            }
        }
        if let Some(tags) = &self.tags {
            if !tags.iter().all(|t| p.tags.0.contains(t)) {
                return false;
            }
        }
        true
    }
}
