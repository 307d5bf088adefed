use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::catalog::{KnowledgeBase, Product};
use crate::search::engine::{search_local, SearchHit};
use crate::search::synonyms::expand_query_with_synonyms;

/// Score assigned to backend results, which come back unranked.
const BACKEND_SCORE: f64 = 0.8;

#[derive(Debug, Serialize)]
struct BackendQuery<'a> {
    query: &'a str,
    category: Option<&'a str>,
    limit: usize,
}

#[derive(Debug, Deserialize)]
struct BackendResponse {
    #[serde(default)]
    products: Vec<Product>,
}

/// Product search that prefers the REST backend and falls back to the
/// in-memory catalog.
pub struct SearchService {
    client: Client,
    backend_url: Option<String>,
    kb: Arc<KnowledgeBase>,
}

impl SearchService {
    pub fn new(kb: Arc<KnowledgeBase>, backend_url: Option<String>) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self {
            client,
            backend_url,
            kb,
        }
    }

    pub fn knowledge_base(&self) -> &KnowledgeBase {
        &self.kb
    }

    pub async fn search_products(
        &self,
        query: &str,
        category: Option<&str>,
        limit: usize,
    ) -> Vec<SearchHit> {
        let expanded = expand_query_with_synonyms(query);
        if expanded != query {
            tracing::debug!("Query expanded with synonyms: {}", expanded);
        }

        if let Some(url) = &self.backend_url {
            match self.search_backend(url, &expanded, category, limit).await {
                Ok(hits) if !hits.is_empty() => {
                    tracing::info!("Backend search returned {} results", hits.len());
                    return hits;
                }
                Ok(_) => tracing::info!("Backend search empty, using local catalog"),
                Err(e) => tracing::warn!("Backend search failed, using local catalog: {}", e),
            }
        }

        search_local(&self.kb, &expanded, category, limit)
    }

    async fn search_backend(
        &self,
        base_url: &str,
        query: &str,
        category: Option<&str>,
        limit: usize,
    ) -> anyhow::Result<Vec<SearchHit>> {
        let resp = self
            .client
            .post(format!("{}/api/v1/search/query", base_url))
            .json(&BackendQuery {
                query,
                category,
                limit,
            })
            .send()
            .await?;

        if !resp.status().is_success() {
            anyhow::bail!("backend returned {}", resp.status());
        }

        let body: BackendResponse = resp.json().await?;
        Ok(body
            .products
            .into_iter()
            .map(|p| SearchHit::new(p, BACKEND_SCORE))
            .collect())
    }

    pub async fn categories(&self) -> Vec<String> {
        if let Some(url) = &self.backend_url {
            let result = async {
                let resp = self
                    .client
                    .get(format!("{}/api/v1/products/categories/list", url))
                    .send()
                    .await?
                    .error_for_status()?;
                resp.json::<Vec<String>>().await
            }
            .await;
            match result {
                Ok(categories) if !categories.is_empty() => return categories,
                Ok(_) => {}
                Err(e) => tracing::warn!("Backend categories failed: {}", e),
            }
        }
        self.kb.categories()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn falls_back_to_catalog_without_backend() {
        let kb = Arc::new(KnowledgeBase::from_products(vec![
            Product::new("Омега-3", "Омега", "Капсулы"),
            Product::new("Битерон-H", "Печень", ""),
        ]));
        let service = SearchService::new(kb, None);

        // "рыбий жир" only matches through the omega synonyms
        let hits = service.search_products("рыбий жир", None, 8).await;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].product.name, "Омега-3");

        assert_eq!(service.categories().await, vec!["Омега", "Печень"]);
    }

    #[tokio::test]
    async fn unreachable_backend_is_not_fatal() {
        let kb = Arc::new(KnowledgeBase::from_products(vec![Product::new(
            "Битерон-H",
            "Печень",
            "",
        )]));
        let service = SearchService::new(kb, Some("http://127.0.0.1:9".to_string()));
        let hits = service.search_products("битерон", None, 8).await;
        assert_eq!(hits.len(), 1);
    }
}
