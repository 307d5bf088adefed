//! Per-user conversation memory. Lives only for the lifetime of the process.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::catalog::{truncate_chars, Product};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ConversationContext {
    pub user_id: i64,
    pub messages: Vec<ConversationMessage>,
    pub current_topic: Option<String>,
    #[serde(skip)]
    pub last_products: Vec<Product>,
    pub preferences: serde_json::Map<String, serde_json::Value>,
    /// Full text of the last truncated answer, for "read more"
    #[serde(skip)]
    pub full_answer: Option<String>,
}

impl ConversationContext {
    fn new(user_id: i64) -> Self {
        Self {
            user_id,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversationStats {
    pub total_conversations: usize,
    pub total_messages: usize,
    pub active_users: Vec<i64>,
}

pub struct ConversationStore {
    max_history: usize,
    conversations: RwLock<HashMap<i64, ConversationContext>>,
}

impl ConversationStore {
    pub fn new(max_history: usize) -> Self {
        tracing::info!("Conversation store initialized (max_history={})", max_history);
        Self {
            max_history: max_history.max(1),
            conversations: RwLock::new(HashMap::new()),
        }
    }

    pub async fn add_message(
        &self,
        user_id: i64,
        role: Role,
        content: &str,
        metadata: Option<serde_json::Value>,
    ) {
        let mut map = self.conversations.write().await;
        let ctx = map
            .entry(user_id)
            .or_insert_with(|| ConversationContext::new(user_id));
        ctx.messages.push(ConversationMessage {
            role,
            content: content.to_string(),
            timestamp: Utc::now(),
            metadata: metadata.unwrap_or(serde_json::Value::Null),
        });
        if ctx.messages.len() > self.max_history {
            let excess = ctx.messages.len() - self.max_history;
            ctx.messages.drain(..excess);
        }
    }

    /// Most recent messages, oldest first.
    pub async fn history(&self, user_id: i64, limit: Option<usize>) -> Vec<ConversationMessage> {
        let map = self.conversations.read().await;
        let Some(ctx) = map.get(&user_id) else {
            return Vec::new();
        };
        let skip = match limit {
            Some(n) => ctx.messages.len().saturating_sub(n),
            None => 0,
        };
        ctx.messages[skip..].to_vec()
    }

    pub async fn summary(&self, user_id: i64) -> String {
        let map = self.conversations.read().await;
        let ctx = match map.get(&user_id) {
            Some(ctx) if !ctx.messages.is_empty() => ctx,
            _ => return "Новый разговор".to_string(),
        };

        let mut parts = Vec::new();
        if let Some(topic) = &ctx.current_topic {
            parts.push(format!("Тема: {}", topic));
        }
        let skip = ctx.messages.len().saturating_sub(3);
        for msg in &ctx.messages[skip..] {
            parts.push(format!("{}: {}", msg.role.as_str(), truncate_chars(&msg.content, 50)));
        }
        parts.join("\n")
    }

    pub async fn set_topic(&self, user_id: i64, topic: &str) {
        self.with_context(user_id, |ctx| ctx.current_topic = Some(topic.to_string()))
            .await;
    }

    pub async fn set_last_products(&self, user_id: i64, products: Vec<Product>) {
        self.with_context(user_id, |ctx| ctx.last_products = products).await;
    }

    pub async fn last_products(&self, user_id: i64) -> Vec<Product> {
        let map = self.conversations.read().await;
        map.get(&user_id)
            .map(|ctx| ctx.last_products.clone())
            .unwrap_or_default()
    }

    pub async fn clear_last_products(&self, user_id: i64) {
        let mut map = self.conversations.write().await;
        if let Some(ctx) = map.get_mut(&user_id) {
            ctx.last_products.clear();
        }
    }

    pub async fn store_full_answer(&self, user_id: i64, answer: &str) {
        self.with_context(user_id, |ctx| ctx.full_answer = Some(answer.to_string()))
            .await;
    }

    /// Returns the stored answer once.
    pub async fn take_full_answer(&self, user_id: i64) -> Option<String> {
        let mut map = self.conversations.write().await;
        map.get_mut(&user_id).and_then(|ctx| ctx.full_answer.take())
    }

    pub async fn update_preferences(
        &self,
        user_id: i64,
        preferences: serde_json::Map<String, serde_json::Value>,
    ) {
        self.with_context(user_id, |ctx| ctx.preferences.extend(preferences))
            .await;
    }

    pub async fn clear(&self, user_id: i64) {
        if self.conversations.write().await.remove(&user_id).is_some() {
            tracing::info!("Cleared conversation context for user {}", user_id);
        }
    }

    pub async fn export_json(&self, user_id: i64) -> anyhow::Result<String> {
        let map = self.conversations.read().await;
        let ctx = map
            .get(&user_id)
            .cloned()
            .unwrap_or_else(|| ConversationContext::new(user_id));
        Ok(serde_json::to_string_pretty(&ctx)?)
    }

    pub async fn stats(&self) -> ConversationStats {
        let map = self.conversations.read().await;
        let mut active_users: Vec<i64> = map.keys().copied().collect();
        active_users.sort_unstable();
        ConversationStats {
            total_conversations: map.len(),
            total_messages: map.values().map(|c| c.messages.len()).sum(),
            active_users,
        }
    }

    async fn with_context<F>(&self, user_id: i64, f: F)
    where
        F: FnOnce(&mut ConversationContext),
    {
        let mut map = self.conversations.write().await;
        f(map
            .entry(user_id)
            .or_insert_with(|| ConversationContext::new(user_id)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn history_is_bounded() {
        let store = ConversationStore::new(3);
        for i in 0..5 {
            store.add_message(7, Role::User, &format!("m{}", i), None).await;
        }
        let history = store.history(7, None).await;
        let contents: Vec<_> = history.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["m2", "m3", "m4"]);
        assert_eq!(store.history(7, Some(1)).await[0].content, "m4");
        assert!(store.history(8, None).await.is_empty());
    }

    #[tokio::test]
    async fn summary_shows_topic_and_recent_messages() {
        let store = ConversationStore::new(10);
        assert_eq!(store.summary(1).await, "Новый разговор");

        store.set_topic(1, "печень").await;
        store.add_message(1, Role::User, "что для печени?", None).await;
        store.add_message(1, Role::Assistant, &"о".repeat(60), None).await;

        let summary = store.summary(1).await;
        assert!(summary.starts_with("Тема: печень\nuser: что для печени?"));
        assert!(summary.ends_with(&format!("assistant: {}...", "о".repeat(50))));
    }

    #[tokio::test]
    async fn full_answer_is_taken_once() {
        let store = ConversationStore::new(10);
        store.store_full_answer(1, "длинный ответ").await;
        assert_eq!(store.take_full_answer(1).await.as_deref(), Some("длинный ответ"));
        assert!(store.take_full_answer(1).await.is_none());
    }

    #[tokio::test]
    async fn clear_export_and_stats() {
        let store = ConversationStore::new(10);
        store.add_message(2, Role::User, "привет", None).await;
        store.add_message(1, Role::User, "вопрос", Some(serde_json::json!({"intent": "x"}))).await;
        store
            .set_last_products(1, vec![Product::new("Битерон-H", "Печень", "")])
            .await;
        let mut prefs = serde_json::Map::new();
        prefs.insert("lang".into(), serde_json::json!("ru"));
        store.update_preferences(1, prefs).await;

        let exported: serde_json::Value =
            serde_json::from_str(&store.export_json(1).await.unwrap()).unwrap();
        assert_eq!(exported["messages"][0]["metadata"]["intent"], "x");
        assert_eq!(exported["preferences"]["lang"], "ru");

        let stats = store.stats().await;
        assert_eq!(stats.total_conversations, 2);
        assert_eq!(stats.total_messages, 2);
        assert_eq!(stats.active_users, vec![1, 2]);

        store.clear(1).await;
        assert!(store.last_products(1).await.is_empty());
        assert_eq!(store.stats().await.total_conversations, 1);
    }
}
