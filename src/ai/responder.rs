use lazy_static::lazy_static;
use regex::Regex;
use tokio::sync::Mutex;

use crate::ai::cache::{CacheStats, ResponseCache};
use crate::ai::llm::{ChatMessage, LlmClient};
use crate::ai::prompts::PromptManager;
use crate::catalog::{truncate_chars, Product};
use crate::nlp::Intent;
use crate::search::special;

pub const NO_INFORMATION_FOUND: &str = "NO_INFORMATION_FOUND";
pub const SIGNATURE: &str = "\n\n*📚 Рекомендация на основе данных с сайта Aurora*";
pub const CACHE_NOTE: &str = "\n\n💡 _Информация из кэша для быстрого ответа_";

const MAX_CONTEXT_PRODUCTS: usize = 8;
const MIN_CACHEABLE_QUERY: usize = 20;

const NO_INFO_PHRASES: &[&str] = &[
    "нет информации",
    "не смогла найти",
    "извините",
    "обратитесь к консультанту",
    "напишите наталье",
];

lazy_static! {
    static ref HTML_TAG: Regex = Regex::new(r"<[^>]+>").expect("HTML tag pattern should be valid");
    static ref BOLD: Regex = Regex::new(r"\*\*(.*?)\*\*").expect("Bold pattern should be valid");
    static ref ITALIC: Regex = Regex::new(r"\*(.*?)\*").expect("Italic pattern should be valid");
    static ref CODE: Regex = Regex::new(r"`(.*?)`").expect("Code pattern should be valid");
    static ref UNDERSCORE: Regex = Regex::new(r"_(.*?)_").expect("Underscore pattern should be valid");
    static ref SOURCE_NOTE: Regex =
        Regex::new(r"\(Источник:.*?\)").expect("Source note pattern should be valid");
}

#[derive(Debug, Clone)]
pub struct AssistantReply {
    pub text: String,
    pub products: Vec<Product>,
    /// "small_talk", "cached", "fallback", an intent name or "auto_detected"
    pub intent: String,
    pub confidence: f64,
    pub cached: bool,
}

/// Strip markup the model adds despite instructions, and its own source notes.
pub fn clean_llm_output(text: &str) -> String {
    let text = HTML_TAG.replace_all(text, "");
    let text = BOLD.replace_all(&text, "$1");
    let text = ITALIC.replace_all(&text, "$1");
    let text = CODE.replace_all(&text, "$1");
    let text = UNDERSCORE.replace_all(&text, "$1");
    let text = SOURCE_NOTE.replace_all(&text, "");
    text.trim().to_string()
}

pub fn build_context(products: &[Product]) -> String {
    if products.is_empty() {
        return NO_INFORMATION_FOUND.to_string();
    }

    let mut lines = vec!["Найденные продукты:".to_string()];
    for (i, p) in products.iter().take(MAX_CONTEXT_PRODUCTS).enumerate() {
        lines.push(format!("\n{}. Продукт: {}", i + 1, p.name));
        if !p.category.is_empty() {
            lines.push(format!("   Категория: {}", p.category));
        }
        if let Some(price) = p.price {
            lines.push(format!("   Цена: {}", price));
        }
        let description = if p.description.is_empty() {
            &p.short_description
        } else {
            &p.description
        };
        if !description.is_empty() {
            lines.push(format!(
                "   Описание: {}",
                truncate_chars(description, 200)
            ));
        }
        if !p.dosage.is_empty() {
            lines.push(format!("   Применение: {}", truncate_chars(&p.dosage, 200)));
        }
    }
    lines.join("\n")
}

/// Deterministic answer used when the model is unavailable.
pub fn fallback_answer(products: &[Product]) -> String {
    match products {
        [] => "😔 Извините, но у меня нет информации по вашему вопросу в базе знаний.\n\n\
               💡 Возможно, стоит:\n\
               • Переформулировать вопрос\n\
               • Уточнить название продукта\n\
               • Обратиться к консультанту\n\n\
               ✉️ Напишите Наталье — она обязательно поможет!"
            .to_string(),
        [p] => {
            let mut out = format!("🌿 {}\n\n", p.name);
            if !p.category.is_empty() {
                out.push_str(&format!("📂 Категория: {}\n", p.category));
            }
            if !p.form.is_empty() {
                out.push_str(&format!("💊 Форма: {}\n", p.form));
            }
            let summary = p.summary(300);
            if !summary.is_empty() {
                out.push_str(&format!("📝 {}\n\n", summary));
            }
            out.push_str(
                "💡 Задайте вопрос о составе, способе применения или противопоказаниях \
                 для получения подробной информации.",
            );
            out
        }
        many => {
            let mut out = format!("🔍 Найдено {} продуктов по вашему запросу:\n\n", many.len());
            for (i, p) in many.iter().enumerate() {
                out.push_str(&format!("{}. {}\n", i + 1, p.name));
                if !p.category.is_empty() {
                    out.push_str(&format!("   📂 {}\n", p.category));
                }
                if !p.form.is_empty() {
                    out.push_str(&format!("   💊 {}\n", p.form));
                }
                let summary = p.summary(100);
                if !summary.is_empty() {
                    out.push_str(&format!("   📝 {}\n", summary));
                }
                out.push('\n');
            }
            out.push_str(
                "💡 Выберите продукт и задайте вопрос о нем:\n\
                 • Состав и компоненты\n\
                 • Способ применения\n\
                 • Противопоказания\n\
                 • Полезные свойства",
            );
            out
        }
    }
}

pub fn is_no_info_answer(text: &str) -> bool {
    let lower = text.to_lowercase();
    NO_INFO_PHRASES.iter().any(|p| lower.contains(p))
}

/// Turns a question plus search results into the text sent back to the user.
pub struct Responder {
    llm: LlmClient,
    prompts: PromptManager,
    cache: Option<Mutex<ResponseCache>>,
}

impl Responder {
    pub fn new(llm: LlmClient, prompts: PromptManager, cache: Option<ResponseCache>) -> Self {
        Self {
            llm,
            prompts,
            cache: cache.map(Mutex::new),
        }
    }

    pub async fn answer(
        &self,
        query: &str,
        products: &[Product],
        intent: Option<Intent>,
    ) -> AssistantReply {
        if let Some(reply) = special::small_talk_reply(query) {
            tracing::info!("Small talk detected, answering without the model");
            return AssistantReply {
                text: reply.to_string(),
                products: Vec::new(),
                intent: "small_talk".to_string(),
                confidence: 1.0,
                cached: false,
            };
        }

        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.lock().await.get(query) {
                tracing::info!("Cache hit for '{}'", truncate_chars(query, 50));
                return AssistantReply {
                    text: format!("{}{}", hit, CACHE_NOTE),
                    products: products.to_vec(),
                    intent: "cached".to_string(),
                    confidence: 0.9,
                    cached: true,
                };
            }
        }

        let context = special::enhance_context(&build_context(products), query);
        let system_prompt = match intent {
            Some(intent) => self.prompts.for_intent(intent),
            None => self.prompts.by_keywords(query),
        };
        let messages = [
            ChatMessage::system(system_prompt),
            ChatMessage::user(format!(
                "Контекст из базы знаний:\n{}\n\nВопрос пользователя: {}",
                context, query
            )),
        ];

        if !self.llm.has_key() {
            tracing::warn!("No LLM API key configured, using fallback answer");
            return Self::fallback(products);
        }

        let raw = match self.llm.chat(&messages).await {
            Ok(resp) if !resp.text.trim().is_empty() => resp.text,
            Ok(_) => {
                tracing::warn!("LLM returned an empty answer");
                return Self::fallback(products);
            }
            Err(e) => {
                tracing::error!("LLM request failed: {}", e);
                return Self::fallback(products);
            }
        };

        let text = format!("{}{}", clean_llm_output(&raw), SIGNATURE);

        if query.trim().chars().count() > MIN_CACHEABLE_QUERY {
            if let Some(cache) = &self.cache {
                cache.lock().await.set(query, &text);
            }
        }

        AssistantReply {
            text,
            products: products.to_vec(),
            intent: intent
                .map(|i| i.as_str().to_string())
                .unwrap_or_else(|| "auto_detected".to_string()),
            confidence: 0.85,
            cached: false,
        }
    }

    fn fallback(products: &[Product]) -> AssistantReply {
        AssistantReply {
            text: fallback_answer(products),
            products: products.to_vec(),
            intent: "fallback".to_string(),
            confidence: 0.0,
            cached: false,
        }
    }

    pub async fn cache_stats(&self) -> Option<CacheStats> {
        match &self.cache {
            Some(cache) => Some(cache.lock().await.stats()),
            None => None,
        }
    }

    /// Most frequently served cached questions.
    pub async fn top_queries(&self, limit: usize) -> Vec<(String, u64)> {
        match &self.cache {
            Some(cache) => cache.lock().await.top(limit),
            None => Vec::new(),
        }
    }

    pub async fn clear_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.lock().await.clear();
        }
    }

    /// Drop expired cache entries; returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        match &self.cache {
            Some(cache) => cache.lock().await.clear_expired(),
            None => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    fn responder_with(cache: ResponseCache) -> Responder {
        let config = AppConfig::for_tests();
        Responder::new(LlmClient::new(&config), PromptManager::default(), Some(cache))
    }

    fn responder() -> Responder {
        responder_with(ResponseCache::new(10, 60))
    }

    #[test]
    fn strips_markup_and_source_notes() {
        let raw = "<b>Солберри</b> **укрепляет** *иммунитет* `быстро` _всегда_ (Источник: сайт)";
        assert_eq!(clean_llm_output(raw), "Солберри укрепляет иммунитет быстро всегда");
    }

    #[test]
    fn context_marks_empty_results() {
        assert_eq!(build_context(&[]), NO_INFORMATION_FOUND);
        let mut p = Product::new("Битерон-H", "Печень", &"а".repeat(300));
        p.price = Some(990.0);
        let ctx = build_context(&[p]);
        assert!(ctx.contains("1. Продукт: Битерон-H"));
        assert!(ctx.contains("Цена: 990"));
        assert!(ctx.contains(&format!("{}...", "а".repeat(200))));
    }

    #[test]
    fn fallback_shapes() {
        assert!(is_no_info_answer(&fallback_answer(&[])));

        let one = fallback_answer(&[Product::new("Битерон-H", "Печень", "Для печени")]);
        assert!(one.starts_with("🌿 Битерон-H"));

        let two = fallback_answer(&[
            Product::new("Битерон-H", "Печень", ""),
            Product::new("Солберри-H", "Иммунитет", ""),
        ]);
        assert!(two.contains("Найдено 2 продуктов"));
        assert!(two.contains("2. Солберри-H"));
    }

    #[tokio::test]
    async fn small_talk_skips_everything() {
        let reply = responder().answer("привет", &[], None).await;
        assert_eq!(reply.intent, "small_talk");
        assert_eq!(reply.confidence, 1.0);
    }

    #[tokio::test]
    async fn cached_answers_are_marked() {
        let mut cache = ResponseCache::new(10, 60);
        cache.set("что помогает от простуды", "Аргент-Макс");
        let responder = responder_with(cache);

        let reply = responder.answer("Что помогает от простуды", &[], None).await;
        assert!(reply.cached);
        assert_eq!(reply.text, format!("Аргент-Макс{}", CACHE_NOTE));
        assert_eq!(responder.cache_stats().await.unwrap().total_hits, 1);
    }

    #[tokio::test]
    async fn missing_key_uses_fallback() {
        let products = vec![Product::new("Битерон-H", "Печень", "")];
        let reply = responder().answer("что для печени лучше всего", &products, None).await;
        assert_eq!(reply.intent, "fallback");
        assert!(reply.text.contains("Битерон-H"));
        assert!(!reply.cached);
    }
}
