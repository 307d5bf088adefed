use std::sync::Arc;

use aurora_bot::agent::conversation::{ConversationStore, Role};
use aurora_bot::ai::llm::LlmClient;
use aurora_bot::ai::prompts::PromptManager;
use aurora_bot::ai::responder::{is_no_info_answer, Responder};
use aurora_bot::catalog::{KnowledgeBase, Product};
use aurora_bot::config::AppConfig;
use aurora_bot::search::{mentions, SearchService};

fn offline_config() -> AppConfig {
    AppConfig {
        telegram_bot_token: String::new(),
        llm_api_key: None,
        llm_api_url: "http://127.0.0.1:9/v1/chat/completions".to_string(),
        llm_model: "openai/gpt-4o-mini".to_string(),
        database_url: "sqlite::memory:".to_string(),
        admin_ids: Vec::new(),
        knowledge_base_paths: Vec::new(),
        backend_api_url: None,
        api_bind_addr: "127.0.0.1:0".to_string(),
        enable_cache: false,
        cache_size: 10,
        cache_ttl_minutes: 60,
        max_history: 10,
        prompts_dir: "prompts".to_string(),
        registration_url: "https://example.com/register".to_string(),
        catalog_url: "https://example.com/catalog".to_string(),
    }
}

fn catalog() -> Arc<KnowledgeBase> {
    let mut biteron = Product::new("Битерон-H", "Печень", "Поддержка печени и желчного пузыря");
    biteron.short_description = "Для печени".into();
    let mut solberry = Product::new("Солберри-H", "Иммунитет", "Облепиховое масло для иммунитета");
    solberry.benefits = vec!["поддержка иммунитета".into()];
    Arc::new(KnowledgeBase::from_products(vec![
        biteron,
        solberry,
        Product::new("Омега-3", "Сердце", "Рыбий жир"),
    ]))
}

#[tokio::test]
async fn offline_question_is_answered_from_the_catalog() {
    let kb = catalog();
    let search = SearchService::new(kb.clone(), None);
    let responder = Responder::new(
        LlmClient::new(&offline_config()),
        PromptManager::default(),
        None,
    );

    let hits = search.search_products("печени", None, 8).await;
    assert_eq!(hits[0].product.name, "Битерон-H");

    let products: Vec<Product> = hits.into_iter().map(|h| h.product).collect();
    let reply = responder.answer("Что есть для печени?", &products, None).await;
    assert_eq!(reply.intent, "fallback");
    assert!(!reply.cached);
    assert!(reply.text.contains("Битерон-H"));

    let mentioned = mentions::extract_mentioned_products(&reply.text, search.knowledge_base());
    assert!(mentioned.iter().any(|p| p.name == "Битерон-H"));
}

#[tokio::test]
async fn nothing_found_offers_the_consultant() {
    let responder = Responder::new(
        LlmClient::new(&offline_config()),
        PromptManager::default(),
        None,
    );
    let reply = responder.answer("Что-то совсем непонятное", &[], None).await;
    assert!(is_no_info_answer(&reply.text));
}

#[tokio::test]
async fn shown_products_can_be_picked_later() {
    let kb = catalog();
    let conversations = ConversationStore::new(10);

    conversations
        .add_message(7, Role::User, "Нужно для иммунитета", None)
        .await;
    let answer = "Рекомендую Солберри-H и Омега-3.";
    conversations.add_message(7, Role::Assistant, answer, None).await;
    conversations
        .set_last_products(7, mentions::extract_mentioned_products(answer, &kb))
        .await;

    let shown = conversations.last_products(7).await;
    assert_eq!(shown.len(), 2);
    assert_eq!(mentions::select_product("2", &shown).map(|p| p.name.as_str()), Some("Омега-3"));
    assert_eq!(
        mentions::select_product("солберри", &shown).map(|p| p.name.as_str()),
        Some("Солберри-H")
    );
    assert_eq!(conversations.history(7, None).await.len(), 2);
}
