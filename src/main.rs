use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use teloxide::prelude::*;
use tracing_subscriber::EnvFilter;

use aurora_bot::agent::conversation::ConversationStore;
use aurora_bot::agent::session::SessionStore;
use aurora_bot::ai::cache::ResponseCache;
use aurora_bot::ai::llm::LlmClient;
use aurora_bot::ai::prompts::PromptManager;
use aurora_bot::ai::responder::Responder;
use aurora_bot::bot;
use aurora_bot::catalog::KnowledgeBase;
use aurora_bot::config::AppConfig;
use aurora_bot::db::Database;
use aurora_bot::nlp::NlpProcessor;
use aurora_bot::search::SearchService;

const CACHE_PURGE_INTERVAL: Duration = Duration::from_secs(600);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!("🌿 Starting Aurora bot...");

    let config = AppConfig::from_env()?;
    if config.telegram_bot_token.is_empty() {
        anyhow::bail!("TELEGRAM_BOT_TOKEN is not set");
    }
    if config.llm_api_key.is_none() {
        tracing::warn!("No LLM API key configured; answers will be built from the catalog only");
    }

    let db = Database::connect(&config.database_url).await?;
    db.run_migrations().await?;
    tracing::info!("Database connected and migrations applied.");

    let kb = Arc::new(KnowledgeBase::load(&config.knowledge_base_paths));
    tracing::info!("Knowledge base: {} products", kb.len());

    let prompts = match PromptManager::load(Path::new(&config.prompts_dir)).await {
        Ok(prompts) => prompts,
        Err(e) => {
            tracing::warn!("Using built-in prompts: {}", e);
            PromptManager::default()
        }
    };
    let llm = LlmClient::new(&config);
    tracing::info!("Config loaded. Model: {}", llm.model());

    let cache = config
        .enable_cache
        .then(|| ResponseCache::new(config.cache_size, config.cache_ttl_minutes));

    let state = Arc::new(bot::AppState {
        config: config.clone(),
        db,
        search: SearchService::new(kb.clone(), config.backend_api_url.clone()),
        nlp: NlpProcessor::new(&kb),
        responder: Responder::new(llm, prompts, cache),
        conversations: ConversationStore::new(config.max_history),
        sessions: SessionStore::default(),
    });

    // Periodic cache cleanup
    let maintenance = state.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(CACHE_PURGE_INTERVAL);
        loop {
            ticker.tick().await;
            let removed = maintenance.responder.purge_expired().await;
            if removed > 0 {
                tracing::debug!("Purged {} expired cache entries", removed);
            }
        }
    });

    let bot = Bot::new(&config.telegram_bot_token);
    let handler = bot::build_handler();

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}
