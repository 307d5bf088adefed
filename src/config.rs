use serde::Deserialize;

const OPENROUTER_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
const OPENAI_URL: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_MODEL: &str = "openai/gpt-4o-mini";

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Empty when only the REST backend is started
    pub telegram_bot_token: String,

    /// Chat-completion key; `None` switches the responder to canned answers
    pub llm_api_key: Option<String>,
    pub llm_api_url: String,
    pub llm_model: String,

    pub database_url: String,

    /// Comma-separated Telegram user IDs of admins
    pub admin_ids: Vec<i64>,

    /// Knowledge base files, merged in order
    pub knowledge_base_paths: Vec<String>,
    /// Backend used for search before falling back to the local catalog
    pub backend_api_url: Option<String>,
    pub api_bind_addr: String,

    pub enable_cache: bool,
    pub cache_size: usize,
    pub cache_ttl_minutes: i64,

    /// Messages kept per user conversation
    pub max_history: usize,

    /// Directory with prompt overrides, one markdown file per prompt
    pub prompts_dir: String,

    pub registration_url: String,
    pub catalog_url: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let admin_ids_str = env_any(&["ADMIN_IDS", "ADMIN_ID"]).unwrap_or_default();

        let openrouter_key = non_empty(std::env::var("OPENROUTER_API_KEY").ok());
        let llm_api_key = non_empty(std::env::var("LLM_API_KEY").ok())
            .or_else(|| openrouter_key.clone())
            .or_else(|| non_empty(std::env::var("OPENAI_API_KEY").ok()));
        let default_url = if openrouter_key.is_some() {
            OPENROUTER_URL
        } else {
            OPENAI_URL
        };

        Ok(Self {
            telegram_bot_token: env_any(&["TELEGRAM_BOT_TOKEN", "BOT_TOKEN"]).unwrap_or_default(),
            llm_api_key,
            llm_api_url: std::env::var("LLM_API_URL").unwrap_or_else(|_| default_url.to_string()),
            llm_model: normalize_model(
                &std::env::var("LLM_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            ),
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://aurora.db?mode=rwc".to_string()),
            admin_ids: parse_ids(&admin_ids_str),
            knowledge_base_paths: parse_list(
                &std::env::var("KNOWLEDGE_BASE_PATHS")
                    .unwrap_or_else(|_| "knowledge_base.json,knowledge_base_new.json".to_string()),
            ),
            backend_api_url: non_empty(std::env::var("BACKEND_API_URL").ok())
                .map(|u| u.trim_end_matches('/').to_string()),
            api_bind_addr: std::env::var("API_BIND_ADDR")
                .unwrap_or_else(|_| "0.0.0.0:8000".to_string()),
            enable_cache: std::env::var("ENABLE_CACHE")
                .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
                .unwrap_or(true),
            cache_size: std::env::var("CACHE_SIZE")
                .unwrap_or_else(|_| "100".to_string())
                .parse()
                .unwrap_or(100),
            cache_ttl_minutes: std::env::var("CACHE_TTL_MINUTES")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .unwrap_or(60),
            max_history: std::env::var("MAX_HISTORY")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .unwrap_or(10),
            prompts_dir: std::env::var("PROMPTS_DIR").unwrap_or_else(|_| "prompts".to_string()),
            registration_url: std::env::var("REGISTRATION_URL").unwrap_or_else(|_| {
                "https://aur-ora.com/auth/registration/666282189484".to_string()
            }),
            catalog_url: std::env::var("CATALOG_URL")
                .unwrap_or_else(|_| "https://aur-ora.com/catalog/vse_produkty".to_string()),
        })
    }

    pub fn is_admin(&self, user_id: i64) -> bool {
        self.admin_ids.contains(&user_id)
    }
}

/// Old deployments carried model names the providers no longer accept.
pub fn normalize_model(model: &str) -> String {
    if model.to_lowercase().contains("gpt-5") {
        DEFAULT_MODEL.to_string()
    } else if model.contains("Chat") {
        "openai/gpt-3.5-turbo".to_string()
    } else {
        model.to_string()
    }
}

fn env_any(keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| non_empty(std::env::var(k).ok()))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_ids(raw: &str) -> Vec<i64> {
    raw.split(',').filter_map(|s| s.trim().parse().ok()).collect()
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
impl AppConfig {
    /// Config with no external services, for unit and integration tests.
    pub fn for_tests() -> Self {
        Self {
            telegram_bot_token: String::new(),
            llm_api_key: None,
            llm_api_url: OPENAI_URL.to_string(),
            llm_model: DEFAULT_MODEL.to_string(),
            database_url: "sqlite::memory:".to_string(),
            admin_ids: vec![1],
            knowledge_base_paths: Vec::new(),
            backend_api_url: None,
            api_bind_addr: "127.0.0.1:0".to_string(),
            enable_cache: true,
            cache_size: 100,
            cache_ttl_minutes: 60,
            max_history: 10,
            prompts_dir: "prompts".to_string(),
            registration_url: "https://example.com/register".to_string(),
            catalog_url: "https://example.com/catalog".to_string(),
        }
    }
}
