use tracing_subscriber::EnvFilter;

use aurora_bot::api::{self, ApiState};
use aurora_bot::catalog::KnowledgeBase;
use aurora_bot::config::AppConfig;
use aurora_bot::db::Database;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::from_env()?;

    let db = Database::connect(&config.database_url).await?;
    db.run_migrations().await?;

    // Seed an empty products table from the JSON catalog.
    if db.count_products().await? == 0 {
        let kb = KnowledgeBase::load(&config.knowledge_base_paths);
        let imported = db.import_catalog(&kb).await?;
        tracing::info!("Imported {} products from the knowledge base", imported);
    }

    let app = api::router(ApiState::new(db));
    let listener = tokio::net::TcpListener::bind(&config.api_bind_addr).await?;
    tracing::info!("🚀 Aurora API listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
        })
        .await?;

    tracing::info!("Aurora API stopped");
    Ok(())
}
