use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

use petpro::config::AppConfig;
use petpro::db::{self, InMemorySessionRepository, SessionRepository, SqliteSessionRepository};
use petpro::handlers;
use petpro::services::ai::groq::GroqProvider;
use petpro::services::ai::intent::LlmIntentExtractor;
use petpro::services::ai::ollama::OllamaProvider;
use petpro::services::ai::LlmProvider;
use petpro::services::api::http::HttpProfessionalsApi;
use petpro::services::api::memory::InMemoryProfessionalsApi;
use petpro::services::api::ProfessionalsApi;
use petpro::services::clock::SystemClock;
use petpro::state::{AppState, ThreadLocks};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();
    anyhow::ensure!(
        !config.professional_id.is_empty(),
        "PROFESSIONAL_ID must be set"
    );

    let conn = Arc::new(Mutex::new(db::init_db(&config.database_url)?));

    let sessions: Arc<dyn SessionRepository> = if config.uses_memory_sessions() {
        tracing::info!("keeping sessions in memory");
        Arc::new(InMemorySessionRepository::new())
    } else {
        tracing::info!("storing sessions in {}", config.database_url);
        Arc::new(SqliteSessionRepository::new(Arc::clone(&conn)))
    };

    let llm: Box<dyn LlmProvider> = match config.llm_provider.as_str() {
        "groq" => {
            anyhow::ensure!(
                !config.groq_api_key.is_empty(),
                "GROQ_API_KEY must be set when LLM_PROVIDER=groq"
            );
            tracing::info!("using Groq LLM provider (model: {})", config.groq_model);
            Box::new(GroqProvider::new(
                config.groq_api_key.clone(),
                config.groq_model.clone(),
                config.retry.timeout,
            ))
        }
        _ => {
            tracing::info!("using Ollama LLM provider (url: {})", config.ollama_url);
            Box::new(OllamaProvider::new(
                config.ollama_url.clone(),
                config.ollama_model.clone(),
                config.retry.timeout,
            ))
        }
    };

    let api: Arc<dyn ProfessionalsApi> = if config.api_base_url == "memory" {
        tracing::warn!("using in-memory pet professionals API, nothing leaves this process");
        Arc::new(InMemoryProfessionalsApi::new())
    } else {
        tracing::info!("pet professionals API at {}", config.api_base_url);
        Arc::new(HttpProfessionalsApi::new(
            config.api_base_url.clone(),
            config.api_key.clone(),
        ))
    };

    let (activity_tx, _) = broadcast::channel(256);

    let state = Arc::new(AppState {
        db: conn,
        config: config.clone(),
        sessions,
        extractor: Arc::new(LlmIntentExtractor::new(llm, config.retry.timeout)),
        api,
        clock: Arc::new(SystemClock),
        activity_tx,
        thread_locks: ThreadLocks::default(),
    });

    let app = handlers::router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
