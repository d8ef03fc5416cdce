use std::env;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    /// `memory` keeps sessions in-process; anything else is a SQLite path.
    pub database_url: String,
    pub admin_token: String,
    /// Empty disables webhook signature validation (dev mode).
    pub webhook_secret: String,
    pub llm_provider: String,
    pub groq_api_key: String,
    pub groq_model: String,
    pub ollama_url: String,
    pub ollama_model: String,
    pub api_base_url: String,
    pub api_key: String,
    pub professional_id: String,
    pub retry: RetryPolicy,
    pub session_history_limit: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per remote call, including the first.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            timeout: Duration::from_secs(15),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry `attempt` (1-based), doubling each time.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_delay.saturating_mul(factor)
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = RetryPolicy::default();
        Self {
            port: parse_var("PORT").unwrap_or(3000),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "petpro.db".to_string()),
            admin_token: env::var("ADMIN_TOKEN").unwrap_or_else(|_| "changeme".to_string()),
            webhook_secret: env::var("WEBHOOK_SECRET").unwrap_or_default(),
            llm_provider: env::var("LLM_PROVIDER").unwrap_or_else(|_| "ollama".to_string()),
            groq_api_key: env::var("GROQ_API_KEY").unwrap_or_default(),
            groq_model: env::var("GROQ_MODEL")
                .unwrap_or_else(|_| "llama-3.1-8b-instant".to_string()),
            ollama_url: env::var("OLLAMA_URL")
                .unwrap_or_else(|_| "http://localhost:11434".to_string()),
            ollama_model: env::var("OLLAMA_MODEL").unwrap_or_else(|_| "llama3.2".to_string()),
            api_base_url: env::var("PET_PROFESSIONALS_API_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8080".to_string()),
            api_key: env::var("PET_PROFESSIONALS_API_KEY").unwrap_or_default(),
            professional_id: env::var("PROFESSIONAL_ID").unwrap_or_default(),
            retry: RetryPolicy {
                max_attempts: parse_var("REMOTE_MAX_RETRIES")
                    .map(|retries: u32| retries + 1)
                    .unwrap_or(defaults.max_attempts),
                initial_delay: parse_var("REMOTE_RETRY_DELAY_MS")
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.initial_delay),
                timeout: parse_var("REMOTE_TIMEOUT_SECS")
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.timeout),
            },
            session_history_limit: parse_var("SESSION_HISTORY_LIMIT").unwrap_or(20),
        }
    }

    pub fn uses_memory_sessions(&self) -> bool {
        self.database_url == "memory"
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}
