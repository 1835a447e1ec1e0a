use crate::llm::openai::{OpenAiConfig, DEFAULT_BASE_URL};
use clap::Parser;
use std::time::Duration;

/// Budget applied to every incoming request.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Parser)]
#[command(name = "assistant-relay", about = "Relays chat turns to an assistant and stores thread transcripts")]
pub struct Config {
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// SQLite database holding thread records.
    #[arg(long = "database-url", env = "DATABASE_URL", default_value = "threads.db")]
    pub database_url: String,

    /// Credential for the assistant provider.
    #[arg(long = "ai-key", env = "AI_KEY", hide_env_values = true)]
    pub ai_key: String,

    #[arg(long = "ai-base-url", env = "AI_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub ai_base_url: String,
}

impl Config {
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn openai(&self) -> OpenAiConfig {
        OpenAiConfig {
            api_key: self.ai_key.clone(),
            base_url: self.ai_base_url.clone(),
        }
    }
}
