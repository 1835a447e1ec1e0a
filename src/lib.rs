pub mod api;
pub mod config;
pub mod db;
pub mod llm;

use api::AppState;
use config::{Config, REQUEST_TIMEOUT};
use db::Database;
use llm::assistant::{ChatBridge, PollPolicy};
use llm::openai::OpenAiAssistants;
use std::sync::Arc;

/// Builds the handler dependencies described by `config`.
pub fn build_state(config: &Config) -> rusqlite::Result<AppState> {
    let database = Database::open(&config.database_url)?;
    let assistants = OpenAiAssistants::new(config.openai());
    Ok(AppState {
        db: Arc::new(database),
        chat: ChatBridge::new(Arc::new(assistants), PollPolicy::default()),
        request_timeout: REQUEST_TIMEOUT,
    })
}
