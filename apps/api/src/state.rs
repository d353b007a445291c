use sqlx::PgPool;

use crate::config::Config;
use crate::llm_client::LlmClient;
use crate::sessions::analysis::AnalysisQueue;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub llm: LlmClient,
    pub config: Config,
    /// Bounded queue feeding the background conversation-analysis workers.
    pub analysis: AnalysisQueue,
}
