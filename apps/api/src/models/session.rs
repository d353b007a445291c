use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A live study session. One-way state machine: active → ended.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct StudySessionRow {
    pub id: Uuid,
    pub post_id: Uuid,
    pub creator_id: Uuid,
    /// Identifier of the chat room in the external real-time store.
    pub external_chat_id: String,
    pub is_active: bool,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub ai_notes_enabled: bool,
    pub last_ai_analysis: Option<DateTime<Utc>>,
    /// pending | completed | failed — set by the analysis pipeline so
    /// background failures stay observable.
    pub last_analysis_status: Option<String>,
}
