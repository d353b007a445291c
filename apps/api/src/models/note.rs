use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// An AI-generated conversation note. Append-only; a session accumulates
/// one row per analysis run.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ConversationNoteRow {
    pub id: Uuid,
    pub session_id: Uuid,
    pub content: String,
    pub key_concepts: Value,
    pub definitions: Value,
    pub study_tips: Value,
    pub resources_mentioned: Value,
    pub message_count_analyzed: i32,
    pub is_synced_offline: bool,
    pub created_at: DateTime<Utc>,
}
