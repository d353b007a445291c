use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// A portfolio item referencing a file in external storage.
/// category: "note" | "certificate". Skills are AI-extracted for certificates.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserMediaRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub file_url: String,
    pub category: String,
    pub title: Option<String>,
    pub issuer: Option<String>,
    pub skills: Value,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
}
