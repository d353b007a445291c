use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserProfileRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub bio: String,
    pub profile_picture_url: Option<String>,
    /// JSON list of free-text interests.
    pub study_interests: Value,
    pub created_at: DateTime<Utc>,
}
