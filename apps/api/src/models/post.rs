use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A study post. Immutable after creation except for `is_active`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct StudyPostRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub topic: String,
    pub description: String,
    pub subject: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}
