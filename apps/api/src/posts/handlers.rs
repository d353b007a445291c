//! Axum route handlers for study posts.
//!
//! Listing and reading posts is public; creating, deactivating and joining
//! require authentication.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::models::user::UserSummary;
use crate::sessions::lifecycle::{join_post, SessionDetail};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct PostListQuery {
    pub subject: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreatePostRequest {
    pub title: String,
    pub topic: String,
    pub description: String,
    pub subject: String,
}

#[derive(Debug, Serialize)]
pub struct StudyPostResponse {
    pub id: Uuid,
    pub title: String,
    pub topic: String,
    pub description: String,
    pub subject: String,
    pub is_active: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub user: UserSummary,
    pub active_sessions_count: i64,
}

/// Flat row shape for the post + owner + session-count join below.
#[derive(Debug, FromRow)]
struct PostWithOwnerRow {
    id: Uuid,
    user_id: Uuid,
    title: String,
    topic: String,
    description: String,
    subject: String,
    is_active: bool,
    created_at: chrono::DateTime<chrono::Utc>,
    owner_username: String,
    owner_first_name: String,
    owner_last_name: String,
    active_sessions_count: i64,
}

impl PostWithOwnerRow {
    fn into_response(self) -> StudyPostResponse {
        StudyPostResponse {
            id: self.id,
            title: self.title,
            topic: self.topic,
            description: self.description,
            subject: self.subject,
            is_active: self.is_active,
            created_at: self.created_at,
            user: UserSummary {
                id: self.user_id,
                username: self.owner_username,
                first_name: self.owner_first_name,
                last_name: self.owner_last_name,
            },
            active_sessions_count: self.active_sessions_count,
        }
    }
}

const POST_SELECT: &str = r#"
    SELECT p.id, p.user_id, p.title, p.topic, p.description, p.subject,
           p.is_active, p.created_at,
           u.username AS owner_username,
           u.first_name AS owner_first_name,
           u.last_name AS owner_last_name,
           (SELECT COUNT(*) FROM study_sessions s
             WHERE s.post_id = p.id AND s.is_active) AS active_sessions_count
    FROM study_posts p
    JOIN users u ON u.id = p.user_id
"#;

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/study-posts
///
/// Public. Active posts, newest first; optional subject and free-text filters.
pub async fn handle_list_posts(
    State(state): State<AppState>,
    Query(params): Query<PostListQuery>,
) -> Result<Json<Vec<StudyPostResponse>>, AppError> {
    let sql = format!(
        r#"{POST_SELECT}
        WHERE p.is_active
          AND ($1::text IS NULL OR p.subject ILIKE '%' || $1 || '%')
          AND ($2::text IS NULL
               OR p.title ILIKE '%' || $2 || '%'
               OR p.topic ILIKE '%' || $2 || '%'
               OR p.description ILIKE '%' || $2 || '%')
        ORDER BY p.created_at DESC
        "#
    );

    let rows = sqlx::query_as::<_, PostWithOwnerRow>(&sql)
        .bind(params.subject)
        .bind(params.search)
        .fetch_all(&state.db)
        .await?;

    Ok(Json(rows.into_iter().map(PostWithOwnerRow::into_response).collect()))
}

/// POST /api/study-posts
pub async fn handle_create_post(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<CreatePostRequest>,
) -> Result<(StatusCode, Json<StudyPostResponse>), AppError> {
    for (field, value) in [
        ("title", &req.title),
        ("topic", &req.topic),
        ("subject", &req.subject),
    ] {
        if value.trim().is_empty() {
            return Err(AppError::Validation(format!("{field} cannot be empty")));
        }
    }

    let post_id: Uuid = sqlx::query_scalar(
        r#"
        INSERT INTO study_posts (user_id, title, topic, description, subject)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
        "#,
    )
    .bind(user.id)
    .bind(req.title.trim())
    .bind(req.topic.trim())
    .bind(&req.description)
    .bind(req.subject.trim())
    .fetch_one(&state.db)
    .await?;

    let post = fetch_post(&state, post_id).await?;
    Ok((StatusCode::CREATED, Json(post)))
}

/// GET /api/study-posts/:id
pub async fn handle_get_post(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
) -> Result<Json<StudyPostResponse>, AppError> {
    let post = fetch_post(&state, post_id).await?;
    if !post.is_active {
        return Err(AppError::NotFound(format!("Post {post_id} not found")));
    }
    Ok(Json(post))
}

/// DELETE /api/study-posts/:id
///
/// Soft delete: posts are immutable except for the active flag.
pub async fn handle_delete_post(
    State(state): State<AppState>,
    user: AuthUser,
    Path(post_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let owner_id: Option<Uuid> =
        sqlx::query_scalar("SELECT user_id FROM study_posts WHERE id = $1")
            .bind(post_id)
            .fetch_optional(&state.db)
            .await?;

    let owner_id = owner_id.ok_or_else(|| AppError::NotFound(format!("Post {post_id} not found")))?;
    if owner_id != user.id {
        return Err(AppError::Forbidden(
            "Only the owner can remove a post".to_string(),
        ));
    }

    sqlx::query("UPDATE study_posts SET is_active = FALSE WHERE id = $1")
        .bind(post_id)
        .execute(&state.db)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/study-posts/:id/join
///
/// Entry point of the session lifecycle: finds or creates the post's active
/// session and adds the caller as a participant (capacity permitting).
pub async fn handle_join_post(
    State(state): State<AppState>,
    user: AuthUser,
    Path(post_id): Path<Uuid>,
) -> Result<Json<SessionDetail>, AppError> {
    let detail = join_post(&state.db, post_id, user.id).await?;
    Ok(Json(detail))
}

async fn fetch_post(state: &AppState, post_id: Uuid) -> Result<StudyPostResponse, AppError> {
    let sql = format!("{POST_SELECT} WHERE p.id = $1");
    let row = sqlx::query_as::<_, PostWithOwnerRow>(&sql)
        .bind(post_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Post {post_id} not found")))?;
    Ok(row.into_response())
}
