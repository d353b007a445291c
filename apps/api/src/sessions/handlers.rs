//! Axum route handlers for study sessions and their AI-generated notes.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::FromRow;
use uuid::Uuid;

use std::collections::HashMap;

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::models::note::ConversationNoteRow;
use crate::models::post::StudyPostRow;
use crate::models::session::StudySessionRow;
use crate::models::user::UserSummary;
use crate::sessions::analysis::{self, AnalysisJob, IncomingMessage, STATUS_PENDING};
use crate::sessions::lifecycle::{
    end_session, fetch_session, is_member, session_detail, SessionDetail,
};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct GenerateNotesRequest {
    #[serde(default)]
    pub messages: Vec<IncomingMessage>,
}

#[derive(Debug, Serialize)]
pub struct NoteResponse {
    #[serde(flatten)]
    pub note: ConversationNoteRow,
    pub session_info: SessionInfo,
}

#[derive(Debug, Serialize)]
pub struct SessionInfo {
    pub id: Uuid,
    pub topic: String,
}

#[derive(Debug, FromRow)]
struct NoteWithTopicRow {
    id: Uuid,
    session_id: Uuid,
    content: String,
    key_concepts: Value,
    definitions: Value,
    study_tips: Value,
    resources_mentioned: Value,
    message_count_analyzed: i32,
    is_synced_offline: bool,
    created_at: chrono::DateTime<chrono::Utc>,
    topic: String,
}

/// Flat row for the session list: session, post and creator columns in one
/// pass, so listing N sessions costs two queries instead of 3N+1.
#[derive(Debug, FromRow)]
struct SessionListRow {
    id: Uuid,
    post_id: Uuid,
    creator_id: Uuid,
    external_chat_id: String,
    is_active: bool,
    started_at: chrono::DateTime<chrono::Utc>,
    ended_at: Option<chrono::DateTime<chrono::Utc>>,
    ai_notes_enabled: bool,
    last_ai_analysis: Option<chrono::DateTime<chrono::Utc>>,
    last_analysis_status: Option<String>,
    post_user_id: Uuid,
    title: String,
    topic: String,
    description: String,
    subject: String,
    post_is_active: bool,
    post_created_at: chrono::DateTime<chrono::Utc>,
    creator_username: String,
    creator_first_name: String,
    creator_last_name: String,
}

#[derive(Debug, FromRow)]
struct SessionParticipantRow {
    session_id: Uuid,
    id: Uuid,
    username: String,
    first_name: String,
    last_name: String,
}

impl SessionListRow {
    fn into_detail(self, participants: Vec<UserSummary>) -> SessionDetail {
        SessionDetail {
            session: StudySessionRow {
                id: self.id,
                post_id: self.post_id,
                creator_id: self.creator_id,
                external_chat_id: self.external_chat_id,
                is_active: self.is_active,
                started_at: self.started_at,
                ended_at: self.ended_at,
                ai_notes_enabled: self.ai_notes_enabled,
                last_ai_analysis: self.last_ai_analysis,
                last_analysis_status: self.last_analysis_status,
            },
            post: StudyPostRow {
                id: self.post_id,
                user_id: self.post_user_id,
                title: self.title,
                topic: self.topic,
                description: self.description,
                subject: self.subject,
                is_active: self.post_is_active,
                created_at: self.post_created_at,
            },
            creator: UserSummary {
                id: self.creator_id,
                username: self.creator_username,
                first_name: self.creator_first_name,
                last_name: self.creator_last_name,
            },
            participants,
        }
    }
}

impl NoteWithTopicRow {
    fn into_response(self) -> NoteResponse {
        NoteResponse {
            session_info: SessionInfo {
                id: self.session_id,
                topic: self.topic,
            },
            note: ConversationNoteRow {
                id: self.id,
                session_id: self.session_id,
                content: self.content,
                key_concepts: self.key_concepts,
                definitions: self.definitions,
                study_tips: self.study_tips,
                resources_mentioned: self.resources_mentioned,
                message_count_analyzed: self.message_count_analyzed,
                is_synced_offline: self.is_synced_offline,
                created_at: self.created_at,
            },
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/sessions
///
/// Sessions the caller created or joined, newest first.
pub async fn handle_list_sessions(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<SessionDetail>>, AppError> {
    Ok(Json(list_sessions_for(&state.db, user.id).await?))
}

/// Sessions `user_id` created or joined, newest first, with post, creator
/// and participants resolved in two batched queries.
async fn list_sessions_for(
    pool: &sqlx::PgPool,
    user_id: Uuid,
) -> Result<Vec<SessionDetail>, AppError> {
    let rows = sqlx::query_as::<_, SessionListRow>(
        r#"
        SELECT DISTINCT s.id, s.post_id, s.creator_id, s.external_chat_id,
               s.is_active, s.started_at, s.ended_at, s.ai_notes_enabled,
               s.last_ai_analysis, s.last_analysis_status,
               p.user_id AS post_user_id, p.title, p.topic, p.description,
               p.subject, p.is_active AS post_is_active,
               p.created_at AS post_created_at,
               u.username AS creator_username,
               u.first_name AS creator_first_name,
               u.last_name AS creator_last_name
        FROM study_sessions s
        JOIN study_posts p ON p.id = s.post_id
        JOIN users u ON u.id = s.creator_id
        LEFT JOIN session_participants sp ON sp.session_id = s.id
        WHERE s.creator_id = $1 OR sp.user_id = $1
        ORDER BY s.started_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    let session_ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
    let mut participants: HashMap<Uuid, Vec<UserSummary>> = HashMap::new();
    for row in sqlx::query_as::<_, SessionParticipantRow>(
        r#"
        SELECT sp.session_id, u.id, u.username, u.first_name, u.last_name
        FROM session_participants sp
        JOIN users u ON u.id = sp.user_id
        WHERE sp.session_id = ANY($1)
        ORDER BY sp.joined_at
        "#,
    )
    .bind(&session_ids)
    .fetch_all(pool)
    .await?
    {
        participants.entry(row.session_id).or_default().push(UserSummary {
            id: row.id,
            username: row.username,
            first_name: row.first_name,
            last_name: row.last_name,
        });
    }

    Ok(rows
        .into_iter()
        .map(|row| {
            let members = participants.remove(&row.id).unwrap_or_default();
            row.into_detail(members)
        })
        .collect())
}

/// GET /api/sessions/:id
pub async fn handle_get_session(
    State(state): State<AppState>,
    user: AuthUser,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SessionDetail>, AppError> {
    let session = fetch_session(&state.db, session_id).await?;
    ensure_member(&state, &session, user.id).await?;
    let post = fetch_post(&state, session.post_id).await?;
    Ok(Json(session_detail(&state.db, session, post).await?))
}

/// POST /api/sessions/:id/end_session
///
/// Creator only. The transition is terminal; repeat calls are no-ops that
/// return the originally recorded end time.
pub async fn handle_end_session(
    State(state): State<AppState>,
    user: AuthUser,
    Path(session_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let session = end_session(&state.db, session_id, user.id).await?;
    Ok(Json(json!({
        "status": "session ended",
        "ended_at": session.ended_at,
    })))
}

/// POST /api/sessions/:id/generate_notes
///
/// Accepts a chat transcript and enqueues it for background analysis.
/// Returns 202 immediately; the outcome lands in `last_analysis_status`
/// and, on success, a new conversation note.
pub async fn handle_generate_notes(
    State(state): State<AppState>,
    user: AuthUser,
    Path(session_id): Path<Uuid>,
    Json(req): Json<GenerateNotesRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    if req.messages.is_empty() {
        return Err(AppError::Validation("No messages provided".to_string()));
    }

    let session = fetch_session(&state.db, session_id).await?;
    ensure_member(&state, &session, user.id).await?;

    // Mark pending before enqueueing so a fast worker cannot be overwritten.
    analysis::mark_status(&state.db, session_id, STATUS_PENDING).await?;

    let job = AnalysisJob {
        session_id,
        messages: req.messages,
    };
    if state.analysis.enqueue(job).is_err() {
        analysis::mark_status(&state.db, session_id, analysis::STATUS_FAILED).await?;
        return Err(AppError::AnalysisBusy);
    }

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "message": "Background analysis started",
            "status": "processing",
        })),
    ))
}

/// GET /api/sessions/:id/notes
///
/// The session's notes, oldest first.
pub async fn handle_session_notes(
    State(state): State<AppState>,
    user: AuthUser,
    Path(session_id): Path<Uuid>,
) -> Result<Json<Vec<ConversationNoteRow>>, AppError> {
    let session = fetch_session(&state.db, session_id).await?;
    ensure_member(&state, &session, user.id).await?;

    let notes = sqlx::query_as::<_, ConversationNoteRow>(
        "SELECT * FROM conversation_notes WHERE session_id = $1 ORDER BY created_at",
    )
    .bind(session_id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(notes))
}

/// GET /api/notes
///
/// Notes across every session the caller belongs to, newest first, each
/// tagged with its session id and post topic.
pub async fn handle_list_notes(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<NoteResponse>>, AppError> {
    let rows = sqlx::query_as::<_, NoteWithTopicRow>(
        r#"
        SELECT DISTINCT n.*, p.topic
        FROM conversation_notes n
        JOIN study_sessions s ON s.id = n.session_id
        JOIN study_posts p ON p.id = s.post_id
        LEFT JOIN session_participants sp ON sp.session_id = s.id
        WHERE s.creator_id = $1 OR sp.user_id = $1
        ORDER BY n.created_at DESC
        "#,
    )
    .bind(user.id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(rows.into_iter().map(NoteWithTopicRow::into_response).collect()))
}

async fn ensure_member(
    state: &AppState,
    session: &StudySessionRow,
    user_id: Uuid,
) -> Result<(), AppError> {
    if !is_member(&state.db, session, user_id).await? {
        return Err(AppError::Forbidden(
            "Not a participant of this session".to_string(),
        ));
    }
    Ok(())
}

async fn fetch_post(state: &AppState, post_id: Uuid) -> Result<StudyPostRow, AppError> {
    sqlx::query_as::<_, StudyPostRow>("SELECT * FROM study_posts WHERE id = $1")
        .bind(post_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Post {post_id} not found")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sessions::lifecycle::join_post;
    use sqlx::PgPool;

    async fn seed_user(pool: &PgPool, username: &str) -> Uuid {
        sqlx::query_scalar(
            "INSERT INTO users (username, email, password_hash) VALUES ($1, $2, 'x') RETURNING id",
        )
        .bind(username)
        .bind(format!("{username}@example.com"))
        .fetch_one(pool)
        .await
        .unwrap()
    }

    async fn seed_post(pool: &PgPool, owner: Uuid, topic: &str) -> Uuid {
        sqlx::query_scalar(
            r#"
            INSERT INTO study_posts (user_id, title, topic, description, subject)
            VALUES ($1, 'Study group', $2, 'weekly', 'Math')
            RETURNING id
            "#,
        )
        .bind(owner)
        .bind(topic)
        .fetch_one(pool)
        .await
        .unwrap()
    }

    #[sqlx::test]
    async fn test_list_sessions_resolves_posts_and_participants(pool: PgPool) {
        let owner = seed_user(&pool, "owner").await;
        let member = seed_user(&pool, "member").await;
        let other = seed_user(&pool, "other").await;

        let post_a = seed_post(&pool, owner, "Eigenvalues").await;
        let post_b = seed_post(&pool, owner, "Determinants").await;
        join_post(&pool, post_a, member).await.unwrap();
        join_post(&pool, post_a, other).await.unwrap();
        join_post(&pool, post_b, member).await.unwrap();

        let details = list_sessions_for(&pool, member).await.unwrap();
        assert_eq!(details.len(), 2);
        // Newest first.
        assert_eq!(details[0].post.topic, "Determinants");
        assert_eq!(details[1].post.topic, "Eigenvalues");
        assert_eq!(details[0].creator.id, owner);

        // Participants in join order, fully resolved.
        let names: Vec<&str> = details[1]
            .participants
            .iter()
            .map(|p| p.username.as_str())
            .collect();
        assert_eq!(names, vec!["owner", "member", "other"]);

        // A non-member of post_b only sees their own session.
        let details = list_sessions_for(&pool, other).await.unwrap();
        assert_eq!(details.len(), 1);
        assert_eq!(details[0].post.topic, "Eigenvalues");
    }

    #[sqlx::test]
    async fn test_list_sessions_empty_for_outsider(pool: PgPool) {
        let owner = seed_user(&pool, "owner").await;
        let outsider = seed_user(&pool, "outsider").await;
        let post = seed_post(&pool, owner, "Eigenvalues").await;
        join_post(&pool, post, owner).await.unwrap();

        let details = list_sessions_for(&pool, outsider).await.unwrap();
        assert!(details.is_empty());
    }
}
