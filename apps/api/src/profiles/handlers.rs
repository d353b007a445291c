//! Axum route handlers for user profiles and portfolio media.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::models::media::UserMediaRow;
use crate::models::profile::UserProfileRow;
use crate::models::user::{UserRow, UserSummary};
use crate::profiles::enrichment::{apply_fallbacks, extract_certificate, ERROR_TITLE};
use crate::state::AppState;

const CATEGORY_NOTE: &str = "note";
const CATEGORY_CERTIFICATE: &str = "certificate";

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub bio: Option<String>,
    pub profile_picture_url: Option<String>,
    pub study_interests: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct UploadMediaRequest {
    #[serde(default, alias = "fileUrl")]
    pub file_url: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default, alias = "aiAnalysisText")]
    pub ai_analysis_text: Option<String>,
    #[serde(default)]
    pub is_public: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    #[serde(flatten)]
    pub profile: UserProfileRow,
    pub user: UserSummary,
    pub portfolio_media: Vec<UserMediaRow>,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/userprofile/me
pub async fn handle_me(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<ProfileResponse>, AppError> {
    let profile = get_or_create_profile(&state, user.id).await?;
    let summary = fetch_user_summary(&state, user.id).await?;
    let media = fetch_media(&state, user.id, false).await?;
    Ok(Json(ProfileResponse {
        profile,
        user: summary,
        portfolio_media: media,
    }))
}

/// POST /api/userprofile/me
///
/// Partial update: absent fields keep their stored values.
pub async fn handle_update_me(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<ProfileResponse>, AppError> {
    get_or_create_profile(&state, user.id).await?;

    let interests = req.study_interests.map(Value::from);
    let profile = sqlx::query_as::<_, UserProfileRow>(
        r#"
        UPDATE user_profiles
        SET bio = COALESCE($2, bio),
            profile_picture_url = COALESCE($3, profile_picture_url),
            study_interests = COALESCE($4, study_interests)
        WHERE user_id = $1
        RETURNING *
        "#,
    )
    .bind(user.id)
    .bind(req.bio)
    .bind(req.profile_picture_url)
    .bind(interests)
    .fetch_one(&state.db)
    .await?;

    let summary = fetch_user_summary(&state, user.id).await?;
    let media = fetch_media(&state, user.id, false).await?;
    Ok(Json(ProfileResponse {
        profile,
        user: summary,
        portfolio_media: media,
    }))
}

/// GET /api/userprofile/:username
///
/// Any authenticated user may view any profile; attached media is filtered
/// to public items unless the caller owns the profile.
pub async fn handle_get_profile(
    State(state): State<AppState>,
    user: AuthUser,
    Path(username): Path<String>,
) -> Result<Json<ProfileResponse>, AppError> {
    let target = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE username = $1")
        .bind(&username)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User '{username}' not found")))?;

    let profile = get_or_create_profile(&state, target.id).await?;
    let public_only = target.id != user.id;
    let media = fetch_media(&state, target.id, public_only).await?;

    Ok(Json(ProfileResponse {
        profile,
        user: target.summary(),
        portfolio_media: media,
    }))
}

/// POST /api/userprofile/upload_media
///
/// Persists the media record first, then (for certificates with text)
/// attempts AI extraction of title/issuer/skills. Enrichment failure never
/// fails the upload.
pub async fn handle_upload_media(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<UploadMediaRequest>,
) -> Result<(StatusCode, Json<UserMediaRow>), AppError> {
    let file_url = req
        .file_url
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::Validation("No URL provided".to_string()))?;

    let category = req.category.as_deref().unwrap_or(CATEGORY_NOTE);
    if category != CATEGORY_NOTE && category != CATEGORY_CERTIFICATE {
        return Err(AppError::Validation(format!(
            "category must be '{CATEGORY_NOTE}' or '{CATEGORY_CERTIFICATE}'"
        )));
    }

    let initial_title = if category == CATEGORY_CERTIFICATE {
        "Processing..."
    } else {
        "New Note"
    };

    let media = sqlx::query_as::<_, UserMediaRow>(
        r#"
        INSERT INTO user_media (user_id, file_url, category, title, is_public)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(user.id)
    .bind(file_url)
    .bind(category)
    .bind(initial_title)
    .bind(req.is_public.unwrap_or(true))
    .fetch_one(&state.db)
    .await?;

    let raw_text = req
        .ai_analysis_text
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());

    let media = match (category, raw_text) {
        (CATEGORY_CERTIFICATE, Some(text)) => enrich_certificate(&state, media, text).await?,
        _ => media,
    };

    Ok((StatusCode::CREATED, Json(media)))
}

async fn enrich_certificate(
    state: &AppState,
    media: UserMediaRow,
    raw_text: &str,
) -> Result<UserMediaRow, AppError> {
    match extract_certificate(&state.llm, raw_text).await {
        Ok(info) => {
            let labels = apply_fallbacks(info);
            Ok(sqlx::query_as::<_, UserMediaRow>(
                "UPDATE user_media SET title = $2, issuer = $3, skills = $4
                 WHERE id = $1 RETURNING *",
            )
            .bind(media.id)
            .bind(labels.title)
            .bind(labels.issuer)
            .bind(labels.skills)
            .fetch_one(&state.db)
            .await?)
        }
        Err(e) => {
            warn!(media_id = %media.id, "certificate enrichment failed: {e}");
            Ok(sqlx::query_as::<_, UserMediaRow>(
                "UPDATE user_media SET title = $2 WHERE id = $1 RETURNING *",
            )
            .bind(media.id)
            .bind(ERROR_TITLE)
            .fetch_one(&state.db)
            .await?)
        }
    }
}

async fn get_or_create_profile(
    state: &AppState,
    user_id: Uuid,
) -> Result<UserProfileRow, AppError> {
    sqlx::query("INSERT INTO user_profiles (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
        .bind(user_id)
        .execute(&state.db)
        .await?;

    Ok(
        sqlx::query_as::<_, UserProfileRow>("SELECT * FROM user_profiles WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&state.db)
            .await?,
    )
}

async fn fetch_user_summary(state: &AppState, user_id: Uuid) -> Result<UserSummary, AppError> {
    Ok(sqlx::query_as::<_, UserSummary>(
        "SELECT id, username, first_name, last_name FROM users WHERE id = $1",
    )
    .bind(user_id)
    .fetch_one(&state.db)
    .await?)
}

async fn fetch_media(
    state: &AppState,
    user_id: Uuid,
    public_only: bool,
) -> Result<Vec<UserMediaRow>, AppError> {
    Ok(sqlx::query_as::<_, UserMediaRow>(
        r#"
        SELECT * FROM user_media
        WHERE user_id = $1 AND (NOT $2 OR is_public)
        ORDER BY created_at DESC
        "#,
    )
    .bind(user_id)
    .bind(public_only)
    .fetch_all(&state.db)
    .await?)
}
