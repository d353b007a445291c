pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::auth::handlers as auth_handlers;
use crate::exam_prep::handlers as exam_prep_handlers;
use crate::posts::handlers as post_handlers;
use crate::profiles::handlers as profile_handlers;
use crate::sessions::handlers as session_handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Auth
        .route("/api/auth/register", post(auth_handlers::handle_register))
        .route("/api/auth/login", post(auth_handlers::handle_login))
        .route("/api/auth/refresh", post(auth_handlers::handle_refresh))
        // Study posts (read endpoints are public)
        .route(
            "/api/study-posts",
            get(post_handlers::handle_list_posts).post(post_handlers::handle_create_post),
        )
        .route(
            "/api/study-posts/:id",
            get(post_handlers::handle_get_post).delete(post_handlers::handle_delete_post),
        )
        .route(
            "/api/study-posts/:id/join",
            post(post_handlers::handle_join_post),
        )
        // Sessions
        .route("/api/sessions", get(session_handlers::handle_list_sessions))
        .route(
            "/api/sessions/:id",
            get(session_handlers::handle_get_session),
        )
        .route(
            "/api/sessions/:id/end_session",
            post(session_handlers::handle_end_session),
        )
        .route(
            "/api/sessions/:id/generate_notes",
            post(session_handlers::handle_generate_notes),
        )
        .route(
            "/api/sessions/:id/notes",
            get(session_handlers::handle_session_notes),
        )
        .route("/api/notes", get(session_handlers::handle_list_notes))
        // Exam prep
        .route(
            "/api/exam-prep",
            post(exam_prep_handlers::handle_generate_materials),
        )
        .route(
            "/api/exam-prep/solve",
            post(exam_prep_handlers::handle_solve_question),
        )
        // Profiles & media
        .route(
            "/api/userprofile/me",
            get(profile_handlers::handle_me).post(profile_handlers::handle_update_me),
        )
        .route(
            "/api/userprofile/upload_media",
            post(profile_handlers::handle_upload_media),
        )
        .route(
            "/api/userprofile/:username",
            get(profile_handlers::handle_get_profile),
        )
        .with_state(state)
}
