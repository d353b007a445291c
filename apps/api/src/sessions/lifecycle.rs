//! Session lifecycle: join-or-create and the one-way active → ended
//! transition.
//!
//! Capacity is enforced inside a transaction that locks the session row
//! (SELECT ... FOR UPDATE) before counting and inserting. Under READ
//! COMMITTED a bare count-guarded INSERT is not enough: two joins with
//! different user ids never conflict on the participants key, and each
//! statement's count sees only rows committed before it. The row lock
//! serializes the two, so the loser re-counts after the winner commits.
//! The partial unique index on (post_id) WHERE is_active plays the same
//! role for session creation.

use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::post::StudyPostRow;
use crate::models::session::StudySessionRow;
use crate::models::user::UserSummary;

pub const MAX_PARTICIPANTS: i64 = 5;

#[derive(Debug, Serialize)]
pub struct SessionDetail {
    #[serde(flatten)]
    pub session: StudySessionRow,
    pub post: StudyPostRow,
    pub creator: UserSummary,
    pub participants: Vec<UserSummary>,
}

/// Finds the post's active session (creating one if absent, with the post
/// owner as creator and first participant) and adds `user_id` to it.
///
/// Idempotent for an already-joined user. Fails with `Capacity` when the
/// session already has `MAX_PARTICIPANTS` members.
pub async fn join_post(
    pool: &PgPool,
    post_id: Uuid,
    user_id: Uuid,
) -> Result<SessionDetail, AppError> {
    let post = sqlx::query_as::<_, StudyPostRow>(
        "SELECT * FROM study_posts WHERE id = $1 AND is_active",
    )
    .bind(post_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Post {post_id} not found")))?;

    let session = match find_active_session(pool, post_id).await? {
        Some(session) => session,
        None => create_session(pool, &post).await?,
    };

    if !is_participant(pool, session.id, user_id).await? {
        add_participant(pool, session.id, user_id).await?;
    }

    session_detail(pool, session, post).await
}

/// Adds a participant while holding a row lock on the session, so
/// concurrent joins on a near-full session serialize and the second one
/// counts the first one's insert. Fails with `Capacity` at the cap.
async fn add_participant(pool: &PgPool, session_id: Uuid, user_id: Uuid) -> Result<(), AppError> {
    let mut tx = pool.begin().await?;

    sqlx::query("SELECT id FROM study_sessions WHERE id = $1 FOR UPDATE")
        .bind(session_id)
        .execute(&mut *tx)
        .await?;

    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM session_participants WHERE session_id = $1")
            .bind(session_id)
            .fetch_one(&mut *tx)
            .await?;

    if count >= MAX_PARTICIPANTS {
        // Dropping the transaction rolls back and releases the lock.
        return Err(AppError::Capacity("Session is full".to_string()));
    }

    sqlx::query(
        "INSERT INTO session_participants (session_id, user_id) VALUES ($1, $2)
         ON CONFLICT DO NOTHING",
    )
    .bind(session_id)
    .bind(user_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}

/// Ends a session. Creator only; idempotent — ending an already-ended
/// session returns the recorded `ended_at` without re-stamping it.
pub async fn end_session(
    pool: &PgPool,
    session_id: Uuid,
    user_id: Uuid,
) -> Result<StudySessionRow, AppError> {
    let session = fetch_session(pool, session_id).await?;

    if session.creator_id != user_id {
        return Err(AppError::Forbidden(
            "Only the creator can end the session".to_string(),
        ));
    }

    if !session.is_active {
        return Ok(session);
    }

    let ended = sqlx::query_as::<_, StudySessionRow>(
        r#"
        UPDATE study_sessions
        SET is_active = FALSE, ended_at = now()
        WHERE id = $1 AND is_active
        RETURNING *
        "#,
    )
    .bind(session_id)
    .fetch_optional(pool)
    .await?;

    // Lost a race with another end call; the stored row is authoritative.
    match ended {
        Some(row) => Ok(row),
        None => fetch_session(pool, session_id).await,
    }
}

pub async fn fetch_session(pool: &PgPool, session_id: Uuid) -> Result<StudySessionRow, AppError> {
    sqlx::query_as::<_, StudySessionRow>("SELECT * FROM study_sessions WHERE id = $1")
        .bind(session_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Session {session_id} not found")))
}

/// Creator or joined participant — the audience allowed to view a session,
/// its notes, and to trigger analyses.
pub async fn is_member(
    pool: &PgPool,
    session: &StudySessionRow,
    user_id: Uuid,
) -> Result<bool, AppError> {
    Ok(session.creator_id == user_id || is_participant(pool, session.id, user_id).await?)
}

pub async fn session_detail(
    pool: &PgPool,
    session: StudySessionRow,
    post: StudyPostRow,
) -> Result<SessionDetail, AppError> {
    let creator = sqlx::query_as::<_, UserSummary>(
        "SELECT id, username, first_name, last_name FROM users WHERE id = $1",
    )
    .bind(session.creator_id)
    .fetch_one(pool)
    .await?;

    let participants = sqlx::query_as::<_, UserSummary>(
        r#"
        SELECT u.id, u.username, u.first_name, u.last_name
        FROM session_participants sp
        JOIN users u ON u.id = sp.user_id
        WHERE sp.session_id = $1
        ORDER BY sp.joined_at
        "#,
    )
    .bind(session.id)
    .fetch_all(pool)
    .await?;

    Ok(SessionDetail {
        session,
        post,
        creator,
        participants,
    })
}

async fn find_active_session(
    pool: &PgPool,
    post_id: Uuid,
) -> Result<Option<StudySessionRow>, AppError> {
    Ok(sqlx::query_as::<_, StudySessionRow>(
        "SELECT * FROM study_sessions WHERE post_id = $1 AND is_active",
    )
    .bind(post_id)
    .fetch_optional(pool)
    .await?)
}

async fn create_session(pool: &PgPool, post: &StudyPostRow) -> Result<StudySessionRow, AppError> {
    let inserted = sqlx::query_as::<_, StudySessionRow>(
        r#"
        INSERT INTO study_sessions (post_id, creator_id, external_chat_id)
        VALUES ($1, $2, $3)
        RETURNING *
        "#,
    )
    .bind(post.id)
    .bind(post.user_id)
    .bind(new_chat_id())
    .fetch_one(pool)
    .await;

    let session = match inserted {
        Ok(session) => session,
        // Another join created the active session first; use theirs.
        Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
            return find_active_session(pool, post.id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Post {} has no session", post.id)));
        }
        Err(e) => return Err(e.into()),
    };

    // The post owner is always the first participant.
    sqlx::query(
        "INSERT INTO session_participants (session_id, user_id) VALUES ($1, $2)
         ON CONFLICT DO NOTHING",
    )
    .bind(session.id)
    .bind(post.user_id)
    .execute(pool)
    .await?;

    Ok(session)
}

async fn is_participant(pool: &PgPool, session_id: Uuid, user_id: Uuid) -> Result<bool, AppError> {
    let exists: Option<i32> = sqlx::query_scalar(
        "SELECT 1 FROM session_participants WHERE session_id = $1 AND user_id = $2",
    )
    .bind(session_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;
    Ok(exists.is_some())
}

fn new_chat_id() -> String {
    format!("session_{}", Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_ids_are_unique_and_prefixed() {
        let a = new_chat_id();
        let b = new_chat_id();
        assert!(a.starts_with("session_"));
        assert_ne!(a, b);
        // 32 hex chars after the prefix
        assert_eq!(a.len(), "session_".len() + 32);
    }

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

    async fn seed_post(pool: &PgPool, owner: Uuid) -> Uuid {
        sqlx::query_scalar(
            r#"
            INSERT INTO study_posts (user_id, title, topic, description, subject)
            VALUES ($1, 'Linear Algebra study group', 'Eigenvalues', 'weekly', 'Math')
            RETURNING id
            "#,
        )
        .bind(owner)
        .fetch_one(pool)
        .await
        .unwrap()
    }

    async fn participant_count(pool: &PgPool, session_id: Uuid) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM session_participants WHERE session_id = $1")
            .bind(session_id)
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[sqlx::test]
    async fn test_join_creates_one_session_with_owner_first(pool: PgPool) {
        let owner = seed_user(&pool, "owner").await;
        let joiner = seed_user(&pool, "joiner").await;
        let post = seed_post(&pool, owner).await;

        let detail = join_post(&pool, post, joiner).await.unwrap();

        assert!(detail.session.is_active);
        assert_eq!(detail.session.creator_id, owner);
        let ids: Vec<Uuid> = detail.participants.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![owner, joiner]);

        let sessions: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM study_sessions WHERE post_id = $1")
                .bind(post)
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(sessions, 1);
    }

    #[sqlx::test]
    async fn test_rejoin_is_a_noop(pool: PgPool) {
        let owner = seed_user(&pool, "owner").await;
        let joiner = seed_user(&pool, "joiner").await;
        let post = seed_post(&pool, owner).await;

        let first = join_post(&pool, post, joiner).await.unwrap();
        let second = join_post(&pool, post, joiner).await.unwrap();

        assert_eq!(first.session.id, second.session.id);
        assert_eq!(second.participants.len(), 2);
        assert_eq!(participant_count(&pool, first.session.id).await, 2);
    }

    #[sqlx::test]
    async fn test_sixth_joiner_is_rejected_without_side_effects(pool: PgPool) {
        let owner = seed_user(&pool, "owner").await;
        let post = seed_post(&pool, owner).await;

        let mut session_id = None;
        for name in ["u1", "u2", "u3", "u4"] {
            let user = seed_user(&pool, name).await;
            let detail = join_post(&pool, post, user).await.unwrap();
            session_id = Some(detail.session.id);
        }
        let session_id = session_id.unwrap();
        assert_eq!(participant_count(&pool, session_id).await, MAX_PARTICIPANTS);

        let sixth = seed_user(&pool, "u5").await;
        let err = join_post(&pool, post, sixth).await.unwrap_err();
        assert!(matches!(err, AppError::Capacity(_)));
        assert_eq!(participant_count(&pool, session_id).await, MAX_PARTICIPANTS);
        assert!(!is_participant(&pool, session_id, sixth).await.unwrap());
    }

    #[sqlx::test]
    async fn test_concurrent_joins_cannot_exceed_capacity(pool: PgPool) {
        let owner = seed_user(&pool, "owner").await;
        let post = seed_post(&pool, owner).await;

        // Owner plus three joiners: one seat left.
        let mut session_id = None;
        for name in ["u1", "u2", "u3"] {
            let user = seed_user(&pool, name).await;
            session_id = Some(join_post(&pool, post, user).await.unwrap().session.id);
        }
        let session_id = session_id.unwrap();
        assert_eq!(participant_count(&pool, session_id).await, 4);

        let a = seed_user(&pool, "late_a").await;
        let b = seed_user(&pool, "late_b").await;
        let (ra, rb) = tokio::join!(join_post(&pool, post, a), join_post(&pool, post, b));

        let successes = [ra.is_ok(), rb.is_ok()].iter().filter(|ok| **ok).count();
        assert_eq!(successes, 1);
        for result in [ra, rb] {
            if let Err(err) = result {
                assert!(matches!(err, AppError::Capacity(_)));
            }
        }
        assert_eq!(participant_count(&pool, session_id).await, MAX_PARTICIPANTS);
    }

    #[sqlx::test]
    async fn test_only_creator_can_end(pool: PgPool) {
        let owner = seed_user(&pool, "owner").await;
        let joiner = seed_user(&pool, "joiner").await;
        let post = seed_post(&pool, owner).await;

        let detail = join_post(&pool, post, joiner).await.unwrap();

        let err = end_session(&pool, detail.session.id, joiner).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let session = fetch_session(&pool, detail.session.id).await.unwrap();
        assert!(session.is_active);
        assert!(session.ended_at.is_none());
    }

    #[sqlx::test]
    async fn test_end_is_terminal_and_idempotent(pool: PgPool) {
        let owner = seed_user(&pool, "owner").await;
        let post = seed_post(&pool, owner).await;

        let detail = join_post(&pool, post, owner).await.unwrap();

        let ended = end_session(&pool, detail.session.id, owner).await.unwrap();
        assert!(!ended.is_active);
        let first_ended_at = ended.ended_at.unwrap();
        assert!(first_ended_at >= ended.started_at);

        // A second end keeps the original timestamp.
        let again = end_session(&pool, detail.session.id, owner).await.unwrap();
        assert!(!again.is_active);
        assert_eq!(again.ended_at, Some(first_ended_at));
    }
}
