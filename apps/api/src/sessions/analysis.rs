//! Background conversation analysis.
//!
//! `generate_notes` requests are enqueued on a bounded channel and served by
//! a fixed pool of workers, so analysis fan-out is capped instead of one
//! detached task per request. Outcomes are written back to the session's
//! `last_analysis_status` so failures stay observable; there is no retry and
//! no de-duplication — each job appends its own note.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tokio::sync::{mpsc, Mutex};
use tracing::{error, info};
use uuid::Uuid;

use crate::llm_client::{prompts::JSON_ONLY_SYSTEM, CallOpts, LlmClient};
use crate::sessions::prompts::analysis_prompt;

pub const STATUS_PENDING: &str = "pending";
pub const STATUS_COMPLETED: &str = "completed";
pub const STATUS_FAILED: &str = "failed";

/// A chat message as delivered from the external real-time store.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomingMessage {
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AnalysisJob {
    pub session_id: Uuid,
    pub messages: Vec<IncomingMessage>,
}

/// The model's structured reply. Every field is optional on the wire;
/// missing fields become empty collections, never nulls.
#[derive(Debug, Default, Deserialize)]
pub struct ConversationAnalysis {
    #[serde(default)]
    pub key_concepts: Vec<String>,
    #[serde(default)]
    pub definitions: Vec<Definition>,
    #[serde(default)]
    pub study_tips: Vec<String>,
    #[serde(default)]
    pub resources: Vec<String>,
    #[serde(default)]
    pub summary: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Definition {
    #[serde(default)]
    pub term: String,
    #[serde(default)]
    pub definition: String,
}

/// Handle for submitting analysis jobs to the worker pool.
#[derive(Clone)]
pub struct AnalysisQueue {
    tx: mpsc::Sender<AnalysisJob>,
}

impl AnalysisQueue {
    /// Spawns `workers` consumer tasks sharing one bounded channel.
    pub fn start(pool: PgPool, llm: LlmClient, workers: usize, depth: usize) -> Self {
        let (tx, rx) = mpsc::channel(depth);
        let rx = Arc::new(Mutex::new(rx));

        for worker_id in 0..workers.max(1) {
            let rx = Arc::clone(&rx);
            let pool = pool.clone();
            let llm = llm.clone();
            tokio::spawn(async move {
                worker_loop(worker_id, rx, pool, llm).await;
            });
        }

        Self { tx }
    }

    /// Non-blocking enqueue. `Err` means the queue is at capacity.
    pub fn enqueue(&self, job: AnalysisJob) -> Result<(), AnalysisJob> {
        self.tx.try_send(job).map_err(|e| e.into_inner())
    }
}

async fn worker_loop(
    worker_id: usize,
    rx: Arc<Mutex<mpsc::Receiver<AnalysisJob>>>,
    pool: PgPool,
    llm: LlmClient,
) {
    loop {
        let job = rx.lock().await.recv().await;
        let Some(job) = job else {
            info!("analysis worker {worker_id} shutting down");
            break;
        };

        let session_id = job.session_id;
        match run_analysis(&pool, &llm, job).await {
            Ok(count) => {
                info!(%session_id, messages = count, "conversation analysis completed");
            }
            Err(e) => {
                error!(%session_id, "conversation analysis failed: {e:#}");
                if let Err(e) = mark_status(&pool, session_id, STATUS_FAILED).await {
                    error!(%session_id, "failed to record analysis failure: {e}");
                }
            }
        }
    }
}

/// Formats the transcript, makes one structured-output model call, and
/// appends a conversation note. Returns the number of messages analyzed.
async fn run_analysis(pool: &PgPool, llm: &LlmClient, job: AnalysisJob) -> Result<usize> {
    let session_exists: Option<Uuid> =
        sqlx::query_scalar("SELECT id FROM study_sessions WHERE id = $1")
            .bind(job.session_id)
            .fetch_optional(pool)
            .await?;
    if session_exists.is_none() {
        bail!("session {} no longer exists", job.session_id);
    }

    let transcript = build_transcript(&job.messages);
    let prompt = analysis_prompt(&transcript);

    let analysis: ConversationAnalysis = llm
        .call_json(
            &prompt,
            JSON_ONLY_SYSTEM,
            CallOpts {
                temperature: 0.5,
                max_tokens: 2048,
                json: true,
            },
        )
        .await
        .context("LLM analysis call failed")?;

    let content = analysis
        .summary
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| "No summary provided".to_string());

    sqlx::query(
        r#"
        INSERT INTO conversation_notes
            (session_id, content, key_concepts, definitions, study_tips,
             resources_mentioned, message_count_analyzed)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(job.session_id)
    .bind(&content)
    .bind(serde_json::to_value(&analysis.key_concepts)?)
    .bind(serde_json::to_value(&analysis.definitions)?)
    .bind(serde_json::to_value(&analysis.study_tips)?)
    .bind(serde_json::to_value(&analysis.resources)?)
    .bind(job.messages.len() as i32)
    .execute(pool)
    .await?;

    sqlx::query(
        "UPDATE study_sessions
         SET last_ai_analysis = now(), last_analysis_status = $2
         WHERE id = $1",
    )
    .bind(job.session_id)
    .bind(STATUS_COMPLETED)
    .execute(pool)
    .await?;

    Ok(job.messages.len())
}

pub async fn mark_status(pool: &PgPool, session_id: Uuid, status: &str) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE study_sessions SET last_analysis_status = $2 WHERE id = $1")
        .bind(session_id)
        .bind(status)
        .execute(pool)
        .await?;
    Ok(())
}

/// Concatenates "sender: text" lines in input order. Senders without a name
/// become "User"; missing text becomes an empty string.
pub fn build_transcript(messages: &[IncomingMessage]) -> String {
    messages
        .iter()
        .map(|m| {
            format!(
                "{}: {}",
                m.user_name.as_deref().unwrap_or("User"),
                m.text.as_deref().unwrap_or("")
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(name: Option<&str>, text: Option<&str>) -> IncomingMessage {
        IncomingMessage {
            user_name: name.map(String::from),
            text: text.map(String::from),
        }
    }

    #[test]
    fn test_transcript_preserves_order() {
        let messages = [
            msg(Some("A"), Some("What is X?")),
            msg(Some("B"), Some("X is Y")),
        ];
        assert_eq!(build_transcript(&messages), "A: What is X?\nB: X is Y");
    }

    #[test]
    fn test_transcript_defaults_for_missing_fields() {
        let messages = [msg(None, None), msg(Some("C"), None)];
        assert_eq!(build_transcript(&messages), "User: \nC: ");
    }

    #[test]
    fn test_transcript_empty_input() {
        assert_eq!(build_transcript(&[]), "");
    }

    #[test]
    fn test_incoming_message_accepts_camel_case() {
        let m: IncomingMessage =
            serde_json::from_str(r#"{"userName":"A","text":"What is X?"}"#).unwrap();
        assert_eq!(m.user_name.as_deref(), Some("A"));
        assert_eq!(m.text.as_deref(), Some("What is X?"));
    }

    #[test]
    fn test_analysis_missing_fields_default_to_empty() {
        let analysis: ConversationAnalysis =
            serde_json::from_str(r#"{"key_concepts":["X"],"summary":"Discussed X"}"#).unwrap();
        assert_eq!(analysis.key_concepts, vec!["X"]);
        assert!(analysis.definitions.is_empty());
        assert!(analysis.study_tips.is_empty());
        assert!(analysis.resources.is_empty());
        assert_eq!(analysis.summary.as_deref(), Some("Discussed X"));
    }

    #[test]
    fn test_analysis_empty_object_parses() {
        let analysis: ConversationAnalysis = serde_json::from_str("{}").unwrap();
        assert!(analysis.key_concepts.is_empty());
        assert!(analysis.summary.is_none());
    }

    #[test]
    fn test_analysis_definitions_shape() {
        let analysis: ConversationAnalysis = serde_json::from_str(
            r#"{"definitions":[{"term":"X","definition":"a thing"},{"term":"Y"}]}"#,
        )
        .unwrap();
        assert_eq!(analysis.definitions.len(), 2);
        assert_eq!(analysis.definitions[0].term, "X");
        assert_eq!(analysis.definitions[1].definition, "");
    }
}
