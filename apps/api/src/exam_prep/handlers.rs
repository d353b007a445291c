//! Axum route handlers for the exam-prep endpoints.
//!
//! Both paths are synchronous: validation failures never reach the model,
//! and remote failures surface to the caller (unlike the fire-and-forget
//! conversation analysis).

use axum::{extract::State, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::exam_prep::prompts::{materials_prompt, solve_prompt, MATERIALS_SYSTEM, SOLVE_SYSTEM};
use crate::llm_client::{CallOpts, LlmError};
use crate::state::AppState;

const DEFAULT_DIFFICULTY: &str = "Intermediate";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateMaterialsRequest {
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub grade_level: Option<String>,
    #[serde(default)]
    pub difficulty: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SolveQuestionRequest {
    #[serde(default)]
    pub question: Option<String>,
}

/// The validated inputs for a materials request.
#[derive(Debug, PartialEq)]
struct MaterialsInput {
    subject: String,
    topic: String,
    grade: String,
    difficulty: String,
}

fn validate_materials(req: &GenerateMaterialsRequest) -> Result<MaterialsInput, AppError> {
    let subject = non_blank(&req.subject);
    let topic = non_blank(&req.topic);
    let grade = non_blank(&req.grade_level);

    match (subject, topic, grade) {
        (Some(subject), Some(topic), Some(grade)) => Ok(MaterialsInput {
            subject,
            topic,
            grade,
            difficulty: non_blank(&req.difficulty)
                .unwrap_or_else(|| DEFAULT_DIFFICULTY.to_string()),
        }),
        _ => Err(AppError::Validation(
            "Missing required fields: subject, topic, and gradeLevel".to_string(),
        )),
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

/// POST /api/exam-prep
///
/// Generates key concepts and practice questions. The model's JSON reply is
/// returned verbatim.
pub async fn handle_generate_materials(
    State(state): State<AppState>,
    _user: AuthUser,
    Json(req): Json<GenerateMaterialsRequest>,
) -> Result<Json<Value>, AppError> {
    let input = validate_materials(&req)?;

    let prompt = materials_prompt(&input.subject, &input.topic, &input.grade, &input.difficulty);
    let materials: Value = state
        .llm
        .call_json(
            &prompt,
            MATERIALS_SYSTEM,
            CallOpts {
                temperature: 0.7,
                max_tokens: 2048,
                json: true,
            },
        )
        .await?;

    Ok(Json(materials))
}

/// POST /api/exam-prep/solve
///
/// Solves one exam question. Lower temperature for factual, step-by-step
/// answers; the reply is plain text.
pub async fn handle_solve_question(
    State(state): State<AppState>,
    _user: AuthUser,
    Json(req): Json<SolveQuestionRequest>,
) -> Result<Json<Value>, AppError> {
    let question = non_blank(&req.question)
        .ok_or_else(|| AppError::Validation("No question provided".to_string()))?;

    let response = state
        .llm
        .call(
            &solve_prompt(&question),
            SOLVE_SYSTEM,
            CallOpts {
                temperature: 0.3,
                max_tokens: 2048,
                json: false,
            },
        )
        .await?;

    let answer = response.text().ok_or(LlmError::EmptyContent)?;
    Ok(Json(json!({ "answer": answer })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_request() -> GenerateMaterialsRequest {
        GenerateMaterialsRequest {
            subject: Some("Math".into()),
            topic: Some("Calculus".into()),
            grade_level: Some("10th grade".into()),
            difficulty: None,
        }
    }

    #[test]
    fn test_validate_materials_defaults_difficulty() {
        let input = validate_materials(&full_request()).unwrap();
        assert_eq!(input.difficulty, "Intermediate");
        assert_eq!(input.subject, "Math");
    }

    #[test]
    fn test_validate_materials_missing_subject() {
        let req = GenerateMaterialsRequest {
            subject: None,
            ..full_request()
        };
        assert!(matches!(
            validate_materials(&req),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_validate_materials_blank_grade_rejected() {
        let req = GenerateMaterialsRequest {
            grade_level: Some("   ".into()),
            ..full_request()
        };
        assert!(matches!(
            validate_materials(&req),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_validate_materials_explicit_difficulty_kept() {
        let req = GenerateMaterialsRequest {
            difficulty: Some("Advanced".into()),
            ..full_request()
        };
        assert_eq!(validate_materials(&req).unwrap().difficulty, "Advanced");
    }

    #[test]
    fn test_non_blank_trims() {
        assert_eq!(non_blank(&Some("  x  ".into())), Some("x".to_string()));
        assert_eq!(non_blank(&Some("".into())), None);
        assert_eq!(non_blank(&None), None);
    }

    #[test]
    fn test_camel_case_grade_level_deserializes() {
        let req: GenerateMaterialsRequest =
            serde_json::from_str(r#"{"subject":"S","topic":"T","gradeLevel":"G"}"#).unwrap();
        assert_eq!(req.grade_level.as_deref(), Some("G"));
    }
}
