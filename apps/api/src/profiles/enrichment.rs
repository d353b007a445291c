//! AI enrichment for uploaded certificates.
//!
//! Best-effort: the media row is already persisted before this runs, and
//! every failure degrades to a fallback label instead of rejecting the
//! upload.

use serde::Deserialize;
use serde_json::Value;

use crate::llm_client::{CallOpts, LlmClient, LlmError};
use crate::profiles::prompts::{certificate_prompt, CERTIFICATE_SYSTEM};

pub const FALLBACK_TITLE: &str = "Verified Certificate";
pub const FALLBACK_ISSUER: &str = "Verified Issuer";
pub const ERROR_TITLE: &str = "Certificate (AI Error)";

#[derive(Debug, Default, Deserialize)]
pub struct CertificateInfo {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub issuer: Option<String>,
    #[serde(default)]
    pub skills: Vec<String>,
}

/// The labels actually written to the media row.
#[derive(Debug, PartialEq)]
pub struct CertificateLabels {
    pub title: String,
    pub issuer: String,
    pub skills: Value,
}

pub async fn extract_certificate(
    llm: &LlmClient,
    raw_text: &str,
) -> Result<CertificateInfo, LlmError> {
    llm.call_json(
        &certificate_prompt(raw_text),
        CERTIFICATE_SYSTEM,
        CallOpts {
            temperature: 0.7,
            max_tokens: 1024,
            json: true,
        },
    )
    .await
}

/// Fills in fallback labels for whatever the model left out.
pub fn apply_fallbacks(info: CertificateInfo) -> CertificateLabels {
    CertificateLabels {
        title: info
            .title
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| FALLBACK_TITLE.to_string()),
        issuer: info
            .issuer
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| FALLBACK_ISSUER.to_string()),
        skills: Value::from(info.skills),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_apply_fallbacks_full_info() {
        let labels = apply_fallbacks(CertificateInfo {
            title: Some("AWS SAA".into()),
            issuer: Some("Amazon".into()),
            skills: vec!["cloud".into(), "networking".into()],
        });
        assert_eq!(labels.title, "AWS SAA");
        assert_eq!(labels.issuer, "Amazon");
        assert_eq!(labels.skills, json!(["cloud", "networking"]));
    }

    #[test]
    fn test_apply_fallbacks_missing_fields() {
        let labels = apply_fallbacks(CertificateInfo::default());
        assert_eq!(labels.title, FALLBACK_TITLE);
        assert_eq!(labels.issuer, FALLBACK_ISSUER);
        assert_eq!(labels.skills, json!([]));
    }

    #[test]
    fn test_apply_fallbacks_blank_title() {
        let labels = apply_fallbacks(CertificateInfo {
            title: Some("   ".into()),
            issuer: None,
            skills: vec![],
        });
        assert_eq!(labels.title, FALLBACK_TITLE);
    }

    #[test]
    fn test_certificate_info_tolerates_partial_json() {
        let info: CertificateInfo = serde_json::from_str(r#"{"title":"Cert"}"#).unwrap();
        assert_eq!(info.title.as_deref(), Some("Cert"));
        assert!(info.issuer.is_none());
        assert!(info.skills.is_empty());
    }
}
