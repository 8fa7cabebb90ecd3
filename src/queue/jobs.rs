// Job payloads as pushed by the web backend

use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

use crate::types::{AppError, AppResult};

/// Value used for any identifier that could not be recovered from a payload.
pub const UNKNOWN: &str = "unknown";

/// One PDF to turn into a quiz.
///
/// Canonical wire form is `{"fileName", "quizId", "jobId"?}`; the older
/// `filename` / `quiz_id` / `job_id` spellings are accepted on decode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    #[serde(alias = "filename")]
    pub file_name: String,
    #[serde(alias = "quiz_id")]
    pub quiz_id: String,
    #[serde(default, alias = "job_id", skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
}

/// A payload that could not be turned into a [`Job`], with whatever
/// identifiers could still be read from it.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{reason}")]
pub struct JobDecodeError {
    pub job_id: Option<String>,
    pub quiz_id: Option<String>,
    pub file_name: Option<String>,
    pub reason: String,
}

impl JobDecodeError {
    fn bare(reason: impl Into<String>) -> Self {
        Self {
            job_id: None,
            quiz_id: None,
            file_name: None,
            reason: reason.into(),
        }
    }

    fn salvaged(value: &serde_json::Value, reason: impl Into<String>) -> Self {
        let field = |names: &[&str]| {
            names
                .iter()
                .find_map(|n| value.get(*n).and_then(|v| v.as_str()))
                .filter(|s| !s.trim().is_empty())
                .map(str::to_string)
        };
        Self {
            job_id: field(&["jobId", "job_id"]),
            quiz_id: field(&["quizId", "quiz_id"]),
            file_name: field(&["fileName", "filename"]),
            reason: reason.into(),
        }
    }

    pub fn job_id_or_unknown(&self) -> &str {
        self.job_id.as_deref().unwrap_or(UNKNOWN)
    }

    pub fn file_name_or_unknown(&self) -> &str {
        self.file_name.as_deref().unwrap_or(UNKNOWN)
    }
}

impl Job {
    pub fn new(file_name: impl Into<String>, quiz_id: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            quiz_id: quiz_id.into(),
            job_id: None,
        }
    }

    /// Decode and validate a raw queue payload (UTF-8 JSON).
    pub fn decode(payload: &[u8]) -> Result<Self, JobDecodeError> {
        let text = std::str::from_utf8(payload)
            .map_err(|e| JobDecodeError::bare(format!("payload is not valid UTF-8: {}", e)))?;
        let value: serde_json::Value = serde_json::from_str(text)
            .map_err(|e| JobDecodeError::bare(format!("payload is not valid JSON: {}", e)))?;
        let job: Job = serde_json::from_value(value.clone())
            .map_err(|e| JobDecodeError::salvaged(&value, format!("invalid job payload: {}", e)))?;

        if let Err(e) = job.validate() {
            return Err(JobDecodeError::salvaged(&value, e.to_string()));
        }
        Ok(job)
    }

    pub fn encode(&self) -> AppResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.quiz_id.trim().is_empty() {
            return Err(AppError::InvalidRequest("quizId must not be empty".to_string()));
        }
        if self.file_name.trim().is_empty() {
            return Err(AppError::InvalidRequest("fileName must not be empty".to_string()));
        }
        let relative = Path::new(&self.file_name)
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if !relative {
            return Err(AppError::InvalidRequest(format!(
                "fileName {:?} must be a plain relative path",
                self.file_name
            )));
        }
        Ok(())
    }

    pub fn job_id_or_unknown(&self) -> &str {
        self.job_id.as_deref().unwrap_or(UNKNOWN)
    }

    /// Location of the uploaded file under the configured base directory.
    pub fn resolve_path(&self, base_dir: &Path) -> AppResult<PathBuf> {
        self.validate()?;
        Ok(base_dir.join(&self.file_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_canonical_payload() {
        let job = Job::decode(br#"{"fileName":"test.pdf","quizId":"q1"}"#).unwrap();
        assert_eq!(job, Job::new("test.pdf", "q1"));
        assert_eq!(job.job_id_or_unknown(), "unknown");
    }

    #[test]
    fn test_decode_ignores_backend_extras_and_accepts_aliases() {
        let payload = br#"{"teacherId":"t1","quizId":"Ab3","quizName":"Bio","filename":"f.pdf","job_id":"j9","status":"pending","createdAt":1700000000000}"#;
        let job = Job::decode(payload).unwrap();
        assert_eq!(job.file_name, "f.pdf");
        assert_eq!(job.job_id.as_deref(), Some("j9"));
    }

    #[test]
    fn test_snake_case_quiz_id_decodes() {
        let job = Job::decode(br#"{"fileName":"a.pdf","quiz_id":"q1"}"#).unwrap();
        assert_eq!(job, Job::new("a.pdf", "q1"));
    }

    #[test]
    fn test_invalid_json_salvages_nothing() {
        let err = Job::decode(b"{not json").unwrap_err();
        assert_eq!(err.job_id_or_unknown(), "unknown");
        assert_eq!(err.file_name_or_unknown(), "unknown");
        assert!(err.reason.contains("not valid JSON"));
    }

    #[test]
    fn test_non_utf8_payload() {
        let err = Job::decode(&[0xff, 0xfe, 0x00]).unwrap_err();
        assert!(err.reason.contains("UTF-8"));
    }

    #[test]
    fn test_missing_quiz_id_salvages_file_and_job() {
        let err = Job::decode(br#"{"filename":"a.pdf","job_id":"j1"}"#).unwrap_err();
        assert_eq!(err.job_id_or_unknown(), "j1");
        assert_eq!(err.file_name_or_unknown(), "a.pdf");
        assert!(err.quiz_id.is_none());
    }

    #[test]
    fn test_path_traversal_is_rejected() {
        let err = Job::decode(br#"{"fileName":"../secrets.pdf","quizId":"q1"}"#).unwrap_err();
        assert_eq!(err.quiz_id.as_deref(), Some("q1"));
        assert!(err.reason.contains("plain relative path"));
        assert!(Job::decode(br#"{"fileName":"/etc/passwd","quizId":"q1"}"#).is_err());
        assert!(Job::decode(br#"{"fileName":"  ","quizId":"q1"}"#).is_err());
    }

    #[test]
    fn test_resolve_path_joins_base_dir() {
        let job = Job::new("uploads/test.pdf", "q1");
        assert_eq!(
            job.resolve_path(Path::new("/srv/files")).unwrap(),
            PathBuf::from("/srv/files/uploads/test.pdf")
        );
    }

    #[test]
    fn test_encode_uses_canonical_field_names() {
        let mut job = Job::new("test.pdf", "q1");
        job.job_id = Some("j1".to_string());
        let value: serde_json::Value = serde_json::from_str(&job.encode().unwrap()).unwrap();
        assert_eq!(value, serde_json::json!({"fileName": "test.pdf", "quizId": "q1", "jobId": "j1"}));
    }
}
