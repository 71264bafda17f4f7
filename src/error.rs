//! Error types for query-forge operations.
//!
//! Defines error types for the major subsystems:
//! - LLM backend interactions
//! - Generation runs (fatal conditions only; parse failures never surface here)
//! - Dataset export and import
//! - Evaluation replays

use thiserror::Error;

use crate::pipeline::config::ConfigError;

/// Errors that can occur during LLM operations.
#[derive(Debug, Clone, Error)]
pub enum LlmError {
    #[error("Missing API key: set LLM_API_KEY or pass --api-key")]
    MissingApiKey,

    #[error("Missing API base URL: set LLM_BASE_URL or pass --base-url")]
    MissingApiBase,

    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Failed to parse LLM response: {0}")]
    ParseError(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("API error ({code}): {message}")]
    ApiError { code: u16, message: String },

    #[error("Backend call timed out after {seconds} seconds")]
    Timeout { seconds: u64 },
}

impl LlmError {
    /// Whether the failure is an authentication/authorization rejection.
    ///
    /// Credentials cannot be fixed by retrying, so callers may want to stop early.
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            LlmError::MissingApiKey | LlmError::ApiError { code: 401 | 403, .. }
        )
    }
}

/// Errors that abort a generation run.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Backend failure for domain '{domain}' category {category}: {source}")]
    Backend {
        domain: String,
        category: String,
        #[source]
        source: LlmError,
    },

    #[error("Taxonomy extraction failed: {0}")]
    Taxonomy(#[source] LlmError),

    #[error("Quota shortfall in {} pair(s): {summary}", .pairs)]
    Shortfall {
        pairs: usize,
        summary: String,
        output: Box<crate::pipeline::RunOutput>,
    },
}

/// Errors that can occur during export and import operations.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Unsupported dataset format for '{0}': expected .parquet, .csv or .jsonl")]
    UnsupportedFormat(String),

    #[error("No records to export")]
    NoRecords,

    #[error("Invalid row {row}: {reason}")]
    InvalidRow { row: usize, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),
}

/// Errors that can occur while replaying a dataset against a predictor.
#[derive(Debug, Error)]
pub enum EvalError {
    #[error("Prediction request failed: {0}")]
    RequestFailed(String),

    #[error("Predictor returned status {code}: {message}")]
    BadStatus { code: u16, message: String },

    #[error("Invalid predictor response: {0}")]
    InvalidResponse(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_failure_detection() {
        assert!(LlmError::MissingApiKey.is_auth_failure());
        assert!(LlmError::ApiError {
            code: 401,
            message: "bad key".to_string()
        }
        .is_auth_failure());
        assert!(!LlmError::ApiError {
            code: 500,
            message: "oops".to_string()
        }
        .is_auth_failure());
        assert!(!LlmError::Timeout { seconds: 30 }.is_auth_failure());
    }

    #[test]
    fn test_error_display() {
        let err = LlmError::ApiError {
            code: 429,
            message: "slow down".to_string(),
        };
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("slow down"));

        let err = ExportError::UnsupportedFormat("cases.xlsx".to_string());
        assert!(err.to_string().contains("cases.xlsx"));
    }
}
