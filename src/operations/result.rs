//! Results and failures produced by operation dispatch

use crate::error::SnowAgentError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

/// Classification of a failed operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Planner named an operation outside the catalog
    UnknownOperation,
    /// Parameters did not match the operation schema
    SchemaValidation,
    /// Parameters were well-formed but unusable (bad table name, ...)
    InvalidRequest,
    /// 401/403 from the instance
    Auth,
    /// 404 from the instance
    NotFound,
    /// Other 4xx from the instance
    Rejected,
    /// 5xx from the instance
    Server,
    /// Connection-level failure
    Network,
    /// Request exceeded the configured timeout
    Timeout,
    /// Response body could not be read
    Decode,
    /// Request was never dispatched (turn cancelled first)
    NotExecuted,
}

impl FailureKind {
    /// Stable snake_case label, also used as a metrics label
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnknownOperation => "unknown_operation",
            Self::SchemaValidation => "schema_validation",
            Self::InvalidRequest => "invalid_request",
            Self::Auth => "auth",
            Self::NotFound => "not_found",
            Self::Rejected => "rejected",
            Self::Server => "server",
            Self::Network => "network",
            Self::Timeout => "timeout",
            Self::Decode => "decode",
            Self::NotExecuted => "not_executed",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured description of why an operation did not succeed
///
/// Failures are data, not errors: they are recorded in the conversation and
/// shown to the planner so it can correct itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    /// What went wrong
    pub kind: FailureKind,
    /// Human-readable message
    pub message: String,
    /// Extra detail from the remote side, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// HTTP status code, when the failure came from a response
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
}

impl Failure {
    /// Create a failure with no detail or status
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            detail: None,
            status_code: None,
        }
    }

    /// Attach remote detail text
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Attach the HTTP status code
    pub fn with_status(mut self, status: u16) -> Self {
        self.status_code = Some(status);
        self
    }

    /// Convert into an error value, for logging or for surfacing to callers
    /// that treat the failure as fatal (the startup connection test does)
    pub fn to_error(&self, operation: &str) -> SnowAgentError {
        match self.kind {
            FailureKind::UnknownOperation | FailureKind::SchemaValidation => {
                SnowAgentError::SchemaValidation {
                    operation: operation.to_string(),
                    message: self.message.clone(),
                }
            }
            _ => SnowAgentError::Gateway {
                kind: self.kind.to_string(),
                message: match &self.detail {
                    Some(detail) => format!("{} ({})", self.message, detail),
                    None => self.message.clone(),
                },
            },
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)?;
        if let Some(status) = self.status_code {
            write!(f, " [HTTP {}]", status)?;
        }
        Ok(())
    }
}

/// Outcome flag of an [`OperationResult`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    /// Operation succeeded; payload is the remote data
    Ok,
    /// Operation failed; payload is a serialized [`Failure`]
    Error,
}

/// Recorded outcome of one dispatched (or rejected) request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationResult {
    /// Id of the request this result answers
    pub request_id: String,
    /// Operation name as requested
    pub operation: String,
    /// Success or failure
    pub status: ResultStatus,
    /// Remote data on success, serialized failure otherwise
    pub payload: Value,
}

impl OperationResult {
    /// Successful result
    pub fn ok(request_id: impl Into<String>, operation: impl Into<String>, payload: Value) -> Self {
        Self {
            request_id: request_id.into(),
            operation: operation.into(),
            status: ResultStatus::Ok,
            payload,
        }
    }

    /// Failed result carrying the failure as its payload
    pub fn failed(
        request_id: impl Into<String>,
        operation: impl Into<String>,
        failure: &Failure,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            operation: operation.into(),
            status: ResultStatus::Error,
            payload: serde_json::to_value(failure)
                .unwrap_or_else(|_| json!({ "message": failure.message })),
        }
    }

    /// Returns true if the operation succeeded
    pub fn is_ok(&self) -> bool {
        self.status == ResultStatus::Ok
    }

    /// Recover the failure from an error payload
    pub fn failure(&self) -> Option<Failure> {
        match self.status {
            ResultStatus::Ok => None,
            ResultStatus::Error => serde_json::from_value(self.payload.clone()).ok(),
        }
    }

    /// Render the result for the planner
    ///
    /// The rendered text is capped at `max_chars` characters. The stored
    /// payload is never modified; only this rendering is shortened.
    ///
    /// # Examples
    ///
    /// ```
    /// use snow_agent::operations::OperationResult;
    /// use serde_json::json;
    ///
    /// let result = OperationResult::ok("r1", "get_record", json!({"number": "INC0010001"}));
    /// let text = result.to_message(10_000);
    /// assert!(text.contains("INC0010001"));
    /// assert!(text.contains("\"success\": true"));
    /// ```
    pub fn to_message(&self, max_chars: usize) -> String {
        let envelope = match self.status {
            ResultStatus::Ok => json!({ "success": true, "data": self.payload }),
            ResultStatus::Error => json!({ "success": false, "error": self.payload }),
        };
        let rendered =
            serde_json::to_string_pretty(&envelope).unwrap_or_else(|_| envelope.to_string());
        truncate_chars(&rendered, max_chars)
    }
}

/// Cut `text` to at most `max_chars` characters, marking the cut
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        None => text.to_string(),
        Some((byte_idx, _)) => {
            let omitted = text[byte_idx..].chars().count();
            format!(
                "{}\n... (truncated, {} more characters)",
                &text[..byte_idx],
                omitted
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_display_includes_status() {
        let failure = Failure::new(FailureKind::NotFound, "No Record found").with_status(404);
        assert_eq!(failure.to_string(), "not_found: No Record found [HTTP 404]");
    }

    #[test]
    fn test_failure_serializes_without_empty_fields() {
        let failure = Failure::new(FailureKind::Network, "connection refused");
        let value = serde_json::to_value(&failure).unwrap();
        assert_eq!(
            value,
            json!({"kind": "network", "message": "connection refused"})
        );
    }

    #[test]
    fn test_failed_result_round_trips_failure() {
        let failure = Failure::new(FailureKind::Auth, "User Not Authenticated")
            .with_detail("Required to provide Auth information")
            .with_status(401);
        let result = OperationResult::failed("r1", "query_records", &failure);

        assert!(!result.is_ok());
        assert_eq!(result.failure(), Some(failure));
    }

    #[test]
    fn test_ok_result_has_no_failure() {
        let result = OperationResult::ok("r1", "get_record", json!({"sys_id": "abc"}));
        assert!(result.is_ok());
        assert!(result.failure().is_none());
    }

    #[test]
    fn test_to_message_error_envelope() {
        let failure = Failure::new(
            FailureKind::SchemaValidation,
            "missing required parameter 'table'",
        );
        let result = OperationResult::failed("r1", "query_records", &failure);
        let text = result.to_message(10_000);
        assert!(text.contains("\"success\": false"));
        assert!(text.contains("schema_validation"));
    }

    #[test]
    fn test_to_message_truncates_rendering_only() {
        let big = "x".repeat(500);
        let result = OperationResult::ok("r1", "query_records", json!({ "blob": big }));
        let text = result.to_message(100);
        assert!(text.contains("truncated"));
        assert_eq!(result.payload["blob"].as_str().unwrap().len(), 500);
    }

    #[test]
    fn test_truncate_chars_respects_char_boundaries() {
        let text = "żółw".repeat(10);
        let cut = truncate_chars(&text, 5);
        assert!(cut.starts_with("żółwż"));
        assert!(cut.contains("35 more characters"));
    }

    #[test]
    fn test_truncate_chars_short_text_untouched() {
        assert_eq!(truncate_chars("short", 100), "short");
    }

    #[test]
    fn test_to_error_maps_schema_failures() {
        let failure = Failure::new(FailureKind::UnknownOperation, "unknown operation 'drop_table'");
        assert!(matches!(
            failure.to_error("drop_table"),
            SnowAgentError::SchemaValidation { .. }
        ));

        let failure = Failure::new(FailureKind::Server, "boom").with_detail("stack");
        let err = failure.to_error("get_record");
        assert_eq!(err.to_string(), "Gateway error (server): boom (stack)");
    }
}
