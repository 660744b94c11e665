#![warn(missing_docs)]
//! # cropform-submission-contract
//!
//! ## Purpose
//! Defines the JSON response schema of the form submission endpoint and the
//! client-side mapping to a success or failure outcome.
//!
//! ## Responsibilities
//! - Parse `{status, redirect_url}` and `{status, message}` response bodies.
//! - Treat every status other than `"success"` as a server-reported failure.
//!
//! ## Data flow
//! Raw response body -> [`parse_submission_response`] ->
//! [`SubmissionOutcome`] -> submit control recovery or navigation.
//!
//! ## Ownership and lifetimes
//! Parsed values are owned so they outlive the transport buffer.
//!
//! ## Error model
//! Invalid JSON or missing mandatory fields return
//! [`SubmissionContractError`]; callers treat both as transport failures.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Status value reported by a successful submission.
pub const STATUS_SUCCESS: &str = "success";

/// Raw response body as sent by the endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionResponse {
    /// `"success"` or any failure status.
    pub status: String,
    /// Navigation target on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
    /// Human-readable failure reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SubmissionResponse {
    /// Builds a success body.
    pub fn success(redirect_url: impl Into<String>) -> Self {
        Self {
            status: STATUS_SUCCESS.to_string(),
            redirect_url: Some(redirect_url.into()),
            message: None,
        }
    }

    /// Builds a failure body.
    pub fn failure(status: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            redirect_url: None,
            message: Some(message.into()),
        }
    }

    /// Serializes the body to compact JSON bytes.
    ///
    /// # Errors
    /// Returns [`SubmissionContractError::Decode`] when serialization fails.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, SubmissionContractError> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// Client-side interpretation of a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    /// Submission accepted; navigate to `redirect_url`.
    Success {
        /// Server-provided location, possibly relative.
        redirect_url: String,
    },
    /// Submission rejected with a message to show verbatim.
    Failure {
        /// Reported status value.
        status: String,
        /// Server-provided message.
        message: String,
    },
}

/// Parses a response body into an outcome.
///
/// # Errors
/// Returns [`SubmissionContractError::Decode`] for invalid JSON and
/// [`SubmissionContractError::InvalidContract`] when the field required by
/// the status is missing or blank.
pub fn parse_submission_response(raw: &[u8]) -> Result<SubmissionOutcome, SubmissionContractError> {
    let parsed: SubmissionResponse = serde_json::from_slice(raw)?;

    if parsed.status == STATUS_SUCCESS {
        let redirect_url = parsed
            .redirect_url
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| {
                SubmissionContractError::InvalidContract("redirect_url is missing".to_string())
            })?;
        return Ok(SubmissionOutcome::Success { redirect_url });
    }

    let message = parsed.message.ok_or_else(|| {
        SubmissionContractError::InvalidContract("message is missing".to_string())
    })?;
    Ok(SubmissionOutcome::Failure {
        status: parsed.status,
        message,
    })
}

/// Submission contract errors.
#[derive(Debug, Error)]
pub enum SubmissionContractError {
    /// JSON decode failure.
    #[error("submission response decode failure: {0}")]
    Decode(#[from] serde_json::Error),
    /// Parsed payload violates contract invariants.
    #[error("submission response contract violation: {0}")]
    InvalidContract(String),
}

#[cfg(test)]
mod tests {
    //! Unit tests for response parsing.

    use super::*;

    #[test]
    fn success_carries_redirect() {
        let outcome = parse_submission_response(br#"{"status":"success","redirect_url":"/done"}"#)
            .expect("valid body");
        assert_eq!(
            outcome,
            SubmissionOutcome::Success {
                redirect_url: "/done".to_string()
            }
        );
    }

    #[test]
    fn any_other_status_is_a_failure() {
        let outcome =
            parse_submission_response(br#"{"status":"invalid","message":"Photo is required."}"#)
                .expect("valid body");
        assert_eq!(
            outcome,
            SubmissionOutcome::Failure {
                status: "invalid".to_string(),
                message: "Photo is required.".to_string()
            }
        );
    }

    #[test]
    fn success_without_redirect_violates_contract() {
        let result = parse_submission_response(br#"{"status":"success","redirect_url":"  "}"#);
        assert!(matches!(
            result,
            Err(SubmissionContractError::InvalidContract(_))
        ));
    }

    #[test]
    fn html_error_page_is_a_decode_failure() {
        let result = parse_submission_response(b"<html>502 Bad Gateway</html>");
        assert!(matches!(result, Err(SubmissionContractError::Decode(_))));
    }

    #[test]
    fn builders_round_trip_through_parser() {
        let raw = SubmissionResponse::failure("error", "bad file")
            .to_json_bytes()
            .expect("serializes");
        assert!(matches!(
            parse_submission_response(&raw),
            Ok(SubmissionOutcome::Failure { message, .. }) if message == "bad file"
        ));
    }
}
