#![warn(missing_docs)]
//! # cropform-submit
//!
//! ## Purpose
//! Serializes the live form into one `multipart/form-data` request and posts
//! it to the page's submission endpoint.
//!
//! ## Responsibilities
//! - Encode text fields, checked options, and non-empty file inputs as parts.
//! - Send exactly one request through an injectable [`SubmissionTransport`].
//! - Parse the JSON response and resolve redirects against the page URL.
//!
//! ## Data flow
//! [`FormState`] -> [`build_multipart`] -> [`SubmissionRequest`] ->
//! [`SubmissionTransport::post`] -> [`parse_submission_response`].
//!
//! ## Ownership and lifetimes
//! Requests own their body so transports may stage or forward them freely.
//!
//! ## Error model
//! Transport failures and malformed responses are reported as [`SubmitError`].
//! There is no retry; the user re-triggers submission.

use std::sync::Arc;

use cropform_core::{FieldValue, FormState};
use cropform_submission_contract::{
    SubmissionContractError, SubmissionOutcome, parse_submission_response,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;
use url::Url;

/// HTTP method used for submissions.
pub const SUBMIT_METHOD: &str = "POST";

const BOUNDARY_PREFIX: &str = "----cropformBoundary";
const BOUNDARY_RANDOM_LEN: usize = 16;

/// Summary of one encoded part, used for logging and inspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartSummary {
    /// Part name.
    pub name: String,
    /// File name for file parts.
    pub filename: Option<String>,
    /// Payload length in bytes.
    pub len: usize,
}

/// Encoded multipart body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartBody {
    boundary: String,
    parts: Vec<PartSummary>,
    bytes: Vec<u8>,
}

impl MultipartBody {
    /// Boundary separating parts.
    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// `Content-Type` header value.
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    /// Encoded parts in order.
    pub fn parts(&self) -> &[PartSummary] {
        &self.parts
    }

    /// Names of the file parts in order.
    pub fn file_part_names(&self) -> Vec<&str> {
        self.parts
            .iter()
            .filter(|part| part.filename.is_some())
            .map(|part| part.name.as_str())
            .collect()
    }

    /// Raw body bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Generates a random boundary.
pub fn generate_boundary() -> String {
    let mut rng = StdRng::from_os_rng();
    let suffix: String = (0..BOUNDARY_RANDOM_LEN)
        .map(|_| char::from(rng.sample(rand::distr::Alphanumeric)))
        .collect();
    format!("{BOUNDARY_PREFIX}{suffix}")
}

/// Encodes the form as a multipart body.
///
/// # Semantics
/// - Every text field produces one part, empty or not.
/// - Every checked option produces one part named after its group.
/// - Only file inputs holding a file produce a part.
pub fn build_multipart(form: &FormState, boundary: &str) -> MultipartBody {
    let mut bytes = Vec::new();
    let mut parts = Vec::new();

    for field in form.fields() {
        match &field.value {
            FieldValue::Text(value) => {
                write_part(&mut bytes, boundary, &field.name, None, value.as_bytes());
                parts.push(PartSummary {
                    name: field.name.clone(),
                    filename: None,
                    len: value.len(),
                });
            }
            FieldValue::Checked(values) => {
                for value in values {
                    write_part(&mut bytes, boundary, &field.name, None, value.as_bytes());
                    parts.push(PartSummary {
                        name: field.name.clone(),
                        filename: None,
                        len: value.len(),
                    });
                }
            }
            FieldValue::File(Some(file)) => {
                write_part(
                    &mut bytes,
                    boundary,
                    &field.name,
                    Some((&file.name, &file.content_type)),
                    &file.bytes,
                );
                parts.push(PartSummary {
                    name: field.name.clone(),
                    filename: Some(file.name.clone()),
                    len: file.bytes.len(),
                });
            }
            FieldValue::File(None) => {}
        }
    }

    bytes.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());

    MultipartBody {
        boundary: boundary.to_string(),
        parts,
        bytes,
    }
}

fn write_part(
    out: &mut Vec<u8>,
    boundary: &str,
    name: &str,
    file: Option<(&str, &str)>,
    data: &[u8],
) {
    out.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    match file {
        Some((filename, content_type)) => {
            out.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                    escape_header_value(name),
                    escape_header_value(filename)
                )
                .as_bytes(),
            );
            out.extend_from_slice(format!("Content-Type: {content_type}\r\n").as_bytes());
        }
        None => out.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"\r\n",
                escape_header_value(name)
            )
            .as_bytes(),
        ),
    }
    out.extend_from_slice(b"\r\n");
    out.extend_from_slice(data);
    out.extend_from_slice(b"\r\n");
}

// Percent-encodes the characters that would break a quoted header parameter.
fn escape_header_value(value: &str) -> String {
    value
        .replace('\r', "%0D")
        .replace('\n', "%0A")
        .replace('"', "%22")
}

/// One submission request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionRequest {
    /// Always [`SUBMIT_METHOD`].
    pub method: &'static str,
    /// Page URL the form was served from.
    pub url: Url,
    /// Encoded multipart body.
    pub body: MultipartBody,
}

/// Raw response returned by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    /// HTTP status code. Informational only; the body decides the outcome.
    pub status: u16,
    /// Response body.
    pub body: Vec<u8>,
}

/// Abstract transport used by the submit client.
pub trait SubmissionTransport: Send + Sync {
    /// Sends one request and returns the raw response.
    ///
    /// # Errors
    /// Returns [`SubmitError::Transport`] when no response was received.
    fn post(&self, request: &SubmissionRequest) -> Result<TransportResponse, SubmitError>;
}

/// Client bound to one page URL.
#[derive(Clone)]
pub struct SubmitClient {
    page_url: Url,
    transport: Arc<dyn SubmissionTransport>,
}

impl SubmitClient {
    /// Creates a client posting to `page_url`.
    ///
    /// # Errors
    /// Returns [`SubmitError::InvalidEndpoint`] when `page_url` is not an
    /// absolute URL.
    pub fn new(
        page_url: &str,
        transport: Arc<dyn SubmissionTransport>,
    ) -> Result<Self, SubmitError> {
        let page_url = Url::parse(page_url)?;
        Ok(Self {
            page_url,
            transport,
        })
    }

    /// Page URL that receives submissions.
    pub fn page_url(&self) -> &Url {
        &self.page_url
    }

    /// Builds a request for the current form state.
    pub fn prepare(&self, form: &FormState) -> SubmissionRequest {
        SubmissionRequest {
            method: SUBMIT_METHOD,
            url: self.page_url.clone(),
            body: build_multipart(form, &generate_boundary()),
        }
    }

    /// Posts the form once and parses the response.
    ///
    /// # Errors
    /// Returns [`SubmitError::Transport`] or [`SubmitError::Contract`].
    pub fn submit(&self, form: &FormState) -> Result<SubmissionOutcome, SubmitError> {
        let request = self.prepare(form);
        log::info!(
            target: "submit",
            "post url={} parts={} files={:?} bytes={}",
            request.url,
            request.body.parts().len(),
            request.body.file_part_names(),
            request.body.bytes().len()
        );

        let response = self.transport.post(&request)?;
        log::info!(
            target: "submit",
            "response status={} bytes={}",
            response.status,
            response.body.len()
        );

        Ok(parse_submission_response(&response.body)?)
    }

    /// Resolves a possibly relative redirect against the page URL.
    ///
    /// # Errors
    /// Returns [`SubmitError::InvalidRedirect`] when the location cannot be
    /// joined.
    pub fn resolve_redirect(&self, redirect_url: &str) -> Result<Url, SubmitError> {
        self.page_url
            .join(redirect_url)
            .map_err(|error| SubmitError::InvalidRedirect(format!("{redirect_url}: {error}")))
    }
}

impl std::fmt::Debug for SubmitClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubmitClient")
            .field("page_url", &self.page_url.as_str())
            .finish_non_exhaustive()
    }
}

/// Submit layer error type.
#[derive(Debug, Error)]
pub enum SubmitError {
    /// Page URL is not a valid absolute URL.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(#[from] url::ParseError),
    /// No response was received.
    #[error("transport failure: {0}")]
    Transport(String),
    /// Response body did not match the contract.
    #[error("response contract failure: {0}")]
    Contract(#[from] SubmissionContractError),
    /// Redirect location cannot be resolved.
    #[error("invalid redirect: {0}")]
    InvalidRedirect(String),
}
