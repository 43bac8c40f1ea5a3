//! Logic of the read-path function.
//!
//! The `POST` route hands the function a [`ReadRequest`]; the function
//! queries the table for the application's events inside the requested days
//! and answers with a per-day count. Failures are raised as a JSON
//! `{"type", "message"}` string: the route selects its `400` response when the
//! text contains `ValidationException` and answers `500` otherwise.
//!
//! The table itself sits behind [`EventSource`] so the logic stays pure.
//!
//! Nothing in the assembler calls this module. The deployed function is the
//! `lambdas/applications` asset, uploaded to the bucket and key passed as the
//! `FunctionCodeS3Bucket` and `FunctionCodeS3Key` template parameters. This
//! module pins down that function's request and error contract in Rust.

mod tally;
mod window;

pub use tally::tally_by_day;
pub use window::{CREATED_AT_FORMAT, QueryWindow, REQUEST_DATE_FORMAT, ReadRequest};

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Error category, matched by the route's selection patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// The request is malformed. Mapped to `400`.
    ValidationException,
    /// Anything else. Mapped to `500`.
    UnknownException,
}

/// An error raised by the function.
///
/// Displays as the JSON document the route parses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerError {
    /// Category.
    #[serde(rename = "type")]
    pub kind: ErrorKind,
    /// Message shown to the caller.
    pub message: String,
}

impl HandlerError {
    /// Creates an error.
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Dates that do not parse.
    #[must_use]
    pub fn invalid_values() -> Self {
        Self::new(ErrorKind::ValidationException, "Your values are incorrect.")
    }

    /// Start date after end date.
    #[must_use]
    pub fn start_after_end() -> Self {
        Self::new(
            ErrorKind::ValidationException,
            "The start date is further in the future than the end date.",
        )
    }

    /// The table query failed.
    #[must_use]
    pub fn query_failed() -> Self {
        Self::new(
            ErrorKind::UnknownException,
            "Something went wrong with the database.",
        )
    }

    /// A stored timestamp could not be counted.
    #[must_use]
    pub fn tally_failed() -> Self {
        Self::new(
            ErrorKind::UnknownException,
            "Something went wrong with tallying dates.",
        )
    }

    /// Renders `{"type": ..., "message": ...}`.
    #[must_use]
    pub fn to_json(&self) -> String {
        // A struct of a unit enum and a string always serializes.
        serde_json::to_string(self).unwrap_or_default()
    }
}

impl std::fmt::Display for HandlerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_json())
    }
}

impl std::error::Error for HandlerError {}

/// Successful answer: the per-day counts, JSON-encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerResponse {
    /// JSON object mapping `YYYY-MM-DD` to a count.
    pub response: String,
}

impl HandlerResponse {
    /// Encodes per-day counts.
    #[must_use]
    pub fn from_counts(counts: &BTreeMap<String, u64>) -> Self {
        Self {
            response: serde_json::to_string(counts).unwrap_or_default(),
        }
    }
}

/// Access to stored events.
pub trait EventSource {
    /// Returns the `created_at` values of `application` inside the window.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn created_at_between(
        &self,
        application: &str,
        window: &QueryWindow,
    ) -> Result<Vec<String>, HandlerError>;
}

/// Answers a read request.
///
/// # Errors
///
/// Returns a validation error for bad dates, or an unknown-exception error if
/// the query or the tally fails.
pub fn handle<S: EventSource>(
    request: &ReadRequest,
    source: &S,
) -> Result<HandlerResponse, HandlerError> {
    let window = QueryWindow::from_request(request).inspect_err(|e| warn!("{e}"))?;
    info!(start = %window.start(), end = %window.end(), "Query window");

    let created_at = source
        .created_at_between(&request.application, &window)
        .map_err(|e| {
            warn!("Query failed: {e}");
            HandlerError::query_failed()
        })?;

    let counts = tally_by_day(&created_at)?;
    info!(days = counts.len(), events = created_at.len(), "Tallied events");
    Ok(HandlerResponse::from_counts(&counts))
}
