//! Wire types for the LED endpoint.
//!
//! POST body: a JSON array of [`LedCommand`]s.  Response: [`LedResponse`]
//! with one [`LedResult`] per command, in request order.

use serde::{Deserialize, Serialize};

/// Timestamp layout expected by the endpoint.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub const VALID_COLORS: [&str; 2] = ["red", "blue"];
pub const VALID_STATUSES: [&str; 2] = ["high", "low"];

pub const INVALID_COLOR: &str = "Not a valid color.";
pub const INVALID_STATUS: &str = "Not a valid status.";

/// Result status the endpoint uses for commands it did not apply.
pub const SKIPPED: &str = "skipped";

// ---------------------------------------------------------------------------
// LedCommand
// ---------------------------------------------------------------------------

/// One LED command.  Color and status are free-form so that values coming
/// from a model can be checked and reported rather than rejected at parse
/// time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedCommand {
    pub timestamp: String,
    pub color: String,
    pub status: String,
}

impl LedCommand {
    /// Build a command stamped with the local time.  Color and status are
    /// lowercased.
    pub fn new(color: &str, status: &str) -> Self {
        Self {
            timestamp: chrono::Local::now().format(TIMESTAMP_FORMAT).to_string(),
            color: color.trim().to_lowercase(),
            status: status.trim().to_lowercase(),
        }
    }

    /// Check color then status; the error is the per-item skip message.
    pub fn validate(&self) -> Result<(), &'static str> {
        if !VALID_COLORS.contains(&self.color.as_str()) {
            return Err(INVALID_COLOR);
        }
        if !VALID_STATUSES.contains(&self.status.as_str()) {
            return Err(INVALID_STATUS);
        }
        Ok(())
    }

    pub(crate) fn skipped(&self, message: &str) -> LedResult {
        LedResult {
            color: self.color.clone(),
            status: SKIPPED.into(),
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// LedResult / LedResponse
// ---------------------------------------------------------------------------

/// Per-command outcome.  `status` is `"ON"` / `"OFF"` when applied and
/// `"skipped"` otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedResult {
    pub color: String,
    pub status: String,
    pub message: String,
}

impl LedResult {
    pub fn is_skipped(&self) -> bool {
        self.status == SKIPPED
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedResponse {
    pub status: String,
    #[serde(default)]
    pub results: Vec<LedResult>,
}

impl LedResponse {
    pub fn completed(results: Vec<LedResult>) -> Self {
        Self {
            status: "completed".into(),
            results,
        }
    }
}
