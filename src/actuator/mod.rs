//! HTTP client for the remote LED actuator.
//!
//! [`ActuatorClient`] is synchronous (`reqwest::blocking`) with a bounded
//! timeout.  It is called from the turn worker thread while the reasoning
//! stage executes a `control_led` tool call; it never retries.
//!
//! ```rust,no_run
//! use ptt_agent::actuator::ActuatorClient;
//! use ptt_agent::config::ActuatorConfig;
//!
//! let client = ActuatorClient::from_config(&ActuatorConfig::default());
//! match client.control_led("red", "high") {
//!     Ok(text) => println!("{text}"),
//!     Err(failure) => eprintln!("{failure}"),
//! }
//! ```

pub mod protocol;

use std::time::Duration;

use thiserror::Error;

use crate::config::ActuatorConfig;

pub use protocol::{LedCommand, LedResponse, LedResult};

// ---------------------------------------------------------------------------
// ActuatorError
// ---------------------------------------------------------------------------

/// Errors from the LED endpoint.
#[derive(Debug, Error)]
pub enum ActuatorError {
    /// The request did not complete within the configured timeout.
    #[error("LED request timed out")]
    Timeout,

    /// Connection refused, DNS failure, reset.
    #[error("LED request failed: {0}")]
    Transport(String),

    /// The endpoint answered with a non-2xx status.
    #[error("LED endpoint returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The body was not the expected JSON.
    #[error("failed to parse LED response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for ActuatorError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ActuatorError::Timeout
        } else if e.is_decode() {
            ActuatorError::Decode(e.to_string())
        } else {
            ActuatorError::Transport(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// ActuatorClient
// ---------------------------------------------------------------------------

pub struct ActuatorClient {
    client: reqwest::blocking::Client,
    url: String,
}

impl ActuatorClient {
    /// Build a client for `config.url` with `config.timeout_ms` as the
    /// per-request timeout.
    ///
    /// Must not be called from inside an async runtime: the blocking client
    /// owns its own runtime.
    pub fn from_config(config: &ActuatorConfig) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .unwrap_or_else(|_| reqwest::blocking::Client::new());

        Self {
            client,
            url: config.url.clone(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// POST `commands` and return one result per command, in order.
    ///
    /// Invalid commands are answered locally with a `skipped` result and are
    /// not sent.  When nothing valid remains no request is made.
    pub fn send(&self, commands: &[LedCommand]) -> Result<LedResponse, ActuatorError> {
        let valid: Vec<&LedCommand> = commands.iter().filter(|c| c.validate().is_ok()).collect();

        let remote = if valid.is_empty() {
            Vec::new()
        } else {
            log::debug!("actuator: POST {} ({} commands)", self.url, valid.len());
            let response = self.client.post(&self.url).json(&valid).send()?;
            let status = response.status();
            if !status.is_success() {
                let body = response.text().unwrap_or_default();
                return Err(ActuatorError::Status {
                    status: status.as_u16(),
                    body,
                });
            }
            response.json::<LedResponse>()?.results
        };

        Ok(LedResponse::completed(merge_results(commands, remote)))
    }

    /// Tool-facing wrapper: set one LED and describe the outcome as text.
    ///
    /// Local skips are `Ok` with the reason.  Transport failures, timeouts
    /// and non-2xx answers collapse into a single
    /// `"ERROR: Could not control the LED. Details: ..."` string.
    pub fn control_led(&self, color: &str, status: &str) -> Result<String, String> {
        let command = LedCommand::new(color, status);
        match self.send(std::slice::from_ref(&command)) {
            Ok(response) => match response.results.first() {
                Some(result) if result.is_skipped() => Ok(format!(
                    "LED '{}' was not changed: {}",
                    command.color, result.message
                )),
                _ => Ok(format!(
                    "LED '{}' set to '{}' successfully.",
                    command.color, command.status
                )),
            },
            Err(e) => {
                log::warn!("actuator: control_led({color}, {status}) failed: {e}");
                Err(format!("ERROR: Could not control the LED. Details: {e}"))
            }
        }
    }

    /// GET the endpoint, which runs the device's blink test sequence.
    pub fn diagnose(&self) -> Result<String, ActuatorError> {
        let response = self.client.get(&self.url).send()?;
        let status = response.status();
        let body = response.text()?;
        if !status.is_success() {
            return Err(ActuatorError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }
}

/// Interleave local skip results with the endpoint's results for the
/// commands that were sent.
fn merge_results(commands: &[LedCommand], remote: Vec<LedResult>) -> Vec<LedResult> {
    let mut remote = remote.into_iter();
    let mut merged: Vec<LedResult> = commands
        .iter()
        .filter_map(|cmd| match cmd.validate() {
            Err(reason) => Some(cmd.skipped(reason)),
            Ok(()) => remote.next(),
        })
        .collect();
    merged.extend(remote);
    merged
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn cmd(color: &str, status: &str) -> LedCommand {
        LedCommand::new(color, status)
    }

    fn applied(color: &str, status: &str) -> LedResult {
        LedResult {
            color: color.into(),
            status: status.into(),
            message: "Success".into(),
        }
    }

    #[test]
    fn merge_keeps_request_order() {
        let commands = [cmd("red", "high"), cmd("green", "high"), cmd("blue", "low")];
        let merged = merge_results(
            &commands,
            vec![applied("red", "ON"), applied("blue", "OFF")],
        );

        assert_eq!(merged.len(), 3);
        assert_eq!(merged[0].status, "ON");
        assert_eq!(merged[1].color, "green");
        assert_eq!(merged[1].status, "skipped");
        assert_eq!(merged[1].message, "Not a valid color.");
        assert_eq!(merged[2].status, "OFF");
    }

    #[test]
    fn all_invalid_sends_nothing() {
        // Port 9 (discard) on localhost: any attempted request would fail.
        let client = ActuatorClient::from_config(&ActuatorConfig {
            url: "http://127.0.0.1:9/led".into(),
            timeout_ms: 200,
        });
        let response = client
            .send(&[cmd("green", "high"), cmd("red", "blink")])
            .expect("no request is made");

        assert_eq!(response.status, "completed");
        assert_eq!(response.results[0].message, "Not a valid color.");
        assert_eq!(response.results[1].message, "Not a valid status.");
    }

    #[test]
    fn control_led_reports_transport_failure_as_text() {
        let client = ActuatorClient::from_config(&ActuatorConfig {
            url: "http://127.0.0.1:9/led".into(),
            timeout_ms: 200,
        });
        let failure = client.control_led("red", "high").unwrap_err();
        assert!(failure.starts_with("ERROR: Could not control the LED. Details: "));
    }

    #[test]
    fn control_led_reports_local_skip() {
        let client = ActuatorClient::from_config(&ActuatorConfig::default());
        let text = client.control_led("purple", "high").unwrap();
        assert_eq!(text, "LED 'purple' was not changed: Not a valid color.");
    }

    #[test]
    fn timeout_error_message() {
        assert_eq!(ActuatorError::Timeout.to_string(), "LED request timed out");
    }
}
