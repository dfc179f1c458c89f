//! Chromium DevTools commands sent through the WebDriver `goog/cdp/execute`
//! extension endpoint.
use anyhow::{anyhow, Result};
use fantoccini::wd::WebDriverCompatibleCommand;
use serde_json::{json, Value};
use std::fmt;
use std::time::Duration;

/// CDP method exposed by scraping-browser backends that solve challenges.
pub const WAIT_FOR_SOLVE: &str = "Captcha.waitForSolve";

/// A single CDP method invocation.
#[derive(Debug, Clone)]
pub struct CdpCommand {
    cmd: String,
    params: Value,
}

impl CdpCommand {
    pub fn new(cmd: impl Into<String>, params: Value) -> Self {
        Self {
            cmd: cmd.into(),
            params,
        }
    }

    /// Ask the backend to detect and solve a challenge on the current page.
    ///
    /// `detect_timeout` bounds how long the backend looks for a challenge
    /// before reporting [`ChallengeStatus::NotDetected`].
    pub fn wait_for_challenge(detect_timeout: Duration) -> Self {
        let millis = u64::try_from(detect_timeout.as_millis()).unwrap_or(u64::MAX);
        Self::new(WAIT_FOR_SOLVE, json!({ "detectTimeout": millis }))
    }

    pub fn name(&self) -> &str {
        &self.cmd
    }

    fn body(&self) -> Value {
        json!({ "cmd": self.cmd, "params": self.params })
    }
}

impl WebDriverCompatibleCommand for CdpCommand {
    fn endpoint(
        &self,
        base_url: &url::Url,
        session_id: Option<&str>,
    ) -> Result<url::Url, url::ParseError> {
        // Session-less dispatch is rejected by the server, not here.
        base_url.join(&format!(
            "session/{}/goog/cdp/execute",
            session_id.unwrap_or_default()
        ))
    }

    fn method_and_body(&self, _request_url: &url::Url) -> (http::Method, Option<String>) {
        (http::Method::POST, Some(self.body().to_string()))
    }
}

/// Outcome reported by a challenge wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChallengeStatus {
    /// No challenge appeared within the detect timeout.
    NotDetected,
    /// A challenge appeared and was solved.
    Solved,
    /// A challenge appeared and could not be solved.
    Failed,
    /// Anything the backend reports that we do not recognise.
    Other(String),
}

impl ChallengeStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "not_detected" => Self::NotDetected,
            "solve_finished" => Self::Solved,
            "solve_failed" => Self::Failed,
            other => Self::Other(other.to_string()),
        }
    }

    /// Read the status out of a command response.
    ///
    /// Accepts both the unwrapped `{"status": ..}` shape and the full
    /// `{"value": {"status": ..}}` envelope.
    pub fn from_response(value: &Value) -> Result<Self> {
        value
            .get("status")
            .or_else(|| value.get("value").and_then(|v| v.get("status")))
            .and_then(Value::as_str)
            .map(Self::parse)
            .ok_or_else(|| anyhow!("challenge response carried no status: {value}"))
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::NotDetected => "not_detected",
            Self::Solved => "solve_finished",
            Self::Failed => "solve_failed",
            Self::Other(raw) => raw,
        }
    }
}

impl fmt::Display for ChallengeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
