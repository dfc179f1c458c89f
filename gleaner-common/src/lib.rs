//! Common types and utilities shared across Gleaner crates.
//!
//! This crate defines the settings model, the error taxonomy, the progress
//! sink, and observability helpers used throughout the Gleaner workspace. It
//! stays dependency-light so every crate can depend on it.
//!
//! # Overview
//!
//! - [`GleanerConfig`]: top-level settings, deserialized by `gleaner-config`
//! - [`BrowserConfig`], [`LlmConfig`], [`ExtractionConfig`], [`LoggingConfig`]
//! - [`error`]: per-stage error kinds and the [`GleanerError`] umbrella
//! - [`progress`]: the observer used to surface human-readable status notices
//! - [`observability`]: centralised tracing/logging initialisation
//!
//! # Examples
//!
//! ```rust
//! use gleaner_common::{GleanerConfig, LlmConfig};
//!
//! let cfg = GleanerConfig::default();
//! assert_eq!(cfg.extraction.max_segment_length, 6000);
//! assert!(matches!(cfg.llm, LlmConfig::Ollama { ref model, .. } if model == "llama3"));
//! assert!(cfg.browser.endpoint.is_none());
//! ```
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub mod error;
pub mod observability;
pub mod progress;

pub use error::{ChunkError, FetchError, GleanerError, ModelError, NormalizeError, Result};
pub use observability::LogFormat;
pub use progress::{ProgressEvent, ProgressSink};

/// Default model requested from Ollama.
pub const DEFAULT_OLLAMA_MODEL: &str = "llama3";
/// Default Ollama server address.
pub const DEFAULT_OLLAMA_ENDPOINT: &str = "http://localhost:11434";
/// Default upper bound on segment length, in characters.
pub const DEFAULT_MAX_SEGMENT_LENGTH: usize = 6000;

/// Request template applied to every segment.
///
/// `{dom_content}` receives the segment text and `{parse_description}` the
/// caller's extraction instruction.
pub const DEFAULT_EXTRACTION_TEMPLATE: &str = concat!(
    "You are tasked with extracting specific information from the following text content: {dom_content}. ",
    "Please follow these instructions carefully: \n\n",
    "1. **Extract Information:** Only extract the information that directly matches the provided description: {parse_description}. ",
    "2. **No Extra Content:** Do not include any additional text, comments, or explanations in your response. ",
    "3. **Empty Response:** If no information matches the description, return an empty string ('').",
    "4. **Direct Data Only:** Your output should contain only the data that is explicitly requested, with no other text."
);

/// Remote browser session settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// WebDriver endpoint of the remote browser. There is no built-in default.
    pub endpoint: Option<String>,
    /// How long the backend should look for a challenge before reporting
    /// `not_detected`. Sent as `detectTimeout`.
    pub challenge_detect_timeout_ms: u64,
    /// Local wall-clock cap on the whole challenge wait.
    pub challenge_deadline_secs: u64,
    /// Issue the challenge wait at all. Plain chromedriver endpoints have no
    /// `Captcha` domain and need this off.
    pub solve_challenges: bool,
    /// Launch the browser without a window (local endpoints only).
    pub headless: bool,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            challenge_detect_timeout_ms: 10_000,
            challenge_deadline_secs: 60,
            solve_challenges: true,
            headless: false,
        }
    }
}

impl BrowserConfig {
    pub fn challenge_detect_timeout(&self) -> Duration {
        Duration::from_millis(self.challenge_detect_timeout_ms)
    }

    pub fn challenge_deadline(&self) -> Duration {
        Duration::from_secs(self.challenge_deadline_secs)
    }

    /// Return the configured endpoint or a configuration error.
    ///
    /// ```
    /// use gleaner_common::BrowserConfig;
    ///
    /// let mut cfg = BrowserConfig::default();
    /// assert!(cfg.require_endpoint().is_err());
    ///
    /// cfg.endpoint = Some("http://localhost:9515".into());
    /// assert_eq!(cfg.require_endpoint().unwrap(), "http://localhost:9515");
    /// ```
    pub fn require_endpoint(&self) -> Result<&str> {
        match self.endpoint.as_deref().map(str::trim) {
            Some(endpoint) if !endpoint.is_empty() => Ok(endpoint),
            _ => Err(GleanerError::Config(
                "browser.endpoint is not set (try GLEANER__BROWSER__ENDPOINT)".to_string(),
            )),
        }
    }
}

/// Configuration for the text-generation provider.
///
/// The `provider` tag selects the variant; see the `gleaner-llm` crate for
/// the concrete clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "lowercase")]
pub enum LlmConfig {
    Ollama {
        #[serde(default = "default_ollama_model")]
        model: String,
        #[serde(default = "default_ollama_endpoint")]
        endpoint: String,
        /// Pull the model on startup when the server does not have it.
        #[serde(default = "default_true")]
        pull_missing: bool,
    },
    None,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self::Ollama {
            model: default_ollama_model(),
            endpoint: default_ollama_endpoint(),
            pull_missing: true,
        }
    }
}

fn default_ollama_model() -> String {
    DEFAULT_OLLAMA_MODEL.into()
}
fn default_ollama_endpoint() -> String {
    DEFAULT_OLLAMA_ENDPOINT.into()
}
fn default_true() -> bool {
    true
}

/// Settings handed to the extraction orchestrator at construction time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Upper bound on segment length, in characters.
    pub max_segment_length: usize,
    /// Request template; must contain `{dom_content}` and `{parse_description}`.
    pub template: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            max_segment_length: DEFAULT_MAX_SEGMENT_LENGTH,
            template: DEFAULT_EXTRACTION_TEMPLATE.to_string(),
            temperature: None,
            max_tokens: None,
        }
    }
}

/// Logging settings as they appear in configuration files.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: LogFormat,
    pub emit_stderr: bool,
    /// Filter applied when `RUST_LOG` is unset.
    pub filter: String,
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Text,
            emit_stderr: false,
            filter: "info".to_string(),
            dir: None,
        }
    }
}

/// Top-level configuration for Gleaner.
///
/// Every section falls back to its defaults, so an empty document is valid.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GleanerConfig {
    pub browser: BrowserConfig,
    pub llm: LlmConfig,
    pub extraction: ExtractionConfig,
    pub logging: LoggingConfig,
}
