//! Loader for Gleaner configuration with YAML + environment overlays.
//!
//! Precedence, lowest first: section defaults, configuration files in the
//! order they were added, then `GLEANER__`-prefixed environment variables
//! (`__` separates nesting levels, so `GLEANER__BROWSER__ENDPOINT` sets
//! `browser.endpoint`). String values may reference other variables as
//! `${VAR}` or `$VAR`; expansion runs after merging.
use config::{Config, ConfigError, Environment, File, FileFormat};
use gleaner_common::GleanerConfig;
use serde_json::Value;
use std::path::{Path, PathBuf};

pub use gleaner_common::{BrowserConfig, ExtractionConfig, LlmConfig, LoggingConfig};

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;
const DEFAULT_ENV_PREFIX: &str = "GLEANER";
/// File name looked up by [`GleanerConfigLoader::with_default_locations`].
pub const CONFIG_FILE_NAME: &str = "gleaner.yaml";

fn expand_env_in_value(v: &mut Value) {
    match v {
        Value::String(s) => {
            if s.contains('$') {
                let mut cur = std::mem::take(s);
                for _ in 0..MAXIMUM_ENV_EXPANSION_DEPTH {
                    let expanded = match shellexpand::env(&cur) {
                        Ok(cow) => cow.into_owned(),
                        Err(_) => cur.clone(),
                    };
                    if expanded == cur {
                        break;
                    }
                    cur = expanded;
                }
                *s = cur;
            }
        }
        Value::Array(arr) => arr.iter_mut().for_each(expand_env_in_value),
        Value::Object(obj) => obj.values_mut().for_each(expand_env_in_value),
        _ => {}
    }
}

/// Candidate configuration files, lowest precedence first.
pub fn default_config_paths() -> Vec<PathBuf> {
    let mut paths = Vec::with_capacity(2);
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("gleaner").join(CONFIG_FILE_NAME));
    }
    paths.push(PathBuf::from(CONFIG_FILE_NAME));
    paths
}

/// Builder hiding the `config` crate wiring (files + env overrides).
pub struct GleanerConfigLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
    env_prefix: String,
}

impl Default for GleanerConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl GleanerConfigLoader {
    /// Start with defaults and `GLEANER__` environment overrides.
    ///
    /// ```
    /// use gleaner_config::GleanerConfigLoader;
    ///
    /// let config = GleanerConfigLoader::new()
    ///     .with_yaml_str("extraction:\n  max_segment_length: 1200")
    ///     .load()
    ///     .expect("valid config");
    ///
    /// assert_eq!(config.extraction.max_segment_length, 1200);
    /// assert_eq!(config.browser.challenge_detect_timeout_ms, 10_000);
    /// ```
    pub fn new() -> Self {
        Self {
            builder: Config::builder(),
            env_prefix: DEFAULT_ENV_PREFIX.to_string(),
        }
    }

    /// Use a different environment prefix (tests, embedding applications).
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = prefix.to_string();
        self
    }

    /// Attach a YAML/TOML/JSON file that must exist; the format is inferred
    /// from the suffix.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(true));
        self
    }

    /// Attach a file that is skipped when absent.
    pub fn with_optional_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(false));
        self
    }

    /// Attach every path from [`default_config_paths`] as optional.
    pub fn with_default_locations(self) -> Self {
        default_config_paths()
            .into_iter()
            .fold(self, |loader, path| loader.with_optional_file(path))
    }

    /// Merge an inline YAML snippet.
    ///
    /// ```
    /// use gleaner_config::{GleanerConfigLoader, LlmConfig};
    ///
    /// let cfg = GleanerConfigLoader::new()
    ///     .with_yaml_str(
    ///         r#"
    /// llm:
    ///   provider: ollama
    ///   model: mistral
    /// "#,
    ///     )
    ///     .load()
    ///     .unwrap();
    ///
    /// assert!(matches!(cfg.llm, LlmConfig::Ollama { ref model, .. } if model == "mistral"));
    /// ```
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.builder = self
            .builder
            .add_source(File::from_str(yaml, FileFormat::Yaml));
        self
    }

    /// Consume the builder and deserialize the merged sources.
    ///
    /// ```
    /// use gleaner_config::GleanerConfigLoader;
    ///
    /// unsafe { std::env::set_var("DOCTEST_SBR_WEBDRIVER", "https://user:pw@browser.example:9515"); }
    ///
    /// let config = GleanerConfigLoader::new()
    ///     .with_yaml_str(r#"
    /// browser:
    ///   endpoint: "${DOCTEST_SBR_WEBDRIVER}"
    ///   challenge_detect_timeout_ms: 5000
    /// "#)
    ///     .load()
    ///     .expect("valid configuration");
    ///
    /// assert_eq!(
    ///     config.browser.endpoint.as_deref(),
    ///     Some("https://user:pw@browser.example:9515")
    /// );
    /// assert_eq!(config.browser.challenge_detect_timeout_ms, 5000);
    ///
    /// unsafe { std::env::remove_var("DOCTEST_SBR_WEBDRIVER"); }
    /// ```
    pub fn load(self) -> Result<GleanerConfig, ConfigError> {
        let cfg = self
            .builder
            .add_source(
                Environment::with_prefix(&self.env_prefix)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut v: Value = cfg.try_deserialize()?;
        expand_env_in_value(&mut v);

        serde_json::from_value(v).map_err(|e| ConfigError::Message(e.to_string()))
    }
}
