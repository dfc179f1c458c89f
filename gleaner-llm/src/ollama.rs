use crate::traits::{LlmClient, LlmResponse};
use async_trait::async_trait;
use gleaner_common::ModelError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const OLLAMA_CONNECTION_ERROR: &str = "No running Ollama server detected. Start it with: `ollama serve` (after installing). Install instructions: https://github.com/ollama/ollama";
const ERROR_BODY_LIMIT: usize = 512;

/// Ollama client for local model inference.
///
/// Expects a running Ollama server (see https://github.com/ollama/ollama).
pub struct OllamaClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

#[derive(Debug, Default, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Debug, Deserialize)]
struct ModelTag {
    name: String,
}

#[derive(Debug, Serialize)]
struct PullRequest<'a> {
    model: &'a str,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Default, Serialize)]
struct GenerateOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    eval_count: Option<u32>,
}

impl OllamaClient {
    /// Create a new client, verify the server, and pull the model if missing.
    pub async fn new(base_url: String, model: String) -> Result<Self, ModelError> {
        Self::connect(base_url, model, true).await
    }

    /// Create a new client and verify server/model availability.
    ///
    /// With `pull_missing` off, a model the server does not have is an error
    /// instead of a download.
    pub async fn connect(
        base_url: String,
        model: String,
        pull_missing: bool,
    ) -> Result<Self, ModelError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ModelError::Config(format!("Failed to create HTTP client: {e}")))?;

        let ollama_client = Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
        };

        ollama_client.check_server().await?;

        if pull_missing {
            ollama_client.ensure_model_available().await?;
        } else if !ollama_client.has_model().await? {
            return Err(ModelError::ModelNotAvailable(ollama_client.model.clone()));
        }

        Ok(ollama_client)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn check_server(&self) -> Result<(), ModelError> {
        let resp = self
            .client
            .get(self.url("api/tags"))
            .send()
            .await
            .map_err(|_| ModelError::Unavailable(OLLAMA_CONNECTION_ERROR.to_string()))?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(ModelError::Unavailable(OLLAMA_CONNECTION_ERROR.to_string()))
        }
    }

    async fn has_model(&self) -> Result<bool, ModelError> {
        let models = self.fetch_available_models().await?;
        Ok(models.iter().any(|name| model_matches(name, &self.model)))
    }

    async fn ensure_model_available(&self) -> Result<(), ModelError> {
        if !self.has_model().await? {
            tracing::info!(target: "gleaner.llm", model = %self.model, "model not found locally, pulling");
            self.pull_model().await?;
        }
        Ok(())
    }

    async fn fetch_available_models(&self) -> Result<Vec<String>, ModelError> {
        let resp = self
            .client
            .get(self.url("api/tags"))
            .send()
            .await
            .map_err(|e| ModelError::Network(format!("Failed to fetch models: {e}")))?;

        if !resp.status().is_success() {
            return Ok(Vec::new());
        }

        let tags: TagsResponse = resp
            .json()
            .await
            .map_err(|e| ModelError::Decode(format!("Failed to parse models response: {e}")))?;

        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    async fn pull_model(&self) -> Result<(), ModelError> {
        let resp = self
            .client
            .post(self.url("api/pull"))
            .json(&PullRequest {
                model: &self.model,
                stream: false,
            })
            .send()
            .await
            .map_err(|e| ModelError::Network(format!("Failed to pull model: {e}")))?;

        if resp.status().is_success() {
            tracing::info!(target: "gleaner.llm", model = %self.model, "pulled model");
            Ok(())
        } else {
            Err(api_error(resp).await)
        }
    }
}

/// Ollama reports untagged pulls as `<name>:latest`.
fn model_matches(available: &str, wanted: &str) -> bool {
    available == wanted
        || available.strip_suffix(":latest") == Some(wanted)
        || wanted.strip_suffix(":latest") == Some(available)
}

async fn api_error(resp: reqwest::Response) -> ModelError {
    let status = resp.status().as_u16();
    let mut body = resp.text().await.unwrap_or_default();
    if body.len() > ERROR_BODY_LIMIT {
        let cut = (0..=ERROR_BODY_LIMIT)
            .rev()
            .find(|i| body.is_char_boundary(*i))
            .unwrap_or(0);
        body.truncate(cut);
    }
    ModelError::Api { status, body }
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn generate(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        max_tokens: Option<u32>,
        temperature: Option<f32>,
    ) -> Result<LlmResponse, ModelError> {
        let payload = GenerateRequest {
            model: &self.model,
            prompt,
            system: system_prompt,
            stream: false,
            options: GenerateOptions {
                temperature,
                num_predict: max_tokens,
            },
        };

        tracing::debug!(
            target: "gleaner.llm",
            model = %self.model,
            prompt_chars = prompt.chars().count(),
            "generate request"
        );

        let resp = self
            .client
            .post(self.url("api/generate"))
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    ModelError::Unavailable(OLLAMA_CONNECTION_ERROR.to_string())
                } else {
                    ModelError::Network(format!("Generate request failed: {e}"))
                }
            })?;

        if !resp.status().is_success() {
            return Err(api_error(resp).await);
        }

        let body: GenerateResponse = resp
            .json()
            .await
            .map_err(|e| ModelError::Decode(format!("Failed to parse response: {e}")))?;

        Ok(LlmResponse {
            text: body.response,
            model: Some(body.model.unwrap_or_else(|| self.model.clone())),
            tokens_used: body.eval_count,
        })
    }

    async fn health_check(&self) -> Result<bool, ModelError> {
        Ok(self.check_server().await.is_ok())
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latest_tag_is_implied() {
        assert!(model_matches("llama3:latest", "llama3"));
        assert!(model_matches("llama3", "llama3:latest"));
        assert!(model_matches("llama3:8b", "llama3:8b"));
        assert!(!model_matches("llama3:8b", "llama3"));
        assert!(!model_matches("llama3.2:latest", "llama3"));
    }

    #[test]
    fn generate_payload_omits_unset_options() {
        let payload = GenerateRequest {
            model: "llama3",
            prompt: "hi",
            system: None,
            stream: false,
            options: GenerateOptions::default(),
        };
        let v = serde_json::to_value(&payload).unwrap();
        assert_eq!(
            v,
            serde_json::json!({ "model": "llama3", "prompt": "hi", "stream": false, "options": {} })
        );
    }
}
