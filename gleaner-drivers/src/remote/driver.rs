use crate::remote::cdp::{CdpCommand, ChallengeStatus};
use anyhow::{Context, Result};
use fantoccini::{Client, ClientBuilder};
use gleaner_common::BrowserConfig;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;
use webdriver::capabilities::Capabilities;

/// Thin wrapper around a `fantoccini` WebDriver client holding one remote
/// browser session.
pub struct RemoteDriver {
    client: Client,
    endpoint: Url,
}

impl RemoteDriver {
    /// Open a new session against `config.endpoint`.
    pub async fn connect(config: &BrowserConfig) -> Result<Self> {
        let endpoint = Url::parse(config.require_endpoint()?)
            .context("browser endpoint is not a valid URL")?;

        let client = ClientBuilder::native()
            .capabilities(chrome_capabilities(config.headless))
            .connect(endpoint.as_str())
            .await
            .with_context(|| format!("WebDriver handshake with {} failed", redacted(&endpoint)))?;

        info!(
            target: "gleaner.browser",
            endpoint = %redacted(&endpoint),
            "remote browser session opened"
        );
        Ok(Self { client, endpoint })
    }

    /// Navigate the session to `url`.
    pub async fn goto(&self, url: &str) -> Result<()> {
        self.client.goto(url).await?;
        debug!(target: "gleaner.browser", %url, "navigation complete");
        Ok(())
    }

    /// Run a CDP command and return its `value` payload.
    pub async fn execute_cdp(&self, command: CdpCommand) -> Result<Value> {
        let name = command.name().to_string();
        self.client
            .issue_cmd(command)
            .await
            .with_context(|| format!("CDP command {name} failed"))
    }

    /// Block until the backend resolves (or fails to detect) a challenge.
    pub async fn wait_for_challenge(&self, detect_timeout: Duration) -> Result<ChallengeStatus> {
        let response = self
            .execute_cdp(CdpCommand::wait_for_challenge(detect_timeout))
            .await?;
        ChallengeStatus::from_response(&response)
    }

    /// Return the full rendered page HTML.
    pub async fn page_source(&self) -> Result<String> {
        self.client.source().await.map_err(anyhow::Error::from)
    }

    /// End the WebDriver session.
    pub async fn close(&self) -> Result<()> {
        self.client.clone().close().await?;
        debug!(
            target: "gleaner.browser",
            endpoint = %redacted(&self.endpoint),
            "remote browser session closed"
        );
        Ok(())
    }
}

/// Chrome capabilities for a remote session.
pub fn chrome_capabilities(headless: bool) -> Capabilities {
    let mut args: Vec<&str> = Vec::new();
    if headless {
        args.push("--headless");
        args.push("--disable-gpu");
    }

    let mut caps = Capabilities::new();
    caps.insert("browserName".to_string(), json!("chrome"));
    caps.insert("goog:chromeOptions".to_string(), json!({ "args": args }));
    caps
}

/// Render an endpoint for logs with any credentials stripped.
pub fn redacted(endpoint: &Url) -> String {
    let mut url = endpoint.clone();
    if !url.username().is_empty() || url.password().is_some() {
        let _ = url.set_username("redacted");
        let _ = url.set_password(None);
    }
    url.to_string()
}
