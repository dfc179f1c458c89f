use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use gleaner_common::{BrowserConfig, FetchError, ProgressEvent, ProgressSink};
use gleaner_drivers::remote::cdp::ChallengeStatus;
use gleaner_drivers::remote::driver::RemoteDriver;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

/// Rendered HTML of one fetched page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDocument {
    url: String,
    html: String,
}

impl RawDocument {
    pub fn new(url: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            html: html.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn as_str(&self) -> &str {
        &self.html
    }

    /// blake3 digest of the HTML, hex encoded.
    pub fn checksum(&self) -> String {
        blake3::hash(self.html.as_bytes()).to_hex().to_string()
    }
}

/// One exclusive browser session.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<()>;
    async fn wait_for_challenge(&self, detect_timeout: Duration) -> Result<ChallengeStatus>;
    async fn page_source(&self) -> Result<String>;
    async fn close(&self) -> Result<()>;
}

/// Opens a fresh [`BrowserSession`] per fetch.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(&self) -> Result<Box<dyn BrowserSession>>;
}

#[async_trait]
impl BrowserSession for RemoteDriver {
    async fn navigate(&self, url: &str) -> Result<()> {
        self.goto(url).await
    }

    async fn wait_for_challenge(&self, detect_timeout: Duration) -> Result<ChallengeStatus> {
        RemoteDriver::wait_for_challenge(self, detect_timeout).await
    }

    async fn page_source(&self) -> Result<String> {
        RemoteDriver::page_source(self).await
    }

    async fn close(&self) -> Result<()> {
        RemoteDriver::close(self).await
    }
}

/// Connects to the WebDriver endpoint named in [`BrowserConfig`].
pub struct RemoteSessionFactory {
    config: BrowserConfig,
}

impl RemoteSessionFactory {
    pub fn new(config: BrowserConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl SessionFactory for RemoteSessionFactory {
    async fn open(&self) -> Result<Box<dyn BrowserSession>> {
        let driver = RemoteDriver::connect(&self.config).await?;
        Ok(Box::new(driver))
    }
}

/// Fetches rendered pages through a remote browser, waiting out any
/// anti-automation challenge on the way.
pub struct WebFetcher {
    factory: Arc<dyn SessionFactory>,
    config: BrowserConfig,
}

impl WebFetcher {
    /// Fetcher backed by the remote endpoint in `config`.
    ///
    /// Fails with a configuration error when no endpoint is set.
    pub fn new(config: BrowserConfig) -> gleaner_common::Result<Self> {
        config.require_endpoint()?;
        let factory = Arc::new(RemoteSessionFactory::new(config.clone()));
        Ok(Self { factory, config })
    }

    pub fn with_factory(factory: Arc<dyn SessionFactory>, config: BrowserConfig) -> Self {
        Self { factory, config }
    }

    /// Fetch `url` and return its rendered HTML.
    ///
    /// `url` is handed to the browser as is; the session decides what it
    /// accepts. The session is closed on every path. A close failure after
    /// a successful read is only logged.
    pub async fn fetch(
        &self,
        url: &str,
        progress: &dyn ProgressSink,
    ) -> Result<RawDocument, FetchError> {
        let fetch_id = Uuid::new_v4();
        let span = info_span!(target: "gleaner.fetch", "fetch", %fetch_id, %url);

        async move {
            let session = self.factory.open().await.map_err(FetchError::Connect)?;
            let outcome = self.drive(session.as_ref(), url, progress).await;
            let closed = session.close().await;

            match (outcome, closed) {
                (Ok(html), closed) => {
                    if let Err(e) = closed {
                        warn!(target: "gleaner.fetch", error = %e, "session close failed");
                    }
                    let doc = RawDocument::new(url, html);
                    info!(
                        target: "gleaner.fetch",
                        bytes = doc.as_str().len(),
                        checksum = %doc.checksum(),
                        "page fetched"
                    );
                    Ok(doc)
                }
                (Err(e), closed) => {
                    if let Err(close_err) = closed {
                        warn!(target: "gleaner.fetch", error = %close_err, "session close failed");
                    }
                    warn!(target: "gleaner.fetch", error = %e, "fetch failed");
                    Err(e)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn drive(
        &self,
        session: &dyn BrowserSession,
        url: &str,
        progress: &dyn ProgressSink,
    ) -> Result<String, FetchError> {
        session
            .navigate(url)
            .await
            .map_err(|source| FetchError::Navigate {
                url: url.to_string(),
                source,
            })?;
        debug!(target: "gleaner.fetch", "navigated");

        if self.config.solve_challenges {
            self.await_challenge(session, progress).await?;
        }

        session.page_source().await.map_err(FetchError::PageSource)
    }

    async fn await_challenge(
        &self,
        session: &dyn BrowserSession,
        progress: &dyn ProgressSink,
    ) -> Result<(), FetchError> {
        progress.emit(ProgressEvent::ChallengeWait);

        let deadline = self.config.challenge_deadline();
        let status = tokio::time::timeout(
            deadline,
            session.wait_for_challenge(self.config.challenge_detect_timeout()),
        )
        .await
        .map_err(|_| FetchError::ChallengeTimeout(deadline))?
        .map_err(FetchError::Challenge)?;

        progress.emit(ProgressEvent::ChallengeStatus(status.to_string()));
        info!(target: "gleaner.fetch", status = %status, "challenge wait finished");

        match &status {
            ChallengeStatus::Failed => Err(FetchError::ChallengeFailed(status.to_string())),
            ChallengeStatus::Other(raw) => {
                warn!(target: "gleaner.fetch", status = %raw, "unrecognised challenge status");
                Ok(())
            }
            ChallengeStatus::NotDetected | ChallengeStatus::Solved => Ok(()),
        }
    }
}
