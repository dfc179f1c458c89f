use std::sync::Arc;

use gleaner_common::{ExtractionConfig, GleanerConfig, LlmConfig, ProgressSink, Result};
use gleaner_llm::build_llm_client;
use gleaner_llm::traits::LlmClient;
use tokio::sync::OnceCell;

use crate::chunk::split;
use crate::fetch::WebFetcher;
use crate::normalize::{CleanedText, normalize};
use crate::orchestrate::{ExtractionOrchestrator, ExtractionResult, PromptTemplate};

/// Scrape a page once, then run any number of extractions over its text.
///
/// The model client is built on the first [`Gleaner::parse`], so scraping
/// never touches the model server.
pub struct Gleaner {
    fetcher: WebFetcher,
    llm: LlmConfig,
    extraction: ExtractionConfig,
    orchestrator: OnceCell<ExtractionOrchestrator>,
}

impl Gleaner {
    pub fn new(fetcher: WebFetcher, orchestrator: ExtractionOrchestrator) -> Self {
        Self {
            fetcher,
            llm: LlmConfig::None,
            extraction: orchestrator.config().clone(),
            orchestrator: OnceCell::from(orchestrator),
        }
    }

    /// Build the remote fetcher and check the extraction template. The
    /// configured model client is connected lazily.
    pub fn from_config(config: &GleanerConfig) -> Result<Self> {
        let fetcher = WebFetcher::new(config.browser.clone())?;
        PromptTemplate::new(config.extraction.template.clone())?;
        Ok(Self {
            fetcher,
            llm: config.llm.clone(),
            extraction: config.extraction.clone(),
            orchestrator: OnceCell::new(),
        })
    }

    pub fn with_client(
        fetcher: WebFetcher,
        client: Arc<dyn LlmClient + Send + Sync>,
        config: &GleanerConfig,
    ) -> Result<Self> {
        let orchestrator = ExtractionOrchestrator::new(client, config.extraction.clone())?;
        Ok(Self::new(fetcher, orchestrator))
    }

    /// Fetch `url` and reduce it to cleaned text.
    pub async fn scrape(&self, url: &str, progress: &dyn ProgressSink) -> Result<CleanedText> {
        let doc = self.fetcher.fetch(url, progress).await?;
        Ok(normalize(&doc))
    }

    /// Split `text` and extract `instruction` from every segment.
    ///
    /// A failed client connection is not cached; the next call retries it.
    pub async fn parse(
        &self,
        text: &CleanedText,
        instruction: &str,
        progress: &dyn ProgressSink,
    ) -> Result<ExtractionResult> {
        let segments = split(text.as_str(), self.extraction.max_segment_length)?;
        let orchestrator = self
            .orchestrator
            .get_or_try_init(|| connect(&self.llm, &self.extraction))
            .await?;
        let result = orchestrator.extract(&segments, instruction, progress).await?;
        Ok(result)
    }
}

async fn connect(llm: &LlmConfig, extraction: &ExtractionConfig) -> Result<ExtractionOrchestrator> {
    let client = build_llm_client(llm).await?;
    ExtractionOrchestrator::new(client, extraction.clone())
}
