mod common;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use gleaner_common::progress::RecordingProgress;
use gleaner_common::{
    BrowserConfig, FetchError, GleanerConfig, GleanerError, LlmConfig, ModelError, ProgressEvent,
    Result,
};
use gleaner_drivers::remote::cdp::ChallengeStatus;
use gleaner_llm::traits::{LlmClient, LlmResponse};
use gleaner_web::{BrowserSession, CleanedText, Gleaner, SessionFactory, WebFetcher};

const PAGE: &str = r#"<!doctype html>
<html>
  <head><title>Shop</title><style>body { margin: 0 }</style></head>
  <body>
    <h1>Spring catalogue</h1>
    <script>window.dataLayer = [];</script>
    <ul>
      <li>Kettle   $25</li>
      <li>Toaster $40</li>
    </ul>
  </body>
</html>"#;

struct StaticPage {
    challenge: &'static str,
    hang: bool,
    closes: Arc<AtomicUsize>,
}

#[async_trait]
impl BrowserSession for StaticPage {
    async fn navigate(&self, _url: &str) -> anyhow::Result<()> {
        Ok(())
    }

    async fn wait_for_challenge(&self, _detect_timeout: Duration) -> anyhow::Result<ChallengeStatus> {
        if self.hang {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            return Err(anyhow!("unreachable"));
        }
        Ok(ChallengeStatus::parse(self.challenge))
    }

    async fn page_source(&self) -> anyhow::Result<String> {
        Ok(PAGE.to_string())
    }

    async fn close(&self) -> anyhow::Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct StaticPages {
    challenge: &'static str,
    hang: bool,
    closes: Arc<AtomicUsize>,
}

#[async_trait]
impl SessionFactory for StaticPages {
    async fn open(&self) -> anyhow::Result<Box<dyn BrowserSession>> {
        Ok(Box::new(StaticPage {
            challenge: self.challenge,
            hang: self.hang,
            closes: self.closes.clone(),
        }))
    }
}

/// Replies with the first line of each segment that mentions the instruction.
#[derive(Default)]
struct GrepModel {
    calls: Mutex<Vec<String>>,
}

#[async_trait]
impl LlmClient for GrepModel {
    async fn generate(
        &self,
        prompt: &str,
        _system_prompt: Option<&str>,
        _max_tokens: Option<u32>,
        _temperature: Option<f32>,
    ) -> std::result::Result<LlmResponse, ModelError> {
        self.calls.lock().unwrap().push(prompt.to_string());
        let description = prompt
            .split("the provided description: ")
            .nth(1)
            .and_then(|rest| rest.split(". 2.").next())
            .unwrap_or_default();
        let content = prompt
            .split("text content: ")
            .nth(1)
            .and_then(|rest| rest.split(". Please follow").next())
            .unwrap_or_default();
        let text = content
            .lines()
            .find(|line| line.to_lowercase().contains(&description.to_lowercase()))
            .unwrap_or_default()
            .to_string();
        Ok(LlmResponse {
            text,
            model: Some("grep".into()),
            tokens_used: None,
        })
    }

    async fn health_check(&self) -> std::result::Result<bool, ModelError> {
        Ok(true)
    }

    fn model_name(&self) -> &str {
        "grep"
    }
}

struct Harness {
    gleaner: Gleaner,
    model: Arc<GrepModel>,
    closes: Arc<AtomicUsize>,
}

fn harness(challenge: &'static str, hang: bool, mut config: GleanerConfig) -> Result<Harness> {
    common::init_test_tracing();
    config.browser = BrowserConfig {
        endpoint: Some("http://localhost:9515".into()),
        challenge_deadline_secs: 1,
        ..config.browser
    };
    let closes = Arc::new(AtomicUsize::new(0));
    let factory = StaticPages {
        challenge,
        hang,
        closes: closes.clone(),
    };
    let fetcher = WebFetcher::with_factory(Arc::new(factory), config.browser.clone());
    let model = Arc::new(GrepModel::default());
    let gleaner = Gleaner::with_client(fetcher, model.clone(), &config)?;
    Ok(Harness {
        gleaner,
        model,
        closes,
    })
}

#[tokio::test]
async fn scrape_then_parse_several_instructions() -> Result<()> {
    let h = harness("solve_finished", false, GleanerConfig::default())?;
    let progress = RecordingProgress::new();

    let text = h.gleaner.scrape("https://shop.example/spring", &progress).await?;
    assert_eq!(
        text.as_str(),
        "Spring catalogue\nKettle   $25\nToaster $40"
    );
    assert_eq!(h.closes.load(Ordering::SeqCst), 1);

    let kettle = h.gleaner.parse(&text, "kettle", &progress).await?;
    assert_eq!(kettle.to_string(), "Kettle   $25");

    let toaster = h.gleaner.parse(&text, "toaster", &progress).await?;
    assert_eq!(toaster.to_string(), "Toaster $40");

    assert_eq!(h.model.calls.lock().unwrap().len(), 2);
    assert_eq!(
        progress.events(),
        [
            ProgressEvent::ChallengeWait,
            ProgressEvent::ChallengeStatus("solve_finished".into()),
            ProgressEvent::SegmentParsed { index: 1, total: 1 },
            ProgressEvent::SegmentParsed { index: 1, total: 1 },
        ]
    );
    Ok(())
}

#[tokio::test]
async fn small_segments_keep_response_order() -> Result<()> {
    let mut config = GleanerConfig::default();
    config.extraction.max_segment_length = 17;
    let h = harness("not_detected", false, config)?;

    let text = h.gleaner.scrape("https://shop.example", &RecordingProgress::new()).await?;
    let result = h.gleaner.parse(&text, "$", &RecordingProgress::new()).await?;

    // "Spring catalogue\n" | "Kettle   $25\nToas" | "ter $40"
    assert_eq!(result.responses(), ["", "Kettle   $25", "ter $40"]);
    assert_eq!(result.to_string(), "\nKettle   $25\nter $40");
    Ok(())
}

#[tokio::test]
async fn empty_text_sends_nothing() -> Result<()> {
    let h = harness("not_detected", false, GleanerConfig::default())?;
    let result = h
        .gleaner
        .parse(&CleanedText::default(), "anything", &RecordingProgress::new())
        .await?;
    assert_eq!(result.to_string(), "");
    assert!(h.model.calls.lock().unwrap().is_empty());
    Ok(())
}

#[tokio::test]
async fn challenge_timeout_yields_no_text() -> Result<()> {
    let h = harness("not_detected", true, GleanerConfig::default())?;
    let err = h
        .gleaner
        .scrape("https://shop.example", &RecordingProgress::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        GleanerError::Fetch(FetchError::ChallengeTimeout(_))
    ));
    assert_eq!(h.closes.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test]
async fn zero_segment_length_is_rejected_at_parse() -> Result<()> {
    let mut config = GleanerConfig::default();
    config.extraction.max_segment_length = 0;
    let h = harness("not_detected", false, config)?;
    let text = h.gleaner.scrape("https://shop.example", &RecordingProgress::new()).await?;
    let err = h
        .gleaner
        .parse(&text, "x", &RecordingProgress::new())
        .await
        .unwrap_err();
    assert!(matches!(err, GleanerError::Chunk(_)));
    Ok(())
}

#[tokio::test]
async fn model_server_is_only_contacted_by_parse() -> Result<()> {
    common::init_test_tracing();
    let mut config = GleanerConfig::default();
    config.browser.endpoint = Some("http://localhost:9515".into());
    config.llm = LlmConfig::Ollama {
        model: "llama3".into(),
        endpoint: "http://127.0.0.1:1".into(),
        pull_missing: false,
    };

    let gleaner = Gleaner::from_config(&config)?;
    let err = gleaner
        .parse(&CleanedText::default(), "anything", &RecordingProgress::new())
        .await
        .unwrap_err();
    assert!(matches!(err, GleanerError::Model(ModelError::Unavailable(_))));
    Ok(())
}

#[tokio::test]
async fn bad_template_is_rejected_before_any_fetch() {
    let mut config = GleanerConfig::default();
    config.browser.endpoint = Some("http://localhost:9515".into());
    config.extraction.template = "no slots here".into();
    assert!(matches!(
        Gleaner::from_config(&config),
        Err(GleanerError::Config(_))
    ));
}

/// Needs a live remote browser in `GLEANER__BROWSER__ENDPOINT`.
#[tokio::test]
#[ignore]
async fn live_scrape_smoketest() -> Result<()> {
    common::init_test_tracing();
    let endpoint = std::env::var("GLEANER__BROWSER__ENDPOINT").unwrap_or_else(|_| {
        tracing::debug!("Skipping: GLEANER__BROWSER__ENDPOINT not set");
        panic!("SKIP");
    });
    let fetcher = WebFetcher::new(BrowserConfig {
        endpoint: Some(endpoint),
        ..BrowserConfig::default()
    })?;
    let doc = fetcher.fetch("https://example.com", &RecordingProgress::new()).await?;
    let text = gleaner_web::normalize(&doc);
    assert!(text.as_str().contains("Example Domain"));
    Ok(())
}
