use std::fmt;
use std::sync::Arc;

use gleaner_common::{ExtractionConfig, GleanerError, ModelError, ProgressEvent, ProgressSink};
use gleaner_llm::traits::LlmClient;
use tracing::{debug, info};

use crate::chunk::Segment;

const DOM_CONTENT: &str = "{dom_content}";
const PARSE_DESCRIPTION: &str = "{parse_description}";

/// Request template with `{dom_content}` and `{parse_description}` slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    raw: String,
}

impl PromptTemplate {
    pub fn new(raw: impl Into<String>) -> gleaner_common::Result<Self> {
        let raw = raw.into();
        for placeholder in [DOM_CONTENT, PARSE_DESCRIPTION] {
            if !raw.contains(placeholder) {
                return Err(GleanerError::Config(format!(
                    "extraction template is missing the {placeholder} placeholder"
                )));
            }
        }
        Ok(Self { raw })
    }

    /// Fill both slots in one left-to-right pass. Substituted text is never
    /// scanned again.
    pub fn render(&self, dom_content: &str, parse_description: &str) -> String {
        let mut out =
            String::with_capacity(self.raw.len() + dom_content.len() + parse_description.len());
        let mut rest = self.raw.as_str();

        loop {
            let next = [
                (rest.find(DOM_CONTENT), DOM_CONTENT, dom_content),
                (rest.find(PARSE_DESCRIPTION), PARSE_DESCRIPTION, parse_description),
            ]
            .into_iter()
            .filter_map(|(at, slot, value)| at.map(|at| (at, slot, value)))
            .min_by_key(|(at, _, _)| *at);

            let Some((at, slot, value)) = next else {
                out.push_str(rest);
                return out;
            };
            out.push_str(&rest[..at]);
            out.push_str(value);
            rest = &rest[at + slot.len()..];
        }
    }
}

/// Per-segment model responses, in segment order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionResult {
    responses: Vec<String>,
}

impl ExtractionResult {
    pub fn responses(&self) -> &[String] {
        &self.responses
    }
}

/// Responses joined by `\n`. Empty responses still contribute a line.
impl fmt::Display for ExtractionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.responses.join("\n"))
    }
}

/// Runs one instruction over every segment, one model call at a time.
pub struct ExtractionOrchestrator {
    client: Arc<dyn LlmClient + Send + Sync>,
    template: PromptTemplate,
    config: ExtractionConfig,
}

impl ExtractionOrchestrator {
    pub fn new(
        client: Arc<dyn LlmClient + Send + Sync>,
        config: ExtractionConfig,
    ) -> gleaner_common::Result<Self> {
        let template = PromptTemplate::new(config.template.clone())?;
        Ok(Self {
            client,
            template,
            config,
        })
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Extract `instruction` from each segment in index order.
    ///
    /// The first model failure aborts the run; responses gathered so far
    /// are dropped.
    pub async fn extract(
        &self,
        segments: &[Segment<'_>],
        instruction: &str,
        progress: &dyn ProgressSink,
    ) -> Result<ExtractionResult, ModelError> {
        let total = segments.len();
        let mut responses = Vec::with_capacity(total);

        for (position, segment) in segments.iter().enumerate() {
            let prompt = self.template.render(segment.text, instruction);
            debug!(
                target: "gleaner.extract",
                index = segment.index,
                chars = segment.char_count(),
                "sending segment"
            );

            let response = self
                .client
                .generate(&prompt, None, self.config.max_tokens, self.config.temperature)
                .await?;
            responses.push(response.text);

            progress.emit(ProgressEvent::SegmentParsed {
                index: position + 1,
                total,
            });
        }

        info!(
            target: "gleaner.extract",
            model = self.client.model_name(),
            segments = total,
            "extraction finished"
        );
        Ok(ExtractionResult { responses })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::split;
    use async_trait::async_trait;
    use gleaner_common::progress::RecordingProgress;
    use gleaner_common::DEFAULT_EXTRACTION_TEMPLATE;
    use gleaner_llm::traits::LlmResponse;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Answers from a queue and records every prompt.
    struct QueuedModel {
        replies: Mutex<VecDeque<Result<String, ModelError>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl QueuedModel {
        fn new(replies: Vec<Result<String, ModelError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LlmClient for QueuedModel {
        async fn generate(
            &self,
            prompt: &str,
            _system_prompt: Option<&str>,
            _max_tokens: Option<u32>,
            _temperature: Option<f32>,
        ) -> Result<LlmResponse, ModelError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            let reply = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(String::new()))?;
            Ok(LlmResponse {
                text: reply,
                model: None,
                tokens_used: None,
            })
        }

        async fn health_check(&self) -> Result<bool, ModelError> {
            Ok(true)
        }

        fn model_name(&self) -> &str {
            "queued"
        }
    }

    fn orchestrator(model: Arc<QueuedModel>) -> ExtractionOrchestrator {
        ExtractionOrchestrator::new(model, ExtractionConfig::default()).unwrap()
    }

    #[test]
    fn render_fills_both_slots() {
        let template = PromptTemplate::new(DEFAULT_EXTRACTION_TEMPLATE).unwrap();
        let prompt = template.render("Price: $4", "prices");
        assert!(prompt.starts_with(
            "You are tasked with extracting specific information from the following text content: Price: $4. "
        ));
        assert!(prompt.contains("directly matches the provided description: prices. 2. **No Extra"));
        assert!(!prompt.contains(DOM_CONTENT));
        assert!(!prompt.contains(PARSE_DESCRIPTION));
    }

    #[test]
    fn render_does_not_reexpand_substituted_text() {
        let template = PromptTemplate::new("[{dom_content}|{parse_description}]").unwrap();
        assert_eq!(
            template.render("{parse_description}", "{dom_content}"),
            "[{parse_description}|{dom_content}]"
        );
    }

    #[test]
    fn render_handles_repeated_and_reversed_slots() {
        let template =
            PromptTemplate::new("{parse_description} / {dom_content} / {parse_description}").unwrap();
        assert_eq!(template.render("D", "P"), "P / D / P");
    }

    #[test]
    fn template_without_placeholder_is_rejected() {
        assert!(matches!(
            PromptTemplate::new("only {dom_content}"),
            Err(GleanerError::Config(_))
        ));
        let config = ExtractionConfig {
            template: "no slots".into(),
            ..ExtractionConfig::default()
        };
        assert!(ExtractionOrchestrator::new(QueuedModel::new(vec![]), config).is_err());
    }

    #[tokio::test]
    async fn empty_responses_are_preserved() {
        let model = QueuedModel::new(vec![Ok("Title A".into()), Ok(String::new())]);
        let orchestrator = orchestrator(model.clone());
        let segments = split("first segmentsecond", 13).unwrap();

        let result = orchestrator
            .extract(&segments, "titles", &RecordingProgress::new())
            .await
            .unwrap();
        assert_eq!(result.responses(), ["Title A", ""]);
        assert_eq!(result.to_string(), "Title A\n");
        assert_eq!(model.prompts().len(), 2);
    }

    #[tokio::test]
    async fn no_segments_means_no_calls() {
        let model = QueuedModel::new(vec![]);
        let orchestrator = orchestrator(model.clone());
        let progress = RecordingProgress::new();

        let result = orchestrator.extract(&[], "anything", &progress).await.unwrap();
        assert_eq!(result.to_string(), "");
        assert!(model.prompts().is_empty());
        assert!(progress.events().is_empty());
    }

    #[tokio::test]
    async fn segments_are_sent_in_order_with_progress() {
        let model = QueuedModel::new(vec![Ok("1".into()), Ok("2".into()), Ok("3".into())]);
        let orchestrator = orchestrator(model.clone());
        let segments = split("aaabbbc", 3).unwrap();
        let progress = RecordingProgress::new();

        let result = orchestrator.extract(&segments, "x", &progress).await.unwrap();
        assert_eq!(result.to_string(), "1\n2\n3");

        let prompts = model.prompts();
        assert!(prompts[0].contains("text content: aaa."));
        assert!(prompts[1].contains("text content: bbb."));
        assert!(prompts[2].contains("text content: c."));
        assert_eq!(
            progress.events(),
            [
                ProgressEvent::SegmentParsed { index: 1, total: 3 },
                ProgressEvent::SegmentParsed { index: 2, total: 3 },
                ProgressEvent::SegmentParsed { index: 3, total: 3 },
            ]
        );
    }

    #[tokio::test]
    async fn progress_counts_the_segments_given() {
        let model = QueuedModel::new(vec![Ok("c".into()), Ok("d".into())]);
        let orchestrator = orchestrator(model.clone());
        let segments = split("aabbccdd", 2).unwrap();
        let progress = RecordingProgress::new();

        let result = orchestrator
            .extract(&segments[2..], "x", &progress)
            .await
            .unwrap();
        assert_eq!(result.to_string(), "c\nd");
        assert!(model.prompts()[0].contains("text content: cc."));
        assert_eq!(
            progress.events(),
            [
                ProgressEvent::SegmentParsed { index: 1, total: 2 },
                ProgressEvent::SegmentParsed { index: 2, total: 2 },
            ]
        );
    }

    #[tokio::test]
    async fn first_failure_aborts() {
        let model = QueuedModel::new(vec![
            Ok("kept?".into()),
            Err(ModelError::Unavailable("down".into())),
            Ok("never".into()),
        ]);
        let orchestrator = orchestrator(model.clone());
        let segments = split("aaabbbccc", 3).unwrap();
        let progress = RecordingProgress::new();

        let err = orchestrator.extract(&segments, "x", &progress).await.unwrap_err();
        assert!(matches!(err, ModelError::Unavailable(_)));
        assert_eq!(model.prompts().len(), 2);
        assert_eq!(progress.events().len(), 1);
    }
}
