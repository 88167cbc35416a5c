use std::sync::Arc;

use serde::{Deserialize, Serialize};

use notemind_domain::{FallbackReason, StageOutput, stage_output, truncate_chars};

use crate::{ModelInvoker, pipeline::stage::Stage};

pub const DEFAULT_TOPIC: &str = "General";
pub const SUMMARY_FALLBACK: &str = "Unable to generate a summary for this note. Please try again.";
pub const MAX_TOPICS: usize = 5;
pub const MAX_KEY_POINTS: usize = 7;

const EXTRACT_TOPICS: Stage = Stage::new("extract_topics", 200, 0.3);
const GENERATE_SUMMARY: Stage = Stage::new("generate_summary", 800, 0.5);
const EXTRACT_KEY_POINTS: Stage = Stage::new("extract_key_points", 500, 0.3);

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryResult {
	pub summary: String,
	pub key_points: Vec<String>,
	pub topics: Vec<String>,
}

/// extract-topics, then generate-summary, then extract-key-points. Never fails; every stage has a
/// fallback.
#[derive(Clone)]
pub struct SummaryPipeline {
	invoker: Arc<dyn ModelInvoker>,
	max_content_chars: usize,
}
impl SummaryPipeline {
	pub fn new(invoker: Arc<dyn ModelInvoker>, cfg: &notemind_config::Pipelines) -> Self {
		Self { invoker, max_content_chars: cfg.max_content_chars as usize }
	}

	pub async fn run(&self, note_id: &str, content: &str, title: &str) -> SummaryResult {
		let content = truncate_chars(content, self.max_content_chars);
		let topics = self.extract_topics(note_id, content, title).await;
		let summary = self.generate_summary(note_id, content, title, &topics).await;
		let key_points = self.extract_key_points(note_id, &summary, content).await;

		tracing::info!(
			note_id,
			topics = topics.len(),
			key_points = key_points.len(),
			"Summary pipeline finished."
		);

		SummaryResult { summary, key_points, topics }
	}

	async fn extract_topics(&self, note_id: &str, content: &str, title: &str) -> Vec<String> {
		let prompt = format!(
			"Identify the 3 to 5 main topics of this note. Respond with a JSON array of short topic \
strings only.\n\nTitle: {title}\n\nContent:\n{content}"
		);
		let output = EXTRACT_TOPICS
			.call(self.invoker.as_ref(), note_id, "You label study notes with topics.", prompt)
			.await
			.and_then(|raw| stage_output::parse_text_items(&raw, MAX_TOPICS));

		topics_or_default(EXTRACT_TOPICS.checked(note_id, output))
	}

	async fn generate_summary(
		&self,
		note_id: &str,
		content: &str,
		title: &str,
		topics: &[String],
	) -> String {
		let topics = if topics.is_empty() { DEFAULT_TOPIC.to_string() } else { topics.join(", ") };
		let prompt = format!(
			"Summarize this note in 2 to 3 short paragraphs for a student reviewing it. Focus on \
these topics: {topics}.\n\nTitle: {title}\n\nContent:\n{content}"
		);

		summary_or_fallback(
			GENERATE_SUMMARY
				.call(self.invoker.as_ref(), note_id, "You write clear study summaries.", prompt)
				.await,
		)
	}

	async fn extract_key_points(&self, note_id: &str, summary: &str, content: &str) -> Vec<String> {
		let prompt = format!(
			"List the 5 to 7 most important points a student should remember. Respond with a JSON \
array of short strings only.\n\nSummary:\n{summary}\n\nOriginal note:\n{content}"
		);
		let output = EXTRACT_KEY_POINTS
			.call(self.invoker.as_ref(), note_id, "You extract key points from study notes.", prompt)
			.await
			.and_then(|raw| stage_output::parse_text_items(&raw, MAX_KEY_POINTS));

		EXTRACT_KEY_POINTS.checked(note_id, output).unwrap_or_default()
	}
}

/// A failed call leaves the topic list empty; a reply with nothing usable in it becomes the single
/// default topic.
pub fn topics_or_default(output: StageOutput<Vec<String>>) -> Vec<String> {
	output.unwrap_or_else(|reason| match reason {
		FallbackReason::ModelCallFailed => Vec::new(),
		_ => vec![DEFAULT_TOPIC.to_string()],
	})
}

fn summary_or_fallback(output: StageOutput<String>) -> String {
	output.map(|text| text.trim().to_string()).unwrap_or_else(|_| SUMMARY_FALLBACK.to_string())
}
