use std::{
	collections::VecDeque,
	sync::{Arc, Mutex},
};

use color_eyre::eyre;

use notemind_config::{Generation, Pipelines};
use notemind_domain::{NoteLevel, QuestionDifficulty, QuestionType, Role, history::PromptMessage};
use notemind_service::{
	BoxFuture, Components, Error, MemoryNoteSource, MemorySessionStore, ModelInvoker,
	NotemindService, QuestionsPipeline, ServiceSettings, SummaryPipeline, SystemClock,
	pipeline::summary::{DEFAULT_TOPIC, SUMMARY_FALLBACK},
};

/// Answers calls in order from a fixed script; anything past the end of the script fails.
#[derive(Default)]
struct StageScript {
	replies: Mutex<VecDeque<Option<String>>>,
	calls: Mutex<Vec<(Generation, Vec<PromptMessage>)>>,
}
impl StageScript {
	fn new(replies: &[Option<&str>]) -> Arc<Self> {
		let replies = replies.iter().map(|reply| reply.map(str::to_string)).collect();

		Arc::new(Self { replies: Mutex::new(replies), ..Default::default() })
	}

	fn failing() -> Arc<Self> {
		Self::new(&[])
	}

	fn call_count(&self) -> usize {
		self.calls.lock().expect("calls lock poisoned").len()
	}

	fn prompt(&self, idx: usize) -> String {
		self.calls.lock().expect("calls lock poisoned")[idx].1[1].content.clone()
	}

	fn params(&self, idx: usize) -> Generation {
		self.calls.lock().expect("calls lock poisoned")[idx].0
	}
}
impl ModelInvoker for StageScript {
	fn complete<'a>(
		&'a self,
		messages: &'a [PromptMessage],
		params: Generation,
	) -> BoxFuture<'a, color_eyre::Result<String>> {
		self.calls.lock().expect("calls lock poisoned").push((params, messages.to_vec()));

		let reply = self.replies.lock().expect("replies lock poisoned").pop_front().flatten();

		Box::pin(async move { reply.ok_or_else(|| eyre::eyre!("model unavailable")) })
	}
}

fn summary_pipeline(invoker: Arc<StageScript>) -> SummaryPipeline {
	SummaryPipeline::new(invoker, &Pipelines::default())
}

fn questions_pipeline(invoker: Arc<StageScript>) -> QuestionsPipeline {
	QuestionsPipeline::new(invoker, &Pipelines::default())
}

#[tokio::test]
async fn questions_missing_categories_get_default_labels() {
	let invoker = StageScript::new(&[
		Some("advanced"),
		Some(r#"Here you go: ["What is a ledger?", "Why hash blocks?", "Build a chain."]"#),
		Some(
			r#"[{"index": 0, "type": "recall", "difficulty": "easy"},
			   {"index": 2, "type": "application", "difficulty": "hard"}]"#,
		),
	]);
	let result = questions_pipeline(invoker.clone()).run("n1", "Blockchains...", "Ledgers").await;

	assert_eq!(invoker.call_count(), 3);
	assert_eq!(result.level, NoteLevel::Advanced);
	assert_eq!(result.count, 3);
	assert_eq!(result.questions.len(), 3);
	assert_eq!(result.questions[0].kind, QuestionType::Recall);
	assert_eq!(result.questions[0].difficulty, QuestionDifficulty::Easy);
	assert_eq!(result.questions[1].question, "Why hash blocks?");
	assert_eq!(result.questions[1].kind, QuestionType::Comprehension);
	assert_eq!(result.questions[1].difficulty, QuestionDifficulty::Medium);
	assert_eq!(result.questions[2].kind, QuestionType::Application);
	assert_eq!(result.questions[2].difficulty, QuestionDifficulty::Hard);
}

#[tokio::test]
async fn questions_without_any_question_skip_categorization() {
	let invoker = StageScript::new(&[Some("Beginner"), Some("I cannot help with that.")]);
	let result = questions_pipeline(invoker.clone()).run("n1", "text", "title").await;

	assert_eq!(invoker.call_count(), 2);
	assert_eq!(result.level, NoteLevel::Beginner);
	assert_eq!(result.count, 0);
	assert!(result.questions.is_empty());
}

#[tokio::test]
async fn questions_level_defaults_when_unreadable() {
	let invoker = StageScript::new(&[Some("It depends."), Some(r#"["Q?"]"#), None]);
	let result = questions_pipeline(invoker.clone()).run("n1", "text", "title").await;

	assert_eq!(result.level, NoteLevel::Intermediate);
	assert!(invoker.prompt(1).contains("intermediate"));
	assert_eq!(result.questions[0].kind, QuestionType::Comprehension);
	assert_eq!(result.questions[0].difficulty, QuestionDifficulty::Medium);
}

#[tokio::test]
async fn summary_survives_a_failing_model() {
	let invoker = StageScript::failing();
	let result = summary_pipeline(invoker.clone()).run("n1", "Some content.", "Title").await;

	assert_eq!(invoker.call_count(), 3);
	assert_eq!(result.summary, SUMMARY_FALLBACK);
	assert!(!result.summary.is_empty());
	assert!(result.key_points.is_empty());
	assert!(result.topics.is_empty());
}

#[tokio::test]
async fn summary_stages_chain_their_outputs() {
	let invoker = StageScript::new(&[
		Some(r#"Topics: ["Cells", "Energy", "ATP", "Enzymes", "Membranes", "Extra"]"#),
		Some("Cells turn food into energy.\n\nATP carries it."),
		Some(r#"["ATP is the energy currency", "", "Enzymes speed reactions"]"#),
	]);
	let result = summary_pipeline(invoker.clone()).run("n1", "Cell biology notes", "Biology").await;

	assert_eq!(result.topics, vec!["Cells", "Energy", "ATP", "Enzymes", "Membranes"]);
	assert_eq!(result.summary, "Cells turn food into energy.\n\nATP carries it.");
	assert_eq!(result.key_points, vec!["ATP is the energy currency", "Enzymes speed reactions"]);
	assert!(invoker.prompt(1).contains("Cells, Energy, ATP, Enzymes, Membranes"));
	assert!(invoker.prompt(2).contains("ATP carries it."));
	assert!(invoker.params(0).temperature < invoker.params(1).temperature);
}

#[tokio::test]
async fn summary_uses_default_topic_when_reply_is_unusable() {
	let invoker = StageScript::new(&[Some("no idea"), Some("A summary."), Some("[]")]);
	let result = summary_pipeline(invoker).run("n1", "content", "title").await;

	assert_eq!(result.topics, vec![DEFAULT_TOPIC.to_string()]);
	assert!(result.key_points.is_empty());
}

#[tokio::test]
async fn note_content_is_capped_before_prompting() {
	let invoker = StageScript::failing();
	let content = "§".repeat(9_000);

	summary_pipeline(invoker.clone()).run("n1", &content, "Title").await;

	assert_eq!(invoker.prompt(0).matches('§').count(), 8_000);
}

async fn service(invoker: Arc<StageScript>, notes: Arc<MemoryNoteSource>) -> NotemindService {
	let components = Components {
		store: Arc::new(MemorySessionStore::new()),
		notes,
		invoker,
		clock: Arc::new(SystemClock),
	};

	NotemindService::start(ServiceSettings::default(), components)
		.await
		.expect("Failed to start service.")
}

#[tokio::test]
async fn summary_workflow_stores_rendered_result_in_session() {
	let notes = Arc::new(MemoryNoteSource::new());

	notes.insert("n1", "Photosynthesis", "Plants convert light.");

	let invoker =
		StageScript::new(&[Some(r#"["Light"]"#), Some("Plants make sugar."), Some(r#"["Chlorophyll"]"#)]);
	let service = service(invoker, notes).await;
	let result = service.summarize_note("n1").await.expect("workflow failed");
	let history = service.session("n1").expect("session failed").history().await.expect("history failed");

	assert_eq!(result.topics, vec!["Light"]);
	assert_eq!(history.len(), 1);
	assert_eq!(history[0].role, Role::Assistant);
	assert!(history[0].content.starts_with("## Summary of Photosynthesis"));
	assert!(history[0].content.contains("- Chlorophyll"));
}

#[tokio::test]
async fn questions_workflow_stores_numbered_list() {
	let notes = Arc::new(MemoryNoteSource::new());

	notes.insert("n1", "Rust", "Ownership and borrowing.");

	let invoker = StageScript::new(&[
		Some("intermediate"),
		Some(r#"["What is ownership?", "When does a borrow end?"]"#),
		Some(r#"[{"index": 1, "type": "application", "difficulty": "hard"}]"#),
	]);
	let service = service(invoker, notes).await;
	let result = service.generate_questions("n1").await.expect("workflow failed");
	let history = service.session("n1").expect("session failed").history().await.expect("history failed");

	assert_eq!(result.count, 2);
	assert!(history[0].content.contains("1. What is ownership? (comprehension, medium)"));
	assert!(history[0].content.contains("2. When does a borrow end? (application, hard)"));
}

#[tokio::test]
async fn workflow_on_unknown_note_is_not_found() {
	let invoker = StageScript::failing();
	let service = service(invoker.clone(), Arc::new(MemoryNoteSource::new())).await;
	let err = service.summarize_note("missing").await.expect_err("workflow should fail");

	assert!(matches!(err, Error::NotFound { .. }));
	assert_eq!(invoker.call_count(), 0);
}
