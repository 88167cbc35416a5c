use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use notemind_domain::{
	FallbackReason, NoteLevel, QuestionDifficulty, QuestionType, StageOutput, stage_output,
	truncate_chars,
};

use crate::{ModelInvoker, pipeline::stage::Stage};

pub const MAX_QUESTIONS: usize = 10;

const ANALYZE_DIFFICULTY: Stage = Stage::new("analyze_difficulty", 20, 0.1);
const GENERATE_QUESTIONS: Stage = Stage::new("generate_questions", 1_000, 0.7);
const CATEGORIZE_QUESTIONS: Stage = Stage::new("categorize_questions", 600, 0.2);

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StudyQuestion {
	pub question: String,
	#[serde(rename = "type")]
	pub kind: QuestionType,
	pub difficulty: QuestionDifficulty,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuestionsResult {
	pub questions: Vec<StudyQuestion>,
	pub count: usize,
	pub level: NoteLevel,
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Category {
	index: usize,
	kind: QuestionType,
	difficulty: QuestionDifficulty,
}

/// analyze-difficulty, then generate-questions, then categorize-questions. An empty question set
/// skips categorization entirely.
#[derive(Clone)]
pub struct QuestionsPipeline {
	invoker: Arc<dyn ModelInvoker>,
	max_content_chars: usize,
}
impl QuestionsPipeline {
	pub fn new(invoker: Arc<dyn ModelInvoker>, cfg: &notemind_config::Pipelines) -> Self {
		Self { invoker, max_content_chars: cfg.max_content_chars as usize }
	}

	pub async fn run(&self, note_id: &str, content: &str, title: &str) -> QuestionsResult {
		let content = truncate_chars(content, self.max_content_chars);
		let level = self.analyze_difficulty(note_id, content).await;
		let texts = self.generate_questions(note_id, content, title, level).await;
		let questions = self.categorize_questions(note_id, texts).await;

		tracing::info!(
			note_id,
			level = level.as_str(),
			questions = questions.len(),
			"Questions pipeline finished."
		);

		QuestionsResult { count: questions.len(), questions, level }
	}

	async fn analyze_difficulty(&self, note_id: &str, content: &str) -> NoteLevel {
		let prompt = format!(
			"Rate the difficulty of this note as exactly one word: beginner, intermediate, or \
advanced.\n\nContent:\n{content}"
		);
		let output = ANALYZE_DIFFICULTY
			.call(self.invoker.as_ref(), note_id, "You assess the level of study material.", prompt)
			.await
			.and_then(|raw| parse_level(&raw));

		ANALYZE_DIFFICULTY.checked(note_id, output).unwrap_or_default()
	}

	async fn generate_questions(
		&self,
		note_id: &str,
		content: &str,
		title: &str,
		level: NoteLevel,
	) -> Vec<String> {
		let prompt = format!(
			"Write 7 to 10 study questions about this note for a {level} learner. Mix recall, \
comprehension and application questions. Respond with a JSON array of question strings only.\
\n\nTitle: {title}\n\nContent:\n{content}",
			level = level.as_str(),
		);
		let output = GENERATE_QUESTIONS
			.call(self.invoker.as_ref(), note_id, "You write study questions.", prompt)
			.await
			.and_then(|raw| parse_questions(&raw));

		GENERATE_QUESTIONS.checked(note_id, output).unwrap_or_default()
	}

	async fn categorize_questions(&self, note_id: &str, texts: Vec<String>) -> Vec<StudyQuestion> {
		if texts.is_empty() {
			tracing::debug!(note_id, stage = CATEGORIZE_QUESTIONS.name, "No questions to categorize.");

			return Vec::new();
		}

		let listing = texts
			.iter()
			.enumerate()
			.map(|(idx, text)| format!("{idx}. {text}"))
			.collect::<Vec<_>>()
			.join("\n");
		let prompt = format!(
			"Label every question below. type is one of recall, comprehension, application; \
difficulty is one of easy, medium, hard. Respond with a JSON array of objects shaped like \
{{\"index\": 0, \"type\": \"recall\", \"difficulty\": \"easy\"}}, using the zero-based index \
shown before each question.\n\n{listing}"
		);
		let output = CATEGORIZE_QUESTIONS
			.call(self.invoker.as_ref(), note_id, "You classify study questions.", prompt)
			.await
			.and_then(|raw| stage_output::parse_records(&raw, parse_category));
		let categories = CATEGORIZE_QUESTIONS.checked(note_id, output).unwrap_or_default();

		label_questions(texts, &categories)
	}
}

fn parse_level(raw: &str) -> StageOutput<NoteLevel> {
	match NoteLevel::from_free_text(raw) {
		Some(level) => StageOutput::Parsed(level),
		None => StageOutput::Fallback(FallbackReason::OutOfVocabulary),
	}
}

/// Accepts bare strings or `{"question": ...}` objects.
fn parse_questions(raw: &str) -> StageOutput<Vec<String>> {
	stage_output::parse_records(raw, |item| {
		let text = match &item {
			Value::String(text) => text.as_str(),
			Value::Object(map) => map.get("question").and_then(Value::as_str)?,
			_ => return None,
		};
		let text = text.trim();

		(!text.is_empty()).then(|| text.to_string())
	})
	.map(|mut questions| {
		questions.truncate(MAX_QUESTIONS);

		questions
	})
}

fn parse_category(item: Value) -> Option<Category> {
	let index = item.get("index").and_then(Value::as_u64)?;

	Some(Category {
		index: usize::try_from(index).ok()?,
		kind: QuestionType::parse_or_default(item.get("type").and_then(Value::as_str)),
		difficulty: QuestionDifficulty::parse_or_default(
			item.get("difficulty").and_then(Value::as_str),
		),
	})
}

/// Pairs each question with the first category naming its position; unmatched positions get the
/// default labels.
fn label_questions(texts: Vec<String>, categories: &[Category]) -> Vec<StudyQuestion> {
	texts
		.into_iter()
		.enumerate()
		.map(|(idx, question)| {
			let category = categories.iter().find(|category| category.index == idx);

			StudyQuestion {
				question,
				kind: category.map(|c| c.kind).unwrap_or_default(),
				difficulty: category.map(|c| c.difficulty).unwrap_or_default(),
			}
		})
		.collect()
}
