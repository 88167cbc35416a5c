//! Note workflows: load a note, run a pipeline over it, and store the rendered result in the note's
//! session as an assistant message.

use std::fmt::Write as _;

use notemind_domain::Role;

use crate::{
	Error, NoteDocument, NotemindService, Result,
	pipeline::{questions::QuestionsResult, summary::SummaryResult},
};

impl NotemindService {
	pub async fn summarize_note(&self, note_id: &str) -> Result<SummaryResult> {
		let session = self.session(note_id)?;
		let note = self.load_note(note_id).await?;
		let result = self.summary.run(&note.note_id, &note.content, &note.title).await;

		session.store_message(Role::Assistant.as_str(), &render_summary(&note.title, &result)).await?;

		Ok(result)
	}

	pub async fn generate_questions(&self, note_id: &str) -> Result<QuestionsResult> {
		let session = self.session(note_id)?;
		let note = self.load_note(note_id).await?;
		let result = self.questions.run(&note.note_id, &note.content, &note.title).await;

		session
			.store_message(Role::Assistant.as_str(), &render_questions(&note.title, &result))
			.await?;

		Ok(result)
	}

	async fn load_note(&self, note_id: &str) -> Result<NoteDocument> {
		let note_id = note_id.trim();

		self.notes
			.fetch_note(note_id)
			.await?
			.ok_or_else(|| Error::NotFound { message: format!("Note {note_id} does not exist.") })
	}
}

pub fn render_summary(title: &str, result: &SummaryResult) -> String {
	let mut out = format!("## Summary of {title}\n\n{}\n", result.summary);

	if !result.key_points.is_empty() {
		out.push_str("\n### Key points\n\n");

		for point in &result.key_points {
			let _ = writeln!(out, "- {point}");
		}
	}
	if !result.topics.is_empty() {
		let _ = write!(out, "\n### Topics\n\n{}\n", result.topics.join(", "));
	}

	out
}

pub fn render_questions(title: &str, result: &QuestionsResult) -> String {
	let mut out = format!("## Study questions for {title}\n\n");

	if result.questions.is_empty() {
		out.push_str("No study questions could be generated for this note.\n");

		return out;
	}

	for (idx, question) in result.questions.iter().enumerate() {
		let _ = writeln!(
			out,
			"{}. {} ({}, {})",
			idx + 1,
			question.question,
			question.kind.as_str(),
			question.difficulty.as_str()
		);
	}

	out
}
