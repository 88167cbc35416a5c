use serde::Serialize;

use crate::{ChatMessage, Role};

/// One role-tagged message as handed to the model.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PromptMessage {
	pub role: Role,
	pub content: String,
}
impl PromptMessage {
	pub fn new(role: Role, content: impl Into<String>) -> Self {
		Self { role, content: content.into() }
	}
}

#[derive(Clone, Copy, Debug)]
pub struct HistoryLimits {
	pub max_stored_messages: usize,
	pub context_window_messages: usize,
	pub max_message_chars: usize,
	pub max_note_context_chars: usize,
}
impl HistoryLimits {
	pub fn from_config(cfg: &notemind_config::Session) -> Self {
		Self {
			max_stored_messages: cfg.max_stored_messages as usize,
			context_window_messages: cfg.context_window_messages as usize,
			max_message_chars: cfg.max_message_chars as usize,
			max_note_context_chars: cfg.max_note_context_chars as usize,
		}
	}
}
impl Default for HistoryLimits {
	fn default() -> Self {
		Self::from_config(&notemind_config::Session::default())
	}
}

/// Appends and drops the oldest entries until at most `max_stored` remain.
pub fn append(history: &mut Vec<ChatMessage>, message: ChatMessage, max_stored: usize) {
	history.push(message);

	trim(history, max_stored);
}

pub fn trim(history: &mut Vec<ChatMessage>, max_stored: usize) {
	if history.len() > max_stored {
		let excess = history.len() - max_stored;

		history.drain(..excess);
	}
}

pub fn system_prompt(note_context: &str) -> String {
	format!(
		"You are a study assistant helping the user understand one of their notes. \
Answer questions about the note, explain concepts it mentions, and keep answers concise.\n\n\
Current note:\n{note_context}"
	)
}

/// The bounded slice of a conversation sent to the model: one synthesized system message with the
/// note context, followed by the most recent messages with their content cut to size.
pub fn context_window(
	history: &[ChatMessage],
	note_context: &str,
	limits: &HistoryLimits,
) -> Vec<PromptMessage> {
	let start = history.len().saturating_sub(limits.context_window_messages);
	let mut window = Vec::with_capacity(history.len() - start + 1);
	let context = crate::truncate_chars(note_context, limits.max_note_context_chars);

	window.push(PromptMessage::new(Role::System, system_prompt(context)));

	for message in &history[start..] {
		window.push(PromptMessage::new(
			message.role,
			crate::truncate_chars(&message.content, limits.max_message_chars),
		));
	}

	window
}

#[cfg(test)]
mod tests {
	use time::OffsetDateTime;

	use super::*;

	fn message(idx: usize) -> ChatMessage {
		ChatMessage::new(Role::User, format!("m{idx}"), OffsetDateTime::UNIX_EPOCH)
	}

	#[test]
	fn trim_keeps_most_recent() {
		let mut history: Vec<_> = (0..5).map(message).collect();

		trim(&mut history, 3);

		let contents: Vec<_> = history.iter().map(|m| m.content.as_str()).collect();

		assert_eq!(contents, ["m2", "m3", "m4"]);
	}

	#[test]
	fn window_of_short_history_keeps_everything() {
		let history: Vec<_> = (0..3).map(message).collect();
		let window = context_window(&history, "ctx", &HistoryLimits::default());

		assert_eq!(window.len(), 4);
		assert_eq!(window[0].role, Role::System);
		assert!(window[0].content.ends_with("ctx"));
	}
}
