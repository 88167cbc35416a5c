use notemind_config::Generation;
use notemind_domain::{FallbackReason, Role, StageOutput, history::PromptMessage};

use crate::ModelInvoker;

/// One model call with its own generation parameters. Classification stages run cold, generation
/// stages warmer.
#[derive(Clone, Copy, Debug)]
pub struct Stage {
	pub name: &'static str,
	pub params: Generation,
}
impl Stage {
	pub const fn new(name: &'static str, max_tokens: u32, temperature: f32) -> Self {
		Self { name, params: Generation { max_tokens, temperature } }
	}

	/// Issues exactly one call. A failed call or a blank reply is a fallback, logged at `warn`.
	pub async fn call(
		&self,
		invoker: &dyn ModelInvoker,
		note_id: &str,
		system: &str,
		prompt: String,
	) -> StageOutput<String> {
		let messages = [PromptMessage::new(Role::System, system), PromptMessage::new(Role::User, prompt)];

		match invoker.complete(&messages, self.params).await {
			Ok(text) if text.trim().is_empty() => {
				self.log_fallback(note_id, FallbackReason::EmptyResponse);

				StageOutput::Fallback(FallbackReason::EmptyResponse)
			},
			Ok(text) => StageOutput::Parsed(text),
			Err(err) => {
				tracing::warn!(note_id, stage = self.name, error = %err, "Pipeline stage model call failed.");

				StageOutput::Fallback(FallbackReason::ModelCallFailed)
			},
		}
	}

	/// Logs a parse-level fallback and passes the output through.
	pub fn checked<T>(&self, note_id: &str, output: StageOutput<T>) -> StageOutput<T> {
		if let Some(reason) = output.fallback_reason()
			&& !matches!(reason, FallbackReason::ModelCallFailed | FallbackReason::EmptyResponse)
		{
			self.log_fallback(note_id, reason);
		}

		output
	}

	fn log_fallback(&self, note_id: &str, reason: FallbackReason) {
		tracing::warn!(note_id, stage = self.name, reason = reason.as_str(), "Pipeline stage fell back.");
	}
}
