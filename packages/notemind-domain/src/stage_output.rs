//! Structured output parsing for pipeline stages.
//!
//! Models answer in free text that usually, but not always, contains a JSON array. Every stage goes
//! through [`parse_records`] so the result is either the validated items or an explicit
//! [`FallbackReason`]; callers decide what their fallback value is.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

static JSON_ARRAY: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"\[[\s\S]*\]").expect("JSON array pattern must compile."));

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FallbackReason {
	ModelCallFailed,
	EmptyResponse,
	NoJsonArray,
	InvalidJson,
	NoValidItems,
	OutOfVocabulary,
}
impl FallbackReason {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::ModelCallFailed => "model_call_failed",
			Self::EmptyResponse => "empty_response",
			Self::NoJsonArray => "no_json_array",
			Self::InvalidJson => "invalid_json",
			Self::NoValidItems => "no_valid_items",
			Self::OutOfVocabulary => "out_of_vocabulary",
		}
	}
}

#[derive(Clone, Debug, PartialEq)]
pub enum StageOutput<T> {
	Parsed(T),
	Fallback(FallbackReason),
}
impl<T> StageOutput<T> {
	pub fn fallback_reason(&self) -> Option<FallbackReason> {
		match self {
			Self::Parsed(_) => None,
			Self::Fallback(reason) => Some(*reason),
		}
	}

	pub fn map<U>(self, f: impl FnOnce(T) -> U) -> StageOutput<U> {
		match self {
			Self::Parsed(value) => StageOutput::Parsed(f(value)),
			Self::Fallback(reason) => StageOutput::Fallback(reason),
		}
	}

	pub fn and_then<U>(self, f: impl FnOnce(T) -> StageOutput<U>) -> StageOutput<U> {
		match self {
			Self::Parsed(value) => f(value),
			Self::Fallback(reason) => StageOutput::Fallback(reason),
		}
	}

	pub fn unwrap_or_default(self) -> T
	where
		T: Default,
	{
		self.unwrap_or_else(|_| T::default())
	}

	pub fn unwrap_or_else(self, f: impl FnOnce(FallbackReason) -> T) -> T {
		match self {
			Self::Parsed(value) => value,
			Self::Fallback(reason) => f(reason),
		}
	}
}

/// First span from an opening `[` to the last `]` in `raw`.
pub fn extract_json_array(raw: &str) -> Option<&str> {
	JSON_ARRAY.find(raw).map(|m| m.as_str())
}

pub fn parse_json_array(raw: &str) -> StageOutput<Vec<Value>> {
	let Some(span) = extract_json_array(raw) else {
		return StageOutput::Fallback(FallbackReason::NoJsonArray);
	};

	match serde_json::from_str::<Value>(span) {
		Ok(Value::Array(items)) => StageOutput::Parsed(items),
		_ => StageOutput::Fallback(FallbackReason::InvalidJson),
	}
}

/// Validates every element with `validate`, dropping the ones it rejects. An array with no
/// surviving elements is a fallback, not an empty success.
pub fn parse_records<T>(raw: &str, validate: impl FnMut(Value) -> Option<T>) -> StageOutput<Vec<T>> {
	parse_json_array(raw).and_then(|items| {
		let records: Vec<T> = items.into_iter().filter_map(validate).collect();

		if records.is_empty() {
			StageOutput::Fallback(FallbackReason::NoValidItems)
		} else {
			StageOutput::Parsed(records)
		}
	})
}

/// Non-empty strings from a JSON array, trimmed and capped at `max_items`.
pub fn parse_text_items(raw: &str, max_items: usize) -> StageOutput<Vec<String>> {
	parse_records(raw, |item| match item {
		Value::String(text) => {
			let trimmed = text.trim();

			(!trimmed.is_empty()).then(|| trimmed.to_string())
		},
		_ => None,
	})
	.map(|mut items| {
		items.truncate(max_items);

		items
	})
}
