use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
	User,
	Assistant,
	System,
}
impl Role {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::User => "user",
			Self::Assistant => "assistant",
			Self::System => "system",
		}
	}
}
impl fmt::Display for Role {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}
impl FromStr for Role {
	type Err = String;

	fn from_str(raw: &str) -> Result<Self, Self::Err> {
		match raw.trim().to_ascii_lowercase().as_str() {
			"user" => Ok(Self::User),
			"assistant" => Ok(Self::Assistant),
			"system" => Ok(Self::System),
			other => Err(format!("Unknown message role {other:?}.")),
		}
	}
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
	pub role: Role,
	pub content: String,
	#[serde(with = "crate::time_serde")]
	pub timestamp: OffsetDateTime,
	/// Caller-supplied idempotency key, only ever set on user messages.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub client_message_id: Option<String>,
}
impl ChatMessage {
	pub fn new(role: Role, content: impl Into<String>, timestamp: OffsetDateTime) -> Self {
		Self { role, content: content.into(), timestamp, client_message_id: None }
	}

	pub fn with_client_message_id(mut self, id: Option<String>) -> Self {
		self.client_message_id = id;

		self
	}
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
	pub note_id: String,
	pub note_context: String,
	#[serde(with = "crate::time_serde")]
	pub last_activity: OffsetDateTime,
}
