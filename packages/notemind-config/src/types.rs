use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	#[serde(default)]
	pub session: Session,
	#[serde(default)]
	pub pipelines: Pipelines,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub log_level: String,
}

#[derive(Debug, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
}

#[derive(Debug, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

#[derive(Debug, Deserialize)]
pub struct Providers {
	pub llm: LlmProviderConfig,
}

#[derive(Clone, Debug, Deserialize)]
pub struct LlmProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Session {
	/// Hours without activity before an idle wake-up drops the stored history.
	pub idle_timeout_hours: i64,
	pub max_stored_messages: u32,
	/// Number of most recent messages handed to the model on every reply.
	pub context_window_messages: u32,
	pub max_message_chars: u32,
	pub max_note_context_chars: u32,
	pub mailbox_capacity: u32,
	pub chat: Generation,
}
impl Default for Session {
	fn default() -> Self {
		Self {
			idle_timeout_hours: 24,
			max_stored_messages: 50,
			context_window_messages: 10,
			max_message_chars: 2_000,
			max_note_context_chars: 4_000,
			mailbox_capacity: 64,
			chat: Generation { max_tokens: 1_024, temperature: 0.7 },
		}
	}
}

#[derive(Clone, Copy, Debug, Deserialize)]
pub struct Generation {
	pub max_tokens: u32,
	pub temperature: f32,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Pipelines {
	/// Note content is cut to this many characters before it is placed in a stage prompt.
	pub max_content_chars: u32,
}
impl Default for Pipelines {
	fn default() -> Self {
		Self { max_content_chars: 8_000 }
	}
}
