use axum::{
	Json, Router,
	extract::{Path, State},
	http::StatusCode,
	response::{IntoResponse, Response},
	routing::{get, post},
};
use serde::{Deserialize, Serialize};

use notemind_domain::ChatMessage;
use notemind_service::{
	Error, PostMessageReply, PostMessageRequest, QuestionsResult, SummaryResult,
};

use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitRequest {
	#[serde(default)]
	pub note_context: String,
}

#[derive(Debug, Deserialize)]
pub struct StoreMessageRequest {
	#[serde(default)]
	pub role: String,
	#[serde(default)]
	pub content: String,
}

#[derive(Debug, Serialize)]
pub struct OkResponse {
	pub ok: bool,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
	pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: String,
	message: String,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: &'static str,
	message: String,
}
impl ApiError {
	fn new(status: StatusCode, error_code: &'static str, message: impl Into<String>) -> Self {
		Self { status, error_code, message: message.into() }
	}
}

impl From<Error> for ApiError {
	fn from(err: Error) -> Self {
		let message = err.to_string();

		match err {
			Error::SessionNotInitialized { .. } =>
				Self::new(StatusCode::CONFLICT, "session_not_initialized", message),
			Error::InvalidInput { .. } => Self::new(StatusCode::BAD_REQUEST, "invalid_input", message),
			Error::NotFound { .. } => Self::new(StatusCode::NOT_FOUND, "not_found", message),
			Error::ModelCallFailed { .. } =>
				Self::new(StatusCode::BAD_GATEWAY, "model_call_failed", message),
			Error::Storage { .. } => {
				tracing::error!(error = %message, "Request failed on storage.");

				Self::new(StatusCode::INTERNAL_SERVER_ERROR, "storage", "Storage error.")
			},
			Error::ActorUnavailable { .. } => {
				tracing::error!(error = %message, "Session actor unavailable.");

				Self::new(StatusCode::INTERNAL_SERVER_ERROR, "actor_unavailable", message)
			},
		}
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body = ErrorBody { error_code: self.error_code.to_string(), message: self.message };

		(self.status, Json(body)).into_response()
	}
}

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/v1/notes/{note_id}/chat/init", post(init))
		.route("/v1/notes/{note_id}/chat/messages", post(post_message))
		.route("/v1/notes/{note_id}/chat/store", post(store_message))
		.route("/v1/notes/{note_id}/chat/history", get(history).delete(clear))
		.route("/v1/notes/{note_id}/workflows/summary", post(summarize))
		.route("/v1/notes/{note_id}/workflows/questions", post(questions))
		.with_state(state)
}

async fn health() -> StatusCode {
	StatusCode::OK
}

async fn init(
	State(state): State<AppState>,
	Path(note_id): Path<String>,
	Json(payload): Json<InitRequest>,
) -> Result<Json<OkResponse>, ApiError> {
	state.service.session(&note_id)?.init(&payload.note_context).await?;

	Ok(Json(OkResponse { ok: true }))
}

async fn post_message(
	State(state): State<AppState>,
	Path(note_id): Path<String>,
	Json(payload): Json<PostMessageRequest>,
) -> Result<Json<PostMessageReply>, ApiError> {
	let reply = state.service.session(&note_id)?.post_message(payload).await?;

	Ok(Json(reply))
}

async fn store_message(
	State(state): State<AppState>,
	Path(note_id): Path<String>,
	Json(payload): Json<StoreMessageRequest>,
) -> Result<Json<OkResponse>, ApiError> {
	state.service.session(&note_id)?.store_message(&payload.role, &payload.content).await?;

	Ok(Json(OkResponse { ok: true }))
}

async fn history(
	State(state): State<AppState>,
	Path(note_id): Path<String>,
) -> Result<Json<HistoryResponse>, ApiError> {
	let messages = state.service.session(&note_id)?.history().await?;

	Ok(Json(HistoryResponse { messages }))
}

async fn clear(
	State(state): State<AppState>,
	Path(note_id): Path<String>,
) -> Result<Json<OkResponse>, ApiError> {
	state.service.session(&note_id)?.clear().await?;

	Ok(Json(OkResponse { ok: true }))
}

async fn summarize(
	State(state): State<AppState>,
	Path(note_id): Path<String>,
) -> Result<Json<SummaryResult>, ApiError> {
	Ok(Json(state.service.summarize_note(&note_id).await?))
}

async fn questions(
	State(state): State<AppState>,
	Path(note_id): Path<String>,
) -> Result<Json<QuestionsResult>, ApiError> {
	Ok(Json(state.service.generate_questions(&note_id).await?))
}
