pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Session {session_key} is not initialized.")]
	SessionNotInitialized { session_key: String },
	#[error("Invalid input: {message}")]
	InvalidInput { message: String },
	#[error("Model call failed: {message}")]
	ModelCallFailed { message: String },
	#[error("Not found: {message}")]
	NotFound { message: String },
	#[error("Storage error: {message}")]
	Storage { message: String },
	#[error("Session actor unavailable: {message}")]
	ActorUnavailable { message: String },
}
impl Error {
	pub fn invalid_input(message: impl Into<String>) -> Self {
		Self::InvalidInput { message: message.into() }
	}
}

impl From<notemind_storage::Error> for Error {
	fn from(err: notemind_storage::Error) -> Self {
		match err {
			notemind_storage::Error::Sqlx(inner) => Self::Storage { message: inner.to_string() },
			notemind_storage::Error::InvalidArgument(message) => Self::InvalidInput { message },
		}
	}
}
