pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Not found: {message}")]
	NotFound { message: String },
	#[error("Conflict: {message}")]
	Conflict { message: String },
	/// Embedding provider failure. `message` is the provider's own wording.
	#[error("Provider error: {message}")]
	Provider { message: String },
	#[error("Storage error: {message}")]
	Storage { message: String },
}
impl Error {
	pub fn invalid(message: impl Into<String>) -> Self {
		Self::InvalidRequest { message: message.into() }
	}

	/// The message without the category prefix.
	pub fn message(&self) -> &str {
		match self {
			Self::InvalidRequest { message }
			| Self::NotFound { message }
			| Self::Conflict { message }
			| Self::Provider { message }
			| Self::Storage { message } => message,
		}
	}
}

impl From<anima_storage::Error> for Error {
	fn from(err: anima_storage::Error) -> Self {
		match err {
			anima_storage::Error::InvalidArgument(message) => Self::InvalidRequest { message },
			anima_storage::Error::NotFound(message) => Self::NotFound { message },
			anima_storage::Error::Conflict(message) => Self::Conflict { message },
			other @ (anima_storage::Error::Io(_)
			| anima_storage::Error::Decode { .. }
			| anima_storage::Error::SerdeJson(_)) => Self::Storage { message: other.to_string() },
		}
	}
}

impl From<anima_providers::Error> for Error {
	fn from(err: anima_providers::Error) -> Self {
		match err {
			anima_providers::Error::Upstream { message, .. }
			| anima_providers::Error::InvalidResponse { message } => Self::Provider { message },
			anima_providers::Error::InvalidConfig { message } => Self::InvalidRequest { message },
			other @ (anima_providers::Error::InvalidHeaderName(_)
			| anima_providers::Error::InvalidHeaderValue(_)) =>
				Self::InvalidRequest { message: other.to_string() },
			anima_providers::Error::Reqwest(inner) => Self::Provider { message: inner.to_string() },
		}
	}
}
