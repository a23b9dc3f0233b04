pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Contract violation: {message}")]
	Contract { message: String },
	#[error("Provider error: {message}")]
	Provider { message: String },
	#[error("Storage error: {message}")]
	Storage { message: String },
	#[error(transparent)]
	Serialization(#[from] serde_json::Error),
}
impl From<rp_domain::policy::RouterError> for Error {
	fn from(err: rp_domain::policy::RouterError) -> Self {
		Self::Contract { message: err.to_string() }
	}
}

impl From<rp_providers::Error> for Error {
	fn from(err: rp_providers::Error) -> Self {
		Self::Provider { message: err.to_string() }
	}
}

impl From<rp_storage::Error> for Error {
	fn from(err: rp_storage::Error) -> Self {
		Self::Storage { message: err.to_string() }
	}
}
