use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("I/O error at {path:?}: {source}")]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},
	#[error(transparent)]
	Json(#[from] serde_json::Error),
	#[error(transparent)]
	Reqwest(#[from] reqwest::Error),
	#[error("Dataset unavailable: {message}")]
	Unavailable { message: String },
	#[error("Mirror write failed: {message}")]
	Mirror { message: String },
}
