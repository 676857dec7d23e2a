use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// The project root could not be traversed. Aborts the whole run.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("project root not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("project root is not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("cannot read project root {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Bad options or configuration, detected before any file is processed.
#[derive(Debug, Error)]
pub enum InvocationError {
    #[error("unknown suffix mode `{0}` (expected `append` or `replace`)")]
    UnknownSuffixMode(String),

    #[error("concurrency must be at least 1")]
    InvalidConcurrency,

    #[error("extension filter must not be empty")]
    EmptyExtension,

    #[error("test suffix must not be empty")]
    EmptySuffix,

    #[error("invalid mirror directory name `{0}`")]
    InvalidMirrorDir(String),

    #[error("unknown generator `{0}`")]
    UnknownGenerator(String),

    #[error("unknown LLM provider `{0}`")]
    UnknownProvider(String),

    #[error("no API key configured for provider `{0}`")]
    MissingApiKey(String),

    #[error("config file {}: {message}", path.display())]
    Config { path: PathBuf, message: String },

    #[error("cannot build HTTP client: {0}")]
    HttpClient(String),
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error(transparent)]
    Invocation(#[from] InvocationError),
}
