use std::path::{Path, PathBuf};
use thiserror::Error;

/// A specialized Result type for bibliography maintenance operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while maintaining the bibliography.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("XML error: {0}")]
    Xml(String),

    #[error("{service} returned status {status}")]
    Api { service: &'static str, status: u16 },

    #[error("Invalid value for {field}: {message}")]
    InvalidArgument { field: &'static str, message: String },

    #[error("Member '{slug}' not found (expected {})", expected.display())]
    MemberNotFound {
        slug: String,
        expected: PathBuf,
        available: Vec<String>,
        remaining: usize,
    },

    #[error("No unused BibTeX key left for base '{0}'")]
    KeysExhausted(String),

    #[error("No members found in {}", dir.display())]
    NoMembers { dir: PathBuf },
}

impl Error {
    /// Wraps an IO error with the path that caused it.
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub(crate) fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Error::InvalidArgument {
            field,
            message: message.into(),
        }
    }
}

impl From<quick_xml::Error> for Error {
    fn from(err: quick_xml::Error) -> Self {
        Error::Xml(err.to_string())
    }
}

impl From<quick_xml::events::attributes::AttrError> for Error {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        Error::Xml(err.to_string())
    }
}
