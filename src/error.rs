use thiserror::Error;

/// Errors raised while fetching, parsing or indexing a documentation tree.
///
/// Refresh failures stay inside the refresh cycle that produced them. Readers of a
/// [`crate::VersionIndex`] never see them; they keep observing the last good snapshot.
#[derive(Debug, Error)]
pub enum DocsError {
    #[error("failed to fetch {uri}: {reason}")]
    Fetch { uri: String, reason: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("malformed documentation tree: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid entry `{key}`: {reason}")]
    Build { key: String, reason: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("index for `{0}` has not completed a refresh yet")]
    NotReady(String),

    #[error("refresh task failed: {0}")]
    Task(String),
}

impl DocsError {
    pub fn fetch(uri: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Fetch {
            uri: uri.into(),
            reason: reason.into(),
        }
    }

    pub fn build(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Build {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Network or transport failures reaching the data source.
    pub fn is_fetch(&self) -> bool {
        matches!(self, Self::Fetch { .. } | Self::Http(_))
    }

    pub fn is_parse(&self) -> bool {
        matches!(self, Self::Parse(_))
    }

    pub fn is_build(&self) -> bool {
        matches!(self, Self::Build { .. })
    }
}

impl From<::config::ConfigError> for DocsError {
    fn from(err: ::config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DocsError>;
