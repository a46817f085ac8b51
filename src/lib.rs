pub mod types;
pub mod error;
pub mod scheduler;
pub mod fuzzy;
pub mod storage;
pub mod provider;
pub mod navigator;
pub mod registry;
pub mod config;
pub mod cli;
pub mod cli_types;

// Re-export commonly used types
pub use types::*;
pub use error::{DocsError, Result};
pub use scheduler::FixedInterval;
pub use fuzzy::{fuzzy_filter, FuzzyMatch, DEFAULT_LIMIT};
pub use storage::{BuildOptions, IndexSnapshot};
pub use provider::{DocsProvider, DocsSource, GitHubViewMode, HttpDocsSource, RepoManifest};
pub use navigator::{FailurePolicy, IndexSettings, IndexState, RefreshReport, VersionIndex};
pub use registry::NavigatorSet;
pub use crate::config::NavigatorConfig;
pub use cli::CliApp;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
