use ::config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{DocsError, Result};
use crate::fuzzy::DEFAULT_LIMIT;
use crate::navigator::{FailurePolicy, IndexSettings};
use crate::provider::{
    DocsProvider, DocsSource, HttpDocsSource, RepoManifest, DEFAULT_RAW_BASE, DEFAULT_WEB_BASE,
};

pub const ENV_PREFIX: &str = "DOCNAV";
pub const CONFIG_FILE_NAME: &str = "docnav.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavigatorConfig {
    pub repo: RepoManifest,
    /// Version tags to index, e.g. `latest` or `v5.2.0`.
    #[serde(default = "default_tags")]
    pub tags: Vec<String>,
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
    #[serde(default = "default_source_root")]
    pub source_root: String,
    #[serde(default = "default_limit")]
    pub default_limit: usize,
    #[serde(default)]
    pub failure_policy: FailurePolicy,
    #[serde(default = "default_raw_base")]
    pub raw_base: String,
    #[serde(default = "default_web_base")]
    pub web_base: String,
    #[serde(default)]
    pub docs_site: Option<String>,
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
}

fn default_tags() -> Vec<String> {
    vec!["latest".to_string()]
}

fn default_refresh_interval_secs() -> u64 {
    15 * 60
}

fn default_source_root() -> String {
    "src".to_string()
}

fn default_limit() -> usize {
    DEFAULT_LIMIT
}

fn default_raw_base() -> String {
    DEFAULT_RAW_BASE.to_string()
}

fn default_web_base() -> String {
    DEFAULT_WEB_BASE.to_string()
}

fn default_http_timeout_secs() -> u64 {
    30
}

const DEFAULTS: &str = r#"
[repo]
owner = "Snazzah"
name = "slash-create"
branch = "docs"
"#;

impl Default for NavigatorConfig {
    fn default() -> Self {
        Self {
            repo: RepoManifest {
                owner: "Snazzah".to_string(),
                name: "slash-create".to_string(),
                branch: "docs".to_string(),
                folder: None,
            },
            tags: default_tags(),
            refresh_interval_secs: default_refresh_interval_secs(),
            source_root: default_source_root(),
            default_limit: default_limit(),
            failure_policy: FailurePolicy::default(),
            raw_base: default_raw_base(),
            web_base: default_web_base(),
            docs_site: None,
            http_timeout_secs: default_http_timeout_secs(),
        }
    }
}

impl NavigatorConfig {
    /// Load configuration: built-in defaults, then `path` (or the user config file
    /// when `path` is `None`), then `DOCNAV__*` environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder =
            Config::builder().add_source(File::from_str(DEFAULTS, FileFormat::Toml));

        match path {
            Some(path) => {
                if !path.exists() {
                    return Err(DocsError::Config(format!(
                        "config file not found: {}",
                        path.display()
                    )));
                }
                builder = builder.add_source(File::from(path.to_path_buf()));
            }
            None => {
                if let Some(default_path) = Self::default_path() {
                    builder = builder.add_source(File::from(default_path).required(false));
                }
            }
        }

        let config: Self = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("tags")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// `docnav.toml` in the platform config directory.
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("dev", "docnav", "docnav")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("repo.owner", &self.repo.owner),
            ("repo.name", &self.repo.name),
            ("repo.branch", &self.repo.branch),
        ] {
            if value.trim().is_empty() {
                return Err(DocsError::Config(format!("`{field}` must not be empty")));
            }
        }
        if self.tags.iter().any(|t| t.trim().is_empty()) {
            return Err(DocsError::Config("tags must not be empty strings".to_string()));
        }
        if self.refresh_interval_secs == 0 {
            return Err(DocsError::Config(
                "`refresh_interval_secs` must be greater than zero".to_string(),
            ));
        }
        if self.default_limit == 0 {
            return Err(DocsError::Config(
                "`default_limit` must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn index_settings(&self) -> IndexSettings {
        IndexSettings {
            refresh_interval: self.refresh_interval(),
            source_root: self.source_root.clone(),
            failure_policy: self.failure_policy,
        }
    }

    pub fn provider_with(&self, source: Arc<dyn DocsSource>) -> DocsProvider {
        let provider = DocsProvider::new(source, self.repo.clone())
            .with_raw_base(&self.raw_base)
            .with_web_base(&self.web_base);
        match self.docs_site.as_deref() {
            Some(site) => provider.with_docs_site(site),
            None => provider,
        }
    }

    /// Provider backed by [`HttpDocsSource`].
    pub fn http_provider(&self) -> Result<DocsProvider> {
        let source = HttpDocsSource::new(Duration::from_secs(self.http_timeout_secs))?;
        Ok(self.provider_with(Arc::new(source)))
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| DocsError::Config(e.to_string()))
    }
}
