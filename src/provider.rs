use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::error::{DocsError, Result};
use crate::types::{Descriptor, TypeSymbol};

pub const DEFAULT_RAW_BASE: &str = "https://raw.githubusercontent.com";
pub const DEFAULT_WEB_BASE: &str = "https://github.com";

/// Where documentation trees come from.
#[async_trait]
pub trait DocsSource: Send + Sync {
    /// Fetch the raw JSON payload at `uri`.
    async fn fetch_document_tree(&self, uri: &str) -> Result<Vec<u8>>;
}

/// [`DocsSource`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpDocsSource {
    client: reqwest::Client,
}

impl HttpDocsSource {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DocsSource for HttpDocsSource {
    async fn fetch_document_tree(&self, uri: &str) -> Result<Vec<u8>> {
        debug!(uri, "fetching documentation tree");
        let response = self.client.get(uri).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DocsError::fetch(uri, format!("unexpected status {status}")));
        }
        Ok(response.bytes().await?.to_vec())
    }
}

/// Repository fields the index consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepoManifest {
    pub owner: String,
    pub name: String,
    /// Ref the documentation JSON files are published on.
    pub branch: String,
    /// Subfolder holding the documented package, if not the repository root.
    #[serde(default)]
    pub folder: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GitHubViewMode {
    #[default]
    Tree,
    Blob,
}

impl fmt::Display for GitHubViewMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            GitHubViewMode::Tree => "tree",
            GitHubViewMode::Blob => "blob",
        })
    }
}

/// Source of documentation plus the URL scheme of the repository behind it.
#[derive(Clone)]
pub struct DocsProvider {
    source: Arc<dyn DocsSource>,
    manifest: RepoManifest,
    raw_base: String,
    web_base: String,
    docs_site: Option<String>,
}

impl fmt::Debug for DocsProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocsProvider")
            .field("manifest", &self.manifest)
            .field("raw_base", &self.raw_base)
            .field("web_base", &self.web_base)
            .field("docs_site", &self.docs_site)
            .finish_non_exhaustive()
    }
}

impl DocsProvider {
    pub fn new(source: Arc<dyn DocsSource>, manifest: RepoManifest) -> Self {
        Self {
            source,
            manifest,
            raw_base: DEFAULT_RAW_BASE.to_string(),
            web_base: DEFAULT_WEB_BASE.to_string(),
            docs_site: None,
        }
    }

    pub fn with_raw_base(mut self, raw_base: impl Into<String>) -> Self {
        self.raw_base = raw_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_web_base(mut self, web_base: impl Into<String>) -> Self {
        self.web_base = web_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_docs_site(mut self, docs_site: impl Into<String>) -> Self {
        self.docs_site = Some(docs_site.into().trim_end_matches('/').to_string());
        self
    }

    pub fn manifest(&self) -> &RepoManifest {
        &self.manifest
    }

    pub async fn fetch(&self, uri: &str) -> Result<Vec<u8>> {
        self.source.fetch_document_tree(uri).await
    }

    fn repo_path(&self) -> String {
        format!("{}/{}", self.manifest.owner, self.manifest.name)
    }

    /// Raw base of the documentation branch, `branch` defaulting to the manifest's.
    pub fn raw_docs_url(&self, branch: Option<&str>) -> String {
        let branch = branch.unwrap_or(&self.manifest.branch);
        format!("{}/{}/{}", self.raw_base, self.repo_path(), branch)
    }

    /// JSON documentation tree for `tag`.
    pub fn target_uri(&self, tag: &str) -> String {
        format!("{}/{}.json", self.raw_docs_url(None), tag)
    }

    pub fn web_repo_url(&self, tag: &str, view: GitHubViewMode) -> String {
        format!("{}/{}/{}/{}", self.web_base, self.repo_path(), view, tag)
    }

    /// Raw file root at `tag`, including the package subfolder.
    pub fn raw_repo_url(&self, tag: &str) -> String {
        let base = format!("{}/{}/{}", self.raw_base, self.repo_path(), tag);
        match self.folder() {
            Some(folder) => format!("{base}/{folder}"),
            None => base,
        }
    }

    /// Blob URL of `file` at `tag`. Zero line numbers are left out of the anchor.
    pub fn code_file_url(&self, tag: &str, file: &str, line_range: (u32, Option<u32>)) -> String {
        let anchor = [Some(line_range.0), line_range.1]
            .into_iter()
            .flatten()
            .filter(|&line| line != 0)
            .map(|line| format!("L{line}"))
            .collect::<Vec<_>>()
            .join("-");
        let base = self.web_repo_url(tag, GitHubViewMode::Blob);
        let url = match self.folder() {
            Some(folder) => format!("{base}/{folder}/{file}"),
            None => format!("{base}/{file}"),
        };
        if anchor.is_empty() {
            url
        } else {
            format!("{url}#{anchor}")
        }
    }

    pub fn raw_file_url(&self, tag: &str, file: &str) -> String {
        format!("{}/{}", self.raw_repo_url(tag), file)
    }

    /// Page of a class or typedef on the documentation site.
    pub fn part_docs_url(&self, tag: &str, species: &str, type_name: &str) -> Option<String> {
        let site = self.docs_site.as_deref()?;
        Some(format!("{site}/#/docs/main/{tag}/{species}/{type_name}"))
    }

    /// Documentation site page of `descriptor`, scrolled to the child entry.
    pub fn docs_url(&self, tag: &str, descriptor: &Descriptor) -> Option<String> {
        match descriptor.parent() {
            None => self.part_docs_url(tag, descriptor.symbol().as_str(), descriptor.name()),
            Some(parent) => {
                let page = self.part_docs_url(tag, parent.symbol.as_str(), &parent.name)?;
                let anchor = match descriptor.symbol() {
                    TypeSymbol::Event => format!("e-{}", descriptor.name()),
                    _ => descriptor.name().to_string(),
                };
                Some(format!("{page}?scrollTo={anchor}"))
            }
        }
    }

    fn folder(&self) -> Option<&str> {
        self.manifest
            .folder
            .as_deref()
            .map(|f| f.trim_matches('/'))
            .filter(|f| !f.is_empty())
    }
}
