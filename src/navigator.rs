//! Per-version documentation index.
//!
//! A [`VersionIndex`] owns one tag's lifecycle: it refreshes on a fixed interval,
//! flattens each fetched tree into an [`IndexSnapshot`] and serves lookups and fuzzy
//! search over whichever snapshot is live.
//!
//! Snapshots are built off to the side and published with a single pointer swap, so a
//! reader sees either the previous snapshot or the new one, never a half-built index.
//! Clearing the live index before the fetch would make every refresh window serve
//! empty results; the swap is the only place that ordering matters.

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::{DocsError, Result};
use crate::fuzzy::{fuzzy_filter, FuzzyMatch};
use crate::provider::{DocsProvider, GitHubViewMode};
use crate::scheduler::{FixedInterval, TickFn};
use crate::storage::{BuildOptions, IndexSnapshot};
use crate::types::{join_key, ChildRole, CorpusMeta, Descriptor, DocumentationRoot};

pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// What a failed refresh does to the snapshot already being served.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Keep serving the last good snapshot.
    #[default]
    KeepLastGood,
    /// Drop the snapshot and become not-ready until a refresh succeeds.
    Clear,
}

#[derive(Debug, Clone)]
pub struct IndexSettings {
    pub refresh_interval: Duration,
    pub source_root: String,
    pub failure_policy: FailurePolicy,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            source_root: BuildOptions::default().source_root,
            failure_policy: FailurePolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexState {
    NotReady,
    Rebuilding,
    Ready,
}

/// Summary of one successful rebuild.
#[derive(Debug, Clone, Serialize)]
pub struct RefreshReport {
    pub tag: String,
    pub entries: usize,
    pub files: usize,
    pub fetched_at: DateTime<Utc>,
    pub elapsed: Duration,
}

pub type RefreshResult = std::result::Result<RefreshReport, Arc<DocsError>>;
type SharedRefresh = Shared<BoxFuture<'static, RefreshResult>>;

pub struct VersionIndex {
    tag: String,
    provider: DocsProvider,
    settings: IndexSettings,
    build_options: BuildOptions,

    snapshot: RwLock<Option<Arc<IndexSnapshot>>>,
    in_flight: Mutex<Option<SharedRefresh>>,
    ready: watch::Sender<bool>,

    interval: FixedInterval,
}

impl std::fmt::Debug for VersionIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionIndex")
            .field("tag", &self.tag)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl VersionIndex {
    /// Create an index without starting its schedule. Nothing is fetched until
    /// [`VersionIndex::refresh`] or [`VersionIndex::start`] is called.
    pub fn new(tag: impl Into<String>, provider: DocsProvider, settings: IndexSettings) -> Arc<Self> {
        let tag = tag.into();
        let build_options = BuildOptions {
            source_folder: provider.manifest().folder.clone(),
            source_root: settings.source_root.clone(),
        };
        let (ready, _) = watch::channel(false);

        Arc::new(Self {
            interval: FixedInterval::new(format!("refresh:{tag}")),
            tag,
            provider,
            settings,
            build_options,
            snapshot: RwLock::new(None),
            in_flight: Mutex::new(None),
            ready,
        })
    }

    /// Create an index, start its refresh schedule and kick off the first refresh.
    /// Must be called within a Tokio runtime.
    pub fn spawn(tag: impl Into<String>, provider: DocsProvider, settings: IndexSettings) -> Arc<Self> {
        let index = Self::new(tag, provider, settings);
        index.start(false);
        index
    }

    /// Start (or with `force`, restart) the refresh schedule and trigger a refresh.
    pub fn start(self: &Arc<Self>, force: bool) {
        let weak = Arc::downgrade(self);
        let callback: TickFn = Arc::new(move || {
            let weak = weak.clone();
            async move {
                match weak.upgrade() {
                    Some(index) => index
                        .refresh()
                        .await
                        .map(|_| ())
                        .map_err(anyhow::Error::new),
                    None => Ok(()),
                }
            }
            .boxed()
        });

        let period = self.settings.refresh_interval;
        if self
            .interval
            .start(period, Duration::ZERO, false, callback, force)
        {
            drop(self.begin_refresh());
        }
    }

    /// Stop the refresh schedule. The current snapshot stays readable.
    pub fn shutdown(&self) {
        self.interval.stop();
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn provider(&self) -> &DocsProvider {
        &self.provider
    }

    pub fn ready(&self) -> bool {
        *self.ready.borrow()
    }

    pub fn state(&self) -> IndexState {
        if self.in_flight.lock().is_some() {
            IndexState::Rebuilding
        } else if self.snapshot.read().is_some() {
            IndexState::Ready
        } else {
            IndexState::NotReady
        }
    }

    /// Resolves once a snapshot is ready. Immediately if one already is.
    pub async fn await_ready(&self) {
        let mut rx = self.ready.subscribe();
        // the sender lives as long as `self`
        let _ = rx.wait_for(|ready| *ready).await;
    }

    /// The live snapshot, if any. Holds no lock once returned.
    pub fn snapshot(&self) -> Option<Arc<IndexSnapshot>> {
        self.snapshot.read().clone()
    }

    pub fn try_snapshot(&self) -> Result<Arc<IndexSnapshot>> {
        self.snapshot()
            .ok_or_else(|| DocsError::NotReady(self.tag.clone()))
    }

    pub fn meta(&self) -> Option<CorpusMeta> {
        self.snapshot().map(|s| s.meta().clone())
    }

    pub fn fetched_at(&self) -> Option<DateTime<Utc>> {
        self.snapshot().map(|s| s.fetched_at())
    }

    pub fn len(&self) -> usize {
        self.snapshot().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, key: &str) -> Option<Descriptor> {
        self.snapshot.read().as_ref()?.get(key).cloned()
    }

    /// Look an entry up by parent and optional child name, trying each child
    /// connector in turn.
    pub fn find(&self, parent: &str, child: Option<&str>) -> Option<Descriptor> {
        let snapshot = self.snapshot()?;
        let Some(child) = child.filter(|c| !c.is_empty()) else {
            return snapshot.get(parent).cloned();
        };
        ChildRole::ALL.iter().find_map(|role| {
            snapshot
                .get(&join_key(&[parent, child], role.connector))
                .cloned()
        })
    }

    pub fn keys(&self) -> Vec<String> {
        self.snapshot()
            .map(|s| s.keys().to_vec())
            .unwrap_or_default()
    }

    pub fn known_files(&self) -> Vec<String> {
        self.snapshot()
            .map(|s| s.known_files().to_vec())
            .unwrap_or_default()
    }

    /// Fuzzy search over entry keys. Empty until the first refresh completes.
    pub fn filter_entities(&self, query: &str, limit: usize) -> Vec<FuzzyMatch> {
        match self.snapshot() {
            Some(snapshot) => fuzzy_filter(query, snapshot.keys().iter().map(String::as_str), limit),
            None => Vec::new(),
        }
    }

    /// Fuzzy search over known source files. Empty until the first refresh completes.
    pub fn filter_files(&self, query: &str, limit: usize) -> Vec<FuzzyMatch> {
        match self.snapshot() {
            Some(snapshot) => fuzzy_filter(
                query,
                snapshot.known_files().iter().map(String::as_str),
                limit,
            ),
            None => Vec::new(),
        }
    }

    /// Rebuild the index now. Joins the refresh already in flight, if any.
    pub async fn refresh(self: &Arc<Self>) -> RefreshResult {
        self.begin_refresh().await
    }

    fn begin_refresh(self: &Arc<Self>) -> SharedRefresh {
        let mut slot = self.in_flight.lock();
        if let Some(pending) = slot.as_ref() {
            debug!(tag = %self.tag, "joining in-flight refresh");
            return pending.clone();
        }

        let this = Arc::clone(self);
        let task = tokio::spawn(async move {
            let result = match AssertUnwindSafe(this.rebuild()).catch_unwind().await {
                Ok(result) => result,
                Err(_) => Err(Arc::new(DocsError::Task(format!(
                    "refresh of `{}` panicked",
                    this.tag
                )))),
            };
            this.in_flight.lock().take();
            result
        });

        let shared = async move {
            match task.await {
                Ok(result) => result,
                Err(e) => Err(Arc::new(DocsError::Task(e.to_string()))),
            }
        }
        .boxed()
        .shared();
        *slot = Some(shared.clone());
        shared
    }

    async fn rebuild(&self) -> RefreshResult {
        let started = Instant::now();
        let uri = self.provider.target_uri(&self.tag);
        debug!(tag = %self.tag, uri = %uri, "refreshing documentation index");

        match self.fetch_and_build(&uri).await {
            Ok(snapshot) => {
                let report = RefreshReport {
                    tag: self.tag.clone(),
                    entries: snapshot.len(),
                    files: snapshot.known_files().len(),
                    fetched_at: snapshot.fetched_at(),
                    elapsed: started.elapsed(),
                };
                self.publish(Arc::new(snapshot));
                info!(
                    tag = %self.tag,
                    entries = report.entries,
                    files = report.files,
                    elapsed_ms = report.elapsed.as_millis() as u64,
                    "documentation index ready"
                );
                Ok(report)
            }
            Err(e) => {
                self.handle_failure(&e);
                Err(Arc::new(e))
            }
        }
    }

    async fn fetch_and_build(&self, uri: &str) -> Result<IndexSnapshot> {
        let payload = self.provider.fetch(uri).await?;
        let fetched_at = Utc::now();

        let tag = self.tag.clone();
        let options = self.build_options.clone();
        tokio::task::spawn_blocking(move || -> Result<IndexSnapshot> {
            let root = DocumentationRoot::from_slice(&payload)?;
            IndexSnapshot::build(tag, root, &options, fetched_at)
        })
        .await
        .map_err(|e| DocsError::Task(e.to_string()))?
    }

    fn publish(&self, snapshot: Arc<IndexSnapshot>) {
        *self.snapshot.write() = Some(snapshot);
        self.ready.send_replace(true);
    }

    fn handle_failure(&self, error: &DocsError) {
        let had_snapshot = self.snapshot.read().is_some();
        match (self.settings.failure_policy, had_snapshot) {
            (FailurePolicy::KeepLastGood, true) => {
                warn!(tag = %self.tag, error = %error, "refresh failed, serving previous snapshot");
            }
            (FailurePolicy::Clear, true) => {
                warn!(tag = %self.tag, error = %error, "refresh failed, clearing snapshot");
                *self.snapshot.write() = None;
                self.ready.send_replace(false);
            }
            (_, false) => {
                warn!(tag = %self.tag, error = %error, "refresh failed, index not ready");
            }
        }
    }

    pub fn base_repo_url(&self, view: GitHubViewMode) -> String {
        self.provider.web_repo_url(&self.tag, view)
    }

    pub fn code_file_url(&self, file: &str, line_range: (u32, Option<u32>)) -> String {
        self.provider.code_file_url(&self.tag, file, line_range)
    }

    pub fn raw_file_url(&self, file: &str) -> String {
        self.provider.raw_file_url(&self.tag, file)
    }

    pub fn docs_url(&self, descriptor: &Descriptor) -> Option<String> {
        self.provider.docs_url(&self.tag, descriptor)
    }

    pub fn part_docs_url(&self, species: &str, type_name: &str) -> Option<String> {
        self.provider.part_docs_url(&self.tag, species, type_name)
    }
}
