use dashmap::DashMap;
use futures::future::join_all;
use std::sync::Arc;
use tracing::info;

use crate::navigator::{IndexSettings, RefreshResult, VersionIndex};
use crate::provider::DocsProvider;

/// Owns one [`VersionIndex`] per tracked tag.
///
/// Handed to consumers by reference; there is no process-wide registry.
pub struct NavigatorSet {
    provider: DocsProvider,
    settings: IndexSettings,
    indices: DashMap<String, Arc<VersionIndex>>,
}

impl NavigatorSet {
    pub fn new(provider: DocsProvider, settings: IndexSettings) -> Self {
        Self {
            provider,
            settings,
            indices: DashMap::new(),
        }
    }

    /// Index for `tag`, spawning and scheduling it on first use.
    pub fn track(&self, tag: &str) -> Arc<VersionIndex> {
        self.indices
            .entry(tag.to_string())
            .or_insert_with(|| {
                info!(tag, "tracking documentation version");
                VersionIndex::spawn(tag, self.provider.clone(), self.settings.clone())
            })
            .clone()
    }

    /// Track every tag in `tags`, returning them in the same order.
    pub fn track_all<S: AsRef<str>>(&self, tags: &[S]) -> Vec<Arc<VersionIndex>> {
        tags.iter().map(|tag| self.track(tag.as_ref())).collect()
    }

    pub fn get(&self, tag: &str) -> Option<Arc<VersionIndex>> {
        self.indices.get(tag).map(|entry| entry.value().clone())
    }

    /// Stop refreshing `tag` and drop it from the set.
    pub fn untrack(&self, tag: &str) -> Option<Arc<VersionIndex>> {
        let (_, index) = self.indices.remove(tag)?;
        index.shutdown();
        info!(tag, "stopped tracking documentation version");
        Some(index)
    }

    /// Tracked tags, sorted.
    pub fn tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = self.indices.iter().map(|e| e.key().clone()).collect();
        tags.sort();
        tags
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    fn all(&self) -> Vec<Arc<VersionIndex>> {
        self.indices.iter().map(|e| e.value().clone()).collect()
    }

    pub async fn await_all_ready(&self) {
        join_all(self.all().iter().map(|index| index.await_ready())).await;
    }

    /// Refresh every tracked tag concurrently.
    pub async fn refresh_all(&self) -> Vec<(String, RefreshResult)> {
        let indices = self.all();
        let results = join_all(indices.iter().map(|index| index.refresh())).await;
        indices
            .iter()
            .map(|index| index.tag().to_string())
            .zip(results)
            .collect()
    }
}

impl Drop for NavigatorSet {
    fn drop(&mut self) {
        for entry in self.indices.iter() {
            entry.value().shutdown();
        }
    }
}
