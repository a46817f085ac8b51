use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

use crate::error::{DocsError, Result};
use crate::types::{
    ChildRole, CorpusMeta, Descriptor, DescriptorMeta, DocumentationRoot, TopLevelDescriptor,
    TypeSymbol,
};

/// Knobs that shape how a raw tree is flattened.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Subfolder of the repository the documented package lives in. Stripped from
    /// every indexed `meta.path`.
    pub source_folder: Option<String>,
    /// Only files at or below this root are tracked as known files.
    pub source_root: String,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            source_folder: None,
            source_root: "src".to_string(),
        }
    }
}

/// Per-kind counts of the entries actually served. An entry replaced by a later
/// one with the same key is not counted, so the kind counts sum to the index length.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SnapshotStats {
    pub classes: usize,
    pub typedefs: usize,
    pub methods: usize,
    pub members: usize,
    pub events: usize,
    pub known_files: usize,
    /// Entries that replaced an earlier entry with the same key.
    pub overwritten: usize,
}

impl SnapshotStats {
    fn count_mut(&mut self, symbol: TypeSymbol) -> &mut usize {
        match symbol {
            TypeSymbol::Class => &mut self.classes,
            TypeSymbol::Typedef => &mut self.typedefs,
            TypeSymbol::Method => &mut self.methods,
            TypeSymbol::Member => &mut self.members,
            TypeSymbol::Event => &mut self.events,
        }
    }
}

/// Immutable, fully built index for one version tag.
///
/// Built privately by [`IndexSnapshot::build`] and published as a whole; nothing
/// mutates a snapshot once it exists.
#[derive(Debug)]
pub struct IndexSnapshot {
    tag: String,

    // Core data, in build order
    entries: Vec<Descriptor>,
    keys: Vec<String>,

    // Fast lookups
    key_index: HashMap<String, usize>,

    known_files: Vec<String>,

    // Whole-corpus view of the fetched tree
    meta: CorpusMeta,
    classes: Vec<Arc<TopLevelDescriptor>>,
    typedefs: Vec<Arc<TopLevelDescriptor>>,

    stats: SnapshotStats,
    fetched_at: DateTime<Utc>,
}

impl IndexSnapshot {
    /// Flatten `root` into a keyed index.
    ///
    /// Classes are indexed before typedefs, each followed by its methods, props and
    /// events. A key seen twice keeps its first position and takes the later value.
    pub fn build(
        tag: impl Into<String>,
        root: DocumentationRoot,
        options: &BuildOptions,
        fetched_at: DateTime<Utc>,
    ) -> Result<Self> {
        let mut builder = SnapshotBuilder::new(tag.into(), options, fetched_at);
        let DocumentationRoot {
            meta,
            classes,
            typedefs,
        } = root;

        builder.meta = meta;
        for class in classes {
            let class = builder.define(TypeSymbol::Class, class)?;
            builder.classes.push(class);
        }
        for typedef in typedefs {
            let typedef = builder.define(TypeSymbol::Typedef, typedef)?;
            builder.typedefs.push(typedef);
        }

        Ok(builder.finish())
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn get(&self, key: &str) -> Option<&Descriptor> {
        self.key_index.get(key).and_then(|&i| self.entries.get(i))
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.key_index.contains_key(key)
    }

    /// Composite keys in build order.
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn entries(&self) -> &[Descriptor] {
        &self.entries
    }

    pub fn known_files(&self) -> &[String] {
        &self.known_files
    }

    pub fn meta(&self) -> &CorpusMeta {
        &self.meta
    }

    pub fn classes(&self) -> &[Arc<TopLevelDescriptor>] {
        &self.classes
    }

    pub fn typedefs(&self) -> &[Arc<TopLevelDescriptor>] {
        &self.typedefs
    }

    pub fn stats(&self) -> &SnapshotStats {
        &self.stats
    }

    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

struct SnapshotBuilder<'a> {
    tag: String,
    options: &'a BuildOptions,
    entries: Vec<Descriptor>,
    keys: Vec<String>,
    key_index: HashMap<String, usize>,
    known_files: Vec<String>,
    seen_files: HashSet<String>,
    meta: CorpusMeta,
    classes: Vec<Arc<TopLevelDescriptor>>,
    typedefs: Vec<Arc<TopLevelDescriptor>>,
    stats: SnapshotStats,
    fetched_at: DateTime<Utc>,
}

impl<'a> SnapshotBuilder<'a> {
    fn new(tag: String, options: &'a BuildOptions, fetched_at: DateTime<Utc>) -> Self {
        Self {
            tag,
            options,
            entries: Vec::new(),
            keys: Vec::new(),
            key_index: HashMap::new(),
            known_files: Vec::new(),
            seen_files: HashSet::new(),
            meta: CorpusMeta::default(),
            classes: Vec::new(),
            typedefs: Vec::new(),
            stats: SnapshotStats::default(),
            fetched_at,
        }
    }

    fn define(
        &mut self,
        symbol: TypeSymbol,
        mut descriptor: TopLevelDescriptor,
    ) -> Result<Arc<TopLevelDescriptor>> {
        if descriptor.name.is_empty() {
            return Err(DocsError::build(
                format!("<{symbol}>"),
                "top-level entry has an empty name",
            ));
        }

        self.normalize_meta(descriptor.meta.as_mut());
        let children = [
            descriptor.methods.as_mut(),
            descriptor.props.as_mut(),
            descriptor.events.as_mut(),
        ];
        for child in children.into_iter().flatten().flatten() {
            // freshly parsed, so make_mut does not clone
            self.normalize_meta(Arc::make_mut(child).meta.as_mut());
        }

        let descriptor = Arc::new(descriptor);
        let top = Descriptor::top_level(symbol, Arc::clone(&descriptor));
        self.register_file(top.meta());
        self.insert(top);

        for role in ChildRole::ALL {
            for child in role.children(&descriptor) {
                if child.name.is_empty() {
                    return Err(DocsError::build(
                        format!("{}{}", descriptor.name, role.connector),
                        format!("entry in `{}` has an empty name", role.field),
                    ));
                }
                let entry = Descriptor::child(role.symbol, &descriptor, symbol, Arc::clone(child));
                self.register_file(entry.meta());
                self.insert(entry);
            }
        }

        Ok(descriptor)
    }

    fn insert(&mut self, descriptor: Descriptor) {
        let key = descriptor.key();
        *self.stats.count_mut(descriptor.symbol()) += 1;
        if let Some(&existing) = self.key_index.get(&key) {
            debug!(tag = %self.tag, key = %key, "duplicate key, keeping the later entry");
            let replaced = std::mem::replace(&mut self.entries[existing], descriptor);
            *self.stats.count_mut(replaced.symbol()) -= 1;
            self.stats.overwritten += 1;
            return;
        }

        let index = self.entries.len();
        self.entries.push(descriptor);
        self.keys.push(key.clone());
        self.key_index.insert(key, index);
    }

    /// Strip the repository subfolder from `meta.path`.
    fn normalize_meta(&self, meta: Option<&mut DescriptorMeta>) {
        let (Some(meta), Some(folder)) = (meta, self.options.source_folder.as_deref()) else {
            return;
        };
        let folder = folder.trim_matches('/');
        if folder.is_empty() {
            return;
        }
        if let Some(path) = meta.path.as_mut() {
            if let Some(rest) = path.strip_prefix(folder) {
                if rest.is_empty() || rest.starts_with('/') {
                    *path = rest.trim_start_matches('/').to_string();
                }
            }
        }
    }

    fn register_file(&mut self, meta: Option<&DescriptorMeta>) {
        let Some(file_path) = meta.and_then(DescriptorMeta::file_path) else {
            return;
        };
        let file_path = file_path.split('#').next().unwrap_or_default();
        if !is_under_root(file_path, &self.options.source_root) {
            debug!(tag = %self.tag, file = %file_path, "skipping file outside source root");
            return;
        }
        if self.seen_files.insert(file_path.to_string()) {
            self.known_files.push(file_path.to_string());
        }
    }

    fn finish(mut self) -> IndexSnapshot {
        self.stats.known_files = self.known_files.len();
        IndexSnapshot {
            tag: self.tag,
            entries: self.entries,
            keys: self.keys,
            key_index: self.key_index,
            known_files: self.known_files,
            meta: self.meta,
            classes: self.classes,
            typedefs: self.typedefs,
            stats: self.stats,
            fetched_at: self.fetched_at,
        }
    }
}

fn is_under_root(path: &str, root: &str) -> bool {
    let root = root.trim_matches('/');
    if root.is_empty() {
        return true;
    }
    match path.strip_prefix(root) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}
