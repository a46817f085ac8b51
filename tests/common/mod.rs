#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

use docnav::{DocsError, DocsProvider, DocsSource, RepoManifest};

/// In-memory documentation source. While gated, each fetch waits for a permit so a
/// test can hold a refresh at the fetch step.
pub struct MockSource {
    payload: Mutex<std::result::Result<Vec<u8>, String>>,
    calls: AtomicUsize,
    uris: Mutex<Vec<String>>,
    gated: AtomicBool,
    gate: Semaphore,
}

impl MockSource {
    pub fn new(payload: Value) -> Arc<Self> {
        Arc::new(Self {
            payload: Mutex::new(Ok(payload.to_string().into_bytes())),
            calls: AtomicUsize::new(0),
            uris: Mutex::new(Vec::new()),
            gated: AtomicBool::new(false),
            gate: Semaphore::new(0),
        })
    }

    pub fn failing(reason: &str) -> Arc<Self> {
        let source = Self::new(json!({}));
        source.set_failure(reason);
        source
    }

    pub fn set_payload(&self, payload: Value) {
        *self.payload.lock() = Ok(payload.to_string().into_bytes());
    }

    pub fn set_raw(&self, raw: &[u8]) {
        *self.payload.lock() = Ok(raw.to_vec());
    }

    pub fn set_failure(&self, reason: &str) {
        *self.payload.lock() = Err(reason.to_string());
    }

    /// Block fetches until `release` is called.
    pub fn close_gate(&self) {
        self.gated.store(true, Ordering::SeqCst);
    }

    pub fn release(&self, fetches: usize) {
        self.gate.add_permits(fetches);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn uris(&self) -> Vec<String> {
        self.uris.lock().clone()
    }
}

#[async_trait]
impl DocsSource for MockSource {
    async fn fetch_document_tree(&self, uri: &str) -> docnav::Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.uris.lock().push(uri.to_string());
        if self.gated.load(Ordering::SeqCst) {
            if let Ok(permit) = self.gate.acquire().await {
                permit.forget();
            }
        }
        self.payload
            .lock()
            .clone()
            .map_err(|reason| DocsError::fetch(uri, reason))
    }
}

pub fn manifest() -> RepoManifest {
    RepoManifest {
        owner: "acme".to_string(),
        name: "widgets".to_string(),
        branch: "docs".to_string(),
        folder: None,
    }
}

pub fn provider(source: Arc<MockSource>) -> DocsProvider {
    DocsProvider::new(source, manifest()).with_docs_site("https://widgets.acme.dev")
}

/// One class `Foo` with method `bar`, member `baz` and event `ready`.
pub fn foo_tree() -> Value {
    json!({
        "meta": { "generator": "0.9.0", "format": 20, "date": 1700000000000i64 },
        "classes": [{
            "name": "Foo",
            "description": "A foo.",
            "meta": { "line": 4, "file": "Foo.ts", "path": "src/structures" },
            "methods": [{
                "name": "bar",
                "meta": { "line": 20, "file": "Foo.ts", "path": "src/structures" }
            }],
            "props": [{ "name": "baz" }],
            "events": [{
                "name": "ready",
                "meta": { "line": 40, "file": "events.ts", "path": "src/util" }
            }]
        }],
        "typedefs": [{
            "name": "FooOptions",
            "meta": { "line": 1, "file": "types.d.ts", "path": "typings" },
            "props": [{ "name": "timeout" }]
        }]
    })
}

pub fn classes(names: &[&str]) -> Value {
    let classes: Vec<Value> = names.iter().map(|name| json!({ "name": name })).collect();
    json!({ "meta": {}, "classes": classes, "typedefs": [] })
}

/// Poll `condition` until it holds or ten seconds pass.
pub async fn wait_until(condition: impl Fn() -> bool) -> bool {
    for _ in 0..2000 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}
