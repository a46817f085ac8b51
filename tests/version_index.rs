mod common;

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use common::{classes, foo_tree, provider, wait_until, MockSource};
use docnav::{
    FailurePolicy, GitHubViewMode, IndexSettings, IndexState, TypeSymbol, VersionIndex,
    DEFAULT_LIMIT,
};

fn detached(source: Arc<MockSource>) -> Arc<VersionIndex> {
    VersionIndex::new("v5", provider(source), IndexSettings::default())
}

#[tokio::test]
async fn test_not_ready_before_first_refresh() {
    let source = MockSource::new(foo_tree());
    let index = detached(source.clone());

    assert!(!index.ready());
    assert_eq!(index.state(), IndexState::NotReady);
    assert!(index.get("Foo").is_none());
    assert!(index.filter_entities("foo", DEFAULT_LIMIT).is_empty());
    assert!(index.filter_files("src", DEFAULT_LIMIT).is_empty());
    assert!(index.meta().is_none());
    assert!(index.fetched_at().is_none());
    assert!(index.try_snapshot().is_err());
    assert_eq!(source.calls(), 0);
}

#[tokio::test]
async fn test_refresh_flattens_tree() {
    let source = MockSource::new(foo_tree());
    let index = detached(source.clone());

    let report = index.refresh().await.expect("refresh");
    assert_eq!(report.tag, "v5");
    assert_eq!(report.entries, 6);
    assert!(index.ready());
    assert_eq!(index.state(), IndexState::Ready);

    assert_eq!(
        index.keys(),
        vec!["Foo", "Foo#bar", "Foo~baz", "Foo$ready", "FooOptions", "FooOptions~timeout"]
    );
    assert_eq!(index.get("Foo").unwrap().symbol(), TypeSymbol::Class);
    assert_eq!(index.get("Foo#bar").unwrap().symbol(), TypeSymbol::Method);
    assert_eq!(index.get("Foo~baz").unwrap().symbol(), TypeSymbol::Member);
    assert_eq!(index.get("Foo$ready").unwrap().symbol(), TypeSymbol::Event);
    assert_eq!(index.get("FooOptions").unwrap().symbol(), TypeSymbol::Typedef);

    let meta = index.meta().expect("meta once ready");
    assert_eq!(meta.format_version(), Some(20));
    assert!(index.fetched_at().is_some());

    assert_eq!(
        source.uris(),
        vec!["https://raw.githubusercontent.com/acme/widgets/docs/v5.json"]
    );
}

#[tokio::test]
async fn test_non_numeric_corpus_meta_still_indexes() {
    let source = MockSource::new(json!({
        "meta": { "format": "20", "date": "2024-01-01T00:00:00Z" },
        "classes": [{ "name": "Foo", "methods": [{ "name": "bar" }] }]
    }));
    let index = detached(source);

    index.refresh().await.expect("refresh");
    assert!(index.ready());
    assert!(index.get("Foo#bar").is_some());

    let meta = index.meta().unwrap();
    assert_eq!(meta.date, Some(json!("2024-01-01T00:00:00Z")));
    assert_eq!(meta.date_millis(), None);
}

#[tokio::test]
async fn test_find_tries_each_connector() {
    let index = detached(MockSource::new(foo_tree()));
    index.refresh().await.unwrap();

    assert_eq!(index.find("Foo", Some("bar")).unwrap().key(), "Foo#bar");
    assert_eq!(index.find("Foo", Some("baz")).unwrap().key(), "Foo~baz");
    assert_eq!(index.find("Foo", Some("ready")).unwrap().key(), "Foo$ready");
    assert_eq!(index.find("Foo", None).unwrap().key(), "Foo");
    assert!(index.find("Foo", Some("missing")).is_none());
}

#[tokio::test]
async fn test_filter_entities_ranks_matches() {
    let index = detached(MockSource::new(classes(&["Foo", "Foobar", "Bar"])));
    index.refresh().await.unwrap();

    let results = index.filter_entities("fo", 5);
    assert!(results.len() <= 5);
    let values: Vec<&str> = results.iter().map(|m| m.value.as_str()).collect();
    assert!(values.len() >= 2);
    assert!(values[..2].contains(&"Foo"));
    assert!(values[..2].contains(&"Foobar"));
    if let Some(position) = values.iter().position(|v| *v == "Bar") {
        assert!(position >= 2);
    }

    assert!(index.filter_entities("", 5).is_empty());
}

#[tokio::test]
async fn test_filter_files_only_in_tree_paths() {
    let index = detached(MockSource::new(foo_tree()));
    index.refresh().await.unwrap();

    assert_eq!(
        index.known_files(),
        vec!["src/structures/Foo.ts", "src/util/events.ts"]
    );
    let results = index.filter_files("ts", DEFAULT_LIMIT);
    assert!(!results.is_empty());
    assert!(results.iter().all(|m| m.value.starts_with("src/")));
    assert!(index.filter_files("typings", DEFAULT_LIMIT).is_empty());
}

#[tokio::test]
async fn test_failed_first_refresh_stays_not_ready() {
    let source = MockSource::failing("connection refused");
    let index = detached(source.clone());

    let err = index.refresh().await.unwrap_err();
    assert!(err.is_fetch());
    assert!(!index.ready());
    assert_eq!(index.state(), IndexState::NotReady);
    assert!(index.keys().is_empty());
    assert!(index.filter_entities("foo", DEFAULT_LIMIT).is_empty());
}

#[tokio::test]
async fn test_failed_refresh_keeps_previous_snapshot() {
    let source = MockSource::new(foo_tree());
    let index = detached(source.clone());
    index.refresh().await.unwrap();
    let before = index.keys();
    let fetched_at = index.fetched_at();

    source.set_failure("503 service unavailable");
    assert!(index.refresh().await.unwrap_err().is_fetch());
    assert!(index.ready());
    assert_eq!(index.keys(), before);
    assert_eq!(index.fetched_at(), fetched_at);
    assert!(index.get("Foo#bar").is_some());

    source.set_raw(b"{ not json");
    assert!(index.refresh().await.unwrap_err().is_parse());
    assert!(index.get("Foo#bar").is_some());

    source.set_payload(json!({ "classes": [{ "name": "" }] }));
    assert!(index.refresh().await.unwrap_err().is_build());
    assert_eq!(index.keys(), before);
}

#[tokio::test]
async fn test_clear_policy_rearms_readiness() {
    let source = MockSource::new(foo_tree());
    let settings = IndexSettings {
        failure_policy: FailurePolicy::Clear,
        ..IndexSettings::default()
    };
    let index = VersionIndex::new("latest", provider(source.clone()), settings);
    index.refresh().await.unwrap();
    // already ready, resolves immediately
    tokio::time::timeout(Duration::from_secs(1), index.await_ready())
        .await
        .expect("ready");

    source.set_failure("boom");
    assert!(index.refresh().await.is_err());
    assert!(!index.ready());
    assert!(index.get("Foo").is_none());
    assert!(index.meta().is_none());

    let waiter = {
        let index = index.clone();
        tokio::spawn(async move { index.await_ready().await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!waiter.is_finished());

    source.set_payload(foo_tree());
    index.refresh().await.unwrap();
    tokio::time::timeout(Duration::from_secs(1), waiter)
        .await
        .expect("waiter released")
        .unwrap();
    assert!(index.get("Foo").is_some());
}

#[tokio::test]
async fn test_readers_see_previous_snapshot_during_refresh() {
    let source = MockSource::new(classes(&["Foo", "Shared"]));
    let index = detached(source.clone());
    index.refresh().await.unwrap();

    source.set_payload(classes(&["Shared", "Bar"]));
    source.close_gate();
    let pending = {
        let index = index.clone();
        tokio::spawn(async move { index.refresh().await })
    };
    assert!(wait_until(|| source.calls() == 2).await);

    // held at the fetch: old snapshot fully visible
    assert_eq!(index.state(), IndexState::Rebuilding);
    assert!(index.ready());
    assert!(index.get("Foo").is_some());
    assert!(index.get("Shared").is_some());
    assert!(index.get("Bar").is_none());
    assert_eq!(index.filter_entities("foo", DEFAULT_LIMIT).len(), 1);

    source.release(1);
    pending.await.unwrap().unwrap();

    assert_eq!(index.state(), IndexState::Ready);
    assert!(index.get("Foo").is_none());
    assert!(index.get("Shared").is_some());
    assert!(index.get("Bar").is_some());
}

#[tokio::test]
async fn test_concurrent_refreshes_coalesce() {
    let source = MockSource::new(foo_tree());
    let index = detached(source.clone());
    source.close_gate();

    let first = {
        let index = index.clone();
        tokio::spawn(async move { index.refresh().await })
    };
    assert!(wait_until(|| source.calls() == 1).await);
    let second = {
        let index = index.clone();
        tokio::spawn(async move { index.refresh().await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    source.release(1);
    let first = first.await.unwrap().unwrap();
    let second = second.await.unwrap().unwrap();

    assert_eq!(source.calls(), 1);
    assert_eq!(first.fetched_at, second.fetched_at);
    assert_eq!(first.entries, second.entries);

    // a refresh after completion fetches again
    source.release(1);
    index.refresh().await.unwrap();
    assert_eq!(source.calls(), 2);
}

#[tokio::test]
async fn test_refresh_is_not_cancelled_by_dropped_caller() {
    let source = MockSource::new(foo_tree());
    let index = detached(source.clone());
    source.close_gate();

    let caller = {
        let index = index.clone();
        tokio::spawn(async move { index.refresh().await })
    };
    assert!(wait_until(|| source.calls() == 1).await);
    caller.abort();

    source.release(1);
    assert!(wait_until(|| index.ready()).await);
    assert!(index.get("Foo").is_some());
}

#[tokio::test]
async fn test_identical_payloads_rebuild_identically() {
    let source = MockSource::new(foo_tree());
    let index = detached(source.clone());

    index.refresh().await.unwrap();
    let first = index.snapshot().unwrap();
    index.refresh().await.unwrap();
    let second = index.snapshot().unwrap();

    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(first.keys(), second.keys());
    assert_eq!(first.entries(), second.entries());
    assert_eq!(first.known_files(), second.known_files());
}

#[tokio::test]
async fn test_spawn_refreshes_on_schedule() {
    let source = MockSource::new(foo_tree());
    let settings = IndexSettings {
        refresh_interval: Duration::from_millis(40),
        ..IndexSettings::default()
    };
    let index = VersionIndex::spawn("v5", provider(source.clone()), settings);

    tokio::time::timeout(Duration::from_secs(10), index.await_ready())
        .await
        .expect("first refresh");
    assert!(index.get("Foo#bar").is_some());
    assert!(wait_until(|| source.calls() >= 3).await);

    index.shutdown();
    // let a tick spawned before the stop finish its refresh
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert!(wait_until(|| index.state() != IndexState::Rebuilding).await);
    let calls = source.calls();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(source.calls(), calls);
}

#[tokio::test]
async fn test_url_helpers_use_tag() {
    let index = detached(MockSource::new(foo_tree()));
    index.refresh().await.unwrap();

    assert_eq!(
        index.base_repo_url(GitHubViewMode::Tree),
        "https://github.com/acme/widgets/tree/v5"
    );
    let bar = index.get("Foo#bar").unwrap();
    let meta = bar.meta().unwrap();
    assert_eq!(
        index.code_file_url(&meta.file_path().unwrap(), meta.line_range().unwrap()),
        "https://github.com/acme/widgets/blob/v5/src/structures/Foo.ts#L20"
    );
    assert_eq!(
        index.docs_url(&bar).as_deref(),
        Some("https://widgets.acme.dev/#/docs/main/v5/class/Foo?scrollTo=bar")
    );
    assert_eq!(
        index.raw_file_url("src/util/events.ts"),
        "https://raw.githubusercontent.com/acme/widgets/v5/src/util/events.ts"
    );
    assert_eq!(
        index.part_docs_url("typedef", "FooOptions").as_deref(),
        Some("https://widgets.acme.dev/#/docs/main/v5/typedef/FooOptions")
    );
}
