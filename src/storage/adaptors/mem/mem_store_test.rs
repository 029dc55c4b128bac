use std::sync::Arc;

use async_trait::async_trait;

use tokio_stream::StreamExt;

use super::MemStore;
use crate::storage::store_suite_test::StoreBuilder;
use crate::storage::store_suite_test::StoreTestSuite;
use crate::Document;
use crate::EventType;
use crate::GetOptions;
use crate::Key;
use crate::Result;
use crate::Storage;
use crate::StorageError;
use crate::StoreConfig;
use crate::WatchOptions;

struct MemStoreBuilder;

#[async_trait]
impl StoreBuilder for MemStoreBuilder {
    type Store = MemStore;

    async fn build(&self) -> Result<Arc<Self::Store>> {
        Ok(Arc::new(MemStore::new(&StoreConfig::default())?))
    }
}

#[tokio::test]
async fn test_mem_store_conformance() -> Result<()> {
    StoreTestSuite::run_all_tests(MemStoreBuilder).await
}

#[tokio::test]
async fn test_point_operations_reject_prefix_keys() -> Result<()> {
    let store = MemStore::new(&StoreConfig::default())?;
    let prefix = Key::prefix("apps", "v1", "widget");

    let created = store
        .create(&prefix, Document::new("x", None, serde_json::Value::Null), None)
        .await;
    assert!(matches!(created, Err(StorageError::Unsupported(_))));

    let fetched = store.get(&prefix, GetOptions::default()).await;
    assert!(matches!(fetched, Err(StorageError::Unsupported(_))));
    Ok(())
}

#[tokio::test]
async fn test_cluster_scoped_objects_share_default_tenant() -> Result<()> {
    let store = MemStore::new(&StoreConfig::default())?;
    let key = Key::object("apps", "v1", None, "widget", "global");
    store
        .create(&key, Document::new("global", None, serde_json::Value::Null), None)
        .await?;

    // Visible through the all-namespaces prefix but not through a tenant.
    assert_eq!(store.count(&Key::prefix("apps", "v1", "widget")).await?, 1);
    assert_eq!(
        store
            .count(&Key::namespaced_prefix("apps", "v1", "team-a", "widget"))
            .await?,
        0
    );
    Ok(())
}

#[tokio::test]
async fn test_document_identity_must_match_key() -> Result<()> {
    let store = MemStore::new(&StoreConfig::default())?;
    let key = Key::object("apps", "v1", Some("team-a".to_string()), "widget", "alpha");

    let mismatched = store
        .create(
            &key,
            Document::new("beta", Some("team-a".to_string()), serde_json::Value::Null),
            None,
        )
        .await;
    assert!(matches!(mismatched, Err(StorageError::Unsupported(_))));

    // Empty identity fields are filled in from the key instead.
    let filled = store
        .create(&key, Document::default(), None)
        .await?;
    assert_eq!(filled.metadata.name, "alpha");
    assert_eq!(filled.metadata.namespace.as_deref(), Some("team-a"));
    Ok(())
}

#[tokio::test]
async fn test_watch_replay_exceeding_channel_capacity() -> Result<()> {
    let store = MemStore::new(&StoreConfig {
        watch_capacity: 2,
        ..Default::default()
    })?;
    for i in 0..5 {
        let key = Key::object("apps", "v1", Some("team-a".to_string()), "widget", format!("obj-{i}"));
        store.create(&key, Document::default(), None).await?;
    }

    // Five pre-existing objects against a channel capacity of two: the full
    // replay must arrive before the subscriber has consumed anything.
    let mut watch = store
        .watch(
            &Key::prefix("apps", "v1", "widget"),
            WatchOptions {
                resource_version: Some(0),
                ..Default::default()
            },
        )
        .await?;

    let mut replayed = Vec::new();
    for _ in 0..5 {
        let event = watch.next().await.expect("replay event");
        assert_eq!(event.event_type, EventType::Added);
        replayed.push(event.object.metadata.name);
    }
    replayed.sort_unstable();
    let expected: Vec<String> = (0..5).map(|i| format!("obj-{i}")).collect();
    assert_eq!(replayed, expected);

    // The subscription survived the replay and is live.
    let after = Key::object("apps", "v1", Some("team-a".to_string()), "widget", "after");
    store.create(&after, Document::default(), None).await?;
    assert_eq!(watch.next().await.expect("live event").object.metadata.name, "after");
    Ok(())
}
