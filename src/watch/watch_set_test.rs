use std::sync::Arc;

use tokio_stream::StreamExt;

use super::WatchSet;
use super::WatchStream;
use crate::Document;
use crate::EventType;
use crate::SelectionPredicate;
use crate::Selector;
use crate::StorageError;
use crate::WatchEvent;

fn event(name: &str, event_type: EventType) -> WatchEvent {
    WatchEvent {
        event_type,
        object: Document::new(name, None, serde_json::Value::Null),
    }
}

#[tokio::test]
async fn test_pending_subscription_receives_nothing() {
    let set = WatchSet::new(8);
    let (_id, mut rx) = set.new_watch(SelectionPredicate::everything());

    set.notify(&event("a", EventType::Added));
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_start_returns_replay_then_buffered() {
    let set = WatchSet::new(8);
    let (id, mut rx) = set.new_watch(SelectionPredicate::everything());

    // Committed while the snapshot was being assembled; must come after the
    // replay but before anything newer.
    set.notify(&event("concurrent", EventType::Modified));

    let staged = set.start(
        id,
        vec![event("snap-1", EventType::Added), event("snap-2", EventType::Added)],
    );
    set.notify(&event("live", EventType::Deleted));

    let staged_names: Vec<&str> = staged.iter().map(|e| e.object.metadata.name.as_str()).collect();
    assert_eq!(staged_names, vec!["snap-1", "snap-2", "concurrent"]);
    assert_eq!(rx.recv().await.unwrap().object.metadata.name, "live");
}

#[tokio::test]
async fn test_replay_larger_than_channel_capacity_survives() {
    let set = Arc::new(WatchSet::new(4));
    let (id, rx) = set.new_watch(SelectionPredicate::everything());

    // Six staged events against a capacity of four: the stream must yield
    // them all, because replay never touches the bounded channel.
    let replay: Vec<WatchEvent> = (0..6)
        .map(|i| event(&format!("obj-{i}"), EventType::Added))
        .collect();
    let staged = set.start(id, replay);
    let mut stream = WatchStream::new(id, Arc::downgrade(&set), staged, rx);

    for i in 0..6 {
        let received = stream.next().await.expect("replay event");
        assert_eq!(received.object.metadata.name, format!("obj-{i}"));
    }

    // The subscription stayed open and live delivery still works.
    assert_eq!(set.len(), 1);
    set.notify(&event("live", EventType::Added));
    assert_eq!(stream.next().await.expect("live event").object.metadata.name, "live");
}

#[tokio::test]
async fn test_notify_preserves_commit_order() {
    let set = WatchSet::new(64);
    let (id, mut rx) = set.new_watch(SelectionPredicate::everything());
    assert!(set.start(id, Vec::new()).is_empty());

    for i in 0..20 {
        set.notify(&event(&format!("obj-{i}"), EventType::Added));
    }
    for i in 0..20 {
        let received = rx.recv().await.unwrap();
        assert_eq!(received.object.metadata.name, format!("obj-{i}"));
    }
}

#[tokio::test]
async fn test_predicate_filters_events() {
    let set = WatchSet::new(8);
    let predicate = SelectionPredicate::new(
        Selector::parse("tier=backend").unwrap(),
        Selector::everything(),
    );
    let (id, mut rx) = set.new_watch(predicate);
    assert!(set.start(id, Vec::new()).is_empty());

    set.notify(&WatchEvent::added(
        Document::new("skip", None, serde_json::Value::Null).with_label("tier", "frontend"),
    ));
    set.notify(&WatchEvent::added(
        Document::new("keep", None, serde_json::Value::Null).with_label("tier", "backend"),
    ));

    let received = rx.recv().await.unwrap();
    assert_eq!(received.object.metadata.name, "keep");
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_slow_subscriber_is_closed_not_blocking() {
    let set = WatchSet::new(2);
    let (id, mut rx) = set.new_watch(SelectionPredicate::everything());
    assert!(set.start(id, Vec::new()).is_empty());

    // Two fit, the third overflows and closes the subscription.
    set.notify(&event("a", EventType::Added));
    set.notify(&event("b", EventType::Added));
    set.notify(&event("c", EventType::Added));
    assert!(set.is_empty());

    assert_eq!(rx.recv().await.unwrap().object.metadata.name, "a");
    assert_eq!(rx.recv().await.unwrap().object.metadata.name, "b");
    assert!(rx.recv().await.is_none());
}

#[tokio::test]
async fn test_overflow_does_not_affect_other_subscribers() {
    let set = WatchSet::new(2);
    let (slow_id, _slow_rx) = set.new_watch(SelectionPredicate::everything());
    let (fast_id, mut fast_rx) = set.new_watch(SelectionPredicate::everything());
    assert!(set.start(slow_id, Vec::new()).is_empty());
    assert!(set.start(fast_id, Vec::new()).is_empty());

    for i in 0..3 {
        set.notify(&event(&format!("obj-{i}"), EventType::Added));
        // Keep the fast subscriber drained.
        assert_eq!(
            fast_rx.recv().await.unwrap().object.metadata.name,
            format!("obj-{i}")
        );
    }
    assert_eq!(set.len(), 1);
}

#[tokio::test]
async fn test_predicate_error_skips_event_and_counts() {
    let set = WatchSet::new(8);
    let predicate = SelectionPredicate::new(
        Selector::parse("k=v").unwrap(),
        Selector::everything(),
    )
    .with_attr_fn(Arc::new(|_| {
        Err(StorageError::Unsupported("broken attrs".to_string()))
    }));
    let (id, mut rx) = set.new_watch(predicate);
    assert!(set.start(id, Vec::new()).is_empty());

    set.notify(&event("a", EventType::Added));
    assert_eq!(set.dropped_events(), 1);
    assert!(rx.try_recv().is_err());
    // The subscription itself stays open.
    assert_eq!(set.len(), 1);
}

#[tokio::test]
async fn test_cleanup_closes_everything_and_is_idempotent() {
    let set = WatchSet::new(8);
    let (id_a, mut rx_a) = set.new_watch(SelectionPredicate::everything());
    let (id_b, mut rx_b) = set.new_watch(SelectionPredicate::everything());
    assert!(set.start(id_a, Vec::new()).is_empty());
    assert!(set.start(id_b, Vec::new()).is_empty());

    set.cleanup();
    set.cleanup();

    assert!(set.is_empty());
    assert!(rx_a.recv().await.is_none());
    assert!(rx_b.recv().await.is_none());

    // Post-cleanup notifications are inert.
    set.notify(&event("late", EventType::Added));
}

#[tokio::test]
async fn test_remove_stops_delivery() {
    let set = WatchSet::new(8);
    let (id, mut rx) = set.new_watch(SelectionPredicate::everything());
    assert!(set.start(id, Vec::new()).is_empty());

    set.notify(&event("before", EventType::Added));
    set.remove(id);
    set.notify(&event("after", EventType::Added));

    assert_eq!(rx.recv().await.unwrap().object.metadata.name, "before");
    assert!(rx.recv().await.is_none());
}
