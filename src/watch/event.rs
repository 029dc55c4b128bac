use crate::Document;

/// The transition a mutation committed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventType {
    Added,
    Modified,
    Deleted,
}

/// One change notification: the transition type plus a snapshot of the
/// object as it was committed (for `Deleted`, the pre-deletion snapshot).
#[derive(Clone, Debug, PartialEq)]
pub struct WatchEvent {
    pub event_type: EventType,
    pub object: Document,
}

impl WatchEvent {
    pub fn added(object: Document) -> Self {
        Self {
            event_type: EventType::Added,
            object,
        }
    }

    pub fn modified(object: Document) -> Self {
        Self {
            event_type: EventType::Modified,
            object,
        }
    }

    pub fn deleted(object: Document) -> Self {
        Self {
            event_type: EventType::Deleted,
            object,
        }
    }
}
