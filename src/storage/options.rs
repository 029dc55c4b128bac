use crate::Document;
use crate::Key;
use crate::Result;
use crate::SelectionPredicate;
use crate::StorageError;

/// Options for point reads.
#[derive(Debug, Default, Clone)]
pub struct GetOptions {
    /// Minimum acceptable resource version, 0 for "whatever is current".
    /// A live object older than this fails `ResourceVersionTooLarge`.
    pub resource_version: u64,
    /// Return a zero-value placeholder instead of `NotFound`.
    pub ignore_not_found: bool,
}

/// Options for prefix lists.
#[derive(Debug, Default, Clone)]
pub struct ListOptions {
    /// Version floor. Unlike `get`, objects below it are silently excluded;
    /// lists degrade gracefully, point reads do not.
    pub resource_version: u64,
    pub predicate: SelectionPredicate,
}

/// Options for watches.
#[derive(Debug, Default, Clone)]
pub struct WatchOptions {
    /// `None` means "from now": live events only, no replay. `Some(v)`
    /// replays the current matching objects (v = 0 replays everything)
    /// before going live.
    pub resource_version: Option<u64>,
    pub predicate: SelectionPredicate,
}

/// Expected state checked before a delete or update may proceed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Preconditions {
    pub resource_version: Option<u64>,
}

impl Preconditions {
    pub fn resource_version(resource_version: u64) -> Self {
        Self {
            resource_version: Some(resource_version),
        }
    }

    pub fn check(
        &self,
        key: &Key,
        current: &Document,
    ) -> Result<()> {
        if let Some(expected) = self.resource_version {
            let actual = current.metadata.resource_version;
            if actual != expected {
                return Err(StorageError::PreconditionFailed {
                    key: key.to_string(),
                    reason: format!("resource version {actual} does not match expected {expected}"),
                });
            }
        }
        Ok(())
    }
}
