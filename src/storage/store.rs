use std::time::Duration;

use async_trait::async_trait;

use crate::Document;
use crate::DocumentList;
use crate::GetOptions;
use crate::Key;
use crate::ListOptions;
use crate::Preconditions;
use crate::Result;
use crate::Versioner;
use crate::WatchOptions;
use crate::WatchStream;

#[cfg(test)]
use mockall::automock;

/// Caller hook that may veto a deletion (finalizer-style); its error is
/// propagated verbatim.
pub type DeleteValidator = Box<dyn Fn(&Document) -> Result<()> + Send>;

/// Caller-supplied read-modify-write step for `guaranteed_update`: takes the
/// current object (or a zero-value placeholder for a new one) and returns
/// the desired state.
pub type TryUpdateFn = Box<dyn FnMut(Document) -> Result<Document> + Send>;

/// The storage contract shared by the file and in-memory backends. Callers
/// are backend-agnostic; both variants implement identical semantics.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Storage: Send + Sync + 'static {
    /// Stores a new object under `key`, assigning it a fresh resource
    /// version and emitting `Added`. Fails `AlreadyExists` if the key
    /// already holds a live object. `ttl` is accepted for interface parity
    /// only; neither backend enforces expiry.
    async fn create(
        &self,
        key: &Key,
        document: Document,
        ttl: Option<Duration>,
    ) -> Result<Document>;

    /// Point read. `NotFound` unless `ignore_not_found`, in which case a
    /// zero-value placeholder comes back.
    async fn get(
        &self,
        key: &Key,
        options: GetOptions,
    ) -> Result<Document>;

    /// Reads every live object under the prefix, stamped with the resource
    /// version current at assembly time.
    async fn get_list(
        &self,
        key: &Key,
        options: ListOptions,
    ) -> Result<DocumentList>;

    /// Removes the object, emitting `Deleted` with the pre-deletion
    /// snapshot, which is also returned.
    async fn delete(
        &self,
        key: &Key,
        preconditions: Option<Preconditions>,
        validate: Option<DeleteValidator>,
    ) -> Result<Document>;

    /// The optimistic-concurrency primitive: read, let `try_update` produce
    /// the desired state, commit if nothing raced in between, retry
    /// otherwise, bounded at 30 attempts. A byte-identical result
    /// short-circuits with no write and no event.
    async fn guaranteed_update(
        &self,
        key: &Key,
        ignore_not_found: bool,
        preconditions: Option<Preconditions>,
        try_update: TryUpdateFn,
    ) -> Result<Document>;

    /// Subscribes to ongoing changes under the prefix; see
    /// [`WatchOptions::resource_version`] for replay semantics.
    async fn watch(
        &self,
        key: &Key,
        options: WatchOptions,
    ) -> Result<WatchStream>;

    /// Number of live objects under the prefix.
    async fn count(
        &self,
        key: &Key,
    ) -> Result<u64>;

    /// The resource-version capability for this store's objects.
    fn versioner(&self) -> Versioner;
}
