//! In-memory store variant.
//!
//! One process-wide map keyed by the composite GRN string form of each key,
//! guarded by a single read-write lock. Mutations notify the watch set while
//! still holding the write guard, so subscribers observe commit order.

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use tracing::debug;
use tracing::trace;

use crate::constants::MAX_UPDATE_ATTEMPTS;
use crate::storage::update::Attempt;
use crate::Codec;
use crate::DeleteValidator;
use crate::Document;
use crate::DocumentList;
use crate::GetOptions;
use crate::JsonCodec;
use crate::Key;
use crate::ListOptions;
use crate::Preconditions;
use crate::Result;
use crate::RvGenerator;
use crate::Storage;
use crate::StorageError;
use crate::StoreConfig;
use crate::TryUpdateFn;
use crate::Versioner;
use crate::WatchEvent;
use crate::WatchOptions;
use crate::WatchSet;
use crate::WatchStream;

pub struct MemStore {
    state: RwLock<BTreeMap<String, Document>>,
    generator: Arc<RvGenerator>,
    watch_set: Arc<WatchSet>,
    codec: Arc<dyn Codec>,
    /// Highest resource version this instance has written.
    high_water: AtomicU64,
}

impl MemStore {
    pub fn new(config: &StoreConfig) -> Result<Self> {
        config.validate().map_err(StorageError::Init)?;
        Ok(Self::with_collaborators(
            Arc::new(RvGenerator::new(config.node_id)?),
            Arc::new(WatchSet::new(config.watch_capacity)),
            Arc::new(JsonCodec),
        ))
    }

    /// Injects the shared collaborators instead of building defaults.
    pub fn with_collaborators(
        generator: Arc<RvGenerator>,
        watch_set: Arc<WatchSet>,
        codec: Arc<dyn Codec>,
    ) -> Self {
        Self {
            state: RwLock::new(BTreeMap::new()),
            generator,
            watch_set,
            codec,
            high_water: AtomicU64::new(0),
        }
    }

    pub fn watch_set(&self) -> &Arc<WatchSet> {
        &self.watch_set
    }

    fn require_grn(key: &Key) -> Result<String> {
        key.grn()
            .ok_or_else(|| StorageError::Unsupported(format!("{key} is a prefix, not an object key")))
    }

    fn record_write(
        &self,
        resource_version: u64,
    ) {
        self.high_water.fetch_max(resource_version, Ordering::SeqCst);
    }

    fn update_once(
        &self,
        key: &Key,
        grn: &str,
        ignore_not_found: bool,
        preconditions: Option<&Preconditions>,
        try_update: &mut TryUpdateFn,
    ) -> Attempt {
        let mut state = self.state.write();

        let (current, exists) = match state.get(grn) {
            Some(document) => (document.clone(), true),
            None if ignore_not_found => (Document::default(), false),
            None => return Attempt::Fail(StorageError::NotFound(key.to_string())),
        };

        if let Some(preconditions) = preconditions {
            if let Err(e) = preconditions.check(key, &current) {
                return Attempt::Retry(e);
            }
        }

        let updated = match try_update(current.clone()) {
            Ok(document) => document,
            Err(e) => return Attempt::Retry(e),
        };
        let mut updated = match key.align_document(updated) {
            Ok(document) => document,
            Err(e) => return Attempt::Fail(e),
        };

        if exists {
            let current_bytes = match self.codec.encode(&current) {
                Ok(bytes) => bytes,
                Err(e) => return Attempt::Fail(e),
            };
            let updated_bytes = match self.codec.encode(&updated) {
                Ok(bytes) => bytes,
                Err(e) => return Attempt::Fail(e),
            };
            if current_bytes == updated_bytes {
                // Idempotent no-op: no write, no version bump, no event.
                return Attempt::Success(current);
            }
        }

        let resource_version = self.generator.next();
        Versioner.update_object(&mut updated, resource_version);
        state.insert(grn.to_string(), updated.clone());
        self.record_write(resource_version);

        let event = if exists {
            WatchEvent::modified(updated.clone())
        } else {
            WatchEvent::added(updated.clone())
        };
        self.watch_set.notify(&event);

        Attempt::Success(updated)
    }
}

#[async_trait]
impl Storage for MemStore {
    async fn create(
        &self,
        key: &Key,
        document: Document,
        _ttl: Option<Duration>,
    ) -> Result<Document> {
        let grn = Self::require_grn(key)?;
        let mut document = key.align_document(document)?;

        let mut state = self.state.write();
        if state.contains_key(&grn) {
            return Err(StorageError::AlreadyExists(key.to_string()));
        }

        let resource_version = self.generator.next();
        Versioner.update_object(&mut document, resource_version);
        state.insert(grn, document.clone());
        self.record_write(resource_version);
        self.watch_set.notify(&WatchEvent::added(document.clone()));

        trace!("created {key} at resource version {resource_version}");
        Ok(document)
    }

    async fn get(
        &self,
        key: &Key,
        options: GetOptions,
    ) -> Result<Document> {
        let grn = Self::require_grn(key)?;
        let state = self.state.read();

        let Some(document) = state.get(&grn) else {
            if options.ignore_not_found {
                return Ok(Document::default());
            }
            return Err(StorageError::NotFound(key.to_string()));
        };

        if document.metadata.resource_version < options.resource_version {
            return Err(StorageError::ResourceVersionTooLarge {
                required: options.resource_version,
                current: document.metadata.resource_version,
            });
        }

        Ok(document.clone())
    }

    async fn get_list(
        &self,
        key: &Key,
        options: ListOptions,
    ) -> Result<DocumentList> {
        let state = self.state.read();
        let mut items = Vec::new();
        let mut max_item_version = 0;

        for (grn, document) in state.iter() {
            if !key.covers_grn(grn) {
                continue;
            }
            // Below the floor: silently excluded, not an error.
            if document.metadata.resource_version < options.resource_version {
                continue;
            }
            if !options.predicate.matches(document)? {
                continue;
            }
            max_item_version = max_item_version.max(document.metadata.resource_version);
            items.push(document.clone());
        }

        let resource_version = self.high_water.load(Ordering::SeqCst).max(max_item_version);
        Ok(DocumentList {
            items,
            resource_version,
        })
    }

    async fn delete(
        &self,
        key: &Key,
        preconditions: Option<Preconditions>,
        validate: Option<DeleteValidator>,
    ) -> Result<Document> {
        let grn = Self::require_grn(key)?;
        let mut state = self.state.write();

        let Some(current) = state.get(&grn).cloned() else {
            return Err(StorageError::NotFound(key.to_string()));
        };

        if let Some(preconditions) = &preconditions {
            preconditions.check(key, &current)?;
        }
        if let Some(validate) = &validate {
            validate(&current)?;
        }

        state.remove(&grn);
        self.watch_set.notify(&WatchEvent::deleted(current.clone()));

        debug!("deleted {key}");
        Ok(current)
    }

    async fn guaranteed_update(
        &self,
        key: &Key,
        ignore_not_found: bool,
        preconditions: Option<Preconditions>,
        mut try_update: TryUpdateFn,
    ) -> Result<Document> {
        let grn = Self::require_grn(key)?;
        let mut last_cause = None;

        for attempt in 1..=MAX_UPDATE_ATTEMPTS {
            match self.update_once(key, &grn, ignore_not_found, preconditions.as_ref(), &mut try_update) {
                Attempt::Success(document) => return Ok(document),
                Attempt::Fail(e) => return Err(e),
                Attempt::Retry(cause) => {
                    trace!("guaranteed_update of {key}, attempt {attempt}/{MAX_UPDATE_ATTEMPTS}: {cause}");
                    last_cause = Some(cause);
                }
            }
        }

        Err(StorageError::RetryLimitExceeded {
            key: key.to_string(),
            attempts: MAX_UPDATE_ATTEMPTS,
            source: last_cause.map(Box::new),
        })
    }

    async fn watch(
        &self,
        key: &Key,
        options: WatchOptions,
    ) -> Result<WatchStream> {
        // The write guard makes registration and snapshot assembly atomic
        // with respect to mutations: events committed afterwards land in the
        // subscription's pending buffer, never in both buffer and snapshot.
        let state = self.state.write();
        let (id, rx) = self.watch_set.new_watch(options.predicate.clone());

        let mut initial_events = Vec::new();
        if let Some(floor) = options.resource_version {
            for (grn, document) in state.iter() {
                if !key.covers_grn(grn) {
                    continue;
                }
                if document.metadata.resource_version < floor {
                    continue;
                }
                match options.predicate.matches(document) {
                    Ok(true) => initial_events.push(WatchEvent::added(document.clone())),
                    Ok(false) => {}
                    Err(e) => {
                        self.watch_set.remove(id);
                        return Err(e);
                    }
                }
            }
        }
        drop(state);

        let staged = self.watch_set.start(id, initial_events);
        Ok(WatchStream::new(id, Arc::downgrade(&self.watch_set), staged, rx))
    }

    async fn count(
        &self,
        key: &Key,
    ) -> Result<u64> {
        let state = self.state.read();
        Ok(state.keys().filter(|grn| key.covers_grn(grn)).count() as u64)
    }

    fn versioner(&self) -> Versioner {
        Versioner
    }
}

impl Drop for MemStore {
    fn drop(&mut self) {
        self.watch_set.cleanup();
    }
}
