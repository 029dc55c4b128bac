//! File-backed store variant.
//!
//! One JSON document per object; the directory hierarchy
//! (`{root}/{group}/{version}/{namespace?}/{kind}/{name}.json`) is the only
//! index. A single read-write lock serializes all file access within the
//! process; the filesystem provides no cross-process guarantee and none is
//! assumed (single-process deployment).

use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::path::PathBuf;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;
use tracing::trace;
use tracing::warn;

use crate::constants::MAX_UPDATE_ATTEMPTS;
use crate::constants::OBJECT_FILE_EXTENSION;
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

pub struct FileStore {
    root: PathBuf,
    /// Serializes all file access for this store instance.
    lock: RwLock<()>,
    generator: Arc<RvGenerator>,
    watch_set: Arc<WatchSet>,
    codec: Arc<dyn Codec>,
    /// Highest resource version this instance has written. Versions already
    /// on disk from earlier runs surface through list stamping instead.
    high_water: AtomicU64,
}

impl FileStore {
    pub fn new(config: &StoreConfig) -> Result<Self> {
        config.validate().map_err(StorageError::Init)?;
        Self::with_collaborators(
            config.data_root.clone(),
            Arc::new(RvGenerator::new(config.node_id)?),
            Arc::new(WatchSet::new(config.watch_capacity)),
            Arc::new(JsonCodec),
        )
    }

    /// Injects the shared collaborators instead of building defaults.
    pub fn with_collaborators(
        root: PathBuf,
        generator: Arc<RvGenerator>,
        watch_set: Arc<WatchSet>,
        codec: Arc<dyn Codec>,
    ) -> Result<Self> {
        fs::create_dir_all(&root).map_err(|source| StorageError::Path {
            path: root.clone(),
            source,
        })?;
        debug!("file store rooted at {:?}", root);
        Ok(Self {
            root,
            lock: RwLock::new(()),
            generator,
            watch_set,
            codec,
            high_water: AtomicU64::new(0),
        })
    }

    pub fn watch_set(&self) -> &Arc<WatchSet> {
        &self.watch_set
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn require_path(
        &self,
        key: &Key,
    ) -> Result<PathBuf> {
        key.file_path(&self.root)
            .ok_or_else(|| StorageError::Unsupported(format!("{key} is a prefix, not an object key")))
    }

    /// Raw file bytes, `None` when the file (or any parent directory) does
    /// not exist.
    fn read_bytes(path: &Path) -> Result<Option<Vec<u8>>> {
        match fs::read(path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::Path {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Whole-file overwrite. No atomic rename and no fsync: a crash
    /// mid-write can leave a corrupt object. Known limitation of this
    /// development/test-scale backend.
    fn write_bytes(
        path: &Path,
        bytes: &[u8],
    ) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| StorageError::Path {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(path, bytes).map_err(|source| StorageError::Path {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Decodes every object file directly inside `dir`. A missing directory
    /// is zero results, not an error. Undecodable files are skipped with a
    /// warning so one corrupt object cannot poison a whole list.
    fn scan_dir(
        &self,
        dir: &Path,
        out: &mut Vec<Document>,
    ) -> Result<()> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(source) => {
                return Err(StorageError::Path {
                    path: dir.to_path_buf(),
                    source,
                })
            }
        };

        for entry in entries {
            let entry = entry.map_err(|source| StorageError::Path {
                path: dir.to_path_buf(),
                source,
            })?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(OBJECT_FILE_EXTENSION) {
                continue;
            }
            let Some(bytes) = Self::read_bytes(&path)? else {
                continue;
            };
            match self.codec.decode(&bytes) {
                Ok(document) => out.push(document),
                Err(e) => warn!("skipping undecodable object file {:?}: {e}", path),
            }
        }
        Ok(())
    }

    /// All live documents under the prefix. A prefix without a namespace
    /// fans out across one level of namespace subdirectories plus the
    /// no-namespace fallback directory.
    fn list_documents(
        &self,
        key: &Key,
    ) -> Result<Vec<Document>> {
        let mut documents = Vec::new();

        if key.name.is_some() {
            let path = self.require_path(key)?;
            if let Some(bytes) = Self::read_bytes(&path)? {
                documents.push(self.codec.decode(&bytes)?);
            }
            return Ok(documents);
        }

        if key.namespace.is_some() {
            self.scan_dir(&key.directory(&self.root), &mut documents)?;
            return Ok(documents);
        }

        let base = key.group_version_dir(&self.root);
        let subdirs = match fs::read_dir(&base) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(documents),
            Err(source) => return Err(StorageError::Path { path: base, source }),
        };
        for entry in subdirs {
            let entry = entry.map_err(|source| StorageError::Path {
                path: base.clone(),
                source,
            })?;
            if entry.path().is_dir() {
                self.scan_dir(&entry.path().join(&key.kind), &mut documents)?;
            }
        }
        // Cluster-scoped objects live directly under {group}/{version}/{kind}.
        self.scan_dir(&base.join(&key.kind), &mut documents)?;

        Ok(documents)
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
        path: &Path,
        ignore_not_found: bool,
        preconditions: Option<&Preconditions>,
        try_update: &mut TryUpdateFn,
    ) -> Attempt {
        let _guard = self.lock.write();

        let current_bytes = match Self::read_bytes(path) {
            Ok(bytes) => bytes,
            Err(e) => return Attempt::Fail(e),
        };
        let (current, exists) = match &current_bytes {
            Some(bytes) => match self.codec.decode(bytes) {
                Ok(document) => (document, true),
                Err(e) => return Attempt::Fail(e),
            },
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

        if let Some(current_bytes) = &current_bytes {
            let updated_bytes = match self.codec.encode(&updated) {
                Ok(bytes) => bytes,
                Err(e) => return Attempt::Fail(e),
            };
            if *current_bytes == updated_bytes {
                // Idempotent no-op: no write, no version bump, no event.
                return Attempt::Success(current);
            }
        }

        let resource_version = self.generator.next();
        Versioner.update_object(&mut updated, resource_version);
        let encoded = match self.codec.encode(&updated) {
            Ok(bytes) => bytes,
            Err(e) => return Attempt::Fail(e),
        };
        if let Err(e) = Self::write_bytes(path, &encoded) {
            return Attempt::Fail(e);
        }
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
impl Storage for FileStore {
    async fn create(
        &self,
        key: &Key,
        document: Document,
        _ttl: Option<Duration>,
    ) -> Result<Document> {
        let path = self.require_path(key)?;
        let mut document = key.align_document(document)?;

        let _guard = self.lock.write();
        if path.exists() {
            return Err(StorageError::AlreadyExists(key.to_string()));
        }

        let resource_version = self.generator.next();
        Versioner.update_object(&mut document, resource_version);
        Self::write_bytes(&path, &self.codec.encode(&document)?)?;
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
        let path = self.require_path(key)?;
        let _guard = self.lock.read();

        let Some(bytes) = Self::read_bytes(&path)? else {
            if options.ignore_not_found {
                return Ok(Document::default());
            }
            return Err(StorageError::NotFound(key.to_string()));
        };

        let document = self.codec.decode(&bytes)?;
        if document.metadata.resource_version < options.resource_version {
            return Err(StorageError::ResourceVersionTooLarge {
                required: options.resource_version,
                current: document.metadata.resource_version,
            });
        }

        Ok(document)
    }

    async fn get_list(
        &self,
        key: &Key,
        options: ListOptions,
    ) -> Result<DocumentList> {
        let _guard = self.lock.read();

        let mut items = Vec::new();
        let mut max_item_version = 0;
        for document in self.list_documents(key)? {
            // Below the floor: silently excluded, not an error.
            if document.metadata.resource_version < options.resource_version {
                continue;
            }
            if !options.predicate.matches(&document)? {
                continue;
            }
            max_item_version = max_item_version.max(document.metadata.resource_version);
            items.push(document);
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
        let path = self.require_path(key)?;
        let _guard = self.lock.write();

        let Some(bytes) = Self::read_bytes(&path)? else {
            return Err(StorageError::NotFound(key.to_string()));
        };
        let current = self.codec.decode(&bytes)?;

        if let Some(preconditions) = &preconditions {
            preconditions.check(key, &current)?;
        }
        if let Some(validate) = &validate {
            validate(&current)?;
        }

        fs::remove_file(&path).map_err(|source| StorageError::Path {
            path: path.clone(),
            source,
        })?;
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
        let path = self.require_path(key)?;
        let mut last_cause = None;

        for attempt in 1..=MAX_UPDATE_ATTEMPTS {
            match self.update_once(key, &path, ignore_not_found, preconditions.as_ref(), &mut try_update) {
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
        let guard = self.lock.write();
        let (id, rx) = self.watch_set.new_watch(options.predicate.clone());

        let mut initial_events = Vec::new();
        if let Some(floor) = options.resource_version {
            let documents = match self.list_documents(key) {
                Ok(documents) => documents,
                Err(e) => {
                    self.watch_set.remove(id);
                    return Err(e);
                }
            };
            for document in documents {
                if document.metadata.resource_version < floor {
                    continue;
                }
                match options.predicate.matches(&document) {
                    Ok(true) => initial_events.push(WatchEvent::added(document)),
                    Ok(false) => {}
                    Err(e) => {
                        self.watch_set.remove(id);
                        return Err(e);
                    }
                }
            }
        }
        drop(guard);

        let staged = self.watch_set.start(id, initial_events);
        Ok(WatchStream::new(id, Arc::downgrade(&self.watch_set), staged, rx))
    }

    async fn count(
        &self,
        key: &Key,
    ) -> Result<u64> {
        let _guard = self.lock.read();
        Ok(self.list_documents(key)?.len() as u64)
    }

    fn versioner(&self) -> Versioner {
        Versioner
    }
}

impl Drop for FileStore {
    fn drop(&mut self) {
        self.watch_set.cleanup();
    }
}
