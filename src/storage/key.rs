//! Hierarchical object keys.
//!
//! A key addresses at most one live object. The file backend renders it as a
//! directory path (`{group}/{version}/{namespace?}/{kind}/{name}.json`); the
//! memory backend collapses it into a composite GRN string
//! (`{tenant-or-default}/{kind}/{name}`). A key without a name is a prefix,
//! valid for list/watch/count but not for point operations.
//!
//! Path segments must not contain `/`; callers own that invariant.

use std::fmt;
use std::path::Path;
use std::path::PathBuf;

use crate::constants::DEFAULT_TENANT;
use crate::constants::OBJECT_FILE_EXTENSION;
use crate::Document;
use crate::Result;
use crate::StorageError;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Key {
    pub group: String,
    pub version: String,
    pub namespace: Option<String>,
    pub kind: String,
    pub name: Option<String>,
}

impl Key {
    /// Full key for one namespaced or cluster-scoped object.
    pub fn object(
        group: impl Into<String>,
        version: impl Into<String>,
        namespace: Option<String>,
        kind: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            namespace,
            kind: kind.into(),
            name: Some(name.into()),
        }
    }

    /// Prefix covering one kind across every namespace.
    pub fn prefix(
        group: impl Into<String>,
        version: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            namespace: None,
            kind: kind.into(),
            name: None,
        }
    }

    /// Prefix covering one kind within one namespace.
    pub fn namespaced_prefix(
        group: impl Into<String>,
        version: impl Into<String>,
        namespace: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            namespace: Some(namespace.into()),
            kind: kind.into(),
            name: None,
        }
    }

    pub fn is_prefix(&self) -> bool {
        self.name.is_none()
    }

    /// Tenant component of the composite form.
    pub fn tenant(&self) -> &str {
        self.namespace.as_deref().unwrap_or(DEFAULT_TENANT)
    }

    /// Composite (GRN) string form used as the memory backend's map key.
    /// Requires a full key.
    pub fn grn(&self) -> Option<String> {
        let name = self.name.as_deref()?;
        Some(format!("{}/{}/{}", self.tenant(), self.kind, name))
    }

    /// True when `grn` (a composite string as produced by [`Key::grn`])
    /// falls under this key, treating a missing namespace as "any tenant"
    /// and a missing name as "any object".
    pub fn covers_grn(
        &self,
        grn: &str,
    ) -> bool {
        let mut parts = grn.splitn(3, '/');
        let (Some(tenant), Some(kind), Some(name)) = (parts.next(), parts.next(), parts.next())
        else {
            return false;
        };

        if kind != self.kind {
            return false;
        }
        if let Some(namespace) = &self.namespace {
            // Cluster-scoped entries live under the default tenant.
            if tenant != namespace.as_str() {
                return false;
            }
        }
        match &self.name {
            Some(expected) => name == expected,
            None => true,
        }
    }

    /// Directory holding this key's objects in the file backend.
    pub fn directory(
        &self,
        root: &Path,
    ) -> PathBuf {
        let mut dir = root.join(&self.group).join(&self.version);
        if let Some(namespace) = &self.namespace {
            dir = dir.join(namespace);
        }
        dir.join(&self.kind)
    }

    /// On-disk file for a full key.
    pub fn file_path(
        &self,
        root: &Path,
    ) -> Option<PathBuf> {
        let name = self.name.as_deref()?;
        Some(self.directory(root).join(format!("{name}.{OBJECT_FILE_EXTENSION}")))
    }

    /// Aligns a document's identity with this key: empty metadata fields are
    /// filled in from the key, conflicting ones are rejected.
    pub fn align_document(
        &self,
        mut document: Document,
    ) -> Result<Document> {
        let name = self.name.as_deref().unwrap_or_default();
        if document.metadata.name.is_empty() {
            document.metadata.name = name.to_string();
        } else if document.metadata.name != name {
            return Err(StorageError::Unsupported(format!(
                "document name {:?} does not match key {self}",
                document.metadata.name
            )));
        }
        if document.metadata.namespace.is_none() {
            document.metadata.namespace = self.namespace.clone();
        } else if document.metadata.namespace != self.namespace {
            return Err(StorageError::Unsupported(format!(
                "document namespace {:?} does not match key {self}",
                document.metadata.namespace
            )));
        }
        Ok(document)
    }

    /// Group/version root, the level at which namespace fan-out happens.
    pub(crate) fn group_version_dir(
        &self,
        root: &Path,
    ) -> PathBuf {
        root.join(&self.group).join(&self.version)
    }
}

impl fmt::Display for Key {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "/{}/{}", self.group, self.version)?;
        if let Some(namespace) = &self.namespace {
            write!(f, "/{namespace}")?;
        }
        write!(f, "/{}", self.kind)?;
        if let Some(name) = &self.name {
            write!(f, "/{name}")?;
        }
        Ok(())
    }
}
