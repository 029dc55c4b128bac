//! The stored object model.
//!
//! A [`Document`] is the unit both backends persist: a small metadata header
//! (identity, labels, resource version) plus an opaque JSON body supplied by
//! the caller. The store never interprets the body; it only encodes it,
//! versions it and hands it back.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

/// One versioned object.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub metadata: DocumentMeta,

    /// Opaque caller payload. Not inspected by the store.
    #[serde(default)]
    pub body: serde_json::Value,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMeta {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    /// Assigned by the store on every successful write. Zero means
    /// "never stored".
    #[serde(default)]
    pub resource_version: u64,
}

impl Document {
    pub fn new(
        name: impl Into<String>,
        namespace: Option<String>,
        body: serde_json::Value,
    ) -> Self {
        Self {
            metadata: DocumentMeta {
                name: name.into(),
                namespace,
                labels: BTreeMap::new(),
                resource_version: 0,
            },
            body,
        }
    }

    pub fn with_label(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.metadata.labels.insert(key.into(), value.into());
        self
    }

    /// True for the zero-value placeholder returned by reads with
    /// `ignore_not_found`.
    pub fn is_placeholder(&self) -> bool {
        self.metadata.resource_version == 0 && self.metadata.name.is_empty()
    }
}

/// A page of documents under one key prefix, stamped with the resource
/// version that was current when the page was assembled. The stamp is what a
/// caller passes back to `watch` to resume without a gap.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentList {
    pub items: Vec<Document>,
    pub resource_version: u64,
}
