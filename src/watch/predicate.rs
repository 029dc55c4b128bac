//! Label/field selection for lists and watches.
//!
//! A predicate is a pair of selectors evaluated against attributes computed
//! from a document. By default the labels are the document's metadata labels
//! and the fields are `metadata.name` / `metadata.namespace`; callers with
//! richer schemas supply their own attribute function.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::Document;
use crate::Result;
use crate::StorageError;

/// Computes `(labels, fields)` for selector evaluation. Opaque to the store.
pub type AttrFn =
    Arc<dyn Fn(&Document) -> Result<(BTreeMap<String, String>, BTreeMap<String, String>)> + Send + Sync>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Operator {
    Equals,
    NotEquals,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct Requirement {
    key: String,
    op: Operator,
    value: String,
}

/// A conjunction of `key=value` / `key!=value` requirements.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Selector {
    requirements: Vec<Requirement>,
}

impl Selector {
    pub fn everything() -> Self {
        Self::default()
    }

    pub fn is_everything(&self) -> bool {
        self.requirements.is_empty()
    }

    /// Parses the comma-separated form, e.g. `tier=backend,env!=dev`.
    pub fn parse(raw: &str) -> Result<Self> {
        let mut requirements = Vec::new();
        for clause in raw.split(',').map(str::trim).filter(|c| !c.is_empty()) {
            let (key, op, value) = if let Some((k, v)) = clause.split_once("!=") {
                (k, Operator::NotEquals, v)
            } else if let Some((k, v)) = clause.split_once("==") {
                (k, Operator::Equals, v)
            } else if let Some((k, v)) = clause.split_once('=') {
                (k, Operator::Equals, v)
            } else {
                return Err(StorageError::Unsupported(format!(
                    "selector clause {clause:?} is not key=value or key!=value"
                )));
            };
            let key = key.trim();
            if key.is_empty() {
                return Err(StorageError::Unsupported(format!(
                    "selector clause {clause:?} has an empty key"
                )));
            }
            requirements.push(Requirement {
                key: key.to_string(),
                op,
                value: value.trim().to_string(),
            });
        }
        Ok(Self { requirements })
    }

    pub fn matches(
        &self,
        attrs: &BTreeMap<String, String>,
    ) -> bool {
        self.requirements.iter().all(|req| {
            let actual = attrs.get(&req.key);
            match req.op {
                Operator::Equals => actual.map(String::as_str) == Some(req.value.as_str()),
                Operator::NotEquals => actual.map(String::as_str) != Some(req.value.as_str()),
            }
        })
    }
}

#[derive(Clone, Default)]
pub struct SelectionPredicate {
    pub label_selector: Selector,
    pub field_selector: Selector,
    attrs: Option<AttrFn>,
}

impl SelectionPredicate {
    /// Matches every document.
    pub fn everything() -> Self {
        Self::default()
    }

    pub fn new(
        label_selector: Selector,
        field_selector: Selector,
    ) -> Self {
        Self {
            label_selector,
            field_selector,
            attrs: None,
        }
    }

    /// Replaces the default attribute computation.
    pub fn with_attr_fn(
        mut self,
        attrs: AttrFn,
    ) -> Self {
        self.attrs = Some(attrs);
        self
    }

    pub fn is_everything(&self) -> bool {
        self.label_selector.is_everything() && self.field_selector.is_everything()
    }

    /// Evaluates both selectors. Attribute-function failures propagate so
    /// the caller decides whether to skip or surface them.
    pub fn matches(
        &self,
        document: &Document,
    ) -> Result<bool> {
        if self.is_everything() {
            return Ok(true);
        }

        let (labels, fields) = match &self.attrs {
            Some(attrs) => attrs(document)?,
            None => default_attrs(document),
        };

        Ok(self.label_selector.matches(&labels) && self.field_selector.matches(&fields))
    }
}

impl fmt::Debug for SelectionPredicate {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("SelectionPredicate")
            .field("label_selector", &self.label_selector)
            .field("field_selector", &self.field_selector)
            .field("custom_attrs", &self.attrs.is_some())
            .finish()
    }
}

fn default_attrs(document: &Document) -> (BTreeMap<String, String>, BTreeMap<String, String>) {
    let labels = document.metadata.labels.clone();
    let mut fields = BTreeMap::new();
    fields.insert("metadata.name".to_string(), document.metadata.name.clone());
    fields.insert(
        "metadata.namespace".to_string(),
        document.metadata.namespace.clone().unwrap_or_default(),
    );
    (labels, fields)
}
