//! Documents bundled in package extensions and the live document store.

pub mod diff;

pub use diff::{AttachmentDiff, ChangeKind, ClassPropertyDiff, DocumentDiff, DocumentVersionRef, ObjectDiff};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::Result;
use crate::types::Namespace;

/// Reference of a document inside a namespace (`Space.Page` plus locale).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentReference {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
}

impl DocumentReference {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            locale: None,
        }
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }
}

impl fmt::Display for DocumentReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.locale {
            Some(locale) => write!(f, "{}({})", self.name, locale),
            None => write!(f, "{}", self.name),
        }
    }
}

/// An object attached to a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentObject {
    #[serde(rename = "class")]
    pub class_name: String,
    #[serde(default)]
    pub number: u32,
    #[serde(default)]
    pub properties: BTreeMap<String, serde_json::Value>,
}

/// A wiki document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub reference: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default)]
    pub content: String,
    /// Attachment name to content
    #[serde(default)]
    pub attachments: BTreeMap<String, String>,
    #[serde(default)]
    pub objects: Vec<DocumentObject>,
    /// Class property name to property type
    #[serde(default)]
    pub class_properties: BTreeMap<String, String>,
}

impl Document {
    pub fn new(reference: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            content: content.into(),
            ..Default::default()
        }
    }

    pub fn document_reference(&self) -> DocumentReference {
        DocumentReference {
            name: self.reference.clone(),
            locale: self.locale.clone(),
        }
    }

    pub fn with_attachment(mut self, name: impl Into<String>, content: impl Into<String>) -> Self {
        self.attachments.insert(name.into(), content.into());
        self
    }

    pub fn with_object(mut self, object: DocumentObject) -> Self {
        self.objects.push(object);
        self
    }

    pub fn with_class_property(mut self, name: impl Into<String>, property_type: impl Into<String>) -> Self {
        self.class_properties.insert(name.into(), property_type.into());
        self
    }
}

/// Read access to live documents.
pub trait DocumentStore: Send + Sync {
    /// The current document, `None` when it does not exist.
    fn get_document(
        &self,
        namespace: Option<&str>,
        reference: &DocumentReference,
    ) -> Result<Option<Document>>;
}

/// In-memory [`DocumentStore`].
#[derive(Default)]
pub struct MemoryDocumentStore {
    documents: RwLock<HashMap<(Namespace, DocumentReference), Document>>,
    reads: AtomicUsize,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn save_document(&self, namespace: Option<&str>, document: Document) {
        let key = (namespace.map(str::to_string), document.document_reference());
        self.documents.write().insert(key, document);
    }

    pub fn delete_document(&self, namespace: Option<&str>, reference: &DocumentReference) -> bool {
        self.documents
            .write()
            .remove(&(namespace.map(str::to_string), reference.clone()))
            .is_some()
    }

    /// Number of `get_document` calls served.
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::Relaxed)
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn get_document(
        &self,
        namespace: Option<&str>,
        reference: &DocumentReference,
    ) -> Result<Option<Document>> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        Ok(self
            .documents
            .read()
            .get(&(namespace.map(str::to_string), reference.clone()))
            .cloned())
    }
}
