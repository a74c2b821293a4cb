//! Namespace-scoped code loading contexts.
//!
//! Every namespace gets its own [`CodeLoadingContext`], parented to a single
//! root context. Contexts live in an arena and are addressed by [`ContextId`];
//! ids grow monotonically, so a dropped context's identity is never handed out
//! again.
//!
//! ```text
//!                 ┌──────────────┐
//!                 │ root context │  (global namespace)
//!                 └──────┬───────┘
//!          ┌─────────────┼─────────────┐
//!          ▼             ▼             ▼
//!   ┌────────────┐ ┌────────────┐ ┌────────────┐
//!   │ wiki:alpha │ │ wiki:beta  │ │    ...     │
//!   └────────────┘ └────────────┘ └────────────┘
//! ```

mod loader;

pub use loader::{class_entry_name, read_class_descriptor, LoadedClass};

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{ExtensionError, Result};
use crate::types::Namespace;

/// Identity of a code loading context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(u64);

impl ContextId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx#{}", self.0)
    }
}

/// Snapshot of a code loading context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeLoadingContext {
    pub id: ContextId,
    pub namespace: Namespace,
    pub parent: Option<ContextId>,
    /// Code sources, in load order
    pub artifacts: Vec<PathBuf>,
}

impl CodeLoadingContext {
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

#[derive(Default)]
struct ContextArena {
    nodes: HashMap<ContextId, CodeLoadingContext>,
    root: Option<ContextId>,
    namespaces: HashMap<String, ContextId>,
    next_id: u64,
}

impl ContextArena {
    fn allocate(&mut self, namespace: Namespace, parent: Option<ContextId>) -> ContextId {
        self.next_id += 1;
        let id = ContextId(self.next_id);
        self.nodes.insert(
            id,
            CodeLoadingContext {
                id,
                namespace,
                parent,
                artifacts: Vec::new(),
            },
        );
        id
    }

    fn root_or_create(&mut self) -> ContextId {
        match self.root {
            Some(root) => root,
            None => {
                let root = self.allocate(None, None);
                self.root = Some(root);
                debug!(context = %root, "Created root code loading context");
                root
            }
        }
    }

    /// Artifacts visible from `id`, parent first.
    fn visible_artifacts(&self, id: ContextId) -> Option<Vec<PathBuf>> {
        let node = self.nodes.get(&id)?;
        let mut artifacts = match node.parent.and_then(|p| self.visible_artifacts(p)) {
            Some(parent_artifacts) => parent_artifacts,
            None => Vec::new(),
        };
        artifacts.extend(node.artifacts.iter().cloned());
        Some(artifacts)
    }
}

/// Process-wide registry of code loading contexts.
///
/// All operations take a single lock, so get-or-create is atomic and two
/// concurrent callers can never end up with two contexts for one namespace.
#[derive(Default)]
pub struct NamespaceContextRegistry {
    arena: Mutex<ContextArena>,
}

impl NamespaceContextRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the context of `namespace`, creating it when `create` is set.
    ///
    /// With `create == false` a namespace without its own context falls back
    /// to the root context, so a returned id does not imply per-namespace
    /// isolation. `None` is only returned for the global namespace when
    /// `create` is unset and no root exists yet.
    pub fn get_context(&self, namespace: Option<&str>, create: bool) -> Option<ContextId> {
        let mut arena = self.arena.lock();

        let Some(namespace) = namespace else {
            return if create {
                Some(arena.root_or_create())
            } else {
                arena.root
            };
        };

        if let Some(id) = arena.namespaces.get(namespace) {
            return Some(*id);
        }

        if create {
            let root = arena.root_or_create();
            let id = arena.allocate(Some(namespace.to_string()), Some(root));
            arena.namespaces.insert(namespace.to_string(), id);
            debug!(namespace, context = %id, "Created namespace code loading context");
            Some(id)
        } else {
            Some(arena.root_or_create())
        }
    }

    /// Drop the context of `namespace`. The next lookup creates a fresh one.
    pub fn drop_context(&self, namespace: &str) -> bool {
        let mut arena = self.arena.lock();
        match arena.namespaces.remove(namespace) {
            Some(id) => {
                arena.nodes.remove(&id);
                debug!(namespace, context = %id, "Dropped namespace code loading context");
                true
            }
            None => false,
        }
    }

    /// Drop every namespace context and the root context.
    pub fn drop_all_contexts(&self) {
        let mut arena = self.arena.lock();
        arena.namespaces.clear();
        arena.nodes.clear();
        arena.root = None;
        debug!("Dropped all code loading contexts");
    }

    /// Append a code source to a context.
    ///
    /// The artifact is canonicalized first; failing to resolve it is an
    /// error. Returns `false` when the artifact was already loaded.
    pub fn add_artifact(&self, context: ContextId, artifact: &Path) -> Result<bool> {
        let artifact = std::fs::canonicalize(artifact)?;

        let mut arena = self.arena.lock();
        let node = arena
            .nodes
            .get_mut(&context)
            .ok_or(ExtensionError::ContextNotFound(context.as_u64()))?;

        if node.artifacts.contains(&artifact) {
            return Ok(false);
        }
        debug!(context = %context, artifact = %artifact.display(), "Added artifact to context");
        node.artifacts.push(artifact);
        Ok(true)
    }

    /// Load a class through `context`, searching the parent's artifacts first.
    pub fn load_class(&self, context: ContextId, class_name: &str) -> Result<LoadedClass> {
        let artifacts = self
            .arena
            .lock()
            .visible_artifacts(context)
            .ok_or(ExtensionError::ContextNotFound(context.as_u64()))?;

        // Archive reads happen outside the lock.
        for artifact in &artifacts {
            match read_class_descriptor(artifact, class_name) {
                Ok(Some(descriptor)) => {
                    return Ok(LoadedClass {
                        name: class_name.to_string(),
                        context,
                        artifact: artifact.clone(),
                        descriptor,
                    });
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(
                        artifact = %artifact.display(),
                        class = class_name,
                        error = %e,
                        "Skipping unreadable artifact"
                    );
                }
            }
        }

        Err(ExtensionError::ClassNotFound(class_name.to_string()))
    }

    /// Snapshot of a context, `None` once it was dropped.
    pub fn context(&self, context: ContextId) -> Option<CodeLoadingContext> {
        self.arena.lock().nodes.get(&context).cloned()
    }

    /// Namespace identity of a context. The outer `None` means the context
    /// no longer exists; `Some(None)` is the root.
    pub fn context_namespace(&self, context: ContextId) -> Option<Namespace> {
        self.arena
            .lock()
            .nodes
            .get(&context)
            .map(|node| node.namespace.clone())
    }

    /// Namespaces that currently own a context.
    pub fn namespaces(&self) -> Vec<String> {
        let mut namespaces: Vec<String> = self.arena.lock().namespaces.keys().cloned().collect();
        namespaces.sort();
        namespaces
    }

    /// Number of live contexts, root included.
    pub fn count(&self) -> usize {
        self.arena.lock().nodes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_context_created_on_demand() {
        let registry = NamespaceContextRegistry::new();
        assert_eq!(registry.get_context(None, false), None);

        let root = registry.get_context(None, true).unwrap();
        assert_eq!(registry.get_context(None, false), Some(root));
        assert!(registry.context(root).unwrap().is_root());
    }

    #[test]
    fn test_namespace_context_parented_to_root() {
        let registry = NamespaceContextRegistry::new();
        let ctx = registry.get_context(Some("wiki:a"), true).unwrap();
        let root = registry.get_context(None, false).unwrap();

        let snapshot = registry.context(ctx).unwrap();
        assert_eq!(snapshot.parent, Some(root));
        assert_eq!(snapshot.namespace, Some("wiki:a".to_string()));
        assert_eq!(registry.get_context(Some("wiki:a"), true), Some(ctx));
        assert_eq!(registry.count(), 2);
    }

    #[test]
    fn test_missing_namespace_falls_back_to_root() {
        let registry = NamespaceContextRegistry::new();
        let fallback = registry.get_context(Some("ns-A"), false).unwrap();
        assert!(registry.context(fallback).unwrap().is_root());

        let root = registry.get_context(None, true).unwrap();
        assert_eq!(fallback, root);
        assert_eq!(registry.get_context(Some("ns-A"), false), Some(root));
        assert!(registry.namespaces().is_empty());
    }

    #[test]
    fn test_dropped_identity_is_not_reused() {
        let registry = NamespaceContextRegistry::new();
        let first = registry.get_context(Some("wiki:a"), true).unwrap();
        assert!(registry.drop_context("wiki:a"));
        assert!(!registry.drop_context("wiki:a"));
        assert!(registry.context(first).is_none());

        let second = registry.get_context(Some("wiki:a"), true).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_drop_all_contexts() {
        let registry = NamespaceContextRegistry::new();
        let root = registry.get_context(None, true).unwrap();
        registry.get_context(Some("wiki:a"), true);
        registry.get_context(Some("wiki:b"), true);

        registry.drop_all_contexts();
        assert_eq!(registry.count(), 0);
        assert_eq!(registry.get_context(None, false), None);
        let fresh_root = registry.get_context(Some("wiki:a"), false).unwrap();
        assert_ne!(fresh_root, root);
        assert!(registry.context(fresh_root).unwrap().is_root());
    }

    #[test]
    fn test_add_artifact_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("lib.jar");
        std::fs::write(&artifact, b"").unwrap();

        let registry = NamespaceContextRegistry::new();
        let ctx = registry.get_context(Some("wiki:a"), true).unwrap();
        assert!(registry.add_artifact(ctx, &artifact).unwrap());
        assert!(!registry.add_artifact(ctx, &artifact).unwrap());
        assert_eq!(registry.context(ctx).unwrap().artifacts.len(), 1);
    }

    #[test]
    fn test_add_missing_artifact_fails() {
        let registry = NamespaceContextRegistry::new();
        let ctx = registry.get_context(None, true).unwrap();
        let result = registry.add_artifact(ctx, Path::new("/nonexistent/lib.jar"));
        assert!(matches!(result, Err(ExtensionError::Io(_))));
    }

    #[test]
    fn test_concurrent_get_or_create() {
        let registry = std::sync::Arc::new(NamespaceContextRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                std::thread::spawn(move || registry.get_context(Some("wiki:shared"), true).unwrap())
            })
            .collect();

        let ids: Vec<ContextId> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(ids.iter().all(|id| *id == ids[0]));
        assert_eq!(registry.count(), 2);
    }
}
