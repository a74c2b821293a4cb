//! Namespace-scoped component registry.

use parking_lot::RwLock;
use std::collections::HashMap;

use super::ComponentDescriptor;
use crate::types::Namespace;

/// Register/unregister components by `(role, hint)` in a namespace scope.
///
/// The `None` namespace is the global scope. Lookups in a namespace fall back
/// to the global scope, the same way namespace contexts see the root
/// context's artifacts.
pub trait ComponentRegistry: Send + Sync {
    /// Register a component, replacing any component with the same role and hint.
    fn register(&self, namespace: Option<&str>, component: ComponentDescriptor);

    /// Remove a component, returning it when it was registered.
    fn unregister(&self, namespace: Option<&str>, role: &str, hint: &str)
        -> Option<ComponentDescriptor>;

    /// Find a component visible from `namespace`.
    fn lookup(&self, namespace: Option<&str>, role: &str, hint: &str)
        -> Option<ComponentDescriptor>;
}

type Scope = HashMap<(String, String), ComponentDescriptor>;

/// In-memory [`ComponentRegistry`].
#[derive(Default)]
pub struct NamespacedComponentRegistry {
    scopes: RwLock<HashMap<Namespace, Scope>>,
}

impl NamespacedComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Components registered directly in `namespace`, without fallback.
    pub fn components(&self, namespace: Option<&str>) -> Vec<ComponentDescriptor> {
        let scopes = self.scopes.read();
        let mut components: Vec<ComponentDescriptor> = scopes
            .get(&namespace.map(str::to_string))
            .map(|scope| scope.values().cloned().collect())
            .unwrap_or_default();
        components.sort_by(|a, b| (&a.role, &a.hint).cmp(&(&b.role, &b.hint)));
        components
    }

    /// Whether `(role, hint)` is registered directly in `namespace`.
    pub fn has_component(&self, namespace: Option<&str>, role: &str, hint: &str) -> bool {
        self.scopes
            .read()
            .get(&namespace.map(str::to_string))
            .map(|scope| scope.contains_key(&(role.to_string(), hint.to_string())))
            .unwrap_or(false)
    }
}

impl ComponentRegistry for NamespacedComponentRegistry {
    fn register(&self, namespace: Option<&str>, component: ComponentDescriptor) {
        let key = (component.role.clone(), component.hint.clone());
        self.scopes
            .write()
            .entry(namespace.map(str::to_string))
            .or_default()
            .insert(key, component);
    }

    fn unregister(
        &self,
        namespace: Option<&str>,
        role: &str,
        hint: &str,
    ) -> Option<ComponentDescriptor> {
        let mut scopes = self.scopes.write();
        let key = namespace.map(str::to_string);
        let scope = scopes.get_mut(&key)?;
        let removed = scope.remove(&(role.to_string(), hint.to_string()));
        if scope.is_empty() {
            scopes.remove(&key);
        }
        removed
    }

    fn lookup(
        &self,
        namespace: Option<&str>,
        role: &str,
        hint: &str,
    ) -> Option<ComponentDescriptor> {
        let scopes = self.scopes.read();
        let key = (role.to_string(), hint.to_string());

        namespace
            .and_then(|ns| scopes.get(&Some(ns.to_string())))
            .and_then(|scope| scope.get(&key))
            .or_else(|| scopes.get(&None).and_then(|scope| scope.get(&key)))
            .cloned()
    }
}
