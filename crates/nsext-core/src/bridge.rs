//! Reloads jar extensions when the application starts and after uninstalls.
//!
//! On application start every installed jar extension is installed again into
//! fresh contexts. When an uninstall job finishes, the contexts of the
//! namespaces it touched are dropped and the jar extensions still installed
//! there are loaded again, so nothing keeps running from an uninstalled
//! artifact. An uninstall without namespaces drops every context.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::config::extension_types;
use crate::context::NamespaceContextRegistry;
use crate::event::LifecycleEvent;
use crate::eventbus::EventBus;
use crate::handler::ExtensionHandler;
use crate::repository::InstalledExtensionRepository;
use crate::types::{InstalledExtension, Namespace};

pub struct LifecycleEventBridge {
    contexts: Arc<NamespaceContextRegistry>,
    installed: Arc<dyn InstalledExtensionRepository>,
    jar_handler: Arc<dyn ExtensionHandler>,
}

impl LifecycleEventBridge {
    pub fn new(
        contexts: Arc<NamespaceContextRegistry>,
        installed: Arc<dyn InstalledExtensionRepository>,
        jar_handler: Arc<dyn ExtensionHandler>,
    ) -> Self {
        Self {
            contexts,
            installed,
            jar_handler,
        }
    }

    /// React to `event`. Returns the number of extension installs performed.
    pub fn handle(&self, event: &LifecycleEvent) -> usize {
        match event {
            LifecycleEvent::ApplicationStarted => self.load_all(),
            LifecycleEvent::JobFinished { .. } => match event.uninstall_request() {
                Some(request) if request.has_namespaces() => request
                    .namespaces
                    .iter()
                    .flatten()
                    .map(|namespace| self.reload_namespace(namespace))
                    .sum(),
                Some(_) => {
                    self.contexts.drop_all_contexts();
                    self.load_all()
                }
                None => 0,
            },
        }
    }

    /// Subscribe to `bus` and handle lifecycle triggers until it closes.
    pub fn spawn(self: Arc<Self>, bus: &EventBus) -> JoinHandle<()> {
        let mut rx = bus.subscribe_filtered(LifecycleEvent::is_lifecycle_trigger);

        tokio::spawn(async move {
            while let Some((event, meta)) = rx.recv().await {
                debug!(event = event.type_name(), source = %meta.source, "Lifecycle event received");
                let bridge = self.clone();
                if let Err(e) = tokio::task::spawn_blocking(move || bridge.handle(&event)).await {
                    error!(error = %e, "Lifecycle event handler did not complete");
                }
            }
            debug!("Event bus closed, lifecycle bridge stopped");
        })
    }

    fn load_all(&self) -> usize {
        let mut loaded = 0;
        for extension in self.jar_load_order() {
            for namespace in extension.namespaces.keys() {
                loaded += self.load(&extension, namespace.as_deref());
            }
        }
        info!(loaded, "Loaded installed jar extensions");
        loaded
    }

    fn reload_namespace(&self, namespace: &str) -> usize {
        self.contexts.drop_context(namespace);

        let target: Namespace = Some(namespace.to_string());
        let mut loaded = 0;
        for extension in self.jar_load_order() {
            if extension.namespaces.contains_key(&target) {
                loaded += self.load(&extension, Some(namespace));
            }
        }
        info!(namespace, loaded, "Reloaded namespace jar extensions");
        loaded
    }

    fn load(&self, extension: &InstalledExtension, namespace: Option<&str>) -> usize {
        match self.jar_handler.install(&extension.extension, namespace) {
            Ok(()) => 1,
            Err(e) => {
                error!(
                    extension_id = %extension.id(),
                    namespace = ?namespace,
                    error = %e,
                    "Failed to load jar extension"
                );
                0
            }
        }
    }

    /// Installed jar extensions, dependencies before their dependents.
    fn jar_load_order(&self) -> Vec<InstalledExtension> {
        let jars: HashMap<String, InstalledExtension> = self
            .installed
            .installed_extensions()
            .into_iter()
            .filter(|e| e.extension_type() == extension_types::JAR)
            .map(|e| (e.id().id.clone(), e))
            .collect();

        let mut features: Vec<&String> = jars.keys().collect();
        features.sort();

        let mut visited = HashSet::new();
        let mut order = Vec::with_capacity(jars.len());
        for feature in features {
            visit(feature, &jars, &mut visited, &mut order);
        }
        order
    }
}

fn visit(
    feature: &str,
    jars: &HashMap<String, InstalledExtension>,
    visited: &mut HashSet<String>,
    order: &mut Vec<InstalledExtension>,
) {
    let Some(extension) = jars.get(feature) else {
        return;
    };
    if !visited.insert(feature.to_string()) {
        return;
    }
    for dependency in extension.dependencies() {
        visit(&dependency.id, jars, visited, order);
    }
    order.push(extension.clone());
}
