//! Jar extension handler.
//!
//! Installing a jar adds it as a code source of the namespace's context and
//! registers the components it declares in that namespace's component
//! registry. Uninstalling unregisters them again but leaves the context in
//! place; dropping contexts is the lifecycle bridge's decision because other
//! extensions may still be loaded through the same context.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use super::ExtensionHandler;
use crate::component::{
    scan_component_file, ComponentDeclaration, ComponentDescriptor, ComponentRegistry,
};
use crate::config::extension_types;
use crate::context::{ContextId, NamespaceContextRegistry};
use crate::error::{ExtensionError, Result};
use crate::types::LocalExtension;

/// Handler for `jar` extensions.
pub struct JarExtensionHandler {
    contexts: Arc<NamespaceContextRegistry>,
    components: Arc<dyn ComponentRegistry>,
}

impl JarExtensionHandler {
    pub fn new(
        contexts: Arc<NamespaceContextRegistry>,
        components: Arc<dyn ComponentRegistry>,
    ) -> Self {
        Self {
            contexts,
            components,
        }
    }

    /// Declared components in registration order: lowest priority first, so
    /// higher priorities replace them for the same role and hint.
    fn declarations(&self, extension: &LocalExtension) -> Result<Vec<ComponentDeclaration>> {
        let mut declarations = scan_component_file(&extension.file)?.unwrap_or_default();
        declarations.sort_by_key(|d| d.priority);
        Ok(declarations)
    }

    fn register_components(
        &self,
        extension: &LocalExtension,
        context: ContextId,
        namespace: Option<&str>,
        declarations: &[ComponentDeclaration],
    ) -> usize {
        let mut registered = 0;

        for declaration in declarations {
            let class_name = &declaration.implementation_class_name;
            let class = match self.contexts.load_class(context, class_name) {
                Ok(class) => class,
                Err(e) => {
                    error!(
                        extension_id = %extension.id,
                        namespace = ?namespace,
                        class = %class_name,
                        error = %e,
                        "Failed to load component class, skipping"
                    );
                    continue;
                }
            };

            if class.descriptor.roles.is_empty() {
                warn!(class = %class_name, "Component class declares no role");
            }

            for role in class.descriptor.roles {
                debug!(role = %role.role, hint = %role.hint, class = %class_name, "Registering component");
                self.components.register(
                    namespace,
                    ComponentDescriptor {
                        role: role.role,
                        hint: role.hint,
                        implementation: class_name.clone(),
                        priority: declaration.priority,
                        context,
                    },
                );
                registered += 1;
            }
        }

        registered
    }

    fn unregister_components(
        &self,
        extension: &LocalExtension,
        context: ContextId,
        namespace: Option<&str>,
        declarations: &[ComponentDeclaration],
    ) -> usize {
        let mut unregistered = 0;

        for declaration in declarations {
            let class_name = &declaration.implementation_class_name;
            let class = match self.contexts.load_class(context, class_name) {
                Ok(class) => class,
                Err(e) => {
                    error!(
                        extension_id = %extension.id,
                        namespace = ?namespace,
                        class = %class_name,
                        error = %e,
                        "Failed to load component class for unregistration, skipping"
                    );
                    continue;
                }
            };

            for role in &class.descriptor.roles {
                if self
                    .components
                    .unregister(namespace, &role.role, &role.hint)
                    .is_some()
                {
                    unregistered += 1;
                }
            }
        }

        unregistered
    }
}

impl ExtensionHandler for JarExtensionHandler {
    fn handler_type(&self) -> &str {
        extension_types::JAR
    }

    fn install(&self, extension: &LocalExtension, namespace: Option<&str>) -> Result<()> {
        let context = self
            .contexts
            .get_context(namespace, true)
            .ok_or_else(|| ExtensionError::install(extension.id.to_string(), "no code loading context"))?;

        self.contexts
            .add_artifact(context, &extension.file)
            .map_err(|e| {
                ExtensionError::install(
                    extension.id.to_string(),
                    format!("failed to resolve artifact {}: {}", extension.file.display(), e),
                )
            })?;

        let declarations = self
            .declarations(extension)
            .map_err(|e| ExtensionError::install(extension.id.to_string(), e))?;

        if declarations.is_empty() {
            debug!(extension_id = %extension.id, "Extension declares no components");
            return Ok(());
        }

        let registered = self.register_components(extension, context, namespace, &declarations);
        info!(
            extension_id = %extension.id,
            namespace = ?namespace,
            registered,
            "Installed jar extension"
        );
        Ok(())
    }

    fn uninstall(&self, extension: &LocalExtension, namespace: Option<&str>) -> Result<()> {
        let Some(context) = self.contexts.get_context(namespace, false) else {
            debug!(extension_id = %extension.id, namespace = ?namespace, "No context to uninstall from");
            return Ok(());
        };

        // A namespace without its own context resolves to the root; never
        // unregister from a scope the request did not name.
        if let Some(ns) = namespace {
            let context_namespace = self.contexts.context_namespace(context).flatten();
            if context_namespace.as_deref() != Some(ns) {
                debug!(
                    extension_id = %extension.id,
                    namespace = ns,
                    context_namespace = ?context_namespace,
                    "Context namespace mismatch, nothing to uninstall"
                );
                return Ok(());
            }
        }

        let declarations = self
            .declarations(extension)
            .map_err(|e| ExtensionError::uninstall(extension.id.to_string(), e))?;

        let unregistered = self.unregister_components(extension, context, namespace, &declarations);
        info!(
            extension_id = %extension.id,
            namespace = ?namespace,
            unregistered,
            "Uninstalled jar extension"
        );
        Ok(())
    }
}
