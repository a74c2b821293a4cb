//! Extension repositories.
//!
//! The lifecycle jobs only see these traits:
//! - [`LocalExtensionRepository`]: packages downloaded to local storage
//! - [`InstalledExtensionRepository`]: where each feature is installed
//! - [`ExtensionRepositoryManager`]: remote resolution of missing packages
//!
//! The `memory` module provides process-local implementations.

pub mod memory;

pub use memory::{
    FileLocalExtensionRepository, MemoryInstalledExtensionRepository, MemoryRepositoryManager,
};

use crate::error::{ExtensionError, Result};
use crate::types::{ExtensionDependency, ExtensionId, InstalledExtension, LocalExtension};

/// A package obtained from a remote repository.
#[derive(Debug, Clone)]
pub struct RemoteExtension {
    pub id: ExtensionId,
    pub extension_type: String,
    pub dependencies: Vec<ExtensionDependency>,
    /// Raw package bytes
    pub content: Vec<u8>,
}

impl RemoteExtension {
    pub fn new(id: ExtensionId, extension_type: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            id,
            extension_type: extension_type.into(),
            dependencies: Vec::new(),
            content,
        }
    }

    pub fn with_dependency(mut self, dependency: ExtensionDependency) -> Self {
        self.dependencies.push(dependency);
        self
    }
}

/// Locally stored packages.
pub trait LocalExtensionRepository: Send + Sync {
    fn get_local_extension(&self, id: &ExtensionId) -> Option<LocalExtension>;

    /// Persist a resolved package and return its local handle.
    fn store_extension(&self, extension: RemoteExtension) -> Result<LocalExtension>;

    fn local_extensions(&self) -> Vec<LocalExtension>;
}

/// Installed state per feature and namespace.
pub trait InstalledExtensionRepository: Send + Sync {
    /// The installed extension of `feature` visible from `namespace`
    /// (installed there or globally).
    fn get_installed_extension(
        &self,
        feature: &str,
        namespace: Option<&str>,
    ) -> Option<InstalledExtension>;

    /// Mark `extension` installed on `namespace`.
    fn install_extension(
        &self,
        extension: &LocalExtension,
        namespace: Option<&str>,
        dependency: bool,
    ) -> Result<InstalledExtension>;

    /// Remove the install of `feature` on `namespace`.
    fn uninstall_extension(&self, feature: &str, namespace: Option<&str>) -> Result<()>;

    fn installed_extensions(&self) -> Vec<InstalledExtension>;
}

/// Remote resolution of packages.
pub trait ExtensionRepositoryManager: Send + Sync {
    fn resolve(&self, id: &ExtensionId) -> Result<RemoteExtension>;
}

/// The local package of `id`, resolved remotely and stored when missing.
pub fn local_or_resolve(
    local: &dyn LocalExtensionRepository,
    remote: &dyn ExtensionRepositoryManager,
    id: &ExtensionId,
) -> Result<LocalExtension> {
    if let Some(extension) = local.get_local_extension(id) {
        return Ok(extension);
    }

    tracing::debug!(extension_id = %id, "Extension not stored locally, resolving");
    let extension = remote.resolve(id)?;
    local
        .store_extension(extension)
        .map_err(|e| ExtensionError::install(id.to_string(), e))
}
