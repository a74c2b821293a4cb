//! Process-local repository implementations.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::{debug, info};

use super::{
    ExtensionRepositoryManager, InstalledExtensionRepository, LocalExtensionRepository,
    RemoteExtension,
};
use crate::error::{ExtensionError, Result};
use crate::types::{compare_versions, ExtensionId, InstallState, InstalledExtension, LocalExtension};

/// Local repository storing package files in a directory and their metadata
/// in memory.
pub struct FileLocalExtensionRepository {
    dir: PathBuf,
    extensions: RwLock<HashMap<ExtensionId, LocalExtension>>,
}

impl FileLocalExtensionRepository {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            extensions: RwLock::new(HashMap::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Register a package that already exists on disk.
    pub fn add_local_extension(&self, extension: LocalExtension) {
        self.extensions
            .write()
            .insert(extension.id.clone(), extension);
    }

    fn file_name(id: &ExtensionId, extension_type: &str) -> String {
        let sanitize = |s: &str| s.replace([':', '/', '\\'], "-");
        match &id.version {
            Some(version) => format!("{}-{}.{}", sanitize(&id.id), sanitize(version), extension_type),
            None => format!("{}.{}", sanitize(&id.id), extension_type),
        }
    }
}

impl LocalExtensionRepository for FileLocalExtensionRepository {
    fn get_local_extension(&self, id: &ExtensionId) -> Option<LocalExtension> {
        let extensions = self.extensions.read();
        if id.version.is_some() {
            return extensions.get(id).cloned();
        }
        // Unversioned lookups return the newest stored version of the feature.
        extensions
            .values()
            .filter(|e| e.id.same_feature(id))
            .max_by(|a, b| match (&a.id.version, &b.id.version) {
                (Some(a), Some(b)) => compare_versions(a, b),
                (a, b) => a.cmp(b),
            })
            .cloned()
    }

    fn store_extension(&self, extension: RemoteExtension) -> Result<LocalExtension> {
        std::fs::create_dir_all(&self.dir)?;
        let file = self
            .dir
            .join(Self::file_name(&extension.id, &extension.extension_type));
        std::fs::write(&file, &extension.content)?;

        let local = LocalExtension::new(extension.id, extension.extension_type, file)
            .with_dependencies(extension.dependencies);
        debug!(extension_id = %local.id, file = %local.file.display(), "Stored extension");
        self.add_local_extension(local.clone());
        Ok(local)
    }

    fn local_extensions(&self) -> Vec<LocalExtension> {
        let mut extensions: Vec<LocalExtension> = self.extensions.read().values().cloned().collect();
        extensions.sort_by(|a, b| a.id.cmp(&b.id));
        extensions
    }
}

/// In-memory installed state, keyed by feature.
#[derive(Default)]
pub struct MemoryInstalledExtensionRepository {
    extensions: RwLock<HashMap<String, InstalledExtension>>,
}

impl MemoryInstalledExtensionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl InstalledExtensionRepository for MemoryInstalledExtensionRepository {
    fn get_installed_extension(
        &self,
        feature: &str,
        namespace: Option<&str>,
    ) -> Option<InstalledExtension> {
        self.extensions
            .read()
            .get(feature)
            .filter(|installed| installed.is_installed(namespace))
            .cloned()
    }

    fn install_extension(
        &self,
        extension: &LocalExtension,
        namespace: Option<&str>,
        dependency: bool,
    ) -> Result<InstalledExtension> {
        let mut extensions = self.extensions.write();
        let installed = extensions
            .entry(extension.id.id.clone())
            .or_insert_with(|| InstalledExtension::new(extension.clone()));

        if installed.extension.id != extension.id {
            info!(
                previous = %installed.extension.id,
                next = %extension.id,
                "Replacing installed extension version"
            );
            installed.extension = extension.clone();
        }

        installed
            .namespaces
            .insert(namespace.map(str::to_string), InstallState { dependency });
        Ok(installed.clone())
    }

    fn uninstall_extension(&self, feature: &str, namespace: Option<&str>) -> Result<()> {
        let mut extensions = self.extensions.write();
        let installed = extensions
            .get_mut(feature)
            .ok_or_else(|| ExtensionError::NotFound(feature.to_string()))?;

        match namespace {
            // A global uninstall removes the feature everywhere.
            None => {
                extensions.remove(feature);
            }
            Some(ns) => {
                if installed.namespaces.remove(&Some(ns.to_string())).is_none() {
                    return Err(ExtensionError::uninstall(
                        feature,
                        format!("not installed on namespace {}", ns),
                    ));
                }
                if installed.namespaces.is_empty() {
                    extensions.remove(feature);
                }
            }
        }
        Ok(())
    }

    fn installed_extensions(&self) -> Vec<InstalledExtension> {
        let mut extensions: Vec<InstalledExtension> =
            self.extensions.read().values().cloned().collect();
        extensions.sort_by(|a, b| a.id().cmp(b.id()));
        extensions
    }
}

/// Repository manager serving packages from memory.
#[derive(Default)]
pub struct MemoryRepositoryManager {
    extensions: RwLock<HashMap<ExtensionId, RemoteExtension>>,
    resolve_count: AtomicUsize,
}

impl MemoryRepositoryManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_extension(&self, extension: RemoteExtension) {
        self.extensions
            .write()
            .insert(extension.id.clone(), extension);
    }

    /// Number of `resolve` calls served so far, successful or not.
    pub fn resolve_count(&self) -> usize {
        self.resolve_count.load(Ordering::Relaxed)
    }
}

impl ExtensionRepositoryManager for MemoryRepositoryManager {
    fn resolve(&self, id: &ExtensionId) -> Result<RemoteExtension> {
        self.resolve_count.fetch_add(1, Ordering::Relaxed);
        self.extensions
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| ExtensionError::resolve(id.to_string(), "not found in any repository"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ExtensionDependency;

    #[test]
    fn test_store_and_get_local_extension() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FileLocalExtensionRepository::new(dir.path());

        let remote = RemoteExtension::new(ExtensionId::new("org.example:app", "1.0"), "xar", b"data".to_vec())
            .with_dependency(ExtensionDependency::new("org.example:lib", "1.0"));
        let local = repo.store_extension(remote).unwrap();

        assert!(local.file.exists());
        assert_eq!(local.file.file_name().unwrap(), "org.example-app-1.0.xar");
        assert_eq!(local.dependencies.len(), 1);
        assert_eq!(repo.get_local_extension(&local.id), Some(local.clone()));
        assert_eq!(
            repo.get_local_extension(&ExtensionId::feature("org.example:app")),
            Some(local)
        );
        assert_eq!(repo.get_local_extension(&ExtensionId::new("org.example:app", "2.0")), None);
    }

    #[test]
    fn test_unversioned_lookup_returns_newest() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FileLocalExtensionRepository::new(dir.path());
        for version in ["9.0", "10.0", "2.5"] {
            repo.store_extension(RemoteExtension::new(ExtensionId::new("app", version), "jar", vec![]))
                .unwrap();
        }

        let newest = repo.get_local_extension(&ExtensionId::feature("app")).unwrap();
        assert_eq!(newest.id.version.as_deref(), Some("10.0"));
    }

    #[test]
    fn test_install_and_uninstall_namespaces() {
        let repo = MemoryInstalledExtensionRepository::new();
        let local = LocalExtension::new(ExtensionId::new("app", "1.0"), "jar", "/tmp/app.jar");

        repo.install_extension(&local, Some("wiki:a"), false).unwrap();
        repo.install_extension(&local, Some("wiki:b"), true).unwrap();

        assert!(repo.get_installed_extension("app", Some("wiki:a")).is_some());
        assert!(repo.get_installed_extension("app", None).is_none());
        assert!(repo
            .get_installed_extension("app", Some("wiki:b"))
            .unwrap()
            .is_dependency(Some("wiki:b")));

        repo.uninstall_extension("app", Some("wiki:a")).unwrap();
        assert!(repo.get_installed_extension("app", Some("wiki:a")).is_none());
        assert!(repo.get_installed_extension("app", Some("wiki:b")).is_some());

        repo.uninstall_extension("app", Some("wiki:b")).unwrap();
        assert!(repo.installed_extensions().is_empty());
        assert!(repo.uninstall_extension("app", None).is_err());
    }

    #[test]
    fn test_global_install_visible_everywhere() {
        let repo = MemoryInstalledExtensionRepository::new();
        let local = LocalExtension::new(ExtensionId::new("app", "1.0"), "jar", "/tmp/app.jar");
        repo.install_extension(&local, None, false).unwrap();

        assert!(repo.get_installed_extension("app", Some("wiki:any")).is_some());
        assert!(repo.get_installed_extension("app", None).is_some());
    }

    #[test]
    fn test_resolve_counts_calls() {
        let manager = MemoryRepositoryManager::new();
        manager.add_extension(RemoteExtension::new(ExtensionId::new("app", "1.0"), "xar", vec![]));

        assert!(manager.resolve(&ExtensionId::new("app", "1.0")).is_ok());
        assert!(matches!(
            manager.resolve(&ExtensionId::new("missing", "1.0")),
            Err(ExtensionError::Resolve { .. })
        ));
        assert_eq!(manager.resolve_count(), 2);
    }
}
