//! Install and uninstall jobs.
//!
//! Both jobs delegate the type specific work to the [`ExtensionHandler`]
//! registered for the extension type and keep the installed repository in
//! sync. An extension type without handler is only recorded as installed.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use super::{Job, JobProgress, JobStatus};
use crate::config::job_types;
use crate::error::{ExtensionError, Result};
use crate::handler::HandlerRegistry;
use crate::repository::{
    local_or_resolve, ExtensionRepositoryManager, InstalledExtensionRepository,
    LocalExtensionRepository,
};
use crate::types::{ExtensionId, ExtensionRequest};

/// Installs extensions and their pinned dependencies.
pub struct InstallJob {
    status: JobStatus,
    handlers: Arc<HandlerRegistry>,
    local: Arc<dyn LocalExtensionRepository>,
    installed: Arc<dyn InstalledExtensionRepository>,
    remote: Arc<dyn ExtensionRepositoryManager>,
}

impl InstallJob {
    pub fn new(
        request: ExtensionRequest,
        handlers: Arc<HandlerRegistry>,
        local: Arc<dyn LocalExtensionRepository>,
        installed: Arc<dyn InstalledExtensionRepository>,
        remote: Arc<dyn ExtensionRepositoryManager>,
    ) -> Self {
        Self {
            status: JobStatus::new(job_types::INSTALL, request),
            handlers,
            local,
            installed,
            remote,
        }
    }

    fn install(
        &mut self,
        id: &ExtensionId,
        namespace: Option<&str>,
        dependency: bool,
        mut path: Vec<String>,
    ) -> Result<()> {
        let progress = self.status.progress.clone();
        let _level = progress.push_level(2);

        if let Some(installed) = self.installed.get_installed_extension(&id.id, namespace) {
            if id.version.is_none() || installed.id() == id {
                debug!(extension_id = %id, namespace = ?namespace, "Extension already installed");
                return Ok(());
            }
        }

        let local = local_or_resolve(self.local.as_ref(), self.remote.as_ref(), id)?;
        path.push(id.id.clone());

        if !local.dependencies.is_empty() {
            let _dependencies = progress.push_level(local.dependencies.len());
            for dependency in &local.dependencies {
                if path.contains(&dependency.id) {
                    warn!(extension_id = %id, dependency = %dependency, "Dependency cycle, skipping");
                    progress.step();
                    continue;
                }

                let Some(dependency_id) = dependency.pinned_id() else {
                    if self
                        .installed
                        .get_installed_extension(&dependency.id, namespace)
                        .is_none()
                    {
                        warn!(
                            extension_id = %id,
                            dependency = %dependency,
                            "Dependency declared with a version range is not installed, skipping"
                        );
                    }
                    progress.step();
                    continue;
                };

                // Each branch gets its own path.
                self.install(&dependency_id, namespace, true, path.clone())?;
            }
        }
        progress.step();

        match self.handlers.get(&local.extension_type) {
            Some(handler) => handler.install(&local, namespace)?,
            None => debug!(
                extension_id = %id,
                extension_type = %local.extension_type,
                "No handler for extension type"
            ),
        }

        self.installed.install_extension(&local, namespace, dependency)?;
        info!(extension_id = %id, namespace = ?namespace, dependency, "Installed extension");
        Ok(())
    }
}

impl Job for InstallJob {
    type Output = JobStatus;

    fn job_type(&self) -> &'static str {
        job_types::INSTALL
    }

    fn request(&self) -> &ExtensionRequest {
        &self.status.request
    }

    fn progress(&self) -> JobProgress {
        self.status.progress.clone()
    }

    fn run(mut self) -> JobStatus {
        self.status.start();

        let request = self.status.request.clone();
        let namespaces = request.target_namespaces();
        let progress = self.status.progress.clone();

        {
            let _extensions = progress.push_level(request.extensions.len() * namespaces.len());
            for id in &request.extensions {
                for namespace in &namespaces {
                    if let Err(e) = self.install(id, namespace.as_deref(), false, Vec::new()) {
                        error!(extension_id = %id, namespace = ?namespace, error = %e, "Failed to install extension");
                        self.status.record_error(format!("{}: {}", id, e));
                    }
                }
            }
        }

        self.status.finish();
        self.status
    }
}

/// Uninstalls extensions from the requested namespaces, or everywhere when
/// the request names none.
pub struct UninstallJob {
    status: JobStatus,
    handlers: Arc<HandlerRegistry>,
    installed: Arc<dyn InstalledExtensionRepository>,
}

impl UninstallJob {
    pub fn new(
        request: ExtensionRequest,
        handlers: Arc<HandlerRegistry>,
        installed: Arc<dyn InstalledExtensionRepository>,
    ) -> Self {
        Self {
            status: JobStatus::new(job_types::UNINSTALL, request),
            handlers,
            installed,
        }
    }

    fn uninstall(&self, id: &ExtensionId, namespace: Option<&str>) -> Result<()> {
        let installed = self
            .installed
            .get_installed_extension(&id.id, namespace)
            .ok_or_else(|| ExtensionError::NotFound(id.to_string()))?;

        if let Some(ns) = namespace {
            if !installed.namespaces.contains_key(&Some(ns.to_string())) {
                return Err(ExtensionError::uninstall(
                    id.to_string(),
                    format!("installed globally, not on namespace {}", ns),
                ));
            }
        }

        // A global uninstall removes the feature from every namespace, so the
        // handler has to unload it from each of them.
        let scopes: Vec<Option<String>> = match namespace {
            Some(ns) => vec![Some(ns.to_string())],
            None => installed.namespaces.keys().cloned().collect(),
        };
        if let Some(handler) = self.handlers.get(installed.extension_type()) {
            for scope in &scopes {
                handler.uninstall(&installed.extension, scope.as_deref())?;
            }
        }
        self.installed.uninstall_extension(&id.id, namespace)?;

        info!(extension_id = %installed.id(), namespace = ?namespace, "Uninstalled extension");
        Ok(())
    }
}

impl Job for UninstallJob {
    type Output = JobStatus;

    fn job_type(&self) -> &'static str {
        job_types::UNINSTALL
    }

    fn request(&self) -> &ExtensionRequest {
        &self.status.request
    }

    fn progress(&self) -> JobProgress {
        self.status.progress.clone()
    }

    fn run(mut self) -> JobStatus {
        self.status.start();

        let request = self.status.request.clone();
        let namespaces = request.target_namespaces();
        let progress = self.status.progress.clone();

        {
            let _extensions = progress.push_level(request.extensions.len() * namespaces.len());
            for id in &request.extensions {
                for namespace in &namespaces {
                    if let Err(e) = self.uninstall(id, namespace.as_deref()) {
                        error!(extension_id = %id, namespace = ?namespace, error = %e, "Failed to uninstall extension");
                        self.status.record_error(format!("{}: {}", id, e));
                    }
                    progress.step();
                }
            }
        }

        self.status.finish();
        self.status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{
        FileLocalExtensionRepository, MemoryInstalledExtensionRepository, MemoryRepositoryManager,
        RemoteExtension,
    };
    use crate::types::ExtensionDependency;

    struct Fixture {
        _dir: tempfile::TempDir,
        local: Arc<FileLocalExtensionRepository>,
        installed: Arc<MemoryInstalledExtensionRepository>,
        remote: Arc<MemoryRepositoryManager>,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            Self {
                local: Arc::new(FileLocalExtensionRepository::new(dir.path())),
                installed: Arc::new(MemoryInstalledExtensionRepository::new()),
                remote: Arc::new(MemoryRepositoryManager::new()),
                _dir: dir,
            }
        }

        fn install(&self, request: ExtensionRequest) -> JobStatus {
            InstallJob::new(
                request,
                Arc::new(HandlerRegistry::new()),
                self.local.clone(),
                self.installed.clone(),
                self.remote.clone(),
            )
            .run()
        }

        fn uninstall(&self, request: ExtensionRequest) -> JobStatus {
            UninstallJob::new(request, Arc::new(HandlerRegistry::new()), self.installed.clone()).run()
        }
    }

    #[test]
    fn test_install_marks_dependencies() {
        let fixture = Fixture::new();
        fixture.remote.add_extension(
            RemoteExtension::new(ExtensionId::new("app", "1.0"), "xar", vec![])
                .with_dependency(ExtensionDependency::new("lib", "2.0")),
        );
        fixture
            .remote
            .add_extension(RemoteExtension::new(ExtensionId::new("lib", "2.0"), "xar", vec![]));

        let status = fixture.install(
            ExtensionRequest::new(vec![ExtensionId::new("app", "1.0")]).with_namespace("wiki:a"),
        );
        assert!(!status.has_errors());

        let lib = fixture
            .installed
            .get_installed_extension("lib", Some("wiki:a"))
            .unwrap();
        assert!(lib.is_dependency(Some("wiki:a")));
        let app = fixture
            .installed
            .get_installed_extension("app", Some("wiki:a"))
            .unwrap();
        assert!(!app.is_dependency(Some("wiki:a")));
    }

    #[test]
    fn test_uninstall_missing_is_recorded() {
        let fixture = Fixture::new();
        let status = fixture.uninstall(ExtensionRequest::new(vec![ExtensionId::new("app", "1.0")]));
        assert_eq!(status.errors.len(), 1);
    }

    #[test]
    fn test_uninstall_one_namespace() {
        let fixture = Fixture::new();
        fixture
            .remote
            .add_extension(RemoteExtension::new(ExtensionId::new("app", "1.0"), "xar", vec![]));
        fixture.install(
            ExtensionRequest::new(vec![ExtensionId::new("app", "1.0")])
                .with_namespace("wiki:a")
                .with_namespace("wiki:b"),
        );

        let status = fixture.uninstall(
            ExtensionRequest::new(vec![ExtensionId::new("app", "1.0")]).with_namespace("wiki:a"),
        );
        assert!(!status.has_errors());
        assert!(fixture.installed.get_installed_extension("app", Some("wiki:a")).is_none());
        assert!(fixture.installed.get_installed_extension("app", Some("wiki:b")).is_some());
    }
}
