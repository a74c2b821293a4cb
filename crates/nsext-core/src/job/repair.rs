//! Repair job (`repairxar`).
//!
//! Makes the installed state match the declared state: every requested
//! extension, and transitively its pinned dependencies, ends up stored locally
//! and marked installed on each target namespace. Dependencies are repaired
//! before the extension that needs them is marked installed.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use super::{Job, JobProgress, JobStatus};
use crate::config::{extension_types, job_types};
use crate::error::Result;
use crate::repository::{
    local_or_resolve, ExtensionRepositoryManager, InstalledExtensionRepository,
    LocalExtensionRepository,
};
use crate::types::{ExtensionId, ExtensionRequest};

/// Repairs the installed state of package extensions.
pub struct RepairJob {
    status: JobStatus,
    local: Arc<dyn LocalExtensionRepository>,
    installed: Arc<dyn InstalledExtensionRepository>,
    remote: Arc<dyn ExtensionRepositoryManager>,
    installable_type: String,
}

impl RepairJob {
    pub fn new(
        request: ExtensionRequest,
        local: Arc<dyn LocalExtensionRepository>,
        installed: Arc<dyn InstalledExtensionRepository>,
        remote: Arc<dyn ExtensionRepositoryManager>,
    ) -> Self {
        Self {
            status: JobStatus::new(job_types::REPAIR_XAR, request),
            local,
            installed,
            remote,
            installable_type: extension_types::XAR.to_string(),
        }
    }

    /// Override the package type this job repairs (`xar` by default).
    pub fn with_installable_type(mut self, extension_type: impl Into<String>) -> Self {
        self.installable_type = extension_type.into();
        self
    }

    fn verbose(&self) -> bool {
        self.status.request.verbose
    }

    /// Repair one extension on one namespace.
    ///
    /// `path` holds the features on the way down from the requested
    /// extension. Each dependency receives its own copy, so sibling branches
    /// never see each other's traversal state.
    fn repair_extension(
        &mut self,
        id: &ExtensionId,
        namespace: Option<&str>,
        dependency: bool,
        mut path: Vec<String>,
    ) -> Result<()> {
        let progress = self.status.progress.clone();
        let _level = progress.push_level(2);

        if self
            .installed
            .get_installed_extension(&id.id, namespace)
            .is_some()
        {
            if self.verbose() {
                info!(extension_id = %id, namespace = ?namespace, "Extension already installed");
            } else {
                debug!(extension_id = %id, namespace = ?namespace, "Extension already installed");
            }
            return Ok(());
        }

        let local = local_or_resolve(self.local.as_ref(), self.remote.as_ref(), id)?;
        progress.step();

        if local.extension_type != self.installable_type {
            debug!(
                extension_id = %id,
                extension_type = %local.extension_type,
                "Extension is not of an installable type, nothing to repair"
            );
            return Ok(());
        }

        path.push(id.id.clone());

        if !local.dependencies.is_empty() {
            let _dependencies = progress.push_level(local.dependencies.len());

            for dependency in &local.dependencies {
                let Some(dependency_id) = dependency.pinned_id() else {
                    warn!(
                        extension_id = %id,
                        dependency = %dependency,
                        "Cannot repair a dependency declared with a version range, skipping"
                    );
                    progress.step();
                    continue;
                };

                if path.contains(&dependency.id) {
                    warn!(extension_id = %id, dependency = %dependency, "Dependency cycle, skipping");
                    progress.step();
                    continue;
                }

                if let Err(e) = self.repair_extension(&dependency_id, namespace, true, path.clone()) {
                    error!(
                        extension_id = %id,
                        dependency = %dependency_id,
                        namespace = ?namespace,
                        error = %e,
                        "Failed to repair dependency"
                    );
                    self.status
                        .record_error(format!("dependency {} of {}: {}", dependency_id, id, e));
                }
            }
        }

        self.installed
            .install_extension(&local, namespace, dependency)?;

        if self.verbose() {
            info!(extension_id = %id, namespace = ?namespace, dependency, "Repaired extension");
        } else {
            debug!(extension_id = %id, namespace = ?namespace, dependency, "Repaired extension");
        }
        Ok(())
    }
}

impl Job for RepairJob {
    type Output = JobStatus;

    fn job_type(&self) -> &'static str {
        job_types::REPAIR_XAR
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
            let _extensions = progress.push_level(request.extensions.len());

            for id in &request.extensions {
                let _namespaces = progress.push_level(namespaces.len());

                for namespace in &namespaces {
                    if let Err(e) = self.repair_extension(id, namespace.as_deref(), false, Vec::new()) {
                        error!(
                            extension_id = %id,
                            namespace = ?namespace,
                            error = %e,
                            "Failed to repair extension"
                        );
                        self.status.record_error(format!("{}: {}", id, e));
                    }
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

        fn job(&self, request: ExtensionRequest) -> RepairJob {
            RepairJob::new(
                request,
                self.local.clone(),
                self.installed.clone(),
                self.remote.clone(),
            )
        }
    }

    #[test]
    fn test_missing_extension_is_logged_not_fatal() {
        let fixture = Fixture::new();
        let request = ExtensionRequest::new(vec![ExtensionId::new("missing", "1.0")]);

        let status = fixture.job(request).run();
        assert_eq!(status.errors.len(), 1);
        assert!(status.progress.is_finished());
        assert!(fixture.installed.installed_extensions().is_empty());
    }

    #[test]
    fn test_non_installable_type_is_skipped() {
        let fixture = Fixture::new();
        fixture
            .remote
            .add_extension(RemoteExtension::new(ExtensionId::new("lib", "1.0"), "jar", vec![]));

        let status = fixture
            .job(ExtensionRequest::new(vec![ExtensionId::new("lib", "1.0")]))
            .run();
        assert!(!status.has_errors());
        assert!(fixture.installed.get_installed_extension("lib", None).is_none());
    }

    #[test]
    fn test_dependency_cycle_terminates() {
        let fixture = Fixture::new();
        fixture.remote.add_extension(
            RemoteExtension::new(ExtensionId::new("a", "1.0"), "xar", vec![])
                .with_dependency(ExtensionDependency::new("b", "1.0")),
        );
        fixture.remote.add_extension(
            RemoteExtension::new(ExtensionId::new("b", "1.0"), "xar", vec![])
                .with_dependency(ExtensionDependency::new("a", "1.0")),
        );

        let status = fixture
            .job(ExtensionRequest::new(vec![ExtensionId::new("a", "1.0")]))
            .run();
        assert!(!status.has_errors());
        assert!(fixture.installed.get_installed_extension("a", None).is_some());
        assert!(fixture.installed.get_installed_extension("b", None).is_some());
    }
}
