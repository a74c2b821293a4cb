//! Extension manager: wires repositories, contexts, handlers and jobs.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::bridge::LifecycleEventBridge;
use crate::component::NamespacedComponentRegistry;
use crate::config::{job_types, ManagerConfig};
use crate::context::NamespaceContextRegistry;
use crate::document::DocumentStore;
use crate::error::{ExtensionError, Result};
use crate::event::LifecycleEvent;
use crate::eventbus::EventBus;
use crate::handler::{ExtensionHandler, HandlerRegistry, JarExtensionHandler};
use crate::job::{
    DiffJob, DiffJobStatus, HasJobStatus, InstallJob, JobExecutor, JobHandle, JobStatus,
    RepairJob, UninstallJob,
};
use crate::repository::{
    ExtensionRepositoryManager, FileLocalExtensionRepository, InstalledExtensionRepository,
    LocalExtensionRepository, MemoryInstalledExtensionRepository,
};
use crate::types::ExtensionRequest;

/// Output of a job submitted by type name.
#[derive(Debug, Clone)]
pub enum JobOutput {
    Status(JobStatus),
    Diff(DiffJobStatus),
}

impl HasJobStatus for JobOutput {
    fn job_status(&self) -> &JobStatus {
        match self {
            Self::Status(status) => status,
            Self::Diff(diff) => &diff.status,
        }
    }
}

/// Entry point of the extension lifecycle.
pub struct ExtensionManager {
    config: ManagerConfig,
    local: Arc<dyn LocalExtensionRepository>,
    installed: Arc<dyn InstalledExtensionRepository>,
    remote: Arc<dyn ExtensionRepositoryManager>,
    documents: Arc<dyn DocumentStore>,
    contexts: Arc<NamespaceContextRegistry>,
    components: Arc<NamespacedComponentRegistry>,
    handlers: Arc<HandlerRegistry>,
    executor: JobExecutor,
    bridge: Arc<LifecycleEventBridge>,
    bridge_task: Mutex<Option<JoinHandle<()>>>,
}

impl ExtensionManager {
    /// Build a manager storing packages under the configured local repository
    /// directory.
    pub fn new(
        config: ManagerConfig,
        remote: Arc<dyn ExtensionRepositoryManager>,
        documents: Arc<dyn DocumentStore>,
    ) -> Self {
        let local = Arc::new(FileLocalExtensionRepository::new(
            config.local_repository_dir.clone(),
        ));
        Self::with_repositories(
            config,
            local,
            Arc::new(MemoryInstalledExtensionRepository::new()),
            remote,
            documents,
        )
    }

    pub fn with_repositories(
        config: ManagerConfig,
        local: Arc<dyn LocalExtensionRepository>,
        installed: Arc<dyn InstalledExtensionRepository>,
        remote: Arc<dyn ExtensionRepositoryManager>,
        documents: Arc<dyn DocumentStore>,
    ) -> Self {
        let contexts = Arc::new(NamespaceContextRegistry::new());
        let components = Arc::new(NamespacedComponentRegistry::new());
        let jar_handler: Arc<dyn ExtensionHandler> =
            Arc::new(JarExtensionHandler::new(contexts.clone(), components.clone()));
        let handlers = Arc::new(HandlerRegistry::new().with_handler(jar_handler.clone()));
        let bus = EventBus::with_capacity(config.event_channel_capacity);
        let bridge = Arc::new(LifecycleEventBridge::new(
            contexts.clone(),
            installed.clone(),
            jar_handler,
        ));

        Self {
            config,
            local,
            installed,
            remote,
            documents,
            contexts,
            components,
            handlers,
            executor: JobExecutor::new(bus),
            bridge,
            bridge_task: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn contexts(&self) -> &Arc<NamespaceContextRegistry> {
        &self.contexts
    }

    pub fn components(&self) -> &Arc<NamespacedComponentRegistry> {
        &self.components
    }

    pub fn local_repository(&self) -> &Arc<dyn LocalExtensionRepository> {
        &self.local
    }

    pub fn installed_repository(&self) -> &Arc<dyn InstalledExtensionRepository> {
        &self.installed
    }

    pub fn bus(&self) -> &EventBus {
        self.executor.bus()
    }

    pub fn bridge(&self) -> &Arc<LifecycleEventBridge> {
        &self.bridge
    }

    /// Start the lifecycle bridge and announce application start, which loads
    /// every installed jar extension.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn start(&self) -> bool {
        {
            let mut task = self.bridge_task.lock();
            if task.is_none() {
                *task = Some(self.bridge.clone().spawn(self.bus()));
            }
        }
        info!(
            local_repository = %self.config.local_repository_dir.display(),
            "Extension manager started"
        );
        self.bus()
            .publish_with_source(LifecycleEvent::ApplicationStarted, "extension-manager")
            .await
    }

    /// Stop the lifecycle bridge task.
    pub fn shutdown(&self) {
        if let Some(task) = self.bridge_task.lock().take() {
            task.abort();
        }
    }

    fn prepare(&self, mut request: ExtensionRequest) -> ExtensionRequest {
        request.verbose |= self.config.verbose;
        request
    }

    pub fn repair(&self, request: ExtensionRequest) -> JobHandle<JobStatus> {
        self.executor.execute(RepairJob::new(
            self.prepare(request),
            self.local.clone(),
            self.installed.clone(),
            self.remote.clone(),
        ))
    }

    pub fn diff(&self, request: ExtensionRequest) -> JobHandle<DiffJobStatus> {
        self.executor.execute(DiffJob::new(
            self.prepare(request),
            self.installed.clone(),
            self.documents.clone(),
        ))
    }

    pub fn install(&self, request: ExtensionRequest) -> JobHandle<JobStatus> {
        self.executor.execute(InstallJob::new(
            self.prepare(request),
            self.handlers.clone(),
            self.local.clone(),
            self.installed.clone(),
            self.remote.clone(),
        ))
    }

    pub fn uninstall(&self, request: ExtensionRequest) -> JobHandle<JobStatus> {
        self.executor.execute(UninstallJob::new(
            self.prepare(request),
            self.handlers.clone(),
            self.installed.clone(),
        ))
    }

    /// Run the job registered under `job_type` and wait for it.
    pub async fn submit(&self, job_type: &str, request: ExtensionRequest) -> Result<JobOutput> {
        let output = match job_type {
            job_types::REPAIR_XAR => JobOutput::Status(self.repair(request).wait().await?),
            job_types::DIFF_XAR => JobOutput::Diff(self.diff(request).wait().await?),
            job_types::INSTALL => JobOutput::Status(self.install(request).wait().await?),
            job_types::UNINSTALL => JobOutput::Status(self.uninstall(request).wait().await?),
            other => {
                warn!(job_type = other, "Unknown job type");
                return Err(ExtensionError::UnknownJobType(other.to_string()));
            }
        };
        Ok(output)
    }
}

impl Drop for ExtensionManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::MemoryDocumentStore;
    use crate::repository::MemoryRepositoryManager;
    use crate::types::ExtensionId;

    fn manager(dir: &std::path::Path) -> ExtensionManager {
        ExtensionManager::new(
            ManagerConfig::default().with_local_repository_dir(dir),
            Arc::new(MemoryRepositoryManager::new()),
            Arc::new(MemoryDocumentStore::new()),
        )
    }

    #[tokio::test]
    async fn test_submit_unknown_job_type() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path());

        let result = manager.submit("reindex", ExtensionRequest::default()).await;
        assert!(matches!(result, Err(ExtensionError::UnknownJobType(t)) if t == "reindex"));
    }

    #[tokio::test]
    async fn test_submit_dispatches_by_type() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path());
        let request = ExtensionRequest::new(vec![ExtensionId::new("app", "1.0")]).with_namespace("wiki:a");

        let output = manager.submit(job_types::DIFF_XAR, request.clone()).await.unwrap();
        assert!(matches!(output, JobOutput::Diff(_)));

        let output = manager.submit(job_types::REPAIR_XAR, request).await.unwrap();
        assert_eq!(output.job_status().job_type, job_types::REPAIR_XAR);
        assert!(output.job_status().has_errors());
    }

    #[tokio::test]
    async fn test_config_verbose_applies_to_requests() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ManagerConfig::default().with_local_repository_dir(dir.path());
        config.verbose = true;
        let manager = ExtensionManager::new(
            config,
            Arc::new(MemoryRepositoryManager::new()),
            Arc::new(MemoryDocumentStore::new()),
        );

        let status = manager
            .repair(ExtensionRequest::default())
            .wait()
            .await
            .unwrap();
        assert!(status.request.verbose);
    }
}
