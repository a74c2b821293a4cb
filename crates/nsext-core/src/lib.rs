//! Namespace-scoped extension lifecycle management.
//!
//! Extensions are installed either globally or into namespaces. Jar extensions
//! get their code loaded into a per-namespace context and their declared
//! components registered in that namespace; package extensions are tracked in
//! the installed repository and can be repaired or diffed against the live
//! documents.

pub mod bridge;
pub mod component;
pub mod config;
pub mod context;
pub mod document;
pub mod error;
pub mod event;
pub mod eventbus;
pub mod handler;
pub mod job;
pub mod logging;
pub mod manager;
pub mod repository;
pub mod types;

pub use error::{ExtensionError, Result};
pub use event::{EventMetadata, LifecycleEvent};
pub use eventbus::{EventBus, EventBusReceiver, FilteredReceiver, SharedEventBus};
pub use manager::{ExtensionManager, JobOutput};

/// Re-exports commonly used types.
pub mod prelude {
    // Configuration
    pub use crate::config::{env_vars, extension_types, job_types, ManagerConfig};

    // Error handling
    pub use crate::error::{ExtensionError, Result};

    // Data model
    pub use crate::types::{
        ExtensionDependency, ExtensionId, ExtensionRequest, InstalledExtension, LocalExtension,
        Namespace, VersionConstraint,
    };

    // Contexts and components
    pub use crate::component::{ComponentDescriptor, ComponentRegistry, NamespacedComponentRegistry};
    pub use crate::context::{ContextId, NamespaceContextRegistry};
    pub use crate::handler::{ExtensionHandler, HandlerRegistry, JarExtensionHandler};

    // Repositories
    pub use crate::repository::{
        ExtensionRepositoryManager, InstalledExtensionRepository, LocalExtensionRepository,
        RemoteExtension,
    };

    // Documents
    pub use crate::document::{Document, DocumentDiff, DocumentReference, DocumentStore};

    // Jobs
    pub use crate::job::{
        DiffJob, DiffJobStatus, HasJobStatus, InstallJob, Job, JobExecutor, JobHandle, JobStatus,
        RepairJob, UninstallJob,
    };

    // Events
    pub use crate::bridge::LifecycleEventBridge;
    pub use crate::event::LifecycleEvent;
    pub use crate::eventbus::EventBus;

    pub use crate::manager::{ExtensionManager, JobOutput};
}
