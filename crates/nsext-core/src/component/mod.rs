//! Component declarations and the namespace-scoped component registry.

pub mod registry;
pub mod scanner;

pub use registry::{ComponentRegistry, NamespacedComponentRegistry};
pub use scanner::{scan_component_declarations, scan_component_file};

use serde::{Deserialize, Serialize};

use crate::config::components;
use crate::context::ContextId;

/// A component implementation declared by a packaged extension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentDeclaration {
    pub implementation_class_name: String,
    /// Higher wins; `0` marks a legacy override entry
    pub priority: i32,
}

impl ComponentDeclaration {
    pub fn new(implementation_class_name: impl Into<String>, priority: i32) -> Self {
        Self {
            implementation_class_name: implementation_class_name.into(),
            priority,
        }
    }

    pub fn is_override(&self) -> bool {
        self.priority == components::OVERRIDE_PRIORITY
    }
}

/// Role implemented by a class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleDescriptor {
    pub role: String,
    #[serde(default = "default_hint")]
    pub hint: String,
}

fn default_hint() -> String {
    components::DEFAULT_HINT.to_string()
}

/// Descriptor stored in a class entry of a jar extension.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassDescriptor {
    #[serde(default)]
    pub roles: Vec<RoleDescriptor>,
}

/// A component as registered in a component registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentDescriptor {
    pub role: String,
    pub hint: String,
    pub implementation: String,
    pub priority: i32,
    /// Context the implementation was loaded through
    pub context: ContextId,
}
