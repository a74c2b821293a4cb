//! Per-type extension handlers.
//!
//! A handler knows how to make one package type live in a namespace. Jobs look
//! the handler up by the extension's type; types without a handler only have
//! their installed state tracked.

pub mod jar;

pub use jar::JarExtensionHandler;

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::Result;
use crate::types::LocalExtension;

/// Installs and uninstalls one type of extension package.
pub trait ExtensionHandler: Send + Sync {
    /// Package type handled (`jar`, ...).
    fn handler_type(&self) -> &str;

    fn install(&self, extension: &LocalExtension, namespace: Option<&str>) -> Result<()>;

    fn uninstall(&self, extension: &LocalExtension, namespace: Option<&str>) -> Result<()>;
}

/// Handlers keyed by package type.
#[derive(Default, Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn ExtensionHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, handler: Arc<dyn ExtensionHandler>) {
        self.handlers
            .insert(handler.handler_type().to_string(), handler);
    }

    pub fn with_handler(mut self, handler: Arc<dyn ExtensionHandler>) -> Self {
        self.register(handler);
        self
    }

    pub fn get(&self, extension_type: &str) -> Option<Arc<dyn ExtensionHandler>> {
        self.handlers.get(extension_type).cloned()
    }
}
