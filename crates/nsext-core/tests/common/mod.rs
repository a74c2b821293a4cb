//! Common test utilities: package archive builders and a wired fixture.

#![allow(dead_code)]

use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::json;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use nsext_core::component::NamespacedComponentRegistry;
use nsext_core::config::paths;
use nsext_core::context::{class_entry_name, NamespaceContextRegistry};
use nsext_core::document::{Document, MemoryDocumentStore};
use nsext_core::handler::JarExtensionHandler;
use nsext_core::repository::{
    FileLocalExtensionRepository, MemoryInstalledExtensionRepository, MemoryRepositoryManager,
};

/// Build an in-memory zip archive.
pub fn zip_bytes(entries: &[(String, Vec<u8>)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in entries {
        writer
            .start_file(name.as_str(), SimpleFileOptions::default())
            .unwrap();
        writer.write_all(content).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Builder of jar extension archives.
#[derive(Default)]
pub struct JarBuilder {
    components: Vec<String>,
    overrides: Vec<String>,
    classes: Vec<(String, Vec<(String, String)>)>,
}

impl JarBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a component class at the default priority.
    pub fn component(mut self, class_name: &str) -> Self {
        self.components.push(class_name.to_string());
        self
    }

    pub fn component_with_priority(mut self, priority: i32, class_name: &str) -> Self {
        self.components.push(format!("{}:{}", priority, class_name));
        self
    }

    pub fn override_component(mut self, class_name: &str) -> Self {
        self.overrides.push(class_name.to_string());
        self
    }

    /// Add a class implementing `(role, hint)` pairs.
    pub fn class(mut self, class_name: &str, roles: &[(&str, &str)]) -> Self {
        self.classes.push((
            class_name.to_string(),
            roles
                .iter()
                .map(|(role, hint)| (role.to_string(), hint.to_string()))
                .collect(),
        ));
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut entries = Vec::new();
        if !self.components.is_empty() {
            entries.push((
                paths::COMPONENT_LIST.to_string(),
                self.components.join("\n").into_bytes(),
            ));
        }
        if !self.overrides.is_empty() {
            entries.push((
                paths::COMPONENT_OVERRIDE_LIST.to_string(),
                self.overrides.join("\n").into_bytes(),
            ));
        }
        for (class_name, roles) in &self.classes {
            let roles: Vec<_> = roles
                .iter()
                .map(|(role, hint)| json!({ "role": role, "hint": hint }))
                .collect();
            entries.push((
                class_entry_name(class_name),
                json!({ "roles": roles }).to_string().into_bytes(),
            ));
        }
        zip_bytes(&entries)
    }

    pub fn write(&self, path: &Path) -> PathBuf {
        std::fs::write(path, self.build()).unwrap();
        path.to_path_buf()
    }
}

/// Build a package extension archive holding `documents`.
pub fn xar_bytes(documents: &[Document]) -> Vec<u8> {
    let mut entries = vec![(
        paths::XAR_PACKAGE_DESCRIPTOR.to_string(),
        json!({ "name": "test package" }).to_string().into_bytes(),
    )];
    for (index, document) in documents.iter().enumerate() {
        entries.push((
            format!("{}-{}.json", document.reference, index),
            serde_json::to_vec(document).unwrap(),
        ));
    }
    zip_bytes(&entries)
}

/// Repositories, contexts and components wired together over a temp dir.
pub struct Fixture {
    pub dir: tempfile::TempDir,
    pub local: Arc<FileLocalExtensionRepository>,
    pub installed: Arc<MemoryInstalledExtensionRepository>,
    pub remote: Arc<MemoryRepositoryManager>,
    pub documents: Arc<MemoryDocumentStore>,
    pub contexts: Arc<NamespaceContextRegistry>,
    pub components: Arc<NamespacedComponentRegistry>,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        Self {
            local: Arc::new(FileLocalExtensionRepository::new(dir.path().join("repository"))),
            installed: Arc::new(MemoryInstalledExtensionRepository::new()),
            remote: Arc::new(MemoryRepositoryManager::new()),
            documents: Arc::new(MemoryDocumentStore::new()),
            contexts: Arc::new(NamespaceContextRegistry::new()),
            components: Arc::new(NamespacedComponentRegistry::new()),
            dir,
        }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn jar_handler(&self) -> JarExtensionHandler {
        JarExtensionHandler::new(self.contexts.clone(), self.components.clone())
    }
}
