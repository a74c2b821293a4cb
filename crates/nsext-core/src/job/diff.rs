//! Diff job (`diffXar`).
//!
//! Compares every document shipped in the installed package extensions of a
//! single namespace with the live document, walking dependencies depth first.
//!
//! Two sets bound the walk:
//! - the compared features set lives for the whole run and is passed down by
//!   `&mut`, so each feature is diffed at most once per job;
//! - the processed documents set is per branch: every dependency receives its
//!   own copy, so a document seen on one branch is still compared on a sibling
//!   branch.

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::sync::Arc;

use tracing::{debug, error, info};
use zip::ZipArchive;

use super::{HasJobStatus, Job, JobProgress, JobStatus};
use crate::config::{extension_types, job_types, paths};
use crate::document::{Document, DocumentDiff, DocumentReference, DocumentStore};
use crate::error::{ExtensionError, Result};
use crate::repository::InstalledExtensionRepository;
use crate::types::{ExtensionId, ExtensionRequest, InstalledExtension};

/// Status of a diff job: the common status plus the collected diffs.
#[derive(Debug, Clone)]
pub struct DiffJobStatus {
    pub status: JobStatus,
    pub document_diffs: Vec<DocumentDiff>,
}

impl HasJobStatus for DiffJobStatus {
    fn job_status(&self) -> &JobStatus {
        &self.status
    }
}

/// Computes the differences between packaged and live documents.
pub struct DiffJob {
    status: DiffJobStatus,
    installed: Arc<dyn InstalledExtensionRepository>,
    documents: Arc<dyn DocumentStore>,
}

impl DiffJob {
    pub fn new(
        request: ExtensionRequest,
        installed: Arc<dyn InstalledExtensionRepository>,
        documents: Arc<dyn DocumentStore>,
    ) -> Self {
        Self {
            status: DiffJobStatus {
                status: JobStatus::new(job_types::DIFF_XAR, request),
                document_diffs: Vec::new(),
            },
            installed,
            documents,
        }
    }

    fn verbose(&self) -> bool {
        self.status.status.request.verbose
    }

    fn record_error(&mut self, message: String) {
        self.status.status.record_error(message);
    }

    /// Diff `feature` and then its dependencies.
    fn diff_feature(
        &mut self,
        feature: &str,
        namespace: &str,
        compared_features: &mut HashSet<String>,
        mut processed_documents: HashSet<DocumentReference>,
    ) {
        let progress = self.status.status.progress.clone();
        let _level = progress.push_level(2);

        let Some(installed) = self
            .installed
            .get_installed_extension(feature, Some(namespace))
        else {
            debug!(feature, namespace, "Extension not installed on namespace, nothing to diff");
            return;
        };

        if !compared_features.insert(feature.to_string()) {
            debug!(feature, namespace, "Extension already compared");
            return;
        }

        self.diff_extension(&installed, namespace, &mut processed_documents);
        progress.step();

        let dependencies = installed.dependencies().to_vec();
        if dependencies.is_empty() {
            return;
        }

        let _dependencies = progress.push_level(dependencies.len());
        for dependency in &dependencies {
            // Shared across the run, copied per branch.
            self.diff_feature(
                &dependency.id,
                namespace,
                compared_features,
                processed_documents.clone(),
            );
        }
    }

    fn diff_extension(
        &mut self,
        installed: &InstalledExtension,
        namespace: &str,
        processed_documents: &mut HashSet<DocumentReference>,
    ) {
        let id = installed.id().clone();

        if installed.extension_type() != extension_types::XAR {
            debug!(extension_id = %id, "Not a package extension, skipping documents");
            return;
        }
        if self.status.status.request.is_excluded(&id) {
            debug!(extension_id = %id, "Extension excluded from diff");
            return;
        }

        if let Err(e) = self.diff_package(installed, namespace, processed_documents) {
            error!(extension_id = %id, namespace, error = %e, "Failed to read extension package");
            self.record_error(format!("{}: {}", id, e));
        }
    }

    fn diff_package(
        &mut self,
        installed: &InstalledExtension,
        namespace: &str,
        processed_documents: &mut HashSet<DocumentReference>,
    ) -> Result<()> {
        let file = File::open(&installed.extension.file)?;
        let mut archive = ZipArchive::new(BufReader::new(file))?;

        let progress = self.status.status.progress.clone();
        let _documents = progress.push_level(archive.len());

        for index in 0..archive.len() {
            let document = match read_document(&mut archive, index) {
                Ok(Some(document)) => document,
                Ok(None) => {
                    progress.step();
                    continue;
                }
                Err(e) => {
                    error!(
                        extension_id = %installed.id(),
                        entry = index,
                        error = %e,
                        "Failed to read packaged document"
                    );
                    self.record_error(format!("{} entry {}: {}", installed.id(), index, e));
                    progress.step();
                    continue;
                }
            };

            let reference = document.document_reference();
            if processed_documents.insert(reference.clone()) {
                if let Err(e) = self.diff_document(document, installed.id(), namespace) {
                    error!(
                        extension_id = %installed.id(),
                        document = %reference,
                        error = %e,
                        "Failed to diff document"
                    );
                    self.record_error(format!("{}: {}", reference, e));
                }
            }
            progress.step();
        }
        Ok(())
    }

    fn diff_document(
        &mut self,
        document: Document,
        extension_id: &ExtensionId,
        namespace: &str,
    ) -> Result<()> {
        let reference = document.document_reference();
        let live = self.documents.get_document(Some(namespace), &reference)?;

        let diff = DocumentDiff::compute(
            Some(&document),
            Some(extension_id.to_string()),
            live.as_ref(),
        );
        let changed = diff.next.is_none() || diff.previous.is_none() || !diff.is_empty();

        if self.verbose() {
            if diff.next.is_none() {
                info!(document = %reference, namespace, "Document was deleted");
            } else if changed {
                info!(document = %reference, namespace, changes = diff.change_count(), "Document was modified");
            } else {
                info!(document = %reference, namespace, "Document unchanged");
            }
        }

        if changed {
            self.status.document_diffs.push(diff);
        }
        Ok(())
    }
}

/// Parse the document stored at `index`, `None` for entries that are not
/// documents.
fn read_document<R: Read + Seek>(archive: &mut ZipArchive<R>, index: usize) -> Result<Option<Document>> {
    let mut entry = archive.by_index(index)?;
    if entry.is_dir() || entry.name() == paths::XAR_PACKAGE_DESCRIPTOR {
        return Ok(None);
    }

    let name = entry.name().to_string();
    let mut content = String::new();
    entry.read_to_string(&mut content)?;
    let document = serde_json::from_str(&content)
        .map_err(|e| ExtensionError::InvalidFormat(format!("{}: {}", name, e)))?;
    Ok(Some(document))
}

impl Job for DiffJob {
    type Output = DiffJobStatus;

    fn job_type(&self) -> &'static str {
        job_types::DIFF_XAR
    }

    fn request(&self) -> &ExtensionRequest {
        &self.status.status.request
    }

    fn progress(&self) -> JobProgress {
        self.status.status.progress.clone()
    }

    fn run(mut self) -> DiffJobStatus {
        self.status.status.start();

        let request = self.status.status.request.clone();
        let namespaces = request.namespaces.clone().unwrap_or_default();

        if namespaces.len() != 1 {
            let e = ExtensionError::InvalidRequest(format!(
                "diff needs exactly one namespace, got {}",
                namespaces.len()
            ));
            error!(error = %e, "Rejecting diff request");
            self.record_error(e.to_string());
            self.status.status.finish();
            return self.status;
        }

        let namespace = &namespaces[0];
        let progress = self.status.status.progress.clone();
        let mut compared_features = HashSet::new();

        {
            let _extensions = progress.push_level(request.extensions.len());
            for id in &request.extensions {
                self.diff_feature(&id.id, namespace, &mut compared_features, HashSet::new());
            }
        }

        debug!(
            namespace = %namespace,
            diffs = self.status.document_diffs.len(),
            features = compared_features.len(),
            "Diff finished"
        );
        self.status.status.finish();
        self.status
    }
}
