//! Class resolution inside packaged artifacts.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use zip::result::ZipError;
use zip::ZipArchive;

use super::ContextId;
use crate::component::ClassDescriptor;
use crate::config::paths;
use crate::error::Result;

/// A class resolved through a code loading context.
#[derive(Debug, Clone)]
pub struct LoadedClass {
    pub name: String,
    /// Context the class was requested through
    pub context: ContextId,
    /// Artifact that provided the class
    pub artifact: PathBuf,
    pub descriptor: ClassDescriptor,
}

/// Archive entry name of a class (`a.b.C` -> `a/b/C.class`).
pub fn class_entry_name(class_name: &str) -> String {
    format!("{}{}", class_name.replace('.', "/"), paths::CLASS_SUFFIX)
}

/// Read the descriptor of `class_name` from one artifact.
///
/// Returns `Ok(None)` when the artifact does not contain the class.
pub fn read_class_descriptor(artifact: &Path, class_name: &str) -> Result<Option<ClassDescriptor>> {
    let file = File::open(artifact)?;
    let mut archive = ZipArchive::new(BufReader::new(file))?;

    let mut entry = match archive.by_name(&class_entry_name(class_name)) {
        Ok(entry) => entry,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let mut content = String::new();
    entry.read_to_string(&mut content)?;
    Ok(Some(serde_json::from_str(&content)?))
}
