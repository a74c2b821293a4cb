//! Extension identity, dependency and request types.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Namespace identifier. `None` denotes the global/root namespace.
pub type Namespace = Option<String>;

/// Extension identifier.
///
/// The `id` alone identifies a feature; the version pins a specific package.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExtensionId {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl ExtensionId {
    pub fn new(id: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: Some(version.into()),
        }
    }

    /// Identifier without a pinned version.
    pub fn feature(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: None,
        }
    }

    /// Whether both ids name the same feature, ignoring versions.
    pub fn same_feature(&self, other: &ExtensionId) -> bool {
        self.id == other.id
    }
}

/// Compare two version strings segment by segment.
///
/// Segments are split on `.` and `-`; numeric segments compare as numbers,
/// anything else as text. `"10.0"` is newer than `"9.0"`.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let split = |v: &str| -> Vec<String> { v.split(['.', '-']).map(str::to_string).collect() };
    let (left, right) = (split(a), split(b));

    for (l, r) in left.iter().zip(right.iter()) {
        let ordering = match (l.parse::<u64>(), r.parse::<u64>()) {
            (Ok(l), Ok(r)) => l.cmp(&r),
            _ => l.cmp(r),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    left.len().cmp(&right.len())
}

impl fmt::Display for ExtensionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(version) => write!(f, "{}/{}", self.id, version),
            None => write!(f, "{}", self.id),
        }
    }
}

/// Version constraint of a dependency.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionConstraint {
    /// A single pinned version
    Pinned(String),
    /// A version range, kept as written
    Range(String),
}

impl VersionConstraint {
    /// Parse a constraint string.
    ///
    /// Interval syntax (`[1.0,2.0)`), commas and comparison or wildcard
    /// operators make a range; anything else is a pinned version.
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        let is_range = value.starts_with('[')
            || value.starts_with('(')
            || value.contains(|c: char| matches!(c, ',' | '>' | '<' | '^' | '~' | '*'));

        if is_range {
            Self::Range(value.to_string())
        } else {
            Self::Pinned(value.to_string())
        }
    }

    /// The pinned version, if any.
    pub fn version(&self) -> Option<&str> {
        match self {
            Self::Pinned(version) => Some(version),
            Self::Range(_) => None,
        }
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pinned(v) | Self::Range(v) => write!(f, "{}", v),
        }
    }
}

/// Dependency declared by an extension.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExtensionDependency {
    pub id: String,
    pub constraint: VersionConstraint,
}

impl ExtensionDependency {
    pub fn new(id: impl Into<String>, constraint: &str) -> Self {
        Self {
            id: id.into(),
            constraint: VersionConstraint::parse(constraint),
        }
    }

    /// Extension id pinned by this dependency, `None` for ranges.
    pub fn pinned_id(&self) -> Option<ExtensionId> {
        self.constraint
            .version()
            .map(|version| ExtensionId::new(self.id.clone(), version))
    }
}

impl fmt::Display for ExtensionDependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.id, self.constraint)
    }
}

/// A package stored in the local extension repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalExtension {
    pub id: ExtensionId,
    /// Package type (`jar`, `xar`, ...)
    #[serde(rename = "type")]
    pub extension_type: String,
    /// Location of the stored package file
    pub file: PathBuf,
    #[serde(default)]
    pub dependencies: Vec<ExtensionDependency>,
}

impl LocalExtension {
    pub fn new(id: ExtensionId, extension_type: impl Into<String>, file: impl Into<PathBuf>) -> Self {
        Self {
            id,
            extension_type: extension_type.into(),
            file: file.into(),
            dependencies: Vec::new(),
        }
    }

    pub fn with_dependency(mut self, dependency: ExtensionDependency) -> Self {
        self.dependencies.push(dependency);
        self
    }

    pub fn with_dependencies(mut self, dependencies: Vec<ExtensionDependency>) -> Self {
        self.dependencies = dependencies;
        self
    }
}

/// Install state of an extension in one namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallState {
    /// Installed only because another extension depends on it
    pub dependency: bool,
}

/// A local extension together with where it is installed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledExtension {
    pub extension: LocalExtension,
    /// Namespaces the extension is installed on. The `None` key means
    /// installed globally, which covers every namespace.
    pub namespaces: BTreeMap<Namespace, InstallState>,
}

impl InstalledExtension {
    pub fn new(extension: LocalExtension) -> Self {
        Self {
            extension,
            namespaces: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> &ExtensionId {
        &self.extension.id
    }

    pub fn extension_type(&self) -> &str {
        &self.extension.extension_type
    }

    pub fn dependencies(&self) -> &[ExtensionDependency] {
        &self.extension.dependencies
    }

    pub fn is_installed_globally(&self) -> bool {
        self.namespaces.contains_key(&None)
    }

    /// Installed on `namespace`, either directly or globally.
    pub fn is_installed(&self, namespace: Option<&str>) -> bool {
        self.is_installed_globally()
            || self
                .namespaces
                .contains_key(&namespace.map(|ns| ns.to_string()))
    }

    /// Whether the install on `namespace` was pulled in as a dependency.
    pub fn is_dependency(&self, namespace: Option<&str>) -> bool {
        self.namespaces
            .get(&namespace.map(|ns| ns.to_string()))
            .or_else(|| self.namespaces.get(&None))
            .map(|state| state.dependency)
            .unwrap_or(false)
    }
}

/// Request shared by all extension jobs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionRequest {
    pub extensions: Vec<ExtensionId>,
    /// Target namespaces; `None` or empty means the global namespace
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespaces: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excluded_extensions: Option<Vec<ExtensionId>>,
    #[serde(default)]
    pub verbose: bool,
}

impl ExtensionRequest {
    pub fn new(extensions: Vec<ExtensionId>) -> Self {
        Self {
            extensions,
            ..Default::default()
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespaces
            .get_or_insert_with(Vec::new)
            .push(namespace.into());
        self
    }

    pub fn with_excluded(mut self, extension: ExtensionId) -> Self {
        self.excluded_extensions
            .get_or_insert_with(Vec::new)
            .push(extension);
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn has_namespaces(&self) -> bool {
        self.namespaces
            .as_ref()
            .map(|ns| !ns.is_empty())
            .unwrap_or(false)
    }

    /// Target namespaces, with the global namespace when none were given.
    pub fn target_namespaces(&self) -> Vec<Namespace> {
        match &self.namespaces {
            Some(namespaces) if !namespaces.is_empty() => {
                namespaces.iter().cloned().map(Some).collect()
            }
            _ => vec![None],
        }
    }

    /// Whether `id` is excluded. An excluded id without version excludes
    /// every version of the feature.
    pub fn is_excluded(&self, id: &ExtensionId) -> bool {
        self.excluded_extensions
            .as_ref()
            .map(|excluded| {
                excluded.iter().any(|ex| {
                    ex.same_feature(id) && (ex.version.is_none() || ex.version == id.version)
                })
            })
            .unwrap_or(false)
    }
}
