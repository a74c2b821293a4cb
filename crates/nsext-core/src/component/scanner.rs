//! Component declaration scanning.
//!
//! A jar extension lists its components in `META-INF/components.txt`, one
//! `[priority:]class.Name` per line. The deprecated
//! `META-INF/component-overrides.txt` lists bare class names which are merged
//! at the lowest priority.

use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use tracing::warn;
use zip::ZipArchive;

use super::ComponentDeclaration;
use crate::config::{components, paths};
use crate::error::Result;

/// Scan a packaged artifact for declared components.
///
/// Returns `None` when the artifact has neither a component list nor an
/// override list. The archive is released on every exit path.
pub fn scan_component_declarations<R: Read + Seek>(
    reader: R,
) -> Result<Option<Vec<ComponentDeclaration>>> {
    let mut archive = ZipArchive::new(reader)?;

    let mut declared: Option<Vec<ComponentDeclaration>> = None;
    let mut overrides: Option<Vec<ComponentDeclaration>> = None;

    for index in 0..archive.len() {
        if declared.is_some() && overrides.is_some() {
            break;
        }

        let mut entry = archive.by_index(index)?;
        let name = entry.name().to_string();

        if declared.is_none() && name == paths::COMPONENT_LIST {
            let mut content = String::new();
            entry.read_to_string(&mut content)?;
            declared = Some(parse_component_list(&content));
        } else if overrides.is_none() && name == paths::COMPONENT_OVERRIDE_LIST {
            let mut content = String::new();
            entry.read_to_string(&mut content)?;
            overrides = Some(parse_override_list(&content));
        }
    }

    if declared.is_none() && overrides.is_none() {
        return Ok(None);
    }

    let mut all = declared.unwrap_or_default();
    all.extend(overrides.unwrap_or_default());
    Ok(Some(all))
}

/// Scan a packaged artifact on disk.
pub fn scan_component_file(path: &Path) -> Result<Option<Vec<ComponentDeclaration>>> {
    let file = File::open(path)?;
    scan_component_declarations(BufReader::new(file))
}

fn parse_component_list(content: &str) -> Vec<ComponentDeclaration> {
    let mut declarations = Vec::new();

    for line in significant_lines(content) {
        match line.split_once(':') {
            Some((priority, class_name)) => match priority.trim().parse::<i32>() {
                Ok(priority) => {
                    declarations.push(ComponentDeclaration::new(class_name.trim(), priority))
                }
                Err(_) => warn!(line, "Ignoring component declaration with invalid priority"),
            },
            None => declarations.push(ComponentDeclaration::new(line, components::DEFAULT_PRIORITY)),
        }
    }

    declarations
}

fn parse_override_list(content: &str) -> Vec<ComponentDeclaration> {
    significant_lines(content)
        .map(|line| ComponentDeclaration::new(line, components::OVERRIDE_PRIORITY))
        .collect()
}

fn significant_lines(content: &str) -> impl Iterator<Item = &str> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn archive(entries: &[(&str, &str)]) -> Cursor<Vec<u8>> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, content) in entries {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        let mut cursor = writer.finish().unwrap();
        cursor.set_position(0);
        cursor
    }

    #[test]
    fn test_no_component_files() {
        let reader = archive(&[("org/example/Foo.class", "{}")]);
        assert_eq!(scan_component_declarations(reader).unwrap(), None);
    }

    #[test]
    fn test_component_list_with_priorities() {
        let reader = archive(&[(
            paths::COMPONENT_LIST,
            "# comment\norg.example.Default\n\n500:org.example.Preferred\n",
        )]);

        let declarations = scan_component_declarations(reader).unwrap().unwrap();
        assert_eq!(
            declarations,
            vec![
                ComponentDeclaration::new("org.example.Default", components::DEFAULT_PRIORITY),
                ComponentDeclaration::new("org.example.Preferred", 500),
            ]
        );
    }

    #[test]
    fn test_overrides_merged_at_lowest_priority() {
        let reader = archive(&[
            (paths::COMPONENT_OVERRIDE_LIST, "org.example.Legacy\n"),
            (paths::COMPONENT_LIST, "org.example.Default\n"),
        ]);

        let declarations = scan_component_declarations(reader).unwrap().unwrap();
        assert_eq!(declarations.len(), 2);
        assert_eq!(declarations[0].implementation_class_name, "org.example.Default");
        assert!(declarations[1].is_override());
        assert_eq!(declarations[1].priority, 0);
    }

    #[test]
    fn test_only_overrides() {
        let reader = archive(&[(paths::COMPONENT_OVERRIDE_LIST, "org.example.Legacy")]);
        let declarations = scan_component_declarations(reader).unwrap().unwrap();
        assert_eq!(declarations.len(), 1);
        assert!(declarations[0].is_override());
    }

    #[test]
    fn test_invalid_priority_is_skipped() {
        let reader = archive(&[(paths::COMPONENT_LIST, "high:org.example.Bad\norg.example.Good")]);
        let declarations = scan_component_declarations(reader).unwrap().unwrap();
        assert_eq!(declarations.len(), 1);
        assert_eq!(declarations[0].implementation_class_name, "org.example.Good");
    }

    #[test]
    fn test_not_an_archive() {
        let result = scan_component_declarations(Cursor::new(b"not a zip".to_vec()));
        assert!(result.is_err());
    }
}
