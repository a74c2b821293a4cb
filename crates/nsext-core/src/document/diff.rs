//! Difference between a packaged document and its live counterpart.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use super::{Document, DocumentObject, DocumentReference};

/// A document at a given version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentVersionRef {
    pub reference: DocumentReference,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Deleted,
    Modified,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttachmentDiff {
    pub name: String,
    pub kind: ChangeKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectDiff {
    pub class_name: String,
    pub number: u32,
    pub kind: ChangeKind,
    /// Properties whose value differs, empty unless `kind` is `Modified`
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub changed_properties: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassPropertyDiff {
    pub name: String,
    pub kind: ChangeKind,
}

/// Changes going from `previous` (the packaged document) to `next` (the live
/// document). Either side is `None` when the document does not exist there.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentDiff {
    pub previous: Option<DocumentVersionRef>,
    pub next: Option<DocumentVersionRef>,
    /// Inserted plus deleted content lines
    pub content_diff_size: usize,
    pub attachment_diffs: Vec<AttachmentDiff>,
    pub object_diffs: Vec<ObjectDiff>,
    pub class_property_diffs: Vec<ClassPropertyDiff>,
}

impl DocumentDiff {
    /// Compare `previous`, taken at `previous_version`, with `next`.
    pub fn compute(
        previous: Option<&Document>,
        previous_version: Option<String>,
        next: Option<&Document>,
    ) -> Self {
        let empty = Document::default();
        let before = previous.unwrap_or(&empty);
        let after = next.unwrap_or(&empty);

        Self {
            previous: previous.map(|document| DocumentVersionRef {
                reference: document.document_reference(),
                version: previous_version,
            }),
            next: next.map(|document| DocumentVersionRef {
                reference: document.document_reference(),
                version: document.version.clone(),
            }),
            content_diff_size: content_diff_size(&before.content, &after.content),
            attachment_diffs: keyed_diff(&before.attachments, &after.attachments)
                .into_iter()
                .map(|(name, kind)| AttachmentDiff { name, kind })
                .collect(),
            object_diffs: object_diffs(&before.objects, &after.objects),
            class_property_diffs: keyed_diff(&before.class_properties, &after.class_properties)
                .into_iter()
                .map(|(name, kind)| ClassPropertyDiff { name, kind })
                .collect(),
        }
    }

    /// Total number of changes of any kind.
    pub fn change_count(&self) -> usize {
        self.content_diff_size
            + self.attachment_diffs.len()
            + self.object_diffs.len()
            + self.class_property_diffs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.change_count() == 0
    }
}

fn content_diff_size(before: &str, after: &str) -> usize {
    if before == after {
        return 0;
    }

    let patch = diffy::create_patch(before, after);
    patch
        .hunks()
        .iter()
        .flat_map(|hunk| hunk.lines())
        .filter(|line| matches!(line, diffy::Line::Insert(_) | diffy::Line::Delete(_)))
        .count()
}

fn keyed_diff<V: PartialEq>(
    before: &BTreeMap<String, V>,
    after: &BTreeMap<String, V>,
) -> Vec<(String, ChangeKind)> {
    let names: BTreeSet<&String> = before.keys().chain(after.keys()).collect();
    names
        .into_iter()
        .filter_map(|name| match (before.get(name), after.get(name)) {
            (Some(_), None) => Some((name.clone(), ChangeKind::Deleted)),
            (None, Some(_)) => Some((name.clone(), ChangeKind::Added)),
            (Some(a), Some(b)) if a != b => Some((name.clone(), ChangeKind::Modified)),
            _ => None,
        })
        .collect()
}

fn object_diffs(before: &[DocumentObject], after: &[DocumentObject]) -> Vec<ObjectDiff> {
    let index = |objects: &[DocumentObject]| -> BTreeMap<(String, u32), DocumentObject> {
        objects
            .iter()
            .map(|object| ((object.class_name.clone(), object.number), object.clone()))
            .collect()
    };
    let before = index(before);
    let after = index(after);
    let keys: BTreeSet<&(String, u32)> = before.keys().chain(after.keys()).collect();

    let mut diffs = Vec::new();
    for key in keys {
        let (class_name, number) = key.clone();
        match (before.get(key), after.get(key)) {
            (Some(_), None) => diffs.push(ObjectDiff {
                class_name,
                number,
                kind: ChangeKind::Deleted,
                changed_properties: Vec::new(),
            }),
            (None, Some(_)) => diffs.push(ObjectDiff {
                class_name,
                number,
                kind: ChangeKind::Added,
                changed_properties: Vec::new(),
            }),
            (Some(a), Some(b)) => {
                let changed: Vec<String> = keyed_diff(&a.properties, &b.properties)
                    .into_iter()
                    .map(|(name, _)| name)
                    .collect();
                if !changed.is_empty() {
                    diffs.push(ObjectDiff {
                        class_name,
                        number,
                        kind: ChangeKind::Modified,
                        changed_properties: changed,
                    });
                }
            }
            (None, None) => {}
        }
    }
    diffs
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(class_name: &str, number: u32, value: &str) -> DocumentObject {
        DocumentObject {
            class_name: class_name.to_string(),
            number,
            properties: BTreeMap::from([("value".to_string(), json!(value))]),
        }
    }

    #[test]
    fn test_identical_documents_have_no_changes() {
        let document = Document::new("Main.WebHome", "line 1\nline 2\n")
            .with_attachment("logo.png", "png")
            .with_object(object("XWiki.TagClass", 0, "a"));

        let diff = DocumentDiff::compute(Some(&document), Some("app/1.0".into()), Some(&document));
        assert!(diff.is_empty());
        assert_eq!(diff.previous.unwrap().version.as_deref(), Some("app/1.0"));
    }

    #[test]
    fn test_content_line_changes() {
        let before = Document::new("Main.WebHome", "a\nb\nc\n");
        let after = Document::new("Main.WebHome", "a\nB\nc\nd\n");

        let diff = DocumentDiff::compute(Some(&before), None, Some(&after));
        // b -> B is one delete and one insert, plus the appended line
        assert_eq!(diff.content_diff_size, 3);
    }

    #[test]
    fn test_missing_live_document() {
        let before = Document::new("Main.WebHome", "a\nb\n").with_attachment("file.txt", "x");

        let diff = DocumentDiff::compute(Some(&before), Some("app/1.0".into()), None);
        assert!(diff.next.is_none());
        assert_eq!(diff.content_diff_size, 2);
        assert_eq!(
            diff.attachment_diffs,
            vec![AttachmentDiff {
                name: "file.txt".into(),
                kind: ChangeKind::Deleted
            }]
        );
    }

    #[test]
    fn test_object_and_class_changes() {
        let before = Document::new("Main.WebHome", "")
            .with_object(object("XWiki.TagClass", 0, "a"))
            .with_object(object("XWiki.TagClass", 1, "b"))
            .with_class_property("title", "String");
        let after = Document::new("Main.WebHome", "")
            .with_object(object("XWiki.TagClass", 0, "changed"))
            .with_object(object("XWiki.CommentClass", 0, "c"))
            .with_class_property("title", "TextArea");

        let diff = DocumentDiff::compute(Some(&before), None, Some(&after));
        assert_eq!(diff.object_diffs.len(), 3);
        let modified = diff
            .object_diffs
            .iter()
            .find(|o| o.kind == ChangeKind::Modified)
            .unwrap();
        assert_eq!(modified.changed_properties, vec!["value".to_string()]);
        assert_eq!(diff.class_property_diffs[0].kind, ChangeKind::Modified);
        assert_eq!(diff.change_count(), 4);
    }
}
