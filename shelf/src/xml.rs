//! XML import/export for snippets and history.
//!
//! Snippets:
//! ```xml
//! <folders>
//!   <folder>
//!     <title>Greetings</title>
//!     <snippets>
//!       <snippet><title>hi</title><content>Hello!</content></snippet>
//!     </snippets>
//!   </folder>
//! </folders>
//! ```
//! History: `<histories><history><content>text</content></history></histories>`.

use crate::clip_store::{read_payload, ClipStore, CreateOutcome};
use crate::interface::{Attachment, Folder, HistoryOrder, ShelfError, Snippet};
use crate::models::ClipData;
use crate::snippets::{SnippetTree, UNTITLED_FOLDER, UNTITLED_SNIPPET};
use std::path::Path;
use thiserror::Error;
use tracing::info;

const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

#[derive(Error, Debug)]
pub enum XmlError {
    #[error("XML parse error: {0}")]
    Parse(#[from] roxmltree::Error),
    #[error("expected root element <{expected}>, found <{found}>")]
    UnexpectedRoot { expected: &'static str, found: String },
}

// ─────────────────────────────────────────────────────────────────────────────
// WRITER
// ─────────────────────────────────────────────────────────────────────────────

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            '\r' => out.push_str("&#13;"),
            _ => out.push(c),
        }
    }
    out
}

fn push_element(out: &mut String, depth: usize, name: &str, text: &str) {
    out.push_str(&"  ".repeat(depth));
    out.push_str(&format!("<{name}>{}</{name}>\n", escape(text)));
}

fn open(out: &mut String, depth: usize, name: &str) {
    out.push_str(&"  ".repeat(depth));
    out.push_str(&format!("<{}>\n", name));
}

fn close(out: &mut String, depth: usize, name: &str) {
    out.push_str(&"  ".repeat(depth));
    out.push_str(&format!("</{}>\n", name));
}

/// Serialize folders and their snippets in list order
pub fn write_snippets(folders: &[Folder]) -> String {
    let mut out = format!("{}\n", XML_DECLARATION);
    open(&mut out, 0, "folders");
    for folder in folders {
        open(&mut out, 1, "folder");
        push_element(&mut out, 2, "title", &folder.title);
        open(&mut out, 2, "snippets");
        for snippet in &folder.snippets {
            open(&mut out, 3, "snippet");
            push_element(&mut out, 4, "title", &snippet.title);
            push_element(&mut out, 4, "content", &snippet.content);
            close(&mut out, 3, "snippet");
        }
        close(&mut out, 2, "snippets");
        close(&mut out, 1, "folder");
    }
    close(&mut out, 0, "folders");
    out
}

pub fn write_history<S: AsRef<str>>(contents: &[S]) -> String {
    let mut out = format!("{}\n", XML_DECLARATION);
    open(&mut out, 0, "histories");
    for content in contents {
        open(&mut out, 1, "history");
        push_element(&mut out, 2, "content", content.as_ref());
        close(&mut out, 1, "history");
    }
    close(&mut out, 0, "histories");
    out
}

// ─────────────────────────────────────────────────────────────────────────────
// READER
// ─────────────────────────────────────────────────────────────────────────────

fn is_element(node: &roxmltree::Node, name: &str) -> bool {
    node.is_element() && node.has_tag_name(name)
}

/// Text of the first `name` child; `None` if the child is absent
fn child_text(node: roxmltree::Node, name: &str) -> Option<String> {
    let child = node.children().find(|n| is_element(n, name))?;
    Some(child.text().unwrap_or_default().to_string())
}

fn expect_root<'a, 'input>(doc: &'a roxmltree::Document<'input>, expected: &'static str) -> Result<roxmltree::Node<'a, 'input>, XmlError> {
    let root = doc.root_element();
    if !root.has_tag_name(expected) {
        return Err(XmlError::UnexpectedRoot {
            expected,
            found: root.tag_name().name().to_string(),
        });
    }
    Ok(root)
}

/// Parse a snippet export into detached folders with fresh identifiers.
/// Indices follow document order; missing titles and content fall back to
/// placeholders.
pub fn parse_snippets(xml: &str) -> Result<Vec<Folder>, XmlError> {
    let doc = roxmltree::Document::parse(xml)?;
    let root = expect_root(&doc, "folders")?;

    let folders = root
        .children()
        .filter(|n| is_element(n, "folder"))
        .enumerate()
        .map(|(folder_index, folder_node)| {
            let identifier = uuid::Uuid::new_v4().to_string();
            let snippets = folder_node
                .children()
                .filter(|n| is_element(n, "snippets"))
                .flat_map(|list| list.children().filter(|n| is_element(n, "snippet")))
                .enumerate()
                .map(|(snippet_index, snippet_node)| Snippet {
                    identifier: uuid::Uuid::new_v4().to_string(),
                    index: snippet_index as i64,
                    enable: true,
                    title: child_text(snippet_node, "title").unwrap_or_else(|| UNTITLED_SNIPPET.to_string()),
                    content: child_text(snippet_node, "content").unwrap_or_default(),
                    folder_identifier: Some(identifier.clone()),
                    attachment: Attachment::Detached,
                })
                .collect();
            Folder {
                identifier,
                index: folder_index as i64,
                enable: true,
                title: child_text(folder_node, "title").unwrap_or_else(|| UNTITLED_FOLDER.to_string()),
                snippets,
                attachment: Attachment::Detached,
            }
        })
        .collect();
    Ok(folders)
}

/// Text of every `<history><content>` in document order
pub fn parse_history(xml: &str) -> Result<Vec<String>, XmlError> {
    let doc = roxmltree::Document::parse(xml)?;
    let root = expect_root(&doc, "histories")?;
    Ok(root
        .children()
        .filter(|n| is_element(n, "history"))
        .filter_map(|node| child_text(node, "content"))
        .collect())
}

// ─────────────────────────────────────────────────────────────────────────────
// SERVICE-LEVEL IMPORT / EXPORT
// ─────────────────────────────────────────────────────────────────────────────

pub fn export_snippets(tree: &SnippetTree) -> Result<String, ShelfError> {
    let folders = tree.load_folders().map_err(|e| ShelfError::ExportError(e.to_string()))?;
    Ok(write_snippets(&folders))
}

/// Merge every folder of `xml` after the existing ones. Returns the number
/// of folders imported.
pub fn import_snippets(tree: &SnippetTree, xml: &str) -> Result<usize, ShelfError> {
    let folders = parse_snippets(xml).map_err(|e| ShelfError::ImportError(e.to_string()))?;
    let offset = tree.create().map_err(|e| ShelfError::ImportError(e.to_string()))?.index;
    for mut folder in folders.iter().cloned() {
        folder.index += offset;
        tree.merge(&folder).map_err(|e| ShelfError::ImportError(e.to_string()))?;
    }
    info!(folders = folders.len(), "snippets imported");
    Ok(folders.len())
}

/// Plain-text history in the configured order, capped at the configured
/// size. Clips without a non-empty string value are skipped.
pub fn export_history(store: &ClipStore) -> Result<String, ShelfError> {
    let prefs = store.preferences();
    let records = store
        .list(prefs.history_sort_order, Some(prefs.max_history_size))
        .map_err(|e| ShelfError::ExportError(e.to_string()))?;
    let contents: Vec<String> = records
        .iter()
        .filter_map(|record| read_payload(Path::new(&record.data_path)))
        .map(|data| data.string_value)
        .filter(|text| !text.is_empty())
        .collect();
    Ok(write_history(contents.as_slice()))
}

/// Create a String clip per history entry. Returns how many were stored.
///
/// The document is read in the configured sort order, so entries are
/// inserted oldest first and a re-export reproduces the same sequence.
pub fn import_history(store: &ClipStore, xml: &str) -> Result<usize, ShelfError> {
    let mut contents = parse_history(xml).map_err(|e| ShelfError::ImportError(e.to_string()))?;
    if store.preferences().history_sort_order == HistoryOrder::NewestFirst {
        contents.reverse();
    }
    let mut stored = 0;
    for content in contents.into_iter().filter(|c| !c.is_empty()) {
        let outcome = store
            .create(&ClipData::from_string(content))
            .map_err(|e| ShelfError::ImportError(e.to_string()))?;
        if matches!(outcome, CreateOutcome::Inserted(_) | CreateOutcome::Overwritten(_)) {
            stored += 1;
        }
    }
    info!(stored, "history imported");
    Ok(stored)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escaping_survives_parse() {
        let folder = Folder {
            identifier: "f".into(),
            index: 0,
            enable: true,
            title: "<Tags> & \"quotes\"".into(),
            snippets: vec![Snippet {
                identifier: "s".into(),
                index: 0,
                enable: true,
                title: "amp".into(),
                content: "a && b < c".into(),
                folder_identifier: Some("f".into()),
                attachment: Attachment::Attached,
            }],
            attachment: Attachment::Attached,
        };
        let parsed = parse_snippets(&write_snippets(&[folder])).unwrap();
        assert_eq!(parsed[0].title, "<Tags> & \"quotes\"");
        assert_eq!(parsed[0].snippets[0].content, "a && b < c");
    }

    #[test]
    fn test_missing_fields_use_placeholders() {
        let xml = r#"<folders>
            <folder><snippets><snippet></snippet><snippet><title>t</title></snippet></snippets></folder>
        </folders>"#;
        let parsed = parse_snippets(xml).unwrap();
        assert_eq!(parsed[0].title, UNTITLED_FOLDER);
        assert_eq!(parsed[0].snippets[0].title, UNTITLED_SNIPPET);
        assert_eq!(parsed[0].snippets[0].content, "");
        assert_eq!(parsed[0].snippets[1].title, "t");
        assert_eq!(parsed[0].snippets[1].index, 1);
        assert_eq!(parsed[0].attachment, Attachment::Detached);
    }

    #[test]
    fn test_wrong_root_rejected() {
        assert!(matches!(
            parse_snippets("<histories/>"),
            Err(XmlError::UnexpectedRoot { expected: "folders", .. })
        ));
        assert!(matches!(parse_history("<folders"), Err(XmlError::Parse(_))));
    }

    #[test]
    fn test_carriage_returns_survive_parse() {
        let folder = Folder {
            identifier: "f".into(),
            index: 0,
            enable: true,
            title: "crlf".into(),
            snippets: vec![Snippet {
                identifier: "s".into(),
                index: 0,
                enable: true,
                title: "lines".into(),
                content: "one\r\ntwo\rthree\n".into(),
                folder_identifier: Some("f".into()),
                attachment: Attachment::Attached,
            }],
            attachment: Attachment::Attached,
        };
        let parsed = parse_snippets(&write_snippets(&[folder])).unwrap();
        assert_eq!(parsed[0].snippets[0].content, "one\r\ntwo\rthree\n");
    }

    #[test]
    fn test_history_roundtrip_order() {
        let xml = write_history(&["first", "second <2>"]);
        assert_eq!(parse_history(&xml).unwrap(), vec!["first", "second <2>"]);
    }
}
