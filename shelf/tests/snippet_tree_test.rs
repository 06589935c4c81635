//! Snippet tree behaviour through the exported store API, including the
//! XML round trip.

use shelf::environment::{Environment, ManualClock};
use shelf::pasteboard::MemoryPasteboard;
use shelf::preferences::Preferences;
use shelf::{Attachment, Folder, ShelfError, ShelfStore};
use std::sync::Arc;

fn store() -> (tempfile::TempDir, ShelfStore) {
    let dir = tempfile::tempdir().unwrap();
    let env = Environment::in_memory(
        dir.path(),
        Arc::new(MemoryPasteboard::new()),
        Preferences::default(),
        Arc::new(ManualClock::new(0)),
    )
    .unwrap();
    (dir, ShelfStore::with_environment(env))
}

/// Folder titled `title` holding snippets `(title, content)` in order
fn build_folder(store: &ShelfStore, title: &str, snippets: &[(&str, &str)]) -> Folder {
    let mut folder = store.create_folder().unwrap();
    folder.title = title.to_string();
    let mut folder = store.merge_folder(folder).unwrap();
    for (snippet_title, content) in snippets {
        let mut snippet = store.create_snippet(folder.clone());
        snippet.title = snippet_title.to_string();
        snippet.content = content.to_string();
        folder = store.merge_snippet(folder, snippet).unwrap();
    }
    folder
}

fn indices(folder: &Folder) -> Vec<i64> {
    folder.snippets.iter().map(|s| s.index).collect()
}

fn contents(folder: &Folder) -> Vec<(String, String)> {
    folder
        .snippets
        .iter()
        .map(|s| (s.title.clone(), s.content.clone()))
        .collect()
}

#[test]
fn test_index_contiguity_after_mixed_operations() {
    let (_dir, store) = store();
    let a = build_folder(&store, "A", &[("a0", ""), ("a1", ""), ("a2", ""), ("a3", "")]);
    let b = build_folder(&store, "B", &[("b0", ""), ("b1", "")]);

    // Reorder within A, move one snippet to B, detach one, delete one
    let payload = store.snippet_drag_payload(a.snippets[0].identifier.clone(), a.identifier.clone());
    assert!(store.move_snippet(payload, a.identifier.clone(), 3).unwrap());
    let payload = store.snippet_drag_payload(a.snippets[2].identifier.clone(), a.identifier.clone());
    assert!(store.move_snippet(payload, b.identifier.clone(), 0).unwrap());
    let a_now = store.folders().unwrap().remove(0);
    store.remove_snippet(a_now.clone(), a_now.snippets[0].clone()).unwrap();
    let b_now = store.folders().unwrap().remove(1);
    store.delete_snippet(b_now.snippets[2].clone()).unwrap();

    for folder in store.folders().unwrap() {
        let mut sorted = folder.snippets.clone();
        sorted.sort_by_key(|s| s.index);
        let expected: Vec<i64> = (0..sorted.len() as i64).collect();
        assert_eq!(sorted.iter().map(|s| s.index).collect::<Vec<_>>(), expected);
        assert_eq!(indices(&folder), expected);
    }
    let folders = store.folders().unwrap();
    let a_titles: Vec<_> = folders[0].snippets.iter().map(|s| s.title.as_str()).collect();
    let b_titles: Vec<_> = folders[1].snippets.iter().map(|s| s.title.as_str()).collect();
    assert_eq!(a_titles, vec!["a0", "a3"]);
    assert_eq!(b_titles, vec!["a2", "b0"]);
}

#[test]
fn test_deep_copy_detachment() {
    let (_dir, store) = store();
    let folder = build_folder(&store, "Source", &[("one", "1"), ("two", "2")]);

    let mut copy = store.deep_copy_folder(folder.clone());
    assert_eq!(copy.attachment, Attachment::Detached);
    assert_eq!(copy.identifier, folder.identifier);
    assert_eq!(copy.title, folder.title);
    assert_eq!(copy.index, folder.index);
    assert_eq!(contents(&copy), contents(&folder));

    copy.title = "Edited".into();
    copy.snippets[0].content = "changed".into();
    assert_eq!(store.folders().unwrap()[0].title, "Source");
    assert_eq!(store.folders().unwrap()[0].snippets[0].content, "1");

    store.merge_folder(copy.clone()).unwrap();
    store.merge_snippet(copy.clone(), copy.snippets[0].clone()).unwrap();
    let stored = store.folders().unwrap().remove(0);
    assert_eq!(stored.title, "Edited");
    assert_eq!(stored.snippets[0].content, "changed");
    assert_eq!(stored.snippets.len(), 2);
}

#[test]
fn test_idempotent_rename() {
    let (_dir, store) = store();
    let folder = build_folder(&store, "Folder", &[("s", "body")]);
    let snippet_id = folder.snippets[0].identifier.clone();

    for _ in 0..2 {
        store.rename_folder(folder.identifier.clone(), "Renamed".into()).unwrap();
        store.rename_snippet(snippet_id.clone(), "Renamed snippet".into()).unwrap();
    }

    let folders = store.folders().unwrap();
    assert_eq!(folders.len(), 1);
    assert_eq!(folders[0].title, "Renamed");
    assert_eq!(folders[0].snippets.len(), 1);
    assert_eq!(folders[0].snippets[0].title, "Renamed snippet");

    let err = store.rename_snippet(snippet_id, String::new()).unwrap_err();
    assert!(matches!(err, ShelfError::InvalidInput(_)));
    assert_eq!(store.folders().unwrap()[0].snippets[0].title, "Renamed snippet");
}

#[test]
fn test_snippet_xml_roundtrip_into_empty_store() {
    let (_dir, source) = store();
    build_folder(&source, "Greetings", &[("hi", "Hello!"), ("bye", "Goodbye & <see you>"), ("yo", "")]);
    build_folder(&source, "Code", &[("fn", "fn main() {}"), ("if", "if x < y {}"), ("loop", "loop {}")]);
    let xml = source.export_snippets_xml().unwrap();

    let (_dir2, target) = store();
    assert_eq!(target.import_snippets_xml(xml).unwrap(), 2);

    let original = source.folders().unwrap();
    let imported = target.folders().unwrap();
    assert_eq!(imported.len(), 2);
    for (a, b) in original.iter().zip(&imported) {
        assert_eq!(a.title, b.title);
        assert_eq!(a.index, b.index);
        assert_eq!(contents(a), contents(b));
        assert_eq!(indices(b), vec![0, 1, 2]);
        assert_ne!(a.identifier, b.identifier);
    }
}

#[test]
fn test_import_appends_after_existing_folders() {
    let (_dir, store) = store();
    build_folder(&store, "Existing", &[]);
    let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<folders>
  <folder><snippets><snippet><content>no title</content></snippet></snippets></folder>
</folders>"#;
    store.import_snippets_xml(xml.into()).unwrap();

    let folders = store.folders().unwrap();
    assert_eq!(folders[0].title, "Existing");
    assert_eq!(folders[1].title, "untitled folder");
    assert_eq!(folders[1].index, 1);
    assert_eq!(folders[1].snippets[0].title, "untitled snippet");
    assert_eq!(folders[1].snippets[0].content, "no title");
}

#[test]
fn test_malformed_import_is_one_error() {
    let (_dir, store) = store();
    let err = store.import_snippets_xml("<folders><folder>".into()).unwrap_err();
    assert!(matches!(err, ShelfError::ImportError(_)));
    assert!(store.folders().unwrap().is_empty());
}

#[test]
fn test_history_xml_roundtrip() {
    let (_dir, source) = store();
    source.add_clip(text_content("oldest")).unwrap();
    source.add_clip(text_content("middle")).unwrap();
    source.add_clip(text_content("newest")).unwrap();
    source
        .add_clip(shelf::ClipContent {
            types: vec![shelf::ClipType::Pdf],
            pdf: Some(vec![1, 2, 3]),
            ..Default::default()
        })
        .unwrap();

    let xml = source.export_history_xml().unwrap();
    assert_eq!(xml.matches("<history>").count(), 3, "non-text clips are not exported");

    let (_dir2, target) = store();
    assert_eq!(target.import_history_xml(xml.clone()).unwrap(), 3);
    let titles: Vec<_> = target.clips().unwrap().into_iter().map(|c| c.title).collect();
    assert_eq!(titles, vec!["newest", "middle", "oldest"]);
    assert_eq!(target.export_history_xml().unwrap(), xml);
}

fn text_content(text: &str) -> shelf::ClipContent {
    shelf::ClipContent {
        types: vec![shelf::ClipType::String],
        string_value: text.to_string(),
        ..Default::default()
    }
}
