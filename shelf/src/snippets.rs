//! Two-level snippet tree: ordered folders holding ordered snippets.
//!
//! Callers usually hold detached copies (editor state). Every write
//! re-resolves the target by identifier, applies the change and rewrites
//! the affected container's indices so they stay `0..n-1` in list order.

use crate::database::Database;
use crate::environment::EnvironmentStack;
use crate::interface::{Attachment, Folder, ShelfError, Snippet};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

pub const UNTITLED_FOLDER: &str = "untitled folder";
pub const UNTITLED_SNIPPET: &str = "untitled snippet";
pub const DRAG_PAYLOAD_VERSION: u32 = 1;

// ─────────────────────────────────────────────────────────────────────────────
// DRAG PAYLOAD
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DragError {
    #[error("malformed drag payload: {0}")]
    Malformed(String),
    #[error("unsupported drag payload version {0}")]
    UnsupportedVersion(u32),
    #[error("only single-item drags are supported, got {0}")]
    MultipleItems(usize),
}

impl From<DragError> for ShelfError {
    fn from(e: DragError) -> Self {
        ShelfError::InvalidInput(e.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DragKind {
    Folder,
    Snippet,
}

/// What is being dragged in the snippet editor, as placed on the drag
/// pasteboard
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DragPayload {
    pub version: u32,
    pub kind: DragKind,
    pub identifiers: Vec<String>,
    /// Owning folder for snippet drags
    #[serde(default)]
    pub source_folder: Option<String>,
}

impl DragPayload {
    pub fn folder(identifier: impl Into<String>) -> Self {
        Self {
            version: DRAG_PAYLOAD_VERSION,
            kind: DragKind::Folder,
            identifiers: vec![identifier.into()],
            source_folder: None,
        }
    }

    pub fn snippet(identifier: impl Into<String>, source_folder: impl Into<String>) -> Self {
        Self {
            version: DRAG_PAYLOAD_VERSION,
            kind: DragKind::Snippet,
            identifiers: vec![identifier.into()],
            source_folder: Some(source_folder.into()),
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        // A struct of strings always serializes
        serde_json::to_vec(self).unwrap_or_default()
    }

    /// Decode and validate; multi-item selections are rejected here
    pub fn decode(bytes: &[u8]) -> Result<Self, DragError> {
        let payload: DragPayload =
            serde_json::from_slice(bytes).map_err(|e| DragError::Malformed(e.to_string()))?;
        payload.validate()?;
        Ok(payload)
    }

    fn validate(&self) -> Result<(), DragError> {
        if self.version != DRAG_PAYLOAD_VERSION {
            return Err(DragError::UnsupportedVersion(self.version));
        }
        if self.identifiers.len() != 1 {
            return Err(DragError::MultipleItems(self.identifiers.len()));
        }
        Ok(())
    }

    fn identifier(&self) -> &str {
        &self.identifiers[0]
    }
}

/// Same-parent drops land "before item `to`"; dropping just before or just
/// after the item itself leaves it where it was.
fn is_same_position(from: usize, to: usize) -> bool {
    to == from || to == from + 1
}

// ─────────────────────────────────────────────────────────────────────────────
// TREE
// ─────────────────────────────────────────────────────────────────────────────

/// Fully detached copy of a folder and its snippets, order preserved
pub fn deep_copy(folder: &Folder) -> Folder {
    Folder {
        snippets: folder
            .snippets
            .iter()
            .map(|snippet| Snippet {
                attachment: Attachment::Detached,
                ..snippet.clone()
            })
            .collect(),
        attachment: Attachment::Detached,
        ..folder.clone()
    }
}

pub struct SnippetTree {
    stack: Arc<EnvironmentStack>,
}

impl SnippetTree {
    pub fn new(stack: Arc<EnvironmentStack>) -> Self {
        Self { stack }
    }

    fn with_db<T>(&self, f: impl FnOnce(&Database) -> Result<T, ShelfError>) -> Result<T, ShelfError> {
        let env = self.stack.current();
        f(env.database.as_ref())
    }

    /// The attached tree, folders and snippets ordered by index
    pub fn load_folders(&self) -> Result<Vec<Folder>, ShelfError> {
        self.with_db(|db| Ok(db.fetch_folders()?))
    }

    pub fn folder(&self, identifier: &str) -> Result<Option<Folder>, ShelfError> {
        self.with_db(|db| Ok(db.fetch_folder(identifier)?))
    }

    /// New detached folder placed after every existing one
    pub fn create(&self) -> Result<Folder, ShelfError> {
        let next_index = self.with_db(|db| Ok(db.max_folder_index()?.map_or(0, |max| max + 1)))?;
        Ok(Folder {
            identifier: uuid::Uuid::new_v4().to_string(),
            index: next_index,
            enable: true,
            title: UNTITLED_FOLDER.to_string(),
            snippets: Vec::new(),
            attachment: Attachment::Detached,
        })
    }

    /// Upsert by identifier: an existing row gets the scalar fields, a new
    /// one is inserted with all of its snippets. Returns the stored folder.
    pub fn merge(&self, folder: &Folder) -> Result<Folder, ShelfError> {
        self.with_db(|db| {
            if !db.update_folder(folder)? {
                for snippet in &folder.snippets {
                    let previous = db.fetch_snippet(&snippet.identifier)?.and_then(|s| s.folder_identifier);
                    if let Some(previous) = previous.filter(|p| *p != folder.identifier) {
                        detach_from(db, &previous, &snippet.identifier)?;
                    }
                }
                db.insert_folder_tree(folder)?;
                let order: Vec<String> = folder.snippets.iter().map(|s| s.identifier.clone()).collect();
                db.replace_folder_members(&folder.identifier, &order)?;
                debug!(folder = %folder.identifier, "folder inserted");
            }
            attached_folder(db, &folder.identifier)
        })
    }

    /// New detached snippet positioned at the end of `folder`
    pub fn create_snippet(&self, folder: &Folder) -> Snippet {
        Snippet {
            identifier: uuid::Uuid::new_v4().to_string(),
            index: folder.snippets.len() as i64,
            enable: true,
            title: UNTITLED_SNIPPET.to_string(),
            content: String::new(),
            folder_identifier: Some(folder.identifier.clone()),
            attachment: Attachment::Detached,
        }
    }

    /// Upsert the snippet's fields and append it to `folder` unless it is
    /// already there
    pub fn merge_snippet(&self, folder: &Folder, snippet: &Snippet) -> Result<Folder, ShelfError> {
        self.with_db(|db| {
            let stored = attached_folder(db, &folder.identifier)?;
            let previous = db.fetch_snippet(&snippet.identifier)?.and_then(|s| s.folder_identifier);
            db.upsert_snippet(snippet, Some(&folder.identifier))?;
            let mut order = member_ids(&stored);
            if !order.contains(&snippet.identifier) {
                if let Some(previous) = previous.filter(|p| *p != folder.identifier) {
                    detach_from(db, &previous, &snippet.identifier)?;
                }
                order.push(snippet.identifier.clone());
            }
            db.replace_folder_members(&folder.identifier, &order)?;
            attached_folder(db, &folder.identifier)
        })
    }

    /// Place an already-persisted snippet at `at` in `folder`. A snippet
    /// that was never merged is left alone and `None` is returned.
    pub fn insert_snippet(&self, folder: &Folder, snippet: &Snippet, at: usize) -> Result<Option<Folder>, ShelfError> {
        self.with_db(|db| {
            let stored_snippet = match db.fetch_snippet(&snippet.identifier)? {
                Some(s) => s,
                None => {
                    debug!(snippet = %snippet.identifier, "insert of unsaved snippet ignored");
                    return Ok(None);
                }
            };
            if let Some(previous) = stored_snippet.folder_identifier.as_deref() {
                if previous != folder.identifier {
                    detach_from(db, previous, &snippet.identifier)?;
                }
            }
            let stored = attached_folder(db, &folder.identifier)?;
            let mut order = member_ids(&stored);
            order.retain(|id| id != &snippet.identifier);
            order.insert(at.min(order.len()), snippet.identifier.clone());
            db.replace_folder_members(&folder.identifier, &order)?;
            attached_folder(db, &folder.identifier).map(Some)
        })
    }

    /// Take the snippet out of `folder` without deleting it
    pub fn remove_snippet(&self, folder: &Folder, snippet: &Snippet) -> Result<Folder, ShelfError> {
        self.with_db(|db| {
            detach_from(db, &folder.identifier, &snippet.identifier)?;
            attached_folder(db, &folder.identifier)
        })
    }

    /// Delete a snippet and close the gap in its folder
    pub fn delete_snippet(&self, snippet: &Snippet) -> Result<bool, ShelfError> {
        self.with_db(|db| {
            let owner = db.fetch_snippet(&snippet.identifier)?.and_then(|s| s.folder_identifier);
            let deleted = db.delete_snippet(&snippet.identifier)?;
            if let Some(owner) = owner {
                if let Some(stored) = db.fetch_folder(&owner)? {
                    db.replace_folder_members(&owner, &member_ids(&stored))?;
                }
            }
            Ok(deleted)
        })
    }

    /// `index = position` for every folder, in memory and in storage
    pub fn rearrange_index(&self, folders: &mut [Folder]) -> Result<(), ShelfError> {
        for (position, folder) in folders.iter_mut().enumerate() {
            folder.index = position as i64;
        }
        let order: Vec<String> = folders.iter().map(|f| f.identifier.clone()).collect();
        self.with_db(|db| Ok(db.reorder_folders(&order)?))
    }

    /// Delete the folder's snippets, then the folder, as two separate
    /// transactions. A failure between them leaves an empty folder behind.
    pub fn remove(&self, folder: &Folder) -> Result<(), ShelfError> {
        self.with_db(|db| {
            let snippets = db.delete_snippets_in(&folder.identifier)?;
            db.delete_folder_row(&folder.identifier)?;
            let order: Vec<String> = db.fetch_folders()?.into_iter().map(|f| f.identifier).collect();
            db.reorder_folders(&order)?;
            info!(folder = %folder.identifier, snippets, "folder removed");
            Ok(())
        })
    }

    pub fn rename_folder(&self, identifier: &str, title: &str) -> Result<Folder, ShelfError> {
        let title = validated_title(title)?;
        self.with_db(|db| {
            let mut folder = attached_folder(db, identifier)?;
            folder.title = title;
            db.update_folder(&folder)?;
            Ok(folder)
        })
    }

    pub fn set_folder_enabled(&self, identifier: &str, enable: bool) -> Result<Folder, ShelfError> {
        self.with_db(|db| {
            let mut folder = attached_folder(db, identifier)?;
            folder.enable = enable;
            db.update_folder(&folder)?;
            Ok(folder)
        })
    }

    pub fn rename_snippet(&self, identifier: &str, title: &str) -> Result<Snippet, ShelfError> {
        let title = validated_title(title)?;
        self.update_snippet(identifier, |s| s.title = title)
    }

    pub fn update_snippet_content(&self, identifier: &str, content: &str) -> Result<Snippet, ShelfError> {
        self.update_snippet(identifier, |s| s.content = content.to_string())
    }

    pub fn set_snippet_enabled(&self, identifier: &str, enable: bool) -> Result<Snippet, ShelfError> {
        self.update_snippet(identifier, |s| s.enable = enable)
    }

    fn update_snippet(&self, identifier: &str, mutate: impl FnOnce(&mut Snippet)) -> Result<Snippet, ShelfError> {
        self.with_db(|db| {
            let mut snippet = db
                .fetch_snippet(identifier)?
                .ok_or_else(|| ShelfError::InvalidInput(format!("unknown snippet {}", identifier)))?;
            mutate(&mut snippet);
            db.upsert_snippet(&snippet, snippet.folder_identifier.as_deref())?;
            Ok(snippet)
        })
    }

    /// Drop a dragged snippet into `to_folder` before position `to_index`.
    /// Returns false for a drop that would not move anything.
    pub fn move_snippet(&self, payload: &DragPayload, to_folder: &str, to_index: usize) -> Result<bool, ShelfError> {
        payload.validate()?;
        if payload.kind != DragKind::Snippet {
            return Err(ShelfError::InvalidInput("expected a snippet drag".into()));
        }
        let identifier = payload.identifier();

        self.with_db(|db| {
            let snippet = db
                .fetch_snippet(identifier)?
                .ok_or_else(|| ShelfError::InvalidInput(format!("unknown snippet {}", identifier)))?;
            let destination = attached_folder(db, to_folder)?;
            let mut order = member_ids(&destination);

            match snippet.folder_identifier.as_deref() {
                Some(source) if source == to_folder => {
                    let from = order.iter().position(|id| id == identifier).unwrap_or(order.len());
                    if is_same_position(from, to_index) {
                        return Ok(false);
                    }
                    order.remove(from);
                    let to = if to_index > from { to_index - 1 } else { to_index };
                    order.insert(to.min(order.len()), identifier.to_string());
                }
                source => {
                    if let Some(source) = source {
                        detach_from(db, source, identifier)?;
                    }
                    order.insert(to_index.min(order.len()), identifier.to_string());
                }
            }

            db.replace_folder_members(to_folder, &order)?;
            debug!(snippet = %identifier, folder = %to_folder, "snippet moved");
            Ok(true)
        })
    }

    /// Drop a dragged folder before top-level position `to_index`
    pub fn move_folder(&self, payload: &DragPayload, to_index: usize) -> Result<bool, ShelfError> {
        payload.validate()?;
        if payload.kind != DragKind::Folder {
            return Err(ShelfError::InvalidInput("expected a folder drag".into()));
        }
        let identifier = payload.identifier();

        let mut folders = self.load_folders()?;
        let from = folders
            .iter()
            .position(|f| f.identifier == identifier)
            .ok_or_else(|| ShelfError::InvalidInput(format!("unknown folder {}", identifier)))?;
        if is_same_position(from, to_index) {
            return Ok(false);
        }
        let moved = folders.remove(from);
        let to = if to_index > from { to_index - 1 } else { to_index };
        folders.insert(to.min(folders.len()), moved);
        self.rearrange_index(&mut folders)?;
        Ok(true)
    }
}

fn validated_title(title: &str) -> Result<String, ShelfError> {
    if title.trim().is_empty() {
        return Err(ShelfError::InvalidInput("title must not be empty".into()));
    }
    Ok(title.to_string())
}

fn attached_folder(db: &Database, identifier: &str) -> Result<Folder, ShelfError> {
    db.fetch_folder(identifier)?
        .ok_or_else(|| ShelfError::InvalidInput(format!("unknown folder {}", identifier)))
}

fn member_ids(folder: &Folder) -> Vec<String> {
    folder.snippets.iter().map(|s| s.identifier.clone()).collect()
}

/// Remove one snippet from a folder's list and renumber the rest
fn detach_from(db: &Database, folder_identifier: &str, snippet_identifier: &str) -> Result<(), ShelfError> {
    if let Some(folder) = db.fetch_folder(folder_identifier)? {
        let mut order = member_ids(&folder);
        order.retain(|id| id != snippet_identifier);
        db.replace_folder_members(folder_identifier, &order)?;
    }
    Ok(())
}
