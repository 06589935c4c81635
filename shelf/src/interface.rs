//! Shelf FFI Interface Definition
//!
//! This file defines the public interface exposed to Swift via UniFFI.
//! It acts as the source of truth for shared types.

use thiserror::Error;

// ═══════════════════════════════════════════════════════════════════════════════
// ENUMS
// ═══════════════════════════════════════════════════════════════════════════════

/// Content representations the history can capture.
///
/// The raw tags (`"String"`, `"RTF"`, ...) are what gets stored in the
/// `primaryType` column and in preferences, so they must never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, uniffi::Enum)]
pub enum ClipType {
    String,
    Rtf,
    Rtfd,
    Pdf,
    Filenames,
    Url,
    Tiff,
}

impl ClipType {
    pub const ALL: [ClipType; 7] = [
        ClipType::String,
        ClipType::Rtf,
        ClipType::Rtfd,
        ClipType::Pdf,
        ClipType::Filenames,
        ClipType::Url,
        ClipType::Tiff,
    ];

    pub fn raw_value(&self) -> &'static str {
        match self {
            ClipType::String => "String",
            ClipType::Rtf => "RTF",
            ClipType::Rtfd => "RTFD",
            ClipType::Pdf => "PDF",
            ClipType::Filenames => "Filenames",
            ClipType::Url => "URL",
            ClipType::Tiff => "TIFF",
        }
    }

    pub fn from_raw_value(raw: &str) -> Option<Self> {
        ClipType::ALL.into_iter().find(|t| t.raw_value() == raw)
    }

    /// Map a pasteboard type identifier (legacy or UTI form) to a capturable type.
    pub fn from_pasteboard_type(identifier: &str) -> Option<Self> {
        match identifier {
            "NSStringPboardType" | "public.utf8-plain-text" | "public.plain-text" | "public.text" => {
                Some(ClipType::String)
            }
            "NSRTFPboardType" | "public.rtf" => Some(ClipType::Rtf),
            "NSRTFDPboardType" | "com.apple.flat-rtfd" | "com.apple.rtfd" => Some(ClipType::Rtfd),
            "NSPDFPboardType" | "com.adobe.pdf" | "Apple PDF pasteboard type" => Some(ClipType::Pdf),
            "NSFilenamesPboardType" | "public.file-url" => Some(ClipType::Filenames),
            "NSURLPboardType" | "public.url" | "Apple URL pasteboard type" => Some(ClipType::Url),
            "NSTIFFPboardType" | "public.tiff" | "NeXT TIFF v4.0 pasteboard type" => Some(ClipType::Tiff),
            _ => None,
        }
    }
}

/// Whether an entity instance is known to the database.
///
/// Detached instances are scratch copies (editor state, freshly created
/// objects); they must be re-resolved by identifier before any write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum Attachment {
    Detached,
    Attached,
}

impl Default for Attachment {
    fn default() -> Self {
        Attachment::Detached
    }
}

/// Ordering of history in menus and exports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize, uniffi::Enum)]
#[serde(rename_all = "snake_case")]
pub enum HistoryOrder {
    NewestFirst,
    OldestFirst,
}

impl Default for HistoryOrder {
    fn default() -> Self {
        HistoryOrder::NewestFirst
    }
}

/// Logical menus a global hotkey can pop up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize, uniffi::Enum)]
#[serde(rename_all = "snake_case")]
pub enum MenuKind {
    Main,
    History,
    Snippet,
}

// ═══════════════════════════════════════════════════════════════════════════════
// RECORDS (Structs)
// ═══════════════════════════════════════════════════════════════════════════════

/// Persisted history entry metadata (payload lives in the file at `data_path`)
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Record)]
pub struct ClipRecord {
    pub data_hash: String,
    pub data_path: String,
    pub title: String,
    pub primary_type: String,
    pub update_time: i64,
    pub thumbnail_path: Option<String>,
}

/// Leaf of the snippet tree
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Record)]
pub struct Snippet {
    pub identifier: String,
    pub index: i64,
    pub enable: bool,
    pub title: String,
    pub content: String,
    /// Owning folder, derived from storage on load
    pub folder_identifier: Option<String>,
    pub attachment: Attachment,
}

/// Ordered container of snippets
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Record)]
pub struct Folder {
    pub identifier: String,
    pub index: i64,
    pub enable: bool,
    pub title: String,
    pub snippets: Vec<Snippet>,
    pub attachment: Attachment,
}

/// Denylist entry; equality is structural over both fields
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize, uniffi::Record)]
pub struct ExcludedApplication {
    pub identifier: String,
    pub name: String,
}

/// A global key combination (virtual key code + modifier mask)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize, uniffi::Record)]
pub struct HotKeyCombo {
    pub key_code: u32,
    pub modifiers: u32,
}

/// Normalized snapshot of one clipboard state, as handed back to Swift for pasting
#[derive(Debug, Clone, PartialEq, Eq, Default, uniffi::Record)]
pub struct ClipContent {
    pub types: Vec<ClipType>,
    pub string_value: String,
    pub rtf_data: Option<Vec<u8>>,
    pub pdf: Option<Vec<u8>>,
    pub file_names: Vec<String>,
    pub urls: Vec<String>,
    pub image: Option<Vec<u8>>,
}

/// Error type for Shelf operations
#[derive(Debug, Error, uniffi::Error)]
pub enum ShelfError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Storage error: {0}")]
    StorageError(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Import failed: {0}")]
    ImportError(String),
    #[error("Export failed: {0}")]
    ExportError(String),
    #[error("Store not initialized")]
    NotInitialized,
}

// ═══════════════════════════════════════════════════════════════════════════════
// FOREIGN INTERFACES (implemented by the host app)
// ═══════════════════════════════════════════════════════════════════════════════

/// Read access to the system pasteboard.
///
/// There is no change notification on macOS; callers poll `change_count`.
#[uniffi::export(with_foreign)]
pub trait Pasteboard: Send + Sync {
    /// Monotonic counter bumped by the OS on every pasteboard write
    fn change_count(&self) -> i64;

    /// Declared type identifiers, in the writer's preference order
    fn types(&self) -> Vec<String>;

    fn string_for_type(&self, pasteboard_type: String) -> Option<String>;

    fn data_for_type(&self, pasteboard_type: String) -> Option<Vec<u8>>;

    /// Property-list string arrays (file names, URL lists)
    fn string_list_for_type(&self, pasteboard_type: String) -> Option<Vec<String>>;
}

/// Global hotkey registration, implemented over the OS hotkey service.
#[uniffi::export(with_foreign)]
pub trait HotKeyRegistrar: Send + Sync {
    /// Returns false when the OS refuses the combination
    fn register(&self, kind: MenuKind, combo: HotKeyCombo) -> bool;

    fn unregister(&self, kind: MenuKind);
}

impl From<crate::database::DatabaseError> for ShelfError {
    fn from(e: crate::database::DatabaseError) -> Self {
        ShelfError::DatabaseError(e.to_string())
    }
}

impl From<crate::preferences::PreferencesError> for ShelfError {
    fn from(e: crate::preferences::PreferencesError) -> Self {
        ShelfError::StorageError(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_value_roundtrip() {
        for ty in ClipType::ALL {
            assert_eq!(ClipType::from_raw_value(ty.raw_value()), Some(ty));
        }
        assert_eq!(ClipType::from_raw_value("Bogus"), None);
    }

    #[test]
    fn test_pasteboard_identifiers() {
        assert_eq!(ClipType::from_pasteboard_type("public.utf8-plain-text"), Some(ClipType::String));
        assert_eq!(ClipType::from_pasteboard_type("NSStringPboardType"), Some(ClipType::String));
        assert_eq!(ClipType::from_pasteboard_type("com.apple.flat-rtfd"), Some(ClipType::Rtfd));
        assert_eq!(ClipType::from_pasteboard_type("public.tiff"), Some(ClipType::Tiff));
        assert_eq!(ClipType::from_pasteboard_type("com.agilebits.onepassword"), None);
    }

    #[test]
    fn test_excluded_application_equality_is_structural() {
        let a = ExcludedApplication { identifier: "com.example.app".into(), name: "Example".into() };
        let renamed = ExcludedApplication { identifier: "com.example.app".into(), name: "Example 2".into() };
        assert_eq!(a, a.clone());
        assert_ne!(a, renamed);
    }
}
