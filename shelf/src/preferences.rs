//! User preferences, persisted as JSON in the support directory.
//!
//! Every field has a serde default so older or partial files keep loading.
//! The excluded-application list is stored as a versioned archive rather
//! than a bare array so its format can evolve independently.

use crate::interface::{ClipType, ExcludedApplication, HistoryOrder, HotKeyCombo, MenuKind};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const PREFERENCES_FILE: &str = "preferences.json";
pub const EXCLUDED_APPS_ARCHIVE_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum PreferencesError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// ─────────────────────────────────────────────────────────────────────────────
// SETTINGS
// ─────────────────────────────────────────────────────────────────────────────

/// Which representations get captured into history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreTypes {
    pub string: bool,
    pub rtf: bool,
    pub rtfd: bool,
    pub pdf: bool,
    pub filenames: bool,
    pub url: bool,
    pub tiff: bool,
}

impl Default for StoreTypes {
    fn default() -> Self {
        Self {
            string: true,
            rtf: true,
            rtfd: true,
            pdf: true,
            filenames: true,
            url: true,
            tiff: true,
        }
    }
}

impl StoreTypes {
    pub fn is_enabled(&self, ty: ClipType) -> bool {
        match ty {
            ClipType::String => self.string,
            ClipType::Rtf => self.rtf,
            ClipType::Rtfd => self.rtfd,
            ClipType::Pdf => self.pdf,
            ClipType::Filenames => self.filenames,
            ClipType::Url => self.url,
            ClipType::Tiff => self.tiff,
        }
    }

    pub fn set(&mut self, ty: ClipType, enabled: bool) {
        let slot = match ty {
            ClipType::String => &mut self.string,
            ClipType::Rtf => &mut self.rtf,
            ClipType::Rtfd => &mut self.rtfd,
            ClipType::Pdf => &mut self.pdf,
            ClipType::Filenames => &mut self.filenames,
            ClipType::Url => &mut self.url,
            ClipType::Tiff => &mut self.tiff,
        };
        *slot = enabled;
    }
}

/// Status-bar menu layout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MenuSettings {
    /// History items shown directly in the menu before the grouped submenus
    pub number_of_items_place_inline: usize,
    /// Items per grouped submenu ("1 - 10", "11 - 20", ...)
    pub number_of_items_place_inside_folder: usize,
    pub max_menu_item_title_length: usize,
    pub menu_item_title_add_index: bool,
    pub menu_item_index_starts_with_zero: bool,
    pub add_clear_history_menu_item: bool,
    pub show_image_in_menu: bool,
    pub show_tooltip: bool,
    pub max_tooltip_length: usize,
}

impl Default for MenuSettings {
    fn default() -> Self {
        Self {
            number_of_items_place_inline: 0,
            number_of_items_place_inside_folder: 10,
            max_menu_item_title_length: 20,
            menu_item_title_add_index: true,
            menu_item_index_starts_with_zero: false,
            add_clear_history_menu_item: true,
            show_image_in_menu: true,
            show_tooltip: true,
            max_tooltip_length: 200,
        }
    }
}

/// Versioned archive of the denylist
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExcludedAppsArchive {
    pub version: u32,
    pub applications: Vec<ExcludedApplication>,
}

impl Default for ExcludedAppsArchive {
    fn default() -> Self {
        Self {
            version: EXCLUDED_APPS_ARCHIVE_VERSION,
            applications: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub max_history_size: usize,
    pub store_types: StoreTypes,
    /// Identical content replaces the existing record instead of adding one
    pub overwrite_same_history: bool,
    /// When off, a copy whose hash already exists is dropped entirely
    pub copy_same_history: bool,
    pub reorder_clips_after_pasting: bool,
    pub polling_interval_ms: u64,
    pub history_sort_order: HistoryOrder,
    pub thumbnail_width: u32,
    pub thumbnail_height: u32,
    pub menu: MenuSettings,
    pub hotkeys: BTreeMap<MenuKind, HotKeyCombo>,
    pub excluded_applications: ExcludedAppsArchive,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            max_history_size: 30,
            store_types: StoreTypes::default(),
            overwrite_same_history: true,
            copy_same_history: true,
            reorder_clips_after_pasting: true,
            polling_interval_ms: 750,
            history_sort_order: HistoryOrder::NewestFirst,
            thumbnail_width: 100,
            thumbnail_height: 32,
            menu: MenuSettings::default(),
            hotkeys: default_hotkeys(),
            excluded_applications: ExcludedAppsArchive::default(),
        }
    }
}

// Carbon virtual key codes / modifier masks
const KEY_V: u32 = 9;
const KEY_B: u32 = 11;
const CMD_KEY: u32 = 1 << 8;
const SHIFT_KEY: u32 = 1 << 9;
const CONTROL_KEY: u32 = 1 << 12;

fn default_hotkeys() -> BTreeMap<MenuKind, HotKeyCombo> {
    let mut hotkeys = BTreeMap::new();
    hotkeys.insert(MenuKind::Main, HotKeyCombo { key_code: KEY_V, modifiers: CMD_KEY | SHIFT_KEY });
    hotkeys.insert(MenuKind::History, HotKeyCombo { key_code: KEY_V, modifiers: CMD_KEY | CONTROL_KEY });
    hotkeys.insert(MenuKind::Snippet, HotKeyCombo { key_code: KEY_B, modifiers: CMD_KEY | SHIFT_KEY });
    hotkeys
}

// ─────────────────────────────────────────────────────────────────────────────
// STORE
// ─────────────────────────────────────────────────────────────────────────────

/// Shared, file-backed preferences.
///
/// `path == None` keeps everything in memory (tests, previews).
pub struct PreferencesStore {
    path: Option<PathBuf>,
    current: RwLock<Preferences>,
}

impl PreferencesStore {
    /// Load from `dir/preferences.json`. A missing file yields defaults; a
    /// corrupt one is logged and replaced by defaults on next save.
    pub fn load(dir: &Path) -> Self {
        let path = dir.join(PREFERENCES_FILE);
        let current = match fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice::<Preferences>(&bytes) {
                Ok(prefs) => prefs,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "preferences unreadable, using defaults");
                    Preferences::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Preferences::default(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "preferences unreadable, using defaults");
                Preferences::default()
            }
        };
        Self {
            path: Some(path),
            current: RwLock::new(current),
        }
    }

    pub fn in_memory(prefs: Preferences) -> Self {
        Self {
            path: None,
            current: RwLock::new(prefs),
        }
    }

    /// Snapshot of the current values
    pub fn get(&self) -> Preferences {
        self.current.read().clone()
    }

    /// Mutate and persist. The in-memory value is only replaced once the
    /// file write succeeded.
    pub fn update<F>(&self, mutate: F) -> Result<Preferences, PreferencesError>
    where
        F: FnOnce(&mut Preferences),
    {
        let mut guard = self.current.write();
        let mut next = guard.clone();
        mutate(&mut next);
        if let Some(path) = &self.path {
            write_atomically(path, &serde_json::to_vec_pretty(&next)?)?;
        }
        *guard = next.clone();
        Ok(next)
    }
}

fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), PreferencesError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}
