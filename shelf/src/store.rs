//! ShelfStore - Main API for Swift interop
//!
//! One object owns the environment stack and every service built on it.
//! All calls are synchronous and short; the only background work is the
//! polling timer, which runs on the caller's tokio runtime when there is one
//! and on a process-wide fallback runtime otherwise.

use crate::clip_store::{ClipStore, CreateOutcome};
use crate::environment::{Environment, EnvironmentStack};
use crate::exclusion::ExcludeAppFilter;
use crate::hotkey::HotKeyService;
use crate::interface::{
    ClipContent, ClipRecord, ClipType, ExcludedApplication, Folder, HotKeyCombo, HotKeyRegistrar, MenuKind,
    Pasteboard, ShelfError, Snippet,
};
use crate::logging::init_logging;
use crate::menu::{flatten, MenuBuilder, MenuEntry};
use crate::models::ClipData;
use crate::poller::{ClipboardPoller, PollingTimer, TickOutcome};
use crate::preferences::Preferences;
use crate::snippets::{deep_copy, DragPayload, SnippetTree};
use crate::xml;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Global fallback Tokio runtime for when the polling timer is started
/// outside any runtime context (UniFFI calls come in on plain threads).
static FALLBACK_RUNTIME: Lazy<tokio::runtime::Runtime> = Lazy::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .thread_name("shelf-poller")
        .enable_all()
        .build()
        .expect("Failed to create fallback tokio runtime")
});

/// Clipboard history and snippet store
///
/// Concurrency Model:
/// - Database uses an r2d2 connection pool; each call is its own transaction
/// - Poller state sits behind a mutex, so host-driven `poll` calls and the
///   timer never capture the same change twice
#[derive(uniffi::Object)]
pub struct ShelfStore {
    stack: Arc<EnvironmentStack>,
    poller: Arc<ClipboardPoller>,
    snippets: SnippetTree,
    exclusions: ExcludeAppFilter,
    timer: Mutex<Option<PollingTimer>>,
    hotkeys: Mutex<Option<HotKeyService>>,
}

// Internal implementation (not exported via FFI)
impl ShelfStore {
    /// Build a store over an already-assembled environment (tests, CLI)
    pub fn with_environment(env: Environment) -> Self {
        let stack = Arc::new(EnvironmentStack::new(env));
        Self {
            poller: Arc::new(ClipboardPoller::new(Arc::clone(&stack))),
            snippets: SnippetTree::new(Arc::clone(&stack)),
            exclusions: ExcludeAppFilter::new(Arc::clone(&stack)),
            stack,
            timer: Mutex::new(None),
            hotkeys: Mutex::new(None),
        }
    }

    /// The environment stack; push onto it to swap collaborators
    pub fn environments(&self) -> &Arc<EnvironmentStack> {
        &self.stack
    }

    pub fn preferences(&self) -> Preferences {
        self.stack.current().preferences.get()
    }

    pub fn update_preferences<F>(&self, mutate: F) -> Result<Preferences, ShelfError>
    where
        F: FnOnce(&mut Preferences),
    {
        let prefs = self.stack.current().preferences.update(mutate)?;
        // A lowered cap takes effect immediately
        let env = self.stack.current();
        ClipStore::new(&env).trim(prefs.max_history_size)?;
        Ok(prefs)
    }

    pub fn poll(&self) -> TickOutcome {
        self.poller.tick()
    }

    /// Store a snapshot directly, bypassing the pasteboard
    pub fn add_clip_data(&self, data: &ClipData) -> Result<CreateOutcome, ShelfError> {
        let env = self.stack.current();
        ClipStore::new(&env).create(data)
    }

    /// Get a tokio runtime handle - uses current runtime if available, otherwise global fallback
    fn runtime_handle(&self) -> tokio::runtime::Handle {
        tokio::runtime::Handle::try_current().unwrap_or_else(|_| FALLBACK_RUNTIME.handle().clone())
    }

    fn drag_payload(bytes: &[u8]) -> Result<DragPayload, ShelfError> {
        Ok(DragPayload::decode(bytes)?)
    }
}

// FFI-exported constructor (must be in standalone impl block)
#[uniffi::export]
impl ShelfStore {
    /// Open (or create) the store rooted at `support_dir`. Failing to open
    /// the database is the one unrecoverable startup error.
    #[uniffi::constructor]
    pub fn new(support_dir: String, pasteboard: Arc<dyn Pasteboard>) -> Result<Self, ShelfError> {
        init_logging();
        let env = Environment::open(PathBuf::from(&support_dir), pasteboard)?;
        info!(support_dir = %support_dir, "shelf store opened");
        Ok(Self::with_environment(env))
    }
}

// Polling
#[uniffi::export]
impl ShelfStore {
    /// Run one poll synchronously. Returns true when a clip was stored.
    pub fn poll_once(&self) -> bool {
        matches!(self.poll(), TickOutcome::Captured(CreateOutcome::Inserted(_) | CreateOutcome::Overwritten(_)))
    }

    /// Start the background timer at the configured interval (restarts it
    /// if already running)
    pub fn start_polling(&self) {
        let interval = Duration::from_millis(self.preferences().polling_interval_ms);
        let timer = PollingTimer::start(Arc::clone(&self.poller), interval, &self.runtime_handle());
        if let Some(previous) = self.timer.lock().replace(timer) {
            previous.stop();
        }
    }

    pub fn stop_polling(&self) {
        if let Some(timer) = self.timer.lock().take() {
            timer.stop();
        }
    }

    pub fn is_polling(&self) -> bool {
        self.timer.lock().as_ref().map_or(false, |t| t.is_running())
    }

    pub fn set_polling_enabled(&self, enabled: bool) {
        self.poller.set_enabled(enabled);
    }

    pub fn system_will_sleep(&self) {
        self.poller.pause();
    }

    pub fn system_did_wake(&self) {
        self.poller.resume();
    }
}

// History
#[uniffi::export]
impl ShelfStore {
    /// All clips in the configured sort order
    pub fn clips(&self) -> Result<Vec<ClipRecord>, ShelfError> {
        let env = self.stack.current();
        let order = env.preferences.get().history_sort_order;
        ClipStore::new(&env).list(order, None)
    }

    pub fn add_clip(&self, content: ClipContent) -> Result<Option<ClipRecord>, ShelfError> {
        let outcome = self.add_clip_data(&ClipData::from(content))?;
        Ok(outcome.record().cloned())
    }

    /// Payload of a clip; `None` when the record or its file is gone
    pub fn clip_content(&self, data_hash: String) -> Option<ClipContent> {
        let env = self.stack.current();
        ClipStore::new(&env).read(&data_hash).map(|data| data.to_content())
    }

    /// Payload for pasting. Moves the clip to the top of the history when
    /// "reorder clips after pasting" is on.
    pub fn select_clip(&self, data_hash: String) -> Result<Option<ClipContent>, ShelfError> {
        let env = self.stack.current();
        let store = ClipStore::new(&env);
        let data = match store.read(&data_hash) {
            Some(data) => data,
            None => return Ok(None),
        };
        if env.preferences.get().reorder_clips_after_pasting {
            store.touch(&data_hash)?;
        }
        Ok(Some(data.to_content()))
    }

    pub fn delete_clip(&self, data_hash: String) -> Result<bool, ShelfError> {
        let env = self.stack.current();
        ClipStore::new(&env).delete(&data_hash)
    }

    pub fn clear_history(&self) -> Result<u64, ShelfError> {
        let env = self.stack.current();
        Ok(ClipStore::new(&env).clear_all()? as u64)
    }

    pub fn max_history_size(&self) -> u32 {
        self.preferences().max_history_size as u32
    }

    pub fn set_max_history_size(&self, size: u32) -> Result<(), ShelfError> {
        self.update_preferences(|p| p.max_history_size = size as usize)?;
        Ok(())
    }

    pub fn set_store_type_enabled(&self, clip_type: ClipType, enabled: bool) -> Result<(), ShelfError> {
        self.update_preferences(|p| p.store_types.set(clip_type, enabled))?;
        Ok(())
    }

    /// Full preferences as JSON, for the settings window
    pub fn preferences_json(&self) -> Result<String, ShelfError> {
        serde_json::to_string(&self.preferences()).map_err(|e| ShelfError::InvalidInput(e.to_string()))
    }

    pub fn set_preferences_json(&self, json: String) -> Result<(), ShelfError> {
        let next: Preferences = serde_json::from_str(&json).map_err(|e| ShelfError::InvalidInput(e.to_string()))?;
        self.update_preferences(|p| *p = next)?;
        Ok(())
    }
}

// Snippets
#[uniffi::export]
impl ShelfStore {
    pub fn folders(&self) -> Result<Vec<Folder>, ShelfError> {
        self.snippets.load_folders()
    }

    pub fn create_folder(&self) -> Result<Folder, ShelfError> {
        self.snippets.create()
    }

    pub fn deep_copy_folder(&self, folder: Folder) -> Folder {
        deep_copy(&folder)
    }

    pub fn merge_folder(&self, folder: Folder) -> Result<Folder, ShelfError> {
        self.snippets.merge(&folder)
    }

    pub fn remove_folder(&self, folder: Folder) -> Result<(), ShelfError> {
        self.snippets.remove(&folder)
    }

    /// Assign `index = position` and persist; returns the renumbered list
    pub fn rearrange_folders(&self, folders: Vec<Folder>) -> Result<Vec<Folder>, ShelfError> {
        let mut folders = folders;
        self.snippets.rearrange_index(&mut folders)?;
        Ok(folders)
    }

    pub fn rename_folder(&self, identifier: String, title: String) -> Result<Folder, ShelfError> {
        self.snippets.rename_folder(&identifier, &title)
    }

    pub fn set_folder_enabled(&self, identifier: String, enable: bool) -> Result<Folder, ShelfError> {
        self.snippets.set_folder_enabled(&identifier, enable)
    }

    pub fn create_snippet(&self, folder: Folder) -> Snippet {
        self.snippets.create_snippet(&folder)
    }

    pub fn merge_snippet(&self, folder: Folder, snippet: Snippet) -> Result<Folder, ShelfError> {
        self.snippets.merge_snippet(&folder, &snippet)
    }

    pub fn insert_snippet(&self, folder: Folder, snippet: Snippet, at: u32) -> Result<Option<Folder>, ShelfError> {
        self.snippets.insert_snippet(&folder, &snippet, at as usize)
    }

    pub fn remove_snippet(&self, folder: Folder, snippet: Snippet) -> Result<Folder, ShelfError> {
        self.snippets.remove_snippet(&folder, &snippet)
    }

    pub fn delete_snippet(&self, snippet: Snippet) -> Result<bool, ShelfError> {
        self.snippets.delete_snippet(&snippet)
    }

    pub fn rename_snippet(&self, identifier: String, title: String) -> Result<Snippet, ShelfError> {
        self.snippets.rename_snippet(&identifier, &title)
    }

    pub fn update_snippet_content(&self, identifier: String, content: String) -> Result<Snippet, ShelfError> {
        self.snippets.update_snippet_content(&identifier, &content)
    }

    pub fn set_snippet_enabled(&self, identifier: String, enable: bool) -> Result<Snippet, ShelfError> {
        self.snippets.set_snippet_enabled(&identifier, enable)
    }

    /// Drag pasteboard data for a folder row
    pub fn folder_drag_payload(&self, identifier: String) -> Vec<u8> {
        DragPayload::folder(identifier).encode()
    }

    /// Drag pasteboard data for a snippet row
    pub fn snippet_drag_payload(&self, identifier: String, folder_identifier: String) -> Vec<u8> {
        DragPayload::snippet(identifier, folder_identifier).encode()
    }

    /// Returns false for drops that would not move anything
    pub fn move_folder(&self, payload: Vec<u8>, to_index: u32) -> Result<bool, ShelfError> {
        self.snippets.move_folder(&Self::drag_payload(&payload)?, to_index as usize)
    }

    pub fn move_snippet(&self, payload: Vec<u8>, to_folder: String, to_index: u32) -> Result<bool, ShelfError> {
        self.snippets
            .move_snippet(&Self::drag_payload(&payload)?, &to_folder, to_index as usize)
    }
}

// Excluded applications
#[uniffi::export]
impl ShelfStore {
    pub fn excluded_applications(&self) -> Vec<ExcludedApplication> {
        self.exclusions.applications()
    }

    pub fn add_excluded_application(&self, app: ExcludedApplication) -> Result<bool, ShelfError> {
        self.exclusions.add(app)
    }

    pub fn delete_excluded_application(&self, index: u32) -> Result<ExcludedApplication, ShelfError> {
        self.exclusions.delete(index as usize)
    }

    /// Whether the current pasteboard contents come from a denylisted app
    pub fn is_pasteboard_excluded(&self) -> bool {
        self.exclusions.is_pasteboard_excluded()
    }
}

// Import / export
#[uniffi::export]
impl ShelfStore {
    pub fn export_snippets_xml(&self) -> Result<String, ShelfError> {
        xml::export_snippets(&self.snippets)
    }

    pub fn import_snippets_xml(&self, xml: String) -> Result<u32, ShelfError> {
        Ok(xml::import_snippets(&self.snippets, &xml)? as u32)
    }

    pub fn export_history_xml(&self) -> Result<String, ShelfError> {
        let env = self.stack.current();
        xml::export_history(&ClipStore::new(&env))
    }

    pub fn import_history_xml(&self, xml: String) -> Result<u32, ShelfError> {
        let env = self.stack.current();
        Ok(xml::import_history(&ClipStore::new(&env), &xml)? as u32)
    }
}

// Menus and hotkeys
#[uniffi::export]
impl ShelfStore {
    /// Flattened menu rows for `kind`, built from current history and snippets
    pub fn menu(&self, kind: MenuKind) -> Result<Vec<MenuEntry>, ShelfError> {
        let prefs = self.preferences();
        let clips = match kind {
            MenuKind::Snippet => Vec::new(),
            _ => self.clips()?,
        };
        let folders = match kind {
            MenuKind::History => Vec::new(),
            _ => self.folders()?,
        };
        Ok(flatten(&MenuBuilder::new(prefs.menu).build(kind, &clips, &folders)))
    }

    /// Hand over the OS hotkey service and register every configured combo.
    /// Returns the menus whose combos were refused.
    pub fn register_hotkeys(&self, registrar: Arc<dyn HotKeyRegistrar>) -> Vec<MenuKind> {
        let mut hotkeys = self.hotkeys.lock();
        if let Some(previous) = hotkeys.take() {
            previous.unregister_all();
        }
        let service = HotKeyService::new(Arc::clone(&self.stack), registrar);
        let refused = service.register_all();
        *hotkeys = Some(service);
        refused
    }

    pub fn hotkey(&self, kind: MenuKind) -> Option<HotKeyCombo> {
        self.preferences().hotkeys.get(&kind).copied()
    }

    pub fn set_hotkey(&self, kind: MenuKind, combo: Option<HotKeyCombo>) -> Result<bool, ShelfError> {
        match self.hotkeys.lock().as_ref() {
            Some(service) => service.set_combo(kind, combo),
            None => Err(ShelfError::NotInitialized),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::ManualClock;
    use crate::pasteboard::MemoryPasteboard;
    use std::collections::BTreeMap;

    fn store() -> (tempfile::TempDir, Arc<MemoryPasteboard>, Arc<ManualClock>, ShelfStore) {
        let dir = tempfile::tempdir().unwrap();
        let pasteboard = Arc::new(MemoryPasteboard::new());
        let clock = Arc::new(ManualClock::new(1_000));
        let env = Environment::in_memory(dir.path(), pasteboard.clone(), Preferences::default(), clock.clone()).unwrap();
        (dir, pasteboard, clock, ShelfStore::with_environment(env))
    }

    #[test]
    fn test_poll_and_select_reorders() {
        let (_dir, pasteboard, clock, store) = store();

        pasteboard.write_string("first");
        assert!(store.poll_once());
        clock.advance(10);
        pasteboard.write_string("second");
        assert!(store.poll_once());

        let clips = store.clips().unwrap();
        assert_eq!(clips[0].title, "second");

        clock.advance(10);
        let content = store.select_clip(clips[1].data_hash.clone()).unwrap().unwrap();
        assert_eq!(content.string_value, "first");
        assert_eq!(store.clips().unwrap()[0].title, "first");
    }

    #[test]
    fn test_select_without_reorder_keeps_order() {
        let (_dir, _pasteboard, clock, store) = store();
        store.update_preferences(|p| p.reorder_clips_after_pasting = false).unwrap();
        store.add_clip_data(&ClipData::from_string("a")).unwrap();
        clock.advance(1);
        store.add_clip_data(&ClipData::from_string("b")).unwrap();

        let oldest = store.clips().unwrap()[1].data_hash.clone();
        clock.advance(1);
        store.select_clip(oldest).unwrap();
        assert_eq!(store.clips().unwrap()[0].title, "b");
    }

    #[test]
    fn test_lowering_cap_trims_immediately() {
        let (_dir, _pasteboard, clock, store) = store();
        for i in 0..5 {
            clock.advance(1);
            store.add_clip_data(&ClipData::from_string(format!("clip {}", i))).unwrap();
        }
        store.set_max_history_size(2).unwrap();
        let titles: Vec<_> = store.clips().unwrap().into_iter().map(|c| c.title).collect();
        assert_eq!(titles, vec!["clip 4", "clip 3"]);
    }

    #[test]
    fn test_menu_rows() {
        let (_dir, _pasteboard, _clock, store) = store();
        store.add_clip_data(&ClipData::from_string("hello")).unwrap();
        let folder = store.merge_folder(store.create_folder().unwrap()).unwrap();
        store.merge_snippet(folder.clone(), store.create_snippet(folder)).unwrap();

        let rows = store.menu(MenuKind::Snippet).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].title, "untitled folder");
        assert_eq!(rows[1].title, "untitled snippet");

        let history = store.menu(MenuKind::History).unwrap();
        assert!(history.iter().any(|r| r.title == "1. hello"));
    }

    #[test]
    fn test_set_hotkey_requires_registrar() {
        let (_dir, _pasteboard, _clock, store) = store();
        assert!(matches!(store.set_hotkey(MenuKind::Main, None), Err(ShelfError::NotInitialized)));
    }

    #[derive(Default)]
    struct ActiveRegistrar {
        active: Mutex<BTreeMap<MenuKind, HotKeyCombo>>,
    }

    impl HotKeyRegistrar for ActiveRegistrar {
        fn register(&self, kind: MenuKind, combo: HotKeyCombo) -> bool {
            self.active.lock().insert(kind, combo);
            true
        }

        fn unregister(&self, kind: MenuKind) {
            self.active.lock().remove(&kind);
        }
    }

    #[test]
    fn test_reregistering_same_registrar_keeps_hotkeys_active() {
        let (_dir, _pasteboard, _clock, store) = store();
        let registrar = Arc::new(ActiveRegistrar::default());
        let configured = store.preferences().hotkeys.len();
        assert!(configured > 0);

        assert!(store.register_hotkeys(registrar.clone()).is_empty());
        assert_eq!(registrar.active.lock().len(), configured);

        assert!(store.register_hotkeys(registrar.clone()).is_empty());
        assert_eq!(registrar.active.lock().len(), configured);
    }

    #[test]
    fn test_preferences_json_roundtrip() {
        let (_dir, _pasteboard, _clock, store) = store();
        let mut prefs = store.preferences();
        prefs.polling_interval_ms = 250;
        store.set_preferences_json(serde_json::to_string(&prefs).unwrap()).unwrap();
        assert_eq!(store.preferences().polling_interval_ms, 250);
        assert!(matches!(store.set_preferences_json("nope".into()), Err(ShelfError::InvalidInput(_))));
    }

    #[test]
    fn test_drag_through_ffi_bytes() {
        let (_dir, _pasteboard, _clock, store) = store();
        let a = store.merge_folder(store.create_folder().unwrap()).unwrap();
        let b = store.merge_folder(store.create_folder().unwrap()).unwrap();

        let payload = store.folder_drag_payload(b.identifier.clone());
        assert!(store.move_folder(payload, 0).unwrap());
        let order: Vec<_> = store.folders().unwrap().into_iter().map(|f| f.identifier).collect();
        assert_eq!(order, vec![b.identifier, a.identifier]);

        assert!(matches!(store.move_folder(b"[]".to_vec(), 0), Err(ShelfError::InvalidInput(_))));
    }
}
