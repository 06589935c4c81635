//! Global hotkeys that pop up the main, history and snippet menus.
//!
//! Combos live in preferences; the OS registration goes through the host's
//! `HotKeyRegistrar`.

use crate::environment::EnvironmentStack;
use crate::interface::{HotKeyCombo, HotKeyRegistrar, MenuKind, ShelfError};
use std::sync::Arc;
use tracing::{info, warn};

pub struct HotKeyService {
    stack: Arc<EnvironmentStack>,
    registrar: Arc<dyn HotKeyRegistrar>,
}

impl HotKeyService {
    pub fn new(stack: Arc<EnvironmentStack>, registrar: Arc<dyn HotKeyRegistrar>) -> Self {
        Self { stack, registrar }
    }

    pub fn combo(&self, kind: MenuKind) -> Option<HotKeyCombo> {
        self.stack.current().preferences.get().hotkeys.get(&kind).copied()
    }

    /// Register every configured combo. Returns the menus the OS refused.
    pub fn register_all(&self) -> Vec<MenuKind> {
        let hotkeys = self.stack.current().preferences.get().hotkeys;
        let refused: Vec<MenuKind> = hotkeys
            .into_iter()
            .filter(|(kind, combo)| !self.registrar.register(*kind, *combo))
            .map(|(kind, _)| kind)
            .collect();
        for kind in &refused {
            warn!(?kind, "hotkey registration refused");
        }
        refused
    }

    pub fn unregister_all(&self) {
        for kind in self.stack.current().preferences.get().hotkeys.keys() {
            self.registrar.unregister(*kind);
        }
    }

    /// Replace (or with `None`, clear) the combo for `kind`. The new combo is
    /// persisted even if the OS refuses it; the return value says whether it
    /// is active.
    pub fn set_combo(&self, kind: MenuKind, combo: Option<HotKeyCombo>) -> Result<bool, ShelfError> {
        self.stack.current().preferences.update(|prefs| match combo {
            Some(combo) => {
                prefs.hotkeys.insert(kind, combo);
            }
            None => {
                prefs.hotkeys.remove(&kind);
            }
        })?;

        self.registrar.unregister(kind);
        let active = match combo {
            Some(combo) => self.registrar.register(kind, combo),
            None => false,
        };
        info!(?kind, ?combo, active, "hotkey changed");
        Ok(active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::{Environment, ManualClock};
    use crate::pasteboard::MemoryPasteboard;
    use crate::preferences::Preferences;
    use parking_lot::Mutex;
    use std::collections::BTreeMap;

    #[derive(Default)]
    struct RecordingRegistrar {
        active: Mutex<BTreeMap<MenuKind, HotKeyCombo>>,
        refuse: Option<MenuKind>,
    }

    impl HotKeyRegistrar for RecordingRegistrar {
        fn register(&self, kind: MenuKind, combo: HotKeyCombo) -> bool {
            if self.refuse == Some(kind) {
                return false;
            }
            self.active.lock().insert(kind, combo);
            true
        }

        fn unregister(&self, kind: MenuKind) {
            self.active.lock().remove(&kind);
        }
    }

    fn service(registrar: Arc<RecordingRegistrar>) -> (tempfile::TempDir, HotKeyService) {
        let dir = tempfile::tempdir().unwrap();
        let env = Environment::in_memory(
            dir.path(),
            Arc::new(MemoryPasteboard::new()),
            Preferences::default(),
            Arc::new(ManualClock::new(0)),
        )
        .unwrap();
        (dir, HotKeyService::new(Arc::new(EnvironmentStack::new(env)), registrar))
    }

    #[test]
    fn test_register_all_reports_refusals() {
        let registrar = Arc::new(RecordingRegistrar {
            refuse: Some(MenuKind::Snippet),
            ..Default::default()
        });
        let (_dir, service) = service(registrar.clone());

        assert_eq!(service.register_all(), vec![MenuKind::Snippet]);
        assert_eq!(registrar.active.lock().len(), 2);

        service.unregister_all();
        assert!(registrar.active.lock().is_empty());
    }

    #[test]
    fn test_set_combo_persists_and_rebinds() {
        let registrar = Arc::new(RecordingRegistrar::default());
        let (_dir, service) = service(registrar.clone());
        let combo = HotKeyCombo { key_code: 0, modifiers: 1 << 8 };

        assert!(service.set_combo(MenuKind::History, Some(combo)).unwrap());
        assert_eq!(service.combo(MenuKind::History), Some(combo));
        assert_eq!(registrar.active.lock().get(&MenuKind::History), Some(&combo));

        assert!(!service.set_combo(MenuKind::History, None).unwrap());
        assert_eq!(service.combo(MenuKind::History), None);
        assert!(registrar.active.lock().get(&MenuKind::History).is_none());
    }
}
