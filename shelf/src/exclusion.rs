//! Denylist of source applications whose copies are never recorded.
//!
//! Detection is marker-based only: an entry matches when its marker type is
//! among the pasteboard's declared types. The frontmost application is never
//! consulted, so a denylisted app that writes no marker is still recorded.

use crate::environment::EnvironmentStack;
use crate::interface::{ExcludedApplication, ShelfError};
use std::sync::Arc;
use tracing::{debug, info};

/// Apps known to tag their writes with a marker other than their bundle id
const KNOWN_MARKERS: &[(&str, &str)] = &[
    ("com.agilebits.onepassword", "com.agilebits.onepassword"),
    ("com.1password.1password", "com.agilebits.onepassword"),
    ("org.keepassxc.keepassxc", "org.nspasteboard.ConcealedType"),
];

/// Pasteboard type whose presence identifies a copy from `app`
pub fn marker_type(app: &ExcludedApplication) -> &str {
    KNOWN_MARKERS
        .iter()
        .find(|(prefix, _)| app.identifier.starts_with(prefix))
        .map(|(_, marker)| *marker)
        .unwrap_or(app.identifier.as_str())
}

pub struct ExcludeAppFilter {
    stack: Arc<EnvironmentStack>,
}

impl ExcludeAppFilter {
    pub fn new(stack: Arc<EnvironmentStack>) -> Self {
        Self { stack }
    }

    pub fn applications(&self) -> Vec<ExcludedApplication> {
        self.stack.current().preferences.get().excluded_applications.applications
    }

    /// True when any denylisted app's marker is among `declared_types`
    pub fn is_excluded(&self, declared_types: &[String]) -> bool {
        let excluded = self
            .applications()
            .into_iter()
            .find(|app| declared_types.iter().any(|ty| ty == marker_type(app)));
        match excluded {
            Some(app) => {
                debug!(app = %app.identifier, "copy from excluded application");
                true
            }
            None => false,
        }
    }

    /// Check the current pasteboard contents
    pub fn is_pasteboard_excluded(&self) -> bool {
        let types = self.stack.current().pasteboard.types();
        self.is_excluded(&types)
    }

    /// Append `app` unless an equal entry already exists. Returns whether it
    /// was added.
    pub fn add(&self, app: ExcludedApplication) -> Result<bool, ShelfError> {
        let env = self.stack.current();
        let mut added = false;
        env.preferences.update(|prefs| {
            let list = &mut prefs.excluded_applications.applications;
            if !list.contains(&app) {
                list.push(app.clone());
                added = true;
            }
        })?;
        if added {
            info!(app = %app.identifier, "application excluded");
        }
        Ok(added)
    }

    /// Remove the entry at `index`
    pub fn delete(&self, index: usize) -> Result<ExcludedApplication, ShelfError> {
        let env = self.stack.current();
        let mut removed = None;
        env.preferences.update(|prefs| {
            let list = &mut prefs.excluded_applications.applications;
            if index < list.len() {
                removed = Some(list.remove(index));
            }
        })?;
        removed.ok_or_else(|| ShelfError::InvalidInput(format!("no excluded application at index {}", index)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::{Environment, ManualClock};
    use crate::pasteboard::MemoryPasteboard;
    use crate::preferences::Preferences;

    fn app(identifier: &str, name: &str) -> ExcludedApplication {
        ExcludedApplication {
            identifier: identifier.into(),
            name: name.into(),
        }
    }

    fn filter() -> (tempfile::TempDir, ExcludeAppFilter) {
        let dir = tempfile::tempdir().unwrap();
        let env = Environment::in_memory(
            dir.path(),
            Arc::new(MemoryPasteboard::new()),
            Preferences::default(),
            Arc::new(ManualClock::new(0)),
        )
        .unwrap();
        (dir, ExcludeAppFilter::new(Arc::new(EnvironmentStack::new(env))))
    }

    #[test]
    fn test_marker_table() {
        assert_eq!(marker_type(&app("com.agilebits.onepassword7", "1Password 7")), "com.agilebits.onepassword");
        assert_eq!(marker_type(&app("com.example.vault", "Vault")), "com.example.vault");
    }

    #[test]
    fn test_marker_presence_decides() {
        let (_dir, filter) = filter();
        filter.add(app("com.agilebits.onepassword7", "1Password 7")).unwrap();

        let with_marker = vec!["public.utf8-plain-text".to_string(), "com.agilebits.onepassword".to_string()];
        let without_marker = vec!["public.utf8-plain-text".to_string()];
        assert!(filter.is_excluded(&with_marker));
        assert!(!filter.is_excluded(&without_marker));
    }

    #[test]
    fn test_add_rejects_structural_duplicates() {
        let (_dir, filter) = filter();
        assert!(filter.add(app("com.example.app", "Example")).unwrap());
        assert!(!filter.add(app("com.example.app", "Example")).unwrap());
        // Same bundle id under a new display name is a distinct entry
        assert!(filter.add(app("com.example.app", "Example Renamed")).unwrap());
        assert_eq!(filter.applications().len(), 2);
    }

    #[test]
    fn test_delete_by_index() {
        let (_dir, filter) = filter();
        filter.add(app("a", "A")).unwrap();
        filter.add(app("b", "B")).unwrap();
        assert_eq!(filter.delete(0).unwrap(), app("a", "A"));
        assert_eq!(filter.applications(), vec![app("b", "B")]);
        assert!(matches!(filter.delete(5), Err(ShelfError::InvalidInput(_))));
    }
}
