//! Collaborators shared by the services, bundled per environment.
//!
//! Services never reach for globals: they hold an `EnvironmentStack` and
//! resolve `current()` per operation. Tests push a replacement environment
//! (in-memory database, fake pasteboard, manual clock) and pop it when the
//! returned guard drops.

use crate::database::{Database, DatabaseResult};
use crate::interface::Pasteboard;
use crate::preferences::{Preferences, PreferencesStore};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

pub const DATABASE_FILE: &str = "shelf.sqlite";
const HISTORY_DIR: &str = "history";
const THUMBNAIL_DIR: &str = "thumbnails";

// ─────────────────────────────────────────────────────────────────────────────
// CLOCK
// ─────────────────────────────────────────────────────────────────────────────

pub trait Clock: Send + Sync {
    /// Seconds since the Unix epoch
    fn now_unix(&self) -> i64;
}

#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_unix(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// Clock that only moves when told to
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(start: i64) -> Self {
        Self { now: AtomicI64::new(start) }
    }

    pub fn set(&self, now: i64) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, seconds: i64) -> i64 {
        self.now.fetch_add(seconds, Ordering::SeqCst) + seconds
    }
}

impl Clock for ManualClock {
    fn now_unix(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// PATHS
// ─────────────────────────────────────────────────────────────────────────────

/// Layout of the application-support directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupportPaths {
    root: PathBuf,
}

impl SupportPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn database(&self) -> PathBuf {
        self.root.join(DATABASE_FILE)
    }

    /// Directory holding `<uuid>.data` payload files
    pub fn history_dir(&self) -> PathBuf {
        self.root.join(HISTORY_DIR)
    }

    pub fn thumbnail_dir(&self) -> PathBuf {
        self.root.join(THUMBNAIL_DIR)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ENVIRONMENT
// ─────────────────────────────────────────────────────────────────────────────

pub struct Environment {
    pub database: Arc<Database>,
    pub pasteboard: Arc<dyn Pasteboard>,
    pub preferences: Arc<PreferencesStore>,
    pub clock: Arc<dyn Clock>,
    pub paths: SupportPaths,
}

impl Environment {
    /// Production wiring rooted at `support_dir`. Opening the database is
    /// the only failure treated as fatal.
    pub fn open(support_dir: impl Into<PathBuf>, pasteboard: Arc<dyn Pasteboard>) -> DatabaseResult<Self> {
        let paths = SupportPaths::new(support_dir);
        std::fs::create_dir_all(paths.root())?;
        let database = Database::open(paths.database())?;
        let preferences = PreferencesStore::load(paths.root());
        Ok(Self {
            database: Arc::new(database),
            pasteboard,
            preferences: Arc::new(preferences),
            clock: Arc::new(SystemClock),
            paths,
        })
    }

    /// In-memory database and preferences; payload files still go under
    /// `support_dir`.
    pub fn in_memory(
        support_dir: impl Into<PathBuf>,
        pasteboard: Arc<dyn Pasteboard>,
        preferences: Preferences,
        clock: Arc<dyn Clock>,
    ) -> DatabaseResult<Self> {
        Ok(Self {
            database: Arc::new(Database::open_in_memory()?),
            pasteboard,
            preferences: Arc::new(PreferencesStore::in_memory(preferences)),
            clock,
            paths: SupportPaths::new(support_dir),
        })
    }
}

/// Stack of swappable environments; the bottom entry is permanent.
pub struct EnvironmentStack {
    stack: Mutex<Vec<Arc<Environment>>>,
}

impl EnvironmentStack {
    pub fn new(base: Environment) -> Self {
        Self {
            stack: Mutex::new(vec![Arc::new(base)]),
        }
    }

    pub fn current(&self) -> Arc<Environment> {
        let stack = self.stack.lock();
        // The base entry is never popped, so the stack is never empty
        Arc::clone(&stack[stack.len() - 1])
    }

    pub fn depth(&self) -> usize {
        self.stack.lock().len()
    }

    /// Push an environment; it stays current until the guard drops.
    pub fn push(&self, env: Environment) -> EnvironmentGuard<'_> {
        self.stack.lock().push(Arc::new(env));
        EnvironmentGuard { stack: self }
    }

    /// Pop the top environment. Returns None when only the base remains.
    pub fn pop(&self) -> Option<Arc<Environment>> {
        let mut stack = self.stack.lock();
        if stack.len() > 1 {
            stack.pop()
        } else {
            None
        }
    }
}

/// Pops its environment when dropped
#[must_use = "the pushed environment is popped as soon as the guard drops"]
pub struct EnvironmentGuard<'a> {
    stack: &'a EnvironmentStack,
}

impl Drop for EnvironmentGuard<'_> {
    fn drop(&mut self) {
        self.stack.pop();
    }
}
