//! Shelf Core - Rust business logic for a menu-bar clipboard manager
//!
//! This library owns everything behind the status-bar menu: clipboard
//! polling and capture, the bounded clip history, the snippet folder tree,
//! the application denylist, XML import/export and the menu model. The
//! native shell supplies pasteboard access and hotkey registration through
//! foreign traits.
//!
//! Types are exported via UniFFI proc-macros (#[derive(uniffi::Record/Enum)]).

pub mod clip_store;
pub mod database;
pub mod environment;
pub mod exclusion;
pub mod hotkey;
pub mod interface;
pub mod logging;
pub mod menu;
pub mod models;
pub mod normalizer;
pub mod pasteboard;
pub mod poller;
pub mod preferences;
pub mod snippets;
mod store;
pub mod xml;

pub use interface::*;
pub use store::ShelfStore;

uniffi::setup_scaffolding!("shelf");
