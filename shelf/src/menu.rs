//! Platform-neutral status-bar menu model.
//!
//! The host turns `MenuEntry` rows into native menu items; everything about
//! layout (inline vs grouped history, numbering, truncation, placeholders)
//! is decided here.

use crate::interface::{ClipRecord, ClipType, Folder, MenuKind};
use crate::preferences::MenuSettings;

const ELLIPSIS: &str = "...";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuItem {
    Clip {
        title: String,
        data_hash: String,
        tooltip: Option<String>,
        image_path: Option<String>,
    },
    Snippet {
        title: String,
        identifier: String,
        tooltip: Option<String>,
    },
    Submenu {
        title: String,
        items: Vec<MenuItem>,
    },
    Separator,
    ClearHistory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum MenuEntryKind {
    Clip,
    Snippet,
    Submenu,
    Separator,
    ClearHistory,
}

/// One row of a flattened menu, pre-order. Rows following a `Submenu` with
/// a greater `depth` belong to it.
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Record)]
pub struct MenuEntry {
    pub kind: MenuEntryKind,
    pub depth: u32,
    pub title: String,
    /// Clip hash or snippet identifier
    pub target: Option<String>,
    pub tooltip: Option<String>,
    pub image_path: Option<String>,
}

/// Flatten a menu tree into pre-order rows
pub fn flatten(items: &[MenuItem]) -> Vec<MenuEntry> {
    let mut out = Vec::new();
    flatten_into(items, 0, &mut out);
    out
}

fn flatten_into(items: &[MenuItem], depth: u32, out: &mut Vec<MenuEntry>) {
    for item in items {
        let entry = |kind, title: &str, target: Option<&String>, tooltip: &Option<String>, image: &Option<String>| MenuEntry {
            kind,
            depth,
            title: title.to_string(),
            target: target.cloned(),
            tooltip: tooltip.clone(),
            image_path: image.clone(),
        };
        match item {
            MenuItem::Clip { title, data_hash, tooltip, image_path } => {
                out.push(entry(MenuEntryKind::Clip, title, Some(data_hash), tooltip, image_path));
            }
            MenuItem::Snippet { title, identifier, tooltip } => {
                out.push(entry(MenuEntryKind::Snippet, title, Some(identifier), tooltip, &None));
            }
            MenuItem::Submenu { title, items } => {
                out.push(entry(MenuEntryKind::Submenu, title, None, &None, &None));
                flatten_into(items, depth + 1, out);
            }
            MenuItem::Separator => out.push(entry(MenuEntryKind::Separator, "", None, &None, &None)),
            MenuItem::ClearHistory => out.push(entry(MenuEntryKind::ClearHistory, "", None, &None, &None)),
        }
    }
}

/// First line of `text`, trimmed and cut to `max_chars` with an ellipsis
pub fn truncate_title(text: &str, max_chars: usize) -> String {
    let line = text.trim().lines().next().unwrap_or_default().trim();
    if line.chars().count() <= max_chars {
        return line.to_string();
    }
    let mut out: String = line.chars().take(max_chars).collect();
    out.push_str(ELLIPSIS);
    out
}

pub struct MenuBuilder {
    settings: MenuSettings,
}

impl MenuBuilder {
    pub fn new(settings: MenuSettings) -> Self {
        Self { settings }
    }

    pub fn build(&self, kind: MenuKind, clips: &[ClipRecord], folders: &[Folder]) -> Vec<MenuItem> {
        match kind {
            MenuKind::Main => {
                let mut items = self.history_items(clips);
                let snippets = self.snippet_items(folders);
                if !snippets.is_empty() {
                    items.push(MenuItem::Separator);
                    items.extend(snippets);
                }
                self.append_clear_history(&mut items, clips);
                items
            }
            MenuKind::History => {
                let mut items = self.history_items(clips);
                self.append_clear_history(&mut items, clips);
                items
            }
            MenuKind::Snippet => self.snippet_items(folders),
        }
    }

    fn append_clear_history(&self, items: &mut Vec<MenuItem>, clips: &[ClipRecord]) {
        if self.settings.add_clear_history_menu_item && !clips.is_empty() {
            items.push(MenuItem::Separator);
            items.push(MenuItem::ClearHistory);
        }
    }

    /// The first `number_of_items_place_inline` clips go directly in the
    /// menu, the rest into "1 - 10" style groups
    pub fn history_items(&self, clips: &[ClipRecord]) -> Vec<MenuItem> {
        let inline = self.settings.number_of_items_place_inline.min(clips.len());
        let group_size = self.settings.number_of_items_place_inside_folder.max(1);
        let base = if self.settings.menu_item_index_starts_with_zero { 0 } else { 1 };

        let mut items: Vec<MenuItem> = clips[..inline]
            .iter()
            .enumerate()
            .map(|(i, clip)| self.clip_item(clip, i + base))
            .collect();

        for (group_index, group) in clips[inline..].chunks(group_size).enumerate() {
            let first = inline + group_index * group_size;
            let title = format!("{} - {}", first + base, first + group.len() - 1 + base);
            let children = group
                .iter()
                .enumerate()
                .map(|(i, clip)| self.clip_item(clip, first + i + base))
                .collect();
            items.push(MenuItem::Submenu { title, items: children });
        }
        items
    }

    fn clip_item(&self, clip: &ClipRecord, number: usize) -> MenuItem {
        let primary = ClipType::from_raw_value(&clip.primary_type);
        let (text, image_path) = match primary {
            Some(ClipType::Tiff) => (
                "(Image)".to_string(),
                clip.thumbnail_path.clone().filter(|_| self.settings.show_image_in_menu),
            ),
            Some(ClipType::Pdf) => ("(PDF)".to_string(), None),
            Some(ClipType::Filenames) if clip.title.trim().is_empty() => ("(Filenames)".to_string(), None),
            _ => (truncate_title(&clip.title, self.settings.max_menu_item_title_length), None),
        };
        let title = if self.settings.menu_item_title_add_index {
            format!("{}. {}", number, text)
        } else {
            text
        };
        MenuItem::Clip {
            title,
            data_hash: clip.data_hash.clone(),
            tooltip: self.tooltip(&clip.title),
            image_path,
        }
    }

    fn tooltip(&self, text: &str) -> Option<String> {
        if !self.settings.show_tooltip || text.trim().is_empty() {
            return None;
        }
        Some(text.chars().take(self.settings.max_tooltip_length).collect())
    }

    /// One submenu per enabled folder, listing its enabled snippets
    pub fn snippet_items(&self, folders: &[Folder]) -> Vec<MenuItem> {
        folders
            .iter()
            .filter(|folder| folder.enable)
            .map(|folder| MenuItem::Submenu {
                title: truncate_title(&folder.title, self.settings.max_menu_item_title_length),
                items: folder
                    .snippets
                    .iter()
                    .filter(|snippet| snippet.enable)
                    .map(|snippet| MenuItem::Snippet {
                        title: truncate_title(&snippet.title, self.settings.max_menu_item_title_length),
                        identifier: snippet.identifier.clone(),
                        tooltip: self.tooltip(&snippet.content),
                    })
                    .collect(),
            })
            .collect()
    }
}
