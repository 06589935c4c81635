//! In-process `Pasteboard` implementation.
//!
//! Backs tests, the command-line tool and any host without a system
//! pasteboard. Writes replace the whole contents and bump the change count,
//! matching how the system pasteboard behaves on `clearContents` + write.

use crate::interface::Pasteboard;
use parking_lot::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PasteboardValue {
    Text(String),
    Data(Vec<u8>),
    List(Vec<String>),
    /// Type declared with no readable payload (source-app marker types)
    Marker,
}

#[derive(Debug, Default)]
pub struct MemoryPasteboard {
    state: Mutex<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    change_count: i64,
    entries: Vec<(String, PasteboardValue)>,
}

impl MemoryPasteboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the contents (declared in the given order) and bump the counter
    pub fn write(&self, entries: Vec<(&str, PasteboardValue)>) {
        let mut state = self.state.lock();
        state.change_count += 1;
        state.entries = entries
            .into_iter()
            .map(|(ty, value)| (ty.to_string(), value))
            .collect();
    }

    pub fn write_string(&self, value: &str) {
        self.write(vec![("public.utf8-plain-text", PasteboardValue::Text(value.to_string()))]);
    }

    fn value(&self, pasteboard_type: &str) -> Option<PasteboardValue> {
        self.state
            .lock()
            .entries
            .iter()
            .find(|(ty, _)| ty == pasteboard_type)
            .map(|(_, value)| value.clone())
    }
}

impl Pasteboard for MemoryPasteboard {
    fn change_count(&self) -> i64 {
        self.state.lock().change_count
    }

    fn types(&self) -> Vec<String> {
        self.state.lock().entries.iter().map(|(ty, _)| ty.clone()).collect()
    }

    fn string_for_type(&self, pasteboard_type: String) -> Option<String> {
        match self.value(&pasteboard_type)? {
            PasteboardValue::Text(text) => Some(text),
            PasteboardValue::Data(bytes) => String::from_utf8(bytes).ok(),
            _ => None,
        }
    }

    fn data_for_type(&self, pasteboard_type: String) -> Option<Vec<u8>> {
        match self.value(&pasteboard_type)? {
            PasteboardValue::Data(bytes) => Some(bytes),
            PasteboardValue::Text(text) => Some(text.into_bytes()),
            _ => None,
        }
    }

    fn string_list_for_type(&self, pasteboard_type: String) -> Option<Vec<String>> {
        match self.value(&pasteboard_type)? {
            PasteboardValue::List(list) => Some(list),
            _ => None,
        }
    }
}
