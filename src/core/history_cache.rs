//! Per-chat cache of fetched history.
//!
//! Earlier revisions kept ad-hoc maps of chat history scattered through the
//! view code; this component gives the calling layer one explicit owner with
//! a get/set/invalidate contract. The streaming core never touches it.

use std::collections::HashMap;

use crate::api::HistoryEntry;

#[derive(Debug, Default)]
pub struct HistoryCache {
    entries: HashMap<i64, Vec<HistoryEntry>>,
}

impl HistoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, chat_id: i64) -> Option<&[HistoryEntry]> {
        self.entries.get(&chat_id).map(Vec::as_slice)
    }

    pub fn set(&mut self, chat_id: i64, history: Vec<HistoryEntry>) {
        self.entries.insert(chat_id, history);
    }

    /// Extend a cached history. A miss is ignored: appending to a chat we
    /// never fetched would make a partial list look complete.
    pub fn append(&mut self, chat_id: i64, entry: HistoryEntry) {
        if let Some(history) = self.entries.get_mut(&chat_id) {
            history.push(entry);
        }
    }

    pub fn invalidate(&mut self, chat_id: i64) {
        self.entries.remove(&chat_id);
    }

    pub fn invalidate_all(&mut self) {
        self.entries.clear();
    }
}
