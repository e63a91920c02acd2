use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatEntry {
    pub id: i64,
    pub title: String,
}

/// Chats announced by the client, keyed by id. Written by the update
/// dispatcher, read by the main flow.
#[derive(Clone, Default)]
pub struct ChatRegistry {
    chats: Arc<RwLock<BTreeMap<i64, ChatEntry>>>,
}

impl ChatRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, id: i64, title: String) {
        self.chats
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, ChatEntry { id, title });
    }

    /// Returns false when the chat has not been announced yet.
    pub fn set_title(&self, id: i64, title: String) -> bool {
        let mut chats = self.chats.write().unwrap_or_else(PoisonError::into_inner);
        match chats.get_mut(&id) {
            Some(entry) => {
                entry.title = title;
                true
            }
            None => false,
        }
    }

    #[cfg(test)]
    pub fn get(&self, id: i64) -> Option<ChatEntry> {
        self.chats
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }

    /// Case-insensitive substring match; lowest chat id wins when several match.
    pub fn find_by_name(&self, name: &str) -> Option<ChatEntry> {
        let needle = name.to_lowercase();
        self.chats
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .find(|entry| entry.title.to_lowercase().contains(&needle))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.chats.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> Vec<ChatEntry> {
        self.chats
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ChatRegistry {
        let registry = ChatRegistry::new();
        registry.insert(1, "Family Group".to_string());
        registry.insert(2, "Work Chat".to_string());
        registry
    }

    #[test]
    fn finds_by_case_insensitive_substring() {
        let registry = sample();
        assert_eq!(registry.find_by_name("family").map(|chat| chat.id), Some(1));
        assert_eq!(registry.find_by_name("WORK").map(|chat| chat.id), Some(2));
        assert_eq!(registry.find_by_name("chat").map(|chat| chat.id), Some(2));
        assert!(registry.find_by_name("xyz").is_none());
    }

    #[test]
    fn first_match_is_lowest_id() {
        let registry = sample();
        registry.insert(0, "Old Family Photos".to_string());
        assert_eq!(registry.find_by_name("family").map(|chat| chat.id), Some(0));
    }

    #[test]
    fn title_updates_only_touch_known_chats() {
        let registry = sample();
        assert!(registry.set_title(2, "Office".to_string()));
        assert!(!registry.set_title(3, "Ghost".to_string()));
        assert_eq!(registry.get(2).map(|chat| chat.title), Some("Office".to_string()));
        assert!(registry.get(3).is_none());
        assert!(registry.find_by_name("work").is_none());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn clones_share_state_across_threads() {
        let registry = ChatRegistry::new();
        let writer = registry.clone();
        std::thread::spawn(move || {
            for id in 0..50 {
                writer.insert(id, format!("chat {id}"));
            }
        })
        .join()
        .expect("writer thread");
        assert_eq!(registry.len(), 50);
        assert_eq!(registry.snapshot().first().map(|chat| chat.id), Some(0));
    }
}
