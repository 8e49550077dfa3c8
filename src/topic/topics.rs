//! The topics-level table.

use crate::identifier::TopicId;

/// Mapping from declaration key to topic, in insertion order.
///
/// Order matters for the source-scan fallback, which returns the first key
/// containing the scanned attribute name.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TopicsLevel {
    entries: Vec<(String, TopicId)>,
}

impl TopicsLevel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace `key`; a replaced key keeps its position.
    pub fn insert(&mut self, key: impl Into<String>, topic: impl Into<TopicId>) {
        let key = key.into();
        let topic = topic.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == key) {
            Some(entry) => entry.1 = topic,
            None => self.entries.push((key, topic)),
        }
    }

    #[must_use]
    pub fn with(mut self, key: impl Into<String>, topic: impl Into<TopicId>) -> Self {
        self.insert(key, topic);
        self
    }

    /// Exact key lookup.
    pub fn get(&self, key: &str) -> Option<&TopicId> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, topic)| topic)
    }

    /// First topic whose key contains `fragment`.
    pub fn find_containing(&self, fragment: &str) -> Option<&TopicId> {
        if fragment.is_empty() {
            return None;
        }
        self.entries
            .iter()
            .find(|(key, _)| key.contains(fragment))
            .map(|(_, topic)| topic)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TopicId)> {
        self.entries.iter().map(|(key, topic)| (key.as_str(), topic))
    }
}

impl<K: Into<String>, T: Into<TopicId>> FromIterator<(K, T)> for TopicsLevel {
    fn from_iter<I: IntoIterator<Item = (K, T)>>(iter: I) -> Self {
        let mut table = Self::new();
        for (key, topic) in iter {
            table.insert(key, topic);
        }
        table
    }
}
