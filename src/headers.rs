//! Order-preserving header maps and fingerprint-safe merging.
//!
//! Header order is part of the browser fingerprint, so headers are kept in
//! an insertion-ordered map end to end. Merging overwrites a value in
//! place, keeping the position of the earlier layer for unmodified keys.

use indexmap::IndexMap;

/// Insertion-ordered header map with case-insensitive keys.
///
/// Keys keep the casing they were first inserted with; lookups and
/// overwrites are case-insensitive.
#[derive(Debug, Clone, Default)]
pub struct OrderedHeaders {
    entries: IndexMap<String, (String, String)>,
}

impl OrderedHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a header, preserving the original position and
    /// casing when the key already exists.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let key = name.to_ascii_lowercase();
        match self.entries.get_mut(&key) {
            Some((_, existing)) => *existing = value.into(),
            None => {
                self.entries.insert(key, (name, value.into()));
            }
        }
    }

    /// Append without overwriting; a duplicate key keeps the first value.
    pub fn insert_if_absent(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let key = name.to_ascii_lowercase();
        self.entries.entry(key).or_insert((name, value.into()));
    }

    /// Look up a header value case-insensitively.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .get(&name.to_ascii_lowercase())
            .map(|(_, v)| v.as_str())
    }

    /// Whether a header is present.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&name.to_ascii_lowercase())
    }

    /// Remove a header, returning its value.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.entries
            .shift_remove(&name.to_ascii_lowercase())
            .map(|(_, v)| v)
    }

    /// Overlay another layer: later layer wins on value, earlier layer wins
    /// on position for keys present in both.
    pub fn merge(&mut self, overlay: &OrderedHeaders) {
        for (name, value) in overlay.iter() {
            self.insert(name, value);
        }
    }

    /// Reorder to match an explicit name order. Named headers come first in
    /// the given order; the rest keep their relative order after them.
    pub fn apply_order(&mut self, order: &[String]) {
        let mut reordered: IndexMap<String, (String, String)> = IndexMap::new();
        for name in order {
            let key = name.to_ascii_lowercase();
            if let Some(entry) = self.entries.shift_remove(&key) {
                reordered.insert(key, entry);
            }
        }
        for (key, entry) in self.entries.drain(..) {
            reordered.insert(key, entry);
        }
        self.entries = reordered;
    }

    /// Iterate `(name, value)` pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.values().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Number of headers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Owned `(name, value)` pairs in order.
    pub fn to_vec(&self) -> Vec<(String, String)> {
        self.entries
            .values()
            .map(|(n, v)| (n.clone(), v.clone()))
            .collect()
    }
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, V)> for OrderedHeaders {
    fn from_iter<T: IntoIterator<Item = (N, V)>>(iter: T) -> Self {
        let mut headers = Self::new();
        for (n, v) in iter {
            headers.insert(n, v);
        }
        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overwrite_keeps_position_of_first_layer() {
        let mut h = OrderedHeaders::new();
        h.insert("User-Agent", "profile-ua");
        h.insert("Accept", "*/*");
        h.insert("user-agent", "override-ua");

        let pairs: Vec<_> = h.iter().collect();
        assert_eq!(pairs[0], ("User-Agent", "override-ua"));
        assert_eq!(pairs[1], ("Accept", "*/*"));
    }

    #[test]
    fn merge_precedence_later_wins() {
        let profile: OrderedHeaders =
            [("User-Agent", "profile"), ("Accept", "text/html")].into_iter().collect();
        let session: OrderedHeaders = [("X-Session", "1")].into_iter().collect();
        let call: OrderedHeaders =
            [("Accept", "application/json"), ("X-Call", "2")].into_iter().collect();

        let mut merged = profile.clone();
        merged.merge(&session);
        merged.merge(&call);

        assert_eq!(merged.get("accept"), Some("application/json"));
        let names: Vec<_> = merged.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["User-Agent", "Accept", "X-Session", "X-Call"]);
    }

    #[test]
    fn explicit_order_is_applied() {
        let mut h: OrderedHeaders = [("A", "1"), ("B", "2"), ("C", "3")].into_iter().collect();
        h.apply_order(&["c".to_string(), "a".to_string()]);
        let names: Vec<_> = h.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["C", "A", "B"]);
    }
}
