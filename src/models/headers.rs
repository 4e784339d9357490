//! Ordered multimap of HTTP headers.
//!
//! curl semantics require more than a plain map: repeated `-H` flags with the
//! same name all reach the wire (`Set-Cookie`, `Link`), insertion order is
//! preserved end-to-end, and name comparison is case-insensitive while the
//! stored spelling is kept as the user wrote it.

use serde::{Deserialize, Serialize};

/// An ordered, case-insensitive HTTP header multimap.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    /// Creates an empty header map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a header, preserving any existing entries with the same name.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// Replaces all entries with the given name by a single one. The new
    /// entry takes the position of the first replaced entry, or the end if
    /// the name was absent.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let position = self
            .entries
            .iter()
            .position(|(n, _)| n.eq_ignore_ascii_case(name));
        self.remove(name);
        let entry = (name.to_string(), value.into());
        match position {
            Some(index) => self.entries.insert(index, entry),
            None => self.entries.push(entry),
        }
    }

    /// Removes every entry with the given name, returning how many were
    /// removed.
    pub fn remove(&mut self, name: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
        before - self.entries.len()
    }

    /// First value for the given name, if any.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Every value for the given name, in insertion order.
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// Whether any entry has the given name.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Iterates `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'a> IntoIterator for &'a Headers {
    type Item = (&'a str, &'a str);
    type IntoIter = Box<dyn Iterator<Item = (&'a str, &'a str)> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str())))
    }
}

impl FromIterator<(String, String)> for Headers {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_preserves_duplicates_and_order() {
        let mut headers = Headers::new();
        headers.append("Link", "a");
        headers.append("Accept", "text/plain");
        headers.append("Link", "b");

        assert_eq!(headers.get_all("link"), vec!["a", "b"]);
        let order: Vec<_> = headers.iter().map(|(n, _)| n).collect();
        assert_eq!(order, vec!["Link", "Accept", "Link"]);
    }

    #[test]
    fn test_case_insensitive_lookup_keeps_spelling() {
        let mut headers = Headers::new();
        headers.append("Content-Type", "application/json");

        assert_eq!(headers.get("content-type"), Some("application/json"));
        assert_eq!(headers.iter().next(), Some(("Content-Type", "application/json")));
    }

    #[test]
    fn test_set_replaces_all_entries_in_place() {
        let mut headers = Headers::new();
        headers.append("Accept", "a");
        headers.append("X-Other", "o");
        headers.append("accept", "b");

        headers.set("Accept", "c");
        assert_eq!(headers.get_all("accept"), vec!["c"]);
        let order: Vec<_> = headers.iter().map(|(n, _)| n).collect();
        assert_eq!(order, vec!["Accept", "X-Other"]);
    }

    #[test]
    fn test_remove_returns_count() {
        let mut headers = Headers::new();
        headers.append("Set-Cookie", "a=1");
        headers.append("set-cookie", "b=2");

        assert_eq!(headers.remove("SET-COOKIE"), 2);
        assert!(headers.is_empty());
        assert_eq!(headers.remove("Set-Cookie"), 0);
    }
}
