use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::Value;

/// One output row: column names mapped to values, in projection order.
///
/// Inserting a name that is already present replaces its value but keeps its
/// original position, so unaliased columns that collide across joined tables
/// resolve last-writer-wins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultRow {
    entries: Vec<(String, Value)>,
}

impl ResultRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// JSON object text with keys sorted, e.g. `{"age":3,"name":"Ollie"}`.
    ///
    /// Two rows holding the same values under the same names have the same
    /// canonical form whatever their column order.
    pub fn canonical(&self) -> String {
        let mut entries: Vec<&(String, Value)> = self.entries.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        let body = entries
            .iter()
            .map(|(name, value)| {
                let key = serde_json::to_string(name).unwrap_or_default();
                format!("{key}:{}", value.canonical())
            })
            .collect::<Vec<_>>()
            .join(",");
        format!("{{{body}}}")
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for ResultRow {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        let mut row = Self::new();
        for (name, value) in iter {
            row.insert(name, value);
        }
        row
    }
}

impl Serialize for ResultRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}
