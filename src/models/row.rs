//! Target row model
//!
//! A row is an ordered mapping from ReCollect field name to value, built
//! from exactly one EMu record.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;

/// Publicly displayable files
pub const ASSETS: &str = "ASSETS";
/// Internal-only files (audit snapshots, unpublished finding aids)
pub const ATTACHMENTS: &str = "ATTACHMENTS";
/// Marks a record's media as not publicly displayable
pub const REDACT: &str = "#REDACT";
/// Free-text notes about digitisation problems
pub const DIGITISATION_NOTES: &str = "Digitisation Notes";

/// Delimiter for values of `#`-prefixed multi-value fields
pub const GROUP_DELIMITER: &str = "#ng#";
/// Delimiter for ordinary repeating fields
pub const LIST_DELIMITER: &str = "|";

/// A single cell value
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RowValue {
    #[default]
    Empty,
    Text(String),
    List(Vec<String>),
    Paths(Vec<PathBuf>),
}

impl RowValue {
    /// Whether the value renders as an empty cell
    pub fn is_blank(&self) -> bool {
        match self {
            RowValue::Empty => true,
            RowValue::Text(s) => s.is_empty(),
            RowValue::List(items) => items.iter().all(String::is_empty),
            RowValue::Paths(paths) => paths.is_empty(),
        }
    }

    /// Collapse into a spreadsheet cell; blank values become a true empty
    pub fn to_cell(&self, key: &str) -> Option<String> {
        let text = match self {
            RowValue::Empty => return None,
            RowValue::Text(s) => s.clone(),
            RowValue::List(items) => {
                let delimiter = if key.starts_with('#') {
                    GROUP_DELIMITER
                } else {
                    LIST_DELIMITER
                };
                items
                    .iter()
                    .filter(|s| !s.is_empty())
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(delimiter)
            }
            RowValue::Paths(paths) => paths
                .iter()
                .map(|p| p.to_string_lossy().replace('\\', "/"))
                .collect::<Vec<_>>()
                .join(LIST_DELIMITER),
        };
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

impl From<String> for RowValue {
    fn from(v: String) -> Self {
        RowValue::Text(v)
    }
}

impl From<&str> for RowValue {
    fn from(v: &str) -> Self {
        RowValue::Text(v.to_string())
    }
}

impl From<Option<String>> for RowValue {
    fn from(v: Option<String>) -> Self {
        v.map(RowValue::Text).unwrap_or_default()
    }
}

impl From<Option<&str>> for RowValue {
    fn from(v: Option<&str>) -> Self {
        v.map(RowValue::from).unwrap_or_default()
    }
}

impl From<Vec<String>> for RowValue {
    fn from(v: Vec<String>) -> Self {
        RowValue::List(v)
    }
}

impl From<Vec<&str>> for RowValue {
    fn from(v: Vec<&str>) -> Self {
        RowValue::List(v.into_iter().map(String::from).collect())
    }
}

impl From<Vec<PathBuf>> for RowValue {
    fn from(v: Vec<PathBuf>) -> Self {
        RowValue::Paths(v)
    }
}

/// A migrated record ready for a template
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Row {
    values: IndexMap<String, RowValue>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field, replacing any previous value
    pub fn set(&mut self, key: &str, value: impl Into<RowValue>) {
        self.values.insert(key.to_string(), value.into());
    }

    /// Set several fields from another row, later values winning
    pub fn merge(&mut self, other: Row) {
        for (key, value) in other.values {
            self.values.insert(key, value);
        }
    }

    pub fn get(&self, key: &str) -> Option<&RowValue> {
        self.values.get(key)
    }

    /// Text value of a field, if it is a non-empty scalar
    pub fn text(&self, key: &str) -> Option<&str> {
        match self.values.get(key) {
            Some(RowValue::Text(s)) if !s.is_empty() => Some(s.as_str()),
            _ => None,
        }
    }

    /// Text value used to sort and match rows
    pub fn sort_key(&self, key: &str) -> String {
        self.values
            .get(key)
            .and_then(|v| v.to_cell(key))
            .unwrap_or_default()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<RowValue> {
        self.values.shift_remove(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RowValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// File list held by an asset-carrying field
    pub fn paths(&self, key: &str) -> &[PathBuf] {
        match self.values.get(key) {
            Some(RowValue::Paths(paths)) => paths,
            _ => &[],
        }
    }

    /// Append a file to an asset-carrying field
    pub fn push_path(&mut self, key: &str, path: impl AsRef<Path>) {
        let path = path.as_ref().to_path_buf();
        match self.values.get_mut(key) {
            Some(RowValue::Paths(paths)) => paths.push(path),
            _ => {
                self.values.insert(key.to_string(), RowValue::Paths(vec![path]));
            }
        }
    }

    /// Append a line to a text field
    pub fn append_line(&mut self, key: &str, line: &str) {
        let value = match self.text(key) {
            Some(existing) => format!("{}\n{}", existing, line),
            None => line.to_string(),
        };
        self.set(key, value);
    }

    /// Reorder to exactly `fields`, adding empty cells for missing fields.
    /// Callers check that the row holds no keys outside `fields` first.
    pub fn ordered(mut self, fields: &[String]) -> Row {
        let values = fields
            .iter()
            .map(|f| {
                let value = self.values.shift_remove(f).unwrap_or_default();
                (f.clone(), value)
            })
            .collect();
        Row { values }
    }

    /// Keys that are not in `fields`
    pub fn unknown_keys(&self, fields: &[String]) -> Vec<String> {
        self.values
            .keys()
            .filter(|k| !fields.iter().any(|f| f == *k))
            .cloned()
            .collect()
    }
}
