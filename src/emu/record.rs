//! EMu record tree
//!
//! An exported EMu entity is a nested structure of atoms (scalar text),
//! tuples (nested records) and tables (repeating groups). Foreign entities
//! such as a parent unit or an accession lot are embedded inline as value
//! copies, so walking "up" the hierarchy means reading nested tuples.

use indexmap::IndexMap;

use crate::error::{AppError, AppResult};

/// Suffix EMu uses for repeating-group (table) fields
pub const TABLE_SUFFIX: &str = "_tab";

/// Field holding the embedded parent record
pub const PARENT_REF: &str = "AssParentObjectRef";

/// Sub-fields projected out of a repeating group
pub type Projection = IndexMap<String, Option<String>>;

/// A field value in an EMu record
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// A single atom
    Scalar(String),
    /// A repeating simple field (`Foo_tab` holding `Foo` atoms)
    List(Vec<String>),
    /// A nested tuple
    Node(EmuRecord),
    /// A table of nested tuples
    Nodes(Vec<EmuRecord>),
}

/// One exported EMu entity
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EmuRecord {
    fields: IndexMap<String, Value>,
}

/// Whether a field name denotes a repeating group
pub fn is_repeating(name: &str) -> bool {
    name.ends_with(TABLE_SUFFIX)
}

/// Atom name used inside a simple table (`EADSubject_tab` -> `EADSubject`)
pub fn table_stem(name: &str) -> &str {
    name.strip_suffix(TABLE_SUFFIX).unwrap_or(name)
}

impl EmuRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a field. Repeating-group names are always stored as lists.
    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        let value = if is_repeating(&name) {
            match value {
                Value::Scalar(s) => Value::List(vec![s]),
                Value::Node(r) => Value::Nodes(vec![r]),
                other => other,
            }
        } else {
            value
        };
        self.fields.insert(name, value);
    }

    /// Builder-style scalar insert
    pub fn with(mut self, name: &str, value: &str) -> Self {
        self.insert(name, Value::Scalar(value.to_string()));
        self
    }

    /// Builder-style nested insert
    pub fn with_value(mut self, name: &str, value: Value) -> Self {
        self.insert(name, value);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Iterate over fields in export order
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Raw field value
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Record identifier
    pub fn irn(&self) -> Option<&str> {
        self.get("irn")
    }

    /// First non-empty scalar at a dot-separated path.
    ///
    /// Only the record itself (and the nested tuples named by the path) is
    /// searched; referenced parents are not consulted.
    pub fn get(&self, path: &str) -> Option<&str> {
        let mut current = self;
        let mut segments = path.split('.').peekable();
        while let Some(segment) = segments.next() {
            let value = current.fields.get(segment)?;
            if segments.peek().is_none() {
                return match value {
                    Value::Scalar(s) => non_empty(s),
                    Value::List(items) => items.iter().find_map(|s| non_empty(s)),
                    _ => None,
                };
            }
            current = match value {
                Value::Node(r) => r,
                Value::Nodes(rs) => rs.first()?,
                _ => return None,
            };
        }
        None
    }

    /// Nested tuple (or the first row of a nested table)
    pub fn node(&self, name: &str) -> Option<&EmuRecord> {
        match self.fields.get(name)? {
            Value::Node(r) => Some(r),
            Value::Nodes(rs) => rs.first(),
            _ => None,
        }
    }

    /// All rows of a nested group; a single tuple counts as one row
    pub fn nodes(&self, name: &str) -> &[EmuRecord] {
        match self.fields.get(name) {
            Some(Value::Node(r)) => std::slice::from_ref(r),
            Some(Value::Nodes(rs)) => rs,
            _ => &[],
        }
    }

    /// Non-empty values of a repeating simple field
    pub fn list(&self, name: &str) -> Vec<&str> {
        match self.fields.get(name) {
            Some(Value::List(items)) => items.iter().filter_map(|s| non_empty(s)).collect(),
            Some(Value::Scalar(s)) => non_empty(s).into_iter().collect(),
            Some(Value::Nodes(rows)) => {
                let stem = table_stem(name);
                rows.iter().filter_map(|r| r.get(stem)).collect()
            }
            _ => Vec::new(),
        }
    }

    /// First occurrence of a simple field anywhere in the record
    pub fn find(&self, name: &str) -> Option<&str> {
        self.find_all(name).into_iter().next()
    }

    /// Every occurrence of a simple field anywhere in the record, in export
    /// order, including inside nested tuples and tables
    pub fn find_all(&self, name: &str) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect(name, true, &mut out);
        out
    }

    fn collect<'a>(&'a self, name: &str, into_parents: bool, out: &mut Vec<&'a str>) {
        for (key, value) in &self.fields {
            match value {
                Value::Scalar(s) if key == name => out.extend(non_empty(s)),
                Value::List(items) if table_stem(key) == name => {
                    out.extend(items.iter().filter_map(|s| non_empty(s)))
                }
                Value::Node(r) if into_parents || key != PARENT_REF => {
                    r.collect(name, into_parents, out)
                }
                Value::Nodes(rs) if into_parents || key != PARENT_REF => {
                    for r in rs {
                        r.collect(name, into_parents, out);
                    }
                }
                _ => {}
            }
        }
    }

    /// Look a field up locally, then in nested tuples other than the parent
    /// reference
    pub fn lookup(&self, name: &str) -> Option<&str> {
        self.get(name).or_else(|| {
            let mut out = Vec::new();
            self.collect(name, false, &mut out);
            out.into_iter().next()
        })
    }

    /// Walk a repeating relationship group, projecting only `fields` from
    /// each row
    pub fn find_in_group(&self, group: &str, fields: &[&str]) -> Vec<Projection> {
        self.nodes(group)
            .iter()
            .map(|row| {
                fields
                    .iter()
                    .map(|f| (f.to_string(), row.lookup(f).map(String::from)))
                    .collect()
            })
            .collect()
    }

    /// Embedded parent chain, nearest first
    pub fn ancestors(&self) -> Vec<&EmuRecord> {
        let mut chain = Vec::new();
        let mut current = self.node(PARENT_REF);
        while let Some(parent) = current {
            chain.push(parent);
            current = parent.node(PARENT_REF);
        }
        chain
    }

    /// Copy a scalar into another field and blank the source
    pub fn migrate_field(&mut self, source: &str, dest: &str) -> AppResult<()> {
        let value = match self.fields.get(source) {
            Some(Value::Scalar(s)) => s.clone(),
            Some(_) => {
                return Err(AppError::Validation(format!(
                    "field {} is not a scalar and cannot be migrated",
                    source
                )))
            }
            None => {
                return Err(AppError::Validation(format!(
                    "field {} is not present in record",
                    source
                )))
            }
        };
        self.insert(dest, Value::Scalar(value));
        self.fields
            .insert(source.to_string(), Value::Scalar(String::new()));
        Ok(())
    }

    /// Append to a repeating field, or add a new line to a text field
    pub fn merge_field(&mut self, name: &str, value: &str) {
        if let Some(Value::List(items)) = self.fields.get_mut(name) {
            items.push(value.to_string());
            return;
        }
        if !is_repeating(name) {
            if let Some(Value::Scalar(s)) = self.fields.get_mut(name) {
                if !s.is_empty() {
                    s.push('\n');
                    s.push_str(value);
                    return;
                }
            }
        }
        self.insert(name, Value::Scalar(value.to_string()));
    }

    /// Flat `a.b.c` view of the record, duplicate keys joined with `|`
    pub fn flatten(&self) -> IndexMap<String, String> {
        let mut row: IndexMap<String, String> = IndexMap::new();
        self.flatten_into("", &mut row);
        row
    }

    fn flatten_into(&self, prefix: &str, row: &mut IndexMap<String, String>) {
        for (key, value) in &self.fields {
            let full = if prefix.is_empty() {
                key.clone()
            } else {
                format!("{}.{}", prefix, key)
            };
            match value {
                Value::Scalar(s) => push_flat(row, full, s),
                Value::List(items) => {
                    for item in items {
                        push_flat(row, full.clone(), item);
                    }
                }
                Value::Node(r) => r.flatten_into(&full, row),
                Value::Nodes(rs) => {
                    for r in rs {
                        r.flatten_into(&full, row);
                    }
                }
            }
        }
    }
}

fn push_flat(row: &mut IndexMap<String, String>, key: String, value: &str) {
    match row.get_mut(&key) {
        Some(existing) if !existing.is_empty() => {
            existing.push('|');
            existing.push_str(value);
        }
        _ => {
            row.insert(key, value.to_string());
        }
    }
}

fn non_empty(s: &str) -> Option<&str> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}
