//! ReCollect import templates
//!
//! Each template is a CSV file whose header row is the authoritative,
//! ordered field list for that node type.

use std::path::Path;

use indexmap::IndexMap;

use crate::config::TemplatesConfig;
use crate::error::{AppError, AppResult};

/// A named target schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    pub name: String,
    pub fields: Vec<String>,
    /// Rows per output spreadsheet
    pub row_limit: usize,
}

impl Template {
    pub fn new(name: &str, fields: Vec<String>, row_limit: usize) -> Self {
        Self {
            name: name.to_lowercase(),
            fields,
            row_limit: row_limit.max(1),
        }
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f == field)
    }
}

/// Difference between a template header and a reference header
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderIssue {
    Misplaced {
        field: String,
        column: usize,
        expected_column: usize,
    },
    Unknown(String),
    Missing(String),
}

impl std::fmt::Display for HeaderIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HeaderIssue::Misplaced { field, column, expected_column } => write!(
                f,
                "Field {} is at column {} but should be at column {}",
                field, column, expected_column
            ),
            HeaderIssue::Unknown(field) => write!(f, "Field {} is not in base template", field),
            HeaderIssue::Missing(field) => write!(f, "Field {} is missing from template", field),
        }
    }
}

/// Immutable set of templates loaded once at start-up
#[derive(Debug, Clone, Default)]
pub struct TemplateStore {
    templates: IndexMap<String, Template>,
}

impl TemplateStore {
    pub fn new(templates: impl IntoIterator<Item = Template>) -> Self {
        Self {
            templates: templates.into_iter().map(|t| (t.name.clone(), t)).collect(),
        }
    }

    /// Load every `*.csv` template in a directory
    pub fn load(config: &TemplatesConfig) -> AppResult<Self> {
        Self::load_dir(&config.dir, config)
    }

    pub fn load_dir(dir: &Path, config: &TemplatesConfig) -> AppResult<Self> {
        let mut templates = Vec::new();
        let mut entries: Vec<_> = std::fs::read_dir(dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.extension()
                    .map(|ext| ext.eq_ignore_ascii_case("csv"))
                    .unwrap_or(false)
            })
            .collect();
        entries.sort();

        for path in entries {
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let fields = read_header(&path)?;
            tracing::debug!("Adding template {} ({} fields)", stem, fields.len());
            templates.push(Template::new(stem, fields, config.row_limit_for(stem)));
        }

        tracing::info!("Loaded {} templates from {}", templates.len(), dir.display());
        Ok(Self::new(templates))
    }

    /// Look a template up by (case-insensitive) name
    pub fn get(&self, name: &str) -> AppResult<&Template> {
        self.templates
            .get(&name.to_lowercase())
            .ok_or_else(|| AppError::TemplateNotFound(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(String::as_str)
    }

    /// Compare a template's header against a base template
    pub fn compare(base: &Template, other: &Template) -> Vec<HeaderIssue> {
        let mut issues = Vec::new();
        for (column, field) in other.fields.iter().enumerate() {
            match base.fields.iter().position(|f| f == field) {
                Some(expected_column) if expected_column != column => {
                    issues.push(HeaderIssue::Misplaced {
                        field: field.clone(),
                        column,
                        expected_column,
                    })
                }
                Some(_) => {}
                None => issues.push(HeaderIssue::Unknown(field.clone())),
            }
        }
        for field in &base.fields {
            if !other.has_field(field) {
                issues.push(HeaderIssue::Missing(field.clone()));
            }
        }
        issues
    }
}

/// Read only the header row of a CSV template
pub fn read_header(path: &Path) -> AppResult<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;
    let fields = reader
        .headers()?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .filter(|h| !h.is_empty())
        .collect();
    Ok(fields)
}
