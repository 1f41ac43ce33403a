//! ReCollect metadata report used as a lookup side-table
//!
//! Accessions are migrated before items; the exported report of already
//! imported accession nodes lets items name their accession.

use std::path::Path;

use indexmap::IndexMap;

use super::audit::decode_text;
use crate::error::{AppError, AppResult};

pub const NODE_ID: &str = "Node ID";
pub const NODE_TITLE: &str = "Node Title";

/// Rows of a ReCollect report keyed by column name
#[derive(Debug, Clone, Default)]
pub struct NodeReport {
    rows: Vec<IndexMap<String, String>>,
}

impl NodeReport {
    pub fn load(path: &Path) -> AppResult<Self> {
        let bytes = std::fs::read(path)?;
        let report = Self::from_text(&decode_text(&bytes))?;
        tracing::info!("Loaded {} report rows from {}", report.rows.len(), path.display());
        Ok(report)
    }

    pub fn from_text(text: &str) -> AppResult<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(text.as_bytes());
        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| match h {
                "Item ID" => NODE_ID.to_string(),
                "Item Title" => NODE_TITLE.to_string(),
                other => other.to_string(),
            })
            .collect();
        if !headers.iter().any(|h| h == NODE_ID) {
            return Err(AppError::Validation(format!(
                "report has no {} column",
                NODE_ID
            )));
        }

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            rows.push(
                headers
                    .iter()
                    .cloned()
                    .zip(record.iter().map(String::from))
                    .collect(),
            );
        }
        Ok(Self { rows })
    }

    /// All rows whose `field` equals `value`
    pub fn retrieve(&self, field: &str, value: &str) -> Vec<&IndexMap<String, String>> {
        self.rows
            .iter()
            .filter(|row| row.get(field).map(String::as_str) == Some(value))
            .collect()
    }

    /// Node titles of rows matching `field == value`
    pub fn titles(&self, field: &str, value: &str) -> Vec<&str> {
        self.retrieve(field, value)
            .into_iter()
            .filter_map(|row| row.get(NODE_TITLE).map(String::as_str))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_renames_item_columns() {
        let text = "Item ID,Item Title,EMu Accession Lot IRN\n5,[1990.0012] Registrar,301\n6,[1990.0013] Bursar,302\n";
        let report = NodeReport::from_text(text).unwrap();

        assert_eq!(report.titles("EMu Accession Lot IRN", "301"), vec!["[1990.0012] Registrar"]);
        assert_eq!(report.retrieve(NODE_ID, "6").len(), 1);
        assert!(report.titles("EMu Accession Lot IRN", "999").is_empty());
    }

    #[test]
    fn test_requires_node_id() {
        assert!(NodeReport::from_text("Title\nx\n").is_err());
    }
}
