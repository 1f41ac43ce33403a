//! EMu audit log index
//!
//! The audit export is a CSV (usually UTF-16LE) with one row per change,
//! keyed by the record's irn in the `AudKey` column.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Column holding the audited record's irn
pub const AUDIT_KEY: &str = "AudKey";

/// Audit rows grouped by record irn
#[derive(Debug, Clone, Default)]
pub struct AuditLogIndex {
    fieldnames: Vec<String>,
    entries: HashMap<String, Vec<Vec<String>>>,
}

impl AuditLogIndex {
    /// Load an audit export from disk
    pub fn load(path: &Path) -> AppResult<Self> {
        let bytes = std::fs::read(path)?;
        let index = Self::from_text(&decode_text(&bytes))?;
        tracing::info!(
            "Loaded audit log {} ({} records)",
            path.display(),
            index.entries.len()
        );
        Ok(index)
    }

    pub fn from_text(text: &str) -> AppResult<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(text.as_bytes());
        let fieldnames: Vec<String> = reader.headers()?.iter().map(String::from).collect();
        let key_column = fieldnames
            .iter()
            .position(|f| f == AUDIT_KEY)
            .ok_or_else(|| AppError::Validation(format!("audit log has no {} column", AUDIT_KEY)))?;

        let mut entries: HashMap<String, Vec<Vec<String>>> = HashMap::new();
        for record in reader.records() {
            let record = record?;
            let Some(key) = record.get(key_column) else {
                continue;
            };
            entries
                .entry(key.to_string())
                .or_default()
                .push(record.iter().map(String::from).collect());
        }

        Ok(Self { fieldnames, entries })
    }

    pub fn fieldnames(&self) -> &[String] {
        &self.fieldnames
    }

    /// Change entries for one record, oldest first
    pub fn entries_for(&self, irn: &str) -> &[Vec<String>] {
        self.entries.get(irn).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Write `<irn>.csv` with the record's audit trail, if it has one
    pub fn write_record_log(&self, irn: &str, out_dir: &Path) -> AppResult<Option<PathBuf>> {
        let rows = self.entries_for(irn);
        if rows.is_empty() {
            return Ok(None);
        }
        let path = out_dir.join(format!("{}.csv", irn));
        let mut writer = csv::Writer::from_path(&path)?;
        writer.write_record(&self.fieldnames)?;
        for row in rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        Ok(Some(path))
    }
}

/// Decode an export that may be UTF-16 (with or without BOM) or UTF-8
pub fn decode_text(bytes: &[u8]) -> String {
    let utf16 = |body: &[u8], little: bool| -> String {
        let units: Vec<u16> = body
            .chunks_exact(2)
            .map(|pair| {
                if little {
                    u16::from_le_bytes([pair[0], pair[1]])
                } else {
                    u16::from_be_bytes([pair[0], pair[1]])
                }
            })
            .collect();
        String::from_utf16_lossy(&units)
    };

    match bytes {
        [0xFF, 0xFE, rest @ ..] => utf16(rest, true),
        [0xFE, 0xFF, rest @ ..] => utf16(rest, false),
        [0xEF, 0xBB, 0xBF, rest @ ..] => String::from_utf8_lossy(rest).into_owned(),
        [first, 0, ..] if *first != 0 => utf16(bytes, true),
        _ => String::from_utf8_lossy(bytes).into_owned(),
    }
}
