//! Batch accumulation and serialization
//!
//! Rows are collected per template, validated against the template's field
//! list and written out as fixed-size spreadsheets, each with a sibling
//! directory holding the batch's copied assets.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use rand::distributions::Alphanumeric;
use rand::Rng;

use super::media::{PdfMerger, TabularSink};
use crate::error::{AppError, AppResult};
use crate::models::report::NODE_TITLE;
use crate::models::row::{ASSETS, ATTACHMENTS, DIGITISATION_NOTES, LIST_DELIMITER};
use crate::models::{Row, RowValue, Template, TemplateStore};

/// Options for writing batches
#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub batch_id: String,
    /// Field to sort rows by before chunking
    pub sort_by: Option<String>,
}

impl BatchOptions {
    pub fn new(batch_id: impl Into<String>) -> Self {
        Self {
            batch_id: batch_id.into(),
            sort_by: None,
        }
    }

    pub fn sorted_by(mut self, field: &str) -> Self {
        self.sort_by = Some(field.to_string());
        self
    }
}

/// One written spreadsheet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
    pub template: String,
    pub chunk: usize,
    pub rows: usize,
    pub sheet: PathBuf,
    pub asset_dir: PathBuf,
}

/// Rows per template awaiting serialization
#[derive(Debug, Default)]
pub struct BatchAccumulator {
    templates: TemplateStore,
    rows: IndexMap<String, Vec<Row>>,
}

impl BatchAccumulator {
    pub fn new(templates: TemplateStore) -> Self {
        Self {
            templates,
            rows: IndexMap::new(),
        }
    }

    pub fn templates(&self) -> &TemplateStore {
        &self.templates
    }

    /// Add a row to a template.
    ///
    /// Fails if the row has fields outside the template. Returns `false`
    /// when an identical row is already present.
    pub fn add_row(&mut self, template: &str, row: Row) -> AppResult<bool> {
        let target = self.templates.get(template)?;
        let unknown = row.unknown_keys(&target.fields);
        if !unknown.is_empty() {
            return Err(AppError::UnknownFields {
                template: target.name.clone(),
                fields: unknown,
            });
        }

        let name = target.name.clone();
        let ordered = row.ordered(&target.fields);
        let rows = self.rows.entry(name.clone()).or_default();
        if rows.contains(&ordered) {
            tracing::info!(
                "{} is already in template {}",
                ordered.sort_key(NODE_TITLE),
                name
            );
            return Ok(false);
        }
        rows.push(ordered);
        Ok(true)
    }

    /// Remove and return the rows of a template whose fields equal every
    /// `(field, value)` pair
    pub fn pop_rows(&mut self, template: &str, criteria: &[(&str, &str)]) -> Vec<Row> {
        let Some(rows) = self.rows.get_mut(&template.to_lowercase()) else {
            return Vec::new();
        };
        let (matched, kept): (Vec<Row>, Vec<Row>) = std::mem::take(rows)
            .into_iter()
            .partition(|row| criteria.iter().all(|(field, value)| row.sort_key(field) == *value));
        *rows = kept;
        matched
    }

    pub fn rows(&self, template: &str) -> &[Row] {
        self.rows
            .get(&template.to_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Total rows held
    pub fn len(&self) -> usize {
        self.rows.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write every template's rows as `<template>_<batch_id>_<n>` batches and
    /// empty the accumulator. On error the rows of the failing template and
    /// every template after it stay in the accumulator.
    pub fn serialize(
        &mut self,
        out_dir: &Path,
        options: &BatchOptions,
        sink: &dyn TabularSink,
        merger: &dyn PdfMerger,
    ) -> AppResult<Vec<BatchReport>> {
        let mut reports = Vec::new();
        let mut pending = std::mem::take(&mut self.rows).into_iter();
        while let Some((name, mut rows)) = pending.next() {
            match self.write_template(&name, &mut rows, out_dir, options, sink, merger) {
                Ok(written) => reports.extend(written),
                Err(e) => {
                    self.rows.insert(name, rows);
                    self.rows.extend(pending);
                    return Err(e);
                }
            }
        }
        Ok(reports)
    }

    fn write_template(
        &self,
        name: &str,
        rows: &mut [Row],
        out_dir: &Path,
        options: &BatchOptions,
        sink: &dyn TabularSink,
        merger: &dyn PdfMerger,
    ) -> AppResult<Vec<BatchReport>> {
        let template = self.templates.get(name)?;
        tracing::info!("{}: {} rows", name, rows.len());
        if let Some(field) = &options.sort_by {
            rows.sort_by_cached_key(|row| row.sort_key(field));
        }

        let mut reports = Vec::new();
        for (index, chunk) in rows.chunks(template.row_limit).enumerate() {
            let chunk_number = index + 1;
            let batch_name = format!("{}_{}_{}", name, options.batch_id, chunk_number);
            let asset_dir = out_dir.join(&batch_name);
            fs::create_dir_all(&asset_dir)?;

            let mut writer = ChunkWriter::new(&batch_name, &asset_dir, merger);
            let cells: Vec<Vec<Option<String>>> = chunk
                .iter()
                .map(|row| writer.normalise(row.clone(), template))
                .collect();
            let sheet = sink.write_sheet(&out_dir.join(&batch_name), &template.fields, &cells)?;
            tracing::info!("{}: {} rows", batch_name, cells.len());

            reports.push(BatchReport {
                template: name.to_string(),
                chunk: chunk_number,
                rows: cells.len(),
                sheet,
                asset_dir,
            });
        }
        Ok(reports)
    }
}

/// Per-chunk asset handling
struct ChunkWriter<'a> {
    batch_name: &'a str,
    asset_dir: &'a Path,
    merger: &'a dyn PdfMerger,
    copied: HashMap<PathBuf, String>,
}

impl<'a> ChunkWriter<'a> {
    fn new(batch_name: &'a str, asset_dir: &'a Path, merger: &'a dyn PdfMerger) -> Self {
        Self {
            batch_name,
            asset_dir,
            merger,
            copied: HashMap::new(),
        }
    }

    /// Merge PDFs, copy assets and collapse the row into cells
    fn normalise(&mut self, mut row: Row, template: &Template) -> Vec<Option<String>> {
        self.merge_pdfs(&mut row, template);
        for key in [ASSETS, ATTACHMENTS] {
            let paths = row.paths(key).to_vec();
            if paths.is_empty() {
                continue;
            }
            let copied: Vec<String> = paths.iter().filter_map(|p| self.copy_asset(p)).collect();
            row.set(key, copied.join(LIST_DELIMITER));
        }
        template
            .fields
            .iter()
            .map(|field| row.get(field).and_then(|v| v.to_cell(field)))
            .collect()
    }

    fn merge_pdfs(&self, row: &mut Row, template: &Template) {
        let (pdfs, others): (Vec<PathBuf>, Vec<PathBuf>) = row
            .paths(ASSETS)
            .iter()
            .cloned()
            .partition(|p| {
                p.extension()
                    .map(|e| e.eq_ignore_ascii_case("pdf"))
                    .unwrap_or(false)
            });
        if pdfs.len() < 2 {
            return;
        }

        let identifier = row.sort_key("Identifier");
        let output = self
            .asset_dir
            .join(format!("{} record description list.pdf", identifier));
        match self.merger.merge(&pdfs, &output) {
            Ok(()) => {
                let mut assets = others;
                assets.push(output);
                row.set(ASSETS, assets);
            }
            Err(e) => {
                tracing::warn!("Could not merge pdfs for {}: {}", identifier, e);
                if template.has_field(DIGITISATION_NOTES) {
                    row.append_line(DIGITISATION_NOTES, &e.to_string());
                } else {
                    tracing::warn!(
                        "Template {} has no {} field, dropping note for {}: {}",
                        template.name,
                        DIGITISATION_NOTES,
                        identifier,
                        e
                    );
                }
                row.set(ASSETS, RowValue::Paths(Vec::new()));
            }
        }
    }

    /// Copy one file into the batch directory, returning its batch-relative
    /// path. Repeated sources reuse the first copy; name clashes get a random
    /// suffix.
    fn copy_asset(&mut self, source: &Path) -> Option<String> {
        if let Some(relative) = self.copied.get(source) {
            return Some(relative.clone());
        }
        let file_name = source.file_name()?;

        let mut target = self.asset_dir.join(file_name);
        if target != source {
            if !source.is_file() {
                tracing::warn!("Asset {} not found, skipping", source.display());
                return None;
            }
            while target.exists() {
                target = self.asset_dir.join(suffixed_name(Path::new(file_name)));
            }
            if let Err(e) = fs::copy(source, &target) {
                tracing::warn!("Could not copy {}: {}", source.display(), e);
                return None;
            }
        }

        let relative = format!(
            "{}/{}",
            self.batch_name,
            target.file_name()?.to_string_lossy()
        );
        self.copied.insert(source.to_path_buf(), relative.clone());
        Some(relative)
    }
}

/// `name_ab12CD.ext` for a colliding `name.ext`
fn suffixed_name(name: &Path) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(char::from)
        .collect();
    let stem = name.file_stem().map(|s| s.to_string_lossy()).unwrap_or_default();
    match name.extension() {
        Some(ext) => format!("{}_{}.{}", stem, suffix, ext.to_string_lossy()),
        None => format!("{}_{}", stem, suffix),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::media::{CsvSink, MockPdfMerger, MockTabularSink};

    fn store() -> TemplateStore {
        let fields = |names: &[&str]| names.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        TemplateStore::new([
            Template::new(
                "image",
                fields(&[NODE_TITLE, "Identifier", "###Dates", "Subject", ASSETS, ATTACHMENTS, DIGITISATION_NOTES]),
                2,
            ),
            Template::new("series", fields(&[NODE_TITLE, "Identifier"]), 10),
        ])
    }

    fn row(title: &str, identifier: &str) -> Row {
        let mut row = Row::new();
        row.set(NODE_TITLE, title);
        row.set("Identifier", identifier);
        row
    }

    #[test]
    fn test_duplicate_rows_are_skipped() {
        let mut batch = BatchAccumulator::new(store());
        assert!(batch.add_row("image", row("A", "1")).unwrap());
        assert!(!batch.add_row("image", row("A", "1")).unwrap());
        assert!(batch.add_row("image", row("A", "2")).unwrap());
        assert_eq!(batch.rows("image").len(), 2);
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        let mut batch = BatchAccumulator::new(store());
        let mut bad = row("A", "1");
        bad.set("Colour Depth", "Sepia");

        match batch.add_row("series", bad) {
            Err(AppError::UnknownFields { template, fields }) => {
                assert_eq!(template, "series");
                assert_eq!(fields, vec!["Colour Depth".to_string()]);
            }
            other => panic!("expected unknown fields error, got {:?}", other),
        }
        assert!(batch.is_empty());
        assert!(matches!(batch.add_row("nope", row("A", "1")), Err(AppError::TemplateNotFound(_))));
    }

    #[test]
    fn test_rows_follow_template_order() {
        let mut batch = BatchAccumulator::new(store());
        let mut r = Row::new();
        r.set("Identifier", "1");
        r.set(NODE_TITLE, "A");
        batch.add_row("series", r).unwrap();
        assert_eq!(batch.rows("series")[0].keys().collect::<Vec<_>>(), vec![NODE_TITLE, "Identifier"]);
    }

    #[test]
    fn test_pop_rows() {
        let mut batch = BatchAccumulator::new(store());
        batch.add_row("series", row("A", "1")).unwrap();
        batch.add_row("series", row("B", "2")).unwrap();

        let popped = batch.pop_rows("series", &[("Identifier", "2")]);
        assert_eq!(popped.len(), 1);
        assert_eq!(popped[0].text(NODE_TITLE), Some("B"));
        assert_eq!(batch.rows("series").len(), 1);
        assert!(batch.pop_rows("accession", &[("Identifier", "2")]).is_empty());
    }

    #[test]
    fn test_serialize_chunks_sorts_and_copies_assets() {
        let source = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let scan = source.path().join("scan.jpg");
        std::fs::write(&scan, b"jpeg").unwrap();
        let other_dir = source.path().join("other");
        std::fs::create_dir_all(&other_dir).unwrap();
        let clash = other_dir.join("scan.jpg");
        std::fs::write(&clash, b"other jpeg").unwrap();

        let mut batch = BatchAccumulator::new(store());
        let mut c = row("C", "3");
        c.push_path(ASSETS, &scan);
        c.push_path(ASSETS, &clash);
        c.push_path(ATTACHMENTS, source.path().join("missing.xml"));
        c.set("Subject", vec!["Students", "Staff"]);
        c.set("###Dates", vec!["1950;01/01/1950;31/12/1950", "Undated;;"]);
        let mut a = row("A", "1");
        a.push_path(ASSETS, &scan);
        batch.add_row("image", c).unwrap();
        batch.add_row("image", a).unwrap();
        batch.add_row("image", row("B", "2")).unwrap();

        let merger = MockPdfMerger::new();
        let reports = batch
            .serialize(out.path(), &BatchOptions::new("b1").sorted_by("Identifier"), &CsvSink, &merger)
            .unwrap();

        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].rows, 2);
        assert_eq!(reports[1].rows, 1);
        assert!(batch.is_empty());

        let first = std::fs::read_to_string(out.path().join("image_b1_1.csv")).unwrap();
        let lines: Vec<&str> = first.lines().collect();
        assert_eq!(
            lines[0],
            "\u{feff}Node Title,Identifier,###Dates,Subject,ASSETS,ATTACHMENTS,Digitisation Notes"
        );
        assert_eq!(lines[1], "A,1,,,image_b1_1/scan.jpg,,");
        assert_eq!(lines[2], "B,2,,,,,");

        let second = std::fs::read_to_string(out.path().join("image_b1_2.csv")).unwrap();
        let line = second.lines().nth(1).unwrap();
        assert!(line.starts_with("C,3,1950;01/01/1950;31/12/1950#ng#Undated;;,Students|Staff,image_b1_2/scan.jpg|image_b1_2/scan_"));
        assert!(line.ends_with(".jpg,,"));
        assert_eq!(std::fs::read_dir(out.path().join("image_b1_2")).unwrap().count(), 2);
    }

    #[test]
    fn test_pdf_merge() {
        let source = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let pdfs: Vec<PathBuf> = ["a.pdf", "b.pdf"].iter().map(|n| source.path().join(n)).collect();
        for pdf in &pdfs {
            std::fs::write(pdf, b"%PDF").unwrap();
        }

        let mut merger = MockPdfMerger::new();
        merger.expect_merge().times(1).returning(|_, output| {
            std::fs::write(output, b"%PDF merged").unwrap();
            Ok(())
        });

        let mut batch = BatchAccumulator::new(store());
        let mut r = row("A", "UMA-ITE-1");
        for pdf in &pdfs {
            r.push_path(ASSETS, pdf);
        }
        batch.add_row("image", r).unwrap();
        batch
            .serialize(out.path(), &BatchOptions::new("b1"), &CsvSink, &merger)
            .unwrap();

        let text = std::fs::read_to_string(out.path().join("image_b1_1.csv")).unwrap();
        assert!(text.contains("image_b1_1/UMA-ITE-1 record description list.pdf"));
        assert!(!text.contains("a.pdf"));
    }

    #[test]
    fn test_pdf_merge_failure_clears_assets() {
        let out = tempfile::tempdir().unwrap();
        let mut merger = MockPdfMerger::new();
        merger
            .expect_merge()
            .returning(|_, _| Err(AppError::Pdf("broken".to_string())));

        let mut batch = BatchAccumulator::new(store());
        let mut r = row("A", "UMA-ITE-1");
        r.push_path(ASSETS, "a.pdf");
        r.push_path(ASSETS, "b.pdf");
        batch.add_row("image", r).unwrap();
        batch
            .serialize(out.path(), &BatchOptions::new("b1"), &CsvSink, &merger)
            .unwrap();

        let text = std::fs::read_to_string(out.path().join("image_b1_1.csv")).unwrap();
        let line = text.lines().nth(1).unwrap();
        assert_eq!(line, "A,UMA-ITE-1,,,,,PDF merge failed: broken");
    }

    #[test]
    fn test_pdf_merge_failure_without_notes_field() {
        let out = tempfile::tempdir().unwrap();
        let mut merger = MockPdfMerger::new();
        merger
            .expect_merge()
            .returning(|_, _| Err(AppError::Pdf("broken".to_string())));

        let fields = [NODE_TITLE, "Identifier", ASSETS].iter().map(|s| s.to_string()).collect();
        let mut batch = BatchAccumulator::new(TemplateStore::new([Template::new("plan", fields, 5)]));
        let mut r = row("A", "UMA-ITE-1");
        r.push_path(ASSETS, "a.pdf");
        r.push_path(ASSETS, "b.pdf");
        batch.add_row("plan", r).unwrap();
        batch
            .serialize(out.path(), &BatchOptions::new("b1"), &CsvSink, &merger)
            .unwrap();

        let text = std::fs::read_to_string(out.path().join("plan_b1_1.csv")).unwrap();
        assert_eq!(text.lines().nth(1).unwrap(), "A,UMA-ITE-1,");
    }

    #[test]
    fn test_sink_failure_keeps_unwritten_rows() {
        let out = tempfile::tempdir().unwrap();
        let mut batch = BatchAccumulator::new(store());
        batch.add_row("image", row("A", "1")).unwrap();
        batch.add_row("image", row("B", "2")).unwrap();
        batch.add_row("series", row("S", "9")).unwrap();

        let mut sink = MockTabularSink::new();
        sink.expect_write_sheet()
            .returning(|_, _, _| Err(AppError::Internal("disk full".to_string())));
        let result = batch.serialize(out.path(), &BatchOptions::new("b1"), &sink, &MockPdfMerger::new());

        assert!(result.is_err());
        assert_eq!(batch.len(), 3);
        assert_eq!(batch.rows("image").len(), 2);
        assert_eq!(batch.rows("series").len(), 1);
    }
}
