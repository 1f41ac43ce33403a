//! Migration runs
//!
//! A [`Migration`] feeds records through the converters into a
//! [`BatchAccumulator`], attaching an XML snapshot (and audit trail, when
//! available) of every source record, then writes the batches.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use super::assets::AssetResolver;
use super::batch::{BatchAccumulator, BatchOptions, BatchReport};
use super::Services;
use crate::convert::recordset::ACCESSION_TEMPLATE;
use crate::convert::{
    convert_agent, convert_agreement, convert_item, convert_recordset, convert_unit, create_accession,
    update_accession, Converted,
};
use crate::emu::{to_xml_string, EmuRecord};
use crate::error::AppResult;
use crate::models::report::NODE_TITLE;
use crate::models::row::ATTACHMENTS;
use crate::models::{AuditLogIndex, HierarchyLevel, NodeReport, Row, TemplateStore};
use crate::rules::hierarchy::{LEVEL_FIELD, LOT_IRN_COLUMN};
use crate::rules::slugify;

pub const CATALOGUE_TABLE: &str = "ecatalogue";
pub const LOTS_TABLE: &str = "eaccessionlots";
pub const PARTIES_TABLE: &str = "eparties";
pub const LOCATIONS_TABLE: &str = "elocations";
pub const MULTIMEDIA_TABLE: &str = "emultimedia";

/// Counts and batches produced by a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub converted: usize,
    pub duplicates: usize,
    pub skipped: usize,
    pub batches: Vec<BatchReport>,
}

/// One migration run writing into an output directory
pub struct Migration<'a> {
    services: &'a Services,
    audit: Option<&'a AuditLogIndex>,
    batch: BatchAccumulator,
    out_dir: PathBuf,
    scratch: TempDir,
    converted: usize,
    duplicates: usize,
    skipped: usize,
}

impl<'a> Migration<'a> {
    pub fn new(
        services: &'a Services,
        templates: TemplateStore,
        audit: Option<&'a AuditLogIndex>,
        out_dir: &Path,
    ) -> AppResult<Self> {
        std::fs::create_dir_all(out_dir)?;
        let scratch = tempfile::Builder::new()
            .prefix(".snapshots")
            .tempdir_in(out_dir)?;
        Ok(Self {
            services,
            audit,
            batch: BatchAccumulator::new(templates),
            out_dir: out_dir.to_path_buf(),
            scratch,
            converted: 0,
            duplicates: 0,
            skipped: 0,
        })
    }

    /// Rows accumulated so far
    pub fn batch(&self) -> &BatchAccumulator {
        &self.batch
    }

    /// Catalogue items, optionally named against an accession report
    pub fn items(&mut self, records: &[EmuRecord], report: Option<&NodeReport>) {
        let services = self.services;
        let resolver = AssetResolver::new(services.locator.as_ref());
        for record in records {
            self.accept(record, CATALOGUE_TABLE, convert_item(record, report, &resolver));
        }
    }

    /// Series and accessions, then accession lots. Lots matching an
    /// accession row fill in its acquisition details; the rest become new
    /// accessions.
    pub fn recordsets(&mut self, catalogue: &[EmuRecord], lots: &[EmuRecord]) {
        let services = self.services;
        let resolver = AssetResolver::new(services.locator.as_ref());
        for record in catalogue {
            let level = HierarchyLevel::from(record.get(LEVEL_FIELD).unwrap_or(""));
            if level != HierarchyLevel::Series && !level.is_accession() {
                tracing::warn!(
                    "Skipping {} with level {:?}, not a recordset",
                    describe(record),
                    level
                );
                self.skipped += 1;
                continue;
            }
            self.accept(record, CATALOGUE_TABLE, convert_recordset(record, &resolver));
        }

        for lot in lots {
            let Some(irn) = lot.irn() else {
                tracing::warn!("Skipping accession lot without irn");
                self.skipped += 1;
                continue;
            };
            let matched = self
                .batch
                .pop_rows(ACCESSION_TEMPLATE, &[(LOT_IRN_COLUMN, irn)]);
            if matched.is_empty() {
                let created = create_accession(lot).map(|row| Converted {
                    template: ACCESSION_TEMPLATE.to_string(),
                    row,
                });
                self.accept(lot, LOTS_TABLE, created);
                continue;
            }
            for mut row in matched {
                update_accession(&mut row, lot);
                if let Err(e) = self.batch.add_row(ACCESSION_TEMPLATE, row) {
                    tracing::warn!("Could not update accession for lot {}: {}", irn, e);
                }
            }
        }
    }

    /// People and organisations
    pub fn agents(&mut self, records: &[EmuRecord]) {
        for record in records {
            self.accept(record, PARTIES_TABLE, convert_agent(record));
        }
    }

    /// Storage units
    pub fn units(&mut self, records: &[EmuRecord]) {
        for record in records {
            self.accept(record, LOCATIONS_TABLE, convert_unit(record));
        }
    }

    /// Deposit agreements
    pub fn agreements(&mut self, records: &[EmuRecord]) {
        for record in records {
            self.accept(record, MULTIMEDIA_TABLE, convert_agreement(record));
        }
    }

    fn accept(&mut self, record: &EmuRecord, table: &str, converted: AppResult<Converted>) {
        match converted.and_then(|c| self.store(record, table, c)) {
            Ok(true) => self.converted += 1,
            Ok(false) => self.duplicates += 1,
            Err(e) => {
                tracing::warn!("Skipping {}: {}", describe(record), e);
                self.skipped += 1;
            }
        }
    }

    fn store(&mut self, record: &EmuRecord, table: &str, converted: Converted) -> AppResult<bool> {
        let Converted { template, mut row } = converted;
        self.attach_snapshot(&mut row, record, table)?;
        self.batch.add_row(&template, row)
    }

    /// Write the source record as `<slug>.xml` and its audit trail as
    /// `<irn>.csv`, attaching both to the row. A record seen twice reuses
    /// its first snapshot.
    fn attach_snapshot(&self, row: &mut Row, record: &EmuRecord, table: &str) -> AppResult<()> {
        let name = snapshot_name(row, record);
        let xml = to_xml_string(table, std::slice::from_ref(record))?;
        let mut attempt = 0;
        let path = loop {
            let candidate = match attempt {
                0 => self.scratch.path().join(format!("{}.xml", name)),
                n => self.scratch.path().join(format!("{}-{}.xml", name, n)),
            };
            match std::fs::read_to_string(&candidate) {
                Ok(existing) if existing == xml => break candidate,
                Ok(_) => attempt += 1,
                Err(_) => {
                    std::fs::write(&candidate, &xml)?;
                    break candidate;
                }
            }
        };
        row.push_path(ATTACHMENTS, &path);

        if let (Some(audit), Some(irn)) = (self.audit, record.irn()) {
            if let Some(log) = audit.write_record_log(irn, self.scratch.path())? {
                row.push_path(ATTACHMENTS, log);
            }
        }
        Ok(())
    }

    /// Write every batch and clean up the snapshots
    pub fn finish(mut self, options: &BatchOptions) -> AppResult<RunSummary> {
        let batches = self.batch.serialize(
            &self.out_dir,
            options,
            self.services.sink.as_ref(),
            self.services.merger.as_ref(),
        )?;
        tracing::info!(
            "Converted {} records ({} duplicates, {} skipped) into {} batches",
            self.converted,
            self.duplicates,
            self.skipped,
            batches.len()
        );
        Ok(RunSummary {
            converted: self.converted,
            duplicates: self.duplicates,
            skipped: self.skipped,
            batches,
        })
    }
}

/// File stem for a record snapshot: the row identifier, else its title,
/// else the record irn
fn snapshot_name(row: &Row, record: &EmuRecord) -> String {
    [row.text("Identifier"), row.text(NODE_TITLE), record.irn()]
        .into_iter()
        .flatten()
        .map(slugify)
        .find(|s| !s.is_empty())
        .unwrap_or_else(|| "record".to_string())
}

fn describe(record: &EmuRecord) -> String {
    match (record.irn(), record.get("EADUnitID")) {
        (Some(irn), Some(unit_id)) => format!("record {} ({})", irn, unit_id),
        (Some(irn), None) => format!("record {}", irn),
        (None, Some(unit_id)) => format!("record {}", unit_id),
        (None, None) => "record without irn".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emu::Value;
    use crate::models::row::ASSETS;
    use crate::models::Template;
    use crate::rules::identifiers::ACCESSION_PREFIX;
    use crate::services::assets::MockAssetLocator;
    use crate::services::media::{CsvSink, MockImageDeriver, MockPdfMerger};
    use std::sync::Arc;

    fn services() -> Services {
        let mut locator = MockAssetLocator::new();
        locator.expect_asset_folder().returning(|_| None);
        Services {
            locator: Box::new(locator),
            merger: Box::new(MockPdfMerger::new()),
            sink: Box::new(CsvSink),
            deriver: Arc::new(MockImageDeriver::new()),
        }
    }

    fn store() -> TemplateStore {
        let fields = |names: &[&str]| names.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        TemplateStore::new([
            Template::new(
                ACCESSION_TEMPLATE,
                fields(&[
                    NODE_TITLE,
                    "Identifier",
                    "Publication Status",
                    "Method of Acquisition",
                    "Authorised by",
                    "Lot Description",
                    LOT_IRN_COLUMN,
                    "Acquisition Notes",
                    "Date Received",
                    "Transferror",
                    "Deposit Agreement",
                    ASSETS,
                    ATTACHMENTS,
                ]),
                100,
            ),
            Template::new(
                "unit",
                fields(&[NODE_TITLE, "Location Type", "EMu IRN", "Home Location", ATTACHMENTS]),
                100,
            ),
        ])
    }

    #[test]
    fn test_snapshot_name() {
        let mut row = Row::new();
        let record = EmuRecord::new().with("irn", "12");
        assert_eq!(snapshot_name(&row, &record), "12");
        row.set(NODE_TITLE, "Café minutes");
        assert_eq!(snapshot_name(&row, &record), "cafe-minutes");
        row.set("Identifier", "UMA-ITE-1");
        assert_eq!(snapshot_name(&row, &record), "uma-ite-1");
    }

    #[test]
    fn test_units_attach_snapshots_and_skip_failures() {
        let services = services();
        let out = tempfile::tempdir().unwrap();
        let mut run = Migration::new(&services, store(), None, out.path()).unwrap();

        run.units(&[
            EmuRecord::new().with("irn", "1").with("LocHolderName", "Unit 4"),
            EmuRecord::new().with("irn", "2"),
            EmuRecord::new().with("irn", "1").with("LocHolderName", "Unit 4"),
        ]);
        let rows = run.batch().rows("unit");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].paths(ATTACHMENTS).len(), 1);
        let snapshot = std::fs::read_to_string(&rows[0].paths(ATTACHMENTS)[0]).unwrap();
        assert!(snapshot.contains("<table name=\"elocations\">"));

        let summary = run.finish(&BatchOptions::new("t1").sorted_by(NODE_TITLE)).unwrap();
        assert_eq!(summary.converted, 1);
        assert_eq!(summary.duplicates, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.batches.len(), 1);

        let text = std::fs::read_to_string(out.path().join("unit_t1_1.csv")).unwrap();
        assert!(text.contains("Unit 0004,,1,,unit_t1_1/unit-0004.xml"));
        assert!(out.path().join("unit_t1_1/unit-0004.xml").is_file());
    }

    #[test]
    fn test_lots_update_or_create_accessions() {
        let services = services();
        let out = tempfile::tempdir().unwrap();
        let mut run = Migration::new(&services, store(), None, out.path()).unwrap();

        let mut existing = Row::new();
        existing.set(NODE_TITLE, "[1990.0001] Papers");
        existing.set("Identifier", format!("{}19900001", ACCESSION_PREFIX));
        existing.set(LOT_IRN_COLUMN, "500");
        run.batch.add_row(ACCESSION_TEMPLATE, existing).unwrap();

        let donor = EmuRecord::new().with("NamCitedName", "Smith, Jane");
        let lots = [
            EmuRecord::new()
                .with("irn", "500")
                .with("AcqAcquisitionMethod", "Donation")
                .with_value("AcqSource", Value::Node(donor)),
            EmuRecord::new().with("irn", "501").with("LotDescription", "Boxes"),
        ];
        run.recordsets(&[], &lots);

        let rows = run.batch().rows(ACCESSION_TEMPLATE);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].text("Method of Acquisition"), Some("Donation"));
        assert_eq!(rows[0].sort_key("Transferror"), "Smith, Jane");
        assert_eq!(rows[0].text(LOT_IRN_COLUMN), Some("500"));
        assert_eq!(rows[1].text(NODE_TITLE), Some("Accession lot 501"));
        assert_eq!(rows[1].paths(ATTACHMENTS).len(), 1);
    }
}
