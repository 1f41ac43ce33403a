//! Parent, series and accession resolution along the embedded parent chain

use super::dates::format_date;
use super::identifiers::labelled;
use super::text::shorten_title;
use crate::emu::EmuRecord;
use crate::models::report::NODE_TITLE;
use crate::models::row::GROUP_DELIMITER;
use crate::models::{HierarchyLevel, NodeReport, Row};

pub const LEVEL_FIELD: &str = "EADLevelAttribute";
/// Report column linking imported accessions to their EMu lot
pub const LOT_IRN_COLUMN: &str = "EMu Accession Lot IRN";
/// Embedded accession lot reference
pub const LOT_REF: &str = "AccAccessionLotRef";

/// Parent links for a catalogue record
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParentLinks {
    pub series: Option<String>,
    pub part_of_item: Option<String>,
    pub accession: Option<String>,
    pub accrued_to_accession: Option<String>,
}

impl ParentLinks {
    /// Walk the parent chain, nearest ancestor first.
    ///
    /// Ancestors with a missing or unrecognised level are logged and skipped.
    /// When no accession ancestor exists the accession comes from the report
    /// side-table, then from the embedded accession lot.
    pub fn resolve(record: &EmuRecord, report: Option<&NodeReport>) -> Self {
        let mut links = Self::default();
        let mut from_consolidation = false;

        for parent in record.ancestors() {
            let unit_id = parent.get("EADUnitID");
            let title = parent.get("EADUnitTitle").unwrap_or("");
            let Some(level) = parent.get(LEVEL_FIELD) else {
                tracing::warn!(
                    "Parent {} of record {} has no level",
                    unit_id.unwrap_or("?"),
                    record.irn().unwrap_or("?")
                );
                continue;
            };
            let name = labelled(unit_id, title);

            match HierarchyLevel::from(level) {
                HierarchyLevel::Series => {
                    links.series.get_or_insert(name);
                }
                HierarchyLevel::Item => {
                    let (short, _) = shorten_title(title);
                    links.part_of_item.get_or_insert(labelled(unit_id, &short));
                }
                HierarchyLevel::Acquisition => {
                    if let Some(previous) = links.accession.replace(name.clone()) {
                        if from_consolidation && previous != name {
                            links.accrued_to_accession.get_or_insert(previous);
                        }
                    }
                    from_consolidation = false;
                }
                HierarchyLevel::Consolidation => match &links.accession {
                    Some(existing) if *existing != name => {
                        links.accrued_to_accession.get_or_insert(name);
                    }
                    Some(_) => {}
                    None => {
                        links.accession = Some(name);
                        from_consolidation = true;
                    }
                },
                other => tracing::warn!(
                    "Unrecognised parent level {:?} for {} on record {}",
                    other,
                    name,
                    record.irn().unwrap_or("?")
                ),
            }
        }

        if links.accession.is_none() {
            links.accession = accession_fallback(record, report);
        }
        links
    }

    pub fn apply(&self, row: &mut Row) {
        for (field, value) in [
            ("Series", &self.series),
            ("Part of Item", &self.part_of_item),
            ("Accession", &self.accession),
            ("Accrued to Accession", &self.accrued_to_accession),
        ] {
            if let Some(value) = value {
                row.set(field, value.as_str());
            }
        }
    }
}

/// irn of the record's embedded accession lot
pub fn accession_lot_irn(record: &EmuRecord) -> Option<&str> {
    record.nodes(LOT_REF).iter().find_map(|lot| lot.irn())
}

fn accession_fallback(record: &EmuRecord, report: Option<&NodeReport>) -> Option<String> {
    let lot = accession_lot_irn(record)?;
    if let Some(report) = report {
        let titles = report.titles(LOT_IRN_COLUMN, lot);
        if !titles.is_empty() {
            return Some(titles.join("|"));
        }
    }
    Some(format!("Accession lot {}", lot))
}

/// Date of the nearest dated ancestor, for records with no date of their own:
/// `Undated;;#ng#<date>|Date of <level>`
pub fn inherited_date(record: &EmuRecord) -> Option<String> {
    record.ancestors().into_iter().find_map(|parent| {
        let date = format_date(
            parent.get("EADUnitDate"),
            parent.get("EADUnitDateEarliest"),
            parent.get("EADUnitDateLatest"),
        )?;
        let level = parent.get(LEVEL_FIELD).unwrap_or("parent");
        let level = if HierarchyLevel::from(level).is_accession() {
            "accession"
        } else {
            level
        };
        Some(format!("Undated;;{}{}|Date of {}", GROUP_DELIMITER, date, level))
    })
}

/// Title prefixed with the record's own `[id]` label, for records with children
pub fn parent_title(record: &EmuRecord, title: &str) -> String {
    labelled(record.get("EADUnitID"), title)
}
