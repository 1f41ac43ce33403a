//! Series and accessions (`ecatalogue` records at recordset level) and
//! accession lots (`eaccessionlots`)

use once_cell::sync::Lazy;
use regex::Regex;

use crate::emu::{EmuRecord, PARENT_REF};
use crate::error::{AppError, AppResult};
use crate::models::report::NODE_TITLE;
use crate::models::row::{ASSETS, ATTACHMENTS, GROUP_DELIMITER};
use crate::models::{HierarchyLevel, PublicationStatus, Row};
use crate::rules::hierarchy::{LEVEL_FIELD, LOT_IRN_COLUMN, LOT_REF};
use crate::rules::identifiers::{labelled, records_services_ids, ACCESSION_PREFIX, SERIES_PREFIX};
use crate::rules::{concat_fields, format_date, node_identifier, resolve_access, shorten_title};
use crate::services::assets::{AssetResolver, MULTIMEDIA_GROUP};

use super::Converted;

pub const SERIES_TEMPLATE: &str = "series";
pub const ACCESSION_TEMPLATE: &str = "accession";

/// Length of EADUnitID values that map to series identifiers
const SERIES_ID_LENGTH: usize = 9;

static METERAGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\(?(\d{1,3}(?:\.\d{1,2})?) ?(m|cm)\b\)?").expect("valid meterage pattern")
});
static SOURCES: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)sources: (.+)").expect("valid sources pattern"));

/// Convert a series or accession catalogue record
pub fn convert_recordset(record: &EmuRecord, resolver: &AssetResolver) -> AppResult<Converted> {
    let unit_id = record
        .get("EADUnitID")
        .ok_or_else(|| AppError::Validation(format!("recordset {} has no EADUnitID", record.irn().unwrap_or("?"))))?;
    let level = HierarchyLevel::from(record.get(LEVEL_FIELD).unwrap_or(""));
    let mut row = Row::new();

    let (title, full_title) = shorten_title(record.get("EADUnitTitle").unwrap_or(""));
    row.set(NODE_TITLE, labelled(Some(unit_id), &title));
    row.set("Alternative Title", full_title);
    if level == HierarchyLevel::Series {
        if unit_id.len() == SERIES_ID_LENGTH {
            row.set("Identifier", node_identifier(SERIES_PREFIX, unit_id));
        } else {
            tracing::debug!("Series {} keeps no identifier", unit_id);
        }
        row.set("Accession", find_accession(record));
    }

    row.set("Scope and Content", record.get("EADScopeAndContent"));
    let access = resolve_access(record);
    row.set("Access Status", access.status.as_str());
    row.set("Access Conditions", access.conditions);
    row.set("Appraisal", record.get("EADAppraisalInformation"));
    row.set("Arrangement", record.get("EADArrangement"));

    let (extent, meterage) = extract_linear_meterage(&record.find_all("EADExtent"));
    row.set("Extent", extent);
    row.set("Linear Meterage", meterage);
    row.set("Genre/Form", super::item::genre_labels(record));
    row.set("Collection Category", record.get("TitObjectCategory"));
    row.set("Accruals", record.get("EADAccruals"));
    let (sources, history) = extract_sources(record.get("EADCustodialHistory"));
    row.set("Source of Description", sources);
    row.set("Archival History", history);
    row.set("Internal Notes", record.get("NotNotes"));
    row.set("Subject", record.list("EADSubject_tab"));
    row.set("Subject (Place)", record.find_all("EADGeographicName"));
    row.set(
        "###Dates",
        format_date(
            record.get("EADUnitDate"),
            record.get("EADUnitDateEarliest"),
            record.get("EADUnitDateLatest"),
        ),
    );
    row.set("EMu Catalogue IRN", record.irn());
    row.set("Descriptive Note", record.get("EADOtherFindingAid"));
    row.set("Previous System ID", unit_id);
    row.set("###Provenance", provenance(record));

    let published = record
        .get("AdmPublishWebNoPassword")
        .map(|f| f.eq_ignore_ascii_case("yes"))
        .unwrap_or(false);
    row.set(
        "Publication Status",
        if published {
            PublicationStatus::Public.as_str()
        } else {
            PublicationStatus::NotForPublication.as_str()
        },
    );
    row.set(
        "###Condition",
        concat_fields(
            &[
                record.get("ConDateChecked"),
                record.get("ConConditionStatus"),
                record.get("ConConditionDetails"),
            ],
            "|",
        ),
    );
    row.set("Handling Instructions", record.get("ConHandlingInstructions"));
    if let Some(accrued) = record.nodes("AssRelatedObjectsRef_tab").first() {
        row.set(
            "Accrued to Accession",
            labelled(accrued.get("EADUnitID"), accrued.get("EADUnitTitle").unwrap_or("")),
        );
    }

    let aids = resolver.finding_aids(record);
    row.set(ASSETS, aids.assets);
    row.set(ATTACHMENTS, aids.attachments);
    if !aids.other_finding_aids.is_empty() {
        row.set("Other Finding Aids", aids.other_finding_aids.join("|"));
    }
    let (records_services, other) = records_services_ids(record.list("EADPreviousID_tab"));
    row.set("Records Services ID", records_services);
    row.set("Other IDs", other);

    if level.is_accession() {
        row.set("Identifier", node_identifier(ACCESSION_PREFIX, unit_id));
        accession_data(record, &mut row);
        Ok(Converted {
            template: ACCESSION_TEMPLATE.to_string(),
            row,
        })
    } else {
        Ok(Converted {
            template: SERIES_TEMPLATE.to_string(),
            row,
        })
    }
}

/// Separate linear meterage (in m or cm) from free-text extents. Returns the
/// remaining extent statements and the total in metres, if any.
pub fn extract_linear_meterage(extents: &[&str]) -> (Vec<String>, Option<String>) {
    let mut total = 0.0_f64;
    let mut remaining = Vec::new();
    for extent in extents {
        let mut text = extent.to_string();
        if let Some(found) = METERAGE.captures(extent) {
            let amount: f64 = found[1].parse().unwrap_or(0.0);
            total += if found[2].eq_ignore_ascii_case("cm") { amount / 100.0 } else { amount };
            text = extent
                .replace(&found[0], "")
                .trim_matches(|c| c == ' ' || c == '.' || c == '(')
                .to_string();
        }
        remaining.push(text);
    }
    let meterage = if total > 0.0 {
        let formatted = format!("{:.2}", total);
        Some(formatted.trim_end_matches('0').trim_end_matches('.').to_string())
    } else {
        None
    };
    (remaining, meterage)
}

/// Split `Sources: ...` lines out of custodial history
pub fn extract_sources(history: Option<&str>) -> (Vec<String>, Option<String>) {
    let Some(history) = history else {
        return (Vec::new(), None);
    };
    let mut sources = Vec::new();
    let mut kept = Vec::new();
    for line in history.lines() {
        match SOURCES.captures(line) {
            Some(found) => {
                sources.push(found[1].trim().to_string());
                let rest = line.replace(&found[0], "");
                if !rest.trim().is_empty() {
                    kept.push(rest);
                }
            }
            None => kept.push(line.to_string()),
        }
    }
    let remaining = kept.join("\n").trim().to_string();
    (sources, if remaining.is_empty() { None } else { Some(remaining) })
}

/// Accession a series belongs to: its lot number, `Accession lot <irn>` when
/// the lot has no distinct number, or the parent record
pub fn find_accession(record: &EmuRecord) -> Option<String> {
    if let Some(lot) = record.node(LOT_REF) {
        if let Some(irn) = lot.irn() {
            return match lot.get("LotLotNumber") {
                Some(number) if Some(number) != record.get("EADUnitID") => Some(number.to_string()),
                _ => Some(format!("Accession lot {}", irn)),
            };
        }
    }
    let parent = record.node(PARENT_REF)?;
    let unit_id = parent.get("EADUnitID")?;
    Some(labelled(Some(unit_id), parent.get("EADUnitTitle").unwrap_or("")))
}

/// Originating parties, falling back to the parent's
pub fn provenance(record: &EmuRecord) -> Option<String> {
    let names = |r: &EmuRecord| -> Vec<String> {
        r.nodes("EADOriginationRef_tab")
            .iter()
            .filter_map(|o| o.lookup("NamCitedName"))
            .map(String::from)
            .collect()
    };
    let mut found = names(record);
    if found.is_empty() {
        if let Some(parent) = record.node(PARENT_REF) {
            found = names(parent);
        }
    }
    if found.is_empty() {
        None
    } else {
        Some(found.join(GROUP_DELIMITER))
    }
}

fn accession_data(record: &EmuRecord, row: &mut Row) {
    row.set("Legacy Data", record.get("AdmOriginalData"));
    let owners: Vec<&str> = record
        .nodes("TitOwnersNameRef_tab")
        .iter()
        .filter_map(|o| o.lookup("NamCitedName"))
        .collect();
    if !owners.is_empty() {
        row.set("Ownership", owners);
    }
    if let Some(lot) = record.node(LOT_REF) {
        update_accession(row, lot);
        // received dates on the catalogue record take precedence over the lot's
        if record.get("AcqDateReceivedLower").is_some() || record.get("AcqDateReceivedUpper").is_some() {
            row.set(
                "Date Received",
                format_date(
                    lot.get("AcqDateReceived"),
                    record.get("AcqDateReceivedLower"),
                    record.get("AcqDateReceivedUpper"),
                ),
            );
        }
    }
}

/// Fill accession lot details into an accession row
pub fn update_accession(row: &mut Row, lot: &EmuRecord) {
    row.set("Method of Acquisition", lot.get("AcqAcquisitionMethod"));
    row.set("Authorised by", lot.get("AcqAuthorisedBy"));
    row.set("Lot Description", lot.get("LotDescription"));
    row.set(LOT_IRN_COLUMN, lot.irn());
    row.set(
        "Acquisition Notes",
        concat_fields(&[lot.get("AcqAcquisitionRemarks"), lot.get("NotNotes")], "\n"),
    );
    row.set(
        "Date Received",
        format_date(
            lot.get("AcqDateReceived"),
            lot.get("AcqDateReceivedLower"),
            lot.get("AcqDateReceivedUpper"),
        ),
    );
    let transferrors: Vec<&str> = lot
        .nodes("AcqSource")
        .iter()
        .chain(lot.nodes("source"))
        .filter_map(|s| s.lookup("NamCitedName"))
        .collect();
    row.set("Transferror", transferrors);
    let agreements: Vec<&str> = lot
        .nodes(MULTIMEDIA_GROUP)
        .iter()
        .filter_map(|m| m.lookup("MulTitle"))
        .collect();
    row.set("Deposit Agreement", agreements);
}

/// New accession row for a lot with no catalogue record. The lot is named
/// after its only series, if it has exactly one.
pub fn create_accession(lot: &EmuRecord) -> AppResult<Row> {
    let irn = lot
        .irn()
        .ok_or_else(|| AppError::Validation("accession lot has no irn".to_string()))?;
    let mut row = Row::new();
    row.set("Publication Status", PublicationStatus::NotForPublication.as_str());

    let series: Vec<String> = lot
        .nodes(LOT_REF)
        .iter()
        .filter(|r| r.get(LEVEL_FIELD).map(HierarchyLevel::from) == Some(HierarchyLevel::Series))
        .map(|r| labelled(r.get("EADUnitID"), r.get("EADUnitTitle").unwrap_or("")))
        .collect();
    match series.as_slice() {
        [only] => row.set(NODE_TITLE, only.as_str()),
        _ => row.set(NODE_TITLE, format!("Accession lot {}", irn)),
    }
    update_accession(&mut row, lot);
    Ok(row)
}
