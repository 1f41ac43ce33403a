//! Storage units (`elocations` holder records)

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::emu::{EmuRecord, PARENT_REF};
use crate::error::{AppError, AppResult};
use crate::models::report::NODE_TITLE;
use crate::models::{HierarchyLevel, Row};
use crate::rules::hierarchy::LEVEL_FIELD;
use crate::rules::{concat_fields, format_date};

use super::Converted;

pub const UNIT_TEMPLATE: &str = "unit";

static UNIT_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)Unit (\d{1,4})").expect("valid unit number pattern"));

/// Move the unit number to the end and pad it (`Unit 12 Box` -> `Box Unit 0012`)
pub fn unit_title(name: &str) -> String {
    let Some(found) = UNIT_NUMBER.captures(name) else {
        return name.to_string();
    };
    let number = padded(&found);
    let rest = name.replacen(&found[0], "", 1);
    match rest.trim() {
        "" => format!("Unit {}", number),
        rest => format!("{} Unit {}", rest, number),
    }
}

fn padded(found: &Captures) -> String {
    let digits = found[1].trim_start_matches('0');
    format!("{:0>4}", if digits.is_empty() { "0" } else { digits })
}

/// Convert a storage location holder
pub fn convert_unit(record: &EmuRecord) -> AppResult<Converted> {
    let name = record
        .get("LocHolderName")
        .ok_or_else(|| AppError::Validation(format!("location {} has no holder name", record.irn().unwrap_or("?"))))?;
    let mut row = Row::new();

    row.set(NODE_TITLE, unit_title(name));
    row.set("Location Type", record.get("LocStorageType"));
    row.set("EMu IRN", record.irn());
    row.set("Home Location", record.get("LocHolderLocationRef.LocLocationCode"));

    let units: Vec<&EmuRecord> = record
        .nodes("LocCurrentLocationRef")
        .iter()
        .filter(|r| r.get(LEVEL_FIELD).map(HierarchyLevel::from) == Some(HierarchyLevel::Unit))
        .collect();
    match units.as_slice() {
        [] => {}
        [unit] => {
            row.set(
                "Contents",
                concat_fields(&[unit.get("EADUnitTitle"), unit.get("EADScopeAndContent")], "\n"),
            );
            if unit.get("EADUnitDate").is_some() {
                row.set(
                    "Date Range",
                    format_date(
                        unit.get("EADUnitDate"),
                        unit.get("EADUnitDateEarliest"),
                        unit.get("EADUnitDateLatest"),
                    ),
                );
            }
            if let Some(parent) = unit.node(PARENT_REF) {
                let field = match parent.get(LEVEL_FIELD).map(HierarchyLevel::from) {
                    Some(HierarchyLevel::Series) => "Series",
                    _ => "Accession",
                };
                row.set(field, parent.get("EADUnitTitle"));
            }
        }
        _ => tracing::warn!("Multiple unit records for {}", name),
    }

    Ok(Converted {
        template: UNIT_TEMPLATE.to_string(),
        row,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emu::Value;

    #[test]
    fn test_unit_title() {
        assert_eq!(unit_title("Unit 12"), "Unit 0012");
        assert_eq!(unit_title("Box Unit 7"), "Box Unit 0007");
        assert_eq!(unit_title("Unit 7 Box"), "Box Unit 0007");
        assert_eq!(unit_title("unit 0012"), "Unit 0012");
        assert_eq!(unit_title("Shelf A"), "Shelf A");
    }

    #[test]
    fn test_unit_with_enclosed_record() {
        let series = EmuRecord::new().with(LEVEL_FIELD, "Series").with("EADUnitTitle", "Minutes");
        let unit = EmuRecord::new()
            .with(LEVEL_FIELD, "Unit")
            .with("EADUnitTitle", "Council minutes")
            .with("EADScopeAndContent", "Bound volumes")
            .with("EADUnitDate", "1950")
            .with("EADUnitDateEarliest", "1950")
            .with_value(PARENT_REF, Value::Node(series));
        let record = EmuRecord::new()
            .with("irn", "5")
            .with("LocHolderName", "Unit 3")
            .with_value(
                "LocHolderLocationRef",
                Value::Node(EmuRecord::new().with("LocLocationCode", "B03.04")),
            )
            .with_value(
                "LocCurrentLocationRef",
                Value::Nodes(vec![unit, EmuRecord::new().with(LEVEL_FIELD, "Item")]),
            );

        let row = convert_unit(&record).unwrap().row;
        assert_eq!(row.text(NODE_TITLE), Some("Unit 0003"));
        assert_eq!(row.text("Home Location"), Some("B03.04"));
        assert_eq!(row.text("Contents"), Some("Council minutes\nBound volumes"));
        assert_eq!(row.text("Date Range"), Some("1950;01/01/1950;"));
        assert_eq!(row.text("Series"), Some("Minutes"));
    }
}
