//! Deposit and donor agreements (`emultimedia` records)

use crate::emu::EmuRecord;
use crate::error::{AppError, AppResult};
use crate::models::report::NODE_TITLE;
use crate::models::row::ASSETS;
use crate::models::Row;

use super::Converted;

pub const AGREEMENT_TEMPLATE: &str = "agreement";

/// Convert an agreement held as a multimedia record
pub fn convert_agreement(record: &EmuRecord) -> AppResult<Converted> {
    let title = record
        .get("MulTitle")
        .or_else(|| record.get("MulIdentifier"))
        .ok_or_else(|| AppError::Validation(format!("agreement {} has no title", record.irn().unwrap_or("?"))))?;
    let mut row = Row::new();

    row.set(NODE_TITLE, title);
    row.set("Notes", record.get("MulDescription"));
    row.set("Type", record.get("DetResourceType"));
    let mut donors: Vec<&str> = Vec::new();
    for name in record.find_all("NamCitedName") {
        if !donors.contains(&name) {
            donors.push(name);
        }
    }
    row.set("Donor", donors);
    row.set("EMu IRN", record.irn());
    if let Some(path) = record.get("Multimedia") {
        row.push_path(ASSETS, path);
    }

    Ok(Converted {
        template: AGREEMENT_TEMPLATE.to_string(),
        row,
    })
}
