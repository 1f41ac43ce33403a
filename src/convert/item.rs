//! Catalogue items (`ecatalogue` records below series level)

use crate::emu::EmuRecord;
use crate::error::{AppError, AppResult};
use crate::models::report::NODE_TITLE;
use crate::models::row::{ASSETS, REDACT};
use crate::models::{AccessStatus, NodeReport, Row};
use crate::rules::hierarchy::parent_title;
use crate::rules::identifiers::ITEM_PREFIX;
use crate::rules::text::{pad_location_code, pad_unit_name};
use crate::rules::{
    concat_fields, format_date, guess_copyright, inherited_date, node_identifier, publication_status,
    resolve_access, shorten_title, Credits, ParentLinks, PhysicalFacets, PreviousIds,
};
use crate::services::assets::AssetResolver;
use crate::services::classifier::{classify_record, genre_terms, is_parent};

use super::Converted;

pub const UNDATED: &str = "Undated";
pub const MENU_ONLINE: &str = "Browse digitised items#n#Available online";
pub const MENU_READING_ROOM: &str = "Browse digitised items#n#Available in the Reading Room";

/// Convert one item record and pick its template
pub fn convert_item(record: &EmuRecord, report: Option<&NodeReport>, resolver: &AssetResolver) -> AppResult<Converted> {
    let unit_id = record
        .get("EADUnitID")
        .ok_or_else(|| AppError::Validation(format!("item {} has no EADUnitID", record.irn().unwrap_or("?"))))?;
    let genres = genre_terms(record);
    let mut row = Row::new();

    let (title, full_title) = shorten_title(record.get("EADUnitTitle").unwrap_or(""));
    let title = if is_parent(record) { parent_title(record, &title) } else { title };
    row.set(NODE_TITLE, title);
    row.set("Full Title", full_title);
    ParentLinks::resolve(record, report).apply(&mut row);

    row.set("Scope and Content", record.get("EADScopeAndContent"));
    row.set("Dimensions", record.get("EADDimensions"));
    row.set(
        "Internal Notes",
        concat_fields(&[record.get("NotNotes"), record.get("EADAppraisalInformation")], "\n"),
    );

    let access = resolve_access(record);
    row.set("Access Status", access.status.as_str());
    row.set("Access Conditions", access.conditions.clone());
    row.set(
        "Copyright Status",
        guess_copyright(record.get("EADUseRestrictions")).map(|c| c.as_str()),
    );
    row.set("Conditions of Use and Reproduction", record.get("EADUseRestrictions"));

    row.set("Genre/Form", genre_labels(record));
    row.set("Subject", record.find_all("EADSubject"));
    let mut agents = record.find_all("EADPersonalName");
    agents.extend(record.find_all("EADCorporateName"));
    row.set("Subject (Agent)", agents);
    let mut places: Vec<String> = record.find_all("EADGeographicName").into_iter().map(String::from).collect();
    places.extend(creation_place(record));
    row.set("Subject (Place)", places);
    row.set("###Dates", item_dates(record));

    row.set("EMu IRN", record.irn());
    row.set("Previous System ID", unit_id);
    row.set("Identifier", node_identifier(ITEM_PREFIX, unit_id));

    let unit = record.find("LocHolderName").map(pad_unit_name);
    row.set("Location if unenclosed", record.find("LocLocationCode").map(pad_location_code));
    row.set(
        "Request Type",
        if unit.is_some() { "Request unit" } else { "Request item" },
    );
    row.set("Unit", unit);
    if record
        .get("TitObjectStatus")
        .map(|s| s.eq_ignore_ascii_case("missing"))
        .unwrap_or(false)
    {
        row.set("Request Type", "This item is not available");
        row.set("Status", "Location unknown");
    }

    PreviousIds::from_ids(record.find_all("EADPreviousID")).apply(&mut row);
    Credits::from_record(record, &genres).apply(&mut row);
    PhysicalFacets::split(record.list("EADPhysicalFacet_tab")).apply(&mut row);

    row.set(
        "Publication Status",
        publication_status(record.get("AdmPublishWebNoPassword"), access.status).as_str(),
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

    let assets = resolver.resolve(record);
    if !assets.display_assets.is_empty() {
        if assets.redacted {
            row.set(REDACT, "Yes");
            if access.status != AccessStatus::Closed {
                row.set("Menu", MENU_READING_ROOM);
            }
        } else {
            row.set("Menu", MENU_ONLINE);
        }
    }
    row.set(ASSETS, assets.display_assets);

    Ok(Converted {
        template: classify_record(record).as_str().to_string(),
        row,
    })
}

/// Last segment of each genre heading (`Pictures--Posters` -> `Posters`)
pub fn genre_labels(record: &EmuRecord) -> Vec<String> {
    record
        .find_all("EADGenreForm")
        .into_iter()
        .filter_map(|g| g.rsplit("--").next())
        .map(|g| g.trim().to_string())
        .collect()
}

/// Creation place, most specific level first
pub fn creation_place(record: &EmuRecord) -> Option<String> {
    concat_fields(
        &[
            record.find("CreCreationPlace4"),
            record.find("CreCreationPlace3"),
            record.find("CreCreationPlace2"),
            record.find("CreCreationPlace1"),
        ],
        ", ",
    )
}

/// Own date, or `Undated` with the nearest dated ancestor's date attached
pub fn item_dates(record: &EmuRecord) -> Option<String> {
    let display = record.get("EADUnitDate").unwrap_or(UNDATED);
    if display.eq_ignore_ascii_case(UNDATED) {
        if let Some(inherited) = inherited_date(record) {
            return Some(inherited);
        }
    }
    format_date(
        Some(display),
        record.get("EADUnitDateEarliest"),
        record.get("EADUnitDateLatest"),
    )
}
