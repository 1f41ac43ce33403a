//! People and organisations (`eparties` records)

use crate::emu::EmuRecord;
use crate::error::{AppError, AppResult};
use crate::models::report::NODE_TITLE;
use crate::models::row::GROUP_DELIMITER;
use crate::models::{PublicationStatus, Row};
use crate::rules::{concat_fields, format_date};

use super::Converted;

pub const AGENT_TEMPLATE: &str = "people-and-organisations";

/// Convert a party record
pub fn convert_agent(record: &EmuRecord) -> AppResult<Converted> {
    let name = record
        .get("NamCitedName")
        .ok_or_else(|| AppError::Validation(format!("party {} has no cited name", record.irn().unwrap_or("?"))))?;
    let mut row = Row::new();

    row.set(NODE_TITLE, name);
    row.set("Internal Notes", record.get("NotNotes"));
    row.set("EMu IRN", record.irn());
    row.set("Legacy Data", record.get("AdmOriginalData"));
    row.set("Agent Type", record.get("NamPartyType"));
    let published = record
        .get("AdmPublishWebNoPassword")
        .map(|f| f.eq_ignore_ascii_case("yes"))
        .unwrap_or(false);
    row.set(
        "Publication Status",
        if published {
            PublicationStatus::Public
        } else {
            PublicationStatus::NotForPublication
        }
        .as_str(),
    );

    let life = life_dates(record.get("BioBirthDate"), record.get("BioDeathDate"));
    row.set(
        "###Dates",
        format_date(
            life.as_deref(),
            record.get("BioBirthEarliestDate"),
            record.get("BioDeathLatestDate"),
        ),
    );
    row.set(
        "History",
        concat_fields(
            &[
                record.get("BioCommencementNotes"),
                record.get("HisBeginDateNotes"),
                record.get("HisEndDateNotes"),
            ],
            "\n",
        ),
    );

    row.set("Title", record.get("NamTitle"));
    row.set("Given Name", record.get("NamFirst"));
    row.set("Middle Name", record.get("NamMiddle"));
    row.set("Family Name", record.get("NamLast"));
    row.set("Suffix", record.get("NamSuffix"));
    let mut other_names = record.list("NamOtherNames_tab");
    other_names.extend(record.list("NamOrganisationOtherNames_tab"));
    row.set("Other Names", other_names);
    row.set("Acronym", record.get("NamOrganisationAcronym"));
    row.set("Place of Birth", record.get("BioBirthPlace"));
    row.set("Place of Death", record.get("BioDeathPlace"));
    row.set("Activities & Occupations", record.list("NamSpecialities_tab"));
    row.set("Telephone (Business)", record.list("NamBusiness_tab"));
    row.set("Telephone (Mobile)", record.get("NamMobile"));
    row.set("Telephone (Home)", record.get("NamHome"));
    row.set("Gender", record.get("NamSex"));
    row.set("Website", record.get("AddWeb"));
    row.set("Email", record.get("AddEmail"));
    row.set("###Address", addresses(record));

    Ok(Converted {
        template: AGENT_TEMPLATE.to_string(),
        row,
    })
}

/// `birth-death` display date; a death date alone is not shown
pub fn life_dates(birth: Option<&str>, death: Option<&str>) -> Option<String> {
    birth.map(|b| format!("{}-{}", b, death.unwrap_or("")))
}

/// Physical and postal addresses as `type|address` groups
pub fn addresses(record: &EmuRecord) -> String {
    let address = |prefix: &str| {
        let parts: Vec<Option<&str>> = ["Street", "City", "State", "Post", "Country"]
            .iter()
            .map(|part| record.get(&format!("Add{}{}", prefix, part)))
            .collect();
        concat_fields(&parts, "|")
    };
    [("Physical", "Phys"), ("Postal", "Post")]
        .iter()
        .filter_map(|&(label, prefix)| address(prefix).map(|a| format!("{}|{}", label, a)))
        .collect::<Vec<_>>()
        .join(GROUP_DELIMITER)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emu::Value;

    #[test]
    fn test_person() {
        let record = EmuRecord::new()
            .with("irn", "9")
            .with("NamCitedName", "Smith, Jane")
            .with("NamFirst", "Jane")
            .with("NamLast", "Smith")
            .with("AdmPublishWebNoPassword", "Yes")
            .with("BioBirthDate", "1901")
            .with("BioDeathDate", "1980")
            .with("BioBirthEarliestDate", "1901")
            .with("BioDeathLatestDate", "1980")
            .with_value("NamOtherNames_tab", Value::List(vec!["Jenny Smith".into()]))
            .with("AddPhysCity", "Parkville")
            .with("AddPhysCountry", "Australia")
            .with("AddPostPost", "3010");

        let converted = convert_agent(&record).unwrap();
        let row = converted.row;
        assert_eq!(converted.template, AGENT_TEMPLATE);
        assert_eq!(row.text(NODE_TITLE), Some("Smith, Jane"));
        assert_eq!(row.text("Publication Status"), Some("Public"));
        assert_eq!(row.text("###Dates"), Some("1901-1980;01/01/1901;31/12/1980"));
        assert_eq!(row.sort_key("Other Names"), "Jenny Smith");
        assert_eq!(
            row.text("###Address"),
            Some("Physical|Parkville|Australia#ng#Postal|3010")
        );
    }

    #[test]
    fn test_life_dates() {
        assert_eq!(life_dates(Some("1901"), None).as_deref(), Some("1901-"));
        assert_eq!(life_dates(None, Some("1980")), None);
    }

    #[test]
    fn test_nameless_party_is_an_error() {
        assert!(convert_agent(&EmuRecord::new().with("irn", "1")).is_err());
    }
}
