//! Node identifiers and previous-identifier disambiguation

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::Row;

pub const ITEM_PREFIX: &str = "UMA-ITE-";
pub const SERIES_PREFIX: &str = "UMA-SRE-";
pub const ACCESSION_PREFIX: &str = "UMA-ACE-";

static FORMAT_NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^((BWP|CP|OSB|BWN|CN|GPN|NN|SL|PA)[A-D]?/?\d{1,5})").expect("valid format number pattern")
});
static UMAIC_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^UMA/I/\d{1,5}").expect("valid UMAIC pattern"));
static FINDING_AID_REFERENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{1,2}(/\d{1,2})*").expect("valid finding aid pattern"));

/// ReCollect identifier for an EMu unit id (`1234.0001` -> `UMA-ITE-12340001`)
pub fn node_identifier(prefix: &str, unit_id: &str) -> String {
    format!("{}{}", prefix, unit_id.replace('.', ""))
}

/// `[unit id] title` label used to link to parent nodes
pub fn labelled(unit_id: Option<&str>, title: &str) -> String {
    format!("[{}] {}", unit_id.unwrap_or(""), title)
}

/// Kind of a previous identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviousIdKind {
    FormatNumber,
    UmaicId,
    FindingAidReference,
    Classification,
    Other,
}

impl PreviousIdKind {
    /// Target field for this kind of identifier
    pub fn field(&self) -> &'static str {
        match self {
            PreviousIdKind::FormatNumber => "Format Number",
            PreviousIdKind::UmaicId => "UMAIC ID",
            PreviousIdKind::FindingAidReference => "Finding Aid Reference",
            PreviousIdKind::Classification => "Classification",
            PreviousIdKind::Other => "Other IDs",
        }
    }
}

/// Classify one previous identifier; patterns are tried in fixed order
pub fn classify_previous_id(id: &str) -> PreviousIdKind {
    if FORMAT_NUMBER.is_match(id) {
        PreviousIdKind::FormatNumber
    } else if UMAIC_ID.is_match(id) {
        PreviousIdKind::UmaicId
    } else if FINDING_AID_REFERENCE.is_match(id) {
        PreviousIdKind::FindingAidReference
    } else if id.starts_with("YFA") {
        PreviousIdKind::Classification
    } else {
        PreviousIdKind::Other
    }
}

/// Previous identifiers sorted into their target fields.
///
/// Each field holds one value; when several identifiers of the same kind are
/// present the last one wins and the overwrite is logged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreviousIds {
    values: Vec<(PreviousIdKind, String)>,
}

impl PreviousIds {
    pub fn from_ids<'a>(ids: impl IntoIterator<Item = &'a str>) -> Self {
        let mut out = Self::default();
        for id in ids {
            let kind = classify_previous_id(id);
            match out.values.iter_mut().find(|(k, _)| *k == kind) {
                Some((_, existing)) => {
                    tracing::warn!(
                        "Replacing {} {} with {}",
                        kind.field(),
                        existing,
                        id
                    );
                    *existing = id.to_string();
                }
                None => out.values.push((kind, id.to_string())),
            }
        }
        out
    }

    pub fn get(&self, kind: PreviousIdKind) -> Option<&str> {
        self.values
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, v)| v.as_str())
    }

    pub fn apply(&self, row: &mut Row) {
        for (kind, value) in &self.values {
            row.set(kind.field(), value.as_str());
        }
    }
}

/// Split recordset previous ids into records-services ids (`UM` prefix) and
/// other ids
pub fn records_services_ids<'a>(ids: impl IntoIterator<Item = &'a str>) -> (Vec<String>, Vec<String>) {
    ids.into_iter()
        .map(String::from)
        .partition(|id| id.starts_with("UM"))
}
