//! Contributor and provenance split

use crate::emu::EmuRecord;
use crate::models::row::GROUP_DELIMITER;
use crate::models::Row;

/// Repeating group of related parties and their relationship
pub const RELATED_PARTIES: &str = "contributors";
/// Originating parties
pub const ORIGINATION: &str = "EADOriginationRef_tab";

/// Relationships that make a party a record creator
pub const CREATOR_ROLES: [&str; 7] = [
    "artist",
    "architect",
    "creator",
    "author",
    "director",
    "photographer",
    "producer",
];

pub const PROVENANCE_ROLE: &str = "Provenance";

/// Whether a relationship denotes a creator (plural forms included)
pub fn is_creator_role(role: &str) -> bool {
    let role = role.trim().to_lowercase();
    let role = role.strip_suffix('s').unwrap_or(&role);
    CREATOR_ROLES.contains(&role)
}

/// `(name, role)` pairs split into creators and other contributors
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credits {
    pub provenance: Vec<(String, String)>,
    pub contributors: Vec<(String, String)>,
}

impl Credits {
    pub fn from_record(record: &EmuRecord, genre_terms: &[String]) -> Self {
        let is_photograph = genre_terms.iter().any(|t| t.contains("photograph"));
        let mut credits = Self::default();

        let parties = record.find_in_group(RELATED_PARTIES, &["AssRelatedPartiesRelationship", "NamCitedName"]);
        for party in parties {
            let Some(name) = party.get("NamCitedName").cloned().flatten() else {
                tracing::warn!("Related party without a name on record {}", record.irn().unwrap_or("?"));
                continue;
            };
            let role = match party.get("AssRelatedPartiesRelationship").cloned().flatten() {
                Some(role) => role,
                None if is_photograph => "Photographer".to_string(),
                None => String::new(),
            };
            if is_creator_role(&role) {
                credits.provenance.push((name, role));
            } else {
                credits.contributors.push((name, role));
            }
        }

        for origin in record.find_in_group(ORIGINATION, &["NamCitedName"]) {
            let Some(name) = origin.get("NamCitedName").cloned().flatten() else {
                continue;
            };
            if !credits.provenance.iter().any(|(n, _)| *n == name) {
                credits.provenance.push((name, PROVENANCE_ROLE.to_string()));
            }
        }
        credits
    }

    pub fn apply(&self, row: &mut Row) {
        row.set("###Provenance", join_pairs(&self.provenance));
        row.set("###Contributor", join_pairs(&self.contributors));
    }
}

fn join_pairs(pairs: &[(String, String)]) -> String {
    pairs
        .iter()
        .map(|(name, role)| format!("{}|{}", name, role))
        .collect::<Vec<_>>()
        .join(GROUP_DELIMITER)
}
