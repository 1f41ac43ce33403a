//! Access status resolution

use once_cell::sync::Lazy;
use regex::Regex;

use crate::emu::EmuRecord;
use crate::models::AccessStatus;

/// Free-text access restrictions field
pub const ACCESS_FIELD: &str = "EADAccessRestrictions";

static ACCESS_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(access:?\s+)?(part[ -]restricted|open|closed|restricted)\b")
        .expect("valid access pattern")
});

/// Resolved access for a record
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Access {
    pub status: AccessStatus,
    /// Conditions text with the matched status phrase removed
    pub conditions: Option<String>,
}

/// Find a status keyword in one conditions text
pub fn find_access(conditions: &str) -> Option<Access> {
    let found = ACCESS_PATTERN.captures(conditions)?;
    let phrase = found.get(0)?.as_str();
    let status = AccessStatus::from_keyword(found.get(2)?.as_str());
    let residual = conditions
        .replace(phrase, "")
        .replace("  ", " ")
        .trim_matches(|c| c == '.' || c == ' ')
        .to_string();
    Some(Access {
        status,
        conditions: if residual.is_empty() { None } else { Some(residual) },
    })
}

/// Resolve access from the record's own conditions, then its ancestors',
/// nearest first. The first text naming a status wins.
pub fn resolve_access(record: &EmuRecord) -> Access {
    let own = record.get(ACCESS_FIELD);
    let candidates = own
        .into_iter()
        .chain(record.ancestors().into_iter().filter_map(|a| a.get(ACCESS_FIELD)));
    for text in candidates {
        if let Some(access) = find_access(text) {
            return access;
        }
    }
    Access {
        status: AccessStatus::NotDetermined,
        conditions: own.map(String::from),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emu::{Value, PARENT_REF};

    #[test]
    fn test_single_keyword_gives_empty_conditions() {
        for (text, status) in [
            ("Open", AccessStatus::Open),
            ("Closed.", AccessStatus::Closed),
            ("Restricted", AccessStatus::Restricted),
            ("Part restricted", AccessStatus::PartRestricted),
            ("part-restricted", AccessStatus::PartRestricted),
            ("Access: Closed", AccessStatus::Closed),
        ] {
            let access = find_access(text).unwrap();
            assert_eq!(access.status, status, "{}", text);
            assert_eq!(access.conditions, None, "{}", text);
        }
    }

    #[test]
    fn test_residual_conditions() {
        let access = find_access("Closed. Contact the archivist for permission.").unwrap();
        assert_eq!(access.status, AccessStatus::Closed);
        assert_eq!(access.conditions.as_deref(), Some("Contact the archivist for permission"));
        assert!(find_access("Access restrictions apply to staff files").is_none());
    }

    #[test]
    fn test_inherits_from_nearest_ancestor() {
        let series = EmuRecord::new().with(ACCESS_FIELD, "Open");
        let parent = EmuRecord::new()
            .with(ACCESS_FIELD, "Closed until 2030")
            .with_value(PARENT_REF, Value::Node(series));
        let record = EmuRecord::new()
            .with(ACCESS_FIELD, "See series")
            .with_value(PARENT_REF, Value::Node(parent));

        let access = resolve_access(&record);
        assert_eq!(access.status, AccessStatus::Closed);
        assert_eq!(access.conditions.as_deref(), Some("until 2030"));
    }

    #[test]
    fn test_undetermined_keeps_own_text() {
        let record = EmuRecord::new().with(ACCESS_FIELD, "Ask at desk");
        let access = resolve_access(&record);
        assert_eq!(access.status, AccessStatus::NotDetermined);
        assert_eq!(access.conditions.as_deref(), Some("Ask at desk"));
        assert_eq!(resolve_access(&EmuRecord::new()), Access::default());
    }
}
