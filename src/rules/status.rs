//! Copyright and publication status

use crate::models::{AccessStatus, CopyrightStatus, PublicationStatus};

/// Marker phrases, checked in order
const COPYRIGHT_MARKERS: [(&str, CopyrightStatus); 5] = [
    ("out of copyright", CopyrightStatus::PublicDomain),
    ("copyright owned by university of melbourne", CopyrightStatus::UniversityCopyright),
    ("research purposes only", CopyrightStatus::PublicationRightsGranted),
    ("can only be viewed at", CopyrightStatus::InCopyright),
    ("all reasonable efforts", CopyrightStatus::OrphanWork),
];

/// Guess a copyright status from use-restriction text
pub fn guess_copyright(text: Option<&str>) -> Option<CopyrightStatus> {
    let text = text?.to_lowercase();
    COPYRIGHT_MARKERS
        .iter()
        .find(|(marker, _)| text.contains(marker))
        .map(|(_, status)| *status)
}

/// Public if the web publish flag is `yes`, otherwise closed records are not
/// for publication and everything else goes to review
pub fn publication_status(publish_flag: Option<&str>, access: AccessStatus) -> PublicationStatus {
    if publish_flag
        .map(|f| f.trim().eq_ignore_ascii_case("yes"))
        .unwrap_or(false)
    {
        PublicationStatus::Public
    } else if access == AccessStatus::Closed {
        PublicationStatus::NotForPublication
    } else {
        PublicationStatus::Review
    }
}
