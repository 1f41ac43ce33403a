//! Template selection for catalogue items

use crate::emu::{EmuRecord, Value};
use crate::models::ItemTemplate;
use crate::rules::hierarchy::LEVEL_FIELD;

/// Title prefix marking legacy digital asset records
pub const LEGACY_ASSET_PREFIX: &str = "Digital Asset:";

const IMAGE_EXTENSIONS: [&str; 4] = [".tif", ".tiff", ".jpg", ".jpeg"];

/// Pick the presentation template for an item.
///
/// Overrides apply in order, the last applicable one winning: genre terms,
/// asset extensions, multiple-items level, parent records, legacy titles.
/// A parent record therefore uses `item` even at the multiple-items level.
pub fn classify(
    genre_terms: &[String],
    extensions: &[String],
    level: Option<&str>,
    is_parent: bool,
    title: Option<&str>,
) -> ItemTemplate {
    let has_term = |term: &str| genre_terms.iter().any(|t| t == term);
    let has_prefix = |prefix: &str| genre_terms.iter().any(|t| t.starts_with(prefix));
    let has_extension = |wanted: &[&str]| extensions.iter().any(|e| wanted.contains(&e.as_str()));

    let mut template = if has_term("pictures") {
        if has_term("design drawings") || has_term("architectural drawings") {
            ItemTemplate::Plan
        } else if has_term("posters") {
            ItemTemplate::Poster
        } else {
            ItemTemplate::Image
        }
    } else if has_prefix("moving image") {
        ItemTemplate::MovingImage
    } else if has_prefix("audio recordings") {
        ItemTemplate::Sound
    } else {
        ItemTemplate::Item
    };

    if template == ItemTemplate::Item {
        if has_extension(&IMAGE_EXTENSIONS) {
            template = ItemTemplate::Image;
        } else if has_extension(&[".pdf"]) {
            template = ItemTemplate::Document;
        }
    }
    if level
        .map(|l| l.trim().eq_ignore_ascii_case("multiple items"))
        .unwrap_or(false)
    {
        template = ItemTemplate::MultipleItems;
    }
    if is_parent {
        template = ItemTemplate::Item;
    }
    if title.map(|t| t.starts_with(LEGACY_ASSET_PREFIX)).unwrap_or(false) {
        template = ItemTemplate::LegacyAsset;
    }
    template
}

/// Classify a record from its own fields
pub fn classify_record(record: &EmuRecord) -> ItemTemplate {
    classify(
        &genre_terms(record),
        &asset_extensions(record),
        record.get(LEVEL_FIELD),
        is_parent(record),
        record.get("EADUnitTitle"),
    )
}

/// Lowercased, de-duplicated genre terms (`Pictures--Posters` gives two terms)
pub fn genre_terms(record: &EmuRecord) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    for genre in record.find_all("EADGenreForm") {
        for term in genre.split('-').map(str::trim).filter(|t| !t.is_empty()) {
            let term = term.to_lowercase();
            if !terms.contains(&term) {
                terms.push(term);
            }
        }
    }
    terms
}

/// Lowercased extensions (with the dot) of every multimedia reference
pub fn asset_extensions(record: &EmuRecord) -> Vec<String> {
    let mut extensions: Vec<String> = Vec::new();
    for path in record.find_all("Multimedia") {
        if let Some(ext) = extension_of(path) {
            if !extensions.contains(&ext) {
                extensions.push(ext);
            }
        }
    }
    extensions
}

/// Extension of a path exported from either Windows or POSIX systems
pub fn extension_of(path: &str) -> Option<String> {
    let name = path.rsplit(['/', '\\']).next()?;
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(format!(".{}", ext.to_lowercase()))
}

/// Whether the record lists sub-items of its own
pub fn is_parent(record: &EmuRecord) -> bool {
    match record.field("Subitems") {
        Some(Value::Scalar(s)) => !s.is_empty(),
        Some(Value::List(items)) => items.iter().any(|s| !s.is_empty()),
        Some(Value::Node(r)) => !r.is_empty(),
        Some(Value::Nodes(rs)) => !rs.is_empty(),
        None => false,
    }
}
