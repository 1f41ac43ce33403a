//! Asset resolution
//!
//! Multimedia references on a record become public assets or internal
//! attachments. PDF references are swapped for freshly digitised copies held
//! on the file share when any exist.

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use walkdir::WalkDir;

use super::classifier::extension_of;
use crate::emu::EmuRecord;

/// Multimedia reference group on catalogue records
pub const MULTIMEDIA_GROUP: &str = "MulMultiMediaRef_tab";
/// Web publication flag on a multimedia reference
pub const PUBLISH_FLAG: &str = "AdmPublishWebNoPassword";
/// Multimedia record status field
pub const RECORD_STATUS: &str = "SecRecordStatus";
/// Record status of finding aids generated from catalogue data
pub const FROM_EMU_DATA: &str = "From EMu data";

static REDIRECT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"window\.location\.href\s*=\s*["']([^"']*)["']"#).expect("valid redirect pattern")
});

/// Finds digitised holdings on the file share
#[cfg_attr(test, mockall::automock)]
pub trait AssetLocator: Send + Sync {
    /// Folder holding the digitised copies of a unit, if there is one
    fn asset_folder(&self, unit_id: &str) -> Option<PathBuf>;

    /// Files under `folder` with one of `extensions` (lowercase, no dot)
    fn find_assets(&self, folder: &Path, extensions: &[String]) -> Vec<PathBuf>;
}

/// Locator over `<root>/<prefix>/<middle>/<suffix>` folders
#[derive(Debug, Clone)]
pub struct ShareLocator {
    root: PathBuf,
}

impl ShareLocator {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl AssetLocator for ShareLocator {
    fn asset_folder(&self, unit_id: &str) -> Option<PathBuf> {
        let parts: Vec<&str> = unit_id.split('.').collect();
        let [prefix, middle, suffix] = parts.as_slice() else {
            tracing::debug!("Unit id {} does not map to a share folder", unit_id);
            return None;
        };
        let folder = self.root.join(prefix).join(middle).join(suffix);
        if folder.is_dir() {
            return Some(folder);
        }
        // some folders drop the suffix's leading digit
        let trimmed: String = suffix.chars().skip(1).collect();
        let folder = self.root.join(prefix).join(middle).join(trimmed);
        folder.is_dir().then_some(folder)
    }

    fn find_assets(&self, folder: &Path, extensions: &[String]) -> Vec<PathBuf> {
        let mut found: Vec<PathBuf> = WalkDir::new(folder)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| {
                p.extension()
                    .and_then(|e| e.to_str())
                    .map(|e| extensions.iter().any(|x| x.eq_ignore_ascii_case(e)))
                    .unwrap_or(false)
            })
            .collect();
        found.sort();
        found
    }
}

/// Locator used when no file share is configured
#[derive(Debug, Clone, Default)]
pub struct NoShare;

impl AssetLocator for NoShare {
    fn asset_folder(&self, _unit_id: &str) -> Option<PathBuf> {
        None
    }

    fn find_assets(&self, _folder: &Path, _extensions: &[String]) -> Vec<PathBuf> {
        Vec::new()
    }
}

/// Files attached to a record
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedAssets {
    pub display_assets: Vec<PathBuf>,
    pub attachments: Vec<PathBuf>,
    pub redacted: bool,
}

/// Finding aids attached to a series or accession
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FindingAids {
    pub assets: Vec<PathBuf>,
    pub attachments: Vec<PathBuf>,
    pub other_finding_aids: Vec<String>,
}

/// Turns multimedia references into asset lists
pub struct AssetResolver<'a> {
    locator: &'a dyn AssetLocator,
}

impl<'a> AssetResolver<'a> {
    pub fn new(locator: &'a dyn AssetLocator) -> Self {
        Self { locator }
    }

    /// Resolve a catalogue record's multimedia.
    ///
    /// Any reference not published to the web redacts the whole record.
    pub fn resolve(&self, record: &EmuRecord) -> ResolvedAssets {
        let mut resolved = ResolvedAssets::default();
        let references = record.nodes(MULTIMEDIA_GROUP);
        if references.is_empty() {
            return resolved;
        }
        let unit_id = record.get("EADUnitID").unwrap_or("");

        let flags: Vec<bool> = references
            .iter()
            .filter_map(|r| r.lookup(PUBLISH_FLAG))
            .map(|f| f.trim().eq_ignore_ascii_case("no"))
            .collect();
        if flags.iter().any(|no| *no) && flags.iter().any(|no| !*no) {
            tracing::warn!("Multiple publishing permissions for record {}", unit_id);
        }
        resolved.redacted = flags.iter().any(|no| *no);

        let mut fresh_pdfs: Option<Vec<PathBuf>> = None;
        for reference in references {
            let Some(path) = reference.lookup("Multimedia") else {
                tracing::warn!("Multimedia item not exported from EMu for {}", unit_id);
                continue;
            };
            if extension_of(path).as_deref() != Some(".pdf") {
                resolved.display_assets.push(PathBuf::from(path));
                continue;
            }
            let fresh = fresh_pdfs.get_or_insert_with(|| self.fresh_pdfs(unit_id));
            if fresh.is_empty() {
                tracing::info!("No fresh pdfs found, using EMu version for {}", unit_id);
                resolved.display_assets.push(PathBuf::from(path));
            } else {
                for pdf in fresh.iter() {
                    if !resolved.display_assets.contains(pdf) {
                        tracing::info!("Found fresh pdf in storage for {}", unit_id);
                        resolved.display_assets.push(pdf.clone());
                    }
                }
            }
        }
        resolved
    }

    fn fresh_pdfs(&self, unit_id: &str) -> Vec<PathBuf> {
        match self.locator.asset_folder(unit_id) {
            Some(folder) => self.locator.find_assets(&folder, &["pdf".to_string()]),
            None => Vec::new(),
        }
    }

    /// Resolve a recordset's finding aids.
    ///
    /// Unpublished aids and aids generated from catalogue data are internal;
    /// HTML stubs that only redirect become links.
    pub fn finding_aids(&self, record: &EmuRecord) -> FindingAids {
        let mut aids = FindingAids::default();
        for reference in record.nodes(MULTIMEDIA_GROUP) {
            let Some(path) = reference.lookup("Multimedia") else {
                tracing::warn!(
                    "Finding aid not exported from EMu for {}",
                    record.get("EADUnitID").unwrap_or("?")
                );
                continue;
            };
            let unpublished = reference
                .lookup(PUBLISH_FLAG)
                .map(|f| f.trim().eq_ignore_ascii_case("no"))
                .unwrap_or(false);
            let generated = reference.lookup(RECORD_STATUS) == Some(FROM_EMU_DATA);

            if unpublished || generated {
                aids.attachments.push(PathBuf::from(path));
            } else if extension_of(path).as_deref() == Some(".html") {
                match redirect_target(Path::new(path)) {
                    Some(url) => aids.other_finding_aids.push(url),
                    None => aids.attachments.push(PathBuf::from(path)),
                }
            } else {
                aids.assets.push(PathBuf::from(path));
            }
        }
        aids
    }
}

/// Target of a `window.location.href` redirect page
pub fn redirect_target(path: &Path) -> Option<String> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!("Could not read finding aid {}: {}", path.display(), e);
            return None;
        }
    };
    REDIRECT.captures(&text).map(|c| c[1].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emu::Value;
    use mockall::predicate::eq;

    fn reference(path: &str, publish: &str) -> EmuRecord {
        EmuRecord::new().with("Multimedia", path).with(PUBLISH_FLAG, publish)
    }

    fn record(references: Vec<EmuRecord>) -> EmuRecord {
        EmuRecord::new()
            .with("EADUnitID", "1990.0012.0003")
            .with_value(MULTIMEDIA_GROUP, Value::Nodes(references))
    }

    #[test]
    fn test_no_references() {
        let locator = MockAssetLocator::new();
        let resolved = AssetResolver::new(&locator).resolve(&EmuRecord::new());
        assert_eq!(resolved, ResolvedAssets::default());
    }

    #[test]
    fn test_fresh_pdfs_replace_declared_copy() {
        let mut locator = MockAssetLocator::new();
        locator
            .expect_asset_folder()
            .with(eq("1990.0012.0003"))
            .times(1)
            .returning(|_| Some(PathBuf::from("/share/1990/0012/0003")));
        locator
            .expect_find_assets()
            .times(1)
            .returning(|_, _| vec![PathBuf::from("/share/1990/0012/0003/a.pdf"), PathBuf::from("/share/1990/0012/0003/b.pdf")]);

        let resolved = AssetResolver::new(&locator).resolve(&record(vec![
            reference("old.pdf", "Yes"),
            reference("scan.jpg", "Yes"),
            reference("other.pdf", "Yes"),
        ]));

        assert_eq!(
            resolved.display_assets,
            vec![
                PathBuf::from("/share/1990/0012/0003/a.pdf"),
                PathBuf::from("/share/1990/0012/0003/b.pdf"),
                PathBuf::from("scan.jpg"),
            ]
        );
        assert!(!resolved.redacted);
    }

    #[test]
    fn test_declared_pdf_kept_without_fresh_copy() {
        let mut locator = MockAssetLocator::new();
        locator.expect_asset_folder().returning(|_| None);

        let resolved = AssetResolver::new(&locator).resolve(&record(vec![reference("old.pdf", "No"), reference("a.tif", "Yes")]));
        assert_eq!(resolved.display_assets, vec![PathBuf::from("old.pdf"), PathBuf::from("a.tif")]);
        assert!(resolved.redacted);
    }

    #[test]
    fn test_finding_aids() {
        let dir = tempfile::tempdir().unwrap();
        let stub = dir.path().join("guide.html");
        std::fs::write(&stub, r#"<script>window.location.href = "https://example.org/guide";</script>"#).unwrap();

        let generated = reference("list.pdf", "Yes").with(RECORD_STATUS, FROM_EMU_DATA);
        let locator = NoShare;
        let aids = AssetResolver::new(&locator).finding_aids(&record(vec![
            reference("guide.pdf", "Yes"),
            reference("private.pdf", "No"),
            generated,
            reference(stub.to_str().unwrap(), "Yes"),
        ]));

        assert_eq!(aids.assets, vec![PathBuf::from("guide.pdf")]);
        assert_eq!(aids.attachments, vec![PathBuf::from("private.pdf"), PathBuf::from("list.pdf")]);
        assert_eq!(aids.other_finding_aids, vec!["https://example.org/guide".to_string()]);
    }

    #[test]
    fn test_share_locator() {
        let dir = tempfile::tempdir().unwrap();
        let folder = dir.path().join("1990").join("0012").join("003");
        std::fs::create_dir_all(folder.join("sub")).unwrap();
        std::fs::write(folder.join("sub").join("b.PDF"), b"%PDF").unwrap();
        std::fs::write(folder.join("a.tif"), b"II").unwrap();

        let locator = ShareLocator::new(dir.path());
        let found = locator.asset_folder("1990.0012.0003").unwrap();
        assert_eq!(found, folder);
        assert_eq!(locator.find_assets(&found, &["pdf".to_string()]), vec![folder.join("sub").join("b.PDF")]);
        assert_eq!(locator.asset_folder("1990.0012"), None);
    }
}
