//! Replacement of undersized multimedia images
//!
//! Each page of a catalogue item's multimedia is checked against a minimum
//! size. Undersized pages are matched by position to the master TIFs in the
//! item's share folder and a fresh derivative is made. The matching
//! multimedia record is rewritten with the derivative as its `Multimedia`
//! and the old reference moved to [`PREVIOUS_MULTIMEDIA_FIELD`].

use std::path::{Path, PathBuf};

use super::assets::AssetLocator;
use super::media::{ImageDeriver, TabularSink};
use crate::emu::{self, EmuRecord, Value};
use crate::error::AppResult;

pub const MULTIMEDIA_REF: &str = "MulMultiMediaRef_tab";
/// Field receiving the replaced multimedia reference
pub const PREVIOUS_MULTIMEDIA_FIELD: &str = "Supplementary_tab";
pub const LOG_STEM: &str = "multimedia_log";
pub const UPDATES_FILE: &str = "emultimedia_replacements.xml";

const MASTER_EXTENSIONS: [&str; 2] = ["tif", "tiff"];
const LOG_FIELDS: [&str; 9] = [
    "EADUnitID",
    "EADUnitTitle",
    "page",
    "MulMultiMediaRef_tab.irn",
    "size",
    "TIF",
    "status",
    "Multimedia",
    "error",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageStatus {
    Ok,
    Replaced,
    NoMaster,
    UnknownSize,
    Failed,
}

impl PageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PageStatus::Ok => "OK",
            PageStatus::Replaced => "JPEG replaced",
            PageStatus::NoMaster => "Poor quality, no TIF found",
            PageStatus::UnknownSize => "Size unknown",
            PageStatus::Failed => "Derivative failed",
        }
    }
}

/// Outcome for one multimedia page of an item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageReport {
    pub unit_id: String,
    pub title: String,
    pub page: usize,
    pub multimedia_irn: Option<String>,
    pub size: Option<(u32, u32)>,
    pub master: Option<PathBuf>,
    pub status: PageStatus,
    pub replacement: Option<PathBuf>,
    pub error: Option<String>,
}

impl PageReport {
    fn cells(&self) -> Vec<Option<String>> {
        vec![
            Some(self.unit_id.clone()),
            Some(self.title.clone()),
            Some(self.page.to_string()),
            self.multimedia_irn.clone(),
            self.size.map(|(w, h)| format!("{}x{}", w, h)),
            self.master.as_ref().map(|p| p.display().to_string()),
            Some(self.status.as_str().to_string()),
            self.replacement.as_ref().map(|p| p.display().to_string()),
            self.error.clone(),
        ]
    }
}

/// Pages checked and multimedia records rewritten by a run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Replacements {
    pub pages: Vec<PageReport>,
    pub updates: Vec<EmuRecord>,
}

impl Replacements {
    pub fn replaced(&self) -> usize {
        self.pages
            .iter()
            .filter(|p| p.status == PageStatus::Replaced)
            .count()
    }

    /// Write the page log and, when anything was replaced, the multimedia
    /// update export. Returns the written paths.
    pub fn write(&self, out_dir: &Path, sink: &dyn TabularSink) -> AppResult<Vec<PathBuf>> {
        let header: Vec<String> = LOG_FIELDS.iter().map(|f| f.to_string()).collect();
        let rows: Vec<Vec<Option<String>>> = self.pages.iter().map(PageReport::cells).collect();
        let mut written = vec![sink.write_sheet(&out_dir.join(LOG_STEM), &header, &rows)?];

        if !self.updates.is_empty() {
            let path = out_dir.join(UPDATES_FILE);
            emu::write_table(&path, "emultimedia", &self.updates)?;
            written.push(path);
        }
        Ok(written)
    }
}

pub struct MultimediaReplacer<'a> {
    locator: &'a dyn AssetLocator,
    deriver: &'a dyn ImageDeriver,
    dimension: u32,
    min_dimension: u32,
}

impl<'a> MultimediaReplacer<'a> {
    pub fn new(
        locator: &'a dyn AssetLocator,
        deriver: &'a dyn ImageDeriver,
        dimension: u32,
        min_dimension: u32,
    ) -> Self {
        Self {
            locator,
            deriver,
            dimension,
            min_dimension,
        }
    }

    /// Check every page of every record, writing derivatives into `out_dir`
    pub fn run(&self, records: &[EmuRecord], out_dir: &Path) -> Replacements {
        let mut out = Replacements::default();
        for record in records {
            let unit_id = record.get("EADUnitID").unwrap_or_default();
            let mut masters: Option<Vec<PathBuf>> = None;

            for (page, multimedia) in record.nodes(MULTIMEDIA_REF).iter().enumerate() {
                let mut report = PageReport {
                    unit_id: unit_id.to_string(),
                    title: record.get("EADUnitTitle").unwrap_or_default().to_string(),
                    page,
                    multimedia_irn: multimedia.irn().map(str::to_string),
                    size: image_size(multimedia),
                    master: None,
                    status: PageStatus::Ok,
                    replacement: None,
                    error: None,
                };

                match report.size {
                    None => {
                        tracing::warn!("{} page {} has no image size", unit_id, page);
                        report.status = PageStatus::UnknownSize;
                    }
                    Some((w, h)) if w.max(h) >= self.min_dimension => {}
                    Some((w, h)) => {
                        tracing::info!("{} page {} is undersized: {}x{}", unit_id, page, w, h);
                        let masters = masters.get_or_insert_with(|| self.masters(unit_id));
                        match masters.get(page) {
                            None => report.status = PageStatus::NoMaster,
                            Some(master) => {
                                report.master = Some(master.clone());
                                match self.replace(multimedia, master, out_dir) {
                                    Ok((jpeg, update)) => {
                                        report.status = PageStatus::Replaced;
                                        report.replacement = Some(jpeg);
                                        out.updates.push(update);
                                    }
                                    Err(e) => {
                                        tracing::warn!("Could not replace {} page {}: {}", unit_id, page, e);
                                        report.status = PageStatus::Failed;
                                        report.error = Some(e.to_string());
                                    }
                                }
                            }
                        }
                    }
                }
                out.pages.push(report);
            }
        }
        tracing::info!("Replaced {} of {} pages", out.replaced(), out.pages.len());
        out
    }

    /// Master TIFs of a unit in path order; page `n` maps to entry `n`
    fn masters(&self, unit_id: &str) -> Vec<PathBuf> {
        let extensions: Vec<String> = MASTER_EXTENSIONS.iter().map(|e| e.to_string()).collect();
        self.locator
            .asset_folder(unit_id)
            .map(|folder| self.locator.find_assets(&folder, &extensions))
            .unwrap_or_default()
    }

    fn replace(&self, multimedia: &EmuRecord, master: &Path, out_dir: &Path) -> AppResult<(PathBuf, EmuRecord)> {
        let jpeg = self.deriver.derive(master, out_dir, self.dimension)?;
        let mut update = EmuRecord::new();
        if let Some(irn) = multimedia.irn() {
            update.insert("irn", Value::Scalar(irn.to_string()));
        }
        update.insert(
            "Multimedia",
            Value::Scalar(multimedia.get("Multimedia").unwrap_or_default().to_string()),
        );
        update.migrate_field("Multimedia", PREVIOUS_MULTIMEDIA_FIELD)?;
        update.insert("Multimedia", Value::Scalar(jpeg.display().to_string()));
        Ok((jpeg, update))
    }
}

fn image_size(multimedia: &EmuRecord) -> Option<(u32, u32)> {
    let width = multimedia.get("ChaImageWidth")?.trim().parse().ok()?;
    let height = multimedia.get("ChaImageHeight")?.trim().parse().ok()?;
    Some((width, height))
}
