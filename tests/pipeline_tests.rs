//! End-to-end migration tests against the shipped templates

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use emu_migrate::config::TemplatesConfig;
use emu_migrate::emu::parse_str;
use emu_migrate::models::{AuditLogIndex, TemplateStore};
use emu_migrate::services::assets::NoShare;
use emu_migrate::services::batch::BatchOptions;
use emu_migrate::services::media::{CsvSink, ImageDeriver, PdfMerger};
use emu_migrate::services::pipeline::Migration;
use emu_migrate::services::Services;
use emu_migrate::{AppError, AppResult};

struct FailingMerger;

impl PdfMerger for FailingMerger {
    fn merge(&self, _inputs: &[PathBuf], _output: &Path) -> AppResult<()> {
        Err(AppError::Pdf("not available in tests".to_string()))
    }
}

struct NoDeriver;

impl ImageDeriver for NoDeriver {
    fn derive(&self, source: &Path, _out_dir: &Path, _dimension: u32) -> AppResult<PathBuf> {
        Err(AppError::Image(source.display().to_string()))
    }
}

fn services() -> Services {
    Services {
        locator: Box::new(NoShare),
        merger: Box::new(FailingMerger),
        sink: Box::new(CsvSink),
        deriver: Arc::new(NoDeriver),
    }
}

fn templates() -> TemplateStore {
    let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("templates");
    TemplateStore::load_dir(&dir, &TemplatesConfig::default()).unwrap()
}

/// Rows of a written batch keyed by header
fn read_sheet(path: &Path) -> Vec<HashMap<String, String>> {
    let text = std::fs::read_to_string(path).unwrap();
    let text = text.strip_prefix('\u{feff}').unwrap();
    let mut reader = csv::Reader::from_reader(text.as_bytes());
    let headers = reader.headers().unwrap().clone();
    reader
        .records()
        .map(|r| {
            let r = r.unwrap();
            headers
                .iter()
                .zip(r.iter())
                .map(|(h, v)| (h.to_string(), v.to_string()))
                .collect()
        })
        .collect()
}

const CATALOGUE: &str = r#"<?xml version="1.0" encoding="UTF-8" ?>
<table name="ecatalogue">
  <tuple>
    <atom name="irn">42</atom>
    <atom name="EADUnitID">1234.0001.0002</atom>
    <atom name="EADUnitTitle">Photograph of campus</atom>
    <atom name="EADLevelAttribute">Item</atom>
    <atom name="AdmPublishWebNoPassword">Yes</atom>
    <table name="EADGenreForm_tab">
      <tuple><atom name="EADGenreForm">Pictures</atom></tuple>
    </table>
    <tuple name="AssParentObjectRef">
      <atom name="EADUnitID">1234.0001</atom>
      <atom name="EADUnitTitle">Photographs</atom>
      <atom name="EADLevelAttribute">Series</atom>
    </tuple>
  </tuple>
  <tuple>
    <atom name="irn">42</atom>
    <atom name="EADUnitID">1234.0001.0002</atom>
    <atom name="EADUnitTitle">Photograph of campus</atom>
    <atom name="EADLevelAttribute">Item</atom>
    <atom name="AdmPublishWebNoPassword">Yes</atom>
    <table name="EADGenreForm_tab">
      <tuple><atom name="EADGenreForm">Pictures</atom></tuple>
    </table>
    <tuple name="AssParentObjectRef">
      <atom name="EADUnitID">1234.0001</atom>
      <atom name="EADUnitTitle">Photographs</atom>
      <atom name="EADLevelAttribute">Series</atom>
    </tuple>
  </tuple>
  <tuple>
    <atom name="irn">43</atom>
    <atom name="EADUnitID">1234.0001.0003</atom>
    <atom name="EADUnitTitle">Loose correspondence</atom>
    <atom name="EADLevelAttribute">Multiple Items</atom>
    <atom name="EADAccessRestrictions">Closed.</atom>
  </tuple>
  <tuple>
    <atom name="irn">44</atom>
    <atom name="EADUnitTitle">No unit id</atom>
  </tuple>
</table>
"#;

#[test]
fn test_items_end_to_end() {
    let services = services();
    let out = tempfile::tempdir().unwrap();
    let audit = AuditLogIndex::from_text("AudKey,AudOperation\n42,insert\n42,update\n").unwrap();
    let records = parse_str(CATALOGUE).unwrap();

    let mut migration = Migration::new(&services, templates(), Some(&audit), out.path()).unwrap();
    migration.items(&records, None);
    let summary = migration
        .finish(&BatchOptions::new("t1").sorted_by("Identifier"))
        .unwrap();

    assert_eq!(summary.converted, 2);
    assert_eq!(summary.duplicates, 1);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.batches.len(), 2);

    let images = read_sheet(&out.path().join("image_t1_1.csv"));
    assert_eq!(images.len(), 1);
    let photo = &images[0];
    assert_eq!(photo["Node Title"], "Photograph of campus");
    assert_eq!(photo["Identifier"], "UMA-ITE-123400010002");
    assert_eq!(photo["Previous System ID"], "1234.0001.0002");
    assert_eq!(photo["Series"], "[1234.0001] Photographs");
    assert_eq!(photo["Publication Status"], "Public");
    assert_eq!(photo["Genre/Form"], "Pictures");
    assert_eq!(photo["###Dates"], "Undated;;");
    assert_eq!(photo["EMu IRN"], "42");
    assert_eq!(photo["ASSETS"], "");
    assert_eq!(
        photo["ATTACHMENTS"],
        "image_t1_1/uma-ite-123400010002.xml|image_t1_1/42.csv"
    );

    let snapshot = std::fs::read_to_string(out.path().join("image_t1_1/uma-ite-123400010002.xml")).unwrap();
    let reparsed = parse_str(&snapshot).unwrap();
    assert_eq!(reparsed, vec![records[0].clone()]);
    let log = std::fs::read_to_string(out.path().join("image_t1_1/42.csv")).unwrap();
    assert_eq!(log.lines().count(), 3);

    let multiple = read_sheet(&out.path().join("multiple-items_t1_1.csv"));
    assert_eq!(multiple.len(), 1);
    assert_eq!(multiple[0]["Access Status"], "Closed for public access");
    assert_eq!(multiple[0]["Access Conditions"], "");
    assert_eq!(multiple[0]["Publication Status"], "Not for publication");

    assert!(out.path().join("image_t1_1").is_dir());
    let leftovers: Vec<_> = std::fs::read_dir(out.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with(".snapshots"))
        .collect();
    assert!(leftovers.is_empty());
}

#[test]
fn test_recordsets_and_lots() {
    let catalogue = r#"<table name="ecatalogue">
  <tuple>
    <atom name="irn">7</atom>
    <atom name="EADUnitID">1990.0001</atom>
    <atom name="EADUnitTitle">Registrar's papers</atom>
    <atom name="EADLevelAttribute">Series</atom>
    <table name="EADExtent_tab">
      <tuple><atom name="EADExtent">3 boxes (0.5 m)</atom></tuple>
    </table>
  </tuple>
  <tuple>
    <atom name="irn">8</atom>
    <atom name="EADUnitID">1990.0001.0001</atom>
    <atom name="EADLevelAttribute">Item</atom>
  </tuple>
</table>"#;
    let lots = r#"<table name="eaccessionlots">
  <tuple>
    <atom name="irn">900</atom>
    <atom name="LotDescription">Minutes transferred from the Registrar</atom>
  </tuple>
</table>"#;

    let services = services();
    let out = tempfile::tempdir().unwrap();
    let mut migration = Migration::new(&services, templates(), None, out.path()).unwrap();
    migration.recordsets(&parse_str(catalogue).unwrap(), &parse_str(lots).unwrap());
    let summary = migration.finish(&BatchOptions::new("r1")).unwrap();

    assert_eq!(summary.converted, 2);
    assert_eq!(summary.skipped, 1);

    let series = read_sheet(&out.path().join("series_r1_1.csv"));
    assert_eq!(series[0]["Node Title"], "[1990.0001] Registrar's papers");
    assert_eq!(series[0]["Identifier"], "UMA-SRE-19900001");
    assert_eq!(series[0]["Extent"], "3 boxes");
    assert_eq!(series[0]["Linear Meterage"], "0.5");

    let accessions = read_sheet(&out.path().join("accession_r1_1.csv"));
    assert_eq!(accessions[0]["Node Title"], "Accession lot 900");
    assert_eq!(accessions[0]["EMu Accession Lot IRN"], "900");
    assert_eq!(accessions[0]["Lot Description"], "Minutes transferred from the Registrar");
}

#[test]
fn test_every_converter_fits_its_template() {
    let parties = r#"<table name="eparties">
  <tuple>
    <atom name="irn">1</atom>
    <atom name="NamCitedName">University of Melbourne</atom>
    <atom name="NamPartyType">Organisation</atom>
    <atom name="AddPostCity">Parkville</atom>
  </tuple>
</table>"#;
    let locations = r#"<table name="elocations">
  <tuple>
    <atom name="irn">2</atom>
    <atom name="LocHolderName">Unit 15</atom>
  </tuple>
</table>"#;
    let multimedia = r#"<table name="emultimedia">
  <tuple>
    <atom name="irn">3</atom>
    <atom name="MulTitle">Deposit agreement 1990</atom>
  </tuple>
</table>"#;

    let services = services();
    let out = tempfile::tempdir().unwrap();
    let mut migration = Migration::new(&services, templates(), None, out.path()).unwrap();
    migration.agents(&parse_str(parties).unwrap());
    migration.units(&parse_str(locations).unwrap());
    migration.agreements(&parse_str(multimedia).unwrap());
    let summary = migration.finish(&BatchOptions::new("m1")).unwrap();

    assert_eq!(summary.converted, 3);
    assert_eq!(summary.skipped, 0);

    let agents = read_sheet(&out.path().join("people-and-organisations_m1_1.csv"));
    assert_eq!(agents[0]["###Address"], "Postal|Parkville");
    assert_eq!(agents[0]["Publication Status"], "Not for publication");
    let units = read_sheet(&out.path().join("unit_m1_1.csv"));
    assert_eq!(units[0]["Node Title"], "Unit 0015");
    let agreements = read_sheet(&out.path().join("agreement_m1_1.csv"));
    assert_eq!(agreements[0]["Node Title"], "Deposit agreement 1990");
    assert_eq!(agreements[0]["ATTACHMENTS"], "agreement_m1_1/deposit-agreement-1990.xml");
}
