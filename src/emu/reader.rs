//! EMu XML export reader
//!
//! Parses an EMu XML report (`table` of `tuple` records built from `atom`,
//! `tuple` and `table` children) into [`EmuRecord`] trees.

use std::path::Path;

use once_cell::sync::Lazy;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use regex::Regex;

use super::record::{table_stem, EmuRecord, Value};
use crate::error::{AppError, AppResult};

static ENCODING_DECL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\s+encoding\s*=\s*("[^"]*"|'[^']*')"#).expect("valid encoding pattern")
});

/// Remove characters EMu leaves in exports that break XML parsing
pub fn sanitize(text: &str) -> String {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\u{0}'..='\u{7}' => out.push(' '),
            '\u{13}' | '\u{18}' | '\u{19}' => {}
            '\u{2013}' | '\u{2014}' => out.push('-'),
            _ => out.push(c),
        }
    }

    // Exports declare an encoding that rarely matches the bytes; drop it.
    if out.starts_with("<?xml") {
        if let Some(end) = out.find("?>") {
            let decl = ENCODING_DECL.replace_all(&out[..end], "").into_owned();
            out.replace_range(..end, &decl);
        }
    }
    out
}

/// Read every top-level record from an EMu XML file
pub fn read_path(path: &Path) -> AppResult<Vec<EmuRecord>> {
    let bytes = std::fs::read(path)?;
    let text = String::from_utf8_lossy(&bytes);
    tracing::info!("Parsing EMu export {}", path.display());
    parse_str(&text)
}

enum Frame {
    Root,
    Tuple { name: Option<String>, record: EmuRecord },
    Table { name: String, rows: Vec<EmuRecord> },
    Atom { name: String, text: String },
    Other,
}

/// Parse an EMu XML document held in memory
pub fn parse_str(text: &str) -> AppResult<Vec<EmuRecord>> {
    let clean = sanitize(text);
    let mut reader = Reader::from_str(&clean);
    let mut stack: Vec<Frame> = Vec::new();
    let mut records = Vec::new();

    loop {
        let event = match reader.read_event() {
            Ok(event) => event,
            Err(e) => {
                return Err(AppError::Xml(format!(
                    "malformed export at byte {}: {}",
                    reader.buffer_position(),
                    e
                )))
            }
        };
        match event {
            Event::Start(e) => {
                let frame = open_frame(&e, stack.is_empty())?;
                stack.push(frame);
            }
            Event::Empty(e) => {
                let frame = open_frame(&e, stack.is_empty())?;
                close_frame(frame, &mut stack, &mut records);
            }
            Event::End(_) => {
                if let Some(frame) = stack.pop() {
                    close_frame(frame, &mut stack, &mut records);
                }
            }
            Event::Text(t) => {
                if let Some(Frame::Atom { text, .. }) = stack.last_mut() {
                    text.push_str(&t.unescape().map_err(AppError::xml)?);
                }
            }
            Event::CData(c) => {
                if let Some(Frame::Atom { text, .. }) = stack.last_mut() {
                    text.push_str(&String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    tracing::debug!("Parsed {} records", records.len());
    Ok(records)
}

fn name_attribute(e: &BytesStart) -> AppResult<Option<String>> {
    match e.try_get_attribute("name").map_err(AppError::xml)? {
        Some(attr) => Ok(Some(attr.unescape_value().map_err(AppError::xml)?.into_owned())),
        None => Ok(None),
    }
}

fn open_frame(e: &BytesStart, is_root: bool) -> AppResult<Frame> {
    let name = name_attribute(e)?;
    let frame = match e.name().as_ref() {
        b"tuple" => Frame::Tuple {
            name,
            record: EmuRecord::new(),
        },
        _ if is_root => Frame::Root,
        b"table" => Frame::Table {
            name: name.unwrap_or_default(),
            rows: Vec::new(),
        },
        b"atom" => Frame::Atom {
            name: name.unwrap_or_default(),
            text: String::new(),
        },
        _ => Frame::Other,
    };
    Ok(frame)
}

fn close_frame(frame: Frame, stack: &mut [Frame], records: &mut Vec<EmuRecord>) {
    match frame {
        Frame::Tuple { name, record } => match stack.last_mut() {
            Some(Frame::Table { rows, .. }) => rows.push(record),
            Some(Frame::Tuple { record: parent, .. }) => match name {
                Some(name) => parent.insert(name, Value::Node(record)),
                None => tracing::warn!("Skipping unnamed nested tuple"),
            },
            Some(Frame::Root) | None => records.push(record),
            Some(_) => {}
        },
        Frame::Table { name, rows } => {
            if let Some(Frame::Tuple { record: parent, .. }) = stack.last_mut() {
                let value = table_value(&name, rows);
                parent.insert(name, value);
            }
        }
        Frame::Atom { name, text } => {
            if let Some(Frame::Tuple { record: parent, .. }) = stack.last_mut() {
                parent.insert(name, Value::Scalar(text));
            }
        }
        Frame::Root | Frame::Other => {}
    }
}

/// A table whose rows each hold at most the single stem atom is a repeating
/// simple field; anything richer stays a table of records. A table with no
/// rows reads as an empty list, whichever kind was written.
fn table_value(name: &str, rows: Vec<EmuRecord>) -> Value {
    if rows.is_empty() {
        return Value::List(Vec::new());
    }
    let stem = table_stem(name);
    let simple = rows.iter().any(|r| !r.is_empty())
        && rows.iter().all(|r| {
            r.is_empty() || (r.len() == 1 && matches!(r.field(stem), Some(Value::Scalar(_))))
        });
    if !simple {
        return Value::Nodes(rows);
    }
    Value::List(
        rows.iter()
            .map(|r| match r.field(stem) {
                Some(Value::Scalar(s)) => s.clone(),
                _ => String::new(),
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"<?xml version="1.0" encoding="UTF-8" ?>
<table name="ecatalogue">
  <tuple>
    <atom name="irn">1001</atom>
    <atom name="EADUnitTitle">Staff &amp; students</atom>
    <atom name="EADUnitDate"></atom>
    <table name="EADGenreForm_tab">
      <tuple><atom name="EADGenreForm">Pictures--Photographs</atom></tuple>
      <tuple><atom name="EADGenreForm">Posters</atom></tuple>
    </table>
    <tuple name="AssParentObjectRef">
      <atom name="EADUnitID">1234.0001</atom>
      <atom name="EADLevelAttribute">Series</atom>
    </tuple>
    <table name="MulMultiMediaRef_tab">
      <tuple>
        <atom name="Multimedia">C:\temp\a.jpg</atom>
        <atom name="AdmPublishWebNoPassword">Yes</atom>
      </tuple>
    </table>
  </tuple>
  <tuple>
    <atom name="irn">1002</atom>
  </tuple>
</table>
"#;

    #[test]
    fn test_parse_document() {
        let records = parse_str(DOC).unwrap();
        assert_eq!(records.len(), 2);

        let first = &records[0];
        assert_eq!(first.irn(), Some("1001"));
        assert_eq!(first.get("EADUnitTitle"), Some("Staff & students"));
        assert_eq!(first.get("EADUnitDate"), None);
        assert!(first.field("EADUnitDate").is_some());
        assert_eq!(first.list("EADGenreForm_tab"), vec!["Pictures--Photographs", "Posters"]);
        assert_eq!(first.get("AssParentObjectRef.EADLevelAttribute"), Some("Series"));
        assert_eq!(first.nodes("MulMultiMediaRef_tab").len(), 1);
        assert_eq!(records[1].irn(), Some("1002"));
    }

    #[test]
    fn test_sanitize_control_characters_and_dashes() {
        let clean = sanitize("<?xml version=\"1.0\" encoding=\"UTF-8\"?><a>x\u{1}y\u{19}z \u{2014} \u{2013}</a>");
        assert_eq!(clean, "<?xml version=\"1.0\"?><a>x yz - -</a>");
    }

    #[test]
    fn test_bad_encoding_declaration_is_ignored() {
        let doc = "<?xml version=\"1.0\" encoding=\"bogus-8\"?><table><tuple><atom name=\"irn\">7</atom></tuple></table>";
        let records = parse_str(doc).unwrap();
        assert_eq!(records[0].irn(), Some("7"));
    }

    #[test]
    fn test_control_characters_inside_text() {
        let doc = "<table><tuple><atom name=\"EADUnitTitle\">Dean\u{2013}s office\u{18}</atom></tuple></table>";
        let records = parse_str(doc).unwrap();
        assert_eq!(records[0].get("EADUnitTitle"), Some("Dean-s office"));
    }

    #[test]
    fn test_malformed_document_errors() {
        assert!(parse_str("<table><tuple><atom name=\"irn\">1</tuple></table>").is_err());
    }

    #[test]
    fn test_empty_table_reads_as_empty_list() {
        let records = parse_str(
            r#"<table name="ecatalogue"><tuple>
                <table name="EADSubject_tab"></table>
                <table name="MulMultiMediaRef_tab"><tuple/></table>
            </tuple></table>"#,
        )
        .unwrap();

        let record = &records[0];
        assert_eq!(record.field("EADSubject_tab"), Some(&Value::List(vec![])));
        assert!(record.list("EADSubject_tab").is_empty());
        assert!(record.nodes("EADSubject_tab").is_empty());
        assert_eq!(
            record.field("MulMultiMediaRef_tab"),
            Some(&Value::Nodes(vec![EmuRecord::new()]))
        );
    }
}
