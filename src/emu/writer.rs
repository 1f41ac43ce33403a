//! EMu XML writer
//!
//! Serializes records back into the export format so each migrated row can
//! carry an auditable snapshot of its source record.

use std::io::Write;
use std::path::Path;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use super::record::{table_stem, EmuRecord, Value};
use crate::error::{AppError, AppResult};

/// Render records as an EMu `table` document
pub fn to_xml_string(table: &str, records: &[EmuRecord]) -> AppResult<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))
        .map_err(AppError::xml)?;

    let mut root = BytesStart::new("table");
    root.push_attribute(("name", table));
    writer.write_event(Event::Start(root)).map_err(AppError::xml)?;
    for record in records {
        write_tuple(&mut writer, None, record)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new("table")))
        .map_err(AppError::xml)?;

    String::from_utf8(writer.into_inner()).map_err(AppError::xml)
}

/// Write records to an EMu XML file
pub fn write_table(path: &Path, table: &str, records: &[EmuRecord]) -> AppResult<()> {
    let xml = to_xml_string(table, records)?;
    std::fs::write(path, xml)?;
    Ok(())
}

fn write_tuple<W: Write>(writer: &mut Writer<W>, name: Option<&str>, record: &EmuRecord) -> AppResult<()> {
    let mut start = BytesStart::new("tuple");
    if let Some(name) = name {
        start.push_attribute(("name", name));
    }
    if record.is_empty() {
        return writer.write_event(Event::Empty(start)).map_err(AppError::xml);
    }
    writer.write_event(Event::Start(start)).map_err(AppError::xml)?;

    for (key, value) in record.fields() {
        match value {
            Value::Scalar(text) => write_atom(writer, key, text)?,
            Value::Node(child) => write_tuple(writer, Some(key), child)?,
            Value::List(items) => {
                open_table(writer, key)?;
                let stem = table_stem(key);
                for item in items {
                    writer
                        .write_event(Event::Start(BytesStart::new("tuple")))
                        .map_err(AppError::xml)?;
                    write_atom(writer, stem, item)?;
                    writer
                        .write_event(Event::End(BytesEnd::new("tuple")))
                        .map_err(AppError::xml)?;
                }
                close_table(writer)?;
            }
            Value::Nodes(rows) => {
                open_table(writer, key)?;
                for row in rows {
                    write_tuple(writer, None, row)?;
                }
                close_table(writer)?;
            }
        }
    }

    writer
        .write_event(Event::End(BytesEnd::new("tuple")))
        .map_err(AppError::xml)
}

fn write_atom<W: Write>(writer: &mut Writer<W>, name: &str, text: &str) -> AppResult<()> {
    let mut start = BytesStart::new("atom");
    start.push_attribute(("name", name));
    if text.is_empty() {
        return writer.write_event(Event::Empty(start)).map_err(AppError::xml);
    }
    writer.write_event(Event::Start(start)).map_err(AppError::xml)?;
    writer
        .write_event(Event::Text(BytesText::new(text)))
        .map_err(AppError::xml)?;
    writer
        .write_event(Event::End(BytesEnd::new("atom")))
        .map_err(AppError::xml)
}

fn open_table<W: Write>(writer: &mut Writer<W>, name: &str) -> AppResult<()> {
    let mut start = BytesStart::new("table");
    start.push_attribute(("name", name));
    writer.write_event(Event::Start(start)).map_err(AppError::xml)
}

fn close_table<W: Write>(writer: &mut Writer<W>) -> AppResult<()> {
    writer
        .write_event(Event::End(BytesEnd::new("table")))
        .map_err(AppError::xml)
}
