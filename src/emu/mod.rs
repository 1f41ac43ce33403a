//! EMu export handling
//!
//! This module parses EMu XML reports into record trees and writes them
//! back out as audit snapshots.

pub mod reader;
pub mod record;
pub mod writer;

pub use reader::{parse_str, read_path};
pub use record::{EmuRecord, Projection, Value, PARENT_REF, TABLE_SUFFIX};
pub use writer::{to_xml_string, write_table};
