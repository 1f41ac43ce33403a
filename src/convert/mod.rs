//! Record converters
//!
//! Each converter turns one EMu record into one row and names the template
//! the row belongs to. Converters are pure apart from the asset lookups done
//! through an [`AssetResolver`](crate::services::assets::AssetResolver).

pub mod agent;
pub mod agreement;
pub mod item;
pub mod recordset;
pub mod unit;

pub use agent::convert_agent;
pub use agreement::convert_agreement;
pub use item::convert_item;
pub use recordset::{convert_recordset, create_accession, update_accession};
pub use unit::convert_unit;

use crate::models::Row;

/// A converted record and its target template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Converted {
    pub template: String,
    pub row: Row,
}
