//! Data models for the migration engine

pub mod audit;
pub mod enums;
pub mod report;
pub mod row;
pub mod template;

// Re-export commonly used types
pub use audit::AuditLogIndex;
pub use enums::{AccessStatus, CopyrightStatus, HierarchyLevel, ItemTemplate, PublicationStatus};
pub use report::NodeReport;
pub use row::{Row, RowValue};
pub use template::{Template, TemplateStore};
