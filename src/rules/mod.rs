//! Field derivation rules
//!
//! Pure functions from record fragments to target values. A missing input
//! leaves the target field absent; no rule fails a record.

pub mod access;
pub mod contributors;
pub mod dates;
pub mod facets;
pub mod hierarchy;
pub mod identifiers;
pub mod status;
pub mod text;

pub use access::{find_access, resolve_access, Access};
pub use contributors::Credits;
pub use dates::{format_date, normalise_boundary, Boundary};
pub use facets::PhysicalFacets;
pub use hierarchy::{inherited_date, ParentLinks};
pub use identifiers::{node_identifier, PreviousIds};
pub use status::{guess_copyright, publication_status};
pub use text::{concat_fields, shorten_title, slugify};
