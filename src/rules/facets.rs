//! Physical facet split

use crate::models::Row;

const COLOUR_DEPTHS: [&str; 4] = ["colour", "black and white", "hand coloured", "sepia"];

/// Physical facet values sorted into their target fields
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhysicalFacets {
    pub colour_depth: Option<String>,
    pub base_material: Option<String>,
    pub duration: Option<String>,
    pub residual: Vec<String>,
}

impl PhysicalFacets {
    pub fn split<'a>(facets: impl IntoIterator<Item = &'a str>) -> Self {
        let mut out = Self::default();
        for facet in facets {
            let lower = facet.trim().to_lowercase();
            if lower.starts_with("colour:") {
                out.colour_depth = Some(after_colon(facet));
            } else if COLOUR_DEPTHS.contains(&lower.as_str()) {
                out.colour_depth = Some(facet.trim().to_string());
            } else if lower.starts_with("base:") {
                out.base_material = Some(after_colon(facet));
            } else if lower.starts_with("duration:") {
                out.duration = Some(after_colon(facet));
            } else {
                out.residual.push(facet.to_string());
            }
        }
        out
    }

    pub fn apply(&self, row: &mut Row) {
        if let Some(v) = &self.colour_depth {
            row.set("Colour Depth", v.as_str());
        }
        if let Some(v) = &self.base_material {
            row.set("Base Material", v.as_str());
        }
        if let Some(v) = &self.duration {
            row.set("Duration", v.as_str());
        }
        row.set("Physical Facet", self.residual.join("|"));
    }
}

fn after_colon(facet: &str) -> String {
    facet
        .split_once(':')
        .map(|(_, rest)| rest.trim().to_string())
        .unwrap_or_default()
}
