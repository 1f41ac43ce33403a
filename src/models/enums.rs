//! Shared domain enums (ReCollect controlled vocabularies)

// ---------------------------------------------------------------------------
// AccessStatus
// ---------------------------------------------------------------------------

/// Canonical access status for a catalogue record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccessStatus {
    Open,
    Closed,
    Restricted,
    PartRestricted,
    #[default]
    NotDetermined,
}

impl AccessStatus {
    /// Map a matched access keyword to a status
    pub fn from_keyword(keyword: &str) -> Self {
        match keyword.to_lowercase().as_str() {
            "open" => AccessStatus::Open,
            "closed" => AccessStatus::Closed,
            "restricted" => AccessStatus::Restricted,
            "part restricted" | "part-restricted" => AccessStatus::PartRestricted,
            _ => AccessStatus::NotDetermined,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AccessStatus::Open => "Open for public access",
            AccessStatus::Closed => "Closed for public access",
            AccessStatus::Restricted => "Access restrictions apply",
            AccessStatus::PartRestricted => "Access restrictions apply for some items",
            AccessStatus::NotDetermined => "Access not determined",
        }
    }
}

impl std::fmt::Display for AccessStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ---------------------------------------------------------------------------
// CopyrightStatus
// ---------------------------------------------------------------------------

/// Copyright label guessed from usage restriction text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyrightStatus {
    PublicDomain,
    UniversityCopyright,
    PublicationRightsGranted,
    InCopyright,
    OrphanWork,
}

impl CopyrightStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CopyrightStatus::PublicDomain => "Public domain",
            CopyrightStatus::UniversityCopyright => "University copyright",
            CopyrightStatus::PublicationRightsGranted => "In copyright - publication rights granted",
            CopyrightStatus::InCopyright => "In copyright",
            CopyrightStatus::OrphanWork => "Orphan work",
        }
    }
}

impl std::fmt::Display for CopyrightStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ---------------------------------------------------------------------------
// PublicationStatus
// ---------------------------------------------------------------------------

/// Whether a migrated node is published
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublicationStatus {
    Public,
    NotForPublication,
    Review,
}

impl PublicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PublicationStatus::Public => "Public",
            PublicationStatus::NotForPublication => "Not for publication",
            PublicationStatus::Review => "Review",
        }
    }
}

impl std::fmt::Display for PublicationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ---------------------------------------------------------------------------
// HierarchyLevel
// ---------------------------------------------------------------------------

/// EADLevelAttribute values that matter for migration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HierarchyLevel {
    Series,
    Item,
    Acquisition,
    Consolidation,
    MultipleItems,
    Unit,
    Other(String),
}

impl From<&str> for HierarchyLevel {
    fn from(v: &str) -> Self {
        match v.trim().to_lowercase().as_str() {
            "series" => HierarchyLevel::Series,
            "item" => HierarchyLevel::Item,
            "acquisition" => HierarchyLevel::Acquisition,
            "consolidation" => HierarchyLevel::Consolidation,
            "multiple items" => HierarchyLevel::MultipleItems,
            "unit" => HierarchyLevel::Unit,
            other => HierarchyLevel::Other(other.to_string()),
        }
    }
}

impl HierarchyLevel {
    /// Acquisitions and consolidations are both accessions in ReCollect
    pub fn is_accession(&self) -> bool {
        matches!(self, HierarchyLevel::Acquisition | HierarchyLevel::Consolidation)
    }
}

// ---------------------------------------------------------------------------
// Template
// ---------------------------------------------------------------------------

/// Presentation template chosen for a catalogue item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemTemplate {
    Item,
    Image,
    Plan,
    Poster,
    MovingImage,
    Sound,
    Document,
    MultipleItems,
    LegacyAsset,
}

impl ItemTemplate {
    /// Template name as used for the template file stem
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemTemplate::Item => "item",
            ItemTemplate::Image => "image",
            ItemTemplate::Plan => "plan",
            ItemTemplate::Poster => "poster",
            ItemTemplate::MovingImage => "moving-image",
            ItemTemplate::Sound => "sound",
            ItemTemplate::Document => "document",
            ItemTemplate::MultipleItems => "multiple-items",
            ItemTemplate::LegacyAsset => "legacy-asset",
        }
    }
}

impl std::fmt::Display for ItemTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
