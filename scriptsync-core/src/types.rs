//! Domain types shared by the remote store and the local workspace.
//!
//! A [`ScriptRecord`] is the normalized form of one script. The remote side
//! builds it from the store's JSON schema, the local side from a script file's
//! header block; both produce the same shape so they can be compared directly.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::codec::HeaderValue;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Identifier of a site in the remote store.
///
/// Distinct from [`ScriptId`]: the workspace config uses `0` to mean "no site
/// selected", whereas `0` is a legitimate script id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SiteId(pub u64);

impl fmt::Display for SiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<u64> for SiteId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Identifier of a script record, unique within its variant and site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScriptId(pub u64);

impl fmt::Display for ScriptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<u64> for ScriptId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

// ---------------------------------------------------------------------------
// Variants and flags
// ---------------------------------------------------------------------------

/// Which kind of script a record is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptVariant {
    Server,
    Client,
}

/// How the codec writes boolean flags for a variant.
///
/// Server files only carry the flags that are set; client files carry every
/// flag. Existing workspaces depend on both layouts byte for byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagEmission {
    TrueOnly,
    All,
}

impl ScriptVariant {
    /// Both variants in presentation order (server first).
    pub fn all() -> &'static [ScriptVariant] {
        &[ScriptVariant::Server, ScriptVariant::Client]
    }

    /// The variant's known flags, in header order.
    pub fn flags(self) -> &'static [ScriptFlag] {
        match self {
            ScriptVariant::Server => SERVER_FLAGS,
            ScriptVariant::Client => CLIENT_FLAGS,
        }
    }

    pub fn flag_emission(self) -> FlagEmission {
        match self {
            ScriptVariant::Server => FlagEmission::TrueOnly,
            ScriptVariant::Client => FlagEmission::All,
        }
    }

    /// Directory name holding this variant's files inside a site workspace.
    pub fn dir_name(self) -> &'static str {
        match self {
            ScriptVariant::Server => "server-scripts",
            ScriptVariant::Client => "client-scripts",
        }
    }

    /// Whether the variant carries the secondary `name` label.
    pub fn has_name(self) -> bool {
        matches!(self, ScriptVariant::Server)
    }
}

impl fmt::Display for ScriptVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptVariant::Server => write!(f, "server"),
            ScriptVariant::Client => write!(f, "client"),
        }
    }
}

/// A boolean trigger / scope flag.
///
/// Declaration order matches header order, so a `BTreeMap<ScriptFlag, _>`
/// iterates in the same order the codec writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ScriptFlag {
    WhenloadingSiteSettings,
    WhenViewProcessing,
    WhenloadingRecord,
    BeforeFormula,
    AfterFormula,
    BeforeCreate,
    AfterCreate,
    BeforeUpdate,
    AfterUpdate,
    BeforeDelete,
    AfterDelete,
    BeforeOpeningPage,
    BeforeOpeningRow,
    Shared,
    Functionalize,
    TryCatch,
    All,
    New,
    Edit,
    Index,
    Calendar,
    Crosstab,
    Gantt,
    BurnDown,
    TimeSeries,
    Kamban,
    ImageLib,
    Disabled,
}

const SERVER_FLAGS: &[ScriptFlag] = &[
    ScriptFlag::WhenloadingSiteSettings,
    ScriptFlag::WhenViewProcessing,
    ScriptFlag::WhenloadingRecord,
    ScriptFlag::BeforeFormula,
    ScriptFlag::AfterFormula,
    ScriptFlag::BeforeCreate,
    ScriptFlag::AfterCreate,
    ScriptFlag::BeforeUpdate,
    ScriptFlag::AfterUpdate,
    ScriptFlag::BeforeDelete,
    ScriptFlag::AfterDelete,
    ScriptFlag::BeforeOpeningPage,
    ScriptFlag::BeforeOpeningRow,
    ScriptFlag::Shared,
    ScriptFlag::Functionalize,
    ScriptFlag::TryCatch,
    ScriptFlag::Disabled,
];

const CLIENT_FLAGS: &[ScriptFlag] = &[
    ScriptFlag::All,
    ScriptFlag::New,
    ScriptFlag::Edit,
    ScriptFlag::Index,
    ScriptFlag::Calendar,
    ScriptFlag::Crosstab,
    ScriptFlag::Gantt,
    ScriptFlag::BurnDown,
    ScriptFlag::TimeSeries,
    ScriptFlag::Kamban,
    ScriptFlag::ImageLib,
    ScriptFlag::Disabled,
];

impl ScriptFlag {
    /// Field name in the remote store's JSON schema.
    pub fn wire_key(self) -> &'static str {
        match self {
            ScriptFlag::WhenloadingSiteSettings => "WhenloadingSiteSettings",
            ScriptFlag::WhenViewProcessing => "WhenViewProcessing",
            ScriptFlag::WhenloadingRecord => "WhenloadingRecord",
            ScriptFlag::BeforeFormula => "BeforeFormula",
            ScriptFlag::AfterFormula => "AfterFormula",
            ScriptFlag::BeforeCreate => "BeforeCreate",
            ScriptFlag::AfterCreate => "AfterCreate",
            ScriptFlag::BeforeUpdate => "BeforeUpdate",
            ScriptFlag::AfterUpdate => "AfterUpdate",
            ScriptFlag::BeforeDelete => "BeforeDelete",
            ScriptFlag::AfterDelete => "AfterDelete",
            ScriptFlag::BeforeOpeningPage => "BeforeOpeningPage",
            ScriptFlag::BeforeOpeningRow => "BeforeOpeningRow",
            ScriptFlag::Shared => "Shared",
            ScriptFlag::Functionalize => "Functionalize",
            ScriptFlag::TryCatch => "TryCatch",
            ScriptFlag::All => "All",
            ScriptFlag::New => "New",
            ScriptFlag::Edit => "Edit",
            ScriptFlag::Index => "Index",
            ScriptFlag::Calendar => "Calendar",
            ScriptFlag::Crosstab => "Crosstab",
            ScriptFlag::Gantt => "Gantt",
            ScriptFlag::BurnDown => "BurnDown",
            ScriptFlag::TimeSeries => "TimeSeries",
            ScriptFlag::Kamban => "Kamban",
            ScriptFlag::ImageLib => "ImageLib",
            ScriptFlag::Disabled => "Disabled",
        }
    }

    /// Key used in the file header (`// @script-<key>: ...`).
    pub fn header_key(self) -> &'static str {
        match self {
            ScriptFlag::WhenloadingSiteSettings => "whenloadingSiteSettings",
            ScriptFlag::WhenViewProcessing => "whenViewProcessing",
            ScriptFlag::WhenloadingRecord => "whenloadingRecord",
            ScriptFlag::BeforeFormula => "beforeFormula",
            ScriptFlag::AfterFormula => "afterFormula",
            ScriptFlag::BeforeCreate => "beforeCreate",
            ScriptFlag::AfterCreate => "afterCreate",
            ScriptFlag::BeforeUpdate => "beforeUpdate",
            ScriptFlag::AfterUpdate => "afterUpdate",
            ScriptFlag::BeforeDelete => "beforeDelete",
            ScriptFlag::AfterDelete => "afterDelete",
            ScriptFlag::BeforeOpeningPage => "beforeOpeningPage",
            ScriptFlag::BeforeOpeningRow => "beforeOpeningRow",
            ScriptFlag::Shared => "shared",
            ScriptFlag::Functionalize => "functionalize",
            ScriptFlag::TryCatch => "tryCatch",
            ScriptFlag::All => "all",
            ScriptFlag::New => "new",
            ScriptFlag::Edit => "edit",
            ScriptFlag::Index => "index",
            ScriptFlag::Calendar => "calendar",
            ScriptFlag::Crosstab => "crosstab",
            ScriptFlag::Gantt => "gantt",
            ScriptFlag::BurnDown => "burnDown",
            ScriptFlag::TimeSeries => "timeSeries",
            ScriptFlag::Kamban => "kamban",
            ScriptFlag::ImageLib => "imageLib",
            ScriptFlag::Disabled => "disabled",
        }
    }

    /// Looks up a header key among `variant`'s flags only.
    pub fn from_header_key(variant: ScriptVariant, key: &str) -> Option<ScriptFlag> {
        variant
            .flags()
            .iter()
            .copied()
            .find(|flag| flag.header_key() == key)
    }

    /// Looks up a wire key among `variant`'s flags only.
    pub fn from_wire_key(variant: ScriptVariant, key: &str) -> Option<ScriptFlag> {
        variant
            .flags()
            .iter()
            .copied()
            .find(|flag| flag.wire_key() == key)
    }
}

// ---------------------------------------------------------------------------
// ScriptRecord
// ---------------------------------------------------------------------------

/// One automation script, normalized.
///
/// `flags` always holds every known flag of the variant (unset means `false`),
/// which keeps records built from the remote store and from files comparable.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptRecord {
    pub variant: ScriptVariant,
    /// `None` until the script has been created remotely.
    pub id: Option<ScriptId>,
    pub title: String,
    /// Server scripts only; readers fall back to `title`.
    pub name: Option<String>,
    pub body: String,
    pub flags: BTreeMap<ScriptFlag, bool>,
    /// Header keys the codec did not recognise. Never encoded back.
    pub unknown_headers: BTreeMap<String, HeaderValue>,
    /// Remote fields outside the known schema, echoed back on push.
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ScriptRecord {
    /// An empty record with every flag of `variant` cleared.
    pub fn new(variant: ScriptVariant, title: impl Into<String>) -> Self {
        Self {
            variant,
            id: None,
            title: title.into(),
            name: None,
            body: String::new(),
            flags: variant.flags().iter().map(|flag| (*flag, false)).collect(),
            unknown_headers: BTreeMap::new(),
            extra: serde_json::Map::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<ScriptId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_flag(mut self, flag: ScriptFlag, value: bool) -> Self {
        self.set_flag(flag, value);
        self
    }

    pub fn flag(&self, flag: ScriptFlag) -> bool {
        self.flags.get(&flag).copied().unwrap_or(false)
    }

    /// Sets a flag. Flags foreign to the variant are ignored.
    pub fn set_flag(&mut self, flag: ScriptFlag, value: bool) {
        if self.variant.flags().contains(&flag) {
            self.flags.insert(flag, value);
        }
    }

    /// `name` for server scripts, falling back to `title`.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.title)
    }

    /// Fields that matter for sync equality: body, title, name, flags.
    /// Trailing whitespace in the body is not significant.
    pub fn same_content(&self, other: &ScriptRecord) -> bool {
        self.variant == other.variant
            && self.title == other.title
            && self.name == other.name
            && self.body.trim_end() == other.body.trim_end()
            && self.flags == other.flags
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
