// Entity Models - the four listing kinds
//
// Each entity has:
// - Stable identity (id) that NEVER changes, and a slug unique per kind
// - A display name (field name differs per kind)
// - List-valued attributes that are unioned on merge, and scalar attributes
//   where the primary wins and the duplicate only fills gaps

pub mod event;
pub mod promoter;
pub mod vendor;
pub mod venue;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::MergeError;

pub use event::{Event, EventStatus};
pub use promoter::Promoter;
pub use vendor::Vendor;
pub use venue::Venue;

// ============================================================================
// ENTITY KIND
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Venues,
    Events,
    Vendors,
    Promoters,
}

impl EntityKind {
    pub const ALL: [EntityKind; 4] = [
        EntityKind::Venues,
        EntityKind::Events,
        EntityKind::Vendors,
        EntityKind::Promoters,
    ];

    /// Tag used by callers (`venues | events | vendors | promoters`)
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Venues => "venues",
            EntityKind::Events => "events",
            EntityKind::Vendors => "vendors",
            EntityKind::Promoters => "promoters",
        }
    }

    /// Discriminator stored in `favorites.favoritable_type`
    pub fn favoritable_type(&self) -> &'static str {
        match self {
            EntityKind::Venues => "VENUE",
            EntityKind::Events => "EVENT",
            EntityKind::Vendors => "VENDOR",
            EntityKind::Promoters => "PROMOTER",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = MergeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s.trim())
            .ok_or_else(|| {
                MergeError::InvalidInput(format!(
                    "unknown entity kind '{}' (expected venues, events, vendors or promoters)",
                    s
                ))
            })
    }
}

// ============================================================================
// MERGE PAIR
// ============================================================================

/// An operator-chosen (kind, primary, duplicate) triple
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergePair {
    pub kind: EntityKind,
    pub primary_id: String,
    pub duplicate_id: String,
}

impl MergePair {
    pub fn new(kind: EntityKind, primary_id: impl Into<String>, duplicate_id: impl Into<String>) -> Self {
        MergePair {
            kind,
            primary_id: primary_id.into(),
            duplicate_id: duplicate_id.into(),
        }
    }

    pub fn is_self_merge(&self) -> bool {
        self.primary_id == self.duplicate_id
    }
}

impl fmt::Display for MergePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} -> {}", self.kind, self.duplicate_id, self.primary_id)
    }
}

// ============================================================================
// LISTING (any of the four kinds)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Listing {
    Venue(Venue),
    Event(Event),
    Vendor(Vendor),
    Promoter(Promoter),
}

impl Listing {
    pub fn kind(&self) -> EntityKind {
        match self {
            Listing::Venue(_) => EntityKind::Venues,
            Listing::Event(_) => EntityKind::Events,
            Listing::Vendor(_) => EntityKind::Vendors,
            Listing::Promoter(_) => EntityKind::Promoters,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Listing::Venue(v) => &v.id,
            Listing::Event(e) => &e.id,
            Listing::Vendor(v) => &v.id,
            Listing::Promoter(p) => &p.id,
        }
    }

    /// venue.name, event.name, vendor.business_name, promoter.company_name
    pub fn display_name(&self) -> &str {
        match self {
            Listing::Venue(v) => &v.name,
            Listing::Event(e) => &e.name,
            Listing::Vendor(v) => &v.business_name,
            Listing::Promoter(p) => &p.company_name,
        }
    }

    pub fn slug(&self) -> &str {
        match self {
            Listing::Venue(v) => &v.slug,
            Listing::Event(e) => &e.slug,
            Listing::Vendor(v) => &v.slug,
            Listing::Promoter(p) => &p.slug,
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        match self {
            Listing::Venue(v) => v.created_at,
            Listing::Event(e) => e.created_at,
            Listing::Vendor(v) => v.created_at,
            Listing::Promoter(p) => p.created_at,
        }
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        match self {
            Listing::Venue(v) => v.updated_at,
            Listing::Event(e) => e.updated_at,
            Listing::Vendor(v) => v.updated_at,
            Listing::Promoter(p) => p.updated_at,
        }
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        match self {
            Listing::Venue(v) => v.updated_at = now,
            Listing::Event(e) => e.updated_at = now,
            Listing::Vendor(v) => v.updated_at = now,
            Listing::Promoter(p) => p.updated_at = now,
        }
    }

    /// Fold `duplicate`'s attributes into `self` and return the names of
    /// scalar fields where both sides held different non-empty values.
    ///
    /// Lists are unioned, primary values win, duplicate values only fill
    /// empty primary fields. Identity (id, slug, timestamps) is never touched.
    /// Applying the same duplicate twice is a no-op the second time.
    pub fn absorb(&mut self, duplicate: &Listing) -> Result<Vec<&'static str>, MergeError> {
        match (self, duplicate) {
            (Listing::Venue(p), Listing::Venue(d)) => Ok(p.absorb(d)),
            (Listing::Event(p), Listing::Event(d)) => Ok(p.absorb(d)),
            (Listing::Vendor(p), Listing::Vendor(d)) => Ok(p.absorb(d)),
            (Listing::Promoter(p), Listing::Promoter(d)) => Ok(p.absorb(d)),
            (p, d) => Err(MergeError::InvalidInput(format!(
                "cannot merge a {} record into a {} record",
                d.kind(),
                p.kind()
            ))),
        }
    }
}

// ============================================================================
// MERGE HELPERS
// ============================================================================

pub(crate) fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |s| s.trim().is_empty())
}

/// Primary wins; duplicate fills an empty primary. Records a conflict when
/// both are non-empty and differ.
pub(crate) fn merge_text(
    field: &'static str,
    primary: &mut Option<String>,
    duplicate: &Option<String>,
    conflicts: &mut Vec<&'static str>,
) {
    if is_blank(duplicate) {
        return;
    }
    if is_blank(primary) {
        *primary = duplicate.clone();
    } else if !same_text(primary.as_deref(), duplicate.as_deref()) {
        conflicts.push(field);
    }
}

/// Required (never empty) text such as names: kept, conflict if different.
pub(crate) fn compare_required(
    field: &'static str,
    primary: &str,
    duplicate: &str,
    conflicts: &mut Vec<&'static str>,
) {
    if !duplicate.trim().is_empty() && !same_text(Some(primary), Some(duplicate)) {
        conflicts.push(field);
    }
}

pub(crate) fn merge_value<T: Clone + PartialEq>(
    field: &'static str,
    primary: &mut Option<T>,
    duplicate: &Option<T>,
    conflicts: &mut Vec<&'static str>,
) {
    match (primary.as_ref(), duplicate.as_ref()) {
        (None, Some(_)) => *primary = duplicate.clone(),
        (Some(p), Some(d)) if p != d => conflicts.push(field),
        _ => {}
    }
}

/// Append duplicate entries missing from the primary list (case-insensitive),
/// preserving the primary's order.
pub(crate) fn union_list(primary: &mut Vec<String>, duplicate: &[String]) {
    for item in duplicate {
        let trimmed = item.trim();
        if trimmed.is_empty() {
            continue;
        }
        let present = primary
            .iter()
            .any(|existing| existing.trim().eq_ignore_ascii_case(trimmed));
        if !present {
            primary.push(trimmed.to_string());
        }
    }
}

fn same_text(a: Option<&str>, b: Option<&str>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.trim().eq_ignore_ascii_case(b.trim()),
        (None, None) => true,
        _ => false,
    }
}
