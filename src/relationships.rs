// 🔗 Relationship Edges - every table row that can reference a listing
//
// Planner and executor both enumerate edges through `edges_for`, so the
// counts a preview promises are computed over exactly the rows execution
// will move.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entities::EntityKind;

// ============================================================================
// RELATIONSHIP ROWS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplicationStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "PENDING",
            ApplicationStatus::Approved => "APPROVED",
            ApplicationStatus::Rejected => "REJECTED",
        }
    }

    pub fn parse(s: &str) -> Option<ApplicationStatus> {
        match s {
            "PENDING" => Some(ApplicationStatus::Pending),
            "APPROVED" => Some(ApplicationStatus::Approved),
            "REJECTED" => Some(ApplicationStatus::Rejected),
            _ => None,
        }
    }
}

/// A vendor's application to sell at an event. Natural key: (event_id, vendor_id)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventVendorApplication {
    pub id: String,
    pub event_id: String,
    pub vendor_id: String,
    pub status: ApplicationStatus,
    pub booth_info: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl EventVendorApplication {
    pub fn new(event_id: impl Into<String>, vendor_id: impl Into<String>, status: ApplicationStatus) -> Self {
        EventVendorApplication {
            id: uuid::Uuid::new_v4().to_string(),
            event_id: event_id.into(),
            vendor_id: vendor_id.into(),
            status,
            booth_info: None,
            created_at: Utc::now(),
        }
    }
}

/// A user's favorite of any listing. Natural key: (user_id, favoritable_type, favoritable_id)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Favorite {
    pub id: String,
    pub user_id: String,
    pub favoritable_type: EntityKind,
    pub favoritable_id: String,
    pub created_at: DateTime<Utc>,
}

impl Favorite {
    pub fn new(user_id: impl Into<String>, kind: EntityKind, favoritable_id: impl Into<String>) -> Self {
        Favorite {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            favoritable_type: kind,
            favoritable_id: favoritable_id.into(),
            created_at: Utc::now(),
        }
    }
}

// ============================================================================
// EDGES
// ============================================================================

/// One relationship table column that points at a listing of some kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Edge {
    /// events.venue_id
    HostedEvents,
    /// events.promoter_id
    PromotedEvents,
    /// event_vendors.vendor_id
    VendorApplications,
    /// event_vendors.event_id
    EventApplications,
    /// favorites.favoritable_id where favoritable_type matches
    Favorites(EntityKind),
}

/// Output bucket of [`RelationshipCounts`] an edge reports into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RelationshipBucket {
    Events,
    EventVendors,
    Favorites,
}

impl Edge {
    pub fn table(&self) -> &'static str {
        match self {
            Edge::HostedEvents | Edge::PromotedEvents => "events",
            Edge::VendorApplications | Edge::EventApplications => "event_vendors",
            Edge::Favorites(_) => "favorites",
        }
    }

    /// Column holding the listing id that gets repointed
    pub fn foreign_key(&self) -> &'static str {
        match self {
            Edge::HostedEvents => "venue_id",
            Edge::PromotedEvents => "promoter_id",
            Edge::VendorApplications => "vendor_id",
            Edge::EventApplications => "event_id",
            Edge::Favorites(_) => "favoritable_id",
        }
    }

    /// The rest of the natural key. None = repointing can never collide.
    pub fn partner_key(&self) -> Option<&'static str> {
        match self {
            Edge::HostedEvents | Edge::PromotedEvents => None,
            Edge::VendorApplications => Some("event_id"),
            Edge::EventApplications => Some("vendor_id"),
            Edge::Favorites(_) => Some("user_id"),
        }
    }

    /// Extra discriminator column for polymorphic tables
    pub fn type_filter(&self) -> Option<(&'static str, &'static str)> {
        match self {
            Edge::Favorites(kind) => Some(("favoritable_type", kind.favoritable_type())),
            _ => None,
        }
    }

    pub fn bucket(&self) -> RelationshipBucket {
        match self {
            Edge::HostedEvents | Edge::PromotedEvents => RelationshipBucket::Events,
            Edge::VendorApplications | Edge::EventApplications => RelationshipBucket::EventVendors,
            Edge::Favorites(_) => RelationshipBucket::Favorites,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Edge::HostedEvents => "hosted events",
            Edge::PromotedEvents => "promoted events",
            Edge::VendorApplications => "vendor applications",
            Edge::EventApplications => "event applications",
            Edge::Favorites(_) => "favorites",
        }
    }
}

/// Every edge that references listings of `kind`, in execution order
pub fn edges_for(kind: EntityKind) -> Vec<Edge> {
    match kind {
        EntityKind::Venues => vec![Edge::HostedEvents, Edge::Favorites(kind)],
        EntityKind::Promoters => vec![Edge::PromotedEvents, Edge::Favorites(kind)],
        EntityKind::Vendors => vec![Edge::VendorApplications, Edge::Favorites(kind)],
        EntityKind::Events => vec![Edge::EventApplications, Edge::Favorites(kind)],
    }
}

// ============================================================================
// COUNTS
// ============================================================================

/// Per-edge numbers for one (primary, duplicate) pair
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EdgeCount {
    /// Duplicate-side rows that move (preview) / moved (execute)
    pub moved: u64,
    /// Duplicate-side rows that collide with a primary-side row under the natural key
    pub discarded: u64,
}

/// `{events?, eventVendors?, favorites?}`; only buckets relevant to the kind are present
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipCounts {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub events: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_vendors: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favorites: Option<u64>,
}

impl RelationshipCounts {
    /// Zeroed counts for every bucket `kind` participates in
    pub fn for_kind(kind: EntityKind) -> Self {
        let mut counts = RelationshipCounts::default();
        for edge in edges_for(kind) {
            counts.add(edge, 0);
        }
        counts
    }

    pub fn add(&mut self, edge: Edge, n: u64) {
        let slot = match edge.bucket() {
            RelationshipBucket::Events => &mut self.events,
            RelationshipBucket::EventVendors => &mut self.event_vendors,
            RelationshipBucket::Favorites => &mut self.favorites,
        };
        *slot = Some(slot.unwrap_or(0) + n);
    }

    pub fn get(&self, bucket: RelationshipBucket) -> Option<u64> {
        match bucket {
            RelationshipBucket::Events => self.events,
            RelationshipBucket::EventVendors => self.event_vendors,
            RelationshipBucket::Favorites => self.favorites,
        }
    }

    pub fn total(&self) -> u64 {
        self.events.unwrap_or(0) + self.event_vendors.unwrap_or(0) + self.favorites.unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_kind_has_favorites_edge() {
        for kind in EntityKind::ALL {
            let edges = edges_for(kind);
            assert!(edges.contains(&Edge::Favorites(kind)));
            assert_eq!(edges.len(), 2);
        }
    }

    #[test]
    fn test_counts_for_kind_only_include_relevant_buckets() {
        let venues = RelationshipCounts::for_kind(EntityKind::Venues);
        assert_eq!(venues.events, Some(0));
        assert_eq!(venues.event_vendors, None);
        assert_eq!(venues.favorites, Some(0));

        let json = serde_json::to_value(RelationshipCounts::for_kind(EntityKind::Vendors)).unwrap();
        assert_eq!(json, serde_json::json!({"eventVendors": 0, "favorites": 0}));
    }

    #[test]
    fn test_counts_accumulate() {
        let mut counts = RelationshipCounts::for_kind(EntityKind::Events);
        counts.add(Edge::EventApplications, 2);
        counts.add(Edge::EventApplications, 1);
        counts.add(Edge::Favorites(EntityKind::Events), 4);
        assert_eq!(counts.get(RelationshipBucket::EventVendors), Some(3));
        assert_eq!(counts.total(), 7);
    }

    #[test]
    fn test_only_event_columns_cannot_collide() {
        assert_eq!(Edge::HostedEvents.partner_key(), None);
        assert_eq!(Edge::PromotedEvents.partner_key(), None);
        assert_eq!(Edge::VendorApplications.partner_key(), Some("event_id"));
        assert_eq!(
            Edge::Favorites(EntityKind::Vendors).type_filter(),
            Some(("favoritable_type", "VENDOR"))
        );
    }
}
