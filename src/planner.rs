// 🧭 Merge Planner - read-only preview of what a merge will do
//
// Counts come from the same `edges_for` enumeration and the same natural-key
// test the executor applies, so an undisturbed preview always matches the
// executor's `transferredRelationships`.

use std::fmt;

use serde::Serialize;

use crate::db::EntityRepository;
use crate::entities::{Listing, MergePair};
use crate::error::MergeError;
use crate::relationships::{edges_for, RelationshipBucket, RelationshipCounts};

// ============================================================================
// WARNINGS
// ============================================================================

/// Something the operator should know before confirming. Never blocks a merge
/// on its own, except `SameRecord`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Warning {
    /// Duplicate-side rows that already exist on the primary and will be dropped
    RelationshipsDiscarded {
        relationship: RelationshipBucket,
        count: u64,
    },

    /// Both records hold different values; the primary's is kept
    FieldConflict { field: String },

    /// The duplicate's slug stops resolving once it is deleted
    SlugRetired { slug: String },

    /// Primary and duplicate are the same row
    SameRecord,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::RelationshipsDiscarded { relationship, count } => write!(
                f,
                "{} {} row(s) will be discarded as duplicates of existing primary rows",
                count,
                bucket_label(*relationship)
            ),
            Warning::FieldConflict { field } => {
                write!(f, "Both records define '{}'; the primary's value will be kept", field)
            }
            Warning::SlugRetired { slug } => {
                write!(f, "The duplicate's slug '{}' will no longer resolve", slug)
            }
            Warning::SameRecord => write!(f, "Primary and duplicate are the same record"),
        }
    }
}

fn bucket_label(bucket: RelationshipBucket) -> &'static str {
    match bucket {
        RelationshipBucket::Events => "event",
        RelationshipBucket::EventVendors => "vendor application",
        RelationshipBucket::Favorites => "favorite",
    }
}

// ============================================================================
// PREVIEW
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergePreview {
    pub primary: Listing,
    pub duplicate: Listing,
    pub relationships_to_transfer: RelationshipCounts,
    pub warnings: Vec<Warning>,
    pub can_merge: bool,
}

pub struct MergePlanner<'a, R: EntityRepository + ?Sized> {
    repo: &'a R,
}

impl<'a, R: EntityRepository + ?Sized> MergePlanner<'a, R> {
    pub fn new(repo: &'a R) -> Self {
        MergePlanner { repo }
    }

    /// Build the preview for `pair`. Performs no writes.
    pub fn preview(&self, pair: &MergePair) -> Result<MergePreview, MergeError> {
        let primary = self.load(pair, &pair.primary_id)?;
        let duplicate = self.load(pair, &pair.duplicate_id)?;

        if pair.is_self_merge() {
            return Ok(MergePreview {
                primary,
                duplicate,
                relationships_to_transfer: RelationshipCounts::for_kind(pair.kind),
                warnings: vec![Warning::SameRecord],
                can_merge: false,
            });
        }

        let mut to_transfer = RelationshipCounts::for_kind(pair.kind);
        let mut discarded = RelationshipCounts::default();

        for edge in edges_for(pair.kind) {
            let count = self
                .repo
                .count_edge(edge, &pair.primary_id, &pair.duplicate_id)?;
            to_transfer.add(edge, count.moved);
            if count.discarded > 0 {
                discarded.add(edge, count.discarded);
            }
        }

        let mut warnings = Vec::new();

        for bucket in [
            RelationshipBucket::Events,
            RelationshipBucket::EventVendors,
            RelationshipBucket::Favorites,
        ] {
            if let Some(count) = discarded.get(bucket) {
                warnings.push(Warning::RelationshipsDiscarded {
                    relationship: bucket,
                    count,
                });
            }
        }

        // Dry-run the attribute merge on a copy to learn which fields clash
        let mut merged = primary.clone();
        for field in merged.absorb(&duplicate)? {
            warnings.push(Warning::FieldConflict {
                field: field.to_string(),
            });
        }

        warnings.push(Warning::SlugRetired {
            slug: duplicate.slug().to_string(),
        });

        Ok(MergePreview {
            primary,
            duplicate,
            relationships_to_transfer: to_transfer,
            warnings,
            can_merge: true,
        })
    }

    fn load(&self, pair: &MergePair, id: &str) -> Result<Listing, MergeError> {
        self.repo
            .find(pair.kind, id)?
            .ok_or_else(|| MergeError::NotFound {
                kind: pair.kind,
                id: id.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::*;
    use crate::entities::EntityKind;

    #[test]
    fn test_vendor_preview_counts_only_movable_rows() {
        let repo = repo();
        let a = add_vendor(&repo, "Joe's Tacos", "joes-tacos");
        let b = add_vendor(&repo, "Joes Tacos LLC", "joes-tacos-llc");
        let e1 = add_event(&repo, "Market 1", "market-1", None);
        let e2 = add_event(&repo, "Market 2", "market-2", None);
        let e3 = add_event(&repo, "Market 3", "market-3", None);
        let e4 = add_event(&repo, "Market 4", "market-4", None);
        apply(&repo, &e1.id, &a.id);
        apply(&repo, &e4.id, &a.id);
        apply(&repo, &e1.id, &b.id);
        apply(&repo, &e2.id, &b.id);
        apply(&repo, &e3.id, &b.id);

        let pair = MergePair::new(EntityKind::Vendors, a.id.clone(), b.id.clone());
        let preview = MergePlanner::new(&repo).preview(&pair).unwrap();

        assert!(preview.can_merge);
        assert_eq!(preview.relationships_to_transfer.event_vendors, Some(2));
        assert_eq!(preview.relationships_to_transfer.favorites, Some(0));
        assert_eq!(preview.relationships_to_transfer.events, None);
        assert!(preview.warnings.contains(&Warning::RelationshipsDiscarded {
            relationship: RelationshipBucket::EventVendors,
            count: 1,
        }));
        assert!(preview.warnings.contains(&Warning::FieldConflict {
            field: "businessName".to_string()
        }));

        // Read-only: nothing moved
        assert_eq!(repo.applications_for_vendor(&b.id).unwrap().len(), 3);
    }

    #[test]
    fn test_preview_flags_conflicting_descriptions() {
        let repo = repo();
        let mut primary = crate::entities::Venue::new("Fairgrounds", "fairgrounds");
        primary.description = Some("Outdoor grounds".to_string());
        let mut duplicate = crate::entities::Venue::new("Fairgrounds", "fairgrounds-2");
        duplicate.description = Some("Indoor hall".to_string());
        repo.insert(&Listing::Venue(primary.clone())).unwrap();
        repo.insert(&Listing::Venue(duplicate.clone())).unwrap();

        let pair = MergePair::new(EntityKind::Venues, primary.id.clone(), duplicate.id.clone());
        let preview = MergePlanner::new(&repo).preview(&pair).unwrap();

        assert!(preview.can_merge);
        assert_eq!(
            preview.warnings,
            vec![
                Warning::FieldConflict {
                    field: "description".to_string()
                },
                Warning::SlugRetired {
                    slug: "fairgrounds-2".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_same_record_cannot_merge() {
        let repo = repo();
        let venue = add_venue(&repo, "Hall", "hall");

        let pair = MergePair::new(EntityKind::Venues, venue.id.clone(), venue.id.clone());
        let preview = MergePlanner::new(&repo).preview(&pair).unwrap();

        assert!(!preview.can_merge);
        assert_eq!(preview.warnings, vec![Warning::SameRecord]);
    }

    #[test]
    fn test_missing_record_is_not_found() {
        let repo = repo();
        let venue = add_venue(&repo, "Hall", "hall");

        let pair = MergePair::new(EntityKind::Venues, venue.id.clone(), "gone");
        let err = MergePlanner::new(&repo).preview(&pair).unwrap_err();
        assert!(matches!(err, MergeError::NotFound { ref id, .. } if id == "gone"));

        // A vendor id is not a venue
        let vendor = add_vendor(&repo, "Hall", "hall");
        let pair = MergePair::new(EntityKind::Venues, venue.id.clone(), vendor.id.clone());
        assert!(matches!(
            MergePlanner::new(&repo).preview(&pair),
            Err(MergeError::NotFound { .. })
        ));
    }

    #[test]
    fn test_warning_serializes_as_tagged_variant() {
        let warning = Warning::RelationshipsDiscarded {
            relationship: RelationshipBucket::Favorites,
            count: 2,
        };
        assert_eq!(
            serde_json::to_value(&warning).unwrap(),
            serde_json::json!({"type": "relationshipsDiscarded", "relationship": "favorites", "count": 2})
        );
        assert_eq!(
            warning.to_string(),
            "2 favorite row(s) will be discarded as duplicates of existing primary rows"
        );
    }
}
