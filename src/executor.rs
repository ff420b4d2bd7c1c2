// ⚙️ Merge Executor - absorb a duplicate into its primary
//
// A merge is a fixed sequence of small idempotent steps:
//
//   validate → transfer each edge → merge attributes → delete duplicate → reload
//
// The budget is consulted before every step. Whatever stops the sequence
// (budget, interrupt, conflict) leaves every earlier step committed, and
// calling `execute` again with the same pair picks up where it stopped. The
// merge ledger tells "already absorbed" apart from "never existed".

use chrono::Utc;
use log::{debug, info, warn};
use serde::Serialize;

use crate::budget::ExecutionBudget;
use crate::db::{EntityRepository, LedgerStatus};
use crate::entities::{Listing, MergePair};
use crate::error::{MergeError, MergeStep};
use crate::relationships::{edges_for, RelationshipCounts};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeResult {
    pub merged_entity: Listing,

    /// Rows repointed across every attempt of this merge
    pub transferred_relationships: RelationshipCounts,

    pub deleted_id: String,

    /// True when an earlier attempt had already done part or all of the work
    pub resumed: bool,
}

pub struct MergeExecutor<'a, R: EntityRepository + ?Sized> {
    repo: &'a R,
    budget: &'a dyn ExecutionBudget,
}

impl<'a, R: EntityRepository + ?Sized> MergeExecutor<'a, R> {
    pub fn new(repo: &'a R, budget: &'a dyn ExecutionBudget) -> Self {
        MergeExecutor { repo, budget }
    }

    pub fn execute(&self, pair: &MergePair) -> Result<MergeResult, MergeError> {
        if pair.is_self_merge() {
            return Err(MergeError::InvalidInput(format!(
                "cannot merge {} record {} into itself",
                pair.kind, pair.primary_id
            )));
        }

        // ====================================================================
        // STEP 1: Validate
        // ====================================================================
        self.checkpoint(pair, MergeStep::Validate)?;
        let step = MergeStep::Validate;

        let primary = self
            .repo
            .find(pair.kind, &pair.primary_id)
            .map_err(|e| MergeError::at_step(pair, step, e))?
            .ok_or_else(|| MergeError::NotFound {
                kind: pair.kind,
                id: pair.primary_id.clone(),
            })?;

        let duplicate = self
            .repo
            .find(pair.kind, &pair.duplicate_id)
            .map_err(|e| MergeError::at_step(pair, step, e))?;

        let ledger = self
            .repo
            .ledger(pair)
            .map_err(|e| MergeError::at_step(pair, step, e))?;

        let resumed = match (&duplicate, &ledger) {
            (None, None) => {
                return Err(MergeError::NotFound {
                    kind: pair.kind,
                    id: pair.duplicate_id.clone(),
                })
            }
            (None, Some(entry)) if entry.status == LedgerStatus::Completed => {
                info!("Merge {} already completed, returning current primary", pair);
                return Ok(MergeResult {
                    merged_entity: primary,
                    transferred_relationships: entry.transferred.clone(),
                    deleted_id: pair.duplicate_id.clone(),
                    resumed: true,
                });
            }
            (None, Some(_)) => {
                info!("Resuming merge {} after the duplicate was deleted", pair);
                true
            }
            (Some(_), entry) => {
                let resumed = matches!(entry, Some(e) if e.status == LedgerStatus::InProgress);
                if resumed {
                    info!("Resuming interrupted merge {}", pair);
                }
                self.repo
                    .open_ledger(pair)
                    .map_err(|e| MergeError::at_step(pair, step, e))?;
                resumed
            }
        };

        // ====================================================================
        // STEP 2: Repoint relationships, one edge per transaction
        // ====================================================================
        for edge in edges_for(pair.kind) {
            let step = MergeStep::Transfer(edge);
            self.checkpoint(pair, step)?;

            let count = self
                .repo
                .transfer_edge(pair, edge)
                .map_err(|e| MergeError::at_step(pair, step, e))?;

            debug!(
                "Merge {}: {} moved={} discarded={}",
                pair,
                edge.label(),
                count.moved,
                count.discarded
            );
        }

        // ====================================================================
        // STEP 3: Merge attributes into the primary
        // ====================================================================
        if let Some(duplicate) = &duplicate {
            let step = MergeStep::MergeAttributes;
            self.checkpoint(pair, step)?;

            // Transfers ran since Validate; absorb into what is stored now
            let current = self
                .repo
                .find(pair.kind, &pair.primary_id)
                .map_err(|e| MergeError::at_step(pair, step, e))?
                .ok_or_else(|| MergeError::NotFound {
                    kind: pair.kind,
                    id: pair.primary_id.clone(),
                })?;

            let mut merged = current.clone();
            let conflicts = merged.absorb(duplicate)?;
            if !conflicts.is_empty() {
                warn!(
                    "Merge {}: kept primary values for conflicting fields {:?}",
                    pair, conflicts
                );
            }

            // A retry after this step already ran finds nothing new to absorb
            if merged != current {
                merged.touch(Utc::now());
                let updated = self
                    .repo
                    .update(&merged, current.updated_at())
                    .map_err(|e| MergeError::at_step(pair, step, e))?;
                if !updated {
                    return Err(MergeError::Conflict {
                        pair: pair.clone(),
                        step,
                        detail: format!(
                            "{} record {} changed while its attributes were being merged",
                            pair.kind, pair.primary_id
                        ),
                    });
                }
            }
        }

        // ====================================================================
        // STEP 4: Delete the duplicate
        // ====================================================================
        let step = MergeStep::DeleteDuplicate;
        self.checkpoint(pair, step)?;
        let deleted = self
            .repo
            .delete(pair.kind, &pair.duplicate_id)
            .map_err(|e| MergeError::at_step(pair, step, e))?;
        if deleted {
            debug!("Merge {}: duplicate deleted", pair);
        }

        // ====================================================================
        // STEP 5: Close the ledger and reload
        // ====================================================================
        let step = MergeStep::Reload;
        self.checkpoint(pair, step)?;

        self.repo
            .complete_ledger(pair)
            .map_err(|e| MergeError::at_step(pair, step, e))?;

        let merged_entity = self
            .repo
            .find(pair.kind, &pair.primary_id)
            .map_err(|e| MergeError::at_step(pair, step, e))?
            .ok_or_else(|| MergeError::NotFound {
                kind: pair.kind,
                id: pair.primary_id.clone(),
            })?;

        let transferred_relationships = self
            .repo
            .ledger(pair)
            .map_err(|e| MergeError::at_step(pair, step, e))?
            .map(|entry| entry.transferred)
            .unwrap_or_else(|| RelationshipCounts::for_kind(pair.kind));

        info!(
            "Merged {} ({} relationship rows moved{})",
            pair,
            transferred_relationships.total(),
            if resumed { ", resumed" } else { "" }
        );

        Ok(MergeResult {
            merged_entity,
            transferred_relationships,
            deleted_id: pair.duplicate_id.clone(),
            resumed,
        })
    }

    fn checkpoint(&self, pair: &MergePair, step: MergeStep) -> Result<(), MergeError> {
        if self.budget.admit(step) {
            Ok(())
        } else {
            warn!("Merge {}: budget exhausted before step '{}'", pair, step);
            Err(MergeError::ResourceExhausted {
                pair: pair.clone(),
                step,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::budget::{StepBudget, Unbounded};
    use crate::db::testing::*;
    use crate::db::{LedgerEntry, SqliteRepository};
    use crate::entities::{EntityKind, Vendor};
    use crate::error::StoreError;
    use crate::finder::FindScope;
    use crate::planner::MergePlanner;
    use crate::relationships::{Edge, EdgeCount};
    use chrono::DateTime;
    use std::cell::RefCell;
    use std::collections::HashSet;

    fn execute(repo: &SqliteRepository, pair: &MergePair) -> Result<MergeResult, MergeError> {
        MergeExecutor::new(repo, &Unbounded).execute(pair)
    }

    fn assert_no_dangling(repo: &SqliteRepository, kind: EntityKind, id: &str) {
        for edge in edges_for(kind) {
            assert_eq!(repo.count_references(edge, id).unwrap(), 0, "{} still points at {}", edge.label(), id);
        }
    }

    /// Vendor A (primary) applied to E1 and E4, vendor B (duplicate) to E1, E2, E3
    fn vendor_scenario(repo: &SqliteRepository) -> MergePair {
        let a = add_vendor(repo, "Joe's Tacos", "joes-tacos");
        let b = add_vendor(repo, "Joes Tacos", "joes-tacos-2");
        let events: Vec<_> = (1..=4)
            .map(|n| add_event(repo, &format!("Market {}", n), &format!("market-{}", n), None))
            .collect();
        apply(repo, &events[0].id, &a.id);
        apply(repo, &events[3].id, &a.id);
        apply(repo, &events[0].id, &b.id);
        apply(repo, &events[1].id, &b.id);
        apply(repo, &events[2].id, &b.id);
        MergePair::new(EntityKind::Vendors, a.id, b.id)
    }

    #[test]
    fn test_vendor_merge_moves_two_and_discards_overlap() {
        let repo = repo();
        let pair = vendor_scenario(&repo);

        let result = execute(&repo, &pair).unwrap();

        assert_eq!(result.transferred_relationships.event_vendors, Some(2));
        assert_eq!(result.deleted_id, pair.duplicate_id);
        assert!(!result.resumed);
        assert!(repo.find(EntityKind::Vendors, &pair.duplicate_id).unwrap().is_none());
        assert_no_dangling(&repo, EntityKind::Vendors, &pair.duplicate_id);

        // One application per (event, vendor)
        let applications = repo.applications_for_vendor(&pair.primary_id).unwrap();
        assert_eq!(applications.len(), 4);
        let events: HashSet<_> = applications.iter().map(|a| a.event_id.clone()).collect();
        assert_eq!(events.len(), 4);
    }

    #[test]
    fn test_event_merge_keeps_one_favorite_per_user() {
        let repo = repo();
        let primary = add_event(&repo, "Night Market", "night-market", None);
        let duplicate = add_event(&repo, "The Night Market", "the-night-market", None);
        favorite(&repo, "user-1", EntityKind::Events, &primary.id);
        favorite(&repo, "user-1", EntityKind::Events, &duplicate.id);
        favorite(&repo, "user-2", EntityKind::Events, &duplicate.id);

        let pair = MergePair::new(EntityKind::Events, primary.id.clone(), duplicate.id.clone());
        let result = execute(&repo, &pair).unwrap();

        assert_eq!(result.transferred_relationships.favorites, Some(1));
        let user1: Vec<_> = repo
            .favorites_of_user("user-1")
            .unwrap()
            .into_iter()
            .filter(|f| f.favoritable_type == EntityKind::Events)
            .collect();
        assert_eq!(user1.len(), 1);
        assert_eq!(user1[0].favoritable_id, primary.id);
        assert_eq!(repo.favorites_of_user("user-2").unwrap()[0].favoritable_id, primary.id);
        assert_no_dangling(&repo, EntityKind::Events, &duplicate.id);
    }

    #[test]
    fn test_venue_merge_repoints_hosted_events_and_unions_lists() {
        let repo = repo();
        let mut primary = crate::entities::Venue::new("Fairgrounds", "fairgrounds");
        primary.amenities = vec!["Parking".to_string()];
        let mut duplicate = crate::entities::Venue::new("The Fairgrounds", "the-fairgrounds")
            .located_at("100 Fair Way", "Austin", "TX", "78701");
        duplicate.amenities = vec!["parking".to_string(), "Power".to_string()];
        repo.insert(&Listing::Venue(primary.clone())).unwrap();
        repo.insert(&Listing::Venue(duplicate.clone())).unwrap();
        add_event(&repo, "Gig 1", "gig-1", Some(&duplicate.id));
        add_event(&repo, "Gig 2", "gig-2", Some(&duplicate.id));

        let pair = MergePair::new(EntityKind::Venues, primary.id.clone(), duplicate.id.clone());
        let result = execute(&repo, &pair).unwrap();

        assert_eq!(result.transferred_relationships.events, Some(2));
        let Listing::Venue(merged) = result.merged_entity else {
            panic!("expected a venue");
        };
        assert_eq!(merged.name, "Fairgrounds");
        assert_eq!(merged.city.as_deref(), Some("Austin"));
        assert_eq!(merged.amenities, vec!["Parking", "Power"]);
        assert!(merged.updated_at >= primary.updated_at);
        assert_eq!(repo.count_references(Edge::HostedEvents, &primary.id).unwrap(), 2);
        assert_no_dangling(&repo, EntityKind::Venues, &duplicate.id);
    }

    #[test]
    fn test_event_merge_discards_colliding_application() {
        let repo = repo();
        let primary = add_event(&repo, "Night Market", "night-market", None);
        let duplicate = add_event(&repo, "The Night Market", "the-night-market", None);
        let shared = add_vendor(&repo, "Joe's Tacos", "joes-tacos");
        let other = add_vendor(&repo, "Churro Cart", "churro-cart");
        apply(&repo, &primary.id, &shared.id);
        apply(&repo, &duplicate.id, &shared.id);
        apply(&repo, &duplicate.id, &other.id);

        let pair = MergePair::new(EntityKind::Events, primary.id.clone(), duplicate.id.clone());
        let result = execute(&repo, &pair).unwrap();

        assert_eq!(result.transferred_relationships.event_vendors, Some(1));
        let applications = repo.applications_for_event(&primary.id).unwrap();
        assert_eq!(applications.len(), 2);
        let vendors: HashSet<_> = applications.iter().map(|a| a.vendor_id.clone()).collect();
        assert_eq!(vendors.len(), 2);
        assert_eq!(repo.applications_for_vendor(&shared.id).unwrap().len(), 1);
        assert_no_dangling(&repo, EntityKind::Events, &duplicate.id);
    }

    #[test]
    fn test_promoter_merge_repoints_owned_events() {
        let repo = repo();
        let primary = add_promoter(&repo, "Austin Markets", "austin-markets");
        let duplicate = add_promoter(&repo, "Austin Markets LLC", "austin-markets-llc");
        let mut event = crate::entities::Event::new("Spring Fair", "spring-fair", date(2026, 4, 12));
        event.promoter_id = Some(duplicate.id.clone());
        repo.insert(&Listing::Event(event.clone())).unwrap();
        favorite(&repo, "user-1", EntityKind::Promoters, &duplicate.id);

        let pair = MergePair::new(EntityKind::Promoters, primary.id.clone(), duplicate.id.clone());
        let result = execute(&repo, &pair).unwrap();

        assert_eq!(result.transferred_relationships.events, Some(1));
        assert_eq!(result.transferred_relationships.favorites, Some(1));
        assert_eq!(repo.count_references(Edge::PromotedEvents, &primary.id).unwrap(), 1);
        let Listing::Event(stored) = repo.find(EntityKind::Events, &event.id).unwrap().unwrap() else {
            panic!("expected an event");
        };
        assert_eq!(stored.promoter_id.as_deref(), Some(primary.id.as_str()));
        assert!(repo.find(EntityKind::Promoters, &duplicate.id).unwrap().is_none());
        assert_no_dangling(&repo, EntityKind::Promoters, &duplicate.id);
    }

    #[test]
    fn test_preview_and_execute_agree() {
        let repo = repo();
        let pair = vendor_scenario(&repo);
        favorite(&repo, "user-1", EntityKind::Vendors, &pair.duplicate_id);

        let preview = MergePlanner::new(&repo).preview(&pair).unwrap();
        let result = execute(&repo, &pair).unwrap();

        assert_eq!(result.transferred_relationships, preview.relationships_to_transfer);
    }

    #[test]
    fn test_execute_twice_returns_same_state() {
        let repo = repo();
        let pair = vendor_scenario(&repo);

        let first = execute(&repo, &pair).unwrap();
        let second = execute(&repo, &pair).unwrap();

        assert!(second.resumed);
        assert_eq!(second.transferred_relationships, first.transferred_relationships);
        assert_eq!(second.merged_entity, first.merged_entity);
        assert_eq!(repo.applications_for_vendor(&pair.primary_id).unwrap().len(), 4);
    }

    #[test]
    fn test_budget_exhaustion_resumes_to_same_result() {
        // validate, 2 transfers, merge attributes, delete, reload
        for steps in 0..6 {
            let repo = repo();
            let pair = vendor_scenario(&repo);
            let promised = MergePlanner::new(&repo).preview(&pair).unwrap().relationships_to_transfer;

            let budget = StepBudget::new(steps);
            let err = MergeExecutor::new(&repo, &budget).execute(&pair).unwrap_err();
            assert!(err.is_retryable(), "steps={}: {}", steps, err);
            assert!(matches!(err, MergeError::ResourceExhausted { .. }));

            let result = execute(&repo, &pair).unwrap();
            assert_eq!(result.transferred_relationships, promised, "steps={}", steps);
            assert_eq!(result.resumed, steps > 0, "steps={}", steps);
            assert!(repo.find(EntityKind::Vendors, &pair.duplicate_id).unwrap().is_none());
            assert_no_dangling(&repo, EntityKind::Vendors, &pair.duplicate_id);
        }
    }

    #[test]
    fn test_retry_from_a_fresh_connection_resumes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("listings.db");

        // First handler call runs out of budget after the transfers
        let pair = {
            let repo = SqliteRepository::open(&path).unwrap();
            let pair = vendor_scenario(&repo);
            let budget = StepBudget::new(3);
            let err = MergeExecutor::new(&repo, &budget).execute(&pair).unwrap_err();
            assert_eq!(err.step(), Some(MergeStep::MergeAttributes));
            pair
        };

        // A later call opens its own connection and finishes the merge
        let repo = SqliteRepository::open(&path).unwrap();
        let result = execute(&repo, &pair).unwrap();

        assert!(result.resumed);
        assert_eq!(result.transferred_relationships.event_vendors, Some(2));
        assert!(repo.find(EntityKind::Vendors, &pair.duplicate_id).unwrap().is_none());
    }

    #[test]
    fn test_self_merge_is_rejected_without_writes() {
        let repo = repo();
        let vendor = add_vendor(&repo, "Joe's Tacos", "joes-tacos");
        let pair = MergePair::new(EntityKind::Vendors, vendor.id.clone(), vendor.id.clone());

        let err = execute(&repo, &pair).unwrap_err();

        assert!(matches!(err, MergeError::InvalidInput(_)));
        assert!(repo.ledger(&pair).unwrap().is_none());
        assert!(repo.find(EntityKind::Vendors, &vendor.id).unwrap().is_some());
    }

    #[test]
    fn test_unknown_duplicate_is_not_found() {
        let repo = repo();
        let vendor = add_vendor(&repo, "Joe's Tacos", "joes-tacos");
        let pair = MergePair::new(EntityKind::Vendors, vendor.id.clone(), "never-existed");

        let err = execute(&repo, &pair).unwrap_err();
        assert!(matches!(err, MergeError::NotFound { ref id, .. } if id == "never-existed"));
    }

    // ------------------------------------------------------------------------
    // Fault injection through the repository seam
    // ------------------------------------------------------------------------

    #[derive(Clone)]
    enum Fault {
        /// The next transfer of this edge is interrupted by the host
        Interrupt(Edge),
        /// Transfers of this edge silently do nothing
        Skip(Edge),
        /// Another caller completes this merge before the first transfer
        MergeFirst(MergePair),
        /// Another caller edits the row just before the attribute write
        EditBeforeUpdate,
    }

    struct FaultyRepo {
        inner: SqliteRepository,
        fault: RefCell<Option<Fault>>,
    }

    impl FaultyRepo {
        fn new(inner: SqliteRepository, fault: Fault) -> Self {
            FaultyRepo {
                inner,
                fault: RefCell::new(Some(fault)),
            }
        }
    }

    impl EntityRepository for FaultyRepo {
        fn find(&self, kind: EntityKind, id: &str) -> Result<Option<Listing>, StoreError> {
            self.inner.find(kind, id)
        }
        fn list(&self, kind: EntityKind, scope: &FindScope) -> Result<Vec<Listing>, StoreError> {
            self.inner.list(kind, scope)
        }
        fn update(&self, listing: &Listing, expected_updated_at: DateTime<Utc>) -> Result<bool, StoreError> {
            if matches!(*self.fault.borrow(), Some(Fault::EditBeforeUpdate)) {
                self.fault.replace(None);
                // Someone else edits the row between our read and our write
                self.inner
                    .connection()
                    .execute(
                        "UPDATE vendors SET email = 'late@edit.test', updated_at = '2100-01-01T00:00:00.000000000Z'
                         WHERE id = ?1",
                        [listing.id()],
                    )
                    .unwrap();
            }
            self.inner.update(listing, expected_updated_at)
        }
        fn delete(&self, kind: EntityKind, id: &str) -> Result<bool, StoreError> {
            self.inner.delete(kind, id)
        }
        fn count_edge(&self, edge: Edge, primary_id: &str, duplicate_id: &str) -> Result<EdgeCount, StoreError> {
            self.inner.count_edge(edge, primary_id, duplicate_id)
        }
        fn count_references(&self, edge: Edge, id: &str) -> Result<u64, StoreError> {
            self.inner.count_references(edge, id)
        }
        fn transfer_edge(&self, pair: &MergePair, edge: Edge) -> Result<EdgeCount, StoreError> {
            let fault = self.fault.borrow().clone();
            match fault {
                Some(Fault::Interrupt(target)) if target == edge => {
                    self.fault.replace(None);
                    Err(StoreError::Interrupted)
                }
                Some(Fault::Skip(target)) if target == edge => Ok(EdgeCount::default()),
                Some(Fault::MergeFirst(other)) => {
                    self.fault.replace(None);
                    MergeExecutor::new(&self.inner, &Unbounded).execute(&other).unwrap();
                    self.inner.transfer_edge(pair, edge)
                }
                _ => self.inner.transfer_edge(pair, edge),
            }
        }
        fn open_ledger(&self, pair: &MergePair) -> Result<LedgerEntry, StoreError> {
            self.inner.open_ledger(pair)
        }
        fn ledger(&self, pair: &MergePair) -> Result<Option<LedgerEntry>, StoreError> {
            self.inner.ledger(pair)
        }
        fn complete_ledger(&self, pair: &MergePair) -> Result<(), StoreError> {
            self.inner.complete_ledger(pair)
        }
    }

    #[test]
    fn test_interrupted_statement_is_resource_exhausted() {
        let inner = repo();
        let pair = vendor_scenario(&inner);
        favorite(&inner, "user-1", EntityKind::Vendors, &pair.duplicate_id);
        let faulty = FaultyRepo::new(inner, Fault::Interrupt(Edge::Favorites(EntityKind::Vendors)));

        let err = MergeExecutor::new(&faulty, &Unbounded).execute(&pair).unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(err.step(), Some(MergeStep::Transfer(Edge::Favorites(EntityKind::Vendors))));

        // Applications moved before the interrupt stay moved
        assert_eq!(faulty.inner.applications_for_vendor(&pair.duplicate_id).unwrap().len(), 0);

        let result = MergeExecutor::new(&faulty, &Unbounded).execute(&pair).unwrap();
        assert!(result.resumed);
        assert_eq!(result.transferred_relationships.event_vendors, Some(2));
        assert_eq!(result.transferred_relationships.favorites, Some(1));
    }

    #[test]
    fn test_leftover_reference_is_conflict_at_delete() {
        let inner = repo();
        let primary = add_venue(&inner, "Fairgrounds", "fairgrounds");
        let duplicate = add_venue(&inner, "The Fairgrounds", "the-fairgrounds");
        add_event(&inner, "Gig", "gig", Some(&duplicate.id));
        let faulty = FaultyRepo::new(inner, Fault::Skip(Edge::HostedEvents));

        let pair = MergePair::new(EntityKind::Venues, primary.id.clone(), duplicate.id.clone());
        let err = MergeExecutor::new(&faulty, &Unbounded).execute(&pair).unwrap_err();

        assert!(matches!(err, MergeError::Conflict { step: MergeStep::DeleteDuplicate, .. }));
        assert!(!err.is_retryable());
        assert!(faulty.inner.find(EntityKind::Venues, &duplicate.id).unwrap().is_some());

        // Once the edge moves again the same call completes
        faulty.fault.replace(None);
        let result = MergeExecutor::new(&faulty, &Unbounded).execute(&pair).unwrap();
        assert_eq!(result.transferred_relationships.events, Some(1));
    }

    fn vendor_with(repo: &SqliteRepository, name: &str, slug: &str, products: &[&str], email: Option<&str>) -> Vendor {
        let mut vendor = Vendor::new(name, slug);
        vendor.products = products.iter().map(|p| p.to_string()).collect();
        vendor.email = email.map(str::to_string);
        repo.insert(&Listing::Vendor(vendor.clone())).unwrap();
        vendor
    }

    #[test]
    fn test_overlapping_merges_keep_both_absorbed_attributes() {
        let inner = repo();
        let a = vendor_with(&inner, "Joes Tacos", "joes-tacos-a", &["Burritos"], None);
        let b = vendor_with(&inner, "Joe's Tacos", "joes-tacos", &[], None);
        let c = vendor_with(&inner, "Joe's Taco Truck", "joes-taco-truck", &["Churros"], Some("joe@tacos.test"));

        // C lands in B while the merge of A into B is between Validate and its attribute write
        let into_b = MergePair::new(EntityKind::Vendors, b.id.clone(), c.id.clone());
        let faulty = FaultyRepo::new(inner, Fault::MergeFirst(into_b));

        let pair = MergePair::new(EntityKind::Vendors, b.id.clone(), a.id.clone());
        let result = MergeExecutor::new(&faulty, &Unbounded).execute(&pair).unwrap();

        let Listing::Vendor(merged) = result.merged_entity else {
            panic!("expected a vendor");
        };
        assert_eq!(merged.products, vec!["Churros", "Burritos"]);
        assert_eq!(merged.email.as_deref(), Some("joe@tacos.test"));
        assert!(faulty.inner.find(EntityKind::Vendors, &a.id).unwrap().is_none());
        assert!(faulty.inner.find(EntityKind::Vendors, &c.id).unwrap().is_none());
    }

    #[test]
    fn test_edit_during_attribute_merge_is_conflict_and_retry_keeps_it() {
        let inner = repo();
        let primary = vendor_with(&inner, "Joe's Tacos", "joes-tacos", &[], None);
        let duplicate = vendor_with(&inner, "Joes Tacos", "joes-tacos-2", &["Burritos"], Some("old@tacos.test"));
        let faulty = FaultyRepo::new(inner, Fault::EditBeforeUpdate);

        let pair = MergePair::new(EntityKind::Vendors, primary.id.clone(), duplicate.id.clone());
        let err = MergeExecutor::new(&faulty, &Unbounded).execute(&pair).unwrap_err();

        assert!(matches!(err, MergeError::Conflict { step: MergeStep::MergeAttributes, .. }));
        assert!(faulty.inner.find(EntityKind::Vendors, &duplicate.id).unwrap().is_some());
        let Listing::Vendor(stored) = faulty.inner.find(EntityKind::Vendors, &primary.id).unwrap().unwrap() else {
            panic!("expected a vendor");
        };
        assert_eq!(stored.email.as_deref(), Some("late@edit.test"));
        assert!(stored.products.is_empty());

        let result = MergeExecutor::new(&faulty, &Unbounded).execute(&pair).unwrap();
        let Listing::Vendor(merged) = result.merged_entity else {
            panic!("expected a vendor");
        };
        assert_eq!(merged.email.as_deref(), Some("late@edit.test"));
        assert_eq!(merged.products, vec!["Burritos"]);
        assert!(result.resumed);
    }
}
