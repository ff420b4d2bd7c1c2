// 🔎 Duplicate Finder - every same-kind pair above a threshold
//
// O(n²) over the scope: scopes are bounded by an operator's review context,
// not a hot path.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::entities::Listing;
use crate::similarity;

/// Lowest threshold an operator may ask for
pub const MIN_THRESHOLD: f64 = 0.5;

/// Highest threshold an operator may ask for
pub const MAX_THRESHOLD: f64 = 1.0;

pub const DEFAULT_THRESHOLD: f64 = 0.7;

// ============================================================================
// SCOPE
// ============================================================================

/// Which listings of a kind to compare. Default = all of them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindScope {
    /// Only these ids
    pub ids: Option<Vec<String>>,

    /// Only listings created strictly after this instant
    pub created_after: Option<DateTime<Utc>>,

    /// At most this many listings, newest first
    pub limit: Option<usize>,
}

// ============================================================================
// RESULTS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicatePair {
    pub entity1: Listing,
    pub entity2: Listing,
    pub similarity: f64,
    pub matched_fields: Vec<String>,
}

impl DuplicatePair {
    fn newest_created_at(&self) -> DateTime<Utc> {
        self.entity1.created_at().max(self.entity2.created_at())
    }
}

/// Listings transitively linked through duplicate pairs
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateGroup {
    pub entities: Vec<Listing>,
    pub highest_similarity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FindDuplicatesResponse {
    pub pairs: Vec<DuplicatePair>,
    pub total_entities: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub groups: Option<Vec<DuplicateGroup>>,
}

// ============================================================================
// DUPLICATE FINDER
// ============================================================================

pub struct DuplicateFinder {
    /// Minimum similarity for a pair to be reported (default: 0.7)
    pub threshold: f64,

    /// Also cluster pairs into groups
    pub group: bool,
}

impl DuplicateFinder {
    /// Assumes `threshold` was validated by the caller
    pub fn new(threshold: f64) -> Self {
        DuplicateFinder {
            threshold,
            group: false,
        }
    }

    pub fn with_grouping(mut self, group: bool) -> Self {
        self.group = group;
        self
    }

    /// Compare every unordered pair of `listings` once
    pub fn find(&self, listings: &[Listing]) -> FindDuplicatesResponse {
        let mut pairs = Vec::new();

        for i in 0..listings.len() {
            for j in (i + 1)..listings.len() {
                let (a, b) = (&listings[i], &listings[j]);

                let Some(sim) = similarity::score(a, b) else {
                    continue;
                };

                if sim.score >= self.threshold {
                    pairs.push(DuplicatePair {
                        entity1: a.clone(),
                        entity2: b.clone(),
                        similarity: sim.score,
                        matched_fields: sim.matched_fields,
                    });
                }
            }
        }

        // Highest similarity first; ties surface the newest records first
        pairs.sort_by(|x, y| {
            y.similarity
                .total_cmp(&x.similarity)
                .then_with(|| y.newest_created_at().cmp(&x.newest_created_at()))
                .then_with(|| x.entity1.id().cmp(y.entity1.id()))
                .then_with(|| x.entity2.id().cmp(y.entity2.id()))
        });

        let groups = if self.group {
            Some(group_pairs(&pairs))
        } else {
            None
        };

        FindDuplicatesResponse {
            pairs,
            total_entities: listings.len(),
            groups,
        }
    }
}

impl Default for DuplicateFinder {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}

// ============================================================================
// GROUPING (union-find)
// ============================================================================

struct DisjointSet {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl DisjointSet {
    fn new(n: usize) -> Self {
        DisjointSet {
            parent: (0..n).collect(),
            rank: vec![0; n],
        }
    }

    fn find(&mut self, x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        // path compression
        let mut node = x;
        while self.parent[node] != root {
            let next = self.parent[node];
            self.parent[node] = root;
            node = next;
        }
        root
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return;
        }
        match self.rank[ra].cmp(&self.rank[rb]) {
            std::cmp::Ordering::Less => self.parent[ra] = rb,
            std::cmp::Ordering::Greater => self.parent[rb] = ra,
            std::cmp::Ordering::Equal => {
                self.parent[rb] = ra;
                self.rank[ra] += 1;
            }
        }
    }
}

/// Merge pairs sharing a listing into groups, strongest group first.
/// Entities within a group keep first-seen order over the (sorted) pairs.
pub fn group_pairs(pairs: &[DuplicatePair]) -> Vec<DuplicateGroup> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut listings: Vec<&Listing> = Vec::new();

    for pair in pairs {
        for listing in [&pair.entity1, &pair.entity2] {
            index.entry(listing.id()).or_insert_with(|| {
                listings.push(listing);
                listings.len() - 1
            });
        }
    }

    let mut set = DisjointSet::new(listings.len());
    for pair in pairs {
        set.union(index[pair.entity1.id()], index[pair.entity2.id()]);
    }

    let mut by_root: HashMap<usize, usize> = HashMap::new();
    let mut groups: Vec<DuplicateGroup> = Vec::new();

    for (i, listing) in listings.iter().enumerate() {
        let root = set.find(i);
        let slot = *by_root.entry(root).or_insert_with(|| {
            groups.push(DuplicateGroup {
                entities: Vec::new(),
                highest_similarity: 0.0,
            });
            groups.len() - 1
        });
        groups[slot].entities.push((*listing).clone());
    }

    for pair in pairs {
        let root = set.find(index[pair.entity1.id()]);
        let group = &mut groups[by_root[&root]];
        group.highest_similarity = group.highest_similarity.max(pair.similarity);
    }

    groups.sort_by(|a, b| {
        b.highest_similarity
            .total_cmp(&a.highest_similarity)
            .then_with(|| b.entities.len().cmp(&a.entities.len()))
    });
    groups
}
