use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{
    params, params_from_iter, Connection, InterruptHandle, OptionalExtension, Row, Transaction,
    TransactionBehavior,
};
use serde::Serialize;
use std::path::Path;
use std::time::Duration;

use crate::entities::{EntityKind, Event, EventStatus, Listing, MergePair, Promoter, Vendor, Venue};
use crate::error::StoreError;
use crate::finder::FindScope;
use crate::relationships::{
    ApplicationStatus, Edge, EdgeCount, EventVendorApplication, Favorite, RelationshipCounts,
};

// ============================================================================
// REPOSITORY SEAM
// ============================================================================

/// Storage the merge engine reads and writes through.
///
/// Implementations must make `transfer_edge` atomic: the repoint, the
/// removal of colliding leftovers and the ledger bump commit together or not
/// at all. `update` is a compare-and-set on `updated_at`, so a merge never
/// overwrites an edit it did not read.
pub trait EntityRepository {
    fn find(&self, kind: EntityKind, id: &str) -> Result<Option<Listing>, StoreError>;

    /// Listings of `kind` inside `scope`, newest first
    fn list(&self, kind: EntityKind, scope: &FindScope) -> Result<Vec<Listing>, StoreError>;

    /// Overwrite a listing's attributes if its stored `updated_at` still equals
    /// `expected_updated_at`. `false` if the row is gone or was changed since.
    fn update(&self, listing: &Listing, expected_updated_at: DateTime<Utc>) -> Result<bool, StoreError>;

    /// `false` if the row was already gone
    fn delete(&self, kind: EntityKind, id: &str) -> Result<bool, StoreError>;

    /// Duplicate-side rows of `edge` that would move vs. collide
    fn count_edge(&self, edge: Edge, primary_id: &str, duplicate_id: &str) -> Result<EdgeCount, StoreError>;

    /// Rows of `edge` currently pointing at `id`
    fn count_references(&self, edge: Edge, id: &str) -> Result<u64, StoreError>;

    /// Repoint the duplicate's rows of `edge` to the primary, skipping and then
    /// deleting rows that would duplicate a primary-side row
    fn transfer_edge(&self, pair: &MergePair, edge: Edge) -> Result<EdgeCount, StoreError>;

    /// Start (or keep) the ledger entry for `pair`
    fn open_ledger(&self, pair: &MergePair) -> Result<LedgerEntry, StoreError>;

    fn ledger(&self, pair: &MergePair) -> Result<Option<LedgerEntry>, StoreError>;

    fn complete_ledger(&self, pair: &MergePair) -> Result<(), StoreError>;
}

// ============================================================================
// MERGE LEDGER
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerStatus {
    InProgress,
    Completed,
}

impl LedgerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerStatus::InProgress => "in_progress",
            LedgerStatus::Completed => "completed",
        }
    }

    fn parse(s: &str) -> Option<LedgerStatus> {
        match s {
            "in_progress" => Some(LedgerStatus::InProgress),
            "completed" => Some(LedgerStatus::Completed),
            _ => None,
        }
    }
}

/// Progress record of one merge, surviving across retries
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub pair: MergePair,
    pub status: LedgerStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Cumulative rows moved by every attempt so far
    pub transferred: RelationshipCounts,
}

// ============================================================================
// SCHEMA
// ============================================================================

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery (in-memory databases report "memory")
    let _mode: String = conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    conn.pragma_update(None, "foreign_keys", "ON")?;

    // ==========================================================================
    // Entity tables
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS venues (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            slug TEXT UNIQUE NOT NULL,
            address TEXT,
            city TEXT,
            state TEXT,
            zip TEXT,
            latitude REAL,
            longitude REAL,
            description TEXT,
            website TEXT,
            amenities TEXT NOT NULL DEFAULT '[]',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS promoters (
            id TEXT PRIMARY KEY,
            company_name TEXT NOT NULL,
            slug TEXT UNIQUE NOT NULL,
            description TEXT,
            email TEXT,
            phone TEXT,
            website TEXT,
            social_links TEXT NOT NULL DEFAULT '[]',
            verified INTEGER NOT NULL DEFAULT 0,
            commercial INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS vendors (
            id TEXT PRIMARY KEY,
            business_name TEXT NOT NULL,
            slug TEXT UNIQUE NOT NULL,
            description TEXT,
            email TEXT,
            phone TEXT,
            website TEXT,
            products TEXT NOT NULL DEFAULT '[]',
            verified INTEGER NOT NULL DEFAULT 0,
            commercial INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            slug TEXT UNIQUE NOT NULL,
            description TEXT,
            start_date TEXT NOT NULL,
            end_date TEXT,
            status TEXT NOT NULL,
            venue_id TEXT REFERENCES venues(id),
            promoter_id TEXT REFERENCES promoters(id),
            tags TEXT NOT NULL DEFAULT '[]',
            categories TEXT NOT NULL DEFAULT '[]',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Relationship tables
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS event_vendors (
            id TEXT PRIMARY KEY,
            event_id TEXT NOT NULL REFERENCES events(id),
            vendor_id TEXT NOT NULL REFERENCES vendors(id),
            status TEXT NOT NULL,
            booth_info TEXT,
            created_at TEXT NOT NULL,
            UNIQUE (event_id, vendor_id)
        )",
        [],
    )?;

    // Polymorphic: no foreign key, the engine keeps it consistent
    conn.execute(
        "CREATE TABLE IF NOT EXISTS favorites (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            favoritable_type TEXT NOT NULL,
            favoritable_id TEXT NOT NULL,
            created_at TEXT NOT NULL,
            UNIQUE (user_id, favoritable_type, favoritable_id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS merge_ledger (
            kind TEXT NOT NULL,
            primary_id TEXT NOT NULL,
            duplicate_id TEXT NOT NULL,
            status TEXT NOT NULL,
            started_at TEXT NOT NULL,
            completed_at TEXT,
            transferred TEXT NOT NULL DEFAULT '{}',
            PRIMARY KEY (kind, primary_id, duplicate_id)
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute("CREATE INDEX IF NOT EXISTS idx_events_venue ON events(venue_id)", [])?;
    conn.execute("CREATE INDEX IF NOT EXISTS idx_events_promoter ON events(promoter_id)", [])?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_event_vendors_vendor ON event_vendors(vendor_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_favorites_target ON favorites(favoritable_type, favoritable_id)",
        [],
    )?;

    Ok(())
}

// ============================================================================
// SQLITE REPOSITORY
// ============================================================================

pub struct SqliteRepository {
    conn: Connection,
}

impl SqliteRepository {
    /// Open (or create) a database file and apply the schema
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database at {}", path.display()))?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    pub fn from_connection(conn: Connection) -> Result<Self> {
        conn.busy_timeout(Duration::from_secs(5))?;
        setup_database(&conn).context("Failed to set up schema")?;
        Ok(SqliteRepository { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Lets the host abort a running statement when its compute budget runs
    /// out; the aborted call fails with `StoreError::Interrupted`.
    pub fn interrupt_handle(&self) -> InterruptHandle {
        self.conn.get_interrupt_handle()
    }

    // ------------------------------------------------------------------------
    // Writes owned by the CRUD layer (used by the CLI and tests)
    // ------------------------------------------------------------------------

    pub fn insert(&self, listing: &Listing) -> Result<(), StoreError> {
        write_listing(&self.conn, listing, WriteMode::Insert)?;
        Ok(())
    }

    pub fn insert_application(&self, application: &EventVendorApplication) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO event_vendors (id, event_id, vendor_id, status, booth_info, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                application.id,
                application.event_id,
                application.vendor_id,
                application.status.as_str(),
                application.booth_info,
                ts(&application.created_at),
            ],
        )?;
        Ok(())
    }

    pub fn insert_favorite(&self, favorite: &Favorite) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO favorites (id, user_id, favoritable_type, favoritable_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                favorite.id,
                favorite.user_id,
                favorite.favoritable_type.favoritable_type(),
                favorite.favoritable_id,
                ts(&favorite.created_at),
            ],
        )?;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Relationship reads
    // ------------------------------------------------------------------------

    /// Applications where `column` (event_id or vendor_id) equals `id`
    fn applications_where(&self, column: &str, id: &str) -> Result<Vec<EventVendorApplication>, StoreError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT id, event_id, vendor_id, status, booth_info, created_at
             FROM event_vendors
             WHERE {column} = ?1
             ORDER BY created_at, id"
        ))?;

        let applications = stmt
            .query_map([id], |row| {
                let status: String = row.get(3)?;
                Ok(EventVendorApplication {
                    id: row.get(0)?,
                    event_id: row.get(1)?,
                    vendor_id: row.get(2)?,
                    status: ApplicationStatus::parse(&status)
                        .ok_or_else(|| conversion_error(3, UnknownValue(status)))?,
                    booth_info: row.get(4)?,
                    created_at: parse_ts(row, 5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(applications)
    }

    pub fn applications_for_vendor(&self, vendor_id: &str) -> Result<Vec<EventVendorApplication>, StoreError> {
        self.applications_where("vendor_id", vendor_id)
    }

    pub fn applications_for_event(&self, event_id: &str) -> Result<Vec<EventVendorApplication>, StoreError> {
        self.applications_where("event_id", event_id)
    }

    pub fn favorites_of_user(&self, user_id: &str) -> Result<Vec<Favorite>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, favoritable_type, favoritable_id, created_at
             FROM favorites
             WHERE user_id = ?1
             ORDER BY created_at, id",
        )?;

        let favorites = stmt
            .query_map([user_id], |row| {
                let tag: String = row.get(2)?;
                let kind = EntityKind::ALL
                    .into_iter()
                    .find(|k| k.favoritable_type() == tag)
                    .ok_or_else(|| conversion_error(2, UnknownValue(tag)))?;
                Ok(Favorite {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    favoritable_type: kind,
                    favoritable_id: row.get(3)?,
                    created_at: parse_ts(row, 4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(favorites)
    }
}

impl EntityRepository for SqliteRepository {
    fn find(&self, kind: EntityKind, id: &str) -> Result<Option<Listing>, StoreError> {
        let sql = format!("SELECT {} FROM {} WHERE id = ?1", columns(kind), kind.as_str());
        let listing = self
            .conn
            .query_row(&sql, [id], |row| map_listing(kind, row))
            .optional()?;
        Ok(listing)
    }

    fn list(&self, kind: EntityKind, scope: &FindScope) -> Result<Vec<Listing>, StoreError> {
        let mut sql = format!("SELECT {} FROM {} WHERE 1 = 1", columns(kind), kind.as_str());
        let mut values: Vec<String> = Vec::new();

        if let Some(ids) = &scope.ids {
            if ids.is_empty() {
                return Ok(Vec::new());
            }
            sql.push_str(&format!(" AND id IN ({})", vec!["?"; ids.len()].join(", ")));
            values.extend(ids.iter().cloned());
        }

        if let Some(after) = &scope.created_after {
            sql.push_str(" AND created_at > ?");
            values.push(ts(after));
        }

        sql.push_str(" ORDER BY created_at DESC, id");

        if let Some(limit) = scope.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let listings = stmt
            .query_map(params_from_iter(values.iter()), |row| map_listing(kind, row))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(listings)
    }

    fn update(&self, listing: &Listing, expected_updated_at: DateTime<Utc>) -> Result<bool, StoreError> {
        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)?;

        let stored: Option<String> = tx
            .query_row(
                &format!("SELECT updated_at FROM {} WHERE id = ?1", listing.kind().as_str()),
                [listing.id()],
                |row| row.get(0),
            )
            .optional()?;

        // Compare-and-set: dropping the transaction rolls back
        if stored.as_deref() != Some(ts(&expected_updated_at).as_str()) {
            return Ok(false);
        }

        let written = write_listing(&tx, listing, WriteMode::Update)?;
        tx.commit()?;
        Ok(written > 0)
    }

    fn delete(&self, kind: EntityKind, id: &str) -> Result<bool, StoreError> {
        let deleted = self
            .conn
            .execute(&format!("DELETE FROM {} WHERE id = ?1", kind.as_str()), [id])?;
        Ok(deleted > 0)
    }

    fn count_edge(&self, edge: Edge, primary_id: &str, duplicate_id: &str) -> Result<EdgeCount, StoreError> {
        let table = edge.table();
        let fk = edge.foreign_key();

        let total: i64 = self.conn.query_row(
            &format!(
                "SELECT COUNT(*) FROM {table} d WHERE d.{fk} = ?1{}",
                type_filter(edge, "d")
            ),
            [duplicate_id],
            |row| row.get(0),
        )?;

        let colliding: i64 = match edge.partner_key() {
            None => 0,
            Some(partner) => self.conn.query_row(
                &format!(
                    "SELECT COUNT(*) FROM {table} d
                     WHERE d.{fk} = ?1{}
                       AND EXISTS (
                           SELECT 1 FROM {table} p
                           WHERE p.{fk} = ?2 AND p.{partner} = d.{partner}{}
                       )",
                    type_filter(edge, "d"),
                    type_filter(edge, "p"),
                ),
                params![duplicate_id, primary_id],
                |row| row.get(0),
            )?,
        };

        Ok(EdgeCount {
            moved: (total - colliding) as u64,
            discarded: colliding as u64,
        })
    }

    fn count_references(&self, edge: Edge, id: &str) -> Result<u64, StoreError> {
        let count: i64 = self.conn.query_row(
            &format!(
                "SELECT COUNT(*) FROM {} d WHERE d.{} = ?1{}",
                edge.table(),
                edge.foreign_key(),
                type_filter(edge, "d")
            ),
            [id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn transfer_edge(&self, pair: &MergePair, edge: Edge) -> Result<EdgeCount, StoreError> {
        let table = edge.table();
        let fk = edge.foreign_key();
        let filter = type_filter(edge, table);

        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)?;

        // Rows that would duplicate a primary-side natural key are skipped by
        // OR IGNORE, then removed. Edges without a natural key use a plain
        // UPDATE so an unexpected uniqueness failure surfaces as a conflict.
        let (moved, discarded) = if edge.partner_key().is_some() {
            let moved = tx.execute(
                &format!("UPDATE OR IGNORE {table} SET {fk} = ?1 WHERE {fk} = ?2{filter}"),
                params![pair.primary_id, pair.duplicate_id],
            )?;
            let discarded = tx.execute(
                &format!("DELETE FROM {table} WHERE {fk} = ?1{filter}"),
                params![pair.duplicate_id],
            )?;
            (moved, discarded)
        } else {
            let moved = tx.execute(
                &format!("UPDATE {table} SET {fk} = ?1 WHERE {fk} = ?2"),
                params![pair.primary_id, pair.duplicate_id],
            )?;
            (moved, 0)
        };

        let transferred: Option<String> = tx
            .query_row(
                "SELECT transferred FROM merge_ledger
                 WHERE kind = ?1 AND primary_id = ?2 AND duplicate_id = ?3",
                params![pair.kind.as_str(), pair.primary_id, pair.duplicate_id],
                |row| row.get(0),
            )
            .optional()?;

        if let Some(json) = transferred {
            let mut counts: RelationshipCounts = serde_json::from_str(&json)?;
            counts.add(edge, moved as u64);
            tx.execute(
                "UPDATE merge_ledger SET transferred = ?4
                 WHERE kind = ?1 AND primary_id = ?2 AND duplicate_id = ?3",
                params![
                    pair.kind.as_str(),
                    pair.primary_id,
                    pair.duplicate_id,
                    serde_json::to_string(&counts)?,
                ],
            )?;
        }

        tx.commit()?;

        Ok(EdgeCount {
            moved: moved as u64,
            discarded: discarded as u64,
        })
    }

    fn open_ledger(&self, pair: &MergePair) -> Result<LedgerEntry, StoreError> {
        let initial = serde_json::to_string(&RelationshipCounts::for_kind(pair.kind))?;

        // A completed entry for a duplicate that exists again is restarted
        self.conn.execute(
            "INSERT INTO merge_ledger (kind, primary_id, duplicate_id, status, started_at, completed_at, transferred)
             VALUES (?1, ?2, ?3, 'in_progress', ?4, NULL, ?5)
             ON CONFLICT (kind, primary_id, duplicate_id) DO UPDATE SET
                 status = 'in_progress',
                 started_at = excluded.started_at,
                 completed_at = NULL,
                 transferred = excluded.transferred
             WHERE merge_ledger.status = 'completed'",
            params![
                pair.kind.as_str(),
                pair.primary_id,
                pair.duplicate_id,
                ts(&Utc::now()),
                initial,
            ],
        )?;

        self.ledger(pair)?.ok_or_else(|| {
            StoreError::Sqlite(rusqlite::Error::QueryReturnedNoRows)
        })
    }

    fn ledger(&self, pair: &MergePair) -> Result<Option<LedgerEntry>, StoreError> {
        let entry = self
            .conn
            .query_row(
                "SELECT status, started_at, completed_at, transferred FROM merge_ledger
                 WHERE kind = ?1 AND primary_id = ?2 AND duplicate_id = ?3",
                params![pair.kind.as_str(), pair.primary_id, pair.duplicate_id],
                |row| {
                    let status: String = row.get(0)?;
                    let completed_at: Option<String> = row.get(2)?;
                    let transferred: String = row.get(3)?;
                    Ok(LedgerEntry {
                        pair: pair.clone(),
                        status: LedgerStatus::parse(&status)
                            .ok_or_else(|| conversion_error(0, UnknownValue(status)))?,
                        started_at: parse_ts(row, 1)?,
                        completed_at: completed_at
                            .map(|s| parse_ts_str(2, &s))
                            .transpose()?,
                        transferred: serde_json::from_str(&transferred)
                            .map_err(|e| conversion_error(3, e))?,
                    })
                },
            )
            .optional()?;
        Ok(entry)
    }

    fn complete_ledger(&self, pair: &MergePair) -> Result<(), StoreError> {
        self.conn.execute(
            "UPDATE merge_ledger SET status = 'completed', completed_at = ?4
             WHERE kind = ?1 AND primary_id = ?2 AND duplicate_id = ?3 AND status = 'in_progress'",
            params![
                pair.kind.as_str(),
                pair.primary_id,
                pair.duplicate_id,
                ts(&Utc::now()),
            ],
        )?;
        Ok(())
    }
}

// ============================================================================
// ROW MAPPING
// ============================================================================

const VENUE_COLUMNS: &str = "id, name, slug, address, city, state, zip, latitude, longitude, \
     description, website, amenities, created_at, updated_at";

const EVENT_COLUMNS: &str = "id, name, slug, description, start_date, end_date, status, \
     venue_id, promoter_id, tags, categories, created_at, updated_at";

const VENDOR_COLUMNS: &str = "id, business_name, slug, description, email, phone, website, \
     products, verified, commercial, created_at, updated_at";

const PROMOTER_COLUMNS: &str = "id, company_name, slug, description, email, phone, website, \
     social_links, verified, commercial, created_at, updated_at";

fn columns(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Venues => VENUE_COLUMNS,
        EntityKind::Events => EVENT_COLUMNS,
        EntityKind::Vendors => VENDOR_COLUMNS,
        EntityKind::Promoters => PROMOTER_COLUMNS,
    }
}

fn map_listing(kind: EntityKind, row: &Row<'_>) -> rusqlite::Result<Listing> {
    Ok(match kind {
        EntityKind::Venues => Listing::Venue(Venue {
            id: row.get(0)?,
            name: row.get(1)?,
            slug: row.get(2)?,
            address: row.get(3)?,
            city: row.get(4)?,
            state: row.get(5)?,
            zip: row.get(6)?,
            latitude: row.get(7)?,
            longitude: row.get(8)?,
            description: row.get(9)?,
            website: row.get(10)?,
            amenities: parse_list(row, 11)?,
            created_at: parse_ts(row, 12)?,
            updated_at: parse_ts(row, 13)?,
        }),
        EntityKind::Events => {
            let status: String = row.get(6)?;
            let end_date: Option<String> = row.get(5)?;
            Listing::Event(Event {
                id: row.get(0)?,
                name: row.get(1)?,
                slug: row.get(2)?,
                description: row.get(3)?,
                start_date: parse_date(4, &row.get::<_, String>(4)?)?,
                end_date: end_date.map(|s| parse_date(5, &s)).transpose()?,
                status: EventStatus::parse(&status)
                    .ok_or_else(|| conversion_error(6, UnknownValue(status)))?,
                venue_id: row.get(7)?,
                promoter_id: row.get(8)?,
                tags: parse_list(row, 9)?,
                categories: parse_list(row, 10)?,
                created_at: parse_ts(row, 11)?,
                updated_at: parse_ts(row, 12)?,
            })
        }
        EntityKind::Vendors => Listing::Vendor(Vendor {
            id: row.get(0)?,
            business_name: row.get(1)?,
            slug: row.get(2)?,
            description: row.get(3)?,
            email: row.get(4)?,
            phone: row.get(5)?,
            website: row.get(6)?,
            products: parse_list(row, 7)?,
            verified: row.get(8)?,
            commercial: row.get(9)?,
            created_at: parse_ts(row, 10)?,
            updated_at: parse_ts(row, 11)?,
        }),
        EntityKind::Promoters => Listing::Promoter(Promoter {
            id: row.get(0)?,
            company_name: row.get(1)?,
            slug: row.get(2)?,
            description: row.get(3)?,
            email: row.get(4)?,
            phone: row.get(5)?,
            website: row.get(6)?,
            social_links: parse_list(row, 7)?,
            verified: row.get(8)?,
            commercial: row.get(9)?,
            created_at: parse_ts(row, 10)?,
            updated_at: parse_ts(row, 11)?,
        }),
    })
}

#[derive(Clone, Copy)]
enum WriteMode {
    Insert,
    Update,
}

/// Insert or update every column. Both statements bind the same parameter order.
fn write_listing(conn: &Connection, listing: &Listing, mode: WriteMode) -> Result<usize, StoreError> {
    let written = match listing {
        Listing::Venue(v) => {
            let sql = match mode {
                WriteMode::Insert => "INSERT INTO venues (id, name, slug, address, city, state, zip, latitude,
                     longitude, description, website, amenities, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                WriteMode::Update => "UPDATE venues SET name = ?2, slug = ?3, address = ?4, city = ?5,
                     state = ?6, zip = ?7, latitude = ?8, longitude = ?9, description = ?10,
                     website = ?11, amenities = ?12, created_at = ?13, updated_at = ?14
                     WHERE id = ?1",
            };
            conn.execute(
                sql,
                params![
                    v.id,
                    v.name,
                    v.slug,
                    v.address,
                    v.city,
                    v.state,
                    v.zip,
                    v.latitude,
                    v.longitude,
                    v.description,
                    v.website,
                    serde_json::to_string(&v.amenities)?,
                    ts(&v.created_at),
                    ts(&v.updated_at),
                ],
            )?
        }
        Listing::Event(e) => {
            let sql = match mode {
                WriteMode::Insert => "INSERT INTO events (id, name, slug, description, start_date, end_date,
                     status, venue_id, promoter_id, tags, categories, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                WriteMode::Update => "UPDATE events SET name = ?2, slug = ?3, description = ?4,
                     start_date = ?5, end_date = ?6, status = ?7, venue_id = ?8, promoter_id = ?9,
                     tags = ?10, categories = ?11, created_at = ?12, updated_at = ?13
                     WHERE id = ?1",
            };
            conn.execute(
                sql,
                params![
                    e.id,
                    e.name,
                    e.slug,
                    e.description,
                    e.start_date.format("%Y-%m-%d").to_string(),
                    e.end_date.map(|d| d.format("%Y-%m-%d").to_string()),
                    e.status.as_str(),
                    e.venue_id,
                    e.promoter_id,
                    serde_json::to_string(&e.tags)?,
                    serde_json::to_string(&e.categories)?,
                    ts(&e.created_at),
                    ts(&e.updated_at),
                ],
            )?
        }
        Listing::Vendor(v) => {
            let sql = match mode {
                WriteMode::Insert => "INSERT INTO vendors (id, business_name, slug, description, email, phone,
                     website, products, verified, commercial, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                WriteMode::Update => "UPDATE vendors SET business_name = ?2, slug = ?3, description = ?4,
                     email = ?5, phone = ?6, website = ?7, products = ?8, verified = ?9,
                     commercial = ?10, created_at = ?11, updated_at = ?12
                     WHERE id = ?1",
            };
            conn.execute(
                sql,
                params![
                    v.id,
                    v.business_name,
                    v.slug,
                    v.description,
                    v.email,
                    v.phone,
                    v.website,
                    serde_json::to_string(&v.products)?,
                    v.verified,
                    v.commercial,
                    ts(&v.created_at),
                    ts(&v.updated_at),
                ],
            )?
        }
        Listing::Promoter(p) => {
            let sql = match mode {
                WriteMode::Insert => "INSERT INTO promoters (id, company_name, slug, description, email, phone,
                     website, social_links, verified, commercial, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                WriteMode::Update => "UPDATE promoters SET company_name = ?2, slug = ?3, description = ?4,
                     email = ?5, phone = ?6, website = ?7, social_links = ?8, verified = ?9,
                     commercial = ?10, created_at = ?11, updated_at = ?12
                     WHERE id = ?1",
            };
            conn.execute(
                sql,
                params![
                    p.id,
                    p.company_name,
                    p.slug,
                    p.description,
                    p.email,
                    p.phone,
                    p.website,
                    serde_json::to_string(&p.social_links)?,
                    p.verified,
                    p.commercial,
                    ts(&p.created_at),
                    ts(&p.updated_at),
                ],
            )?
        }
    };
    Ok(written)
}

// ============================================================================
// ENCODING HELPERS
// ============================================================================

#[derive(Debug, thiserror::Error)]
#[error("unknown value '{0}'")]
struct UnknownValue(String);

/// Fixed-width UTC timestamps so text ordering matches time ordering
fn ts(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn conversion_error<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn parse_ts_str(idx: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

fn parse_ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let s: String = row.get(idx)?;
    parse_ts_str(idx, &s)
}

fn parse_date(idx: usize, s: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| conversion_error(idx, e))
}

fn parse_list(row: &Row<'_>, idx: usize) -> rusqlite::Result<Vec<String>> {
    let s: String = row.get(idx)?;
    serde_json::from_str(&s).map_err(|e| conversion_error(idx, e))
}

/// Discriminator predicate for polymorphic edges (constant, never user input)
fn type_filter(edge: Edge, alias: &str) -> String {
    match edge.type_filter() {
        Some((column, value)) => format!(" AND {alias}.{column} = '{value}'"),
        None => String::new(),
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    pub fn repo() -> SqliteRepository {
        SqliteRepository::open_in_memory().unwrap()
    }

    pub fn add_venue(repo: &SqliteRepository, name: &str, slug: &str) -> Venue {
        let venue = Venue::new(name, slug).located_at("100 Fair Way", "Austin", "TX", "78701");
        repo.insert(&Listing::Venue(venue.clone())).unwrap();
        venue
    }

    pub fn add_promoter(repo: &SqliteRepository, name: &str, slug: &str) -> Promoter {
        let promoter = Promoter::new(name, slug);
        repo.insert(&Listing::Promoter(promoter.clone())).unwrap();
        promoter
    }

    pub fn add_vendor(repo: &SqliteRepository, name: &str, slug: &str) -> Vendor {
        let vendor = Vendor::new(name, slug);
        repo.insert(&Listing::Vendor(vendor.clone())).unwrap();
        vendor
    }

    pub fn add_event(repo: &SqliteRepository, name: &str, slug: &str, venue_id: Option<&str>) -> Event {
        let mut event = Event::new(name, slug, date(2024, 6, 1));
        event.venue_id = venue_id.map(str::to_string);
        repo.insert(&Listing::Event(event.clone())).unwrap();
        event
    }

    pub fn apply(repo: &SqliteRepository, event_id: &str, vendor_id: &str) -> EventVendorApplication {
        let application = EventVendorApplication::new(event_id, vendor_id, ApplicationStatus::Pending);
        repo.insert_application(&application).unwrap();
        application
    }

    pub fn favorite(repo: &SqliteRepository, user_id: &str, kind: EntityKind, id: &str) {
        repo.insert_favorite(&Favorite::new(user_id, kind, id)).unwrap();
    }
}
