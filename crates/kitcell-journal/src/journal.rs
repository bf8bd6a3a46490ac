//! [`FulfillmentJournal`] – append-only SQLite audit log.
//!
//! # Storage layout
//!
//! A single table `fulfillment_log` is created (if it does not already exist)
//! with the following columns:
//!
//! | column        | type    | description                                        |
//! |---------------|---------|----------------------------------------------------|
//! | seq           | INTEGER | Autoincrement primary key; insertion order         |
//! | id            | TEXT    | UUID v4 of the entry                               |
//! | timestamp     | TEXT    | RFC-3339 entry timestamp (UTC)                     |
//! | kind          | TEXT    | One of the [`EntryKind`] strings                   |
//! | order_id      | TEXT    | Related order (NULL for rejected documents)        |
//! | shipment_type | TEXT    | Related shipment (NULL for order-level entries)    |
//! | detail        | TEXT    | Kind-specific detail, JSON where structured        |

use chrono::Utc;
use rusqlite::{Connection, params};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use kitcell_types::ShipmentStatus;

// ─────────────────────────────────────────────────────────────────────────────
// Error type
// ─────────────────────────────────────────────────────────────────────────────

/// Errors that can arise from journal operations.
#[derive(Error, Debug)]
pub enum JournalError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("unknown journal entry kind: {0}")]
    UnknownKind(String),
}

// ─────────────────────────────────────────────────────────────────────────────
// Entry model
// ─────────────────────────────────────────────────────────────────────────────

/// Category of a journal entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// A raw order passed validation and entered the registry.
    OrderReceived,
    /// A raw order failed validation and was rejected.
    OrderRejected,
    /// A shipment reached a terminal status.
    ShipmentOutcome,
    /// One submission call was made (successful or not).
    SubmissionAttempt,
}

impl EntryKind {
    fn as_str(&self) -> &'static str {
        match self {
            EntryKind::OrderReceived => "order_received",
            EntryKind::OrderRejected => "order_rejected",
            EntryKind::ShipmentOutcome => "shipment_outcome",
            EntryKind::SubmissionAttempt => "submission_attempt",
        }
    }

    fn from_str(s: &str) -> Option<Self> {
        match s {
            "order_received" => Some(EntryKind::OrderReceived),
            "order_rejected" => Some(EntryKind::OrderRejected),
            "shipment_outcome" => Some(EntryKind::ShipmentOutcome),
            "submission_attempt" => Some(EntryKind::SubmissionAttempt),
            _ => None,
        }
    }
}

/// A single row of the fulfillment log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntry {
    pub seq: i64,
    pub id: String,
    /// RFC-3339 timestamp (UTC).
    pub timestamp: String,
    pub kind: EntryKind,
    pub order_id: Option<String>,
    pub shipment_type: Option<String>,
    /// Kind-specific detail; JSON for structured payloads.
    pub detail: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// FulfillmentJournal
// ─────────────────────────────────────────────────────────────────────────────

/// SQLite-backed append-only audit log of fulfillment decisions.
pub struct FulfillmentJournal {
    conn: Connection,
}

impl FulfillmentJournal {
    /// Open (or create) a persistent journal at `path`.
    pub fn open(path: &str) -> Result<Self, JournalError> {
        let conn = Connection::open(path)?;
        let journal = Self { conn };
        journal.init_schema()?;
        Ok(journal)
    }

    /// Open a temporary in-memory journal (useful for testing).
    pub fn open_in_memory() -> Result<Self, JournalError> {
        let conn = Connection::open_in_memory()?;
        let journal = Self { conn };
        journal.init_schema()?;
        Ok(journal)
    }

    fn init_schema(&self) -> Result<(), JournalError> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS fulfillment_log (
                seq           INTEGER PRIMARY KEY AUTOINCREMENT,
                id            TEXT NOT NULL,
                timestamp     TEXT NOT NULL,
                kind          TEXT NOT NULL,
                order_id      TEXT,
                shipment_type TEXT,
                detail        TEXT NOT NULL
            );",
        )?;
        Ok(())
    }

    /// Record that an order entered the registry.
    pub fn order_received(&self, order_id: &str, priority: u16) -> Result<(), JournalError> {
        self.append(
            EntryKind::OrderReceived,
            Some(order_id),
            None,
            &format!("priority={priority}"),
        )
    }

    /// Record that a raw order document was rejected.
    pub fn order_rejected(&self, reason: &str) -> Result<(), JournalError> {
        self.append(EntryKind::OrderRejected, None, None, reason)
    }

    /// Record a shipment's terminal status.  `missing` lists the part types
    /// of requirements that were never delivered (empty on `Complete`).
    pub fn shipment_outcome(
        &self,
        order_id: &str,
        shipment_type: &str,
        status: ShipmentStatus,
        missing: &[String],
    ) -> Result<(), JournalError> {
        let detail = serde_json::json!({
            "status": status,
            "missing": missing,
        })
        .to_string();
        self.append(
            EntryKind::ShipmentOutcome,
            Some(order_id),
            Some(shipment_type),
            &detail,
        )
    }

    /// Record one submission call and its result.
    pub fn submission_attempt(
        &self,
        shipment_type: &str,
        destination_id: &str,
        attempt: u32,
        success: bool,
    ) -> Result<(), JournalError> {
        let detail = serde_json::json!({
            "destination_id": destination_id,
            "attempt": attempt,
            "success": success,
        })
        .to_string();
        self.append(EntryKind::SubmissionAttempt, None, Some(shipment_type), &detail)
    }

    fn append(
        &self,
        kind: EntryKind,
        order_id: Option<&str>,
        shipment_type: Option<&str>,
        detail: &str,
    ) -> Result<(), JournalError> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        debug!(kind = kind.as_str(), ?order_id, ?shipment_type, "journal append");
        self.conn.execute(
            "INSERT INTO fulfillment_log (id, timestamp, kind, order_id, shipment_type, detail)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![id, now, kind.as_str(), order_id, shipment_type, detail],
        )?;
        Ok(())
    }

    /// All entries in insertion order.
    pub fn entries(&self) -> Result<Vec<JournalEntry>, JournalError> {
        let mut stmt = self.conn.prepare(
            "SELECT seq, id, timestamp, kind, order_id, shipment_type, detail
             FROM fulfillment_log ORDER BY seq ASC",
        )?;
        let rows = stmt.query_map([], row_to_entry)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(JournalError::Sqlite)
    }

    /// Entries for one shipment, in insertion order.
    pub fn entries_for_shipment(&self, shipment_type: &str) -> Result<Vec<JournalEntry>, JournalError> {
        let mut stmt = self.conn.prepare(
            "SELECT seq, id, timestamp, kind, order_id, shipment_type, detail
             FROM fulfillment_log WHERE shipment_type = ?1 ORDER BY seq ASC",
        )?;
        let rows = stmt.query_map(params![shipment_type], row_to_entry)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(JournalError::Sqlite)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Shared handle
// ─────────────────────────────────────────────────────────────────────────────

/// Cheaply cloneable, thread-safe handle over a [`FulfillmentJournal`].
///
/// The SQLite connection is `Send` but not `Sync`; the mutex makes one
/// journal usable from the control loop and the shipment tracker alike.
#[derive(Clone)]
pub struct SharedJournal(std::sync::Arc<std::sync::Mutex<FulfillmentJournal>>);

impl SharedJournal {
    pub fn new(journal: FulfillmentJournal) -> Self {
        Self(std::sync::Arc::new(std::sync::Mutex::new(journal)))
    }

    pub fn order_received(&self, order_id: &str, priority: u16) -> Result<(), JournalError> {
        self.lock().order_received(order_id, priority)
    }

    pub fn order_rejected(&self, reason: &str) -> Result<(), JournalError> {
        self.lock().order_rejected(reason)
    }

    pub fn shipment_outcome(
        &self,
        order_id: &str,
        shipment_type: &str,
        status: ShipmentStatus,
        missing: &[String],
    ) -> Result<(), JournalError> {
        self.lock()
            .shipment_outcome(order_id, shipment_type, status, missing)
    }

    pub fn submission_attempt(
        &self,
        shipment_type: &str,
        destination_id: &str,
        attempt: u32,
        success: bool,
    ) -> Result<(), JournalError> {
        self.lock()
            .submission_attempt(shipment_type, destination_id, attempt, success)
    }

    pub fn entries(&self) -> Result<Vec<JournalEntry>, JournalError> {
        self.lock().entries()
    }

    pub fn entries_for_shipment(
        &self,
        shipment_type: &str,
    ) -> Result<Vec<JournalEntry>, JournalError> {
        self.lock().entries_for_shipment(shipment_type)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FulfillmentJournal> {
        self.0
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<JournalEntry> {
    let seq: i64 = row.get(0)?;
    let id: String = row.get(1)?;
    let timestamp: String = row.get(2)?;
    let kind_str: String = row.get(3)?;
    let order_id: Option<String> = row.get(4)?;
    let shipment_type: Option<String> = row.get(5)?;
    let detail: String = row.get(6)?;
    let kind = EntryKind::from_str(&kind_str).ok_or_else(|| {
        rusqlite::Error::InvalidColumnType(3, kind_str, rusqlite::types::Type::Text)
    })?;
    Ok(JournalEntry {
        seq,
        id,
        timestamp,
        kind,
        order_id,
        shipment_type,
        detail,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
