//! `kitcell-journal` – Durable Fulfillment Audit Trail.
//!
//! Records what the workcell decided and when: orders received or rejected,
//! shipment terminal outcomes (including which requirements went unfilled),
//! and every submission attempt.  The journal is an audit log, never hot-path
//! state – the engine works entirely from in-memory structures and writes
//! here after the fact.
//!
//! # Modules
//!
//! - [`journal`] – [`FulfillmentJournal`][journal::FulfillmentJournal]:
//!   SQLite-backed append-only log with typed entry kinds.

pub mod journal;

pub use journal::{
    EntryKind, FulfillmentJournal, JournalEntry, JournalError, SharedJournal,
};
