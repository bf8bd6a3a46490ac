//! `kitcell-perception` – Live Part Observation layer.
//!
//! Turns per-sensor detection streams into the consistent, momentarily frozen
//! views the matching engine needs.
//!
//! # Modules
//!
//! - [`store`] – [`PartObservationStore`][store::PartObservationStore]:
//!   replace-latest detection state per sensor, stale-pose suppression after a
//!   pick, and the [`SharedObservationStore`][store::SharedObservationStore]
//!   handle that sensor-ingest tasks write through.
//! - [`snapshot`] – [`Snapshot`][snapshot::Snapshot]: an owned, atomically
//!   taken copy of every sensor's current view, with per-pass consumption
//!   marks so one matching pass can never double-book a part.

pub mod snapshot;
pub mod store;

pub use snapshot::Snapshot;
pub use store::{PartObservationStore, SharedObservationStore};
