//! `kitcell-engine` – The Matching & Dispatch Engine.
//!
//! The execution core of the workcell: reconciles required products against
//! live part observations and sequences pick-and-place dispatch with bounded
//! retry and exactly-once shipment submission.
//!
//! # Modules
//!
//! - [`matching`] – [`MatchingEngine`][matching::MatchingEngine]:
//!   the greedy, order-stable, first-fit reconciliation of a requirement list
//!   against a frozen observation snapshot.  Deterministic by construction:
//!   same inputs, same assignments.
//! - [`sequencer`] – [`DispatchSequencer`][sequencer::DispatchSequencer]:
//!   one bounded pick-and-place call per assignment, outcome mapping
//!   (delivered / not-found / faulty), and the stale-pose suppression side
//!   effect after a part leaves its observed pose.
//! - [`retry`] – [`RetryBudget`][retry::RetryBudget]:
//!   bounds how many re-matching passes one requirement may consume before it
//!   is escalated as a permanent miss.
//! - [`submission`] – [`SubmissionRouter`][submission::SubmissionRouter]:
//!   destination-id → submission-client lookup, replacing per-destination
//!   client duplication with a single polymorphic capability.
//! - [`tracker`] – [`ShipmentTracker`][tracker::ShipmentTracker]:
//!   per-shipment `Pending → InProgress → {Complete, PartiallyFulfilled}`
//!   state machine, exactly-once submission with a single permitted retry,
//!   and registry completion marking.
//! - [`fulfillment`] – [`FulfillmentLoop`][fulfillment::FulfillmentLoop]:
//!   the single control task driving order → shipment → requirement in total
//!   deterministic order, draining bus events only between dispatches.
//! - [`ingest`] – [`spawn_sensor_ingestor`][ingest::spawn_sensor_ingestor]:
//!   the independent task that applies bus detection events to the shared
//!   observation store without ever touching the control loop.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]:
//!   wires the global `tracing` subscriber (EnvFilter, compact or JSON).

pub mod fulfillment;
pub mod ingest;
pub mod matching;
pub mod retry;
pub mod sequencer;
pub mod submission;
pub mod telemetry;
pub mod tracker;

pub use fulfillment::{FulfillmentConfig, FulfillmentLoop, TickOutcome};
pub use ingest::spawn_sensor_ingestor;
pub use matching::MatchingEngine;
pub use retry::RetryBudget;
pub use sequencer::DispatchSequencer;
pub use submission::SubmissionRouter;
pub use telemetry::init_tracing;
pub use tracker::ShipmentTracker;
