//! [`FulfillmentLoop`] – the single control task of the workcell.
//!
//! Drives Order → Shipment → Requirement processing in the one total,
//! deterministic order the system guarantees: orders by priority then
//! arrival, shipments in declaration order (kitting before assembly),
//! requirements in declaration order.  Sensor ingestion runs on its own task
//! (see [`crate::ingest`]) and only ever replaces observation state; the loop
//! works from momentarily frozen snapshots, so a matching pass never races a
//! sensor callback.
//!
//! Bus events (order announcements, auxiliary alerts, halt signals) are
//! drained between dispatches only – an in-flight directive always runs to
//! completion, and a halt takes effect at the next requirement boundary.
//!
//! # Per-requirement retry
//!
//! Each requirement gets a [`RetryBudget`] of dispatch attempts.  A failed
//! attempt (no visible part, faulty pick, timeout) pauses for the configured
//! `retry_delay`, takes a fresh snapshot, re-reserves the parts still
//! promised to later requirements of the same shipment, and re-matches just
//! the outstanding requirement.  Exhaustion escalates the requirement as a
//! permanent miss and the shipment ends `PartiallyFulfilled`.

use std::sync::Arc;
use std::time::Duration;

use kitcell_journal::SharedJournal;
use kitcell_middleware::bus::{EventBus, Topic, TopicReceiver};
use kitcell_middleware::clients::ActuationClient;
use kitcell_orders::OrderRegistry;
use kitcell_perception::SharedObservationStore;
use kitcell_types::{
    Assignment, DispatchOutcome, Event, EventPayload, ObservedPart, Order, OrderStatus,
    Shipment, ShipmentStatus, ShipmentStatusEntry,
};
use tokio::sync::broadcast::error::TryRecvError;
use tracing::{error, info, warn};

use crate::matching::MatchingEngine;
use crate::retry::RetryBudget;
use crate::sequencer::DispatchSequencer;
use crate::submission::SubmissionRouter;
use crate::tracker::ShipmentTracker;

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Tunables for the fulfillment loop.  Retry count and timing are
/// configuration, never constants buried at call sites.
#[derive(Debug, Clone)]
pub struct FulfillmentConfig {
    /// Sensor scan priority for matching; earlier sensors win ties.
    pub sensor_priority: Vec<String>,
    /// Maximum dispatch attempts per requirement before it is reported
    /// missing.
    pub match_retry_limit: u32,
    /// Pause between re-matching passes, giving sensors time to publish a
    /// fresh view.
    pub retry_delay: Duration,
    /// Upper bound on one actuation directive; overrun is escalated as a
    /// faulty-part-class failure.
    pub actuation_timeout: Duration,
}

impl Default for FulfillmentConfig {
    fn default() -> Self {
        Self {
            sensor_priority: Vec::new(),
            match_retry_limit: 3,
            retry_delay: Duration::from_millis(250),
            actuation_timeout: Duration::from_secs(30),
        }
    }
}

/// What one [`FulfillmentLoop::tick`] accomplished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// No pending order; nothing to do.
    Idle,
    /// The named order was driven to terminal shipment states.
    OrderProcessed(String),
    /// A halt signal is in effect; no dispatching occurred.
    Halted(String),
}

// ─────────────────────────────────────────────────────────────────────────────
// FulfillmentLoop
// ─────────────────────────────────────────────────────────────────────────────

/// The orchestrator owning registry, matcher, sequencer, and tracker.
pub struct FulfillmentLoop {
    config: FulfillmentConfig,
    bus: EventBus,
    registry: OrderRegistry,
    store: SharedObservationStore,
    sequencer: DispatchSequencer,
    tracker: ShipmentTracker,
    journal: Option<SharedJournal>,
    orders_rx: TopicReceiver,
    alerts_rx: TopicReceiver,
    halted: Option<String>,
}

impl FulfillmentLoop {
    /// Wire up a loop.  The observation store is created here from the
    /// configured sensor priority; pass [`FulfillmentLoop::store`] to the
    /// sensor ingestor so detections land where matching reads.
    pub fn new(
        config: FulfillmentConfig,
        bus: EventBus,
        actuation: Arc<dyn ActuationClient>,
        router: SubmissionRouter,
    ) -> Self {
        let store = SharedObservationStore::new(config.sensor_priority.clone());
        let sequencer =
            DispatchSequencer::new(actuation, store.clone(), config.actuation_timeout);
        let tracker = ShipmentTracker::new(router);
        let orders_rx = bus.subscribe_to(Topic::Orders);
        let alerts_rx = bus.subscribe_to(Topic::Alerts);
        Self {
            config,
            bus,
            registry: OrderRegistry::new(),
            store,
            sequencer,
            tracker,
            journal: None,
            orders_rx,
            alerts_rx,
            halted: None,
        }
    }

    /// Attach a journal for order intake and shipment outcome records.
    pub fn with_journal(mut self, journal: SharedJournal) -> Self {
        self.tracker.attach_journal(journal.clone());
        self.journal = Some(journal);
        self
    }

    /// A handle to the observation store this loop matches against.  Clone
    /// it into the sensor ingestor and anything else that writes detections.
    pub fn store(&self) -> SharedObservationStore {
        self.store.clone()
    }

    // -------------------------------------------------------------------------
    // External surface
    // -------------------------------------------------------------------------

    /// Accept a raw order document directly (the bus `Orders` lane feeds the
    /// same path).  A malformed document rejects only that order.
    pub fn accept_order(&mut self, raw: &str) {
        match self.registry.receive(raw) {
            Ok(order) => {
                let order_id = order.order_id.clone();
                let priority = order.priority;
                if let Some(journal) = &self.journal
                    && let Err(e) = journal.order_received(&order_id, priority)
                {
                    warn!(error = %e, "failed to journal order intake");
                }
            }
            Err(err) => {
                warn!(error = %err, "rejecting malformed order");
                if let Some(journal) = &self.journal
                    && let Err(e) = journal.order_rejected(&err.to_string())
                {
                    warn!(error = %e, "failed to journal order rejection");
                }
            }
        }
    }

    /// Read-only completion status of every known order – the status signal.
    pub fn status(&self) -> Vec<OrderStatus> {
        self.registry
            .orders()
            .map(|order| OrderStatus {
                order_id: order.order_id.clone(),
                shipments: order
                    .shipments()
                    .iter()
                    .map(|s| ShipmentStatusEntry {
                        shipment_type: s.shipment_type().to_string(),
                        status: self
                            .tracker
                            .status_of(&order.order_id, s.shipment_type())
                            .unwrap_or(ShipmentStatus::Pending),
                    })
                    .collect(),
            })
            .collect()
    }

    /// The reason the loop is parked, if a halt signal has been consumed.
    pub fn halt_reason(&self) -> Option<&str> {
        self.halted.as_deref()
    }

    // -------------------------------------------------------------------------
    // Control cycle
    // -------------------------------------------------------------------------

    /// Drain pending bus events, then fully process the next pending order.
    pub async fn tick(&mut self) -> TickOutcome {
        self.drain_events();
        if let Some(reason) = &self.halted {
            return TickOutcome::Halted(reason.clone());
        }
        let Some(order) = self.registry.next_pending().cloned() else {
            return TickOutcome::Idle;
        };
        info!(order_id = %order.order_id, priority = order.priority, "processing order");
        self.process_order(&order).await;
        TickOutcome::OrderProcessed(order.order_id)
    }

    /// Tick until there is no pending order left (or a halt arrives).
    pub async fn run_until_idle(&mut self) {
        loop {
            match self.tick().await {
                TickOutcome::OrderProcessed(_) => continue,
                TickOutcome::Idle => break,
                TickOutcome::Halted(reason) => {
                    info!(reason = %reason, "fulfillment loop parked by halt signal");
                    break;
                }
            }
        }
    }

    async fn process_order(&mut self, order: &Order) {
        for shipment in order.shipments() {
            self.drain_events();
            if self.halted.is_some() {
                warn!(order_id = %order.order_id, "halted between shipments");
                return;
            }
            self.process_shipment(&order.order_id, &shipment).await;
        }
    }

    async fn process_shipment(&mut self, order_id: &str, shipment: &Shipment) {
        let shipment_type = shipment.shipment_type();
        info!(
            order_id,
            shipment_type,
            destination_id = shipment.destination_id(),
            requirements = shipment.products().len(),
            "processing shipment"
        );
        self.tracker.begin_shipment(order_id, shipment);

        // One matching pass over the whole shipment produces the dispatch
        // plan; every requirement is represented, matched or not.
        let mut snapshot = self.store.snapshot();
        let assignments =
            MatchingEngine::match_requirements(shipment.products(), &mut snapshot);

        for index in 0..assignments.len() {
            self.drain_events();
            if self.halted.is_some() {
                warn!(
                    order_id,
                    shipment_type, "halted mid-shipment; remaining requirements deferred"
                );
                return;
            }
            // Parts already promised to requirements after this one must not
            // be stolen by a retry pass.
            let reserved: Vec<ObservedPart> = assignments[index + 1..]
                .iter()
                .filter_map(|a| a.matched_part.clone())
                .collect();
            let outcome = self
                .fulfil_requirement(shipment, assignments[index].clone(), &reserved)
                .await;
            self.tracker
                .record_outcome(order_id, shipment_type, index, outcome);
        }

        match self
            .tracker
            .finalize(&mut self.registry, order_id, shipment)
            .await
        {
            Ok(status) => self.publish_status(order_id, shipment_type, status),
            Err(err) => {
                // Terminal submission failure: the shipment itself is
                // complete, but the handoff needs external intervention.
                error!(order_id, shipment_type, error = %err, "terminal submission failure");
                if let Some(status) = self.tracker.status_of(order_id, shipment_type) {
                    self.publish_status(order_id, shipment_type, status);
                }
            }
        }
    }

    /// Dispatch one requirement, re-matching against fresh snapshots until
    /// it is delivered or the retry budget runs out.
    async fn fulfil_requirement(
        &self,
        shipment: &Shipment,
        mut assignment: Assignment,
        reserved: &[ObservedPart],
    ) -> DispatchOutcome {
        let mut budget = RetryBudget::new(self.config.match_retry_limit);
        loop {
            let outcome = self
                .sequencer
                .dispatch(&assignment, shipment.destination_id())
                .await;
            if outcome == DispatchOutcome::Delivered {
                return outcome;
            }
            if budget.record_attempt() {
                warn!(
                    part_type = %assignment.requirement.part_type,
                    attempts = budget.attempts(),
                    final_outcome = ?outcome,
                    "retry budget exhausted; escalating requirement"
                );
                return outcome;
            }
            // Give the sensors a chance to publish fresh views, then re-match
            // just this requirement.  Delivered and faulty parts are already
            // pose-suppressed, so only genuinely available instances bind.
            tokio::time::sleep(self.config.retry_delay).await;
            let mut snapshot = self.store.snapshot();
            for part in reserved {
                snapshot.claim_at(&part.part_type, &part.world_pose);
            }
            let rebound = MatchingEngine::match_requirements(
                std::slice::from_ref(&assignment.requirement),
                &mut snapshot,
            );
            if let Some(fresh) = rebound.into_iter().next() {
                assignment = fresh;
            }
        }
    }

    // -------------------------------------------------------------------------
    // Bus handling
    // -------------------------------------------------------------------------

    /// Non-blocking drain of order announcements and alert-lane signals.
    /// Called only between dispatches, never mid-directive.
    fn drain_events(&mut self) {
        loop {
            match self.orders_rx.try_recv() {
                Ok(event) => {
                    if let EventPayload::OrderAnnounced { raw } = event.payload {
                        self.accept_order(&raw);
                    }
                }
                Err(TryRecvError::Lagged(n)) => {
                    warn!(dropped = n, "order lane lagged");
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
        loop {
            match self.alerts_rx.try_recv() {
                Ok(event) => match event.payload {
                    EventPayload::SensorAlert { sensor_id, kind } => {
                        info!(sensor_id = %sensor_id, kind = ?kind, "auxiliary sensor alert");
                    }
                    EventPayload::Halt { reason } => {
                        warn!(reason = %reason, "halt signal received");
                        self.halted = Some(reason);
                    }
                    _ => {}
                },
                Err(TryRecvError::Lagged(n)) => {
                    warn!(dropped = n, "alert lane lagged");
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
    }

    fn publish_status(&self, order_id: &str, shipment_type: &str, status: ShipmentStatus) {
        // Best-effort: a missing telemetry consumer is not an error.
        let _ = self.bus.publish_to(
            Topic::Status,
            Event::now(
                "kitcell-engine::fulfillment",
                EventPayload::ShipmentStatusChanged {
                    order_id: order_id.to_string(),
                    shipment_type: shipment_type.to_string(),
                    status,
                },
            ),
        );
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
