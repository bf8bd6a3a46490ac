//! [`ShipmentTracker`] – per-shipment lifecycle state machine.
//!
//! Aggregates per-requirement dispatch outcomes into shipment status:
//!
//! ```text
//! Pending ──first dispatch──▶ InProgress ──all delivered──▶ Complete
//!                                 │
//!                                 └──retry budget exhausted──▶ PartiallyFulfilled
//! ```
//!
//! Both right-hand states are terminal and always reported upward.  On
//! `Complete` the tracker invokes the submission collaborator exactly once
//! (guarded by a submitted flag); a failed submission earns one retry, after
//! which the failure is surfaced as a terminal shipment error – logged,
//! journaled, and returned to the caller, never silently dropped.
//!
//! Registry completion flags are written here and nowhere else.

use kitcell_journal::SharedJournal;
use kitcell_orders::OrderRegistry;
use kitcell_types::{
    DispatchOutcome, Shipment, ShipmentStatus, ShipmentStatusEntry, WorkcellError,
};
use tracing::{error, info, warn};

use crate::submission::SubmissionRouter;

/// Bookkeeping for one shipment being fulfilled.
#[derive(Debug)]
struct ShipmentRecord {
    order_id: String,
    shipment_type: String,
    requirement_types: Vec<String>,
    /// One slot per requirement, `None` until its dispatch reaches a
    /// terminal outcome.
    outcomes: Vec<Option<DispatchOutcome>>,
    status: ShipmentStatus,
    submission_attempted: bool,
}

impl ShipmentRecord {
    /// Part types of requirements that never reached `Delivered`.
    fn missing(&self) -> Vec<String> {
        self.requirement_types
            .iter()
            .zip(&self.outcomes)
            .filter(|(_, outcome)| **outcome != Some(DispatchOutcome::Delivered))
            .map(|(part_type, _)| part_type.clone())
            .collect()
    }
}

/// Tracks every shipment the loop has touched and owns submission.
pub struct ShipmentTracker {
    router: SubmissionRouter,
    journal: Option<SharedJournal>,
    records: Vec<ShipmentRecord>,
}

impl ShipmentTracker {
    pub fn new(router: SubmissionRouter) -> Self {
        Self {
            router,
            journal: None,
            records: Vec::new(),
        }
    }

    /// Attach a journal; terminal outcomes and submission attempts are
    /// recorded there.
    pub fn with_journal(mut self, journal: SharedJournal) -> Self {
        self.attach_journal(journal);
        self
    }

    /// Non-consuming variant of [`ShipmentTracker::with_journal`].
    pub fn attach_journal(&mut self, journal: SharedJournal) {
        self.journal = Some(journal);
    }

    /// Register a shipment about to be processed.  Idempotent: re-beginning
    /// an already known shipment keeps its existing bookkeeping.
    pub fn begin_shipment(&mut self, order_id: &str, shipment: &Shipment) {
        if self.find(order_id, shipment.shipment_type()).is_some() {
            return;
        }
        let requirement_types: Vec<String> = shipment
            .products()
            .iter()
            .map(|p| p.part_type.clone())
            .collect();
        let slots = requirement_types.len();
        self.records.push(ShipmentRecord {
            order_id: order_id.to_string(),
            shipment_type: shipment.shipment_type().to_string(),
            requirement_types,
            outcomes: vec![None; slots],
            status: ShipmentStatus::Pending,
            submission_attempted: false,
        });
    }

    /// Record the terminal outcome of requirement `index`.  The first
    /// recorded outcome moves the shipment `Pending → InProgress`.
    pub fn record_outcome(
        &mut self,
        order_id: &str,
        shipment_type: &str,
        index: usize,
        outcome: DispatchOutcome,
    ) {
        let Some(record) = self.find_mut(order_id, shipment_type) else {
            warn!(order_id, shipment_type, "outcome for unknown shipment; ignoring");
            return;
        };
        if index >= record.outcomes.len() {
            warn!(order_id, shipment_type, index, "outcome index out of range; ignoring");
            return;
        }
        if record.status == ShipmentStatus::Pending {
            record.status = ShipmentStatus::InProgress;
        }
        record.outcomes[index] = Some(outcome);
    }

    /// Close out a shipment: derive its terminal status, mark the registry,
    /// and – on `Complete` – submit it exactly once.
    ///
    /// # Errors
    ///
    /// Returns [`WorkcellError::SubmissionFailure`] (or
    /// [`WorkcellError::UnknownDestination`]) only when submission failed
    /// terminally after the single permitted retry.  The shipment status
    /// itself is already terminal at that point; the error exists so the
    /// caller can surface the condition for external intervention.
    pub async fn finalize(
        &mut self,
        registry: &mut OrderRegistry,
        order_id: &str,
        shipment: &Shipment,
    ) -> Result<ShipmentStatus, WorkcellError> {
        let shipment_type = shipment.shipment_type();
        if self.find(order_id, shipment_type).is_none() {
            warn!(order_id, shipment_type, "finalize for unknown shipment; registering it");
            self.begin_shipment(order_id, shipment);
        }
        // Registered just above when absent.
        let Some(record) = self.find_mut(order_id, shipment_type) else {
            return Ok(ShipmentStatus::Pending);
        };

        let all_delivered = !record.outcomes.is_empty()
            && record
                .outcomes
                .iter()
                .all(|o| *o == Some(DispatchOutcome::Delivered));
        let vacuous = record.outcomes.is_empty();
        record.status = if all_delivered || vacuous {
            ShipmentStatus::Complete
        } else {
            ShipmentStatus::PartiallyFulfilled
        };
        let status = record.status;
        let missing = record.missing();

        if let Some(journal) = &self.journal
            && let Err(e) = journal.shipment_outcome(order_id, shipment_type, status, &missing)
        {
            warn!(error = %e, "failed to journal shipment outcome");
        }

        // The tracker is the only writer of registry completion flags.
        registry.mark_shipment_complete(order_id, shipment_type);

        match status {
            ShipmentStatus::Complete => {
                info!(order_id, shipment_type, "shipment complete");
                self.submit_once(order_id, shipment).await?;
                Ok(ShipmentStatus::Complete)
            }
            ShipmentStatus::PartiallyFulfilled => {
                warn!(
                    order_id,
                    shipment_type,
                    missing = ?missing,
                    "shipment partially fulfilled; requirements went undelivered"
                );
                Ok(ShipmentStatus::PartiallyFulfilled)
            }
            // finalize always assigns a terminal status above.
            other => Ok(other),
        }
    }

    /// Current status of one shipment, if the tracker has seen it.
    pub fn status_of(&self, order_id: &str, shipment_type: &str) -> Option<ShipmentStatus> {
        self.find(order_id, shipment_type).map(|r| r.status)
    }

    /// Status entries for every tracked shipment of `order_id`, in the order
    /// they were begun.
    pub fn shipment_statuses(&self, order_id: &str) -> Vec<ShipmentStatusEntry> {
        self.records
            .iter()
            .filter(|r| r.order_id == order_id)
            .map(|r| ShipmentStatusEntry {
                shipment_type: r.shipment_type.clone(),
                status: r.status,
            })
            .collect()
    }

    /// Invoke the submission collaborator, at most once per shipment plus a
    /// single retry after a reported failure.
    async fn submit_once(
        &mut self,
        order_id: &str,
        shipment: &Shipment,
    ) -> Result<(), WorkcellError> {
        let shipment_type = shipment.shipment_type();
        let destination_id = shipment.destination_id();

        let Some(record) = self.find_mut(order_id, shipment_type) else {
            return Ok(());
        };
        if record.submission_attempted {
            return Ok(());
        }
        record.submission_attempted = true;

        let mut last_err = None;
        for attempt in 1..=2u32 {
            let result = self.router.submit(shipment_type, destination_id).await;
            let success = result.is_ok();
            if let Some(journal) = &self.journal
                && let Err(e) =
                    journal.submission_attempt(shipment_type, destination_id, attempt, success)
            {
                warn!(error = %e, "failed to journal submission attempt");
            }
            match result {
                Ok(()) => {
                    info!(shipment_type, destination_id, attempt, "shipment submitted");
                    return Ok(());
                }
                Err(err) => {
                    if attempt == 1 {
                        warn!(shipment_type, error = %err, "submission failed; one retry permitted");
                    } else {
                        error!(
                            shipment_type,
                            error = %err,
                            "submission failed after retry; external intervention required"
                        );
                    }
                    last_err = Some(err);
                }
            }
        }
        // Both attempts failed.
        Err(last_err.unwrap_or_else(|| WorkcellError::SubmissionFailure {
            shipment_type: shipment_type.to_string(),
            details: "submission failed".to_string(),
        }))
    }

    fn find(&self, order_id: &str, shipment_type: &str) -> Option<&ShipmentRecord> {
        self.records
            .iter()
            .find(|r| r.order_id == order_id && r.shipment_type == shipment_type)
    }

    fn find_mut(&mut self, order_id: &str, shipment_type: &str) -> Option<&mut ShipmentRecord> {
        self.records
            .iter_mut()
            .find(|r| r.order_id == order_id && r.shipment_type == shipment_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kitcell_journal::{EntryKind, FulfillmentJournal};
    use kitcell_middleware::sim::SimSubmissionClient;
    use kitcell_types::{KittingShipment, Pose, Product};
    use std::sync::Arc;

    fn gear_shipment() -> Shipment {
        Shipment::Kitting(KittingShipment {
            shipment_type: "k0".to_string(),
            agv_id: "agv1".to_string(),
            station_id: "as1".to_string(),
            products: vec![
                Product {
                    part_type: "gear".to_string(),
                    target_pose: Pose::at(0.1, 0.0, 0.0),
                },
                Product {
                    part_type: "bolt".to_string(),
                    target_pose: Pose::at(0.2, 0.0, 0.0),
                },
            ],
        })
    }

    fn registry_with_order() -> OrderRegistry {
        let mut registry = OrderRegistry::new();
        registry
            .receive(
                r#"{
                    "order_id": "order_0",
                    "kitting_shipments": [
                        { "shipment_type": "k0", "agv_id": "agv1", "station_id": "as1",
                          "products": [] }
                    ]
                }"#,
            )
            .unwrap();
        registry
    }

    fn tracker_with(client: Arc<SimSubmissionClient>) -> ShipmentTracker {
        ShipmentTracker::new(SubmissionRouter::new().register("agv1", client))
    }

    #[tokio::test]
    async fn first_outcome_moves_pending_to_in_progress() {
        let mut tracker = tracker_with(Arc::new(SimSubmissionClient::new()));
        let shipment = gear_shipment();
        tracker.begin_shipment("order_0", &shipment);
        assert_eq!(
            tracker.status_of("order_0", "k0"),
            Some(ShipmentStatus::Pending)
        );

        tracker.record_outcome("order_0", "k0", 0, DispatchOutcome::Delivered);
        assert_eq!(
            tracker.status_of("order_0", "k0"),
            Some(ShipmentStatus::InProgress)
        );
    }

    #[tokio::test]
    async fn all_delivered_completes_and_submits_exactly_once() {
        let client = Arc::new(SimSubmissionClient::new());
        let mut tracker = tracker_with(client.clone());
        let mut registry = registry_with_order();
        let shipment = gear_shipment();

        tracker.begin_shipment("order_0", &shipment);
        tracker.record_outcome("order_0", "k0", 0, DispatchOutcome::Delivered);
        tracker.record_outcome("order_0", "k0", 1, DispatchOutcome::Delivered);

        let status = tracker
            .finalize(&mut registry, "order_0", &shipment)
            .await
            .unwrap();
        assert_eq!(status, ShipmentStatus::Complete);
        assert_eq!(client.submissions().len(), 1);
        assert!(registry.is_order_complete("order_0"));

        // A second finalize must not submit again.
        tracker
            .finalize(&mut registry, "order_0", &shipment)
            .await
            .unwrap();
        assert_eq!(client.submissions().len(), 1);
    }

    #[tokio::test]
    async fn undelivered_requirement_partially_fulfills_without_submission() {
        let client = Arc::new(SimSubmissionClient::new());
        let mut tracker = tracker_with(client.clone());
        let mut registry = registry_with_order();
        let shipment = gear_shipment();

        tracker.begin_shipment("order_0", &shipment);
        tracker.record_outcome("order_0", "k0", 0, DispatchOutcome::Delivered);
        tracker.record_outcome("order_0", "k0", 1, DispatchOutcome::PartNotFound);

        let status = tracker
            .finalize(&mut registry, "order_0", &shipment)
            .await
            .unwrap();
        assert_eq!(status, ShipmentStatus::PartiallyFulfilled);
        assert!(client.submissions().is_empty());
        // Terminal either way: the registry no longer serves this shipment.
        assert!(registry.is_order_complete("order_0"));
    }

    #[tokio::test]
    async fn faulty_outcome_counts_as_undelivered() {
        let client = Arc::new(SimSubmissionClient::new());
        let mut tracker = tracker_with(client.clone());
        let mut registry = registry_with_order();
        let shipment = gear_shipment();

        tracker.begin_shipment("order_0", &shipment);
        tracker.record_outcome("order_0", "k0", 0, DispatchOutcome::PartFaulty);
        tracker.record_outcome("order_0", "k0", 1, DispatchOutcome::Delivered);

        let status = tracker
            .finalize(&mut registry, "order_0", &shipment)
            .await
            .unwrap();
        assert_eq!(status, ShipmentStatus::PartiallyFulfilled);
    }

    #[tokio::test]
    async fn submission_failure_gets_exactly_one_retry() {
        let client = Arc::new(SimSubmissionClient::failing_first(1));
        let mut tracker = tracker_with(client.clone());
        let mut registry = registry_with_order();
        let shipment = gear_shipment();

        tracker.begin_shipment("order_0", &shipment);
        tracker.record_outcome("order_0", "k0", 0, DispatchOutcome::Delivered);
        tracker.record_outcome("order_0", "k0", 1, DispatchOutcome::Delivered);

        let status = tracker
            .finalize(&mut registry, "order_0", &shipment)
            .await
            .unwrap();
        assert_eq!(status, ShipmentStatus::Complete);
        // First call failed, the single retry succeeded: two calls total.
        assert_eq!(client.submissions().len(), 2);
    }

    #[tokio::test]
    async fn terminal_submission_failure_is_surfaced_not_swallowed() {
        let client = Arc::new(SimSubmissionClient::failing_first(5));
        let mut tracker = tracker_with(client.clone());
        let mut registry = registry_with_order();
        let shipment = gear_shipment();

        tracker.begin_shipment("order_0", &shipment);
        tracker.record_outcome("order_0", "k0", 0, DispatchOutcome::Delivered);
        tracker.record_outcome("order_0", "k0", 1, DispatchOutcome::Delivered);

        let err = tracker
            .finalize(&mut registry, "order_0", &shipment)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkcellError::SubmissionFailure { .. }));
        // Exactly two attempts, never more – even on later finalize calls.
        assert_eq!(client.submissions().len(), 2);
        tracker
            .finalize(&mut registry, "order_0", &shipment)
            .await
            .unwrap();
        assert_eq!(client.submissions().len(), 2);
    }

    #[tokio::test]
    async fn journal_records_outcome_and_attempts() {
        let journal = SharedJournal::new(FulfillmentJournal::open_in_memory().unwrap());
        let client = Arc::new(SimSubmissionClient::new());
        let mut tracker = tracker_with(client).with_journal(journal.clone());
        let mut registry = registry_with_order();
        let shipment = gear_shipment();

        tracker.begin_shipment("order_0", &shipment);
        tracker.record_outcome("order_0", "k0", 0, DispatchOutcome::Delivered);
        tracker.record_outcome("order_0", "k0", 1, DispatchOutcome::PartNotFound);
        tracker
            .finalize(&mut registry, "order_0", &shipment)
            .await
            .unwrap();

        let entries = journal.entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind, EntryKind::ShipmentOutcome);
        assert!(entries[0].detail.contains("bolt"));
    }

    #[tokio::test]
    async fn status_report_lists_shipments_in_begin_order() {
        let mut tracker = tracker_with(Arc::new(SimSubmissionClient::new()));
        let shipment = gear_shipment();
        tracker.begin_shipment("order_0", &shipment);
        let statuses = tracker.shipment_statuses("order_0");
        assert_eq!(statuses.len(), 1);
        assert_eq!(statuses[0].shipment_type, "k0");
        assert_eq!(statuses[0].status, ShipmentStatus::Pending);
        assert!(tracker.shipment_statuses("ghost").is_empty());
    }
}
