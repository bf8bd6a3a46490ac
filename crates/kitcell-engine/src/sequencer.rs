//! [`DispatchSequencer`] – one pick-and-place directive per assignment.
//!
//! For a matched assignment the sequencer issues a single
//! pick-at-observed-pose / place-at-target-pose directive to the actuation
//! collaborator and blocks until that collaborator reports a terminal result,
//! bounded by the configured timeout.  An unmatched assignment maps straight
//! to [`DispatchOutcome::PartNotFound`] without any actuation call.
//!
//! # Side effect
//!
//! A part that was physically handled no longer sits where the sensors last
//! saw it: on `Delivered` it is on the destination tray, on a fault it has
//! been discarded by the arm.  Either way the sequencer tells the observation
//! store to suppress the consumed pose so a lingering stale detection cannot
//! be matched again.

use std::sync::Arc;
use std::time::Duration;

use kitcell_middleware::clients::{ActuationClient, PickPlaceDirective};
use kitcell_perception::SharedObservationStore;
use kitcell_types::{Assignment, DispatchOutcome};
use tracing::{debug, info, warn};

/// Walks assignments into actuation directives and maps their outcomes.
pub struct DispatchSequencer {
    actuation: Arc<dyn ActuationClient>,
    store: SharedObservationStore,
    actuation_timeout: Duration,
}

impl DispatchSequencer {
    pub fn new(
        actuation: Arc<dyn ActuationClient>,
        store: SharedObservationStore,
        actuation_timeout: Duration,
    ) -> Self {
        Self {
            actuation,
            store,
            actuation_timeout,
        }
    }

    /// Execute one assignment against `destination_id`.
    ///
    /// Blocks the control task until the actuation collaborator reports a
    /// terminal result or the timeout elapses; a timeout is treated as a
    /// [`DispatchOutcome::PartFaulty`]-class failure and escalated through
    /// the same retry policy.
    pub async fn dispatch(
        &self,
        assignment: &Assignment,
        destination_id: &str,
    ) -> DispatchOutcome {
        let Some(part) = &assignment.matched_part else {
            debug!(
                part_type = %assignment.requirement.part_type,
                "unmatched requirement; reporting part not found"
            );
            return DispatchOutcome::PartNotFound;
        };

        let directive = PickPlaceDirective {
            part_type: part.part_type.clone(),
            pick_pose: part.world_pose,
            place_pose: assignment.requirement.target_pose,
            destination_id: destination_id.to_string(),
        };

        let result =
            tokio::time::timeout(self.actuation_timeout, self.actuation.pick_and_place(&directive))
                .await;

        match result {
            Ok(Ok(())) => {
                info!(
                    part_type = %part.part_type,
                    sensor_id = %part.sensor_id,
                    destination_id,
                    "part delivered"
                );
                // The physical part has moved; its observed pose is stale.
                self.store.suppress(&part.part_type, part.world_pose);
                DispatchOutcome::Delivered
            }
            Ok(Err(err)) => {
                warn!(
                    part_type = %part.part_type,
                    error = %err,
                    "actuation fault; part treated as faulty"
                );
                // The arm discarded the faulty part; its pose is stale too,
                // which is what lets the next pass bind a different instance.
                self.store.suppress(&part.part_type, part.world_pose);
                DispatchOutcome::PartFaulty
            }
            Err(_) => {
                warn!(
                    part_type = %part.part_type,
                    timeout_ms = self.actuation_timeout.as_millis() as u64,
                    "actuation directive timed out; escalating as faulty"
                );
                self.store.suppress(&part.part_type, part.world_pose);
                DispatchOutcome::PartFaulty
            }
        }
    }
}
