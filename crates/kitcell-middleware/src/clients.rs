//! The collaborator seams.
//!
//! The engine never speaks to a robot arm or a transport network directly.
//! It issues directives through these traits; implementations translate them
//! into the protocol of the outside world (a motion stack, a fleet service,
//! or the in-process simulators in [`sim`][crate::sim]).

use async_trait::async_trait;
use kitcell_types::{Pose, WorkcellError};

/// One pick-and-place command: fetch a part of `part_type` from `pick_pose`
/// and place it at `place_pose` on `destination_id`'s tray.
#[derive(Debug, Clone, PartialEq)]
pub struct PickPlaceDirective {
    pub part_type: String,
    /// Where the part currently sits, in the world frame.
    pub pick_pose: Pose,
    /// Target pose in the destination tray frame.
    pub place_pose: Pose,
    /// AGV (kitting) or station (assembly) receiving the part.
    pub destination_id: String,
}

/// The actuation collaborator: executes one directive and blocks until it
/// reports a terminal result.
///
/// # Contract
///
/// * `pick_and_place` returns `Ok(())` only after the part is confirmed
///   placed.  Failures map to [`WorkcellError::ActuationFault`].
/// * The engine bounds each call with its own timeout; implementations do not
///   need to enforce one, but should abandon work when the future is dropped.
#[async_trait]
pub trait ActuationClient: Send + Sync {
    async fn pick_and_place(&self, directive: &PickPlaceDirective) -> Result<(), WorkcellError>;
}

/// The submission collaborator: hands a completed shipment to the transport
/// layer (AGV routing or station submission).
///
/// Implementations must tolerate being keyed by shipment identity – the
/// engine guarantees at most one success-path call per shipment plus a single
/// permitted retry after a reported failure.
#[async_trait]
pub trait SubmissionClient: Send + Sync {
    async fn submit(
        &self,
        shipment_type: &str,
        destination_id: &str,
    ) -> Result<(), WorkcellError>;
}
