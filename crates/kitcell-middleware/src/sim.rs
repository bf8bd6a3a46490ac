//! In-process simulation collaborators.
//!
//! Used by the test suites and the demo binary: a programmable actuation
//! client, a programmable submission client (both recording every call), and
//! a scripted sensor feed that publishes detection sets onto the bus the way
//! a real sensor driver would.

use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use kitcell_types::{
    AlertKind, Event, EventPayload, ObservedPart, POSE_EPSILON, Pose, WorkcellError,
};
use tracing::info;

use crate::bus::{EventBus, Topic};
use crate::clients::{ActuationClient, PickPlaceDirective, SubmissionClient};

// ─────────────────────────────────────────────────────────────────────────────
// Simulated actuation
// ─────────────────────────────────────────────────────────────────────────────

/// Actuation simulator.  Succeeds by default; individual part types or pick
/// poses can be programmed to fault, and types can be programmed to hang so
/// callers can exercise their timeout handling.
#[derive(Default)]
pub struct SimActuationClient {
    fault_types: HashSet<String>,
    fault_poses: Vec<Pose>,
    hang_types: HashSet<String>,
    latency: Option<Duration>,
    directives: Mutex<Vec<PickPlaceDirective>>,
}

impl SimActuationClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every directive for `part_type` reports an actuation fault.
    pub fn fault_on_type(mut self, part_type: &str) -> Self {
        self.fault_types.insert(part_type.to_string());
        self
    }

    /// Directives picking within [`POSE_EPSILON`] of `pose` report a fault –
    /// models one specific defective part instance.
    pub fn fault_at_pose(mut self, pose: Pose) -> Self {
        self.fault_poses.push(pose);
        self
    }

    /// Directives for `part_type` never complete (callers must time out).
    pub fn hang_on_type(mut self, part_type: &str) -> Self {
        self.hang_types.insert(part_type.to_string());
        self
    }

    /// Add a fixed completion latency to every directive.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Every directive received so far, in call order.
    pub fn directives(&self) -> Vec<PickPlaceDirective> {
        self.directives
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl ActuationClient for SimActuationClient {
    async fn pick_and_place(&self, directive: &PickPlaceDirective) -> Result<(), WorkcellError> {
        self.directives
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(directive.clone());

        if self.hang_types.contains(&directive.part_type) {
            // Park forever; the engine's timeout is the only way out.
            std::future::pending::<()>().await;
        }
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if self.fault_types.contains(&directive.part_type)
            || self
                .fault_poses
                .iter()
                .any(|p| p.position_close_to(&directive.pick_pose, POSE_EPSILON))
        {
            return Err(WorkcellError::ActuationFault {
                component: "sim_arm".to_string(),
                details: format!("simulated fault picking {}", directive.part_type),
            });
        }
        info!(
            part_type = %directive.part_type,
            destination = %directive.destination_id,
            "sim arm placed part"
        );
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Simulated submission
// ─────────────────────────────────────────────────────────────────────────────

/// Submission simulator recording every call; the first `fail_first` calls
/// report [`WorkcellError::SubmissionFailure`].
#[derive(Default)]
pub struct SimSubmissionClient {
    fail_first: Mutex<u32>,
    submissions: Mutex<Vec<(String, String)>>,
}

impl SimSubmissionClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the first `n` submission calls fail.
    pub fn failing_first(n: u32) -> Self {
        Self {
            fail_first: Mutex::new(n),
            submissions: Mutex::new(Vec::new()),
        }
    }

    /// `(shipment_type, destination_id)` pairs in call order, including
    /// failed calls.
    pub fn submissions(&self) -> Vec<(String, String)> {
        self.submissions
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl SubmissionClient for SimSubmissionClient {
    async fn submit(
        &self,
        shipment_type: &str,
        destination_id: &str,
    ) -> Result<(), WorkcellError> {
        self.submissions
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push((shipment_type.to_string(), destination_id.to_string()));

        let mut remaining = self
            .fail_first
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if *remaining > 0 {
            *remaining -= 1;
            return Err(WorkcellError::SubmissionFailure {
                shipment_type: shipment_type.to_string(),
                details: "simulated transport failure".to_string(),
            });
        }
        info!(shipment_type, destination_id, "sim shipment submitted");
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Scripted sensor feed
// ─────────────────────────────────────────────────────────────────────────────

/// Publishes detection sets and alerts onto the bus the way a sensor driver
/// would: independently, at its own rate, never touching engine state.
#[derive(Clone)]
pub struct SimSensorFeed {
    bus: EventBus,
    sensor_id: String,
}

impl SimSensorFeed {
    pub fn new(bus: EventBus, sensor_id: impl Into<String>) -> Self {
        Self {
            bus,
            sensor_id: sensor_id.into(),
        }
    }

    /// Publish one complete detection set for this sensor.
    pub fn publish(&self, parts: Vec<ObservedPart>) -> Result<usize, WorkcellError> {
        self.bus.publish_to(
            Topic::Detections,
            Event::now(
                format!("kitcell-middleware::sim_sensor/{}", self.sensor_id),
                EventPayload::PartDetections {
                    sensor_id: self.sensor_id.clone(),
                    parts,
                },
            ),
        )
    }

    /// Publish an auxiliary sensor alert.
    pub fn publish_alert(&self, kind: AlertKind) -> Result<usize, WorkcellError> {
        self.bus.publish_to(
            Topic::Alerts,
            Event::now(
                format!("kitcell-middleware::sim_sensor/{}", self.sensor_id),
                EventPayload::SensorAlert {
                    sensor_id: self.sensor_id.clone(),
                    kind,
                },
            ),
        )
    }

    /// Republish the same detection set at a fixed period until the returned
    /// task is aborted – a stand-in for a free-running camera.
    pub fn spawn_periodic(
        &self,
        parts: Vec<ObservedPart>,
        period: Duration,
    ) -> tokio::task::JoinHandle<()> {
        let feed = self.clone();
        tokio::spawn(async move {
            loop {
                // Best-effort: a missing consumer is not a sensor fault.
                let _ = feed.publish(parts.clone());
                tokio::time::sleep(period).await;
            }
        })
    }
}
