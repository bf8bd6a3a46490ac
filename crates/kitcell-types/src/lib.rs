use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Positional tolerance (metres) used when comparing observed part poses,
/// e.g. for stale-pose suppression after a pick.
pub const POSE_EPSILON: f64 = 1e-3;

/// A point in the workcell world frame (metres).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Euclidean distance to `other`.
    pub fn distance(&self, other: &Point3) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// Unit quaternion orientation (x, y, z, w).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

impl Default for Quaternion {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            w: 1.0,
        }
    }
}

/// A 6-DOF pose: position plus orientation in the world frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: Point3,
    pub orientation: Quaternion,
}

impl Pose {
    /// Convenience constructor with identity orientation.
    pub fn at(x: f64, y: f64, z: f64) -> Self {
        Self {
            position: Point3::new(x, y, z),
            orientation: Quaternion::default(),
        }
    }

    /// `true` when the positions of `self` and `other` are within `epsilon`
    /// metres of each other. Orientation is deliberately not compared: a part
    /// re-detected at the same bin slot may report a slightly different yaw.
    pub fn position_close_to(&self, other: &Pose, epsilon: f64) -> bool {
        self.position.distance(&other.position) <= epsilon
    }
}

/// One product an order demands: a part type plus the pose it must be placed
/// at on the destination tray. Requirements are positionally distinct – two
/// `Product`s of the same type in one shipment are two separate requirements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    /// Catalogue part type, e.g. `"assembly_pump_red"` or `"gear"`.
    pub part_type: String,
    /// Target placement pose in the destination tray frame.
    pub target_pose: Pose,
}

/// A part instance currently visible to one sensor.
///
/// Identity is only stable for the lifetime of one snapshot: the same
/// physical part may reappear under a different `frame` label after the next
/// detection cycle, and its handle must not be carried across snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservedPart {
    pub part_type: String,
    /// Pose of the detection in the world frame.
    pub world_pose: Pose,
    /// Sensor that produced the detection, e.g. `"camera_bins0"`.
    pub sensor_id: String,
    /// Per-detection frame label assigned by the sensor driver.
    pub frame: String,
}

/// A kitting shipment: products placed on an AGV tray, which is then routed
/// to an assembly station.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KittingShipment {
    pub shipment_type: String,
    /// AGV that carries the tray – the pick-and-place destination.
    pub agv_id: String,
    /// Station the loaded AGV is ultimately routed to.
    pub station_id: String,
    pub products: Vec<Product>,
}

/// An assembly shipment: products installed directly at a station.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssemblyShipment {
    pub shipment_type: String,
    pub station_id: String,
    pub products: Vec<Product>,
}

/// Either kind of shipment, tagged. The engine processes both through the
/// same accessors; only the destination semantics differ.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Shipment {
    Kitting(KittingShipment),
    Assembly(AssemblyShipment),
}

impl Shipment {
    pub fn shipment_type(&self) -> &str {
        match self {
            Shipment::Kitting(k) => &k.shipment_type,
            Shipment::Assembly(a) => &a.shipment_type,
        }
    }

    /// The identifier pick-and-place directives and submissions are keyed by:
    /// the AGV for kitting, the station for assembly.
    pub fn destination_id(&self) -> &str {
        match self {
            Shipment::Kitting(k) => &k.agv_id,
            Shipment::Assembly(a) => &a.station_id,
        }
    }

    pub fn products(&self) -> &[Product] {
        match self {
            Shipment::Kitting(k) => &k.products,
            Shipment::Assembly(a) => &a.products,
        }
    }
}

/// A validated work order. Requirement content is immutable after parsing;
/// only completion bookkeeping (owned by the shipment tracker) changes later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: String,
    /// Higher values are served first; equal priorities are FIFO by arrival.
    pub priority: u16,
    pub kitting_shipments: Vec<KittingShipment>,
    pub assembly_shipments: Vec<AssemblyShipment>,
}

impl Order {
    /// All shipments in declaration order: kitting first, then assembly.
    /// This order is part of the deterministic dispatch contract.
    pub fn shipments(&self) -> Vec<Shipment> {
        self.kitting_shipments
            .iter()
            .cloned()
            .map(Shipment::Kitting)
            .chain(
                self.assembly_shipments
                    .iter()
                    .cloned()
                    .map(Shipment::Assembly),
            )
            .collect()
    }
}

/// The binding of one requirement to at most one observed part instance.
/// `matched_part: None` means nothing currently visible satisfies the
/// requirement – a retryable condition, not a failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub requirement: Product,
    pub matched_part: Option<ObservedPart>,
}

/// Terminal result of dispatching one requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchOutcome {
    /// The part was picked and placed at its target pose.
    Delivered,
    /// No visible part satisfied the requirement.
    PartNotFound,
    /// The actuation collaborator reported a faulty part or failed/timed out.
    PartFaulty,
}

/// Lifecycle state of one shipment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShipmentStatus {
    /// No dispatch has been attempted yet.
    Pending,
    /// At least one requirement has been dispatched.
    InProgress,
    /// Every requirement was delivered; the shipment has been submitted.
    Complete,
    /// The retry budget ran out with at least one requirement undelivered.
    /// Terminal, and always reported upward.
    PartiallyFulfilled,
}

/// Read-only per-order status for external reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderStatus {
    pub order_id: String,
    pub shipments: Vec<ShipmentStatusEntry>,
}

/// One shipment's current status within an [`OrderStatus`] report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipmentStatusEntry {
    pub shipment_type: String,
    pub status: ShipmentStatus,
}

/// Category of an auxiliary sensor alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    /// A break-beam sensor was interrupted.
    BeamBreak,
    /// A proximity sensor sees an object.
    Proximity,
    /// A laser profiler returned valid ranges.
    LaserProfile,
    /// A quality-control sensor sees a faulty part in its field of view.
    FaultyPartInView,
}

/// Unified event wrapper for the workcell event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// e.g. `"kitcell-middleware::sim_sensor"`.
    pub source: String,
    pub payload: EventPayload,
}

impl Event {
    /// Build an event stamped now with a fresh id.
    pub fn now(source: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: source.into(),
            payload,
        }
    }
}

/// Variants of data routed over the workcell event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    /// A sensor's complete current view, replacing its previous one.
    PartDetections {
        sensor_id: String,
        parts: Vec<ObservedPart>,
    },
    /// A raw order description from the upstream order feed (JSON text).
    OrderAnnounced { raw: String },
    /// A shipment moved to a new lifecycle state.
    ShipmentStatusChanged {
        order_id: String,
        shipment_type: String,
        status: ShipmentStatus,
    },
    /// Auxiliary sensor alert; logged, never part of matching state.
    SensorAlert { sensor_id: String, kind: AlertKind },
    /// External run-state signal: park the control loop between requirements.
    Halt { reason: String },
}

/// Global error type spanning order intake, actuation, and submission.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum WorkcellError {
    /// The raw order was structurally invalid; that order is rejected and the
    /// registry is left untouched for every other order.
    #[error("malformed order: {0}")]
    MalformedOrder(String),

    /// The actuation collaborator reported a failure executing a directive.
    #[error("actuation fault on {component}: {details}")]
    ActuationFault { component: String, details: String },

    /// The actuation collaborator did not report a terminal outcome in time.
    #[error("actuation directive timed out after {elapsed_ms} ms")]
    ActuationTimeout { elapsed_ms: u64 },

    /// Shipment submission failed (after the single permitted retry this is
    /// terminal and requires external intervention).
    #[error("submission failed for shipment {shipment_type}: {details}")]
    SubmissionFailure {
        shipment_type: String,
        details: String,
    },

    /// A shipment named a destination no submission client is registered for.
    #[error("no submission client registered for destination {0}")]
    UnknownDestination(String),

    /// Event bus channel error.
    #[error("channel error: {0}")]
    Channel(String),
}
