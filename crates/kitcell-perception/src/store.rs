//! [`PartObservationStore`] – live, multi-sensor part detection state.
//!
//! Each sensor delivers complete detection sets at its native rate; the store
//! keeps only the most recent set per sensor, the same way a fusion filter
//! keeps only the latest measurement per stream.  [`PartObservationStore::snapshot`]
//! freezes the current state into an owned [`Snapshot`] so that a matching
//! pass never observes a sensor list mutating mid-scan.
//!
//! # Stale-pose suppression
//!
//! Once a part has been physically picked (delivered to a tray, or discarded
//! as faulty), its last observed pose is no longer trustworthy: the sensor may
//! keep re-reporting the old detection for a cycle after the part has moved.
//! [`PartObservationStore::suppress`] records `(part_type, pose)` entries that
//! are filtered out of snapshots until every configured sensor has delivered
//! at least one fresh detection set – one full snapshot cycle.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use kitcell_types::{ObservedPart, Pose};
use tracing::{debug, warn};

use crate::snapshot::Snapshot;

/// Radius (metres) within which an observed position matches a suppressed
/// pose.  Wider than raw pose tolerance to absorb re-detection jitter.
const SUPPRESSION_RADIUS: f64 = 0.02;

/// A pose that must not be matched again until every sensor has refreshed.
#[derive(Debug, Clone)]
struct Suppression {
    part_type: String,
    pose: Pose,
    /// Per-sensor ingest generation at the time of suppression.
    seen_at: HashMap<String, u64>,
}

/// Replace-latest detection state for N independent sensors.
#[derive(Debug)]
pub struct PartObservationStore {
    /// Fixed scan priority; also the sensor set a suppression must outlive.
    sensor_priority: Vec<String>,
    latest: HashMap<String, Vec<ObservedPart>>,
    /// Monotonic ingest counter per sensor.
    generations: HashMap<String, u64>,
    suppressed: Vec<Suppression>,
}

impl PartObservationStore {
    /// Create a store with the given sensor scan priority.  Sensors that
    /// later report without being listed are appended at the lowest priority.
    pub fn new(sensor_priority: Vec<String>) -> Self {
        Self {
            sensor_priority,
            latest: HashMap::new(),
            generations: HashMap::new(),
            suppressed: Vec::new(),
        }
    }

    /// Replace `sensor_id`'s current detection set.
    ///
    /// Never blocks on the control loop; sensor callbacks only ever
    /// append/replace state here.
    pub fn ingest(&mut self, sensor_id: &str, parts: Vec<ObservedPart>) {
        if !self.sensor_priority.iter().any(|s| s == sensor_id) {
            warn!(sensor_id, "detection from unlisted sensor; appending at lowest priority");
            self.sensor_priority.push(sensor_id.to_string());
        }
        debug!(sensor_id, count = parts.len(), "ingesting detection set");
        self.latest.insert(sensor_id.to_string(), parts);
        *self.generations.entry(sensor_id.to_string()).or_insert(0) += 1;
        self.expire_suppressions();
    }

    /// Freeze the current state into an owned [`Snapshot`].
    ///
    /// Sensor lists appear in priority order; sensors that have not reported
    /// yet contribute an empty list.  Suppressed poses are filtered out.
    /// Never blocks: an entirely silent store yields an empty snapshot, which
    /// the matching engine treats as "nothing visible", not an error.
    pub fn snapshot(&self) -> Snapshot {
        let views = self
            .sensor_priority
            .iter()
            .map(|sensor_id| {
                let parts = self
                    .latest
                    .get(sensor_id)
                    .map(|parts| {
                        parts
                            .iter()
                            .filter(|p| !self.is_suppressed(p))
                            .cloned()
                            .collect()
                    })
                    .unwrap_or_default();
                (sensor_id.clone(), parts)
            })
            .collect();
        Snapshot::new(views)
    }

    /// Record that a part of `part_type` has physically left `pose`.
    /// Detections matching the pair are hidden from snapshots until every
    /// configured sensor has ingested a fresh set.
    pub fn suppress(&mut self, part_type: &str, pose: Pose) {
        debug!(part_type, "suppressing stale pose");
        self.suppressed.push(Suppression {
            part_type: part_type.to_string(),
            pose,
            seen_at: self.generations.clone(),
        });
    }

    /// `true` when `part` falls inside an active suppression window.
    pub fn is_suppressed(&self, part: &ObservedPart) -> bool {
        self.suppressed.iter().any(|s| {
            s.part_type == part.part_type
                && s.pose.position_close_to(&part.world_pose, SUPPRESSION_RADIUS)
        })
    }

    /// Drop suppressions once every sensor has refreshed past them.
    fn expire_suppressions(&mut self) {
        let generations = &self.generations;
        let priority = &self.sensor_priority;
        self.suppressed.retain(|s| {
            !priority.iter().all(|sensor| {
                let now = generations.get(sensor).copied().unwrap_or(0);
                let then = s.seen_at.get(sensor).copied().unwrap_or(0);
                now > then
            })
        });
    }
}

/// Cheaply cloneable shared handle over a [`PartObservationStore`].
///
/// Sensor-ingest tasks write through clones of this handle; the control loop
/// reads snapshots through its own clone.  The mutex guards only short
/// replace/copy sections, and the snapshot-copy semantics mean the matching
/// engine never holds the lock while scanning.
#[derive(Debug, Clone)]
pub struct SharedObservationStore(Arc<Mutex<PartObservationStore>>);

impl SharedObservationStore {
    pub fn new(sensor_priority: Vec<String>) -> Self {
        Self(Arc::new(Mutex::new(PartObservationStore::new(
            sensor_priority,
        ))))
    }

    pub fn ingest(&self, sensor_id: &str, parts: Vec<ObservedPart>) {
        self.lock().ingest(sensor_id, parts);
    }

    pub fn snapshot(&self) -> Snapshot {
        self.lock().snapshot()
    }

    pub fn suppress(&self, part_type: &str, pose: Pose) {
        self.lock().suppress(part_type, pose);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PartObservationStore> {
        // A panicked ingest task must not wedge the control loop; the store
        // state is valid after any completed insert.
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
