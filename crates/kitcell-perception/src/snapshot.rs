//! [`Snapshot`] – a frozen observation view for one matching pass.
//!
//! A snapshot owns copies of every sensor's current part list, taken at a
//! single instant by [`PartObservationStore::snapshot`][crate::store::PartObservationStore::snapshot].
//! Sensor lists appear in the store's configured priority order, and parts
//! within a list keep their detection order, so a first-fit scan over a
//! snapshot is fully deterministic.
//!
//! Consumption marks live on the snapshot itself: once a part is claimed for
//! a requirement it stays claimed for the remainder of the pass, even if the
//! underlying store is concurrently replaced by fresh sensor data.

use kitcell_types::{ObservedPart, POSE_EPSILON, Pose};

/// One observed part plus its per-pass consumption mark.
#[derive(Debug, Clone)]
struct PartSlot {
    part: ObservedPart,
    consumed: bool,
}

/// One sensor's contribution to a snapshot.
#[derive(Debug, Clone)]
pub struct SensorView {
    sensor_id: String,
    slots: Vec<PartSlot>,
}

impl SensorView {
    pub fn sensor_id(&self) -> &str {
        &self.sensor_id
    }

    /// Parts in detection order, consumed or not.
    pub fn parts(&self) -> impl Iterator<Item = &ObservedPart> {
        self.slots.iter().map(|s| &s.part)
    }
}

/// An owned, instantaneous view of all currently visible parts.
#[derive(Debug, Clone)]
pub struct Snapshot {
    sensors: Vec<SensorView>,
}

impl Snapshot {
    /// Build a snapshot from `(sensor_id, parts)` pairs already arranged in
    /// sensor priority order.
    pub(crate) fn new(views: Vec<(String, Vec<ObservedPart>)>) -> Self {
        let sensors = views
            .into_iter()
            .map(|(sensor_id, parts)| SensorView {
                sensor_id,
                slots: parts
                    .into_iter()
                    .map(|part| PartSlot {
                        part,
                        consumed: false,
                    })
                    .collect(),
            })
            .collect();
        Self { sensors }
    }

    /// An empty snapshot ("nothing visible" – not an error).
    pub fn empty() -> Self {
        Self {
            sensors: Vec::new(),
        }
    }

    pub fn sensors(&self) -> &[SensorView] {
        &self.sensors
    }

    /// Total part count across all sensors, consumed or not.
    pub fn total_parts(&self) -> usize {
        self.sensors.iter().map(|v| v.slots.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total_parts() == 0
    }

    /// Number of not-yet-consumed parts of `part_type` across all sensors.
    pub fn unconsumed_of_type(&self, part_type: &str) -> usize {
        self.sensors
            .iter()
            .flat_map(|v| v.slots.iter())
            .filter(|s| !s.consumed && s.part.part_type == part_type)
            .count()
    }

    /// First-fit claim: scan sensors in priority order and parts in detection
    /// order, consume the first unconsumed part whose type equals
    /// `part_type`, and return a copy of it.
    ///
    /// Returns `None` when no unconsumed part of that type is visible; the
    /// snapshot is left unchanged in that case.
    pub fn claim_first(&mut self, part_type: &str) -> Option<ObservedPart> {
        for view in &mut self.sensors {
            for slot in &mut view.slots {
                if !slot.consumed && slot.part.part_type == part_type {
                    slot.consumed = true;
                    return Some(slot.part.clone());
                }
            }
        }
        None
    }

    /// Claim the specific instance sitting at `pose` (within [`POSE_EPSILON`]
    /// metres), if one is visible and unconsumed.
    ///
    /// Used to re-reserve parts already promised to other requirements before
    /// re-matching a single requirement against a fresh snapshot.
    ///
    /// [`POSE_EPSILON`]: kitcell_types::POSE_EPSILON
    pub fn claim_at(&mut self, part_type: &str, pose: &Pose) -> Option<ObservedPart> {
        for view in &mut self.sensors {
            for slot in &mut view.slots {
                if !slot.consumed
                    && slot.part.part_type == part_type
                    && slot.part.world_pose.position_close_to(pose, POSE_EPSILON)
                {
                    slot.consumed = true;
                    return Some(slot.part.clone());
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kitcell_types::Pose;

    fn part(part_type: &str, sensor_id: &str, x: f64) -> ObservedPart {
        ObservedPart {
            part_type: part_type.to_string(),
            world_pose: Pose::at(x, 0.0, 0.0),
            sensor_id: sensor_id.to_string(),
            frame: format!("{sensor_id}_{part_type}_{x}_frame"),
        }
    }

    fn two_sensor_snapshot() -> Snapshot {
        Snapshot::new(vec![
            (
                "camera_a".to_string(),
                vec![part("gear", "camera_a", 1.0)],
            ),
            (
                "camera_b".to_string(),
                vec![
                    part("gear", "camera_b", 2.0),
                    part("bolt", "camera_b", 3.0),
                ],
            ),
        ])
    }

    #[test]
    fn claim_first_scans_sensors_in_priority_order() {
        let mut snapshot = two_sensor_snapshot();
        let first = snapshot.claim_first("gear").unwrap();
        assert_eq!(first.sensor_id, "camera_a");
        // The camera_a instance is consumed, so the next claim crosses over
        // to camera_b.
        let second = snapshot.claim_first("gear").unwrap();
        assert_eq!(second.sensor_id, "camera_b");
        assert!(snapshot.claim_first("gear").is_none());
    }

    #[test]
    fn claim_first_skips_other_types() {
        let mut snapshot = two_sensor_snapshot();
        let bolt = snapshot.claim_first("bolt").unwrap();
        assert_eq!(bolt.sensor_id, "camera_b");
        // Both gears are still unconsumed.
        assert_eq!(snapshot.unconsumed_of_type("gear"), 2);
    }

    #[test]
    fn claim_on_missing_type_leaves_snapshot_unchanged() {
        let mut snapshot = two_sensor_snapshot();
        assert!(snapshot.claim_first("regulator").is_none());
        assert_eq!(snapshot.unconsumed_of_type("gear"), 2);
        assert_eq!(snapshot.unconsumed_of_type("bolt"), 1);
    }

    #[test]
    fn empty_snapshot_reports_nothing_visible() {
        let mut snapshot = Snapshot::empty();
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.total_parts(), 0);
        assert!(snapshot.claim_first("gear").is_none());
    }

    #[test]
    fn claim_at_targets_one_specific_instance() {
        let mut snapshot = two_sensor_snapshot();
        // Reserve the camera_b gear by its pose.
        let reserved = snapshot
            .claim_at("gear", &Pose::at(2.0, 0.0, 0.0))
            .unwrap();
        assert_eq!(reserved.sensor_id, "camera_b");
        // A first-fit claim still finds the camera_a gear, and only that one.
        let first = snapshot.claim_first("gear").unwrap();
        assert_eq!(first.sensor_id, "camera_a");
        assert!(snapshot.claim_first("gear").is_none());
    }

    #[test]
    fn claim_at_misses_when_nothing_sits_there() {
        let mut snapshot = two_sensor_snapshot();
        assert!(snapshot.claim_at("gear", &Pose::at(9.0, 9.0, 9.0)).is_none());
        assert_eq!(snapshot.unconsumed_of_type("gear"), 2);
    }

    #[test]
    fn total_parts_counts_consumed_parts_too() {
        let mut snapshot = two_sensor_snapshot();
        snapshot.claim_first("gear");
        assert_eq!(snapshot.total_parts(), 3);
        assert_eq!(snapshot.unconsumed_of_type("gear"), 1);
    }
}
