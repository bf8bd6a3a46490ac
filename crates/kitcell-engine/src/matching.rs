//! [`MatchingEngine`] – requirement-to-observation reconciliation.
//!
//! # Algorithm
//!
//! For each requirement in declaration order, scan the snapshot's sensors in
//! their configured priority order and each sensor's parts in detection
//! order; the **first** unconsumed part whose type equals the requirement's
//! type is bound and immediately consumed, so later requirements can never
//! claim it.  A requirement with no visible match yields an assignment with
//! `matched_part: None` – represented, never dropped – and is deferred to a
//! later pass.
//!
//! Greedy first-fit is deliberate: it is deterministic (same requirements and
//! snapshot always produce the same assignments) and O(requirements × parts),
//! which is ample at single-digit shipment sizes.  When two requirements want
//! the same type and only one instance is visible, the earlier-declared
//! requirement wins.

use kitcell_perception::Snapshot;
use kitcell_types::{Assignment, Product};
use tracing::debug;

/// The central reconciliation step between demand and perception.
pub struct MatchingEngine;

impl MatchingEngine {
    /// Produce exactly one [`Assignment`] per requirement, in requirement
    /// order.  Consumption marks are recorded on `snapshot`, so a second call
    /// against the same snapshot sees only what the first left behind.
    pub fn match_requirements(
        requirements: &[Product],
        snapshot: &mut Snapshot,
    ) -> Vec<Assignment> {
        requirements
            .iter()
            .map(|requirement| {
                let matched_part = snapshot.claim_first(&requirement.part_type);
                match &matched_part {
                    Some(part) => debug!(
                        part_type = %requirement.part_type,
                        sensor_id = %part.sensor_id,
                        "requirement bound to observed part"
                    ),
                    None => debug!(
                        part_type = %requirement.part_type,
                        "no visible part for requirement; deferred"
                    ),
                }
                Assignment {
                    requirement: requirement.clone(),
                    matched_part,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kitcell_perception::PartObservationStore;
    use kitcell_types::{ObservedPart, Pose};

    fn observed(part_type: &str, sensor_id: &str, x: f64) -> ObservedPart {
        ObservedPart {
            part_type: part_type.to_string(),
            world_pose: Pose::at(x, 0.0, 0.0),
            sensor_id: sensor_id.to_string(),
            frame: format!("{sensor_id}_{part_type}_{x}_frame"),
        }
    }

    fn requirement(part_type: &str, x: f64) -> Product {
        Product {
            part_type: part_type.to_string(),
            target_pose: Pose::at(x, 0.0, 0.0),
        }
    }

    /// Store with sensor A = [gear@1.0] and sensor B = [gear@2.0, bolt@3.0].
    fn two_camera_store() -> PartObservationStore {
        let mut store =
            PartObservationStore::new(vec!["camera_a".to_string(), "camera_b".to_string()]);
        store.ingest("camera_a", vec![observed("gear", "camera_a", 1.0)]);
        store.ingest(
            "camera_b",
            vec![
                observed("gear", "camera_b", 2.0),
                observed("bolt", "camera_b", 3.0),
            ],
        );
        store
    }

    #[test]
    fn assignment_count_and_order_mirror_requirements() {
        let mut snapshot = two_camera_store().snapshot();
        let requirements = vec![
            requirement("bolt", 0.1),
            requirement("gear", 0.2),
            requirement("regulator", 0.3),
        ];
        let assignments = MatchingEngine::match_requirements(&requirements, &mut snapshot);
        assert_eq!(assignments.len(), requirements.len());
        for (assignment, req) in assignments.iter().zip(&requirements) {
            assert_eq!(assignment.requirement, *req);
        }
    }

    #[test]
    fn first_fit_walks_sensor_priority_then_detection_order() {
        // [gear, gear, bolt] against A = [gear@P1], B = [gear@P2, bolt@P3].
        let mut snapshot = two_camera_store().snapshot();
        let requirements = vec![
            requirement("gear", 0.1),
            requirement("gear", 0.2),
            requirement("bolt", 0.3),
        ];
        let assignments = MatchingEngine::match_requirements(&requirements, &mut snapshot);

        let bound: Vec<&ObservedPart> = assignments
            .iter()
            .map(|a| a.matched_part.as_ref().unwrap())
            .collect();
        assert_eq!(bound[0].sensor_id, "camera_a");
        assert_eq!(bound[0].world_pose, Pose::at(1.0, 0.0, 0.0));
        assert_eq!(bound[1].sensor_id, "camera_b");
        assert_eq!(bound[1].world_pose, Pose::at(2.0, 0.0, 0.0));
        assert_eq!(bound[2].part_type, "bolt");
        assert_eq!(bound[2].world_pose, Pose::at(3.0, 0.0, 0.0));
    }

    #[test]
    fn no_two_assignments_share_an_instance() {
        let mut snapshot = two_camera_store().snapshot();
        let requirements = vec![requirement("gear", 0.1), requirement("gear", 0.2)];
        let assignments = MatchingEngine::match_requirements(&requirements, &mut snapshot);
        let frames: Vec<&str> = assignments
            .iter()
            .filter_map(|a| a.matched_part.as_ref())
            .map(|p| p.frame.as_str())
            .collect();
        assert_eq!(frames.len(), 2);
        assert_ne!(frames[0], frames[1]);
    }

    #[test]
    fn sufficient_supply_leaves_nothing_unmatched() {
        let mut snapshot = two_camera_store().snapshot();
        let requirements = vec![
            requirement("gear", 0.1),
            requirement("gear", 0.2),
            requirement("bolt", 0.3),
        ];
        let assignments = MatchingEngine::match_requirements(&requirements, &mut snapshot);
        assert!(assignments.iter().all(|a| a.matched_part.is_some()));
    }

    #[test]
    fn earlier_declared_requirement_wins_scarce_supply() {
        let mut store = PartObservationStore::new(vec!["camera_a".to_string()]);
        store.ingest("camera_a", vec![observed("gear", "camera_a", 1.0)]);
        let mut snapshot = store.snapshot();

        let requirements = vec![requirement("gear", 0.1), requirement("gear", 0.2)];
        let assignments = MatchingEngine::match_requirements(&requirements, &mut snapshot);
        assert!(assignments[0].matched_part.is_some());
        assert!(assignments[1].matched_part.is_none());
    }

    #[test]
    fn matching_is_idempotent_for_identical_inputs() {
        let store = two_camera_store();
        let requirements = vec![
            requirement("gear", 0.1),
            requirement("bolt", 0.2),
            requirement("gear", 0.3),
        ];
        let first =
            MatchingEngine::match_requirements(&requirements, &mut store.snapshot());
        let second =
            MatchingEngine::match_requirements(&requirements, &mut store.snapshot());
        assert_eq!(first, second);
    }

    #[test]
    fn empty_snapshot_defers_every_requirement() {
        let store = PartObservationStore::new(vec!["camera_a".to_string()]);
        let mut snapshot = store.snapshot();
        let requirements = vec![requirement("gear", 0.1)];
        let assignments = MatchingEngine::match_requirements(&requirements, &mut snapshot);
        assert_eq!(assignments.len(), 1);
        assert!(assignments[0].matched_part.is_none());
    }
}
