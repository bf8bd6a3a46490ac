//! [`OrderRegistry`] – the queue of received work orders.
//!
//! Orders enter through [`OrderRegistry::receive`] and stay in arrival order.
//! [`OrderRegistry::next_pending`] serves the highest-priority order that
//! still has unfinished shipments, falling back to arrival order on ties, so
//! the fulfillment loop always works on exactly one well-defined order.
//!
//! Completion flags are written only through
//! [`OrderRegistry::mark_shipment_complete`], which the shipment tracker
//! calls when a shipment reaches a terminal state.  Requirement content is
//! never mutated after parsing.

use std::collections::HashSet;

use kitcell_types::{Order, WorkcellError};
use tracing::{info, warn};

/// One queued order plus its completion bookkeeping.
#[derive(Debug)]
struct TrackedOrder {
    order: Order,
    /// `shipment_type`s that have reached a terminal state.
    completed: HashSet<String>,
}

impl TrackedOrder {
    fn is_complete(&self) -> bool {
        self.order
            .shipments()
            .iter()
            .all(|s| self.completed.contains(s.shipment_type()))
    }
}

/// Arrival-ordered registry of work orders.
#[derive(Debug, Default)]
pub struct OrderRegistry {
    orders: Vec<TrackedOrder>,
}

impl OrderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse, validate, and enqueue a raw order document.
    ///
    /// # Errors
    ///
    /// Returns [`WorkcellError::MalformedOrder`] for structurally invalid
    /// documents and for duplicate order ids.  A rejected order leaves the
    /// registry untouched for every other order.
    pub fn receive(&mut self, raw_json: &str) -> Result<&Order, WorkcellError> {
        let order = crate::raw::parse_order(raw_json)?;
        if self.orders.iter().any(|t| t.order.order_id == order.order_id) {
            return Err(WorkcellError::MalformedOrder(format!(
                "duplicate order_id {}",
                order.order_id
            )));
        }
        info!(
            order_id = %order.order_id,
            priority = order.priority,
            kitting = order.kitting_shipments.len(),
            assembly = order.assembly_shipments.len(),
            "order received"
        );
        self.orders.push(TrackedOrder {
            order,
            completed: HashSet::new(),
        });
        // Just pushed, so last() is always present.
        Ok(&self.orders[self.orders.len() - 1].order)
    }

    /// The highest-priority order with unfinished shipments, ties broken by
    /// arrival order (FIFO).  `None` when everything is complete.
    pub fn next_pending(&self) -> Option<&Order> {
        self.orders
            .iter()
            .filter(|t| !t.is_complete())
            // max_by_key returns the *last* maximum; scanning in reverse makes
            // the earliest arrival win ties instead.
            .rev()
            .max_by_key(|t| t.order.priority)
            .map(|t| &t.order)
    }

    /// Record that `shipment_type` of `order_id` reached a terminal state.
    /// Called exclusively by the shipment tracker.  Unknown ids are logged
    /// and ignored rather than propagated – a stale completion report must
    /// not poison the queue.
    pub fn mark_shipment_complete(&mut self, order_id: &str, shipment_type: &str) {
        match self.orders.iter_mut().find(|t| t.order.order_id == order_id) {
            Some(tracked) => {
                tracked.completed.insert(shipment_type.to_string());
                if tracked.is_complete() {
                    info!(order_id, "all shipments terminal; order complete");
                }
            }
            None => warn!(order_id, shipment_type, "completion report for unknown order"),
        }
    }

    /// `true` once every shipment of `order_id` is terminal.  Unknown orders
    /// report `false`.
    pub fn is_order_complete(&self, order_id: &str) -> bool {
        self.orders
            .iter()
            .find(|t| t.order.order_id == order_id)
            .is_some_and(TrackedOrder::is_complete)
    }

    /// Ids of all orders still holding unfinished shipments, in arrival order.
    pub fn pending_order_ids(&self) -> Vec<String> {
        self.orders
            .iter()
            .filter(|t| !t.is_complete())
            .map(|t| t.order.order_id.clone())
            .collect()
    }

    /// All known orders in arrival order, complete or not.
    pub fn orders(&self) -> impl Iterator<Item = &Order> {
        self.orders.iter().map(|t| &t.order)
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order_json(order_id: &str, priority: u16, shipment_type: &str) -> String {
        format!(
            r#"{{
                "order_id": "{order_id}",
                "priority": {priority},
                "kitting_shipments": [
                    {{ "shipment_type": "{shipment_type}", "agv_id": "agv1", "station_id": "as1", "products": [] }}
                ]
            }}"#
        )
    }

    #[test]
    fn receive_enqueues_in_arrival_order() {
        let mut registry = OrderRegistry::new();
        registry.receive(&order_json("order_0", 0, "k0")).unwrap();
        registry.receive(&order_json("order_1", 0, "k1")).unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.pending_order_ids(), vec!["order_0", "order_1"]);
    }

    #[test]
    fn malformed_order_leaves_registry_untouched() {
        let mut registry = OrderRegistry::new();
        registry.receive(&order_json("order_0", 0, "k0")).unwrap();
        let err = registry.receive("{ broken").unwrap_err();
        assert!(matches!(err, WorkcellError::MalformedOrder(_)));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.next_pending().unwrap().order_id, "order_0");
    }

    #[test]
    fn duplicate_order_id_is_rejected() {
        let mut registry = OrderRegistry::new();
        registry.receive(&order_json("order_0", 0, "k0")).unwrap();
        let err = registry.receive(&order_json("order_0", 5, "k9")).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn next_pending_is_fifo_for_equal_priority() {
        let mut registry = OrderRegistry::new();
        registry.receive(&order_json("order_0", 0, "k0")).unwrap();
        registry.receive(&order_json("order_1", 0, "k1")).unwrap();
        assert_eq!(registry.next_pending().unwrap().order_id, "order_0");
    }

    #[test]
    fn next_pending_prefers_higher_priority() {
        let mut registry = OrderRegistry::new();
        registry.receive(&order_json("order_0", 0, "k0")).unwrap();
        registry.receive(&order_json("order_1", 3, "k1")).unwrap();
        assert_eq!(registry.next_pending().unwrap().order_id, "order_1");
    }

    #[test]
    fn completed_orders_are_skipped() {
        let mut registry = OrderRegistry::new();
        registry.receive(&order_json("order_0", 0, "k0")).unwrap();
        registry.receive(&order_json("order_1", 0, "k1")).unwrap();
        registry.mark_shipment_complete("order_0", "k0");
        assert!(registry.is_order_complete("order_0"));
        assert_eq!(registry.next_pending().unwrap().order_id, "order_1");
    }

    #[test]
    fn order_with_multiple_shipments_needs_all_terminal() {
        let mut registry = OrderRegistry::new();
        let json = r#"{
            "order_id": "order_0",
            "kitting_shipments": [
                { "shipment_type": "k0", "agv_id": "agv1", "station_id": "as1", "products": [] }
            ],
            "assembly_shipments": [
                { "shipment_type": "a0", "station_id": "as2", "products": [] }
            ]
        }"#;
        registry.receive(json).unwrap();
        registry.mark_shipment_complete("order_0", "k0");
        assert!(!registry.is_order_complete("order_0"));
        registry.mark_shipment_complete("order_0", "a0");
        assert!(registry.is_order_complete("order_0"));
    }

    #[test]
    fn all_complete_yields_no_pending() {
        let mut registry = OrderRegistry::new();
        registry.receive(&order_json("order_0", 0, "k0")).unwrap();
        registry.mark_shipment_complete("order_0", "k0");
        assert!(registry.next_pending().is_none());
        assert!(registry.pending_order_ids().is_empty());
    }

    #[test]
    fn unknown_completion_report_is_ignored() {
        let mut registry = OrderRegistry::new();
        registry.receive(&order_json("order_0", 0, "k0")).unwrap();
        registry.mark_shipment_complete("ghost", "k0");
        assert!(!registry.is_order_complete("order_0"));
    }
}
