//! Raw order deserialization and structural validation.
//!
//! The upstream order feed delivers JSON documents shaped like the original
//! workcell order message: an order id, an optional priority, and per-kind
//! shipment lists.  [`parse_order`] is a pure structural transform – it either
//! yields a canonical [`Order`] or rejects the document with
//! [`WorkcellError::MalformedOrder`], naming the first missing field.

use serde::Deserialize;

use kitcell_types::{
    AssemblyShipment, KittingShipment, Order, Pose, Product, WorkcellError,
};

// ─────────────────────────────────────────────────────────────────────────────
// Wire model
// ─────────────────────────────────────────────────────────────────────────────

/// Raw order document as delivered by the order feed.  Every field the core
/// requires is optional here so that validation, not deserialization, decides
/// what is malformed.
#[derive(Debug, Clone, Deserialize)]
pub struct RawOrder {
    pub order_id: Option<String>,
    #[serde(default)]
    pub priority: Option<u16>,
    #[serde(default)]
    pub kitting_shipments: Vec<RawKittingShipment>,
    #[serde(default)]
    pub assembly_shipments: Vec<RawAssemblyShipment>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawKittingShipment {
    pub shipment_type: Option<String>,
    pub agv_id: Option<String>,
    pub station_id: Option<String>,
    #[serde(default)]
    pub products: Vec<RawProduct>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawAssemblyShipment {
    pub shipment_type: Option<String>,
    pub station_id: Option<String>,
    #[serde(default)]
    pub products: Vec<RawProduct>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawProduct {
    #[serde(rename = "type")]
    pub part_type: Option<String>,
    pub pose: Option<Pose>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Validation
// ─────────────────────────────────────────────────────────────────────────────

/// Parse and validate a raw order JSON document.
///
/// # Errors
///
/// Returns [`WorkcellError::MalformedOrder`] when the document is not valid
/// JSON, when a required field is absent or empty, when the order carries no
/// shipment at all, or when two shipments share a `shipment_type` (completion
/// bookkeeping is keyed by it).
pub fn parse_order(raw_json: &str) -> Result<Order, WorkcellError> {
    let raw: RawOrder = serde_json::from_str(raw_json)
        .map_err(|e| WorkcellError::MalformedOrder(format!("invalid JSON: {e}")))?;

    let order_id = require(raw.order_id, "order_id")?;

    if raw.kitting_shipments.is_empty() && raw.assembly_shipments.is_empty() {
        return Err(WorkcellError::MalformedOrder(format!(
            "order {order_id} carries no shipments"
        )));
    }

    let mut kitting_shipments = Vec::with_capacity(raw.kitting_shipments.len());
    for (i, raw_shipment) in raw.kitting_shipments.into_iter().enumerate() {
        kitting_shipments.push(KittingShipment {
            shipment_type: require(
                raw_shipment.shipment_type,
                &format!("kitting_shipments[{i}].shipment_type"),
            )?,
            agv_id: require(raw_shipment.agv_id, &format!("kitting_shipments[{i}].agv_id"))?,
            station_id: require(
                raw_shipment.station_id,
                &format!("kitting_shipments[{i}].station_id"),
            )?,
            products: parse_products(raw_shipment.products, &format!("kitting_shipments[{i}]"))?,
        });
    }

    let mut assembly_shipments = Vec::with_capacity(raw.assembly_shipments.len());
    for (i, raw_shipment) in raw.assembly_shipments.into_iter().enumerate() {
        assembly_shipments.push(AssemblyShipment {
            shipment_type: require(
                raw_shipment.shipment_type,
                &format!("assembly_shipments[{i}].shipment_type"),
            )?,
            station_id: require(
                raw_shipment.station_id,
                &format!("assembly_shipments[{i}].station_id"),
            )?,
            products: parse_products(raw_shipment.products, &format!("assembly_shipments[{i}]"))?,
        });
    }

    let order = Order {
        order_id,
        priority: raw.priority.unwrap_or(0),
        kitting_shipments,
        assembly_shipments,
    };
    ensure_unique_shipment_types(&order)?;
    Ok(order)
}

fn require(field: Option<String>, name: &str) -> Result<String, WorkcellError> {
    match field {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(WorkcellError::MalformedOrder(format!(
            "missing required field {name}"
        ))),
    }
}

fn parse_products(raw: Vec<RawProduct>, context: &str) -> Result<Vec<Product>, WorkcellError> {
    raw.into_iter()
        .enumerate()
        .map(|(i, p)| {
            Ok(Product {
                part_type: require(p.part_type, &format!("{context}.products[{i}].type"))?,
                target_pose: p.pose.ok_or_else(|| {
                    WorkcellError::MalformedOrder(format!(
                        "missing required field {context}.products[{i}].pose"
                    ))
                })?,
            })
        })
        .collect()
}

fn ensure_unique_shipment_types(order: &Order) -> Result<(), WorkcellError> {
    let mut seen = std::collections::HashSet::new();
    for shipment in order.shipments() {
        if !seen.insert(shipment.shipment_type().to_string()) {
            return Err(WorkcellError::MalformedOrder(format!(
                "order {} declares shipment_type {} more than once",
                order.order_id,
                shipment.shipment_type()
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A realistic two-shipment order document.
    fn sample_order_json() -> &'static str {
        r#"{
            "order_id": "order_0",
            "priority": 1,
            "kitting_shipments": [
                {
                    "shipment_type": "order_0_kitting_0",
                    "agv_id": "agv2",
                    "station_id": "as1",
                    "products": [
                        {
                            "type": "assembly_pump_red",
                            "pose": {
                                "position": { "x": 0.1, "y": -0.1, "z": 0.0 },
                                "orientation": { "x": 0.0, "y": 0.0, "z": 0.0, "w": 1.0 }
                            }
                        },
                        {
                            "type": "assembly_battery_green",
                            "pose": {
                                "position": { "x": -0.1, "y": 0.1, "z": 0.0 },
                                "orientation": { "x": 0.0, "y": 0.0, "z": 0.0, "w": 1.0 }
                            }
                        }
                    ]
                }
            ],
            "assembly_shipments": [
                {
                    "shipment_type": "order_0_assembly_0",
                    "station_id": "as1",
                    "products": [
                        {
                            "type": "assembly_sensor_blue",
                            "pose": {
                                "position": { "x": 0.0, "y": 0.0, "z": 0.2 },
                                "orientation": { "x": 0.0, "y": 0.0, "z": 0.0, "w": 1.0 }
                            }
                        }
                    ]
                }
            ]
        }"#
    }

    #[test]
    fn parses_a_complete_order() {
        let order = parse_order(sample_order_json()).unwrap();
        assert_eq!(order.order_id, "order_0");
        assert_eq!(order.priority, 1);
        assert_eq!(order.kitting_shipments.len(), 1);
        assert_eq!(order.assembly_shipments.len(), 1);
        let kitting = &order.kitting_shipments[0];
        assert_eq!(kitting.agv_id, "agv2");
        assert_eq!(kitting.products.len(), 2);
        assert_eq!(kitting.products[0].part_type, "assembly_pump_red");
    }

    #[test]
    fn missing_priority_defaults_to_zero() {
        let json = r#"{
            "order_id": "order_1",
            "kitting_shipments": [
                { "shipment_type": "k0", "agv_id": "agv1", "station_id": "as1", "products": [] }
            ]
        }"#;
        let order = parse_order(json).unwrap();
        assert_eq!(order.priority, 0);
    }

    #[test]
    fn rejects_invalid_json() {
        let err = parse_order("{ not json").unwrap_err();
        assert!(matches!(err, WorkcellError::MalformedOrder(_)));
    }

    #[test]
    fn rejects_missing_order_id() {
        let json = r#"{
            "kitting_shipments": [
                { "shipment_type": "k0", "agv_id": "agv1", "station_id": "as1", "products": [] }
            ]
        }"#;
        let err = parse_order(json).unwrap_err();
        assert!(err.to_string().contains("order_id"));
    }

    #[test]
    fn rejects_order_with_no_shipments() {
        let err = parse_order(r#"{ "order_id": "order_2" }"#).unwrap_err();
        assert!(err.to_string().contains("no shipments"));
    }

    #[test]
    fn rejects_kitting_shipment_without_agv() {
        let json = r#"{
            "order_id": "order_3",
            "kitting_shipments": [
                { "shipment_type": "k0", "station_id": "as1", "products": [] }
            ]
        }"#;
        let err = parse_order(json).unwrap_err();
        assert!(err.to_string().contains("agv_id"));
    }

    #[test]
    fn rejects_product_without_pose() {
        let json = r#"{
            "order_id": "order_4",
            "assembly_shipments": [
                {
                    "shipment_type": "a0",
                    "station_id": "as2",
                    "products": [ { "type": "gear" } ]
                }
            ]
        }"#;
        let err = parse_order(json).unwrap_err();
        assert!(err.to_string().contains("pose"));
    }

    #[test]
    fn rejects_duplicate_shipment_types() {
        let json = r#"{
            "order_id": "order_5",
            "kitting_shipments": [
                { "shipment_type": "dup", "agv_id": "agv1", "station_id": "as1", "products": [] },
                { "shipment_type": "dup", "agv_id": "agv2", "station_id": "as2", "products": [] }
            ]
        }"#;
        let err = parse_order(json).unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn duplicate_product_types_are_distinct_requirements() {
        let json = r#"{
            "order_id": "order_6",
            "kitting_shipments": [
                {
                    "shipment_type": "k0",
                    "agv_id": "agv1",
                    "station_id": "as1",
                    "products": [
                        { "type": "gear", "pose": { "position": { "x": 0.1, "y": 0.0, "z": 0.0 }, "orientation": { "x": 0.0, "y": 0.0, "z": 0.0, "w": 1.0 } } },
                        { "type": "gear", "pose": { "position": { "x": 0.2, "y": 0.0, "z": 0.0 }, "orientation": { "x": 0.0, "y": 0.0, "z": 0.0, "w": 1.0 } } }
                    ]
                }
            ]
        }"#;
        let order = parse_order(json).unwrap();
        let products = &order.kitting_shipments[0].products;
        assert_eq!(products.len(), 2);
        // Same type, different target poses: two separate requirements.
        assert_ne!(products[0].target_pose, products[1].target_pose);
    }
}
