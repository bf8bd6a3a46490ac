//! `kitcell` – workcell controller entry point.
//!
//! This binary wires the full stack and drives a scripted demonstration
//! scenario against the in-process simulation collaborators:
//!
//! 1. Loads configuration (defaults ← `~/.kitcell/config.toml` ←
//!    `KITCELL_*` environment overrides).
//! 2. Builds the event bus, the shared observation store, and the sensor
//!    ingestion task.
//! 3. Registers one submission capability per destination (`agv1..4`,
//!    `as1..4`) behind the [`SubmissionRouter`].
//! 4. Publishes two camera detection sets and one two-shipment order, then
//!    runs the fulfillment loop until the queue is empty.
//!
//! Swapping the simulators for real transport/actuation clients is a wiring
//! change only; the engine speaks exclusively through the client traits.

mod config;

use std::sync::Arc;
use std::time::Duration;

use kitcell_engine::{FulfillmentLoop, SubmissionRouter, spawn_sensor_ingestor};
use kitcell_journal::{FulfillmentJournal, SharedJournal};
use kitcell_middleware::clients::SubmissionClient;
use kitcell_middleware::sim::{SimActuationClient, SimSensorFeed, SimSubmissionClient};
use kitcell_middleware::{EventBus, Topic};
use kitcell_types::{Event, EventPayload, ObservedPart, Pose};
use tracing::{info, warn};

/// Destinations the demo workcell can submit to.
const DESTINATIONS: [&str; 8] = [
    "agv1", "agv2", "agv3", "agv4", "as1", "as2", "as3", "as4",
];

#[tokio::main]
async fn main() {
    kitcell_engine::init_tracing();

    // ── Configuration ─────────────────────────────────────────────────────
    let mut cfg = match config::load() {
        Ok(Some(cfg)) => {
            info!(path = %config::config_path().display(), "config loaded");
            cfg
        }
        Ok(None) => {
            info!("no config file; using defaults");
            config::Config::default()
        }
        Err(e) => {
            warn!(error = %e, "config unreadable; using defaults");
            config::Config::default()
        }
    };
    config::apply_env_overrides(&mut cfg);

    // ── Wiring ────────────────────────────────────────────────────────────
    let bus = EventBus::default();
    let arm = Arc::new(SimActuationClient::new());
    let submission = Arc::new(SimSubmissionClient::new());
    let mut router = SubmissionRouter::new();
    for destination in DESTINATIONS {
        router = router.register(destination, submission.clone() as Arc<dyn SubmissionClient>);
    }

    let mut engine =
        FulfillmentLoop::new(cfg.fulfillment_config(), bus.clone(), arm.clone(), router);
    if let Some(path) = &cfg.journal_path {
        match FulfillmentJournal::open(path) {
            Ok(journal) => {
                info!(path = %path, "fulfillment journal attached");
                engine = engine.with_journal(SharedJournal::new(journal));
            }
            Err(e) => warn!(error = %e, "journal unavailable; continuing without audit log"),
        }
    }
    let store = engine.store();
    let ingestor = spawn_sensor_ingestor(&bus, store.clone());

    // ── Scripted perception ───────────────────────────────────────────────
    let bins0 = SimSensorFeed::new(bus.clone(), "camera_bins0");
    let bins1 = SimSensorFeed::new(bus.clone(), "camera_bins1");
    if let Err(e) = bins0.publish(vec![
        observed("assembly_pump_red", "camera_bins0", -1.90, 3.38),
        observed("assembly_battery_green", "camera_bins0", -1.80, 2.96),
    ]) {
        warn!(error = %e, "camera_bins0 publish failed");
    }
    if let Err(e) = bins1.publish(vec![
        observed("assembly_sensor_blue", "camera_bins1", -2.28, -1.33),
        observed("assembly_battery_blue", "camera_bins1", -2.38, -1.75),
    ]) {
        warn!(error = %e, "camera_bins1 publish failed");
    }

    // Let the ingestion task apply both detection sets before matching.
    for _ in 0..200 {
        if store.snapshot().total_parts() >= 4 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    info!(visible = store.snapshot().total_parts(), "perception primed");

    // ── Demo order over the bus ───────────────────────────────────────────
    if let Err(e) = bus.publish_to(
        Topic::Orders,
        Event::now(
            "kitcell-cli::demo_order_feed",
            EventPayload::OrderAnnounced {
                raw: demo_order_json().to_string(),
            },
        ),
    ) {
        warn!(error = %e, "order announcement failed");
    }

    // ── Drive to completion ───────────────────────────────────────────────
    engine.run_until_idle().await;

    // ── Report ────────────────────────────────────────────────────────────
    println!();
    println!("kitcell demo run finished");
    println!("  directives issued: {}", arm.directives().len());
    println!("  submissions:       {:?}", submission.submissions());
    for order_status in engine.status() {
        println!("  order {}:", order_status.order_id);
        for entry in &order_status.shipments {
            println!("    {:<24} {:?}", entry.shipment_type, entry.status);
        }
    }

    ingestor.abort();
}

fn observed(part_type: &str, sensor_id: &str, x: f64, y: f64) -> ObservedPart {
    ObservedPart {
        part_type: part_type.to_string(),
        world_pose: Pose::at(x, y, 0.78),
        sensor_id: sensor_id.to_string(),
        frame: format!("{sensor_id}_{part_type}_1_frame"),
    }
}

/// A two-shipment demo order: one kitting tray on `agv2`, one assembly
/// install at `as1`.
fn demo_order_json() -> &'static str {
    r#"{
        "order_id": "demo_order_0",
        "priority": 0,
        "kitting_shipments": [
            {
                "shipment_type": "demo_kitting_0",
                "agv_id": "agv2",
                "station_id": "as1",
                "products": [
                    {
                        "type": "assembly_pump_red",
                        "pose": {
                            "position": { "x": 0.10, "y": -0.10, "z": 0.0 },
                            "orientation": { "x": 0.0, "y": 0.0, "z": 0.0, "w": 1.0 }
                        }
                    },
                    {
                        "type": "assembly_battery_green",
                        "pose": {
                            "position": { "x": -0.10, "y": 0.10, "z": 0.0 },
                            "orientation": { "x": 0.0, "y": 0.0, "z": 0.0, "w": 1.0 }
                        }
                    }
                ]
            }
        ],
        "assembly_shipments": [
            {
                "shipment_type": "demo_assembly_0",
                "station_id": "as1",
                "products": [
                    {
                        "type": "assembly_sensor_blue",
                        "pose": {
                            "position": { "x": 0.0, "y": 0.0, "z": 0.20 },
                            "orientation": { "x": 0.0, "y": 0.0, "z": 0.0, "w": 1.0 }
                        }
                    }
                ]
            }
        ]
    }"#
}
