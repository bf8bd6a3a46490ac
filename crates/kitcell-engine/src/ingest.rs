//! Sensor ingestion task.
//!
//! Bridges the bus `Detections` lane into the shared observation store.  The
//! task runs independently of the control loop and only ever replaces
//! per-sensor state – it never blocks on, or participates in, requirement
//! processing.  The control loop sees new detections at its next
//! `snapshot()`, never mid-scan.

use kitcell_middleware::bus::{EventBus, Topic};
use kitcell_perception::SharedObservationStore;
use kitcell_types::EventPayload;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

/// Spawn the ingestion task.  It runs until the bus shuts down.
///
/// Lagging behind a fast sensor is tolerated: dropped detection events are
/// stale by definition, and the next event carries the sensor's full current
/// view anyway.
pub fn spawn_sensor_ingestor(
    bus: &EventBus,
    store: SharedObservationStore,
) -> tokio::task::JoinHandle<()> {
    let mut rx = bus.subscribe_to(Topic::Detections);
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if let EventPayload::PartDetections { sensor_id, parts } = event.payload {
                        debug!(sensor_id = %sensor_id, count = parts.len(), "applying detections");
                        store.ingest(&sensor_id, parts);
                    }
                }
                Err(RecvError::Lagged(n)) => {
                    warn!(dropped = n, "sensor ingestor lagged; continuing with newest data");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}
