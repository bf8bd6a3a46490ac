//! Headless, typed, topic-based publish/subscribe event bus.
//!
//! Uses [`tokio::sync::broadcast`] channels under the hood so that every
//! subscriber receives every message without any single subscriber blocking
//! the others.  Sensor callbacks publish here and never participate in the
//! control loop's critical section.
//!
//! # Topics
//!
//! Traffic is partitioned into four [`Topic`] lanes so components only
//! receive the messages they care about:
//!
//! | Topic | Typical traffic |
//! |---|---|
//! | [`Topic::Detections`] | Per-sensor part detection sets at sensor-native rate |
//! | [`Topic::Orders`] | Raw order announcements from the order feed |
//! | [`Topic::Status`] | Shipment/order lifecycle changes for telemetry |
//! | [`Topic::Alerts`] | Auxiliary sensor alerts and run-state signals |

use kitcell_types::{Event, WorkcellError};
use tokio::sync::broadcast;

/// Default channel capacity (number of buffered events before old ones are
/// dropped for slow subscribers).
const DEFAULT_CAPACITY: usize = 256;

/// Enumeration of all first-class routing topics on the event bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Per-sensor part detection sets, replacing the sensor's previous view.
    Detections,
    /// Raw order documents announced by the upstream order feed.
    Orders,
    /// Shipment and order lifecycle changes, for external reporting.
    Status,
    /// Auxiliary sensor alerts (break-beam, proximity, QC) and halt signals.
    Alerts,
}

/// Shared event bus. Clone it cheaply – all clones share the same underlying
/// broadcast channels.
#[derive(Clone, Debug)]
pub struct EventBus {
    detections: broadcast::Sender<Event>,
    orders: broadcast::Sender<Event>,
    status: broadcast::Sender<Event>,
    alerts: broadcast::Sender<Event>,
}

impl EventBus {
    /// Create a new bus with the given channel capacity, applied to every
    /// topic channel independently.
    pub fn new(capacity: usize) -> Self {
        let (detections, _) = broadcast::channel(capacity);
        let (orders, _) = broadcast::channel(capacity);
        let (status, _) = broadcast::channel(capacity);
        let (alerts, _) = broadcast::channel(capacity);
        Self {
            detections,
            orders,
            status,
            alerts,
        }
    }

    /// Publish `event` to the given [`Topic`] channel.
    ///
    /// Returns the number of active receivers that were handed the event.
    ///
    /// # Errors
    ///
    /// Returns [`WorkcellError::Channel`] when no subscriber is currently
    /// listening on the topic.  Publishers that tolerate a missing consumer
    /// (e.g. status reporting) should ignore the error.
    pub fn publish_to(&self, topic: Topic, event: Event) -> Result<usize, WorkcellError> {
        self.topic_sender(topic).send(event).map_err(|_| {
            WorkcellError::Channel(format!("no subscribers for topic {topic:?}"))
        })
    }

    /// Subscribe to a specific [`Topic`] channel.
    pub fn subscribe_to(&self, topic: Topic) -> TopicReceiver {
        TopicReceiver {
            topic,
            receiver: self.topic_sender(topic).subscribe(),
        }
    }

    fn topic_sender(&self, topic: Topic) -> &broadcast::Sender<Event> {
        match topic {
            Topic::Detections => &self.detections,
            Topic::Orders => &self.orders,
            Topic::Status => &self.status,
            Topic::Alerts => &self.alerts,
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Topic-based receiver
// ---------------------------------------------------------------------------

/// An async receiver bound to a single [`Topic`] channel.
///
/// Obtained via [`EventBus::subscribe_to`].
pub struct TopicReceiver {
    topic: Topic,
    receiver: broadcast::Receiver<Event>,
}

impl TopicReceiver {
    /// Wait for the next event on this topic.
    ///
    /// Returns:
    /// * `Ok(event)` – a successfully received event.
    /// * `Err(broadcast::error::RecvError::Lagged(n))` – the subscriber fell
    ///   behind and `n` messages were dropped.  The caller decides whether to
    ///   continue or abort.
    /// * `Err(broadcast::error::RecvError::Closed)` – the bus has shut down.
    pub async fn recv(&mut self) -> Result<Event, broadcast::error::RecvError> {
        self.receiver.recv().await
    }

    /// Non-blocking receive for drain-style consumers that poll the bus
    /// between dispatches.
    pub fn try_recv(&mut self) -> Result<Event, broadcast::error::TryRecvError> {
        self.receiver.try_recv()
    }

    /// The [`Topic`] this receiver is bound to.
    pub fn topic(&self) -> Topic {
        self.topic
    }
}
