//! `kitcell-middleware` – The Nervous System.
//!
//! Routes asynchronous data between sensors, the order feed, the fulfillment
//! engine, and external collaborators without caring what the data means.
//!
//! # Modules
//!
//! - [`bus`] – Headless, typed, topic-based publish/subscribe event bus built
//!   on Tokio broadcast channels.
//! - [`clients`] – The collaborator seams: [`ActuationClient`][clients::ActuationClient]
//!   executes pick-and-place directives, [`SubmissionClient`][clients::SubmissionClient]
//!   submits completed shipments.  The engine only ever talks to these traits,
//!   so real transports can be swapped without touching matching logic.
//! - [`sim`] – In-process simulation implementations of both clients plus a
//!   scripted sensor feed, used by tests and the demo binary.

pub mod bus;
pub mod clients;
pub mod sim;

pub use bus::{EventBus, Topic, TopicReceiver};
pub use clients::{ActuationClient, PickPlaceDirective, SubmissionClient};
pub use sim::{SimActuationClient, SimSensorFeed, SimSubmissionClient};
