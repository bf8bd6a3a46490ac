//! `kitcell-orders` – Order Intake & Registry.
//!
//! Parses raw order descriptions from the upstream order feed into canonical
//! [`Order`][kitcell_types::Order] entities and queues them for the
//! fulfillment loop.
//!
//! # Modules
//!
//! - [`raw`] – serde model of the raw order JSON plus structural validation;
//!   a missing required field rejects that order with
//!   [`WorkcellError::MalformedOrder`][kitcell_types::WorkcellError::MalformedOrder]
//!   and leaves every other order untouched.
//! - [`registry`] – [`OrderRegistry`][registry::OrderRegistry]: arrival-order
//!   queue with priority-then-FIFO pending selection and shipment completion
//!   marking (written only by the shipment tracker).

pub mod raw;
pub mod registry;

pub use raw::parse_order;
pub use registry::OrderRegistry;
