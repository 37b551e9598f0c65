//! Pipeline-owned state: staging buffer, duplicate filter, and queues.
//!
//! These structures are owned exclusively by one pipeline instance and are
//! never shared outside its handlers.

mod dedup;
mod queue;
mod staging;

pub use dedup::DuplicateFilter;
pub use queue::{DeliveryQueue, HoldbackQueue};
pub use staging::StagingBuffer;
