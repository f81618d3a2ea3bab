//! Gift Queue
//!
//! In-process implementation of the durable order topics: an append-only
//! log per topic with consumer-group committed offsets.

pub mod memory_broker;

pub use gift_types::{
	MessagePublisher, QueueError, QueueMessage, QueueResult, TopicReader, TopicSubscriber,
};
pub use memory_broker::{MemoryBroker, MemoryTopicReader};
