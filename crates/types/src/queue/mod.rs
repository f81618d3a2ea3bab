//! Durable queue contracts
//!
//! At-least-once delivery with manual offset commit: a reader resumes from
//! the last offset its consumer group committed, so a message processed but
//! not committed is delivered again.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Queue error type
#[derive(Debug, Error)]
pub enum QueueError {
	#[error("Queue is closed")]
	Closed,
	#[error("Unknown topic: {topic}")]
	UnknownTopic { topic: String },
	#[error("Offset {offset} is beyond the end of topic {topic}")]
	InvalidOffset { topic: String, offset: u64 },
	#[error("Serialization error: {message}")]
	Serialization { message: String },
	#[error("Queue operation failed: {message}")]
	Operation { message: String },
}

pub type QueueResult<T> = Result<T, QueueError>;

/// A message read from a topic
#[derive(Debug, Clone, PartialEq)]
pub struct QueueMessage {
	pub topic: String,
	pub key: String,
	pub payload: Vec<u8>,
	pub offset: u64,
	pub published_at: DateTime<Utc>,
}

/// Producer side of the queue
#[async_trait]
pub trait MessagePublisher: Send + Sync {
	/// Append a keyed message to a topic and return its offset
	async fn publish(&self, topic: &str, key: &str, payload: Vec<u8>) -> QueueResult<u64>;
}

/// A consumer-group cursor over one topic
#[async_trait]
pub trait TopicReader: Send {
	/// Topic this reader is attached to
	fn topic(&self) -> &str;

	/// Wait for the next message; `QueueError::Closed` once the queue shuts down
	async fn fetch(&mut self) -> QueueResult<QueueMessage>;

	/// Commit the group offset past `message`
	async fn commit(&mut self, message: &QueueMessage) -> QueueResult<()>;
}

/// Factory for group readers
pub trait TopicSubscriber: Send + Sync {
	fn subscribe(&self, topic: &str, group_id: &str) -> QueueResult<Box<dyn TopicReader>>;
}
