//! Memory broker (same-process topics)
//!
//! Each topic is an append-only `Vec` of messages plus a `watch` channel
//! carrying its length, which readers await for new messages. Consumer
//! groups only store a committed offset; a reader opened for a group
//! starts there, so anything fetched but not committed is delivered again.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use gift_types::{
	MessagePublisher, QueueError, QueueMessage, QueueResult, TopicReader, TopicSubscriber,
};
use std::sync::{
	atomic::{AtomicBool, Ordering},
	Arc,
};
use tokio::sync::{watch, RwLock};
use tracing::debug;

const TRACING_TARGET: &str = "vip_gift::queue";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LogState {
	len: u64,
	closed: bool,
}

struct TopicLog {
	name: String,
	messages: RwLock<Vec<QueueMessage>>,
	state: watch::Sender<LogState>,
	committed: DashMap<String, u64>,
}

impl TopicLog {
	fn new(name: &str, closed: bool) -> Self {
		let (state, _) = watch::channel(LogState { len: 0, closed });
		Self {
			name: name.to_string(),
			messages: RwLock::new(Vec::new()),
			state,
			committed: DashMap::new(),
		}
	}

	fn is_closed(&self) -> bool {
		self.state.borrow().closed
	}
}

/// In-process broker shared by publishers and readers
#[derive(Clone, Default)]
pub struct MemoryBroker {
	topics: Arc<DashMap<String, Arc<TopicLog>>>,
	closed: Arc<AtomicBool>,
}

impl MemoryBroker {
	pub fn new() -> Self {
		Self::default()
	}

	fn topic_log(&self, topic: &str) -> Arc<TopicLog> {
		self.topics
			.entry(topic.to_string())
			.or_insert_with(|| Arc::new(TopicLog::new(topic, self.closed.load(Ordering::SeqCst))))
			.clone()
	}

	/// Number of messages ever published to a topic
	pub fn topic_len(&self, topic: &str) -> u64 {
		match self.topics.get(topic) {
			Some(log) => log.state.borrow().len,
			None => 0,
		}
	}

	/// Offset the group will resume from
	pub fn committed_offset(&self, topic: &str, group_id: &str) -> u64 {
		self.topics
			.get(topic)
			.and_then(|log| log.committed.get(group_id).map(|o| *o))
			.unwrap_or(0)
	}

	/// Close every topic: publishes fail and waiting readers return `Closed`
	pub fn close(&self) {
		self.closed.store(true, Ordering::SeqCst);
		for entry in self.topics.iter() {
			entry.value().state.send_modify(|state| state.closed = true);
		}
		debug!(target: TRACING_TARGET, "Memory broker closed");
	}
}

#[async_trait]
impl MessagePublisher for MemoryBroker {
	async fn publish(&self, topic: &str, key: &str, payload: Vec<u8>) -> QueueResult<u64> {
		let log = self.topic_log(topic);
		if log.is_closed() {
			return Err(QueueError::Closed);
		}

		let mut messages = log.messages.write().await;
		let offset = messages.len() as u64;
		messages.push(QueueMessage {
			topic: topic.to_string(),
			key: key.to_string(),
			payload,
			offset,
			published_at: Utc::now(),
		});
		log.state.send_modify(|state| state.len = offset + 1);

		debug!(
			target: TRACING_TARGET,
			topic = %topic,
			key = %key,
			offset,
			"Published message"
		);
		Ok(offset)
	}
}

impl TopicSubscriber for MemoryBroker {
	fn subscribe(&self, topic: &str, group_id: &str) -> QueueResult<Box<dyn TopicReader>> {
		let log = self.topic_log(topic);
		let position = log.committed.get(group_id).map(|o| *o).unwrap_or(0);
		let state = log.state.subscribe();
		Ok(Box::new(MemoryTopicReader {
			log,
			group_id: group_id.to_string(),
			position,
			state,
		}))
	}
}

/// Reader for one consumer group on one topic
pub struct MemoryTopicReader {
	log: Arc<TopicLog>,
	group_id: String,
	position: u64,
	state: watch::Receiver<LogState>,
}

#[async_trait]
impl TopicReader for MemoryTopicReader {
	fn topic(&self) -> &str {
		&self.log.name
	}

	async fn fetch(&mut self) -> QueueResult<QueueMessage> {
		loop {
			let state = *self.state.borrow_and_update();
			if state.closed {
				return Err(QueueError::Closed);
			}
			if self.position < state.len {
				let messages = self.log.messages.read().await;
				if let Some(message) = messages.get(self.position as usize) {
					self.position += 1;
					return Ok(message.clone());
				}
			}
			self.state
				.changed()
				.await
				.map_err(|_| QueueError::Closed)?;
		}
	}

	async fn commit(&mut self, message: &QueueMessage) -> QueueResult<()> {
		if message.topic != self.log.name {
			return Err(QueueError::UnknownTopic {
				topic: message.topic.clone(),
			});
		}
		let next = message.offset + 1;
		if next > self.log.state.borrow().len {
			return Err(QueueError::InvalidOffset {
				topic: message.topic.clone(),
				offset: message.offset,
			});
		}
		self.log
			.committed
			.entry(self.group_id.clone())
			.and_modify(|committed| *committed = (*committed).max(next))
			.or_insert(next);
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::time::Duration;

	#[tokio::test]
	async fn test_fetch_returns_messages_in_order() {
		let broker = MemoryBroker::new();
		broker.publish("orders", "a", b"1".to_vec()).await.unwrap();
		broker.publish("orders", "b", b"2".to_vec()).await.unwrap();

		let mut reader = broker.subscribe("orders", "group").unwrap();
		let first = reader.fetch().await.unwrap();
		let second = reader.fetch().await.unwrap();
		assert_eq!((first.offset, first.key.as_str()), (0, "a"));
		assert_eq!((second.offset, second.payload.as_slice()), (1, b"2".as_slice()));
	}

	#[tokio::test]
	async fn test_uncommitted_message_is_redelivered_to_new_reader() {
		let broker = MemoryBroker::new();
		broker.publish("orders", "a", b"1".to_vec()).await.unwrap();
		broker.publish("orders", "b", b"2".to_vec()).await.unwrap();

		let mut reader = broker.subscribe("orders", "group").unwrap();
		let first = reader.fetch().await.unwrap();
		reader.commit(&first).await.unwrap();
		let _second = reader.fetch().await.unwrap();
		drop(reader);

		let mut restarted = broker.subscribe("orders", "group").unwrap();
		let redelivered = restarted.fetch().await.unwrap();
		assert_eq!(redelivered.offset, 1);
		assert_eq!(broker.committed_offset("orders", "group"), 1);
	}

	#[tokio::test]
	async fn test_groups_track_offsets_independently() {
		let broker = MemoryBroker::new();
		broker.publish("orders", "a", vec![]).await.unwrap();

		let mut one = broker.subscribe("orders", "one").unwrap();
		let message = one.fetch().await.unwrap();
		one.commit(&message).await.unwrap();

		let mut two = broker.subscribe("orders", "two").unwrap();
		assert_eq!(two.fetch().await.unwrap().offset, 0);
		assert_eq!(broker.committed_offset("orders", "two"), 0);
	}

	#[tokio::test]
	async fn test_fetch_waits_for_publish() {
		let broker = MemoryBroker::new();
		let mut reader = broker.subscribe("orders", "group").unwrap();

		let publisher = broker.clone();
		tokio::spawn(async move {
			tokio::time::sleep(Duration::from_millis(20)).await;
			publisher.publish("orders", "late", vec![]).await.unwrap();
		});

		let message = tokio::time::timeout(Duration::from_secs(2), reader.fetch())
			.await
			.expect("fetch should wake on publish")
			.unwrap();
		assert_eq!(message.key, "late");
	}

	#[tokio::test]
	async fn test_close_wakes_waiting_reader() {
		let broker = MemoryBroker::new();
		let mut reader = broker.subscribe("orders", "group").unwrap();

		let closer = broker.clone();
		tokio::spawn(async move {
			tokio::time::sleep(Duration::from_millis(20)).await;
			closer.close();
		});

		let result = tokio::time::timeout(Duration::from_secs(2), reader.fetch())
			.await
			.expect("fetch should wake on close");
		assert!(matches!(result, Err(QueueError::Closed)));
		assert!(matches!(
			broker.publish("orders", "x", vec![]).await,
			Err(QueueError::Closed)
		));
	}

	#[tokio::test]
	async fn test_commit_never_moves_backwards() {
		let broker = MemoryBroker::new();
		for key in ["a", "b", "c"] {
			broker.publish("orders", key, vec![]).await.unwrap();
		}
		let mut reader = broker.subscribe("orders", "group").unwrap();
		let a = reader.fetch().await.unwrap();
		let _b = reader.fetch().await.unwrap();
		let c = reader.fetch().await.unwrap();

		reader.commit(&c).await.unwrap();
		reader.commit(&a).await.unwrap();
		assert_eq!(broker.committed_offset("orders", "group"), 3);
	}
}
