//! Distributed order id generation
//!
//! Snowflake layout, most significant bit first: 41 bits of milliseconds
//! since [`EPOCH_MS`], 10 bits of node id, 12 bits of per-millisecond
//! sequence. Ids from one node are strictly increasing.

use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// 2024-01-01T00:00:00Z
pub const EPOCH_MS: u64 = 1_704_067_200_000;

const NODE_BITS: u64 = 10;
const SEQUENCE_BITS: u64 = 12;
pub const MAX_NODE_ID: u16 = (1 << NODE_BITS) - 1;
const MAX_SEQUENCE: u64 = (1 << SEQUENCE_BITS) - 1;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum IdGeneratorError {
	#[error("Node id {node_id} is out of range (max {max})")]
	NodeIdOutOfRange { node_id: u16, max: u16 },
}

/// Source of unique order ids
pub trait IdGenerator: Send + Sync {
	fn next_id(&self) -> String;
}

#[derive(Debug, Default)]
struct SnowflakeState {
	last_ms: u64,
	sequence: u64,
}

#[derive(Debug)]
pub struct SnowflakeIdGenerator {
	node_id: u64,
	state: Mutex<SnowflakeState>,
}

impl SnowflakeIdGenerator {
	pub fn new(node_id: u16) -> Result<Self, IdGeneratorError> {
		if node_id > MAX_NODE_ID {
			return Err(IdGeneratorError::NodeIdOutOfRange {
				node_id,
				max: MAX_NODE_ID,
			});
		}
		Ok(Self {
			node_id: node_id as u64,
			state: Mutex::new(SnowflakeState::default()),
		})
	}

	/// Next id in numeric form
	pub fn next_raw(&self) -> u64 {
		let now_ms = current_ms();
		let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

		// A clock that steps back, or a sequence exhausted within one
		// millisecond, both continue on the last timestamp's successor.
		if now_ms > state.last_ms {
			state.last_ms = now_ms;
			state.sequence = 0;
		} else if state.sequence < MAX_SEQUENCE {
			state.sequence += 1;
		} else {
			state.last_ms += 1;
			state.sequence = 0;
		}

		(state.last_ms.saturating_sub(EPOCH_MS) << (NODE_BITS + SEQUENCE_BITS))
			| (self.node_id << SEQUENCE_BITS)
			| state.sequence
	}

	/// Split an id into (milliseconds since epoch, node id, sequence)
	pub fn decompose(id: u64) -> (u64, u16, u16) {
		let sequence = id & MAX_SEQUENCE;
		let node = (id >> SEQUENCE_BITS) & MAX_NODE_ID as u64;
		let millis = id >> (NODE_BITS + SEQUENCE_BITS);
		(millis, node as u16, sequence as u16)
	}
}

impl IdGenerator for SnowflakeIdGenerator {
	fn next_id(&self) -> String {
		self.next_raw().to_string()
	}
}

fn current_ms() -> u64 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map(|d| d.as_millis() as u64)
		.unwrap_or(EPOCH_MS)
}
