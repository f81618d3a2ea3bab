//! Configuration settings structures

use crate::{configurable_value::ConfigurableValue, ConfigurableValueError};
use gift_types::{CatalogProduct, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Main application settings
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Settings {
	pub server: ServerSettings,
	pub queue: QueueSettings,
	pub partners: PartnerSettings,
	pub scheduler: SchedulerSettings,
	pub notifier: NotifierSettings,
	pub security: SecuritySettings,
	pub id_generator: IdGeneratorSettings,
	pub catalog: CatalogSettings,
	pub logging: LoggingSettings,
}

/// Server configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ServerSettings {
	pub host: String,
	pub port: u16,
	/// Maximum accepted request body in bytes
	pub body_limit_bytes: usize,
}

/// Durable queue topics and consumer group
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct QueueSettings {
	pub create_topic: String,
	pub update_topic: String,
	pub group_id: String,
}

/// Partner endpoints
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct PartnerSettings {
	pub gift: GiftPartnerSettings,
	pub charge: ChargePartnerSettings,
	/// Timeout applied to every partner HTTP call
	pub request_timeout_ms: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct GiftPartnerSettings {
	pub create_url: String,
	pub query_url: String,
	/// SMS endpoint; the capability is disabled when unset
	pub sms_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ChargePartnerSettings {
	pub create_url: String,
	pub query_url: String,
	/// Product search endpoint used for commission lookup
	pub product_url: String,
}

/// Reconciliation scheduling
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct SchedulerSettings {
	/// Capacity of the task queue; producers wait when it is full
	pub queue_capacity: usize,
	/// Delays of the reconciliation attempts scheduled after a create
	pub query_delays_secs: Vec<u64>,
	pub query_timeout_ms: u64,
	pub sweep: SweepSettings,
}

/// Recurring sweep over orders stuck in init or pending
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct SweepSettings {
	pub enabled: bool,
	pub interval_secs: u64,
	/// Orders untouched for this long are re-queried
	pub stale_after_secs: u64,
}

/// Upstream webhook
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct NotifierSettings {
	pub url: String,
	pub timeout_ms: u64,
	/// Retries after the first failed delivery; 0 disables retrying
	pub max_retries: u32,
	/// Delay before each retry, the last entry repeats
	pub retry_backoff_secs: Vec<u64>,
}

/// Security configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct SecuritySettings {
	/// HS256 key for issued and verified tokens
	///
	/// Example configurations:
	/// - Environment variable: `{"type": "env", "value": "JWT_SECRET_KEY"}`
	/// - Plain value: `{"type": "plain", "value": "your-secret-here"}`
	pub jwt_secret: ConfigurableValue,
	pub token_ttl_secs: u64,
	/// `userSn` asserted on outgoing webhook tokens
	pub token_subject: String,
	/// `userSn` allowed to publish administrative order updates
	pub privileged_caller: String,
}

/// Snowflake node identity
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct IdGeneratorSettings {
	pub node_id: u16,
}

/// Catalog entries preloaded into the catalog cache
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct CatalogSettings {
	pub products: Vec<CatalogProduct>,
}

/// Logging configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingSettings {
	pub level: String,
	pub format: LogFormat,
	pub structured: bool,
}

/// Log format options
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
	Json,
	Pretty,
	Compact,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigValidationError {
	#[error("scheduler.query_delays_secs must not be empty")]
	EmptyDelaySchedule,
	#[error("scheduler.queue_capacity must be greater than zero")]
	ZeroQueueCapacity,
	#[error("id_generator.node_id must be within 0..=1023, got {0}")]
	NodeIdOutOfRange(u16),
	#[error("queue topics must be non-empty and distinct")]
	InvalidTopics,
	#[error("notifier.retry_backoff_secs must not be empty when retries are enabled")]
	EmptyRetryBackoff,
}

impl Default for ServerSettings {
	fn default() -> Self {
		Self {
			host: "0.0.0.0".to_string(),
			port: 3001,
			body_limit_bytes: 1024 * 1024,
		}
	}
}

impl Default for QueueSettings {
	fn default() -> Self {
		Self {
			create_topic: "vip-order-create".to_string(),
			update_topic: "order-update".to_string(),
			group_id: "vip-gift-order-consumer".to_string(),
		}
	}
}

impl Default for PartnerSettings {
	fn default() -> Self {
		Self {
			gift: GiftPartnerSettings::default(),
			charge: ChargePartnerSettings::default(),
			request_timeout_ms: 5000,
		}
	}
}

impl Default for GiftPartnerSettings {
	fn default() -> Self {
		Self {
			create_url: "https://api0.10000hk.com/api/product/gift/customer/orders/create"
				.to_string(),
			query_url: "https://api0.10000hk.com/api/product/gift/orders/query".to_string(),
			sms_url: None,
		}
	}
}

impl Default for ChargePartnerSettings {
	fn default() -> Self {
		Self {
			create_url: "https://gift.10000hk.com/api/charge/order/recharge".to_string(),
			query_url: "https://gift.10000hk.com/api/charge/order/query".to_string(),
			product_url: "https://gift.10000hk.com/api/charge/product/list".to_string(),
		}
	}
}

impl Default for SchedulerSettings {
	fn default() -> Self {
		Self {
			queue_capacity: 1024,
			query_delays_secs: vec![3, 7, 13, 31, 61, 121],
			query_timeout_ms: 5000,
			sweep: SweepSettings::default(),
		}
	}
}

impl Default for SweepSettings {
	fn default() -> Self {
		Self {
			enabled: true,
			interval_secs: 300,
			stale_after_secs: 600,
		}
	}
}

impl Default for NotifierSettings {
	fn default() -> Self {
		Self {
			url: "http://127.0.0.1:8080/api/order/notify".to_string(),
			timeout_ms: 5000,
			max_retries: 3,
			retry_backoff_secs: vec![2, 4, 8],
		}
	}
}

impl Default for SecuritySettings {
	fn default() -> Self {
		Self {
			jwt_secret: ConfigurableValue::from_env("JWT_SECRET_KEY"),
			token_ttl_secs: 300,
			token_subject: "VIP".to_string(),
			privileged_caller: "CRM".to_string(),
		}
	}
}

impl Default for IdGeneratorSettings {
	fn default() -> Self {
		Self { node_id: 1 }
	}
}

impl Default for LoggingSettings {
	fn default() -> Self {
		Self {
			level: "info".to_string(),
			format: LogFormat::Pretty,
			structured: false,
		}
	}
}

impl Settings {
	/// Get server bind address
	pub fn bind_address(&self) -> String {
		format!("{}:{}", self.server.host, self.server.port)
	}

	/// Check the settings the runtime cannot work without
	pub fn validate(&self) -> Result<(), ConfigValidationError> {
		if self.scheduler.query_delays_secs.is_empty() {
			return Err(ConfigValidationError::EmptyDelaySchedule);
		}
		if self.scheduler.queue_capacity == 0 {
			return Err(ConfigValidationError::ZeroQueueCapacity);
		}
		if self.id_generator.node_id > 1023 {
			return Err(ConfigValidationError::NodeIdOutOfRange(
				self.id_generator.node_id,
			));
		}
		if self.queue.create_topic.is_empty()
			|| self.queue.update_topic.is_empty()
			|| self.queue.create_topic == self.queue.update_topic
		{
			return Err(ConfigValidationError::InvalidTopics);
		}
		if self.notifier.max_retries > 0 && self.notifier.retry_backoff_secs.is_empty() {
			return Err(ConfigValidationError::EmptyRetryBackoff);
		}
		Ok(())
	}

	/// Get the token signing key for secure handling
	pub fn get_jwt_secret_secure(&self) -> Result<SecretString, ConfigurableValueError> {
		self.security.jwt_secret.resolve_for_secret()
	}

	pub fn partner_timeout(&self) -> Duration {
		Duration::from_millis(self.partners.request_timeout_ms)
	}

	pub fn query_delays(&self) -> Vec<Duration> {
		self.scheduler
			.query_delays_secs
			.iter()
			.map(|s| Duration::from_secs(*s))
			.collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_defaults_are_valid() {
		let settings = Settings::default();
		assert!(settings.validate().is_ok());
		assert_eq!(settings.bind_address(), "0.0.0.0:3001");
		assert_eq!(settings.queue.create_topic, "vip-order-create");
		assert_eq!(settings.security.privileged_caller, "CRM");
		assert_eq!(settings.query_delays().len(), 6);
	}

	#[test]
	fn test_validation_failures() {
		let mut settings = Settings::default();
		settings.scheduler.query_delays_secs.clear();
		assert_eq!(
			settings.validate(),
			Err(ConfigValidationError::EmptyDelaySchedule)
		);

		let mut settings = Settings::default();
		settings.id_generator.node_id = 2048;
		assert_eq!(
			settings.validate(),
			Err(ConfigValidationError::NodeIdOutOfRange(2048))
		);

		let mut settings = Settings::default();
		settings.queue.update_topic = settings.queue.create_topic.clone();
		assert_eq!(settings.validate(), Err(ConfigValidationError::InvalidTopics));

		let mut settings = Settings::default();
		settings.notifier.retry_backoff_secs.clear();
		assert_eq!(
			settings.validate(),
			Err(ConfigValidationError::EmptyRetryBackoff)
		);
		settings.notifier.max_retries = 0;
		assert!(settings.validate().is_ok());
	}

	#[test]
	fn test_partial_json_keeps_defaults() {
		let settings: Settings = serde_json::from_str(
			r#"{"server": {"port": 9000}, "catalog": {"products": [
				{"publicCode": "GIFT-1", "baseCodes": ["B-1"], "commissionMF": 10}
			]}}"#,
		)
		.unwrap();
		assert_eq!(settings.server.port, 9000);
		assert_eq!(settings.server.host, "0.0.0.0");
		assert_eq!(settings.catalog.products.len(), 1);
		assert_eq!(settings.catalog.products[0].base_codes, vec!["B-1"]);
	}
}
