//! Gift Service
//!
//! Order intake, queue consumption, partner reconciliation and upstream
//! notification.

pub mod catalog;
pub mod consumer;
pub mod id_generator;
pub mod notifier;
pub mod order;
pub mod scheduler;
pub mod sweeper;
pub mod token;

pub use catalog::CatalogCache;
pub use consumer::{ConsumeOutcome, ConsumerTopics, OrderConsumer};
pub use id_generator::{IdGenerator, IdGeneratorError, SnowflakeIdGenerator};
pub use notifier::{
	notify_with_retry, HttpUpstreamNotifier, NotificationPayload, NotifierError,
	NotifyRetryPolicy, UpstreamNotifier,
};
pub use order::{OrderService, OrderServiceError, OrderStatusView, OrderTopics};
pub use scheduler::{
	QueryOutcome, QueryScheduler, QuerySchedulerConfig, QueryTask, SchedulerError,
};
pub use sweeper::PendingOrderSweeper;
pub use token::{Claims, TokenError, TokenIssuer};
