//! VIP Gift Order Orchestrator
//!
//! Accepts gift and top-up orders, places them with the partner that serves
//! them, reconciles their outcome on a delay schedule and reports the final
//! status upstream.

// Core domain types
pub use gift_types::{
	chrono,
	serde_json,
	AdapterError,
	Order,
	OrderCreateRequest,
	OrderMessage,
	OrderStatus,
	OrderUpdateMessage,
	PartnerAdapter,
	PartnerMarker,
	SecretString,
};

// Service layer
pub use gift_service::{
	CatalogCache, OrderConsumer, OrderService, OrderServiceError, PendingOrderSweeper,
	QueryScheduler, TokenIssuer, UpstreamNotifier,
};

// Storage and queue
pub use gift_queue::MemoryBroker;
pub use gift_storage::{MemoryStore, OrderStorage};

// API layer
pub use gift_api::{create_router, AppState};

// Adapters
pub use gift_adapters::{AdapterRegistry, ChargeAdapter, GiftAdapter};

// Config
pub use gift_config::{load_config, log_service_info, log_startup_complete, Settings};

pub mod service {
	pub use gift_service::*;
}

pub mod config {
	pub use gift_config::*;
}

pub mod adapters {
	pub use gift_adapters::*;
}

use gift_adapters::{ChargeEndpoints, GiftEndpoints};
use gift_config::{log_pipeline_settings, log_service_shutdown};
use gift_service::{
	ConsumerTopics, HttpUpstreamNotifier, NotifyRetryPolicy, OrderTopics,
	QuerySchedulerConfig, SnowflakeIdGenerator,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

// Re-export external dependencies for tests and embedders
pub use async_trait;
pub use reqwest;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Builder wiring the whole pipeline from settings
///
/// Storage, broker, notifier and extra adapters can be injected; everything
/// else is built from [`Settings`].
#[derive(Default)]
pub struct GiftOrchestratorBuilder {
	settings: Option<Settings>,
	storage: Option<Arc<dyn OrderStorage>>,
	broker: Option<MemoryBroker>,
	notifier: Option<Arc<dyn UpstreamNotifier>>,
	adapters: Vec<Arc<dyn PartnerAdapter>>,
}

/// A running orchestrator
///
/// Consumer loops, the reconciliation dispatcher and the sweeper run until
/// [`GiftOrchestrator::shutdown`] is called.
pub struct GiftOrchestrator {
	pub router: axum::Router,
	pub state: AppState,
	pub settings: Settings,
	pub storage: Arc<dyn OrderStorage>,
	pub broker: MemoryBroker,
	pub scheduler: Arc<QueryScheduler>,
	shutdown: watch::Sender<bool>,
	tasks: Vec<JoinHandle<()>>,
}

impl GiftOrchestratorBuilder {
	pub fn new() -> Self {
		Self::default()
	}

	/// Create a builder from configuration
	pub fn from_config(settings: Settings) -> Self {
		Self::new().with_settings(settings)
	}

	pub fn with_settings(mut self, settings: Settings) -> Self {
		self.settings = Some(settings);
		self
	}

	pub fn settings(&self) -> Option<&Settings> {
		self.settings.as_ref()
	}

	pub fn with_storage(mut self, storage: Arc<dyn OrderStorage>) -> Self {
		self.storage = Some(storage);
		self
	}

	pub fn with_broker(mut self, broker: MemoryBroker) -> Self {
		self.broker = Some(broker);
		self
	}

	/// Replace the HTTP webhook notifier
	pub fn with_notifier(mut self, notifier: Arc<dyn UpstreamNotifier>) -> Self {
		self.notifier = Some(notifier);
		self
	}

	/// Register an adapter; it takes precedence over the built-in adapter
	/// for the same marker
	pub fn with_adapter(mut self, adapter: Arc<dyn PartnerAdapter>) -> Self {
		self.adapters.push(adapter);
		self
	}

	/// Initialize tracing with configuration-based settings
	///
	/// `RUST_LOG` overrides the configured level. Returns an error when a
	/// global subscriber is already installed.
	pub fn init_tracing_from_settings(settings: &Settings) -> Result<(), BoxError> {
		use gift_config::LogFormat;

		let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
			.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&settings.logging.level));
		let structured = settings.logging.structured;

		match settings.logging.format {
			LogFormat::Json => tracing_subscriber::fmt()
				.json()
				.with_env_filter(env_filter)
				.with_target(structured)
				.with_thread_ids(structured)
				.try_init()?,
			LogFormat::Pretty => tracing_subscriber::fmt()
				.pretty()
				.with_env_filter(env_filter)
				.with_target(structured)
				.with_thread_ids(structured)
				.try_init()?,
			LogFormat::Compact => tracing_subscriber::fmt()
				.compact()
				.with_env_filter(env_filter)
				.with_target(structured)
				.with_thread_ids(structured)
				.try_init()?,
		}

		info!(
			"Logging configuration applied: level={}, format={:?}, structured={}",
			settings.logging.level, settings.logging.format, settings.logging.structured
		);
		Ok(())
	}

	async fn build_registry(
		adapters: Vec<Arc<dyn PartnerAdapter>>,
		settings: &Settings,
	) -> Result<AdapterRegistry, BoxError> {
		let mut registry = AdapterRegistry::new();
		for adapter in adapters {
			registry.register(adapter)?;
		}

		if registry.get(&PartnerMarker::gift()).is_none() {
			let catalog = CatalogCache::from_products(settings.catalog.products.clone()).await?;
			let gift = GiftAdapter::new(
				GiftEndpoints {
					create_url: settings.partners.gift.create_url.clone(),
					query_url: settings.partners.gift.query_url.clone(),
					sms_url: settings.partners.gift.sms_url.clone(),
				},
				Arc::new(catalog),
				settings.partner_timeout(),
			)?;
			registry.register(Arc::new(gift))?;
		}
		if registry.get(&PartnerMarker::charge()).is_none() {
			let charge = ChargeAdapter::new(
				ChargeEndpoints {
					create_url: settings.partners.charge.create_url.clone(),
					query_url: settings.partners.charge.query_url.clone(),
					product_url: settings.partners.charge.product_url.clone(),
				},
				settings.partner_timeout(),
			)?;
			registry.register(Arc::new(charge))?;
		}
		Ok(registry)
	}

	/// Wire every component and start the background loops
	pub async fn start(self) -> Result<GiftOrchestrator, BoxError> {
		let settings = self.settings.unwrap_or_default();
		settings.validate()?;

		let storage = self
			.storage
			.unwrap_or_else(|| Arc::new(MemoryStore::new()) as Arc<dyn OrderStorage>);
		let broker = self.broker.unwrap_or_default();
		let registry = Arc::new(Self::build_registry(self.adapters, &settings).await?);
		info!(
			"Partner adapters registered: {:?}",
			registry
				.markers()
				.iter()
				.map(|m| m.to_string())
				.collect::<Vec<_>>()
		);

		let jwt_secret = settings.get_jwt_secret_secure().map_err(|e| {
			format!(
				"Failed to resolve token signing key: {}. Set JWT_SECRET_KEY or security.jwt_secret.",
				e
			)
		})?;
		let tokens = Arc::new(TokenIssuer::new(
			jwt_secret,
			Duration::from_secs(settings.security.token_ttl_secs),
			settings.security.token_subject.clone(),
		));

		let notifier = match self.notifier {
			Some(notifier) => notifier,
			None => Arc::new(HttpUpstreamNotifier::new(
				settings.notifier.url.clone(),
				Duration::from_millis(settings.notifier.timeout_ms),
				tokens.clone(),
			)?) as Arc<dyn UpstreamNotifier>,
		};

		let scheduler = QueryScheduler::start(
			storage.clone(),
			registry.clone(),
			notifier,
			QuerySchedulerConfig {
				capacity: settings.scheduler.queue_capacity,
				query_timeout: Duration::from_millis(settings.scheduler.query_timeout_ms),
				notify_retry: NotifyRetryPolicy {
					max_retries: settings.notifier.max_retries,
					backoff: settings
						.notifier
						.retry_backoff_secs
						.iter()
						.map(|s| Duration::from_secs(*s))
						.collect(),
				},
			},
		);

		let order_service = Arc::new(OrderService::new(
			storage.clone(),
			registry.clone(),
			Arc::new(broker.clone()),
			Arc::new(SnowflakeIdGenerator::new(settings.id_generator.node_id)?),
			OrderTopics {
				create_topic: settings.queue.create_topic.clone(),
				update_topic: settings.queue.update_topic.clone(),
			},
		)
		.with_scheduler(scheduler.clone()));

		let consumer = Arc::new(OrderConsumer::new(
			storage.clone(),
			registry.clone(),
			scheduler.clone(),
			settings.query_delays(),
		));
		let mut tasks = consumer.spawn(
			&broker,
			&ConsumerTopics {
				create_topic: settings.queue.create_topic.clone(),
				update_topic: settings.queue.update_topic.clone(),
				group_id: settings.queue.group_id.clone(),
			},
		)?;

		let (shutdown, shutdown_rx) = watch::channel(false);
		let sweep = &settings.scheduler.sweep;
		if sweep.enabled {
			let sweeper = Arc::new(PendingOrderSweeper::new(
				storage.clone(),
				scheduler.clone(),
				Duration::from_secs(sweep.interval_secs),
				Duration::from_secs(sweep.stale_after_secs),
			));
			tasks.push(sweeper.spawn(shutdown_rx));
		}

		let state = AppState {
			order_service,
			tokens,
			privileged_caller: settings.security.privileged_caller.clone(),
		};
		let router = create_router(state.clone(), settings.server.body_limit_bytes);

		Ok(GiftOrchestrator {
			router,
			state,
			settings,
			storage,
			broker,
			scheduler,
			shutdown,
			tasks,
		})
	}

	/// Start the complete server with all defaults and setup
	///
	/// Loads `.env` and configuration, initializes tracing, serves the API
	/// until Ctrl-C, then stops the pipeline.
	pub async fn start_server(mut self) -> Result<(), BoxError> {
		dotenvy::dotenv().ok();

		let settings = match self.settings.take() {
			Some(settings) => settings,
			None => load_config()?,
		};
		Self::init_tracing_from_settings(&settings)?;
		log_service_info();
		log_pipeline_settings(&settings);

		let bind_addr = settings.bind_address();
		let addr: SocketAddr = bind_addr
			.parse()
			.map_err(|e| format!("Invalid bind address '{}': {}", bind_addr, e))?;

		let orchestrator = self.with_settings(settings).start().await?;
		let listener = tokio::net::TcpListener::bind(addr).await?;

		log_startup_complete(&bind_addr);
		info!("API endpoints available:");
		info!("  GET  /health");
		for route in [
			"create",
			"one",
			"list",
			"query",
			"update_status",
			"sms",
		] {
			info!("  POST {}/orders/{}", gift_api::router::API_PREFIX, route);
		}

		axum::serve(listener, orchestrator.router.clone())
			.with_graceful_shutdown(async {
				if let Err(e) = tokio::signal::ctrl_c().await {
					warn!("Failed to listen for shutdown signal: {}", e);
				}
			})
			.await?;

		orchestrator.shutdown().await;
		log_service_shutdown();
		Ok(())
	}
}

impl GiftOrchestrator {
	/// Stop intake, the consumer loops and the sweeper
	///
	/// Reconciliation tasks already sleeping are not awaited.
	pub async fn shutdown(self) {
		self.broker.close();
		let _ = self.shutdown.send(true);
		self.scheduler.stop().await;
		for task in self.tasks {
			if let Err(e) = task.await {
				warn!("Background task ended abnormally: {}", e);
			}
		}
	}
}
