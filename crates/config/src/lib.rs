//! Gift Configuration
//!
//! Configuration management and startup utilities for the VIP gift order orchestrator.

pub mod configurable_value;
pub mod loader;
pub mod settings;
pub mod startup_logger;

pub use configurable_value::{ConfigurableValue, ConfigurableValueError, ValueType};
pub use loader::{load_config, load_config_from, ConfigLoadError};
pub use settings::{
	CatalogSettings, ChargePartnerSettings, ConfigValidationError, GiftPartnerSettings,
	IdGeneratorSettings, LogFormat, LoggingSettings, NotifierSettings, PartnerSettings,
	QueueSettings, SchedulerSettings, SecuritySettings, ServerSettings, Settings, SweepSettings,
};
pub use startup_logger::{
	log_pipeline_settings, log_service_info, log_service_shutdown, log_startup_complete,
};
