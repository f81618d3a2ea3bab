//! Service startup logging for the VIP gift orchestrator

use std::env;
use tracing::info;

use crate::Settings;

/// Logs service and environment information at startup
pub fn log_service_info() {
	let service_name = "vip-gift";
	let service_version = env!("CARGO_PKG_VERSION");

	info!("=== VIP Gift Order Orchestrator Starting ===");
	info!("🚀 Service: {} v{}", service_name, service_version);
	info!("💻 Platform: {}", env::consts::OS);
	info!("🏗️ Architecture: {}", env::consts::ARCH);

	if let Ok(cwd) = env::current_dir() {
		info!("📁 Working Directory: {}", cwd.display());
	}

	if let Ok(rust_log) = env::var("RUST_LOG") {
		info!("🔧 Log Level: {}", rust_log);
	}

	info!(
		"🕒 Started at: {}",
		chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
	);
}

/// Logs the effective pipeline configuration, without secrets
pub fn log_pipeline_settings(settings: &Settings) {
	info!(
		"📨 Topics: create='{}' update='{}' group='{}'",
		settings.queue.create_topic, settings.queue.update_topic, settings.queue.group_id
	);
	info!(
		"⏱️ Reconciliation delays: {:?}s (queue capacity {})",
		settings.scheduler.query_delays_secs, settings.scheduler.queue_capacity
	);
	info!(
		"🔔 Upstream webhook: {} (retries {})",
		settings.notifier.url, settings.notifier.max_retries
	);
	info!("🔑 Token key from {}", settings.security.jwt_secret.description());
}

/// Logs service shutdown information
pub fn log_service_shutdown() {
	info!("🛑 VIP Gift Order Orchestrator Shutting Down");
	info!(
		"🕒 Shutdown at: {}",
		chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
	);
}

/// Logs startup completion
pub fn log_startup_complete(bind_address: &str) {
	info!("✅ VIP Gift Order Orchestrator Started Successfully");
	info!("🌐 Server listening on: {}", bind_address);
}
