//! VIP Gift Orchestrator Server
//!
//! Main entry point for the order orchestrator server

use vip_gift::GiftOrchestratorBuilder;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
	GiftOrchestratorBuilder::new().start_server().await
}
