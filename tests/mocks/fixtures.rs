//! Settings and helpers shared by the suites

use rust_decimal::Decimal;
use std::future::Future;
use std::time::Duration;
use vip_gift::config::ConfigurableValue;
use vip_gift::{Settings, TokenIssuer};

pub const TEST_SECRET: &str = "integration-test-secret";

/// Settings pointing every partner at local endpoints
///
/// The Charge partner points at a closed port. The reconciliation schedule
/// is one query after one second, the sweeper is off and notification
/// retries are immediate.
pub fn test_settings(gift_base: &str, upstream_url: &str) -> Settings {
	let mut settings = Settings::default();
	settings.partners.gift.create_url = format!("{}/create", gift_base);
	settings.partners.gift.query_url = format!("{}/query", gift_base);
	settings.partners.gift.sms_url = Some(format!("{}/sms", gift_base));
	settings.partners.charge.create_url = "http://127.0.0.1:9/create".to_string();
	settings.partners.charge.query_url = "http://127.0.0.1:9/query".to_string();
	settings.partners.charge.product_url = "http://127.0.0.1:9/product".to_string();
	settings.partners.request_timeout_ms = 2000;
	settings.scheduler.query_delays_secs = vec![1];
	settings.scheduler.query_timeout_ms = 2000;
	settings.scheduler.sweep.enabled = false;
	settings.notifier.url = upstream_url.to_string();
	settings.notifier.timeout_ms = 2000;
	settings.notifier.max_retries = 2;
	settings.notifier.retry_backoff_secs = vec![0];
	settings.security.jwt_secret = ConfigurableValue::from_plain(TEST_SECRET);
	settings.catalog.products = vec![gift_types::CatalogProduct {
		public_code: "P-100".to_string(),
		base_codes: vec!["B-100".to_string()],
		commission_mf: Decimal::new(10, 0),
	}];
	settings
}

/// `Authorization` header value for a caller
pub fn bearer(tokens: &TokenIssuer, user_sn: &str) -> String {
	format!("Bearer {}", tokens.issue_for(user_sn).unwrap())
}

/// Poll `check` every 25ms until it holds or `timeout` elapses
pub async fn wait_for<F, Fut>(timeout: Duration, mut check: F) -> bool
where
	F: FnMut() -> Fut,
	Fut: Future<Output = bool>,
{
	let deadline = tokio::time::Instant::now() + timeout;
	loop {
		if check().await {
			return true;
		}
		if tokio::time::Instant::now() >= deadline {
			return false;
		}
		tokio::time::sleep(Duration::from_millis(25)).await;
	}
}
