//! Product catalog lookup contract
//!
//! The catalog itself is managed elsewhere; the orchestrator only needs
//! the partner base codes and the commission rate of a product.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Catalog entry as needed for order translation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogProduct {
	pub public_code: String,
	/// Partner side product codes, first one preferred
	#[serde(default)]
	pub base_codes: Vec<String>,
	/// Commission rate with instant payout rule
	#[serde(default, rename = "commissionMF")]
	pub commission_mf: Decimal,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CatalogError {
	#[error("Product not found: {public_code}")]
	NotFound { public_code: String },
	#[error("Invalid product {public_code}: {reason}")]
	Invalid { public_code: String, reason: String },
}

/// Read access to the product catalog
#[async_trait]
pub trait CatalogLookup: Send + Sync {
	async fn get_product(&self, public_code: &str) -> Result<CatalogProduct, CatalogError>;

	/// Partner base codes of a product
	async fn base_codes(&self, public_code: &str) -> Result<Vec<String>, CatalogError> {
		Ok(self.get_product(public_code).await?.base_codes)
	}
}
