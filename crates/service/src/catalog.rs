//! In-process product catalog cache

use async_trait::async_trait;
use gift_types::{CatalogError, CatalogLookup, CatalogProduct, Decimal};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::info;

const TRACING_TARGET: &str = "vip_gift::catalog";

/// Product code → partner base codes and commission rate
#[derive(Debug, Default)]
pub struct CatalogCache {
	products: RwLock<HashMap<String, CatalogProduct>>,
}

impl CatalogCache {
	pub fn new() -> Self {
		Self::default()
	}

	/// Build a cache from seed products, rejecting invalid entries
	pub async fn from_products(products: Vec<CatalogProduct>) -> Result<Self, CatalogError> {
		let cache = Self::new();
		cache.load(products).await?;
		Ok(cache)
	}

	/// Replace the whole catalog
	pub async fn load(&self, products: Vec<CatalogProduct>) -> Result<usize, CatalogError> {
		for product in &products {
			validate(product)?;
		}
		let loaded: HashMap<_, _> = products
			.into_iter()
			.map(|p| (p.public_code.clone(), p))
			.collect();
		let count = loaded.len();
		*self.products.write().await = loaded;

		info!(target: TRACING_TARGET, products = count, "Catalog loaded");
		Ok(count)
	}

	pub async fn upsert(&self, product: CatalogProduct) -> Result<(), CatalogError> {
		validate(&product)?;
		self.products
			.write()
			.await
			.insert(product.public_code.clone(), product);
		Ok(())
	}

	pub async fn remove(&self, public_code: &str) -> Option<CatalogProduct> {
		self.products.write().await.remove(public_code)
	}

	pub async fn len(&self) -> usize {
		self.products.read().await.len()
	}

	pub async fn is_empty(&self) -> bool {
		self.products.read().await.is_empty()
	}
}

fn validate(product: &CatalogProduct) -> Result<(), CatalogError> {
	if product.public_code.trim().is_empty() {
		return Err(CatalogError::Invalid {
			public_code: product.public_code.clone(),
			reason: "publicCode is empty".to_string(),
		});
	}
	if product.commission_mf < Decimal::ZERO {
		return Err(CatalogError::Invalid {
			public_code: product.public_code.clone(),
			reason: format!("negative commission rate {}", product.commission_mf),
		});
	}
	Ok(())
}

#[async_trait]
impl CatalogLookup for CatalogCache {
	async fn get_product(&self, public_code: &str) -> Result<CatalogProduct, CatalogError> {
		self.products
			.read()
			.await
			.get(public_code)
			.cloned()
			.ok_or_else(|| CatalogError::NotFound {
				public_code: public_code.to_string(),
			})
	}
}
