//! Short-lived HS256 tokens
//!
//! The same issuer signs the tokens attached to upstream notifications and
//! verifies the Bearer tokens presented to the HTTP API.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Utc;
use gift_types::SecretString;
use jsonwebtoken::{
	decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum TokenError {
	#[error("Failed to sign token: {0}")]
	Signing(String),
	#[error("Token expired")]
	Expired,
	#[error("Invalid token: {0}")]
	Invalid(String),
	#[error("Token is missing claim {claim}")]
	MissingClaim { claim: String },
}

/// Claims carried by every token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
	pub exp: i64,
	pub iat: i64,
	#[serde(default)]
	pub user_sn: String,
	#[serde(default)]
	pub jwt_hash: String,
}

pub struct TokenIssuer {
	secret: SecretString,
	ttl: Duration,
	subject: String,
}

impl std::fmt::Debug for TokenIssuer {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("TokenIssuer")
			.field("ttl", &self.ttl)
			.field("subject", &self.subject)
			.finish_non_exhaustive()
	}
}

impl TokenIssuer {
	pub fn new(secret: SecretString, ttl: Duration, subject: impl Into<String>) -> Self {
		Self {
			secret,
			ttl,
			subject: subject.into(),
		}
	}

	/// Identity this service asserts in its own tokens
	pub fn subject(&self) -> &str {
		&self.subject
	}

	/// Token asserting this service's own identity
	pub fn issue(&self) -> Result<String, TokenError> {
		self.issue_for(&self.subject)
	}

	pub fn issue_for(&self, user_sn: &str) -> Result<String, TokenError> {
		let iat = Utc::now().timestamp();
		let claims = Claims {
			exp: iat + self.ttl.as_secs() as i64,
			iat,
			user_sn: user_sn.to_string(),
			jwt_hash: random_hash(),
		};
		self.sign(&claims)
	}

	/// Sign arbitrary claims with the issuer secret
	pub fn sign(&self, claims: &Claims) -> Result<String, TokenError> {
		encode(
			&Header::default(),
			claims,
			&EncodingKey::from_secret(self.secret.as_bytes()),
		)
		.map_err(|e| TokenError::Signing(e.to_string()))
	}

	/// Verify signature and expiry, and require `userSn` and `jwtHash`
	pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
		let data = decode::<Claims>(
			token,
			&DecodingKey::from_secret(self.secret.as_bytes()),
			&Validation::default(),
		)
		.map_err(|e| match e.kind() {
			ErrorKind::ExpiredSignature => TokenError::Expired,
			_ => TokenError::Invalid(e.to_string()),
		})?;

		let claims = data.claims;
		if claims.user_sn.trim().is_empty() {
			return Err(TokenError::MissingClaim {
				claim: "userSn".to_string(),
			});
		}
		if claims.jwt_hash.trim().is_empty() {
			return Err(TokenError::MissingClaim {
				claim: "jwtHash".to_string(),
			});
		}
		Ok(claims)
	}
}

fn random_hash() -> String {
	STANDARD.encode(Sha256::digest(Uuid::new_v4().as_bytes()))
}
