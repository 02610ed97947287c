//! Resilient Netatmo weather-station API client.
//!
//! Credentials are persisted between runs and renewed through OAuth 2.0 refresh or password
//! grants. Rejected reads are reauthenticated once, and payloads are unwrapped from the
//! vendor's `{"body": ...}` envelope into caller types.
//!
//! The crate is the data-acquisition layer of a metrics exporter. Callers build a
//! [`config::Config`], pick a [`store::CredentialStore`], and issue typed reads through
//! [`client::ApiClient`]:
//!
//! ```no_run
//! # async fn demo() -> netatmo_client::error::Result<()> {
//! use std::sync::Arc;
//!
//! use netatmo_client::{
//! 	auth::{READ_STATION, ScopeSet},
//! 	client::ApiClient,
//! 	config::Config,
//! 	store::FileStore,
//! };
//!
//! let config = Config::builder("client-id", "client-secret")
//! 	.refresh_token("refresh-token")
//! 	.scopes(ScopeSet::new([READ_STATION])?)
//! 	.build()?;
//! let client = ApiClient::connect(config, Arc::new(FileStore::default())).await?;
//! let body: serde_json::Value = client.get_path("getstationsdata").await?;
//! # let _ = body;
//! # Ok(())
//! # }
//! ```

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod authenticator;
pub mod client;
pub mod config;
pub mod envelope;
pub mod error;
pub mod http;
pub mod oauth;
pub mod obs;
pub mod store;
#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for tests; enabled via `cfg(test)` or the `test`
	//! crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		client::ApiClient,
		config::{Config, ConfigBuilder},
		http::ReqwestHttpClient,
		oauth::ReqwestTransportErrorMapper,
		store::{CredentialStore, MemoryStore},
	};

	/// Client type alias used by reqwest-backed tests.
	pub type ReqwestTestClient = ApiClient<ReqwestHttpClient, ReqwestTransportErrorMapper>;

	/// Builds a reqwest HTTP client that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	pub fn test_reqwest_http_client() -> ReqwestHttpClient {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		ReqwestHttpClient::with_client(client)
	}

	/// Returns a config builder whose endpoints point at the provided mock server base URL.
	pub fn test_config_builder(base: &str) -> ConfigBuilder {
		let base = base.trim_end_matches('/');

		Config::builder("client-test", "secret-test")
			.token_endpoint(
				Url::parse(&format!("{base}/oauth2/token"))
					.expect("Mock token endpoint should parse."),
			)
			.api_base(Url::parse(&format!("{base}/api/")).expect("Mock API base should parse."))
	}

	/// Constructs an [`ApiClient`] backed by an in-memory store and the test transport.
	pub fn build_reqwest_test_client(config: Config) -> (ReqwestTestClient, Arc<MemoryStore>) {
		let store_backend = Arc::new(MemoryStore::default());
		let store: Arc<dyn CredentialStore> = store_backend.clone();
		let client = ApiClient::with_http_client(
			config,
			store,
			test_reqwest_http_client(),
			Arc::new(ReqwestTransportErrorMapper),
		);

		(client, store_backend)
	}
}

mod _prelude {
	pub use std::{
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		marker::PhantomData,
		pin::Pin,
		str::FromStr,
		sync::Arc,
		time::Duration as StdDuration,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize, de::DeserializeOwned};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(all(test, feature = "reqwest"))] use {color_eyre as _, httpmock as _};
