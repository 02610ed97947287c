#![allow(dead_code)]

// std
use std::sync::Arc;
// crates.io
use httpmock::prelude::*;
use serde::Deserialize;
use time::{Duration, OffsetDateTime};
use url::Url;
// self
use netatmo_client::{
	auth::Credential,
	client::ReqwestApiClient,
	config::{Config, ConfigBuilder},
	store::{CredentialStore, StoreError, StoreFuture},
};

pub const TOKEN_PATH: &str = "/oauth2/token";
pub const STATIONS_PATH: &str = "/api/getstationsdata";

#[derive(Debug, Deserialize)]
pub struct StationsData {
	pub devices: Vec<Device>,
}

#[derive(Debug, Deserialize)]
pub struct Device {
	#[serde(rename = "_id")]
	pub id: String,
	pub dashboard_data: Dashboard,
}

#[derive(Debug, Deserialize)]
pub struct Dashboard {
	#[serde(rename = "Temperature")]
	pub temperature: f64,
}

/// Store whose saves always fail; loads report an empty store.
#[derive(Debug, Default)]
pub struct FailingStore;
impl CredentialStore for FailingStore {
	fn load(&self) -> StoreFuture<'_, Option<Credential>> {
		Box::pin(async { Ok(None) })
	}

	fn save(&self, _credential: Credential) -> StoreFuture<'_, ()> {
		Box::pin(async { Err(StoreError::Backend { message: "read-only file system".into() }) })
	}
}

pub fn config_builder(server: &MockServer) -> ConfigBuilder {
	Config::builder("client-test", "secret-test")
		.token_endpoint(
			Url::parse(&server.url(TOKEN_PATH)).expect("Mock token endpoint should parse."),
		)
		.api_base(Url::parse(&server.url("/api/")).expect("Mock API base should parse."))
}

pub fn build_client(config: Config, store: Arc<dyn CredentialStore>) -> ReqwestApiClient {
	ReqwestApiClient::new(config, store).expect("Failed to build the reqwest client.")
}

pub fn usable_credential(access: &str, refresh: &str) -> Credential {
	Credential::new(access)
		.with_refresh_token(refresh)
		.expires_in(OffsetDateTime::now_utc(), Duration::hours(3))
}

pub fn expired_credential(access: &str, refresh: &str) -> Credential {
	Credential::new(access)
		.with_refresh_token(refresh)
		.expires_at(OffsetDateTime::now_utc() - Duration::minutes(5))
}

pub fn token_body(access: &str, refresh: Option<&str>) -> String {
	match refresh {
		Some(refresh) => format!(
			"{{\"access_token\":\"{access}\",\"refresh_token\":\"{refresh}\",\"expires_in\":10800,\"expire_in\":10800,\"scope\":[\"read_station\",\"read_thermostat\"]}}"
		),
		None => format!("{{\"access_token\":\"{access}\",\"expires_in\":10800}}"),
	}
}

pub fn stations_body(temperature: f64) -> String {
	format!(
		"{{\"status\":\"ok\",\"time_server\":1700000000,\"body\":{{\"devices\":[{{\"_id\":\"70:ee:50:00:00:01\",\"dashboard_data\":{{\"Temperature\":{temperature}}}}}]}}}}"
	)
}
