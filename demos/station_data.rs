//! Reads station data through the client against a local mock of the Netatmo API, seeding the
//! refresh grant from a bootstrap token and persisting the result to a token file.

// std
use std::{env, sync::Arc};
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use serde::Deserialize;
use url::Url;
// self
use netatmo_client::{auth::ScopeSet, client::ReqwestApiClient, config::Config, store::FileStore};

#[derive(Debug, Deserialize)]
struct StationsData {
	devices: Vec<Device>,
}

#[derive(Debug, Deserialize)]
struct Device {
	station_name: String,
	dashboard_data: Dashboard,
}

#[derive(Debug, Deserialize)]
struct Dashboard {
	#[serde(rename = "Temperature")]
	temperature: f64,
	#[serde(rename = "Humidity")]
	humidity: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth2/token").body_includes("grant_type=refresh_token");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"demo-access\",\"refresh_token\":\"demo-refresh\",\"expires_in\":10800,\"scope\":[\"read_station\"]}",
			);
		})
		.await;
	let api_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/getstationsdata").header("authorization", "Bearer demo-access");
			then.status(200).header("content-type", "application/json").body(
				"{\"status\":\"ok\",\"body\":{\"devices\":[{\"station_name\":\"Home\",\"dashboard_data\":{\"Temperature\":21.5,\"Humidity\":48}}]}}",
			);
		})
		.await;
	let token_file = env::temp_dir().join("netatmo_client_demo_token.json");
	// A leftover file from an earlier run would satisfy the cache and skip the refresh.
	let _ = std::fs::remove_file(&token_file);
	let config = Config::builder("demo-client", "demo-secret")
		.refresh_token("bootstrap-refresh")
		.scopes(ScopeSet::station_defaults())
		.token_endpoint(Url::parse(&server.url("/oauth2/token"))?)
		.api_base(Url::parse(&server.url("/api/"))?)
		.build()?;
	let client = ReqwestApiClient::connect(config, Arc::new(FileStore::new(&token_file))).await?;
	let data: StationsData = client.get_path("getstationsdata").await?;

	for device in &data.devices {
		println!(
			"{}: {:.1} °C, {}% humidity.",
			device.station_name, device.dashboard_data.temperature, device.dashboard_data.humidity
		);
	}

	println!("Credential persisted to {}.", token_file.display());

	token_mock.assert_async().await;
	api_mock.assert_async().await;

	std::fs::remove_file(&token_file)?;

	Ok(())
}
