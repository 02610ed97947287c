#![cfg(feature = "reqwest")]

mod common;

// std
use std::{env, fs, path::PathBuf, process, sync::Arc};
// crates.io
use httpmock::prelude::*;
use time::OffsetDateTime;
// self
use common::*;
use netatmo_client::{
	auth::Credential,
	authenticator::{AuthStage, CredentialSource},
	store::{CredentialStore, FileStore},
};

fn temp_dir(label: &str) -> PathBuf {
	env::temp_dir().join(format!(
		"netatmo_client_it_{label}_{}_{}",
		process::id(),
		OffsetDateTime::now_utc().unix_timestamp_nanos()
	))
}

#[tokio::test]
async fn bootstrap_token_file_is_upgraded_after_refresh() {
	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH).body_includes("refresh_token=bootstrap-refresh");
			then.status(200)
				.header("content-type", "application/json")
				.body(token_body("file-access", Some("file-refresh")));
		})
		.await;
	let api_mock = server
		.mock_async(|when, then| {
			when.method(GET).path(STATIONS_PATH).header("authorization", "Bearer file-access");
			then.status(200).header("content-type", "application/json").body(stations_body(17.5));
		})
		.await;
	let dir = temp_dir("bootstrap");
	let path = dir.join("netatmo_token.json");

	fs::create_dir_all(&dir).expect("Failed to create fixture directory.");
	fs::write(&path, "bootstrap-refresh\n").expect("Failed to write bootstrap token file.");

	let store = Arc::new(FileStore::new(&path));
	let config = config_builder(&server).build().expect("Config should build.");
	let client = build_client(config, store.clone());
	let data: StationsData =
		client.get_path("getstationsdata").await.expect("Bootstrap refresh should authorize.");

	assert_eq!(data.devices[0].dashboard_data.temperature, 17.5);

	let raw = fs::read_to_string(&path).expect("Token file should exist after refresh.");
	let persisted: Credential =
		serde_json::from_str(&raw).expect("Token file should now hold a JSON record.");

	assert_eq!(persisted.access_token.expose(), "file-access");
	assert_eq!(persisted.refresh_token.as_ref().map(|secret| secret.expose()), Some("file-refresh"));
	assert!(persisted.expiry.is_some());

	#[cfg(unix)]
	{
		// std
		use std::os::unix::fs::PermissionsExt;

		let mode = fs::metadata(&path).expect("Token file should exist.").permissions().mode();

		assert_eq!(mode & 0o777, 0o600);
	}

	token_mock.assert_calls_async(1).await;
	api_mock.assert_calls_async(1).await;

	fs::remove_dir_all(&dir).expect("Failed to remove fixture directory.");
}

#[tokio::test]
async fn persisted_credential_is_reused_by_next_process() {
	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH);
			then.status(200)
				.header("content-type", "application/json")
				.body(token_body("first-run-access", Some("first-run-refresh")));
		})
		.await;
	let dir = temp_dir("restart");
	let path = dir.join("netatmo_token.json");
	let config = config_builder(&server)
		.refresh_token("configured-refresh")
		.build()
		.expect("Config should build.");
	let first_run = build_client(config.clone(), Arc::new(FileStore::new(&path)));

	first_run.authenticate().await.expect("First run should refresh.");
	drop(first_run);

	let second_run = build_client(config, Arc::new(FileStore::new(&path)));
	let outcome = second_run.authenticate().await.expect("Second run should reuse the file.");

	assert_eq!(outcome.source, CredentialSource::Cached);
	assert_eq!(outcome.credential.access_token.expose(), "first-run-access");
	assert_eq!(
		second_run.authenticator().stage(),
		AuthStage::Authenticated(CredentialSource::Cached)
	);

	let reloaded = FileStore::new(&path)
		.load()
		.await
		.expect("Token file should load.")
		.expect("Token file should hold a record.");

	assert_eq!(reloaded, outcome.credential);

	token_mock.assert_calls_async(1).await;

	fs::remove_dir_all(&dir).expect("Failed to remove fixture directory.");
}
