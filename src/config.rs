//! Immutable client configuration and its validating builder.

// std
use std::{collections::BTreeSet, net::IpAddr};
// self
use crate::{
	_prelude::*,
	auth::{ScopeSet, TokenSecret},
	error::ConfigError,
};

/// Token endpoint used when none is configured.
pub const DEFAULT_TOKEN_ENDPOINT: &str = "https://api.netatmo.com/oauth2/token";
/// API base URL used when none is configured.
pub const DEFAULT_API_BASE: &str = "https://api.netatmo.com/api/";
/// HTTP statuses that count as credential rejection unless overridden.
pub const DEFAULT_REAUTH_STATUSES: [u16; 2] = [401, 403];

/// Vendor endpoints consumed by the client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoints {
	/// Token endpoint for refresh and password grants.
	pub token: Url,
	/// Base URL that relative resource paths are joined onto.
	pub api_base: Url,
}
impl Endpoints {
	fn validate(&self) -> Result<(), ConfigError> {
		validate_endpoint("token", &self.token)?;
		validate_endpoint("api base", &self.api_base)?;

		Ok(())
	}
}
impl Default for Endpoints {
	fn default() -> Self {
		Self {
			token: Url::parse(DEFAULT_TOKEN_ENDPOINT)
				.unwrap_or_else(|e| unreachable!("Default token endpoint must parse: {e}.")),
			api_base: Url::parse(DEFAULT_API_BASE)
				.unwrap_or_else(|e| unreachable!("Default API base must parse: {e}.")),
		}
	}
}

/// Credentials and tuning supplied once at client construction.
///
/// Values are validated by [`ConfigBuilder::build`] and never mutated afterwards; the
/// authenticator tracks rotated refresh tokens separately.
#[derive(Clone)]
pub struct Config {
	/// OAuth client identifier.
	pub client_id: String,
	/// OAuth client secret.
	pub client_secret: TokenSecret,
	/// Username for the password grant fallback.
	pub username: Option<String>,
	/// Password for the password grant fallback.
	pub password: Option<TokenSecret>,
	/// Refresh token used to seed the refresh grant.
	pub refresh_token: Option<TokenSecret>,
	/// Scopes requested by the password grant.
	pub scopes: ScopeSet,
	/// Vendor endpoints.
	pub endpoints: Endpoints,
	/// Response statuses that trigger one reauthentication and retry.
	pub reauth_statuses: BTreeSet<u16>,
	/// Default deadline applied to each resource and token endpoint round trip.
	pub request_timeout: Option<StdDuration>,
}
impl Config {
	/// Starts a builder for the provided client credentials.
	pub fn builder(client_id: impl Into<String>, client_secret: impl Into<String>) -> ConfigBuilder {
		ConfigBuilder::new(client_id, client_secret)
	}

	/// Returns the password-grant credentials when both halves are configured.
	pub fn password_credentials(&self) -> Option<(&str, &TokenSecret)> {
		match (self.username.as_deref(), self.password.as_ref()) {
			(Some(username), Some(password)) => Some((username, password)),
			_ => None,
		}
	}

	/// Returns `true` if `status` counts as a credential rejection.
	pub fn is_reauth_status(&self, status: u16) -> bool {
		self.reauth_statuses.contains(&status)
	}
}
impl Debug for Config {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Config")
			.field("client_id", &self.client_id)
			.field("client_secret", &self.client_secret)
			.field("username", &self.username)
			.field("password", &self.password)
			.field("refresh_token", &self.refresh_token)
			.field("scopes", &self.scopes)
			.field("endpoints", &self.endpoints)
			.field("reauth_statuses", &self.reauth_statuses)
			.field("request_timeout", &self.request_timeout)
			.finish()
	}
}

/// Builder for [`Config`] values.
#[derive(Debug)]
pub struct ConfigBuilder {
	client_id: String,
	client_secret: TokenSecret,
	username: Option<String>,
	password: Option<TokenSecret>,
	refresh_token: Option<TokenSecret>,
	scopes: ScopeSet,
	endpoints: Endpoints,
	reauth_statuses: BTreeSet<u16>,
	request_timeout: Option<StdDuration>,
}
impl ConfigBuilder {
	/// Creates a builder seeded with the client credentials and the vendor defaults.
	pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
		Self {
			client_id: client_id.into(),
			client_secret: TokenSecret::new(client_secret),
			username: None,
			password: None,
			refresh_token: None,
			scopes: ScopeSet::station_defaults(),
			endpoints: Endpoints::default(),
			reauth_statuses: DEFAULT_REAUTH_STATUSES.into_iter().collect(),
			request_timeout: None,
		}
	}

	/// Configures the password grant fallback. Empty values leave it disabled.
	pub fn password(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
		self.username = Some(username.into()).filter(|value| !value.is_empty());
		self.password = TokenSecret::non_empty(password);

		self
	}

	/// Seeds the refresh grant. An empty token is treated as absent.
	pub fn refresh_token(mut self, token: impl Into<String>) -> Self {
		self.refresh_token = TokenSecret::non_empty(token);

		self
	}

	/// Overrides the requested scopes.
	pub fn scopes(mut self, scopes: ScopeSet) -> Self {
		self.scopes = scopes;

		self
	}

	/// Overrides the token endpoint.
	pub fn token_endpoint(mut self, url: Url) -> Self {
		self.endpoints.token = url;

		self
	}

	/// Overrides the API base URL.
	pub fn api_base(mut self, url: Url) -> Self {
		self.endpoints.api_base = url;

		self
	}

	/// Replaces the set of statuses treated as credential rejection.
	pub fn reauth_statuses<I>(mut self, statuses: I) -> Self
	where
		I: IntoIterator<Item = u16>,
	{
		self.reauth_statuses = statuses.into_iter().collect();

		self
	}

	/// Sets a default deadline for every resource and token endpoint round trip.
	pub fn request_timeout(mut self, timeout: StdDuration) -> Self {
		self.request_timeout = Some(timeout);

		self
	}

	/// Consumes the builder and validates the resulting config.
	pub fn build(self) -> Result<Config, ConfigError> {
		let config = Config {
			client_id: self.client_id,
			client_secret: self.client_secret,
			username: self.username,
			password: self.password,
			refresh_token: self.refresh_token,
			scopes: self.scopes,
			endpoints: self.endpoints,
			reauth_statuses: self.reauth_statuses,
			request_timeout: self.request_timeout,
		};

		config.validate()?;

		Ok(config)
	}
}

impl Config {
	fn validate(&self) -> Result<(), ConfigError> {
		if self.client_id.trim().is_empty() {
			return Err(ConfigError::MissingField { field: "client id" });
		}
		if self.client_secret.is_empty() {
			return Err(ConfigError::MissingField { field: "client secret" });
		}
		if self.username.is_some() != self.password.is_some() {
			return Err(ConfigError::IncompletePasswordCredentials);
		}

		self.endpoints.validate()
	}
}

fn validate_endpoint(name: &'static str, url: &Url) -> Result<(), ConfigError> {
	match url.scheme() {
		"https" => Ok(()),
		"http" if is_loopback(url) => Ok(()),
		_ => Err(ConfigError::InsecureEndpoint { endpoint: name, url: url.to_string() }),
	}
}

fn is_loopback(url: &Url) -> bool {
	match url.host() {
		Some(url::Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
		Some(url::Host::Ipv4(ip)) => IpAddr::V4(ip).is_loopback(),
		Some(url::Host::Ipv6(ip)) => IpAddr::V6(ip).is_loopback(),
		None => false,
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn defaults_target_the_vendor_api() {
		let config = Config::builder("client", "secret").build().expect("Minimal config is valid.");

		assert_eq!(config.endpoints.token.as_str(), DEFAULT_TOKEN_ENDPOINT);
		assert_eq!(config.endpoints.api_base.as_str(), DEFAULT_API_BASE);
		assert!(config.is_reauth_status(401));
		assert!(config.is_reauth_status(403));
		assert!(!config.is_reauth_status(500));
		assert_eq!(config.scopes, ScopeSet::station_defaults());
		assert!(config.password_credentials().is_none());
	}

	#[test]
	fn build_rejects_missing_fields() {
		let err = Config::builder(" ", "secret").build().expect_err("Blank client id must fail.");

		assert!(matches!(err, ConfigError::MissingField { field: "client id" }));

		let err = Config::builder("client", "").build().expect_err("Empty secret must fail.");

		assert!(matches!(err, ConfigError::MissingField { field: "client secret" }));

		let err = Config::builder("client", "secret")
			.password("owner@example.com", "")
			.build()
			.expect_err("Password without a value must fail.");

		assert!(matches!(err, ConfigError::IncompletePasswordCredentials));
	}

	#[test]
	fn empty_refresh_token_is_absent() {
		let config = Config::builder("client", "secret")
			.refresh_token("")
			.password("owner@example.com", "hunter2")
			.build()
			.expect("Config with password grant should build.");

		assert!(config.refresh_token.is_none());

		let (username, password) =
			config.password_credentials().expect("Password credentials should be configured.");

		assert_eq!(username, "owner@example.com");
		assert_eq!(password.expose(), "hunter2");
	}

	#[test]
	fn endpoints_must_be_https_or_loopback() {
		let err = Config::builder("client", "secret")
			.token_endpoint(Url::parse("http://api.example.com/token").expect("URL should parse."))
			.build()
			.expect_err("Plain HTTP token endpoint must fail.");

		assert!(matches!(err, ConfigError::InsecureEndpoint { endpoint: "token", .. }));

		Config::builder("client", "secret")
			.token_endpoint(Url::parse("http://127.0.0.1:8080/token").expect("URL should parse."))
			.api_base(Url::parse("http://localhost:8080/api/").expect("URL should parse."))
			.build()
			.expect("Loopback endpoints are allowed over HTTP.");
	}

	#[test]
	fn debug_redacts_secrets() {
		let config = Config::builder("client", "client-secret-value")
			.refresh_token("refresh-value")
			.password("owner", "password-value")
			.build()
			.expect("Config should build.");
		let rendered = format!("{config:?}");

		assert!(rendered.contains("client"));
		assert!(!rendered.contains("client-secret-value"));
		assert!(!rendered.contains("refresh-value"));
		assert!(!rendered.contains("password-value"));
	}
}
