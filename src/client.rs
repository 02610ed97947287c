//! Resilient request executor: authenticated GETs with one-shot reauthentication.

// self
use crate::{
	_prelude::*,
	auth::Credential,
	authenticator::{AuthOutcome, Authenticator},
	config::Config,
	envelope,
	error::ConfigError,
	http::{ResourceRequest, ResourceResponse, VendorHttpClient},
	oauth::TransportErrorMapper,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	store::CredentialStore,
};
#[cfg(feature = "reqwest")]
use crate::{http::ReqwestHttpClient, oauth::ReqwestTransportErrorMapper};

/// Client specialized for the crate's default reqwest transport stack.
#[cfg(feature = "reqwest")]
pub type ReqwestApiClient = ApiClient<ReqwestHttpClient, ReqwestTransportErrorMapper>;

/// Target of a typed read: the resource URL plus the shape the payload decodes into.
pub struct RequestContext<T> {
	/// Absolute resource URL.
	pub url: Url,
	/// Deadline for each physical round trip; overrides [`Config::request_timeout`].
	pub timeout: Option<StdDuration>,
	_shape: PhantomData<fn() -> T>,
}
impl<T> RequestContext<T> {
	/// Creates a context without a deadline.
	pub fn new(url: Url) -> Self {
		Self { url, timeout: None, _shape: PhantomData }
	}

	/// Sets the per-round-trip deadline.
	pub fn timeout(mut self, timeout: StdDuration) -> Self {
		self.timeout = Some(timeout);

		self
	}
}
impl<T> Clone for RequestContext<T> {
	fn clone(&self) -> Self {
		Self { url: self.url.clone(), timeout: self.timeout, _shape: PhantomData }
	}
}
impl<T> Debug for RequestContext<T> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RequestContext")
			.field("url", &self.url.as_str())
			.field("timeout", &self.timeout)
			.field("shape", &std::any::type_name::<T>())
			.finish()
	}
}

/// Issues authenticated reads against the vendor API.
///
/// A response whose status is in [`Config::reauth_statuses`] triggers exactly one
/// reauthentication and one retry; a second rejection is reported as
/// [`Error::ReauthRejected`]. Other non-2xx statuses are returned as [`Error::Upstream`]
/// without retrying. Reads that already hold a usable credential run concurrently.
pub struct ApiClient<C, M>
where
	C: ?Sized + VendorHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	config: Arc<Config>,
	http_client: Arc<C>,
	transport_mapper: Arc<M>,
	authenticator: Arc<Authenticator<C, M>>,
}
impl<C, M> ApiClient<C, M>
where
	C: ?Sized + VendorHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates a client that reuses the caller-provided transport + mapper pair.
	///
	/// No credential is loaded until the first request; call [`ApiClient::authenticate`] to
	/// fail fast on bad credentials.
	pub fn with_http_client(
		config: Config,
		store: Arc<dyn CredentialStore>,
		http_client: impl Into<Arc<C>>,
		mapper: impl Into<Arc<M>>,
	) -> Self {
		let config = Arc::new(config);
		let http_client = http_client.into();
		let transport_mapper = mapper.into();
		let authenticator = Arc::new(Authenticator::new(
			config.clone(),
			store,
			http_client.clone(),
			transport_mapper.clone(),
		));

		Self { config, http_client, transport_mapper, authenticator }
	}

	/// Config the client was built with.
	pub fn config(&self) -> &Config {
		&self.config
	}

	/// Authenticator shared by every request issued through this client.
	pub fn authenticator(&self) -> &Authenticator<C, M> {
		&self.authenticator
	}

	/// Runs the full authentication chain now instead of on the first request.
	pub async fn authenticate(&self) -> Result<AuthOutcome> {
		self.authenticator.authenticate().await
	}

	/// Reads `url` and decodes the envelope body into `T`.
	pub async fn get<T>(&self, url: Url) -> Result<T>
	where
		T: DeserializeOwned,
	{
		self.fetch(RequestContext::new(url)).await
	}

	/// Reads `path`, resolved against the configured API base URL.
	pub async fn get_path<T>(&self, path: &str) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let url = self.resolve(path)?;

		self.fetch(RequestContext::new(url)).await
	}

	/// Executes a read described by `request`.
	pub async fn fetch<T>(&self, request: RequestContext<T>) -> Result<T>
	where
		T: DeserializeOwned,
	{
		const KIND: FlowKind = FlowKind::Fetch;

		let span = FlowSpan::new(KIND, "fetch");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span.instrument(self.fetch_inner(request)).await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}

	/// Resolves a relative resource path against the API base URL.
	pub fn resolve(&self, path: &str) -> Result<Url> {
		self.config.endpoints.api_base.join(path.trim_start_matches('/')).map_err(|source| {
			ConfigError::InvalidResourcePath { path: path.to_owned(), source }.into()
		})
	}

	async fn fetch_inner<T>(&self, request: RequestContext<T>) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let timeout = request.timeout.or(self.config.request_timeout);
		let credential = self.authenticator.credential_within(timeout).await?;
		let mut response = self.send(&request.url, &credential, timeout).await?;

		if self.config.is_reauth_status(response.status) {
			let renewed = self.authenticator.reauthenticate_within(&credential, timeout).await?;

			response = self.send(&request.url, &renewed, timeout).await?;

			if self.config.is_reauth_status(response.status) {
				return Err(Error::ReauthRejected { url: request.url, status: response.status });
			}
		}
		if !response.is_success() {
			return Err(Error::Upstream {
				status: response.status,
				body: String::from_utf8_lossy(&response.body).into_owned(),
			});
		}

		Ok(envelope::decode(&response.body)?)
	}

	async fn send(
		&self,
		url: &Url,
		credential: &Credential,
		timeout: Option<StdDuration>,
	) -> Result<ResourceResponse> {
		let request = ResourceRequest { url, bearer: credential.access_token.expose(), timeout };

		self.http_client
			.get(request)
			.await
			.map_err(|e| self.transport_mapper.map_resource_error(e).into())
	}
}
#[cfg(feature = "reqwest")]
impl ApiClient<ReqwestHttpClient, ReqwestTransportErrorMapper> {
	/// Creates a client backed by a reqwest transport that does not follow redirects.
	///
	/// Authentication is deferred to the first request.
	pub fn new(config: Config, store: Arc<dyn CredentialStore>) -> Result<Self> {
		Ok(Self::with_http_client(
			config,
			store,
			ReqwestHttpClient::new()?,
			Arc::new(ReqwestTransportErrorMapper),
		))
	}

	/// Creates a client and authenticates immediately, surfacing credential problems at
	/// startup.
	pub async fn connect(config: Config, store: Arc<dyn CredentialStore>) -> Result<Self> {
		let client = Self::new(config, store)?;

		client.authenticate().await?;

		Ok(client)
	}
}
impl<C, M> Clone for ApiClient<C, M>
where
	C: ?Sized + VendorHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn clone(&self) -> Self {
		Self {
			config: self.config.clone(),
			http_client: self.http_client.clone(),
			transport_mapper: self.transport_mapper.clone(),
			authenticator: self.authenticator.clone(),
		}
	}
}
impl<C, M> Debug for ApiClient<C, M>
where
	C: ?Sized + VendorHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ApiClient")
			.field("api_base", &self.config.endpoints.api_base.as_str())
			.field("stage", &self.authenticator.stage())
			.finish()
	}
}

#[cfg(all(test, feature = "reqwest"))]
mod tests {
	// crates.io
	use httpmock::prelude::*;
	// self
	use super::*;
	use crate::{
		_preludet::*,
		authenticator::{AuthStage, CredentialSource},
		store::MemoryStore,
	};

	fn client() -> ReqwestApiClient {
		let config = Config::builder("client", "secret").build().expect("Config should build.");

		ApiClient::new(config, Arc::new(MemoryStore::default())).expect("Client should build.")
	}

	#[test]
	fn resolve_keeps_the_api_base_path() {
		let client = client();

		assert_eq!(
			client.resolve("getstationsdata").expect("Relative path should resolve.").as_str(),
			"https://api.netatmo.com/api/getstationsdata"
		);
		assert_eq!(
			client.resolve("/homesdata?home_id=1").expect("Leading slash should resolve.").as_str(),
			"https://api.netatmo.com/api/homesdata?home_id=1"
		);
	}

	#[test]
	fn request_context_carries_timeout() {
		let url = Url::parse("https://api.netatmo.com/api/getstationsdata")
			.expect("Fixture URL should parse.");
		let context =
			<RequestContext<serde_json::Value>>::new(url).timeout(StdDuration::from_secs(5));

		assert_eq!(context.clone().timeout, Some(StdDuration::from_secs(5)));
		assert!(format!("{context:?}").contains("serde_json::value::Value"));
	}

	#[tokio::test]
	async fn first_read_authenticates_lazily_and_sends_bearer() {
		let server = MockServer::start_async().await;
		let token_mock = server
			.mock_async(|when, then| {
				when.method(POST).path("/oauth2/token").body_includes("refresh_token=seed-refresh");
				then.status(200)
					.header("content-type", "application/json")
					.body("{\"access_token\":\"lazy-access\",\"expires_in\":10800}");
			})
			.await;
		let api_mock = server
			.mock_async(|when, then| {
				when.method(GET).path("/api/getmeasure").header("authorization", "Bearer lazy-access");
				then.status(200)
					.header("content-type", "application/json")
					.body("{\"status\":\"ok\",\"body\":{\"value\":[[21.5]]}}");
			})
			.await;
		let config = test_config_builder(&server.base_url())
			.refresh_token("seed-refresh")
			.build()
			.expect("Test config should build.");
		let (client, store) = build_reqwest_test_client(config);

		assert_eq!(client.authenticator().stage(), AuthStage::Unauthenticated);
		token_mock.assert_calls_async(0).await;

		let body: serde_json::Value =
			client.get_path("getmeasure").await.expect("Lazy authentication should succeed.");

		assert_eq!(body["value"][0][0], 21.5);
		assert_eq!(client.authenticator().stage(), AuthStage::Authenticated(CredentialSource::Refresh));
		assert_eq!(
			store.snapshot().map(|credential| credential.access_token.expose().to_owned()),
			Some("lazy-access".into())
		);

		token_mock.assert_calls_async(1).await;
		api_mock.assert_calls_async(1).await;
	}
}
