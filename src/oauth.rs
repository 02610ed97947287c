//! Grant-exchange facade over the `oauth2` crate.

pub use oauth2;

// crates.io
use oauth2::{
	AccessToken, AuthType, ClientId, ClientSecret, EndpointNotSet, EndpointSet, HttpClientError,
	RefreshToken, RequestTokenError, ResourceOwnerPassword, ResourceOwnerUsername, Scope,
	StandardRevocableToken, TokenResponse, TokenUrl,
	basic::{
		BasicErrorResponse, BasicRequestTokenError, BasicRevocationErrorResponse,
		BasicTokenIntrospectionResponse, BasicTokenType,
	},
};
use serde::Deserializer;
// self
use crate::{
	_prelude::*,
	auth::{Credential, GrantType, ScopeSet, TokenSecret},
	config::Config,
	error::{ConfigError, ExchangeError, TransportError},
	http::{ResponseMetadata, ResponseMetadataSlot, VendorHttpClient},
};

type VendorOAuthClient = oauth2::Client<
	BasicErrorResponse,
	VendorTokenResponse,
	BasicTokenIntrospectionResponse,
	StandardRevocableToken,
	BasicRevocationErrorResponse,
	EndpointNotSet,
	EndpointNotSet,
	EndpointNotSet,
	EndpointNotSet,
	EndpointSet,
>;
type ExchangeFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// Maps HTTP transport failures into client [`Error`] values.
pub trait TransportErrorMapper<E>
where
	Self: 'static + Send + Sync,
	E: 'static + Send + Sync + StdError,
{
	/// Converts an [`HttpClientError`] raised during a grant exchange into a client error.
	fn map_transport_error(
		&self,
		grant: GrantType,
		metadata: Option<&ResponseMetadata>,
		error: HttpClientError<E>,
	) -> Error;

	/// Converts a failure raised while reading a resource into a [`TransportError`].
	fn map_resource_error(&self, error: E) -> TransportError;
}

/// Default mapper for reqwest-backed transports.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransportErrorMapper;
#[cfg(feature = "reqwest")]
impl TransportErrorMapper<ReqwestError> for ReqwestTransportErrorMapper {
	fn map_transport_error(
		&self,
		grant: GrantType,
		meta: Option<&ResponseMetadata>,
		err: HttpClientError<ReqwestError>,
	) -> Error {
		match err {
			HttpClientError::Reqwest(inner) if inner.is_builder() =>
				ConfigError::from(*inner).into(),
			HttpClientError::Reqwest(inner) =>
				ExchangeError::Transport { grant, source: TransportError::from(*inner) }.into(),
			HttpClientError::Http(inner) => ConfigError::from(inner).into(),
			HttpClientError::Io(inner) =>
				ExchangeError::Transport { grant, source: TransportError::Io(inner) }.into(),
			HttpClientError::Other(message) =>
				ExchangeError::Unexpected { grant, status: meta_status(meta), message }.into(),
			_ => ExchangeError::Unexpected {
				grant,
				status: meta_status(meta),
				message: "HTTP client error occurred while calling the token endpoint".into(),
			}
			.into(),
		}
	}

	fn map_resource_error(&self, error: ReqwestError) -> TransportError {
		TransportError::from(error)
	}
}

/// Token endpoint response as returned by Netatmo.
///
/// Differs from the RFC 6749 shape the `oauth2` crate ships with in two ways: `scope` may be
/// a JSON array instead of a space-delimited string, and `token_type` may be omitted.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VendorTokenResponse {
	access_token: AccessToken,
	#[serde(default = "default_token_type", deserialize_with = "deserialize_token_type")]
	token_type: BasicTokenType,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	expires_in: Option<u64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	refresh_token: Option<RefreshToken>,
	#[serde(
		rename = "scope",
		default,
		deserialize_with = "deserialize_scopes",
		skip_serializing_if = "Option::is_none"
	)]
	scopes: Option<Vec<Scope>>,
}
impl TokenResponse for VendorTokenResponse {
	type TokenType = BasicTokenType;

	fn access_token(&self) -> &AccessToken {
		&self.access_token
	}

	fn token_type(&self) -> &Self::TokenType {
		&self.token_type
	}

	fn expires_in(&self) -> Option<StdDuration> {
		self.expires_in.map(StdDuration::from_secs)
	}

	fn refresh_token(&self) -> Option<&RefreshToken> {
		self.refresh_token.as_ref()
	}

	fn scopes(&self) -> Option<&Vec<Scope>> {
		self.scopes.as_ref()
	}
}

/// Runs refresh and password grants against the configured token endpoint.
///
/// Client credentials travel in the form body, which is what the vendor expects.
pub struct TokenExchange<C, M>
where
	C: ?Sized + VendorHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	oauth_client: VendorOAuthClient,
	http_client: Arc<C>,
	error_mapper: Arc<M>,
	timeout: Option<StdDuration>,
}
impl<C, M> TokenExchange<C, M>
where
	C: ?Sized + VendorHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Builds the exchange from the client config.
	pub fn from_config(
		config: &Config,
		http_client: impl Into<Arc<C>>,
		error_mapper: impl Into<Arc<M>>,
	) -> Result<Self> {
		let token_url = TokenUrl::new(config.endpoints.token.to_string())
			.map_err(|source| ConfigError::InvalidTokenEndpoint { source })?;
		let oauth_client = oauth2::Client::new(ClientId::new(config.client_id.clone()))
			.set_client_secret(ClientSecret::new(config.client_secret.expose().to_owned()))
			.set_token_uri(token_url)
			.set_auth_type(AuthType::RequestBody);

		Ok(Self {
			oauth_client,
			http_client: http_client.into(),
			error_mapper: error_mapper.into(),
			timeout: None,
		})
	}

	/// Bounds every token endpoint round trip; an overrun surfaces as
	/// [`ExchangeError::Transport`] carrying a timeout.
	pub fn timeout(mut self, timeout: Option<StdDuration>) -> Self {
		self.timeout = timeout;

		self
	}

	/// Exchanges `refresh_token` for a new credential.
	///
	/// When the response omits `refresh_token` the submitted one is carried over, since the
	/// vendor only rotates it on some responses.
	pub fn refresh<'a>(&'a self, refresh_token: &'a TokenSecret) -> ExchangeFuture<'a, Credential> {
		let meta = ResponseMetadataSlot::default();

		Box::pin(async move {
			let instrumented = self.http_client.with_metadata(meta.clone(), self.timeout);
			let secret = RefreshToken::new(refresh_token.expose().to_owned());
			let response = self
				.oauth_client
				.exchange_refresh_token(&secret)
				.request_async(&instrumented)
				.await
				.map_err(|err| {
					map_request_error(
						GrantType::RefreshToken,
						meta.take(),
						err,
						self.error_mapper.as_ref(),
					)
				})?;
			let credential = map_token_response(GrantType::RefreshToken, response)?;

			Ok(if credential.refresh_token.is_none() {
				Credential { refresh_token: Some(refresh_token.clone()), ..credential }
			} else {
				credential
			})
		})
	}

	/// Exchanges resource-owner credentials for a new credential.
	pub fn password<'a>(
		&'a self,
		username: &'a str,
		password: &'a TokenSecret,
		scopes: &'a ScopeSet,
	) -> ExchangeFuture<'a, Credential> {
		let meta = ResponseMetadataSlot::default();

		Box::pin(async move {
			let instrumented = self.http_client.with_metadata(meta.clone(), self.timeout);
			let username = ResourceOwnerUsername::new(username.to_owned());
			let password = ResourceOwnerPassword::new(password.expose().to_owned());
			let mut request = self.oauth_client.exchange_password(&username, &password);

			for scope in scopes {
				request = request.add_scope(Scope::new(scope.to_owned()));
			}

			let response = request.request_async(&instrumented).await.map_err(|err| {
				map_request_error(GrantType::Password, meta.take(), err, self.error_mapper.as_ref())
			})?;

			map_token_response(GrantType::Password, response)
		})
	}
}

fn map_token_response(grant: GrantType, response: VendorTokenResponse) -> Result<Credential> {
	let access_token = response.access_token().secret();

	if access_token.is_empty() {
		return Err(ExchangeError::InvalidResponse { grant, reason: "access_token is empty" }.into());
	}

	let mut credential = Credential::new(access_token.to_owned());

	if let Some(refresh) = response.refresh_token() {
		credential = credential.with_refresh_token(refresh.secret().to_owned());
	}
	if let Some(expires_in) = response.expires_in() {
		let expires_in = i64::try_from(expires_in.as_secs()).map_err(|_| {
			ExchangeError::InvalidResponse { grant, reason: "expires_in is out of range" }
		})?;

		if expires_in <= 0 {
			return Err(
				ExchangeError::InvalidResponse { grant, reason: "expires_in is not positive" }.into()
			);
		}

		credential = credential.expires_in(OffsetDateTime::now_utc(), Duration::seconds(expires_in));
	}

	Ok(credential)
}

fn map_request_error<E, M>(
	grant: GrantType,
	meta: Option<ResponseMetadata>,
	err: BasicRequestTokenError<HttpClientError<E>>,
	mapper: &M,
) -> Error
where
	E: 'static + Send + Sync + StdError,
	M: ?Sized + TransportErrorMapper<E>,
{
	let meta_ref = meta.as_ref();

	match err {
		RequestTokenError::ServerResponse(response) =>
			map_server_response_error(grant, response, meta_ref),
		RequestTokenError::Request(error) => mapper.map_transport_error(grant, meta_ref, error),
		RequestTokenError::Parse(source, _body) =>
			ExchangeError::MalformedResponse { grant, status: meta_status(meta_ref), source }.into(),
		RequestTokenError::Other(message) =>
			ExchangeError::Unexpected { grant, status: meta_status(meta_ref), message }.into(),
	}
}

fn map_server_response_error(
	grant: GrantType,
	response: BasicErrorResponse,
	meta: Option<&ResponseMetadata>,
) -> Error {
	let reason = match response.error_description() {
		Some(description) => format!("{} ({description})", response.error().as_ref()),
		None => response.error().as_ref().to_owned(),
	};

	ExchangeError::Rejected { grant, status: meta_status(meta), reason }.into()
}

fn meta_status(meta: Option<&ResponseMetadata>) -> Option<u16> {
	meta.and_then(|value| value.status)
}

fn default_token_type() -> BasicTokenType {
	BasicTokenType::Bearer
}

fn deserialize_token_type<'de, D>(deserializer: D) -> Result<BasicTokenType, D::Error>
where
	D: Deserializer<'de>,
{
	let raw = <Option<String>>::deserialize(deserializer)?;

	Ok(match raw.as_deref().map(str::to_ascii_lowercase).as_deref() {
		None | Some("") | Some("bearer") => BasicTokenType::Bearer,
		Some("mac") => BasicTokenType::Mac,
		Some(other) => BasicTokenType::Extension(other.to_owned()),
	})
}

fn deserialize_scopes<'de, D>(deserializer: D) -> Result<Option<Vec<Scope>>, D::Error>
where
	D: Deserializer<'de>,
{
	#[derive(Deserialize)]
	#[serde(untagged)]
	enum RawScopes {
		List(Vec<String>),
		Delimited(String),
	}

	let scopes = match <Option<RawScopes>>::deserialize(deserializer)? {
		Some(RawScopes::List(list)) => list,
		Some(RawScopes::Delimited(raw)) => raw.split_whitespace().map(str::to_owned).collect(),
		None => return Ok(None),
	};

	Ok(Some(scopes.into_iter().map(Scope::new).collect()))
}
