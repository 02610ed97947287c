//! Transport primitives for token exchanges and authenticated resource reads.
//!
//! The module exposes [`VendorHttpClient`] alongside [`ResponseMetadata`] and
//! [`ResponseMetadataSlot`] so callers can plug in custom HTTP stacks without losing the
//! status capture used to classify grant failures. Implementations call
//! [`ResponseMetadataSlot::take`] before dispatching a token request and
//! [`ResponseMetadataSlot::store`] once an HTTP status is known.

// std
use std::ops::Deref;
// crates.io
use oauth2::{AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse};
// self
use crate::_prelude::*;

/// Boxed future returned by [`VendorHttpClient::get`].
pub type ResourceFuture<'a, E> = Pin<Box<dyn Future<Output = Result<ResourceResponse, E>> + 'a + Send>>;

/// Abstraction over HTTP transports that can run grant exchanges and bearer-authorized GETs.
///
/// The trait is the client's only dependency on an HTTP stack. Implementations must be
/// `Send + Sync + 'static` so they can be shared between the authenticator and the request
/// executor, and the handles they return must own whatever state they need so request
/// futures stay `Send`.
pub trait VendorHttpClient
where
	Self: 'static + Send + Sync,
{
	/// Concrete error emitted by the underlying transport.
	type TransportError: 'static + Send + Sync + StdError;

	/// [`AsyncHttpClient`] handle tied to a [`ResponseMetadataSlot`].
	type Handle: for<'c> AsyncHttpClient<
			'c,
			Error = HttpClientError<Self::TransportError>,
			Future: 'c + Send,
		>
		+ 'static
		+ Send
		+ Sync;

	/// Builds an [`AsyncHttpClient`] handle that records outcomes in `slot`.
	///
	/// # Metadata Contract
	///
	/// - Call [`ResponseMetadataSlot::take`] before submitting the HTTP request so stale
	///   information never leaks across attempts.
	/// - Once an HTTP response provides a status, save it with [`ResponseMetadataSlot::store`].
	/// - When `timeout` is set, a round trip that outlives it must fail with the transport's
	///   timeout error.
	fn with_metadata(
		&self,
		slot: ResponseMetadataSlot,
		timeout: Option<StdDuration>,
	) -> Self::Handle;

	/// Performs `GET request.url` with the bearer token attached.
	///
	/// Every HTTP status is returned as a [`ResourceResponse`]; only transport failures
	/// (DNS, TCP, TLS, deadline) are errors.
	fn get<'a>(&'a self, request: ResourceRequest<'a>) -> ResourceFuture<'a, Self::TransportError>;
}

/// Authenticated resource read issued by the request executor.
#[derive(Clone, Copy)]
pub struct ResourceRequest<'a> {
	/// Absolute resource URL.
	pub url: &'a Url,
	/// Access token sent as `Authorization: Bearer <token>`.
	pub bearer: &'a str,
	/// Deadline for the whole round trip.
	pub timeout: Option<StdDuration>,
}
impl Debug for ResourceRequest<'_> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ResourceRequest")
			.field("url", &self.url.as_str())
			.field("bearer", &"<redacted>")
			.field("timeout", &self.timeout)
			.finish()
	}
}

/// Status and raw body of a resource read.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceResponse {
	/// HTTP status code.
	pub status: u16,
	/// Raw response body.
	pub body: Vec<u8>,
}
impl ResourceResponse {
	/// Returns `true` for 2xx statuses.
	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}
}

/// Captures metadata from the most recent HTTP response for downstream error mapping.
///
/// Additional metadata fields may be added in future releases, so downstream code
/// should construct values using field names instead of struct update syntax.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadata {
	/// HTTP status code returned by the token endpoint, if available.
	pub status: Option<u16>,
}

/// Thread-safe slot for sharing [`ResponseMetadata`] between transport and error layers.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadataSlot(Arc<Mutex<Option<ResponseMetadata>>>);
impl ResponseMetadataSlot {
	/// Stores new metadata for the current request.
	pub fn store(&self, meta: ResponseMetadata) {
		*self.0.lock() = Some(meta);
	}

	/// Returns the captured metadata, if any, consuming it from the slot.
	pub fn take(&self) -> Option<ResponseMetadata> {
		self.0.lock().take()
	}
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
///
/// Token requests should not follow redirects; configure any custom [`ReqwestClient`]
/// accordingly before wrapping it.
#[cfg(feature = "reqwest")]
#[derive(Clone, Default)]
pub struct ReqwestHttpClient(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	/// Builds a reqwest client that never follows redirects.
	pub fn new() -> Result<Self, crate::error::ConfigError> {
		let client = ReqwestClient::builder().redirect(reqwest::redirect::Policy::none()).build()?;

		Ok(Self(client))
	}

	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	pub(crate) fn instrumented(
		&self,
		slot: ResponseMetadataSlot,
		timeout: Option<StdDuration>,
	) -> InstrumentedHandle {
		InstrumentedHandle::new(self.0.clone(), slot, timeout)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestHttpClient {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl VendorHttpClient for ReqwestHttpClient {
	type Handle = InstrumentedHandle;
	type TransportError = ReqwestError;

	fn with_metadata(
		&self,
		slot: ResponseMetadataSlot,
		timeout: Option<StdDuration>,
	) -> Self::Handle {
		self.instrumented(slot, timeout)
	}

	fn get<'a>(&'a self, request: ResourceRequest<'a>) -> ResourceFuture<'a, Self::TransportError> {
		Box::pin(async move {
			let mut builder = self.0.get(request.url.clone()).bearer_auth(request.bearer);

			if let Some(timeout) = request.timeout {
				builder = builder.timeout(timeout);
			}

			let response = builder.send().await?;
			let status = response.status().as_u16();
			let body = response.bytes().await?.to_vec();

			Ok(ResourceResponse { status, body })
		})
	}
}

#[cfg(feature = "reqwest")]
struct InstrumentedHttpClient {
	client: ReqwestClient,
	slot: ResponseMetadataSlot,
	timeout: Option<StdDuration>,
}

/// Handle returned by [`ReqwestHttpClient`] that satisfies [`VendorHttpClient::Handle`].
#[cfg(feature = "reqwest")]
#[derive(Clone)]
pub struct InstrumentedHandle(Arc<InstrumentedHttpClient>);
#[cfg(feature = "reqwest")]
impl InstrumentedHandle {
	fn new(client: ReqwestClient, slot: ResponseMetadataSlot, timeout: Option<StdDuration>) -> Self {
		Self(Arc::new(InstrumentedHttpClient { client, slot, timeout }))
	}
}
#[cfg(feature = "reqwest")]
impl<'c> AsyncHttpClient<'c> for InstrumentedHandle {
	type Error = HttpClientError<ReqwestError>;
	type Future =
		Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send + Sync>>;

	fn call(&'c self, request: HttpRequest) -> Self::Future {
		let client = Arc::clone(&self.0);

		Box::pin(async move {
			client.slot.take();

			let mut request: reqwest::Request = request.try_into().map_err(Box::new)?;

			if let Some(timeout) = client.timeout {
				*request.timeout_mut() = Some(timeout);
			}

			let response = client.client.execute(request).await.map_err(Box::new)?;
			let status = response.status();
			let headers = response.headers().to_owned();

			client.slot.store(ResponseMetadata { status: Some(status.as_u16()) });

			let mut response_new =
				HttpResponse::new(response.bytes().await.map_err(Box::new)?.to_vec());

			*response_new.status_mut() = status;
			*response_new.headers_mut() = headers;

			Ok(response_new)
		})
	}
}
