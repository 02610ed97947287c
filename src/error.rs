//! Client-level error types shared across the store, authenticator, and executor.

// self
use crate::{_prelude::*, auth::GrantType};

/// Client-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical client error exposed by public APIs.
///
/// Every variant is returned as a value; deciding whether a failure is fatal to the whole
/// process is left to the caller.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Credential store read/write failure.
	#[error("{0}")]
	Persistence(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS, timeout) while reading a resource.
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// A grant exchange against the token endpoint failed.
	#[error(transparent)]
	AuthExchange(#[from] ExchangeError),
	/// Envelope could not be unwrapped into the requested shape.
	#[error(transparent)]
	Envelope(#[from] crate::envelope::EnvelopeError),

	/// The password fallback, the last remaining grant, failed.
	#[error("Could not get a token for {username}.")]
	PasswordGrantFailed {
		/// Username that could not be authenticated.
		username: String,
		/// Exchange failure reported by the token endpoint or transport.
		#[source]
		source: Box<Error>,
	},
	/// No cached, refreshable, or password-backed credential exists.
	#[error("No usable credential is available: {reason}.")]
	CredentialUnavailable {
		/// Explanation of which paths were unavailable.
		reason: String,
	},
	/// A request was rejected again right after a successful reauthentication.
	#[error("Request to {url} was rejected with HTTP {status} after reauthenticating.")]
	ReauthRejected {
		/// Resource that rejected the renewed credential.
		url: Url,
		/// Rejection status returned by the retried request.
		status: u16,
	},
	/// Upstream answered with a non-success status unrelated to authentication.
	#[error("Upstream returned HTTP {status}: {body}.")]
	Upstream {
		/// HTTP status code.
		status: u16,
		/// Response body, decoded lossily for diagnosis.
		body: String,
	},
}
impl From<crate::auth::ScopeValidationError> for Error {
	fn from(e: crate::auth::ScopeValidationError) -> Self {
		ConfigError::from(e).into()
	}
}

/// Configuration and validation failures raised by the client.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// The token endpoint URL was rejected by the OAuth client.
	#[error("Token endpoint URL is invalid.")]
	InvalidTokenEndpoint {
		/// Underlying parsing failure.
		#[source]
		source: oauth2::url::ParseError,
	},
	/// A resource path could not be joined onto the API base URL.
	#[error("Resource path `{path}` cannot be joined onto the API base URL.")]
	InvalidResourcePath {
		/// Offending path.
		path: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Endpoints must use HTTPS unless they point at a loopback host.
	#[error("The {endpoint} endpoint must use HTTPS: {url}.")]
	InsecureEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Endpoint URL that failed validation.
		url: String,
	},
	/// A required configuration field was empty.
	#[error("The {field} must not be empty.")]
	MissingField {
		/// Name of the empty field.
		field: &'static str,
	},
	/// Only one half of the password credentials was supplied.
	#[error("Username and password must be supplied together.")]
	IncompletePasswordCredentials,
	/// Requested scopes cannot be normalized.
	#[error("Requested scopes are invalid.")]
	InvalidScope(#[from] crate::auth::ScopeValidationError),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Grant exchange failures. Each one is recoverable by falling through to the next grant
/// strategy; it becomes fatal only once every strategy is exhausted.
#[derive(Debug, ThisError)]
pub enum ExchangeError {
	/// Token endpoint answered with an OAuth error payload.
	#[error("Token endpoint rejected the {grant} grant: {reason}.")]
	Rejected {
		/// Grant that was attempted.
		grant: GrantType,
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Provider-supplied `error` / `error_description` summary.
		reason: String,
	},
	/// Token endpoint responded with JSON that could not be parsed.
	#[error("Token endpoint returned a malformed {grant} response.")]
	MalformedResponse {
		/// Grant that was attempted.
		grant: GrantType,
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// Token response parsed but cannot produce a usable credential.
	#[error("Token endpoint returned an unusable {grant} response: {reason}.")]
	InvalidResponse {
		/// Grant that was attempted.
		grant: GrantType,
		/// What was wrong with the response.
		reason: &'static str,
	},
	/// Token endpoint responded in a way the OAuth client could not classify.
	#[error("Token endpoint returned an unexpected {grant} response: {message}.")]
	Unexpected {
		/// Grant that was attempted.
		grant: GrantType,
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Client-supplied message summarizing the failure.
		message: String,
	},
	/// Network or I/O failure while calling the token endpoint.
	#[error("Transport failure during the {grant} grant.")]
	Transport {
		/// Grant that was attempted.
		grant: GrantType,
		/// Underlying transport failure.
		#[source]
		source: TransportError,
	},
}
impl ExchangeError {
	/// Grant associated with the failure.
	pub fn grant(&self) -> GrantType {
		match self {
			Self::Rejected { grant, .. }
			| Self::MalformedResponse { grant, .. }
			| Self::InvalidResponse { grant, .. }
			| Self::Unexpected { grant, .. }
			| Self::Transport { grant, .. } => *grant,
		}
	}

	/// HTTP status reported by the token endpoint, when one was received.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Rejected { status, .. }
			| Self::MalformedResponse { status, .. }
			| Self::Unexpected { status, .. } => *status,
			Self::InvalidResponse { .. } | Self::Transport { .. } => None,
		}
	}
}

/// Transport-level failures (network, IO, deadline).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the Netatmo API.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// The call did not complete before its deadline.
	#[error("Request to the Netatmo API timed out.")]
	TimedOut {
		/// Transport-specific timeout error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the Netatmo API.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}

	/// Wraps a transport-specific timeout error.
	pub fn timed_out(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::TimedOut { source: Box::new(src) }
	}

	/// Returns `true` when the failure was a missed deadline.
	pub fn is_timeout(&self) -> bool {
		matches!(self, Self::TimedOut { .. })
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		if e.is_timeout() { Self::timed_out(e) } else { Self::network(e) }
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::store::StoreError;

	#[test]
	fn store_error_converts_into_client_error_with_source() {
		let store_error = StoreError::Backend { message: "disk full".into() };
		let client_error: Error = store_error.clone().into();

		assert!(matches!(client_error, Error::Persistence(_)));
		assert!(client_error.to_string().contains("disk full"));

		let source = StdError::source(&client_error)
			.expect("Client error should expose the original store error as its source.");

		assert_eq!(source.to_string(), store_error.to_string());
	}

	#[test]
	fn password_failure_names_the_username() {
		let exchange = ExchangeError::Rejected {
			grant: GrantType::Password,
			status: Some(400),
			reason: "invalid_grant".into(),
		};
		let err = Error::PasswordGrantFailed {
			username: "station-owner@example.com".into(),
			source: Box::new(exchange.into()),
		};

		assert_eq!(err.to_string(), "Could not get a token for station-owner@example.com.");
		assert!(
			StdError::source(&err)
				.expect("Password failure should expose the exchange error.")
				.to_string()
				.contains("password grant")
		);
	}

	#[test]
	fn exchange_error_accessors_report_grant_and_status() {
		let err = ExchangeError::Rejected {
			grant: GrantType::RefreshToken,
			status: Some(400),
			reason: "invalid_grant".into(),
		};

		assert_eq!(err.grant(), GrantType::RefreshToken);
		assert_eq!(err.status(), Some(400));

		let err = ExchangeError::InvalidResponse {
			grant: GrantType::Password,
			reason: "access_token is empty",
		};

		assert_eq!(err.status(), None);
	}
}
