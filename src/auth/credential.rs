//! Persisted credential model and its validity rules.

// crates.io
use serde::{Deserializer, Serializer, de::Error as DeError, ser::Error as SerError};
use time::format_description::well_known::Rfc3339;
// self
use crate::{_prelude::*, auth::TokenSecret};

/// Validity classification for a credential at a given instant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CredentialStatus {
	/// Access token is present and not within the expiry leeway.
	Usable,
	/// Access token expired (or expires within the leeway).
	Expired,
	/// Access token is empty; the record can only seed a refresh grant.
	Empty,
}

/// Authentication state obtained from a grant exchange or loaded from a store.
///
/// A credential authorizes requests only while [`Credential::is_usable_at`] holds: the
/// access token is non-empty and the expiry, when known, lies beyond
/// [`Credential::EXPIRY_LEEWAY`].
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
	/// Access token presented as a bearer credential; callers must avoid logging it.
	pub access_token: TokenSecret,
	/// Refresh token, rotated by the vendor on each refresh.
	#[serde(
		default,
		deserialize_with = "deserialize_refresh_token",
		skip_serializing_if = "Option::is_none"
	)]
	pub refresh_token: Option<TokenSecret>,
	/// Expiry instant; `None` means the server did not report a lifetime.
	#[serde(default, with = "expiry_format", skip_serializing_if = "Option::is_none")]
	pub expiry: Option<OffsetDateTime>,
}
impl Credential {
	/// Tokens expiring within this window are treated as already expired.
	pub const EXPIRY_LEEWAY: Duration = Duration::seconds(10);

	/// Creates a credential with an unknown expiry and no refresh token.
	pub fn new(access_token: impl Into<String>) -> Self {
		Self { access_token: TokenSecret::new(access_token), refresh_token: None, expiry: None }
	}

	/// Creates a non-usable record that only carries a refresh token.
	pub fn refresh_only(refresh_token: impl Into<String>) -> Self {
		Self {
			access_token: TokenSecret::default(),
			refresh_token: TokenSecret::non_empty(refresh_token),
			expiry: None,
		}
	}

	/// Sets the refresh token; empty strings clear it.
	pub fn with_refresh_token(mut self, token: impl Into<String>) -> Self {
		self.refresh_token = TokenSecret::non_empty(token);

		self
	}

	/// Sets an absolute expiry instant.
	pub fn expires_at(mut self, instant: OffsetDateTime) -> Self {
		self.expiry = Some(instant);

		self
	}

	/// Sets the expiry relative to `issued_at`.
	pub fn expires_in(self, issued_at: OffsetDateTime, lifetime: Duration) -> Self {
		self.expires_at(issued_at + lifetime)
	}

	/// Computes the credential status at a given instant.
	pub fn status_at(&self, instant: OffsetDateTime) -> CredentialStatus {
		if self.access_token.is_empty() {
			return CredentialStatus::Empty;
		}

		match self.expiry {
			Some(expiry) if instant + Self::EXPIRY_LEEWAY >= expiry => CredentialStatus::Expired,
			_ => CredentialStatus::Usable,
		}
	}

	/// Convenience helper that checks the status using the current UTC instant.
	pub fn status(&self) -> CredentialStatus {
		self.status_at(OffsetDateTime::now_utc())
	}

	/// Returns `true` if the credential may authorize a request at `instant`.
	pub fn is_usable_at(&self, instant: OffsetDateTime) -> bool {
		matches!(self.status_at(instant), CredentialStatus::Usable)
	}

	/// Returns `true` if the credential may authorize a request right now.
	pub fn is_usable(&self) -> bool {
		matches!(self.status(), CredentialStatus::Usable)
	}

	/// Returns `true` if a stored copy may be reused at `instant` without a grant exchange.
	///
	/// Stricter than [`Credential::is_usable_at`]: a record with an unknown expiry is never
	/// reused from a store.
	pub fn is_reusable_at(&self, instant: OffsetDateTime) -> bool {
		self.expiry.is_some() && self.is_usable_at(instant)
	}

	/// Returns `true` if a stored copy may be reused right now.
	pub fn is_reusable(&self) -> bool {
		self.is_reusable_at(OffsetDateTime::now_utc())
	}
}
impl Debug for Credential {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Credential")
			.field("access_token", &"<redacted>")
			.field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
			.field("expiry", &self.expiry)
			.finish()
	}
}

fn deserialize_refresh_token<'de, D>(deserializer: D) -> Result<Option<TokenSecret>, D::Error>
where
	D: Deserializer<'de>,
{
	Ok(<Option<String>>::deserialize(deserializer)?.and_then(TokenSecret::non_empty))
}

mod expiry_format {
	// self
	use super::*;

	pub(super) fn serialize<S>(value: &Option<OffsetDateTime>, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		match value {
			Some(instant) =>
				serializer.serialize_str(&instant.format(&Rfc3339).map_err(SerError::custom)?),
			None => serializer.serialize_none(),
		}
	}

	// Go's zero `time.Time` (year 1) marks an unknown expiry in files written by Go tooling.
	pub(super) fn deserialize<'de, D>(deserializer: D) -> Result<Option<OffsetDateTime>, D::Error>
	where
		D: Deserializer<'de>,
	{
		let Some(raw) = <Option<String>>::deserialize(deserializer)? else {
			return Ok(None);
		};
		let raw = raw.trim();

		if raw.is_empty() {
			return Ok(None);
		}

		let instant = OffsetDateTime::parse(raw, &Rfc3339).map_err(DeError::custom)?;

		Ok(if instant.year() <= 1 { None } else { Some(instant) })
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	#[test]
	fn status_covers_empty_usable_and_expired() {
		let credential = Credential::new("access")
			.with_refresh_token("refresh")
			.expires_at(macros::datetime!(2025-01-01 01:00 UTC));

		assert_eq!(
			credential.status_at(macros::datetime!(2025-01-01 00:30 UTC)),
			CredentialStatus::Usable
		);
		assert_eq!(
			credential.status_at(macros::datetime!(2025-01-01 00:59:55 UTC)),
			CredentialStatus::Expired,
			"Expiry leeway must reject tokens about to lapse."
		);
		assert_eq!(
			credential.status_at(macros::datetime!(2025-01-01 01:00 UTC)),
			CredentialStatus::Expired
		);
		assert_eq!(Credential::refresh_only("refresh").status(), CredentialStatus::Empty);
	}

	#[test]
	fn unknown_expiry_stays_usable() {
		let credential = Credential::new("access");

		assert!(credential.is_usable());
		assert!(credential.is_usable_at(macros::datetime!(2100-01-01 00:00 UTC)));
		assert!(!credential.is_reusable(), "Unknown expiry must not be reused from a store.");
	}

	#[test]
	fn reuse_requires_known_future_expiry() {
		let now = macros::datetime!(2025-01-01 00:00 UTC);
		let fresh = Credential::new("access").expires_at(macros::datetime!(2025-01-01 01:00 UTC));
		let lapsed = Credential::new("access").expires_at(macros::datetime!(2024-12-31 23:00 UTC));

		assert!(fresh.is_reusable_at(now));
		assert!(!lapsed.is_reusable_at(now));
		assert!(!Credential::refresh_only("refresh").is_reusable_at(now));
	}

	#[test]
	fn builder_handles_relative_expiry() {
		let credential = Credential::new("secret")
			.expires_in(macros::datetime!(2025-01-01 00:00 UTC), Duration::hours(3));

		assert_eq!(credential.expiry, Some(macros::datetime!(2025-01-01 03:00 UTC)));
	}

	#[test]
	fn json_shape_matches_token_file() {
		let credential = Credential::new("access-1")
			.with_refresh_token("refresh-1")
			.expires_at(macros::datetime!(2025-03-04 05:06:07 UTC));
		let payload = serde_json::to_value(&credential).expect("Credential should serialize.");

		assert_eq!(
			payload,
			serde_json::json!({
				"access_token": "access-1",
				"refresh_token": "refresh-1",
				"expiry": "2025-03-04T05:06:07Z",
			})
		);
	}

	#[test]
	fn go_style_records_deserialize() {
		let raw = r#"{
			"access_token": "abc|def",
			"token_type": "Bearer",
			"refresh_token": "",
			"expiry": "0001-01-01T00:00:00Z"
		}"#;
		let credential: Credential =
			serde_json::from_str(raw).expect("Go-written token file should deserialize.");

		assert_eq!(credential.access_token.expose(), "abc|def");
		assert!(credential.refresh_token.is_none());
		assert!(credential.expiry.is_none());
		assert!(!credential.is_reusable(), "Go's zero expiry must force a grant exchange.");

		let with_offset: Credential = serde_json::from_str(
			r#"{"access_token":"a","refresh_token":"r","expiry":"2025-01-01T12:00:00.123456789+01:00"}"#,
		)
		.expect("RFC 3339 offsets and nanoseconds should deserialize.");

		assert_eq!(with_offset.expiry, Some(macros::datetime!(2025-01-01 11:00:00.123456789 UTC)));
	}

	#[test]
	fn debug_redacts_tokens() {
		let rendered = format!("{:?}", Credential::new("visible").with_refresh_token("hidden"));

		assert!(!rendered.contains("visible"));
		assert!(!rendered.contains("hidden"));
	}
}
