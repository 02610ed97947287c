//! OAuth 2.0 grant type labels.

// self
use crate::_prelude::*;

/// OAuth 2.0 grant types the client performs against the token endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
	/// Refresh Token grant, the primary renewal path.
	RefreshToken,
	/// Resource Owner Password Credentials grant, the fallback path.
	Password,
}
impl GrantType {
	/// Returns the RFC 6749 identifier for the grant type.
	pub const fn as_str(self) -> &'static str {
		match self {
			GrantType::RefreshToken => "refresh_token",
			GrantType::Password => "password",
		}
	}
}
impl Display for GrantType {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
