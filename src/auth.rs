//! Auth-domain models: credentials, redacted secrets, scope sets, and grant labels.

pub mod credential;
pub mod grant;
pub mod scope;
pub mod secret;

pub use credential::*;
pub use grant::*;
pub use scope::*;
pub use secret::*;
