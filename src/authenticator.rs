//! Credential lifecycle: cached reuse, refresh grant, password fallback.
//!
//! The [`Authenticator`] owns the in-memory credential and drives it through
//! [`AuthStage`] transitions. Every transition that may hit the token endpoint runs behind a
//! single async mutex so concurrent callers observing the same rejected credential trigger
//! one exchange; the others wake up, notice the credential was replaced, and reuse it.
//! Reads of the current credential only touch a short-lived `RwLock` and never wait on an
//! in-flight exchange unless the credential is unusable.

mod metrics;

pub use metrics::AuthMetrics;

// self
use crate::{
	_prelude::*,
	auth::{Credential, TokenSecret},
	config::Config,
	http::VendorHttpClient,
	oauth::{TokenExchange, TransportErrorMapper},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	store::{CredentialStore, StoreError},
};

/// How the current credential was obtained.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialSource {
	/// Loaded from the credential store without a network call.
	Cached,
	/// Issued by a refresh grant.
	Refresh,
	/// Issued by the password grant fallback.
	Password,
}
impl CredentialSource {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			CredentialSource::Cached => "cached",
			CredentialSource::Refresh => "refresh",
			CredentialSource::Password => "password",
		}
	}
}

/// Authenticator state machine stages.
///
/// `Authenticated` is re-enterable: a reauthentication walks `TryRefresh` and
/// `TryPasswordFallback` again. `Failed` is terminal for the attempt that produced it; a
/// later call starts over.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthStage {
	/// No attempt has run yet.
	#[default]
	Unauthenticated,
	/// Loading the stored credential.
	TryCached,
	/// Running the refresh grant.
	TryRefresh,
	/// Running the password grant.
	TryPasswordFallback,
	/// A usable credential is held.
	Authenticated(CredentialSource),
	/// Every available strategy failed.
	Failed,
}
impl AuthStage {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			AuthStage::Unauthenticated => "unauthenticated",
			AuthStage::TryCached => "try_cached",
			AuthStage::TryRefresh => "try_refresh",
			AuthStage::TryPasswordFallback => "try_password_fallback",
			AuthStage::Authenticated(_) => "authenticated",
			AuthStage::Failed => "failed",
		}
	}

	/// Returns `true` once a usable credential was obtained.
	pub const fn is_authenticated(self) -> bool {
		matches!(self, AuthStage::Authenticated(_))
	}
}
impl Display for AuthStage {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			AuthStage::Authenticated(source) => write!(f, "authenticated ({})", source.as_str()),
			stage => f.write_str(stage.as_str()),
		}
	}
}

/// Result of a successful authentication attempt.
#[derive(Clone, Debug)]
pub struct AuthOutcome {
	/// Credential now held by the authenticator.
	pub credential: Credential,
	/// Strategy that produced it.
	pub source: CredentialSource,
	/// Store failure hit while persisting the credential, if any.
	///
	/// The credential is still usable; it just will not survive a restart.
	pub persist_error: Option<StoreError>,
}

#[derive(Debug, Default)]
struct AuthState {
	stage: AuthStage,
	credential: Option<Credential>,
	// Latest refresh token known to this process; outranks the stored and configured ones.
	refresh_token: Option<TokenSecret>,
	// Access token the server rejected; a stored copy of it is never reused.
	rejected_access: Option<TokenSecret>,
	last_persist_error: Option<StoreError>,
}

/// Obtains, renews, and persists the credential used by the request executor.
pub struct Authenticator<C, M>
where
	C: ?Sized + VendorHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	config: Arc<Config>,
	store: Arc<dyn CredentialStore>,
	http_client: Arc<C>,
	transport_mapper: Arc<M>,
	metrics: Arc<AuthMetrics>,
	state: RwLock<AuthState>,
	transition: AsyncMutex<()>,
}
impl<C, M> Authenticator<C, M>
where
	C: ?Sized + VendorHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates an authenticator in the [`AuthStage::Unauthenticated`] stage.
	///
	/// Nothing is loaded or exchanged until the first call that needs a credential.
	pub fn new(
		config: Arc<Config>,
		store: Arc<dyn CredentialStore>,
		http_client: impl Into<Arc<C>>,
		mapper: impl Into<Arc<M>>,
	) -> Self {
		Self {
			config,
			store,
			http_client: http_client.into(),
			transport_mapper: mapper.into(),
			metrics: Default::default(),
			state: Default::default(),
			transition: AsyncMutex::new(()),
		}
	}

	/// Config the authenticator was built with.
	pub fn config(&self) -> &Config {
		&self.config
	}

	/// Current stage.
	pub fn stage(&self) -> AuthStage {
		self.state.read().stage
	}

	/// Credential currently held in memory, usable or not.
	pub fn current(&self) -> Option<Credential> {
		self.state.read().credential.clone()
	}

	/// Refresh token the next refresh grant would send.
	pub fn refresh_token(&self) -> Option<TokenSecret> {
		self.state.read().refresh_token.clone().or_else(|| self.config.refresh_token.clone())
	}

	/// Activity counters.
	pub fn metrics(&self) -> &AuthMetrics {
		&self.metrics
	}

	/// Most recent store failure hit while persisting a credential.
	pub fn last_persist_error(&self) -> Option<StoreError> {
		self.state.read().last_persist_error.clone()
	}

	/// Runs the full chain: cached credential, refresh grant, password grant.
	///
	/// Grant exchanges honor [`Config::request_timeout`].
	pub async fn authenticate(&self) -> Result<AuthOutcome> {
		const KIND: FlowKind = FlowKind::Authenticate;

		let span = FlowSpan::new(KIND, "authenticate");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async {
				let _transition = self.transition.lock().await;

				self.run_chain(KIND, true, self.config.request_timeout).await
			})
			.await;

		record_result(KIND, &result);

		result
	}

	/// Returns the in-memory credential if usable, otherwise runs the full chain.
	pub async fn credential(&self) -> Result<Credential> {
		self.credential_within(self.config.request_timeout).await
	}

	/// Same as [`Authenticator::credential`], bounding each grant exchange by `timeout`.
	pub async fn credential_within(&self, timeout: Option<StdDuration>) -> Result<Credential> {
		const KIND: FlowKind = FlowKind::Authenticate;

		if let Some(credential) = self.usable_credential() {
			return Ok(credential);
		}

		let span = FlowSpan::new(KIND, "credential");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async {
				let _transition = self.transition.lock().await;

				// Another task may have finished a transition while we waited.
				if let Some(credential) = self.usable_credential() {
					return Ok(credential);
				}

				self.run_chain(KIND, true, timeout).await.map(|outcome| outcome.credential)
			})
			.await;

		record_result(KIND, &result);

		result
	}

	/// Replaces a credential the server rejected, skipping the cache.
	///
	/// If the held credential no longer matches `rejected`, another task already
	/// reauthenticated and its credential is returned without a network call. The rejected
	/// access token is remembered so a stored copy of it is never adopted again.
	pub async fn reauthenticate(&self, rejected: &Credential) -> Result<Credential> {
		self.reauthenticate_within(rejected, self.config.request_timeout).await
	}

	/// Same as [`Authenticator::reauthenticate`], bounding each grant exchange by `timeout`.
	pub async fn reauthenticate_within(
		&self,
		rejected: &Credential,
		timeout: Option<StdDuration>,
	) -> Result<Credential> {
		const KIND: FlowKind = FlowKind::Reauthenticate;

		let span = FlowSpan::new(KIND, "reauthenticate");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async {
				let _transition = self.transition.lock().await;
				let replacement = self.usable_credential().filter(|current| {
					current.access_token != rejected.access_token
				});

				if let Some(credential) = replacement {
					return Ok(credential);
				}

				self.metrics.record_reauthentication();

				{
					let mut state = self.state.write();

					state.credential = None;
					state.rejected_access = Some(rejected.access_token.clone());
				}

				self.run_chain(KIND, false, timeout).await.map(|outcome| outcome.credential)
			})
			.await;

		record_result(KIND, &result);

		result
	}

	fn usable_credential(&self) -> Option<Credential> {
		self.state.read().credential.as_ref().filter(|credential| credential.is_usable()).cloned()
	}

	fn set_stage(&self, kind: FlowKind, stage: AuthStage) {
		self.state.write().stage = stage;

		obs::record_transition(kind, stage.as_str());
	}

	fn is_rejected(&self, credential: &Credential) -> bool {
		self.state.read().rejected_access.as_ref() == Some(&credential.access_token)
	}

	// Callers must hold `transition`.
	async fn run_chain(
		&self,
		kind: FlowKind,
		use_cache: bool,
		timeout: Option<StdDuration>,
	) -> Result<AuthOutcome> {
		let mut stored_refresh = None;

		if use_cache {
			self.set_stage(kind, AuthStage::TryCached);

			match self.store.load().await {
				Ok(Some(stored)) if stored.is_reusable() && !self.is_rejected(&stored) =>
					return Ok(self.adopt_cached(kind, stored)),
				Ok(Some(stored)) => stored_refresh = stored.refresh_token,
				Ok(None) => (),
				Err(e) => obs::record_absorbed_failure(kind, "load", &e),
			}
		}

		let refresh_token = {
			let state = self.state.read();

			state.refresh_token.clone()
		}
		.or(stored_refresh)
		.or_else(|| self.config.refresh_token.clone());
		let exchange = <TokenExchange<C, M>>::from_config(
			&self.config,
			self.http_client.clone(),
			self.transport_mapper.clone(),
		)
		.inspect_err(|_| self.set_stage(kind, AuthStage::Failed))?
		.timeout(timeout);
		let mut refresh_error = None;

		if let Some(refresh_token) = refresh_token {
			self.set_stage(kind, AuthStage::TryRefresh);
			self.metrics.record_refresh_attempt();
			obs::record_flow_outcome(FlowKind::Refresh, FlowOutcome::Attempt);

			match FlowSpan::new(FlowKind::Refresh, "refresh_grant")
				.instrument(exchange.refresh(&refresh_token))
				.await
			{
				Ok(credential) => {
					obs::record_flow_outcome(FlowKind::Refresh, FlowOutcome::Success);

					return Ok(self.adopt(kind, credential, CredentialSource::Refresh).await);
				},
				Err(e) => {
					self.metrics.record_refresh_failure();
					obs::record_flow_outcome(FlowKind::Refresh, FlowOutcome::Failure);
					obs::record_absorbed_failure(kind, "refresh", &e);

					refresh_error = Some(e);
				},
			}
		}

		let Some((username, password)) = self.config.password_credentials() else {
			self.set_stage(kind, AuthStage::Failed);

			return Err(refresh_error.unwrap_or_else(|| Error::CredentialUnavailable {
				reason: "no stored credential, refresh token, or password credentials".into(),
			}));
		};

		self.set_stage(kind, AuthStage::TryPasswordFallback);
		self.metrics.record_password_attempt();
		obs::record_flow_outcome(FlowKind::Password, FlowOutcome::Attempt);

		match FlowSpan::new(FlowKind::Password, "password_grant")
			.instrument(exchange.password(username, password, &self.config.scopes))
			.await
		{
			Ok(credential) => {
				obs::record_flow_outcome(FlowKind::Password, FlowOutcome::Success);

				Ok(self.adopt(kind, credential, CredentialSource::Password).await)
			},
			Err(e) => {
				self.metrics.record_password_failure();
				obs::record_flow_outcome(FlowKind::Password, FlowOutcome::Failure);
				self.set_stage(kind, AuthStage::Failed);

				Err(Error::PasswordGrantFailed { username: username.to_owned(), source: Box::new(e) })
			},
		}
	}

	fn adopt_cached(&self, kind: FlowKind, stored: Credential) -> AuthOutcome {
		let stage = AuthStage::Authenticated(CredentialSource::Cached);

		self.metrics.record_cache_hit();

		{
			let mut state = self.state.write();

			if state.refresh_token.is_none() {
				state.refresh_token = stored.refresh_token.clone();
			}

			state.credential = Some(stored.clone());
			state.stage = stage;
		}

		obs::record_transition(kind, stage.as_str());

		AuthOutcome { credential: stored, source: CredentialSource::Cached, persist_error: None }
	}

	async fn adopt(
		&self,
		kind: FlowKind,
		credential: Credential,
		source: CredentialSource,
	) -> AuthOutcome {
		let stage = AuthStage::Authenticated(source);
		let persist_error = match self.store.save(credential.clone()).await {
			Ok(()) => None,
			Err(e) => {
				self.metrics.record_persist_failure();
				obs::record_absorbed_failure(kind, "persist", &e);

				Some(e)
			},
		};

		{
			let mut state = self.state.write();

			if credential.refresh_token.is_some() {
				state.refresh_token = credential.refresh_token.clone();
			}
			if persist_error.is_some() {
				state.last_persist_error = persist_error.clone();
			}

			state.credential = Some(credential.clone());
			state.stage = stage;
		}

		obs::record_transition(kind, stage.as_str());

		AuthOutcome { credential, source, persist_error }
	}
}
impl<C, M> Debug for Authenticator<C, M>
where
	C: ?Sized + VendorHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let state = self.state.read();

		f.debug_struct("Authenticator")
			.field("client_id", &self.config.client_id)
			.field("stage", &state.stage)
			.field("credential", &state.credential)
			.finish()
	}
}

fn record_result<T>(kind: FlowKind, result: &Result<T>) {
	match result {
		Ok(_) => obs::record_flow_outcome(kind, FlowOutcome::Success),
		Err(_) => obs::record_flow_outcome(kind, FlowOutcome::Failure),
	}
}
