pub mod error;
pub mod link;
pub mod model;
pub mod oauth;
pub mod persistence;
pub mod resolve;

pub use error::{IdentityError, IdentityErrorCode, IdentityResult};
pub use link::{AccountStore, IdentityLinker, InMemoryAccountStore};
pub use model::{
    Account, ExternalProfile, LinkedIdentity, PrimarySession, ProviderKind, SecondaryClientRecord,
    SessionIdentity,
};
pub use oauth::{AuthorizeRedirect, CallbackParams};
pub use persistence::{ClientStore, InMemoryClientStore};
pub use resolve::{resolve_identity, HybridResolver, SECONDARY_ID_PREFIX};

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use crate::app::App;
use crate::logger::Logger;
use error::{invalid_config, missing_code, upstream_rejected};
use oauth::{ProviderConfig, StateGuard, TokenExchanger};

pub static LOGGER: LazyLock<Logger> = LazyLock::new(|| Logger::new("@castlink/identity"));

/// The identity-linking service: one instance per app.
///
/// Runs the provider-generic flow `begin -> redirect -> callback -> verify ->
/// exchange -> normalize -> link`, parameterized by the registered
/// [`ProviderConfig`]s. Token exchange completes fully before any account
/// mutation begins, so an exchange failure leaves zero persisted side
/// effects.
pub struct IdentityService {
    app: App,
    providers: HashMap<ProviderKind, ProviderConfig>,
    guard: StateGuard,
    exchanger: TokenExchanger,
    linker: IdentityLinker,
    resolver: HybridResolver,
}

impl IdentityService {
    pub fn builder(app: App) -> IdentityServiceBuilder {
        IdentityServiceBuilder::new(app)
    }

    pub fn app(&self) -> &App {
        &self.app
    }

    /// Client-store key under which the host app persists the
    /// [`SecondaryClientRecord`] after a platform-chat sign-in.
    pub fn secondary_record_key(&self) -> &str {
        self.resolver.record_key()
    }

    fn provider(&self, kind: ProviderKind) -> IdentityResult<&ProviderConfig> {
        self.providers.get(&kind).ok_or_else(|| {
            invalid_config(format!("No provider registered for kind {}", kind.as_str()))
        })
    }

    /// Starts an authorization attempt and returns the redirect to send the
    /// user to. Any previous pending attempt for the provider is replaced.
    pub fn begin_link(&self, kind: ProviderKind) -> IdentityResult<AuthorizeRedirect> {
        let provider = self.provider(kind)?;
        let started = self.guard.begin(provider)?;
        let url = provider.authorize_url(&started.state, started.code_challenge.as_deref())?;
        Ok(AuthorizeRedirect {
            provider_id: provider.provider_id().to_string(),
            url,
            state: started.state,
        })
    }

    /// Completes a callback: consumes the stored attempt, exchanges the code,
    /// and links the normalized profile onto the primary account.
    ///
    /// Every failure terminates the flow in a defined state; the attempt is
    /// spent regardless of outcome so a retry must start over with
    /// [`IdentityService::begin_link`].
    pub async fn complete_link(
        &self,
        primary: Option<&PrimarySession>,
        kind: ProviderKind,
        params: &CallbackParams,
    ) -> IdentityResult<Account> {
        let provider = self.provider(kind)?;
        let outcome = self.run_callback(primary, provider, kind, params).await;
        if let Err(err) = &outcome {
            LOGGER.error(format!(
                "{} link flow failed: {err}",
                provider.provider_id()
            ));
        }
        outcome
    }

    async fn run_callback(
        &self,
        primary: Option<&PrimarySession>,
        provider: &ProviderConfig,
        kind: ProviderKind,
        params: &CallbackParams,
    ) -> IdentityResult<Account> {
        if let Some(error) = &params.error {
            self.guard.cancel(provider.provider_id())?;
            let description = params.error_description.as_deref().unwrap_or("");
            return Err(upstream_rejected(
                None,
                format!(
                    "Provider {} returned {error}: {description}",
                    provider.provider_id()
                ),
            ));
        }
        let Some(code) = params.code.as_deref() else {
            self.guard.cancel(provider.provider_id())?;
            return Err(missing_code());
        };

        let returned_state = params.state.as_deref().unwrap_or_default();
        let attempt = self.guard.verify(provider.provider_id(), returned_state)?;

        let exchanged = self
            .exchanger
            .exchange(
                provider,
                code,
                attempt.code_verifier.as_deref(),
                provider.redirect_uri(),
            )
            .await?;

        self.linker
            .link(primary.map(|session| session.uid.as_str()), kind, &exchanged.profile)
            .await
    }

    pub async fn unlink(
        &self,
        primary: Option<&PrimarySession>,
        kind: ProviderKind,
    ) -> IdentityResult<Account> {
        let outcome = self
            .linker
            .unlink(primary.map(|session| session.uid.as_str()), kind)
            .await;
        if let Err(err) = &outcome {
            LOGGER.error(format!("{} unlink failed: {err}", kind.as_str()));
        }
        outcome
    }

    /// Resolves the logical identity for the current context. Pure with
    /// respect to explicit inputs; re-reads the client store on every call.
    pub fn resolve(&self, primary: Option<&PrimarySession>) -> Option<SessionIdentity> {
        self.resolver.resolve(primary)
    }

    pub async fn account(&self, uid: &str) -> IdentityResult<Option<Account>> {
        self.linker.store().fetch(uid).await
    }
}

pub struct IdentityServiceBuilder {
    app: App,
    client_store: Option<Arc<dyn ClientStore>>,
    account_store: Option<Arc<dyn AccountStore>>,
    providers: Vec<ProviderConfig>,
}

impl IdentityServiceBuilder {
    fn new(app: App) -> Self {
        Self {
            app,
            client_store: None,
            account_store: None,
            providers: Vec::new(),
        }
    }

    pub fn with_client_store(mut self, store: Arc<dyn ClientStore>) -> Self {
        self.client_store = Some(store);
        self
    }

    pub fn with_account_store(mut self, store: Arc<dyn AccountStore>) -> Self {
        self.account_store = Some(store);
        self
    }

    pub fn with_provider(mut self, provider: ProviderConfig) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn build(self) -> IdentityResult<IdentityService> {
        let client_store = self
            .client_store
            .unwrap_or_else(|| InMemoryClientStore::shared());
        let account_store = self
            .account_store
            .unwrap_or_else(|| InMemoryAccountStore::shared());

        let prefix = self.app.storage_prefix();
        let mut providers = HashMap::new();
        for provider in self.providers {
            if providers.insert(provider.kind(), provider).is_some() {
                return Err(invalid_config(
                    "Two providers registered for the same kind",
                ));
            }
        }

        Ok(IdentityService {
            guard: StateGuard::new(client_store.clone(), prefix.clone()),
            exchanger: TokenExchanger::new()?,
            linker: IdentityLinker::new(account_store),
            resolver: HybridResolver::new(client_store, format!("{prefix}:secondary-session")),
            app: self.app,
            providers,
        })
    }
}
