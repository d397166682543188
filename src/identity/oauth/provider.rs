use url::Url;

use crate::identity::error::{invalid_config, IdentityResult};
use crate::identity::model::{ExternalProfile, ProviderKind};

/// Maps a provider-specific profile response body onto the common
/// [`ExternalProfile`] shape.
pub type ProfileNormalizer = fn(&serde_json::Value) -> IdentityResult<ExternalProfile>;

/// Configuration for one OAuth identity provider.
///
/// Carries the endpoints, scopes, and client key material for a provider,
/// plus the profile normalizer applied after the token exchange. Instances
/// are usually produced by the factories in
/// [`providers`](crate::identity::oauth::providers); constructing one by hand
/// is only needed for tests or self-hosted providers.
#[derive(Clone, Debug)]
pub struct ProviderConfig {
    provider_id: String,
    kind: ProviderKind,
    authorization_endpoint: String,
    token_endpoint: String,
    profile_endpoint: String,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    scopes: Vec<String>,
    pkce_required: bool,
    normalizer: ProfileNormalizer,
}

impl ProviderConfig {
    pub fn new(
        provider_id: impl Into<String>,
        kind: ProviderKind,
        authorization_endpoint: impl Into<String>,
        token_endpoint: impl Into<String>,
        profile_endpoint: impl Into<String>,
        normalizer: ProfileNormalizer,
    ) -> Self {
        Self {
            provider_id: provider_id.into(),
            kind,
            authorization_endpoint: authorization_endpoint.into(),
            token_endpoint: token_endpoint.into(),
            profile_endpoint: profile_endpoint.into(),
            client_id: String::new(),
            client_secret: String::new(),
            redirect_uri: String::new(),
            scopes: Vec::new(),
            pkce_required: false,
            normalizer,
        }
    }

    /// Installs the app's registered client key material for this provider.
    /// The secret never leaves the process through any client store.
    pub fn set_keys(
        &mut self,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> &mut Self {
        self.client_id = client_id.into();
        self.client_secret = client_secret.into();
        self.redirect_uri = redirect_uri.into();
        self
    }

    pub fn add_scope(&mut self, scope: impl Into<String>) -> &mut Self {
        let value = scope.into();
        if !self.scopes.contains(&value) {
            self.scopes.push(value);
        }
        self
    }

    pub fn require_pkce(&mut self) -> &mut Self {
        self.pkce_required = true;
        self
    }

    pub fn provider_id(&self) -> &str {
        &self.provider_id
    }

    pub fn kind(&self) -> ProviderKind {
        self.kind
    }

    pub fn token_endpoint(&self) -> &str {
        &self.token_endpoint
    }

    pub fn profile_endpoint(&self) -> &str {
        &self.profile_endpoint
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn client_secret(&self) -> &str {
        &self.client_secret
    }

    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    pub fn pkce_required(&self) -> bool {
        self.pkce_required
    }

    pub fn normalize_profile(&self, body: &serde_json::Value) -> IdentityResult<ExternalProfile> {
        (self.normalizer)(body)
    }

    /// Builds the authorization redirect URL for one attempt.
    ///
    /// `code_challenge` must be present exactly when the provider requires
    /// PKCE; the state guard produces both values together.
    pub fn authorize_url(
        &self,
        state: &str,
        code_challenge: Option<&str>,
    ) -> IdentityResult<String> {
        if self.client_id.is_empty() || self.redirect_uri.is_empty() {
            return Err(invalid_config(format!(
                "Provider {} has no client keys installed",
                self.provider_id
            )));
        }

        let mut url = Url::parse(&self.authorization_endpoint).map_err(|err| {
            invalid_config(format!(
                "Invalid authorization endpoint for provider {}: {err}",
                self.provider_id
            ))
        })?;

        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("response_type", "code");
            pairs.append_pair("client_id", &self.client_id);
            pairs.append_pair("redirect_uri", &self.redirect_uri);
            if !self.scopes.is_empty() {
                pairs.append_pair("scope", &self.scopes.join(" "));
            }
            pairs.append_pair("state", state);
            if let Some(challenge) = code_challenge {
                pairs.append_pair("code_challenge", challenge);
                pairs.append_pair("code_challenge_method", "S256");
            }
        }

        Ok(url.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::error::IdentityErrorCode;
    use crate::identity::oauth::providers::normalize_discord_profile;

    fn test_provider() -> ProviderConfig {
        let mut provider = ProviderConfig::new(
            "example.com",
            ProviderKind::Discord,
            "https://example.com/authorize",
            "https://example.com/token",
            "https://example.com/me",
            normalize_discord_profile,
        );
        provider.set_keys("the-client", "the-secret", "https://app.test/callback");
        provider.add_scope("identify");
        provider
    }

    #[test]
    fn authorize_url_carries_code_state_and_scope() {
        let url = test_provider().authorize_url("state-1", None).unwrap();
        assert!(url.contains("response_type=code"));
        assert!(url.contains("client_id=the-client"));
        assert!(url.contains("scope=identify"));
        assert!(url.contains("state=state-1"));
        assert!(!url.contains("code_challenge"));
        assert!(!url.contains("the-secret"));
    }

    #[test]
    fn authorize_url_appends_pkce_challenge_when_given() {
        let url = test_provider()
            .authorize_url("state-1", Some("challenge-value"))
            .unwrap();
        assert!(url.contains("code_challenge=challenge-value"));
        assert!(url.contains("code_challenge_method=S256"));
    }

    #[test]
    fn authorize_url_requires_installed_keys() {
        let provider = ProviderConfig::new(
            "example.com",
            ProviderKind::Discord,
            "https://example.com/authorize",
            "https://example.com/token",
            "https://example.com/me",
            normalize_discord_profile,
        );
        let err = provider.authorize_url("state-1", None).unwrap_err();
        assert_eq!(err.code, IdentityErrorCode::InvalidConfig);
    }

    #[test]
    fn duplicate_scopes_are_ignored() {
        let mut provider = test_provider();
        provider.add_scope("identify");
        assert_eq!(provider.scopes().len(), 1);
    }
}
