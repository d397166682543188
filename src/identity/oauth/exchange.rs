use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use crate::identity::error::{
    code_already_used, network, pkce_mismatch, upstream_rejected, IdentityError, IdentityResult,
};
use crate::identity::model::ExternalProfile;
use crate::identity::oauth::provider::ProviderConfig;

/// Outcome of a completed code exchange: the provider access token plus the
/// normalized profile it authenticates.
#[derive(Clone, Debug)]
pub struct ExchangedIdentity {
    pub access_token: String,
    pub profile: ExternalProfile,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Stateless translator from an authorization code to a provider profile.
///
/// Runs the two provider calls in sequence (code to token, token to profile)
/// and persists nothing. Authorization codes are single-use, so no request is
/// ever retried; a failure is classified and surfaced to the calling flow.
pub struct TokenExchanger {
    http: Client,
}

impl TokenExchanger {
    pub fn new() -> IdentityResult<Self> {
        let http = Client::builder()
            .user_agent(concat!("castlink/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| network(format!("Failed to build HTTP client: {err}")))?;
        Ok(Self { http })
    }

    pub async fn exchange(
        &self,
        provider: &ProviderConfig,
        code: &str,
        pkce_verifier: Option<&str>,
        redirect_uri: &str,
    ) -> IdentityResult<ExchangedIdentity> {
        if provider.pkce_required() && pkce_verifier.is_none() {
            return Err(pkce_mismatch(format!(
                "Provider {} requires a PKCE verifier and none was stored for this attempt",
                provider.provider_id()
            )));
        }

        let mut form: Vec<(&str, &str)> = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("client_id", provider.client_id()),
            ("client_secret", provider.client_secret()),
        ];
        if let Some(verifier) = pkce_verifier {
            form.push(("code_verifier", verifier));
        }

        log::debug!(
            "exchanging authorization code with provider {}",
            provider.provider_id()
        );

        let response = self
            .http
            .post(provider.token_endpoint())
            .form(&form)
            .send()
            .await
            .map_err(|err| network(format!("Token exchange request failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_token_failure(status.as_u16(), &body));
        }

        let token: TokenResponse = response.json().await.map_err(|err| {
            upstream_rejected(None, format!("Token response is not usable JSON: {err}"))
        })?;

        let response = self
            .http
            .get(provider.profile_endpoint())
            .bearer_auth(&token.access_token)
            .send()
            .await
            .map_err(|err| network(format!("Profile fetch request failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(upstream_rejected(
                Some(status.as_u16()),
                format!("Profile fetch rejected: {body}"),
            ));
        }

        let body: Value = response.json().await.map_err(|err| {
            upstream_rejected(None, format!("Profile response is not usable JSON: {err}"))
        })?;
        let profile = provider.normalize_profile(&body)?;

        Ok(ExchangedIdentity {
            access_token: token.access_token,
            profile,
        })
    }
}

/// Classifies a non-success token response per RFC 6749 error codes.
///
/// `invalid_grant` covers both a redeemed code and a failed PKCE check; the
/// description is the only way to tell the two apart.
fn classify_token_failure(status: u16, body: &str) -> IdentityError {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let error_code = parsed
        .as_ref()
        .and_then(|value| value.get("error"))
        .and_then(Value::as_str)
        .unwrap_or_default();
    let description = parsed
        .as_ref()
        .and_then(|value| value.get("error_description"))
        .and_then(Value::as_str)
        .unwrap_or_default();

    if error_code == "invalid_grant" {
        let lowered = description.to_ascii_lowercase();
        if lowered.contains("verifier") || lowered.contains("challenge") {
            return pkce_mismatch(format!("Token endpoint rejected the PKCE verifier: {description}"));
        }
        return code_already_used(format!(
            "Token endpoint rejected the authorization code: {description}"
        ));
    }

    upstream_rejected(Some(status), format!("Token exchange rejected: {body}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::error::IdentityErrorCode;
    use crate::identity::model::ProviderKind;
    use crate::identity::oauth::providers::normalize_twitter_profile;
    use httpmock::prelude::*;
    use serde_json::json;
    use std::panic::{self, AssertUnwindSafe};

    fn try_start_server() -> Option<MockServer> {
        panic::catch_unwind(AssertUnwindSafe(MockServer::start)).ok()
    }

    fn test_provider(server: &MockServer, pkce: bool) -> ProviderConfig {
        let mut provider = ProviderConfig::new(
            "twitter.com",
            ProviderKind::Twitter,
            server.url("/authorize"),
            server.url("/token"),
            server.url("/me"),
            normalize_twitter_profile,
        );
        provider.set_keys("client-id", "client-secret", "https://app.test/callback");
        if pkce {
            provider.require_pkce();
        }
        provider
    }

    #[tokio::test(flavor = "current_thread")]
    async fn exchange_returns_token_and_normalized_profile() {
        let Some(server) = try_start_server() else {
            eprintln!("Skipping exchange_returns_token_and_normalized_profile: no mock server");
            return;
        };
        let _token_mock = server.mock(|when, then| {
            when.method(POST)
                .path("/token")
                .body_contains("grant_type=authorization_code")
                .body_contains("code=abc123")
                .body_contains("code_verifier=v1")
                .body_contains("client_id=client-id");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({ "access_token": "tok-1", "token_type": "bearer" }));
        });
        let _profile_mock = server.mock(|when, then| {
            when.method(GET)
                .path("/me")
                .header("authorization", "Bearer tok-1");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({ "data": { "id": "42", "username": "alice", "name": "Alice" } }));
        });

        let exchanger = TokenExchanger::new().unwrap();
        let provider = test_provider(&server, true);
        let exchanged = exchanger
            .exchange(&provider, "abc123", Some("v1"), provider.redirect_uri())
            .await
            .unwrap();

        assert_eq!(exchanged.access_token, "tok-1");
        assert_eq!(exchanged.profile.id, "42");
        assert_eq!(exchanged.profile.username, "alice");
    }

    #[tokio::test(flavor = "current_thread")]
    async fn missing_verifier_fails_before_any_network_call() {
        let Some(server) = try_start_server() else {
            eprintln!("Skipping missing_verifier_fails_before_any_network_call: no mock server");
            return;
        };
        let token_mock = server.mock(|when, then| {
            when.method(POST).path("/token");
            then.status(200).json_body(json!({ "access_token": "tok" }));
        });

        let exchanger = TokenExchanger::new().unwrap();
        let provider = test_provider(&server, true);
        let err = exchanger
            .exchange(&provider, "abc123", None, provider.redirect_uri())
            .await
            .unwrap_err();

        assert_eq!(err.code, IdentityErrorCode::PkceMismatch);
        assert_eq!(token_mock.hits(), 0);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn redeemed_code_maps_to_code_already_used() {
        let Some(server) = try_start_server() else {
            eprintln!("Skipping redeemed_code_maps_to_code_already_used: no mock server");
            return;
        };
        let _token_mock = server.mock(|when, then| {
            when.method(POST).path("/token");
            then.status(400).json_body(json!({
                "error": "invalid_grant",
                "error_description": "authorization code has already been redeemed"
            }));
        });

        let exchanger = TokenExchanger::new().unwrap();
        let provider = test_provider(&server, false);
        let err = exchanger
            .exchange(&provider, "abc123", None, provider.redirect_uri())
            .await
            .unwrap_err();

        assert_eq!(err.code, IdentityErrorCode::CodeAlreadyUsed);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn rejected_verifier_maps_to_pkce_mismatch() {
        let Some(server) = try_start_server() else {
            eprintln!("Skipping rejected_verifier_maps_to_pkce_mismatch: no mock server");
            return;
        };
        let _token_mock = server.mock(|when, then| {
            when.method(POST).path("/token");
            then.status(400).json_body(json!({
                "error": "invalid_grant",
                "error_description": "code_verifier does not match the code_challenge"
            }));
        });

        let exchanger = TokenExchanger::new().unwrap();
        let provider = test_provider(&server, true);
        let err = exchanger
            .exchange(&provider, "abc123", Some("v2"), provider.redirect_uri())
            .await
            .unwrap_err();

        assert_eq!(err.code, IdentityErrorCode::PkceMismatch);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn profile_rejection_carries_the_upstream_status() {
        let Some(server) = try_start_server() else {
            eprintln!("Skipping profile_rejection_carries_the_upstream_status: no mock server");
            return;
        };
        let _token_mock = server.mock(|when, then| {
            when.method(POST).path("/token");
            then.status(200).json_body(json!({ "access_token": "tok-1" }));
        });
        let _profile_mock = server.mock(|when, then| {
            when.method(GET).path("/me");
            then.status(401).body("token revoked");
        });

        let exchanger = TokenExchanger::new().unwrap();
        let provider = test_provider(&server, false);
        let err = exchanger
            .exchange(&provider, "abc123", None, provider.redirect_uri())
            .await
            .unwrap_err();

        assert_eq!(err.code, IdentityErrorCode::UpstreamRejected);
        assert_eq!(err.status, Some(401));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn unclassified_token_failure_is_upstream_rejected() {
        let Some(server) = try_start_server() else {
            eprintln!("Skipping unclassified_token_failure_is_upstream_rejected: no mock server");
            return;
        };
        let _token_mock = server.mock(|when, then| {
            when.method(POST).path("/token");
            then.status(503).body("upstream maintenance");
        });

        let exchanger = TokenExchanger::new().unwrap();
        let provider = test_provider(&server, false);
        let err = exchanger
            .exchange(&provider, "abc123", None, provider.redirect_uri())
            .await
            .unwrap_err();

        assert_eq!(err.code, IdentityErrorCode::UpstreamRejected);
        assert_eq!(err.status, Some(503));
    }
}
