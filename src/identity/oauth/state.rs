use std::sync::{Arc, Mutex};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::identity::error::{attempt_expired, state_mismatch, storage, IdentityResult};
use crate::identity::oauth::pkce::PkcePair;
use crate::identity::oauth::provider::ProviderConfig;
use crate::identity::persistence::ClientStore;

/// Attempts older than this are rejected with `AttemptExpired` even when the
/// state matches. An abandoned callback page must not stay redeemable.
pub const ATTEMPT_MAX_AGE_SECS: i64 = 600;

const STATE_TOKEN_BYTES: usize = 32;

/// One stored authorization attempt. Created by [`StateGuard::begin`],
/// consumed exactly once by [`StateGuard::verify`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthAttempt {
    pub state: String,
    #[serde(rename = "codeVerifier")]
    pub code_verifier: Option<String>,
    #[serde(rename = "providerId")]
    pub provider_id: String,
    /// Seconds since the Unix epoch.
    #[serde(rename = "createdAt")]
    pub created_at: i64,
}

/// The caller-facing outcome of starting an attempt. The PKCE verifier is
/// intentionally absent: it stays in the client store until the callback.
#[derive(Clone, Debug)]
pub struct StartedAttempt {
    pub state: String,
    pub code_challenge: Option<String>,
}

/// Anti-forgery guard for OAuth authorization attempts.
///
/// One attempt per provider can be in flight at a time. `verify` deletes the
/// stored attempt before reporting any outcome, so a duplicate callback
/// delivery or a later replay observes the attempt as already consumed and
/// fails with `AttemptExpired`.
pub struct StateGuard {
    store: Arc<dyn ClientStore>,
    key_prefix: String,
    // Serializes consumption so two racing deliveries of the same callback
    // cannot both read the attempt before either deletes it.
    consume_lock: Mutex<()>,
}

impl StateGuard {
    pub fn new(store: Arc<dyn ClientStore>, key_prefix: impl Into<String>) -> Self {
        Self {
            store,
            key_prefix: key_prefix.into(),
            consume_lock: Mutex::new(()),
        }
    }

    fn attempt_key(&self, provider_id: &str) -> String {
        format!("{}:oauth-attempt:{}", self.key_prefix, provider_id)
    }

    /// Generates and stores a fresh attempt for the provider, replacing any
    /// attempt still pending for it.
    pub fn begin(&self, provider: &ProviderConfig) -> IdentityResult<StartedAttempt> {
        let pkce = provider.pkce_required().then(PkcePair::generate);
        let attempt = OAuthAttempt {
            state: random_state_token(),
            code_verifier: pkce.as_ref().map(|pair| pair.verifier().to_string()),
            provider_id: provider.provider_id().to_string(),
            created_at: Utc::now().timestamp(),
        };

        let serialized = serde_json::to_string(&attempt)
            .map_err(|err| storage(format!("Failed to serialize OAuth attempt: {err}")))?;
        self.store.set(&self.attempt_key(provider.provider_id()), &serialized)?;

        Ok(StartedAttempt {
            state: attempt.state,
            code_challenge: pkce.map(|pair| pair.challenge().to_string()),
        })
    }

    /// Consumes the stored attempt for the provider and checks the returned
    /// state against it.
    ///
    /// Deletion happens before any comparison, so the attempt is spent even
    /// when verification fails or the subsequent token exchange fails.
    pub fn verify(&self, provider_id: &str, returned_state: &str) -> IdentityResult<OAuthAttempt> {
        let key = self.attempt_key(provider_id);
        let raw = {
            let _guard = self.consume_lock.lock().unwrap();
            let raw = self.store.get(&key)?;
            self.store.delete(&key)?;
            raw
        };

        let raw = raw.ok_or_else(attempt_expired)?;
        let attempt: OAuthAttempt =
            serde_json::from_str(&raw).map_err(|_| attempt_expired())?;

        let age = Utc::now().timestamp() - attempt.created_at;
        if age > ATTEMPT_MAX_AGE_SECS {
            return Err(attempt_expired());
        }
        if attempt.state != returned_state {
            return Err(state_mismatch());
        }
        Ok(attempt)
    }

    /// Discards any pending attempt for the provider without verifying it.
    /// Used when the callback reports a provider-side failure.
    pub fn cancel(&self, provider_id: &str) -> IdentityResult<()> {
        self.store.delete(&self.attempt_key(provider_id))
    }
}

fn random_state_token() -> String {
    let mut bytes = [0u8; STATE_TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
