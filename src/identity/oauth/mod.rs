mod exchange;
mod pkce;
mod provider;
pub mod providers;
mod state;

pub use exchange::{ExchangedIdentity, TokenExchanger};
pub use pkce::PkcePair;
pub use provider::{ProfileNormalizer, ProviderConfig};
pub use providers::{
    DiscordAuthProvider, KickAuthProvider, ProviderFactory, ProviderKeys, TwitterAuthProvider,
};
pub use state::{OAuthAttempt, StartedAttempt, StateGuard, ATTEMPT_MAX_AGE_SECS};

use url::form_urlencoded;

/// Everything the caller needs to send the user to a provider's consent
/// screen: the assembled authorization URL plus the state bound to this
/// attempt.
#[derive(Clone, Debug)]
pub struct AuthorizeRedirect {
    pub provider_id: String,
    pub url: String,
    pub state: String,
}

/// Query parameters delivered on an OAuth callback.
///
/// Providers send `code` and `state` on success, or `error` (optionally with
/// `error_description`) when the user denied or the request was malformed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

impl CallbackParams {
    /// Parses a raw query string (`code=...&state=...`), with or without the
    /// leading `?`.
    pub fn from_query(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        let mut params = Self::default();
        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "code" => params.code = Some(value.into_owned()),
                "state" => params.state = Some(value.into_owned()),
                "error" => params.error = Some(value.into_owned()),
                "error_description" => params.error_description = Some(value.into_owned()),
                _ => {}
            }
        }
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn callback_parses_success_parameters() {
        let params = CallbackParams::from_query("?code=abc123&state=st-1&foo=bar");
        assert_eq!(params.code.as_deref(), Some("abc123"));
        assert_eq!(params.state.as_deref(), Some("st-1"));
        assert_eq!(params.error, None);
    }

    #[test]
    fn callback_parses_denial_with_description() {
        let params =
            CallbackParams::from_query("error=access_denied&error_description=User%20said%20no");
        assert_eq!(params.error.as_deref(), Some("access_denied"));
        assert_eq!(params.error_description.as_deref(), Some("User said no"));
        assert_eq!(params.code, None);
    }

    #[test]
    fn empty_query_parses_to_all_absent() {
        assert_eq!(CallbackParams::from_query(""), CallbackParams::default());
    }
}
