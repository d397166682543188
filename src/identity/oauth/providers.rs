use serde_json::Value;

use super::provider::ProviderConfig;
use crate::identity::error::{upstream_rejected, IdentityResult};
use crate::identity::model::{ExternalProfile, ProviderKind};

/// Client key material registered with a provider for this app.
#[derive(Clone, Debug)]
pub struct ProviderKeys {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

impl ProviderKeys {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri: redirect_uri.into(),
        }
    }
}

pub trait ProviderFactory {
    fn provider_id() -> &'static str;
    fn kind() -> ProviderKind;
    fn config(keys: ProviderKeys) -> ProviderConfig;
}

/// The streaming platform's chat identity. Kick's OAuth 2.1 server mandates
/// PKCE on the authorization-code grant.
pub struct KickAuthProvider;

impl ProviderFactory for KickAuthProvider {
    fn provider_id() -> &'static str {
        "kick.com"
    }

    fn kind() -> ProviderKind {
        ProviderKind::PlatformChat
    }

    fn config(keys: ProviderKeys) -> ProviderConfig {
        let mut provider = ProviderConfig::new(
            Self::provider_id(),
            Self::kind(),
            "https://id.kick.com/oauth/authorize",
            "https://id.kick.com/oauth/token",
            "https://api.kick.com/public/v1/users",
            normalize_kick_profile,
        );
        provider.set_keys(keys.client_id, keys.client_secret, keys.redirect_uri);
        provider.add_scope("user:read");
        provider.require_pkce();
        provider
    }
}

pub struct TwitterAuthProvider;

impl ProviderFactory for TwitterAuthProvider {
    fn provider_id() -> &'static str {
        "twitter.com"
    }

    fn kind() -> ProviderKind {
        ProviderKind::Twitter
    }

    fn config(keys: ProviderKeys) -> ProviderConfig {
        let mut provider = ProviderConfig::new(
            Self::provider_id(),
            Self::kind(),
            "https://twitter.com/i/oauth2/authorize",
            "https://api.twitter.com/2/oauth2/token",
            "https://api.twitter.com/2/users/me?user.fields=profile_image_url",
            normalize_twitter_profile,
        );
        provider.set_keys(keys.client_id, keys.client_secret, keys.redirect_uri);
        provider.add_scope("tweet.read");
        provider.add_scope("users.read");
        provider.require_pkce();
        provider
    }
}

pub struct DiscordAuthProvider;

impl ProviderFactory for DiscordAuthProvider {
    fn provider_id() -> &'static str {
        "discord.com"
    }

    fn kind() -> ProviderKind {
        ProviderKind::Discord
    }

    fn config(keys: ProviderKeys) -> ProviderConfig {
        let mut provider = ProviderConfig::new(
            Self::provider_id(),
            Self::kind(),
            "https://discord.com/oauth2/authorize",
            "https://discord.com/api/oauth2/token",
            "https://discord.com/api/users/@me",
            normalize_discord_profile,
        );
        provider.set_keys(keys.client_id, keys.client_secret, keys.redirect_uri);
        provider.add_scope("identify");
        provider
    }
}

/// Kick wraps the authenticated user in a `data` array.
pub fn normalize_kick_profile(body: &Value) -> IdentityResult<ExternalProfile> {
    let user = body
        .get("data")
        .and_then(Value::as_array)
        .and_then(|entries| entries.first())
        .ok_or_else(|| upstream_rejected(None, "Kick profile response has no data entry"))?;

    let id = match user.get("user_id") {
        Some(Value::Number(number)) => number.to_string(),
        Some(Value::String(text)) => text.clone(),
        _ => return Err(upstream_rejected(None, "Kick profile has no user_id")),
    };
    let username = string_field(user, "name")
        .ok_or_else(|| upstream_rejected(None, "Kick profile has no name"))?;

    Ok(ExternalProfile {
        id,
        username: username.clone(),
        display_name: Some(username),
        avatar_url: string_field(user, "profile_picture"),
    })
}

pub fn normalize_twitter_profile(body: &Value) -> IdentityResult<ExternalProfile> {
    let user = body
        .get("data")
        .ok_or_else(|| upstream_rejected(None, "Twitter profile response has no data object"))?;

    let id = string_field(user, "id")
        .ok_or_else(|| upstream_rejected(None, "Twitter profile has no id"))?;
    let username = string_field(user, "username")
        .ok_or_else(|| upstream_rejected(None, "Twitter profile has no username"))?;

    Ok(ExternalProfile {
        id,
        username,
        display_name: string_field(user, "name"),
        avatar_url: string_field(user, "profile_image_url"),
    })
}

pub fn normalize_discord_profile(body: &Value) -> IdentityResult<ExternalProfile> {
    let id = string_field(body, "id")
        .ok_or_else(|| upstream_rejected(None, "Discord profile has no id"))?;
    let username = string_field(body, "username")
        .ok_or_else(|| upstream_rejected(None, "Discord profile has no username"))?;

    // Discord returns an avatar hash, not a URL.
    let avatar_url = string_field(body, "avatar")
        .map(|hash| format!("https://cdn.discordapp.com/avatars/{id}/{hash}.png"));

    Ok(ExternalProfile {
        id,
        username,
        display_name: string_field(body, "global_name"),
        avatar_url,
    })
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}
