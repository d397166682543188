use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::access::Role;

/// The linkable secondary identity kinds.
///
/// The primary identity is the platform account itself; each kind below can
/// be attached to it at most once.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderKind {
    /// The streaming platform's chat identity (Kick).
    PlatformChat,
    Twitter,
    Discord,
}

impl ProviderKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ProviderKind::PlatformChat => "platform-chat",
            ProviderKind::Twitter => "twitter",
            ProviderKind::Discord => "discord",
        }
    }
}

/// Provider profile normalized into the common shape every provider response
/// is reduced to before it reaches the linker.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalProfile {
    pub id: String,
    pub username: String,
    #[serde(rename = "displayName")]
    pub display_name: Option<String>,
    #[serde(rename = "avatarUrl")]
    pub avatar_url: Option<String>,
}

/// A secondary identity attached to an account.
///
/// All fields for a kind are written together; readers never observe a
/// partially populated link.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkedIdentity {
    pub id: String,
    pub username: String,
    #[serde(rename = "displayName")]
    pub display_name: Option<String>,
    #[serde(rename = "avatarUrl")]
    pub avatar_url: Option<String>,
    #[serde(rename = "linkedAt")]
    pub linked_at: DateTime<Utc>,
}

impl LinkedIdentity {
    pub fn from_profile(profile: &ExternalProfile) -> Self {
        Self {
            id: profile.id.clone(),
            username: profile.username.clone(),
            display_name: profile.display_name.clone(),
            avatar_url: profile.avatar_url.clone(),
            linked_at: Utc::now(),
        }
    }
}

/// The durable account record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Primary-provider subject id.
    pub uid: String,
    pub role: Role,
    #[serde(rename = "platformChat")]
    pub platform_chat: Option<LinkedIdentity>,
    pub twitter: Option<LinkedIdentity>,
    pub discord: Option<LinkedIdentity>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn new(uid: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            uid: uid.into(),
            role: Role::LOWEST,
            platform_chat: None,
            twitter: None,
            discord: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn link(&self, kind: ProviderKind) -> Option<&LinkedIdentity> {
        match kind {
            ProviderKind::PlatformChat => self.platform_chat.as_ref(),
            ProviderKind::Twitter => self.twitter.as_ref(),
            ProviderKind::Discord => self.discord.as_ref(),
        }
    }

    /// Replaces the link slot for one kind, leaving every other field alone.
    pub(crate) fn set_link(&mut self, kind: ProviderKind, link: Option<LinkedIdentity>) {
        match kind {
            ProviderKind::PlatformChat => self.platform_chat = link,
            ProviderKind::Twitter => self.twitter = link,
            ProviderKind::Discord => self.discord = link,
        }
        self.updated_at = Utc::now();
    }
}

/// An authenticated session with the system of record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PrimarySession {
    pub uid: String,
}

impl PrimarySession {
    pub fn new(uid: impl Into<String>) -> Self {
        Self { uid: uid.into() }
    }
}

/// Client-persisted record of a secondary (chat) sign-in, written by the host
/// application after a successful platform-chat login.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecondaryClientRecord {
    pub id: String,
    #[serde(default)]
    pub username: Option<String>,
    pub authenticated: bool,
}

/// The resolved logical identity used by every downstream access decision.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionIdentity {
    Primary { id: String },
    /// The id is namespaced (`secondary:` prefix) so it can never collide
    /// with a primary subject id.
    Secondary { id: String },
}

impl SessionIdentity {
    pub fn id(&self) -> &str {
        match self {
            SessionIdentity::Primary { id } | SessionIdentity::Secondary { id } => id,
        }
    }

    pub fn is_primary(&self) -> bool {
        matches!(self, SessionIdentity::Primary { .. })
    }
}
