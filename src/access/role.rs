use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::access::error::{invalid_role, AccessError};

/// Account roles, ordered lowest to highest privilege.
///
/// Comparisons go through the fixed ordinal ranking, never through names.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    Viewer,
    VerifiedViewer,
    Streamer,
    Member,
    Premium,
    Vip,
    Admin,
}

impl Role {
    /// The fail-closed default: any role lookup failure resolves here.
    pub const LOWEST: Role = Role::Viewer;

    pub fn rank(self) -> u8 {
        match self {
            Role::Viewer => 0,
            Role::VerifiedViewer => 1,
            Role::Streamer => 2,
            Role::Member => 3,
            Role::Premium => 4,
            Role::Vip => 5,
            Role::Admin => 6,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Viewer => "viewer",
            Role::VerifiedViewer => "verified-viewer",
            Role::Streamer => "streamer",
            Role::Member => "member",
            Role::Premium => "premium",
            Role::Vip => "vip",
            Role::Admin => "admin",
        }
    }

    pub fn at_least(self, required: Role) -> bool {
        self.rank() >= required.rank()
    }

    /// Streamer tooling is open to the streamer rank and everything above it.
    pub fn can_access_streamer_panel(self) -> bool {
        self.at_least(Role::Streamer)
    }

    /// The admin panel is exact-match only. A VIP outranks most roles but
    /// still has no business here.
    pub fn can_access_admin_panel(self) -> bool {
        self == Role::Admin
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AccessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "viewer" => Ok(Role::Viewer),
            "verified-viewer" => Ok(Role::VerifiedViewer),
            "streamer" => Ok(Role::Streamer),
            "member" => Ok(Role::Member),
            "premium" => Ok(Role::Premium),
            "vip" => Ok(Role::Vip),
            "admin" => Ok(Role::Admin),
            other => Err(invalid_role(format!("Unknown role name: {other}"))),
        }
    }
}
