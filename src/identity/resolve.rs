use std::sync::Arc;

use crate::identity::model::{PrimarySession, SecondaryClientRecord, SessionIdentity};
use crate::identity::persistence::ClientStore;

/// Namespace prefix for secondary identity ids, so a chat-account id can
/// never collide with a primary subject id.
pub const SECONDARY_ID_PREFIX: &str = "secondary:";

/// Resolves the logical identity for the current context.
///
/// Precedence is fixed: an existing primary session always wins over
/// whatever secondary record the client store holds. A secondary record that
/// fails to parse, or is not marked authenticated, counts as absent rather
/// than as an error; resolution always terminates with an identity or
/// `None`.
pub fn resolve_identity(
    primary: Option<&PrimarySession>,
    secondary_client_state: Option<&str>,
) -> Option<SessionIdentity> {
    if let Some(session) = primary {
        return Some(SessionIdentity::Primary {
            id: session.uid.clone(),
        });
    }

    let record: SecondaryClientRecord = serde_json::from_str(secondary_client_state?).ok()?;
    if !record.authenticated {
        return None;
    }
    Some(SessionIdentity::Secondary {
        id: format!("{SECONDARY_ID_PREFIX}{}", record.id),
    })
}

/// Client-store-backed wrapper around [`resolve_identity`].
///
/// Holds no cache: the record is re-read on every call so resolution always
/// reflects the latest primary session and client storage.
pub struct HybridResolver {
    store: Arc<dyn ClientStore>,
    record_key: String,
}

impl HybridResolver {
    pub fn new(store: Arc<dyn ClientStore>, record_key: impl Into<String>) -> Self {
        Self {
            store,
            record_key: record_key.into(),
        }
    }

    pub fn record_key(&self) -> &str {
        &self.record_key
    }

    pub fn resolve(&self, primary: Option<&PrimarySession>) -> Option<SessionIdentity> {
        // A store read failure is indistinguishable from an absent record.
        let raw = self.store.get(&self.record_key).ok().flatten();
        resolve_identity(primary, raw.as_deref())
    }
}
