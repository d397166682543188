use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::identity::error::{
    link_persist_failed, not_authenticated, storage, IdentityError, IdentityErrorCode,
    IdentityResult,
};
use crate::identity::model::{Account, ExternalProfile, LinkedIdentity, ProviderKind};

/// Backend storage for account records.
///
/// `write_link` must replace the whole link slot for one provider kind in a
/// single backend transaction or single-document write: readers see either
/// the old complete link or the new complete link, never a mix, and no other
/// kind or the role is touched.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn fetch(&self, uid: &str) -> IdentityResult<Option<Account>>;
    async fn write_link(
        &self,
        uid: &str,
        kind: ProviderKind,
        link: Option<LinkedIdentity>,
    ) -> IdentityResult<Account>;
}

#[derive(Default)]
pub struct InMemoryAccountStore {
    accounts: Mutex<HashMap<String, Account>>,
}

impl InMemoryAccountStore {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn seed(&self, account: Account) {
        self.accounts
            .lock()
            .unwrap()
            .insert(account.uid.clone(), account);
    }
}

#[async_trait]
impl AccountStore for InMemoryAccountStore {
    async fn fetch(&self, uid: &str) -> IdentityResult<Option<Account>> {
        Ok(self.accounts.lock().unwrap().get(uid).cloned())
    }

    async fn write_link(
        &self,
        uid: &str,
        kind: ProviderKind,
        link: Option<LinkedIdentity>,
    ) -> IdentityResult<Account> {
        let mut accounts = self.accounts.lock().unwrap();
        let account = accounts
            .get_mut(uid)
            .ok_or_else(|| storage(format!("No account record for uid {uid}")))?;
        account.set_link(kind, link);
        Ok(account.clone())
    }
}

/// Writes and clears secondary identity links on the primary account.
///
/// Linking is idempotent: re-linking the same provider kind overwrites the
/// slot with the freshest profile fields. Failures are surfaced to the
/// calling flow for a user-facing retry; nothing is retried here.
pub struct IdentityLinker {
    store: Arc<dyn AccountStore>,
}

impl IdentityLinker {
    pub fn new(store: Arc<dyn AccountStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn AccountStore> {
        &self.store
    }

    pub async fn link(
        &self,
        uid: Option<&str>,
        kind: ProviderKind,
        profile: &ExternalProfile,
    ) -> IdentityResult<Account> {
        let uid = uid.ok_or_else(not_authenticated)?;
        let link = LinkedIdentity::from_profile(profile);
        self.store
            .write_link(uid, kind, Some(link))
            .await
            .map_err(into_persist_failure)
    }

    pub async fn unlink(&self, uid: Option<&str>, kind: ProviderKind) -> IdentityResult<Account> {
        let uid = uid.ok_or_else(not_authenticated)?;
        self.store
            .write_link(uid, kind, None)
            .await
            .map_err(into_persist_failure)
    }
}

fn into_persist_failure(err: IdentityError) -> IdentityError {
    match err.code {
        IdentityErrorCode::NotAuthenticated | IdentityErrorCode::LinkPersistFailed => err,
        _ => link_persist_failed(format!("Account link write rejected: {err}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::Role;

    fn profile(id: &str, username: &str) -> ExternalProfile {
        ExternalProfile {
            id: id.into(),
            username: username.into(),
            display_name: Some(username.to_uppercase()),
            avatar_url: Some(format!("https://cdn.test/{id}.png")),
        }
    }

    fn seeded_linker() -> (Arc<InMemoryAccountStore>, IdentityLinker) {
        let store = InMemoryAccountStore::shared();
        store.seed(Account::new("acct-1"));
        (store.clone(), IdentityLinker::new(store))
    }

    #[tokio::test(flavor = "current_thread")]
    async fn link_requires_an_authenticated_account() {
        let (_, linker) = seeded_linker();
        let err = linker
            .link(None, ProviderKind::Twitter, &profile("42", "alice"))
            .await
            .unwrap_err();
        assert_eq!(err.code, IdentityErrorCode::NotAuthenticated);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn relinking_overwrites_with_the_freshest_fields() {
        let (_, linker) = seeded_linker();

        linker
            .link(Some("acct-1"), ProviderKind::Twitter, &profile("42", "alice"))
            .await
            .unwrap();
        let account = linker
            .link(
                Some("acct-1"),
                ProviderKind::Twitter,
                &profile("42", "alice_renamed"),
            )
            .await
            .unwrap();

        let link = account.link(ProviderKind::Twitter).unwrap();
        assert_eq!(link.id, "42");
        assert_eq!(link.username, "alice_renamed");
        assert_eq!(link.avatar_url.as_deref(), Some("https://cdn.test/42.png"));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn link_then_unlink_round_trips_to_an_empty_slot() {
        let (store, linker) = seeded_linker();

        linker
            .link(Some("acct-1"), ProviderKind::Discord, &profile("7", "bob"))
            .await
            .unwrap();
        linker
            .link(Some("acct-1"), ProviderKind::Twitter, &profile("42", "alice"))
            .await
            .unwrap();
        linker
            .unlink(Some("acct-1"), ProviderKind::Discord)
            .await
            .unwrap();

        let account = store.fetch("acct-1").await.unwrap().unwrap();
        assert!(account.link(ProviderKind::Discord).is_none());
        // Other kinds and the role are untouched.
        assert_eq!(account.link(ProviderKind::Twitter).unwrap().username, "alice");
        assert_eq!(account.role, Role::LOWEST);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn rejected_write_surfaces_as_link_persist_failed() {
        let store = InMemoryAccountStore::shared();
        let linker = IdentityLinker::new(store);

        let err = linker
            .link(Some("missing"), ProviderKind::Twitter, &profile("42", "alice"))
            .await
            .unwrap_err();
        assert_eq!(err.code, IdentityErrorCode::LinkPersistFailed);
    }
}
