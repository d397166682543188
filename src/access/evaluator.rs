use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;

use crate::access::error::AccessResult;
use crate::access::role::Role;
use crate::access::LOGGER;
use crate::identity::SessionIdentity;

/// Backend authorization queries, treated as black-box RPCs that either
/// return a value or fail.
#[async_trait]
pub trait AccessBackend: Send + Sync {
    async fn role(&self, identity_id: &str) -> AccessResult<Role>;
    /// The set of known feature names.
    async fn feature_catalog(&self) -> AccessResult<Vec<String>>;
    async fn feature_allowed(&self, identity_id: &str, feature: &str) -> AccessResult<bool>;
}

/// Per-feature access decisions for one resolved identity.
///
/// A feature absent from the map is unknown, and unknown means no access.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FeatureAccessMap {
    entries: HashMap<String, bool>,
}

impl FeatureAccessMap {
    pub fn allows(&self, feature: &str) -> bool {
        self.entries.get(feature).copied().unwrap_or(false)
    }

    pub fn features(&self) -> impl Iterator<Item = (&str, bool)> {
        self.entries
            .iter()
            .map(|(name, allowed)| (name.as_str(), *allowed))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Computes role and feature access for a resolved identity.
///
/// Every failure path degrades to deny: a failed role lookup yields the
/// lowest role, a failed per-feature check yields `false` for that feature
/// only, and a failed catalog lookup yields an empty map. Nothing here ever
/// aborts the broader session-establishment flow.
pub struct AccessEvaluator {
    backend: Arc<dyn AccessBackend>,
}

impl AccessEvaluator {
    pub fn new(backend: Arc<dyn AccessBackend>) -> Self {
        Self { backend }
    }

    pub async fn role(&self, identity: &SessionIdentity) -> Role {
        match self.backend.role(identity.id()).await {
            Ok(role) => role,
            Err(err) => {
                LOGGER.warn(format!(
                    "role lookup failed for {}, defaulting to {}: {err}",
                    identity.id(),
                    Role::LOWEST
                ));
                Role::LOWEST
            }
        }
    }

    /// Evaluates every known feature concurrently and returns the aggregate
    /// once all checks have settled.
    pub async fn feature_access(&self, identity: &SessionIdentity) -> FeatureAccessMap {
        let names = match self.backend.feature_catalog().await {
            Ok(names) => names,
            Err(err) => {
                LOGGER.warn(format!(
                    "feature catalog lookup failed, denying all features: {err}"
                ));
                return FeatureAccessMap::default();
            }
        };

        let checks = names.into_iter().map(|name| {
            let backend = self.backend.clone();
            let identity_id = identity.id().to_string();
            async move {
                let allowed = match backend.feature_allowed(&identity_id, &name).await {
                    Ok(allowed) => allowed,
                    Err(err) => {
                        LOGGER.warn(format!("feature check failed for {name}, denying: {err}"));
                        false
                    }
                };
                (name, allowed)
            }
        });

        FeatureAccessMap {
            entries: join_all(checks).await.into_iter().collect(),
        }
    }

    pub async fn has_feature_access(&self, identity: &SessionIdentity, feature: &str) -> bool {
        self.feature_access(identity).await.allows(feature)
    }
}
