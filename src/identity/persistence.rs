use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::identity::error::IdentityResult;

/// Key-value storage scoped to the client context that initiated a flow.
///
/// Host applications back this with whatever their platform offers (browser
/// session storage through a JS shim, a file on desktop). OAuth attempts and
/// the secondary session record are the only values the crate writes here;
/// provider secret material never goes through this trait.
pub trait ClientStore: Send + Sync {
    fn get(&self, key: &str) -> IdentityResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> IdentityResult<()>;
    fn delete(&self, key: &str) -> IdentityResult<()>;
}

#[derive(Default)]
pub struct InMemoryClientStore {
    entries: Mutex<HashMap<String, String>>,
}

impl InMemoryClientStore {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

impl ClientStore for InMemoryClientStore {
    fn get(&self, key: &str) -> IdentityResult<Option<String>> {
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> IdentityResult<()> {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> IdentityResult<()> {
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }
}
