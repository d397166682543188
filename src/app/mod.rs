use std::sync::Arc;

pub const DEFAULT_APP_NAME: &str = "[DEFAULT]";

/// Static configuration for a Castlink app instance.
///
/// Everything here is safe to ship to a client. Provider OAuth secrets are
/// deliberately not part of the options; they live in per-provider
/// [`crate::identity::oauth::ProviderConfig`] values.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AppOptions {
    pub project_id: Option<String>,
    pub api_key: Option<String>,
}

/// Handle shared by every service in the crate.
///
/// The app contributes its name to client-storage key namespaces so two app
/// instances on the same origin never read each other's OAuth attempts or
/// session records.
#[derive(Clone, Debug)]
pub struct App {
    name: Arc<str>,
    options: AppOptions,
}

impl App {
    pub fn new(name: impl Into<String>, options: AppOptions) -> Self {
        Self {
            name: name.into().into(),
            options,
        }
    }

    /// Creates the default-named app.
    pub fn with_options(options: AppOptions) -> Self {
        Self::new(DEFAULT_APP_NAME, options)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn options(&self) -> &AppOptions {
        &self.options
    }

    /// Prefix for every key this app writes into a client store.
    pub fn storage_prefix(&self) -> String {
        format!("castlink:{}", self.name)
    }
}
