use std::fmt::{Display, Formatter};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IdentityErrorCode {
    /// The `state` returned on an OAuth callback differs from the stored one.
    StateMismatch,
    /// No stored OAuth attempt matches the callback, or the attempt outlived
    /// its bounded lifetime. Also raised for a replayed (already consumed)
    /// attempt.
    AttemptExpired,
    /// The provider requires PKCE and the verifier is missing or was rejected
    /// by the token endpoint.
    PkceMismatch,
    /// The authorization code was already redeemed upstream.
    CodeAlreadyUsed,
    /// The provider rejected the token exchange or profile fetch.
    UpstreamRejected,
    /// The callback carried neither a `code` nor an `error` parameter.
    MissingCode,
    /// A link or unlink was requested without an authenticated primary
    /// account.
    NotAuthenticated,
    /// The backend rejected the account link write.
    LinkPersistFailed,
    Network,
    Storage,
    InvalidConfig,
}

impl IdentityErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdentityErrorCode::StateMismatch => "identity/state-mismatch",
            IdentityErrorCode::AttemptExpired => "identity/attempt-expired",
            IdentityErrorCode::PkceMismatch => "identity/pkce-mismatch",
            IdentityErrorCode::CodeAlreadyUsed => "identity/code-already-used",
            IdentityErrorCode::UpstreamRejected => "identity/upstream-rejected",
            IdentityErrorCode::MissingCode => "identity/missing-code",
            IdentityErrorCode::NotAuthenticated => "identity/not-authenticated",
            IdentityErrorCode::LinkPersistFailed => "identity/link-persist-failed",
            IdentityErrorCode::Network => "identity/network",
            IdentityErrorCode::Storage => "identity/storage",
            IdentityErrorCode::InvalidConfig => "identity/invalid-config",
        }
    }
}

#[derive(Clone, Debug)]
pub struct IdentityError {
    pub code: IdentityErrorCode,
    message: String,
    /// HTTP status from the upstream provider, when one was received.
    pub status: Option<u16>,
}

impl IdentityError {
    pub fn new(code: IdentityErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            status: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn code_str(&self) -> &'static str {
        self.code.as_str()
    }
}

impl Display for IdentityError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} [{}] ({})", self.message, status, self.code_str()),
            None => write!(f, "{} ({})", self.message, self.code_str()),
        }
    }
}

impl std::error::Error for IdentityError {}

pub type IdentityResult<T> = Result<T, IdentityError>;

pub fn state_mismatch() -> IdentityError {
    IdentityError::new(
        IdentityErrorCode::StateMismatch,
        "Callback state does not match the stored attempt",
    )
}

pub fn attempt_expired() -> IdentityError {
    IdentityError::new(
        IdentityErrorCode::AttemptExpired,
        "No usable authorization attempt is stored for this callback",
    )
}

pub fn pkce_mismatch(message: impl Into<String>) -> IdentityError {
    IdentityError::new(IdentityErrorCode::PkceMismatch, message)
}

pub fn code_already_used(message: impl Into<String>) -> IdentityError {
    IdentityError::new(IdentityErrorCode::CodeAlreadyUsed, message)
}

pub fn upstream_rejected(status: Option<u16>, message: impl Into<String>) -> IdentityError {
    let error = IdentityError::new(IdentityErrorCode::UpstreamRejected, message);
    match status {
        Some(status) => error.with_status(status),
        None => error,
    }
}

pub fn missing_code() -> IdentityError {
    IdentityError::new(
        IdentityErrorCode::MissingCode,
        "Callback carried neither a code nor an error parameter",
    )
}

pub fn not_authenticated() -> IdentityError {
    IdentityError::new(
        IdentityErrorCode::NotAuthenticated,
        "Linking requires an authenticated primary account",
    )
}

pub fn link_persist_failed(message: impl Into<String>) -> IdentityError {
    IdentityError::new(IdentityErrorCode::LinkPersistFailed, message)
}

pub fn network(message: impl Into<String>) -> IdentityError {
    IdentityError::new(IdentityErrorCode::Network, message)
}

pub fn storage(message: impl Into<String>) -> IdentityError {
    IdentityError::new(IdentityErrorCode::Storage, message)
}

pub fn invalid_config(message: impl Into<String>) -> IdentityError {
    IdentityError::new(IdentityErrorCode::InvalidConfig, message)
}
