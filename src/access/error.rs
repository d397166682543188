use std::fmt::{Display, Formatter};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AccessErrorCode {
    RoleLookupFailed,
    FeatureLookupFailed,
    InvalidRole,
}

impl AccessErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessErrorCode::RoleLookupFailed => "access/role-lookup-failed",
            AccessErrorCode::FeatureLookupFailed => "access/feature-lookup-failed",
            AccessErrorCode::InvalidRole => "access/invalid-role",
        }
    }
}

/// Errors from access evaluation are always absorbed into a fail-closed
/// default by the evaluator; they exist so backends can report what went
/// wrong and so the absorbed failure can be logged.
#[derive(Clone, Debug)]
pub struct AccessError {
    pub code: AccessErrorCode,
    message: String,
}

impl AccessError {
    pub fn new(code: AccessErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn code_str(&self) -> &'static str {
        self.code.as_str()
    }
}

impl Display for AccessError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code_str())
    }
}

impl std::error::Error for AccessError {}

pub type AccessResult<T> = Result<T, AccessError>;

pub fn role_lookup_failed(message: impl Into<String>) -> AccessError {
    AccessError::new(AccessErrorCode::RoleLookupFailed, message)
}

pub fn feature_lookup_failed(message: impl Into<String>) -> AccessError {
    AccessError::new(AccessErrorCode::FeatureLookupFailed, message)
}

pub fn invalid_role(message: impl Into<String>) -> AccessError {
    AccessError::new(AccessErrorCode::InvalidRole, message)
}
