use std::fmt::{Display, Formatter};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RiskErrorCode {
    LookupFailed,
    PersistFailed,
    InvalidArgument,
}

impl RiskErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskErrorCode::LookupFailed => "risk/lookup-failed",
            RiskErrorCode::PersistFailed => "risk/persist-failed",
            RiskErrorCode::InvalidArgument => "risk/invalid-argument",
        }
    }
}

/// Risk intake errors are nonfatal by contract: callers log them and move
/// on, and the authentication flow they are attached to never observes them.
#[derive(Clone, Debug)]
pub struct RiskError {
    pub code: RiskErrorCode,
    message: String,
}

impl RiskError {
    pub fn new(code: RiskErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn code_str(&self) -> &'static str {
        self.code.as_str()
    }
}

impl Display for RiskError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code_str())
    }
}

impl std::error::Error for RiskError {}

pub type RiskResult<T> = Result<T, RiskError>;

pub fn lookup_failed(message: impl Into<String>) -> RiskError {
    RiskError::new(RiskErrorCode::LookupFailed, message)
}

pub fn persist_failed(message: impl Into<String>) -> RiskError {
    RiskError::new(RiskErrorCode::PersistFailed, message)
}

pub fn invalid_argument(message: impl Into<String>) -> RiskError {
    RiskError::new(RiskErrorCode::InvalidArgument, message)
}
