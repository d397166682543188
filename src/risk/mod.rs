pub mod error;
mod intake;
mod reputation;

pub use error::{RiskError, RiskErrorCode, RiskResult};
pub use intake::{InMemoryRiskSink, RiskIntake, RiskRecord, RiskSink};
pub use reputation::{IpReputation, ReputationClient};

use std::sync::LazyLock;

use crate::logger::Logger;

pub static LOGGER: LazyLock<Logger> = LazyLock::new(|| Logger::new("@castlink/risk"));
