use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::SessionIdentity;
use crate::risk::error::{persist_failed, RiskResult};
use crate::risk::reputation::{IpReputation, ReputationClient};
use crate::risk::LOGGER;

/// One login event enriched with reputation signals. Append-only: a new
/// login produces a new record, existing records are never rewritten.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskRecord {
    #[serde(rename = "identityId")]
    pub identity_id: String,
    pub ip: String,
    #[serde(rename = "userAgent")]
    pub user_agent: String,
    pub proxy: bool,
    pub vpn: bool,
    pub tor: bool,
    #[serde(rename = "riskScore")]
    pub risk_score: u8,
    #[serde(rename = "countryCode")]
    pub country_code: Option<String>,
    #[serde(rename = "countryName")]
    pub country_name: Option<String>,
    pub provider: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

/// Append-only storage for risk records. Deduplication and retention belong
/// to an analytics layer, not here.
#[async_trait]
pub trait RiskSink: Send + Sync {
    async fn append(&self, record: &RiskRecord) -> RiskResult<()>;
}

#[derive(Default)]
pub struct InMemoryRiskSink {
    records: Mutex<Vec<RiskRecord>>,
}

impl InMemoryRiskSink {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn records(&self) -> Vec<RiskRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl RiskSink for InMemoryRiskSink {
    async fn append(&self, record: &RiskRecord) -> RiskResult<()> {
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }
}

/// Enriches login events with reputation signals and records them.
///
/// Sits off the authentication critical path: a failed lookup degrades to a
/// neutral record, and [`RiskIntake::dispatch`] runs the whole thing in a
/// detached task whose failure is contained to a log line.
pub struct RiskIntake {
    client: ReputationClient,
    sink: Arc<dyn RiskSink>,
}

impl RiskIntake {
    pub fn new(client: ReputationClient, sink: Arc<dyn RiskSink>) -> Self {
        Self { client, sink }
    }

    pub async fn track(
        &self,
        identity: &SessionIdentity,
        client_ip: &str,
        user_agent: &str,
    ) -> RiskResult<RiskRecord> {
        let reputation = match self.client.lookup(client_ip).await {
            Ok(reputation) => reputation,
            Err(err) => {
                LOGGER.warn(format!(
                    "reputation lookup for {client_ip} failed, recording neutral: {err}"
                ));
                IpReputation::neutral()
            }
        };

        let record = RiskRecord {
            identity_id: identity.id().to_string(),
            ip: client_ip.to_string(),
            user_agent: user_agent.to_string(),
            proxy: reputation.proxy,
            vpn: reputation.vpn,
            tor: reputation.tor,
            risk_score: reputation.risk_score,
            country_code: reputation.country_code,
            country_name: reputation.country_name,
            provider: reputation.provider,
            created_at: Utc::now(),
        };

        self.sink
            .append(&record)
            .await
            .map_err(|err| persist_failed(format!("Risk record append rejected: {err}")))?;
        Ok(record)
    }

    /// Fire-and-forget variant for the login path. Errors never escape the
    /// spawned task.
    pub fn dispatch(self: &Arc<Self>, identity: SessionIdentity, client_ip: String, user_agent: String) {
        let intake = self.clone();
        tokio::spawn(async move {
            if let Err(err) = intake.track(&identity, &client_ip, &user_agent).await {
                LOGGER.warn(format!("detached risk intake failed: {err}"));
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;
    use std::panic::{self, AssertUnwindSafe};

    fn try_start_server() -> Option<MockServer> {
        panic::catch_unwind(AssertUnwindSafe(MockServer::start)).ok()
    }

    fn identity() -> SessionIdentity {
        SessionIdentity::Primary { id: "acct-1".into() }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn track_appends_one_record_per_call() {
        let Some(server) = try_start_server() else {
            eprintln!("Skipping track_appends_one_record_per_call: no mock server");
            return;
        };
        let _mock = server.mock(|when, then| {
            when.method(GET).path("/198.51.100.7");
            then.status(200).json_body(json!({
                "status": "ok",
                "198.51.100.7": { "proxy": "yes", "type": "TOR", "risk": 97 }
            }));
        });

        let sink = InMemoryRiskSink::shared();
        let client = ReputationClient::with_base_url(&server.base_url(), "k").unwrap();
        let intake = RiskIntake::new(client, sink.clone());

        intake
            .track(&identity(), "198.51.100.7", "Mozilla/5.0")
            .await
            .unwrap();
        intake
            .track(&identity(), "198.51.100.7", "Mozilla/5.0")
            .await
            .unwrap();

        let records = sink.records();
        assert_eq!(records.len(), 2);
        assert!(records[0].tor);
        assert_eq!(records[0].risk_score, 97);
        assert_eq!(records[0].identity_id, "acct-1");
    }

    #[tokio::test(flavor = "current_thread")]
    async fn lookup_failure_records_a_neutral_result() {
        let Some(server) = try_start_server() else {
            eprintln!("Skipping lookup_failure_records_a_neutral_result: no mock server");
            return;
        };
        let _mock = server.mock(|when, then| {
            when.method(GET).path("/203.0.113.9");
            then.status(500).body("reputation service down");
        });

        let sink = InMemoryRiskSink::shared();
        let client = ReputationClient::with_base_url(&server.base_url(), "k").unwrap();
        let intake = RiskIntake::new(client, sink.clone());

        let record = intake
            .track(&identity(), "203.0.113.9", "Mozilla/5.0")
            .await
            .unwrap();

        assert!(!record.proxy && !record.vpn && !record.tor);
        assert_eq!(record.risk_score, 0);
        assert_eq!(sink.records().len(), 1);
    }
}
