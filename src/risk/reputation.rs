use reqwest::Client;
use reqwest::Url;
use serde_json::Value;

use crate::risk::error::{invalid_argument, lookup_failed, RiskResult};

const REPUTATION_API_URL: &str = "https://proxycheck.io/v2";

/// Signals extracted from one IP reputation lookup.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IpReputation {
    pub proxy: bool,
    pub vpn: bool,
    pub tor: bool,
    /// Coarse 0-100 score as reported upstream.
    pub risk_score: u8,
    pub country_code: Option<String>,
    pub country_name: Option<String>,
    pub provider: Option<String>,
}

impl IpReputation {
    /// The record written when the reputation service is unreachable or
    /// rejects the lookup: no flags, zero risk.
    pub fn neutral() -> Self {
        Self::default()
    }
}

/// Client for the external IP reputation service.
#[derive(Clone, Debug)]
pub struct ReputationClient {
    http: Client,
    base_url: Url,
    api_key: String,
}

impl ReputationClient {
    pub fn new(api_key: impl Into<String>) -> RiskResult<Self> {
        let base_url = std::env::var("CASTLINK_REPUTATION_API_URL")
            .unwrap_or_else(|_| REPUTATION_API_URL.to_string());
        Self::with_base_url(&base_url, api_key)
    }

    pub fn with_base_url(base_url: &str, api_key: impl Into<String>) -> RiskResult<Self> {
        let base_url = Url::parse(base_url).map_err(|err| {
            invalid_argument(format!("Invalid reputation endpoint '{base_url}': {err}"))
        })?;
        let http = Client::builder()
            .user_agent(concat!("castlink/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| lookup_failed(format!("Failed to build HTTP client: {err}")))?;

        Ok(Self {
            http,
            base_url,
            api_key: api_key.into(),
        })
    }

    pub async fn lookup(&self, ip: &str) -> RiskResult<IpReputation> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| invalid_argument("Reputation endpoint cannot take a path"))?
            .push(ip);
        url.query_pairs_mut()
            .append_pair("key", &self.api_key)
            .append_pair("vpn", "1")
            .append_pair("risk", "1");

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|err| lookup_failed(format!("Reputation request failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(lookup_failed(format!(
                "Reputation service answered {status}"
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|err| lookup_failed(format!("Reputation response is not JSON: {err}")))?;

        let service_status = body.get("status").and_then(Value::as_str).unwrap_or("");
        // "warning" still carries usable per-IP data.
        if service_status != "ok" && service_status != "warning" {
            let message = body.get("message").and_then(Value::as_str).unwrap_or("");
            return Err(lookup_failed(format!(
                "Reputation service status {service_status}: {message}"
            )));
        }

        let entry = body
            .get(ip)
            .ok_or_else(|| lookup_failed(format!("Reputation response has no entry for {ip}")))?;
        Ok(parse_entry(entry))
    }
}

fn parse_entry(entry: &Value) -> IpReputation {
    let kind = entry
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_ascii_uppercase();
    let risk_score = entry
        .get("risk")
        .and_then(Value::as_u64)
        .map(|risk| risk.min(100) as u8)
        .unwrap_or(0);

    IpReputation {
        proxy: entry.get("proxy").and_then(Value::as_str) == Some("yes"),
        vpn: kind == "VPN",
        tor: kind == "TOR",
        risk_score,
        country_code: string_field(entry, "isocode"),
        country_name: string_field(entry, "country"),
        provider: string_field(entry, "provider"),
    }
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk::error::RiskErrorCode;
    use httpmock::prelude::*;
    use serde_json::json;
    use std::panic::{self, AssertUnwindSafe};

    fn try_start_server() -> Option<MockServer> {
        panic::catch_unwind(AssertUnwindSafe(MockServer::start)).ok()
    }

    #[tokio::test(flavor = "current_thread")]
    async fn lookup_parses_a_flagged_vpn_entry() {
        let Some(server) = try_start_server() else {
            eprintln!("Skipping lookup_parses_a_flagged_vpn_entry: no mock server");
            return;
        };
        let _mock = server.mock(|when, then| {
            when.method(GET)
                .path("/198.51.100.7")
                .query_param("key", "test-key")
                .query_param("vpn", "1")
                .query_param("risk", "1");
            then.status(200).json_body(json!({
                "status": "ok",
                "198.51.100.7": {
                    "proxy": "yes",
                    "type": "VPN",
                    "risk": 66,
                    "isocode": "NL",
                    "country": "Netherlands",
                    "provider": "ExampleHost BV"
                }
            }));
        });

        let client = ReputationClient::with_base_url(&server.base_url(), "test-key").unwrap();
        let reputation = client.lookup("198.51.100.7").await.unwrap();

        assert!(reputation.proxy);
        assert!(reputation.vpn);
        assert!(!reputation.tor);
        assert_eq!(reputation.risk_score, 66);
        assert_eq!(reputation.country_code.as_deref(), Some("NL"));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn lookup_parses_a_clean_residential_entry() {
        let Some(server) = try_start_server() else {
            eprintln!("Skipping lookup_parses_a_clean_residential_entry: no mock server");
            return;
        };
        let _mock = server.mock(|when, then| {
            when.method(GET).path("/203.0.113.9");
            then.status(200).json_body(json!({
                "status": "ok",
                "203.0.113.9": {
                    "proxy": "no",
                    "type": "Residential",
                    "risk": 0,
                    "isocode": "DE",
                    "country": "Germany"
                }
            }));
        });

        let client = ReputationClient::with_base_url(&server.base_url(), "test-key").unwrap();
        let reputation = client.lookup("203.0.113.9").await.unwrap();

        assert_eq!(reputation, IpReputation {
            country_code: Some("DE".into()),
            country_name: Some("Germany".into()),
            ..IpReputation::neutral()
        });
    }

    #[tokio::test(flavor = "current_thread")]
    async fn denied_service_status_is_a_lookup_failure() {
        let Some(server) = try_start_server() else {
            eprintln!("Skipping denied_service_status_is_a_lookup_failure: no mock server");
            return;
        };
        let _mock = server.mock(|when, then| {
            when.method(GET).path("/203.0.113.9");
            then.status(200)
                .json_body(json!({ "status": "denied", "message": "key exhausted" }));
        });

        let client = ReputationClient::with_base_url(&server.base_url(), "test-key").unwrap();
        let err = client.lookup("203.0.113.9").await.unwrap_err();
        assert_eq!(err.code, RiskErrorCode::LookupFailed);
    }
}
