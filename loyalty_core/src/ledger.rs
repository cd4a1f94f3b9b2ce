use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{LoyaltyError, Result};

pub type Metadata = BTreeMap<String, serde_json::Value>;

/// One recorded point delta plus the balance it produced. Never mutated.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Attestation {
    pub identifier: String,
    pub delta: i64,
    pub balance: i64,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: Metadata,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct PointsSummary {
    pub balance: i64,
    pub history: Vec<Attestation>,
}

/// Convenience for the common `{ "reason": ... }` metadata.
pub fn reason(reason: &str) -> Metadata {
    Metadata::from([("reason".to_string(), serde_json::Value::from(reason))])
}

/// Where point balances live. Picked once from configuration.
pub enum PointsBackend {
    InMemory(InMemoryLedger),
    Remote(RemoteLedger),
}

impl PointsBackend {
    pub fn from_config(use_mock: bool, api_base: Option<String>) -> Self {
        if use_mock {
            log::info!("points backend: in-memory");
            PointsBackend::InMemory(InMemoryLedger::default())
        } else {
            log::info!("points backend: remote attestation service ({:?})", api_base);
            PointsBackend::Remote(RemoteLedger::new(api_base))
        }
    }

    pub async fn issue_points_attestation(
        &self,
        identifier: &str,
        delta: i64,
        metadata: Metadata,
    ) -> Result<Attestation> {
        match self {
            PointsBackend::InMemory(ledger) => ledger.apply_delta(identifier, delta, metadata),
            PointsBackend::Remote(ledger) => ledger.apply_delta(identifier, delta, metadata).await,
        }
    }

    pub async fn get_attestations(&self, identifier: &str) -> Result<PointsSummary> {
        match self {
            PointsBackend::InMemory(ledger) => Ok(ledger.read(identifier)),
            PointsBackend::Remote(ledger) => ledger.read(identifier).await,
        }
    }
}

#[derive(Debug, Default)]
struct Account {
    balance: i64,
    history: Vec<Attestation>,
}

/// Process-local ledger. All mutation goes through one lock so concurrent
/// deltas on the same identifier cannot lose updates.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    accounts: Mutex<HashMap<String, Account>>,
}

impl InMemoryLedger {
    /// Negative deltas are applied as-is; balances have no floor. A delta that
    /// would overflow the balance is refused and leaves the account untouched.
    pub fn apply_delta(
        &self,
        identifier: &str,
        delta: i64,
        metadata: Metadata,
    ) -> Result<Attestation> {
        let mut accounts = self.accounts.lock();
        let account = accounts.entry(identifier.to_string()).or_default();
        let balance = account.balance.checked_add(delta).ok_or_else(|| {
            LoyaltyError::invalid(format!(
                "delta {} would overflow balance {} for {}",
                delta, account.balance, identifier
            ))
        })?;
        account.balance = balance;

        let attestation = Attestation {
            identifier: identifier.to_string(),
            delta,
            balance: account.balance,
            timestamp: Utc::now(),
            metadata,
        };
        account.history.push(attestation.clone());

        log::debug!("ledger: {} {:+} -> {}", identifier, delta, account.balance);
        Ok(attestation)
    }

    pub fn read(&self, identifier: &str) -> PointsSummary {
        let accounts = self.accounts.lock();
        accounts
            .get(identifier)
            .map(|a| PointsSummary {
                balance: a.balance,
                history: a.history.clone(),
            })
            .unwrap_or_default()
    }
}

#[derive(Serialize, Debug)]
struct AttestationRequest<'a> {
    identifier: &'a str,
    delta: i64,
    metadata: &'a Metadata,
}

/// Client for an external attestation service. Reads may lag writes.
pub struct RemoteLedger {
    client: Client,
    base_url: Option<String>,
}

impl RemoteLedger {
    pub fn new(base_url: Option<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.map(|u| u.trim_end_matches('/').to_string()),
        }
    }

    fn base(&self) -> Result<&str> {
        self.base_url
            .as_deref()
            .ok_or(LoyaltyError::NotConfigured("attestation service"))
    }

    pub async fn apply_delta(
        &self,
        identifier: &str,
        delta: i64,
        metadata: Metadata,
    ) -> Result<Attestation> {
        let url = format!("{}/attestations", self.base()?);
        let resp = self
            .client
            .post(&url)
            .json(&AttestationRequest {
                identifier,
                delta,
                metadata: &metadata,
            })
            .send()
            .await?;
        Ok(check_status(resp).await?.json::<Attestation>().await?)
    }

    pub async fn read(&self, identifier: &str) -> Result<PointsSummary> {
        let url = format!("{}/attestations/{}", self.base()?, identifier);
        let resp = self.client.get(&url).send().await?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(PointsSummary::default());
        }
        Ok(check_status(resp).await?.json::<PointsSummary>().await?)
    }
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(LoyaltyError::RemoteStatus {
        status: status.as_u16(),
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_identifier_reads_as_empty() {
        let ledger = InMemoryLedger::default();
        assert_eq!(ledger.read("5550000000"), PointsSummary::default());
    }

    #[test]
    fn balance_is_sum_of_deltas() {
        let ledger = InMemoryLedger::default();
        let deltas = [5, -3, 40, 0, -100, 7];
        for d in deltas {
            ledger.apply_delta("5551234567", d, Metadata::new()).unwrap();
        }
        let summary = ledger.read("5551234567");
        assert_eq!(summary.balance, deltas.iter().sum::<i64>());
        assert_eq!(summary.history.len(), deltas.len());
        assert_eq!(summary.history.last().map(|a| a.balance), Some(summary.balance));
    }

    #[test]
    fn negative_balance_is_not_clamped() {
        let ledger = InMemoryLedger::default();
        let att = ledger.apply_delta("a", -1, reason("redeem")).unwrap();
        assert_eq!(att.balance, -1);
        assert_eq!(att.metadata["reason"], "redeem");
    }

    #[test]
    fn overflowing_delta_is_refused_without_side_effects() {
        let ledger = InMemoryLedger::default();
        ledger.apply_delta("a", i64::MAX, Metadata::new()).unwrap();
        let err = ledger.apply_delta("a", 1, Metadata::new()).unwrap_err();
        assert!(matches!(err, LoyaltyError::InvalidRequest(_)));

        ledger.apply_delta("b", i64::MIN, Metadata::new()).unwrap();
        assert!(ledger.apply_delta("b", -1, Metadata::new()).is_err());

        let summary = ledger.read("a");
        assert_eq!(summary.balance, i64::MAX);
        assert_eq!(summary.history.len(), 1);
        // still usable afterwards
        assert_eq!(ledger.apply_delta("a", -5, Metadata::new()).unwrap().balance, i64::MAX - 5);
    }

    #[tokio::test]
    async fn remote_without_base_url_is_not_configured() {
        let backend = PointsBackend::from_config(false, None);
        let err = backend
            .issue_points_attestation("a", 1, Metadata::new())
            .await
            .unwrap_err();
        assert!(matches!(err, LoyaltyError::NotConfigured(_)));
        assert!(matches!(
            backend.get_attestations("a").await,
            Err(LoyaltyError::NotConfigured(_))
        ));
    }
}
