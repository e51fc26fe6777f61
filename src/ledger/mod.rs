//! Append-only usage ledger with point-in-time aggregation.
//!
//! Usage events are immutable facts: once committed they are never edited
//! or removed by normal operation. Spend caps are enforced against
//! [`UsageLedger::sum_cost`], which reflects every append that completed
//! before the aggregation started.

mod store;

pub use store::GatewayStore;

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Datelike, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::Usage;
use crate::{Error, Result};

/// How many events a usage report lists, newest first.
const RECENT_EVENTS: usize = 20;

/// Calendar-month accounting window (`YYYY-MM`).
///
/// Caps reset naturally at each month boundary because the key is a pure
/// function of the event timestamp; there is no explicit reset operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeriodKey(String);

impl PeriodKey {
    /// The period containing the current wall-clock instant.
    pub fn current() -> Self {
        Self::from_timestamp(Utc::now())
    }

    /// The period containing the given instant.
    pub fn from_timestamp(at: DateTime<Utc>) -> Self {
        Self(format!("{:04}-{:02}", at.year(), at.month()))
    }

    /// Parse a `YYYY-MM` string supplied by a caller.
    pub fn parse(raw: &str) -> Result<Self> {
        let valid = raw.is_ascii()
            && raw.len() == 7
            && raw.as_bytes()[4] == b'-'
            && raw[..4].chars().all(|c| c.is_ascii_digit())
            && raw[5..]
                .parse::<u8>()
                .is_ok_and(|month| (1..=12).contains(&month));
        if !valid {
            return Err(Error::Validation(format!(
                "invalid period key {raw:?}, expected YYYY-MM"
            )));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One committed billable event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageEvent {
    /// Event identifier
    pub id: Uuid,
    /// Ledger partition key
    pub tenant_id: String,
    /// Accounting window derived from `timestamp`
    pub period: PeriodKey,
    /// Commit time
    pub timestamp: DateTime<Utc>,
    /// Model that served the request
    pub model: String,
    /// Request-type identifier the instruction template was keyed by
    pub request_type: String,
    /// Input tokens reported by the upstream provider
    pub input_tokens: u64,
    /// Output tokens reported by the upstream provider
    pub output_tokens: u64,
    /// Cost at commit time; never re-derived or rounded afterwards
    pub cost_usd: Decimal,
}

impl UsageEvent {
    /// Build an event for a completed upstream call, stamped with the
    /// current time and the period that time falls in.
    pub fn record(
        tenant_id: impl Into<String>,
        model: impl Into<String>,
        request_type: impl Into<String>,
        usage: Usage,
        cost_usd: Decimal,
    ) -> Self {
        let timestamp = Utc::now();
        Self {
            id: Uuid::new_v4(),
            tenant_id: tenant_id.into(),
            period: PeriodKey::from_timestamp(timestamp),
            timestamp,
            model: model.into(),
            request_type: request_type.into(),
            input_tokens: usage.input_tokens,
            output_tokens: usage.output_tokens,
            cost_usd,
        }
    }
}

/// Per-model rollup within a usage report.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelUsageSummary {
    /// Requests served by this model
    pub requests: u64,
    /// Summed cost, unrounded
    pub cost_usd: Decimal,
    /// Summed input + output tokens
    pub tokens: u64,
}

/// Read-only reporting view over one tenant and period.
#[derive(Debug, Clone, Serialize)]
pub struct UsageReport {
    pub period: PeriodKey,
    pub total_requests: usize,
    pub total_cost_usd: Decimal,
    pub by_model: BTreeMap<String, ModelUsageSummary>,
    /// The most recent events, newest first
    pub recent: Vec<UsageEvent>,
}

/// Append-only record store of completed billable events.
#[derive(Clone, Debug)]
pub struct UsageLedger {
    store: Arc<GatewayStore>,
}

impl UsageLedger {
    pub fn new(store: Arc<GatewayStore>) -> Self {
        Self { store }
    }

    /// Durably commit one event.
    ///
    /// Safe to call from any number of in-flight requests: the commit runs
    /// under the store's single writer lock, and a persistence failure
    /// aborts without losing previously committed events.
    pub async fn append(&self, event: UsageEvent) -> Result<()> {
        self.store
            .mutate(|state| {
                state.usage_log.push(event);
                Ok(())
            })
            .await
    }

    /// Sum of committed cost for a tenant within a period.
    pub async fn sum_cost(&self, tenant_id: &str, period: &PeriodKey) -> Decimal {
        self.store
            .read(|state| {
                state
                    .usage_log
                    .iter()
                    .filter(|e| e.tenant_id == tenant_id && &e.period == period)
                    .map(|e| e.cost_usd)
                    .sum()
            })
            .await
    }

    /// Number of committed events for a tenant within a period.
    pub async fn event_count(&self, tenant_id: &str, period: &PeriodKey) -> usize {
        self.store
            .read(|state| {
                state
                    .usage_log
                    .iter()
                    .filter(|e| e.tenant_id == tenant_id && &e.period == period)
                    .count()
            })
            .await
    }

    /// Reporting view: totals, per-model rollups, and recent events.
    pub async fn report(&self, tenant_id: &str, period: &PeriodKey) -> UsageReport {
        self.store
            .read(|state| {
                let events: Vec<&UsageEvent> = state
                    .usage_log
                    .iter()
                    .filter(|e| e.tenant_id == tenant_id && &e.period == period)
                    .collect();

                let mut by_model: BTreeMap<String, ModelUsageSummary> = BTreeMap::new();
                let mut total = Decimal::ZERO;
                for event in &events {
                    total += event.cost_usd;
                    let summary = by_model.entry(event.model.clone()).or_default();
                    summary.requests += 1;
                    summary.cost_usd += event.cost_usd;
                    summary.tokens += event.input_tokens + event.output_tokens;
                }

                let recent = events
                    .iter()
                    .rev()
                    .take(RECENT_EVENTS)
                    .map(|e| (*e).clone())
                    .collect();

                UsageReport {
                    period: period.clone(),
                    total_requests: events.len(),
                    total_cost_usd: total,
                    by_model,
                    recent,
                }
            })
            .await
    }

    /// Sum of cost over every tenant within a period.
    pub async fn total_cost(&self, period: &PeriodKey) -> Decimal {
        self.store
            .read(|state| {
                state
                    .usage_log
                    .iter()
                    .filter(|e| &e.period == period)
                    .map(|e| e.cost_usd)
                    .sum()
            })
            .await
    }

    /// Number of committed events across all tenants within a period.
    pub async fn total_requests(&self, period: &PeriodKey) -> usize {
        self.store
            .read(|state| {
                state
                    .usage_log
                    .iter()
                    .filter(|e| &e.period == period)
                    .count()
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn event(tenant: &str, model: &str, cost: Decimal) -> UsageEvent {
        UsageEvent::record(tenant, model, "general", Usage::new(1000, 500), cost)
    }

    #[tokio::test]
    async fn test_sum_cost_matches_appended_events() {
        let ledger = UsageLedger::new(GatewayStore::in_memory());
        let period = PeriodKey::current();

        ledger
            .append(event("acme", "claude-sonnet-4", dec!(0.0105)))
            .await
            .unwrap();
        ledger
            .append(event("acme", "claude-sonnet-4", dec!(0.02)))
            .await
            .unwrap();
        ledger
            .append(event("rival", "claude-sonnet-4", dec!(5)))
            .await
            .unwrap();

        assert_eq!(ledger.sum_cost("acme", &period).await, dec!(0.0305));
        assert_eq!(ledger.sum_cost("rival", &period).await, dec!(5));
        assert_eq!(ledger.sum_cost("nobody", &period).await, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_period_partitions_sums() {
        let ledger = UsageLedger::new(GatewayStore::in_memory());
        let mut old = event("acme", "claude-sonnet-4", dec!(3));
        old.period = PeriodKey::parse("2001-01").unwrap();
        ledger.append(old).await.unwrap();
        ledger
            .append(event("acme", "claude-sonnet-4", dec!(1)))
            .await
            .unwrap();

        assert_eq!(
            ledger
                .sum_cost("acme", &PeriodKey::parse("2001-01").unwrap())
                .await,
            dec!(3)
        );
        assert_eq!(ledger.sum_cost("acme", &PeriodKey::current()).await, dec!(1));
    }

    #[tokio::test]
    async fn test_concurrent_appends_lose_nothing() {
        let ledger = UsageLedger::new(GatewayStore::in_memory());
        let period = PeriodKey::current();

        let tasks: Vec<_> = (0..32)
            .map(|_| {
                let ledger = ledger.clone();
                tokio::spawn(async move {
                    ledger
                        .append(event("acme", "claude-sonnet-4", dec!(0.25)))
                        .await
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(ledger.event_count("acme", &period).await, 32);
        assert_eq!(ledger.sum_cost("acme", &period).await, dec!(8));
    }

    #[tokio::test]
    async fn test_report_groups_by_model() {
        let ledger = UsageLedger::new(GatewayStore::in_memory());
        let period = PeriodKey::current();

        ledger
            .append(event("acme", "claude-sonnet-4", dec!(1)))
            .await
            .unwrap();
        ledger
            .append(event("acme", "claude-sonnet-4", dec!(2)))
            .await
            .unwrap();
        ledger
            .append(event("acme", "claude-opus-4", dec!(10)))
            .await
            .unwrap();

        let report = ledger.report("acme", &period).await;
        assert_eq!(report.total_requests, 3);
        assert_eq!(report.total_cost_usd, dec!(13));
        assert_eq!(report.by_model["claude-sonnet-4"].requests, 2);
        assert_eq!(report.by_model["claude-sonnet-4"].cost_usd, dec!(3));
        assert_eq!(report.by_model["claude-opus-4"].tokens, 1500);
    }

    #[tokio::test]
    async fn test_report_recent_is_newest_first_and_bounded() {
        let ledger = UsageLedger::new(GatewayStore::in_memory());
        let period = PeriodKey::current();

        let mut last_id = None;
        for _ in 0..25 {
            let e = event("acme", "claude-sonnet-4", dec!(0.01));
            last_id = Some(e.id);
            ledger.append(e).await.unwrap();
        }

        let report = ledger.report("acme", &period).await;
        assert_eq!(report.recent.len(), 20);
        assert_eq!(Some(report.recent[0].id), last_id);
    }

    #[test]
    fn test_period_key_parse() {
        assert!(PeriodKey::parse("2026-08").is_ok());
        assert!(PeriodKey::parse("2026-00").is_err());
        assert!(PeriodKey::parse("2026-13").is_err());
        assert!(PeriodKey::parse("26-08").is_err());
        assert!(PeriodKey::parse("2026/08").is_err());
    }

    #[test]
    fn test_period_key_from_timestamp() {
        let at = "2026-02-28T23:59:59Z".parse().unwrap();
        assert_eq!(PeriodKey::from_timestamp(at).as_str(), "2026-02");
    }
}
