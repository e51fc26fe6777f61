//! Durability: tenants and committed usage survive a process restart as a
//! single consistent snapshot.

use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal_macros::dec;
use secrecy::SecretString;

use tollgate::types::{Completion, Usage};
use tollgate::upstream::UpstreamProvider;
use tollgate::{
    CompletionRequest, Gateway, GatewayConfig, GatewayStore, GenerateRequest, PeriodKey,
    TenantSpec, UsageEvent, UsageLedger, UserContent,
};

const ADMIN: &str = "persist-admin";

struct OkUpstream;

#[async_trait]
impl UpstreamProvider for OkUpstream {
    async fn complete(&self, _request: CompletionRequest) -> tollgate::Result<Completion> {
        Ok(Completion {
            text: "report".into(),
            usage: Usage::new(1000, 500),
        })
    }
}

fn gateway_at(path: &std::path::Path) -> Gateway {
    Gateway::builder()
        .config(GatewayConfig::new(SecretString::from(ADMIN)).with_data_path(path))
        .upstream(Arc::new(OkUpstream))
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_state_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gateway.json");

    let credential = {
        let gateway = gateway_at(&path);
        let created = gateway
            .create_tenant(ADMIN, TenantSpec::named("Durable"))
            .await
            .unwrap();
        gateway
            .generate(
                &created.credential,
                GenerateRequest {
                    model: "claude-sonnet-4".into(),
                    request_type: "general".into(),
                    content: UserContent::Text("notes".into()),
                    custom_instruction: None,
                },
            )
            .await
            .unwrap();
        created.credential
    };

    // A fresh gateway over the same snapshot sees the tenant and its usage.
    let reopened = gateway_at(&path);
    let status = reopened.status(&credential).await.unwrap();
    assert_eq!(status.tenant_name, "Durable");
    assert_eq!(status.used_this_month_usd, dec!(0.0105));

    let report = reopened
        .usage_report(ADMIN, "durable", None)
        .await
        .unwrap();
    assert_eq!(report.total_requests, 1);
}

#[tokio::test]
async fn test_snapshot_is_valid_json_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gateway.json");

    let gateway = gateway_at(&path);
    gateway
        .create_tenant(ADMIN, TenantSpec::named("Inspectable"))
        .await
        .unwrap();

    let raw = std::fs::read_to_string(&path).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert!(parsed["tenants"]["inspectable"].is_object());
    assert!(parsed["usage_log"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_ledger_appends_persist_concurrently() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gateway.json");
    let period = PeriodKey::current();

    {
        let ledger = UsageLedger::new(GatewayStore::open(&path).unwrap());
        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let ledger = ledger.clone();
                tokio::spawn(async move {
                    ledger
                        .append(UsageEvent::record(
                            "durable",
                            "claude-sonnet-4",
                            "general",
                            Usage::new(1000, 500),
                            dec!(0.0105),
                        ))
                        .await
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }
    }

    let ledger = UsageLedger::new(GatewayStore::open(&path).unwrap());
    assert_eq!(ledger.event_count("durable", &period).await, 16);
    assert_eq!(ledger.sum_cost("durable", &period).await, dec!(0.168));
}
