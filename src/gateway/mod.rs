//! Request orchestrator: the control-flow component tying the gateway
//! together.
//!
//! Per request the flow is Authenticating -> Authorizing -> Forwarding ->
//! Pricing -> Committing -> Responding, with terminal failure exits at
//! every stage before Committing. Side effects are strictly ordered: no
//! upstream call before both entitlement checks pass, no ledger write
//! before a successful usage-bearing upstream response, and the response
//! totals include the just-committed event.

mod admin;

pub use admin::{CreatedTenant, Dashboard, TenantDigest, TenantOverview, TenantUsageReport};

use std::sync::Arc;

use rust_decimal::Decimal;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::catalog::{ModelCatalog, ModelDescriptor};
use crate::config::GatewayConfig;
use crate::gate::EntitlementGate;
use crate::ledger::{GatewayStore, PeriodKey, UsageEvent, UsageLedger};
use crate::templates::InstructionTemplates;
use crate::tenant::{Plan, TenantDirectory};
use crate::types::{Message, UserContent};
use crate::upstream::{CompletionRequest, HttpUpstream, UpstreamProvider};
use crate::{Error, Result};

/// Decimal places shown for period totals and remaining budget.
const TOTAL_DP: u32 = 4;
/// Decimal places shown for a single request's cost.
const COST_DP: u32 = 5;

/// A tenant's generate call.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateRequest {
    /// Model identifier
    pub model: String,
    /// Request-type identifier selecting the instruction template
    pub request_type: String,
    /// User content: plain text or typed parts
    pub content: UserContent,
    /// Optional free text appended to the instruction
    #[serde(default)]
    pub custom_instruction: Option<String>,
}

/// Usage block returned with every successful generate call.
#[derive(Debug, Clone, Serialize)]
pub struct GenerateUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    /// This request's cost, rounded for display
    pub cost_usd: Decimal,
    /// Period total including this request, rounded for display
    pub period_total_usd: Decimal,
    /// The tenant's cap
    pub period_limit_usd: Decimal,
}

/// Successful generate response.
#[derive(Debug, Clone, Serialize)]
pub struct GenerateResponse {
    /// Generated text
    pub text: String,
    /// Usage and updated totals
    pub usage: GenerateUsage,
}

/// Tenant-facing status view.
#[derive(Debug, Clone, Serialize)]
pub struct TenantStatus {
    pub tenant_name: String,
    pub plan: Plan,
    pub monthly_limit_usd: Decimal,
    pub used_this_month_usd: Decimal,
    pub remaining_usd: Decimal,
    /// Descriptors for the models this tenant may use
    pub models: Vec<ModelDescriptor>,
    /// Request types with registered instruction templates
    pub templates_available: Vec<String>,
}

/// Liveness/readiness summary.
#[derive(Debug, Clone, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub version: &'static str,
    pub upstream_configured: bool,
}

/// The metering gateway core.
///
/// Owns the tenant directory, the usage ledger, the model catalog, the
/// instruction templates, and an injected upstream provider. Construct via
/// [`Gateway::builder`].
pub struct Gateway {
    directory: TenantDirectory,
    ledger: UsageLedger,
    catalog: ModelCatalog,
    templates: InstructionTemplates,
    gate: EntitlementGate,
    upstream: Arc<dyn UpstreamProvider>,
    admin_secret: SecretString,
    upstream_configured: bool,
    max_output_tokens: u32,
}

impl Gateway {
    pub fn builder() -> GatewayBuilder {
        GatewayBuilder::default()
    }

    /// Status for the authenticated tenant: plan, cap, consumption so far,
    /// entitled models, and available request types.
    pub async fn status(&self, credential: &str) -> Result<TenantStatus> {
        let tenant = self.directory.resolve(credential).await?;
        let used = self
            .ledger
            .sum_cost(&tenant.id, &PeriodKey::current())
            .await;

        Ok(TenantStatus {
            used_this_month_usd: used.round_dp(TOTAL_DP),
            remaining_usd: (tenant.monthly_limit_usd - used).round_dp(TOTAL_DP),
            models: self.catalog.descriptors_for(&tenant.models_allowed),
            templates_available: self.templates.keys(),
            tenant_name: tenant.name,
            plan: tenant.plan,
            monthly_limit_usd: tenant.monthly_limit_usd,
        })
    }

    /// Forward one generate call through the full metering flow.
    pub async fn generate(
        &self,
        credential: &str,
        request: GenerateRequest,
    ) -> Result<GenerateResponse> {
        // Authenticating
        let tenant = self.directory.resolve(credential).await?;

        if request.model.is_empty() {
            return Err(Error::Validation("model is required".into()));
        }
        request.content.validate()?;

        // Authorizing: both checks must pass before anything is billable.
        self.gate.authorize_model(&tenant, &request.model)?;
        let period = PeriodKey::current();
        let used = self.ledger.sum_cost(&tenant.id, &period).await;
        self.gate.admit_spend(&tenant, used)?;

        // Forwarding
        tracing::debug!(
            tenant = %tenant.id,
            model = %request.model,
            request_type = %request.request_type,
            "forwarding to upstream provider"
        );
        let system = self
            .templates
            .system_for(&request.request_type, request.custom_instruction.as_deref());
        let completion = self
            .upstream
            .complete(CompletionRequest {
                model: request.model.clone(),
                max_tokens: self.max_output_tokens,
                system,
                messages: vec![Message::user_with_parts(request.content.into_parts())],
            })
            .await?;
        if completion.text.is_empty() {
            return Err(Error::UpstreamEmpty);
        }

        // Pricing
        let usage = completion.usage;
        let cost = self.catalog.price(&request.model, &usage);

        // Committing: from here the event is billable and must be recorded.
        let event = UsageEvent::record(
            &tenant.id,
            &request.model,
            &request.request_type,
            usage,
            cost,
        );
        let event_period = event.period.clone();
        self.ledger.append(event).await?;
        let total = self.ledger.sum_cost(&tenant.id, &event_period).await;

        tracing::info!(
            tenant = %tenant.id,
            model = %request.model,
            input_tokens = usage.input_tokens,
            output_tokens = usage.output_tokens,
            cost = %cost,
            period_total = %total,
            "usage committed"
        );

        // Responding
        Ok(GenerateResponse {
            text: completion.text,
            usage: GenerateUsage {
                input_tokens: usage.input_tokens,
                output_tokens: usage.output_tokens,
                cost_usd: cost.round_dp(COST_DP),
                period_total_usd: total.round_dp(TOTAL_DP),
                period_limit_usd: tenant.monthly_limit_usd,
            },
        })
    }

    /// The model catalog, for the public models listing.
    pub fn models(&self) -> &[ModelDescriptor] {
        self.catalog.models()
    }

    /// Liveness summary.
    pub fn health(&self) -> Health {
        Health {
            status: "ok",
            version: env!("CARGO_PKG_VERSION"),
            upstream_configured: self.upstream_configured,
        }
    }

    pub(crate) fn directory(&self) -> &TenantDirectory {
        &self.directory
    }

    pub(crate) fn ledger(&self) -> &UsageLedger {
        &self.ledger
    }

    pub(crate) fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    pub(crate) fn admin_secret(&self) -> &SecretString {
        &self.admin_secret
    }
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("models", &self.catalog.models().len())
            .field("upstream_configured", &self.upstream_configured)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Gateway`].
///
/// A [`GatewayConfig`] is required; store, catalog, templates, and the
/// upstream provider can each be overridden, which is how tests inject
/// doubles and isolated stores.
#[derive(Default)]
pub struct GatewayBuilder {
    config: Option<GatewayConfig>,
    store: Option<Arc<GatewayStore>>,
    catalog: Option<ModelCatalog>,
    templates: Option<InstructionTemplates>,
    upstream: Option<Arc<dyn UpstreamProvider>>,
}

impl GatewayBuilder {
    pub fn config(mut self, config: GatewayConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn store(mut self, store: Arc<GatewayStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn catalog(mut self, catalog: ModelCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn templates(mut self, templates: InstructionTemplates) -> Self {
        self.templates = Some(templates);
        self
    }

    pub fn upstream(mut self, upstream: Arc<dyn UpstreamProvider>) -> Self {
        self.upstream = Some(upstream);
        self
    }

    pub fn build(self) -> Result<Gateway> {
        let config = self
            .config
            .ok_or_else(|| Error::Config("a GatewayConfig is required".into()))?;

        let store = match self.store {
            Some(store) => store,
            None => match &config.data_path {
                Some(path) => GatewayStore::open(path)?,
                None => GatewayStore::in_memory(),
            },
        };

        let upstream_configured = config.upstream_configured();
        let upstream: Arc<dyn UpstreamProvider> = match self.upstream {
            Some(upstream) => upstream,
            None => Arc::new(HttpUpstream::with_timeout(
                &config.upstream_base_url,
                config
                    .upstream_api_key
                    .clone()
                    .unwrap_or_else(|| SecretString::from("")),
                config.upstream_timeout,
            )?),
        };

        Ok(Gateway {
            directory: TenantDirectory::new(Arc::clone(&store)),
            ledger: UsageLedger::new(store),
            catalog: self.catalog.unwrap_or_default(),
            templates: self.templates.unwrap_or_default(),
            gate: EntitlementGate::new(),
            upstream,
            admin_secret: config.admin_secret,
            upstream_configured,
            max_output_tokens: config.max_output_tokens,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tenant::TenantSpec;
    use crate::types::{Completion, Usage};
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedUpstream {
        text: String,
        usage: Usage,
        calls: AtomicUsize,
    }

    impl FixedUpstream {
        fn new(text: &str, usage: Usage) -> Arc<Self> {
            Arc::new(Self {
                text: text.to_string(),
                usage,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl UpstreamProvider for FixedUpstream {
        async fn complete(&self, _request: CompletionRequest) -> Result<Completion> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Completion {
                text: self.text.clone(),
                usage: self.usage,
            })
        }
    }

    fn gateway_with(upstream: Arc<FixedUpstream>) -> Gateway {
        Gateway::builder()
            .config(GatewayConfig::new(SecretString::from("admin-secret")))
            .upstream(upstream)
            .build()
            .unwrap()
    }

    async fn seeded_tenant(gateway: &Gateway) -> String {
        gateway
            .directory()
            .create(TenantSpec::named("Acme"), gateway.catalog())
            .await
            .unwrap()
            .credential
    }

    fn request(model: &str) -> GenerateRequest {
        GenerateRequest {
            model: model.into(),
            request_type: "general".into(),
            content: UserContent::Text("patient notes".into()),
            custom_instruction: None,
        }
    }

    #[tokio::test]
    async fn test_generate_commits_and_returns_totals() {
        let upstream = FixedUpstream::new("Report text", Usage::new(1000, 500));
        let gateway = gateway_with(Arc::clone(&upstream));
        let credential = seeded_tenant(&gateway).await;

        let response = gateway
            .generate(&credential, request("claude-sonnet-4"))
            .await
            .unwrap();

        assert_eq!(response.text, "Report text");
        assert_eq!(response.usage.cost_usd, dec!(0.0105));
        assert_eq!(response.usage.period_total_usd, dec!(0.0105));
        assert_eq!(response.usage.period_limit_usd, dec!(50));
        assert_eq!(upstream.calls(), 1);
    }

    #[tokio::test]
    async fn test_unentitled_model_never_reaches_upstream() {
        let upstream = FixedUpstream::new("x", Usage::default());
        let gateway = gateway_with(Arc::clone(&upstream));
        let credential = seeded_tenant(&gateway).await;

        let err = gateway
            .generate(&credential, request("claude-opus-4"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ModelNotEntitled { .. }));
        assert_eq!(upstream.calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_completion_is_an_error_and_unbilled() {
        let upstream = FixedUpstream::new("", Usage::new(10, 0));
        let gateway = gateway_with(Arc::clone(&upstream));
        let credential = seeded_tenant(&gateway).await;

        let err = gateway
            .generate(&credential, request("claude-sonnet-4"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UpstreamEmpty));

        let status = gateway.status(&credential).await.unwrap();
        assert_eq!(status.used_this_month_usd, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_status_reflects_usage() {
        let upstream = FixedUpstream::new("Report", Usage::new(1000, 500));
        let gateway = gateway_with(upstream);
        let credential = seeded_tenant(&gateway).await;

        gateway
            .generate(&credential, request("claude-sonnet-4"))
            .await
            .unwrap();

        let status = gateway.status(&credential).await.unwrap();
        assert_eq!(status.used_this_month_usd, dec!(0.0105));
        assert_eq!(status.remaining_usd, dec!(49.9895));
        assert!(status.templates_available.contains(&"general".to_string()));
        assert!(!status.models.is_empty());
    }

    #[tokio::test]
    async fn test_missing_model_is_validation_error() {
        let upstream = FixedUpstream::new("x", Usage::default());
        let gateway = gateway_with(Arc::clone(&upstream));
        let credential = seeded_tenant(&gateway).await;

        let err = gateway.generate(&credential, request("")).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(upstream.calls(), 0);
    }

    #[tokio::test]
    async fn test_health_reports_upstream_configuration() {
        let gateway = Gateway::builder()
            .config(
                GatewayConfig::new(SecretString::from("admin"))
                    .with_upstream_api_key(SecretString::from("sk-test")),
            )
            .build()
            .unwrap();

        let health = gateway.health();
        assert_eq!(health.status, "ok");
        assert!(health.upstream_configured);
    }

    #[tokio::test]
    async fn test_builder_requires_config() {
        assert!(matches!(
            Gateway::builder().build(),
            Err(Error::Config(_))
        ));
    }
}
