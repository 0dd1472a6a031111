//! Entitlement evaluation
//!
//! Joins an organization's plan limits with its current usage and answers
//! "how close is this org to its quota". The arithmetic is pure so it can be
//! tested without a database; the service wrapper only loads the raw inputs.

use sqlx::PgPool;
use uuid::Uuid;

use teamspace_shared::{PlanId, UsageMetric};

use crate::error::BillingResult;
use crate::plans::{plan, PlanLimits};
use crate::subscriptions::SubscriptionLedger;
use crate::usage::{CurrentUsage, UsageLedger};

/// Severity band for a metric's utilization
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UsageBand {
    Nominal,
    Warning,
    Critical,
}

impl UsageBand {
    pub fn for_percent(percent: f64) -> Self {
        if percent >= 80.0 {
            UsageBand::Critical
        } else if percent >= 60.0 {
            UsageBand::Warning
        } else {
            UsageBand::Nominal
        }
    }
}

/// Utilization as a percentage of the plan limit
///
/// Unlimited and zero limits both report 0 rather than dividing by a
/// meaningless denominator.
pub fn usage_percent(value: f64, limit: f64) -> f64 {
    if limit.is_infinite() || limit <= 0.0 {
        0.0
    } else {
        (value / limit) * 100.0
    }
}

/// Whether a value has reached or passed the limit
///
/// Agrees with `usage_percent`: unlimited and zero limits report 0% there,
/// so neither can be over.
pub fn is_over_limit(value: f64, limit: f64) -> bool {
    if limit.is_infinite() || limit <= 0.0 {
        false
    } else {
        value >= limit
    }
}

/// Evaluation of a single metric against the plan
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct MetricEntitlement {
    pub metric: UsageMetric,
    pub value: f64,
    pub limit: f64,
    pub percent: f64,
    pub band: UsageBand,
    pub over_limit: bool,
}

impl MetricEntitlement {
    fn evaluate(metric: UsageMetric, value: f64, limits: &PlanLimits) -> Self {
        let limit = limits.for_metric(metric);
        let percent = usage_percent(value, limit);
        Self {
            metric,
            value,
            limit,
            percent,
            band: UsageBand::for_percent(percent),
            over_limit: is_over_limit(value, limit),
        }
    }
}

/// Full entitlement picture for one organization
#[derive(Debug, Clone, serde::Serialize)]
pub struct OrgEntitlement {
    pub org_id: Uuid,
    pub plan_id: PlanId,
    pub metrics: Vec<MetricEntitlement>,
}

impl OrgEntitlement {
    pub fn metric(&self, metric: UsageMetric) -> Option<&MetricEntitlement> {
        self.metrics.iter().find(|m| m.metric == metric)
    }

    pub fn any_over_limit(&self) -> bool {
        self.metrics.iter().any(|m| m.over_limit)
    }

    /// Whether one more member fits under the plan
    pub fn can_add_member(&self) -> bool {
        self.metric(UsageMetric::Members)
            .map(|m| !is_over_limit(m.value, m.limit))
            .unwrap_or(true)
    }

    /// Whether the owner may create another organization under the plan
    pub fn can_create_organization(&self) -> bool {
        self.metric(UsageMetric::Organizations)
            .map(|m| !is_over_limit(m.value, m.limit))
            .unwrap_or(true)
    }

    /// Whether storing `additional_gb` more stays under the storage limit
    pub fn can_consume_storage(&self, additional_gb: f64) -> bool {
        match self.metric(UsageMetric::Storage) {
            Some(m) => !is_over_limit(m.value + additional_gb, m.limit),
            None => true,
        }
    }
}

/// Pure evaluation over already-loaded inputs
pub fn evaluate_from_raw(
    org_id: Uuid,
    plan_id: PlanId,
    member_count: i64,
    usage: &CurrentUsage,
) -> OrgEntitlement {
    let limits = &plan(plan_id).limits;

    // Member count comes from the membership table, not the gauge samples,
    // so it cannot go stale between a join and the next sample.
    let metrics = UsageMetric::ALL
        .iter()
        .map(|&metric| {
            let value = match metric {
                UsageMetric::Members => member_count as f64,
                _ => usage.get(metric),
            };
            MetricEntitlement::evaluate(metric, value, limits)
        })
        .collect();

    OrgEntitlement {
        org_id,
        plan_id,
        metrics,
    }
}

/// Entitlement service
#[derive(Clone)]
pub struct EntitlementService {
    pool: PgPool,
    subscriptions: SubscriptionLedger,
    usage: UsageLedger,
}

impl EntitlementService {
    pub fn new(pool: PgPool) -> Self {
        Self {
            subscriptions: SubscriptionLedger::new(pool.clone()),
            usage: UsageLedger::new(pool.clone()),
            pool,
        }
    }

    /// Evaluate an organization against its current plan
    ///
    /// Organizations without a subscription row are treated as free plan.
    pub async fn evaluate(&self, org_id: Uuid) -> BillingResult<OrgEntitlement> {
        let plan_id = match self.subscriptions.current_for_org(org_id).await {
            Ok(sub) if !sub.status.is_terminal() => sub.plan_id,
            Ok(_) => PlanId::Free,
            Err(crate::error::BillingError::NotFound(_)) => PlanId::Free,
            Err(e) => return Err(e),
        };

        let member_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM organization_members WHERE org_id = $1")
                .bind(org_id)
                .fetch_one(&self.pool)
                .await?;

        let usage = self.usage.current_usage(org_id).await?;

        Ok(evaluate_from_raw(org_id, plan_id, member_count, &usage))
    }
}
