//! Plan catalog
//!
//! The catalog is static and immutable: plans are defined here, never created
//! or mutated at runtime. Insertion order is the canonical display order.
//! Unknown plan ids fail at `PlanId::from_str`; every parsed id resolves.

use serde::Serialize;
use teamspace_shared::{PlanId, UsageMetric};

/// Numeric limits for a plan
///
/// `f64::INFINITY` means unlimited; the entitlement evaluator treats an
/// infinite limit as never over quota.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PlanLimits {
    pub organizations: f64,
    pub members_per_org: f64,
    pub storage_gb: f64,
}

impl PlanLimits {
    /// Limit that applies to a tracked usage metric
    pub fn for_metric(&self, metric: UsageMetric) -> f64 {
        match metric {
            UsageMetric::Storage => self.storage_gb,
            UsageMetric::Members => self.members_per_org,
            UsageMetric::Organizations => self.organizations,
        }
    }
}

/// A named tier of feature limits and price
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Plan {
    pub id: PlanId,
    pub name: &'static str,
    pub description: &'static str,
    /// Monthly price in cents
    pub price_cents: i64,
    pub features: &'static [&'static str],
    pub limits: PlanLimits,
}

static PLANS: [Plan; 4] = [
    Plan {
        id: PlanId::Free,
        name: "Free",
        description: "For individuals and small teams just getting started",
        price_cents: 0,
        features: &[
            "1 Organization",
            "5 Team Members",
            "5GB Storage",
            "Basic Support",
        ],
        limits: PlanLimits {
            organizations: 1.0,
            members_per_org: 5.0,
            storage_gb: 5.0,
        },
    },
    Plan {
        id: PlanId::Pro,
        name: "Pro",
        description: "For growing teams that need more power and flexibility",
        price_cents: 29_00,
        features: &[
            "3 Organizations",
            "20 Team Members per Org",
            "50GB Storage",
            "Priority Support",
            "Advanced Analytics",
        ],
        limits: PlanLimits {
            organizations: 3.0,
            members_per_org: 20.0,
            storage_gb: 50.0,
        },
    },
    Plan {
        id: PlanId::Business,
        name: "Business",
        description: "For larger teams and businesses with advanced needs",
        price_cents: 99_00,
        features: &[
            "10 Organizations",
            "Unlimited Team Members",
            "500GB Storage",
            "Premium Support",
            "Advanced Analytics",
            "Custom Branding",
        ],
        limits: PlanLimits {
            organizations: 10.0,
            members_per_org: f64::INFINITY,
            storage_gb: 500.0,
        },
    },
    Plan {
        id: PlanId::Enterprise,
        name: "Enterprise",
        description: "For large organizations with custom requirements",
        price_cents: 299_00,
        features: &[
            "Unlimited Organizations",
            "Unlimited Team Members",
            "2TB Storage",
            "Dedicated Support",
            "Advanced Analytics",
            "Custom Branding",
            "Custom Integrations",
        ],
        limits: PlanLimits {
            organizations: f64::INFINITY,
            members_per_org: f64::INFINITY,
            storage_gb: 2000.0,
        },
    },
];

/// All plans in canonical display order
pub fn plans() -> &'static [Plan] {
    &PLANS
}

/// Look up a plan by id
pub fn plan(id: PlanId) -> &'static Plan {
    match id {
        PlanId::Free => &PLANS[0],
        PlanId::Pro => &PLANS[1],
        PlanId::Business => &PLANS[2],
        PlanId::Enterprise => &PLANS[3],
    }
}
