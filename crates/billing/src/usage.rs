//! Usage ledger
//!
//! Append-only series of gauge samples per (org, metric). The current value of
//! a metric is the most recent sample, not a running counter: writes trade
//! efficiency for a complete audit trail and trivial point-in-time queries.

use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use teamspace_shared::db;
use teamspace_shared::{UsageMetric, UsageSample};

use crate::error::BillingResult;

/// Latest value per tracked metric, 0 when no sample exists
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CurrentUsage {
    pub storage: f64,
    pub members: f64,
    pub organizations: f64,
}

impl CurrentUsage {
    pub fn get(&self, metric: UsageMetric) -> f64 {
        match metric {
            UsageMetric::Storage => self.storage,
            UsageMetric::Members => self.members,
            UsageMetric::Organizations => self.organizations,
        }
    }

    fn set(&mut self, metric: UsageMetric, value: f64) {
        match metric {
            UsageMetric::Storage => self.storage = value,
            UsageMetric::Members => self.members = value,
            UsageMetric::Organizations => self.organizations = value,
        }
    }
}

/// Usage ledger service
#[derive(Clone)]
pub struct UsageLedger {
    pool: PgPool,
}

impl UsageLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Append a new immutable sample; prior samples are never overwritten
    pub async fn record_sample(
        &self,
        org_id: Uuid,
        metric: UsageMetric,
        value: f64,
    ) -> BillingResult<UsageSample> {
        let id = Uuid::new_v4();
        let recorded_at = OffsetDateTime::now_utc();

        db::with_backoff(|| {
            let pool = self.pool.clone();
            async move {
                sqlx::query(
                    r#"
                    INSERT INTO usage_samples (id, org_id, metric, value, recorded_at)
                    VALUES ($1, $2, $3, $4, $5)
                    "#,
                )
                .bind(id)
                .bind(org_id)
                .bind(metric)
                .bind(value)
                .bind(recorded_at)
                .execute(&pool)
                .await
            }
        })
        .await?;

        tracing::debug!(org_id = %org_id, metric = %metric, value, "Usage sample recorded");

        Ok(UsageSample {
            id,
            org_id,
            metric,
            value,
            recorded_at,
        })
    }

    /// Latest value per tracked metric
    ///
    /// Metrics resolve independently: a metric with no samples reads as 0 and
    /// never blocks the others.
    pub async fn current_usage(&self, org_id: Uuid) -> BillingResult<CurrentUsage> {
        let rows: Vec<(UsageMetric, f64)> = sqlx::query_as(
            r#"
            SELECT DISTINCT ON (metric) metric, value
            FROM usage_samples
            WHERE org_id = $1
            ORDER BY metric, recorded_at DESC
            "#,
        )
        .bind(org_id)
        .fetch_all(&self.pool)
        .await?;

        let mut usage = CurrentUsage::default();
        for (metric, value) in rows {
            usage.set(metric, value);
        }

        Ok(usage)
    }

    /// Sample history for one metric, newest first
    pub async fn samples(
        &self,
        org_id: Uuid,
        metric: UsageMetric,
    ) -> BillingResult<Vec<UsageSample>> {
        let samples: Vec<UsageSample> = sqlx::query_as(
            r#"
            SELECT id, org_id, metric, value, recorded_at
            FROM usage_samples
            WHERE org_id = $1 AND metric = $2
            ORDER BY recorded_at DESC
            "#,
        )
        .bind(org_id)
        .bind(metric)
        .fetch_all(&self.pool)
        .await?;

        Ok(samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_usage_defaults_to_zero() {
        let usage = CurrentUsage::default();
        assert_eq!(usage.get(UsageMetric::Storage), 0.0);
        assert_eq!(usage.get(UsageMetric::Members), 0.0);
        assert_eq!(usage.get(UsageMetric::Organizations), 0.0);
    }

    #[test]
    fn test_current_usage_set_and_get() {
        let mut usage = CurrentUsage::default();
        usage.set(UsageMetric::Members, 4.0);
        assert_eq!(usage.get(UsageMetric::Members), 4.0);
        assert_eq!(usage.get(UsageMetric::Storage), 0.0);
    }
}
