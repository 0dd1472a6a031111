//! Subscription ledger
//!
//! Tracks each organization's subscription history. A partial unique index on
//! (org_id) WHERE status <> 'canceled' guarantees at most one live
//! subscription per organization; the database enforces the invariant even if
//! two creation calls race.

use sqlx::PgPool;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use teamspace_shared::{PlanId, Subscription, SubscriptionStatus};

use crate::error::{BillingError, BillingResult};
use crate::plans::plan;

/// Direction of a plan change relative to the current plan's price
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanChange {
    /// Moving to a more expensive plan, applied immediately
    Upgrade,
    /// Moving to a cheaper plan, deferred to the end of the period
    Downgrade,
    /// Same price, nothing to do
    Lateral,
}

/// Comparing against the catalog price, not the plan ordering, so a future
/// price shuffle does not silently invert upgrade semantics.
pub fn classify_plan_change(current: PlanId, next: PlanId) -> PlanChange {
    let current_price = plan(current).price_cents;
    let next_price = plan(next).price_cents;
    if next_price > current_price {
        PlanChange::Upgrade
    } else if next_price < current_price {
        PlanChange::Downgrade
    } else {
        PlanChange::Lateral
    }
}

/// Initial status for a new subscription: paid plans start in a trial, the
/// free plan is active immediately.
pub fn initial_status_for(plan_id: PlanId) -> SubscriptionStatus {
    if plan_id.is_paid() {
        SubscriptionStatus::Trialing
    } else {
        SubscriptionStatus::Active
    }
}

/// Partial update to a subscription row
#[derive(Debug, Clone, Default)]
pub struct SubscriptionPatch {
    pub status: Option<SubscriptionStatus>,
    pub plan_id: Option<PlanId>,
    pub cancel_at_period_end: Option<bool>,
    pub pending_plan_id: Option<Option<PlanId>>,
}

/// Billing period length, one month regardless of plan or trial status
pub const PERIOD_DAYS: i64 = 30;

/// Subscription ledger service
#[derive(Clone)]
pub struct SubscriptionLedger {
    pool: PgPool,
}

impl SubscriptionLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a subscription for an organization
    ///
    /// The first period runs one month from now whether the subscription
    /// starts active or trialing. Fails with `Conflict` when the organization
    /// already holds a non-canceled subscription.
    pub async fn create(
        &self,
        org_id: Uuid,
        user_id: Uuid,
        plan_id: PlanId,
    ) -> BillingResult<Subscription> {
        let now = OffsetDateTime::now_utc();
        let status = initial_status_for(plan_id);
        let period_end = now + Duration::days(PERIOD_DAYS);

        let subscription: Subscription = sqlx::query_as(
            r#"
            INSERT INTO subscriptions
                (id, org_id, user_id, plan_id, status,
                 current_period_start, current_period_end,
                 cancel_at_period_end, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, FALSE, $6, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(org_id)
        .bind(user_id)
        .bind(plan_id)
        .bind(status)
        .bind(now)
        .bind(period_end)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(org_id = %org_id, plan = %plan_id, status = %status, "Subscription created");

        Ok(subscription)
    }

    /// Fetch a subscription by id
    pub async fn get(&self, id: Uuid) -> BillingResult<Subscription> {
        let subscription: Subscription =
            sqlx::query_as("SELECT * FROM subscriptions WHERE id = $1")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;

        Ok(subscription)
    }

    /// Most recent subscription for an organization, live or not
    pub async fn current_for_org(&self, org_id: Uuid) -> BillingResult<Subscription> {
        let subscription: Subscription = sqlx::query_as(
            r#"
            SELECT * FROM subscriptions
            WHERE org_id = $1
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(org_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(subscription)
    }

    /// Apply a partial update to a subscription
    pub async fn update(&self, id: Uuid, patch: SubscriptionPatch) -> BillingResult<Subscription> {
        let mut tx = self.pool.begin().await?;

        let current: Subscription =
            sqlx::query_as("SELECT * FROM subscriptions WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;

        let status = patch.status.unwrap_or(current.status);
        let plan_id = patch.plan_id.unwrap_or(current.plan_id);
        let cancel_at_period_end = patch
            .cancel_at_period_end
            .unwrap_or(current.cancel_at_period_end);
        let pending_plan_id = match patch.pending_plan_id {
            Some(value) => value,
            None => current.pending_plan_id,
        };

        let updated: Subscription = sqlx::query_as(
            r#"
            UPDATE subscriptions
            SET status = $2, plan_id = $3, cancel_at_period_end = $4,
                pending_plan_id = $5, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(status)
        .bind(plan_id)
        .bind(cancel_at_period_end)
        .bind(pending_plan_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(updated)
    }

    /// Cancel a subscription
    ///
    /// With `at_period_end` the subscription stays live and only the flag is
    /// set; otherwise the status flips to canceled immediately and the
    /// cancellation timestamp is recorded. Canceling a canceled subscription
    /// is an `InvalidState` error.
    pub async fn cancel(&self, id: Uuid, at_period_end: bool) -> BillingResult<Subscription> {
        let mut tx = self.pool.begin().await?;

        let current: Subscription =
            sqlx::query_as("SELECT * FROM subscriptions WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;

        if current.status.is_terminal() {
            return Err(BillingError::InvalidState(
                "subscription is already canceled".to_string(),
            ));
        }

        let updated: Subscription = if at_period_end {
            sqlx::query_as(
                r#"
                UPDATE subscriptions
                SET cancel_at_period_end = TRUE, updated_at = NOW()
                WHERE id = $1
                RETURNING *
                "#,
            )
            .bind(id)
            .fetch_one(&mut *tx)
            .await?
        } else {
            sqlx::query_as(
                r#"
                UPDATE subscriptions
                SET status = 'canceled', canceled_at = NOW(), updated_at = NOW()
                WHERE id = $1
                RETURNING *
                "#,
            )
            .bind(id)
            .fetch_one(&mut *tx)
            .await?
        };

        tx.commit().await?;

        tracing::info!(subscription_id = %id, at_period_end, "Subscription canceled");

        Ok(updated)
    }

    /// Change an organization's plan
    ///
    /// Upgrades take effect immediately. Downgrades are recorded as a pending
    /// plan and the current plan keeps running until the period ends. Lateral
    /// moves return the subscription unchanged.
    pub async fn change_plan(&self, id: Uuid, next: PlanId) -> BillingResult<Subscription> {
        let current = self.get(id).await?;

        if current.status.is_terminal() {
            return Err(BillingError::InvalidState(
                "cannot change plan on a canceled subscription".to_string(),
            ));
        }

        match classify_plan_change(current.plan_id, next) {
            PlanChange::Lateral => Ok(current),
            PlanChange::Upgrade => {
                self.update(
                    id,
                    SubscriptionPatch {
                        plan_id: Some(next),
                        pending_plan_id: Some(None),
                        ..Default::default()
                    },
                )
                .await
            }
            PlanChange::Downgrade => {
                self.update(
                    id,
                    SubscriptionPatch {
                        pending_plan_id: Some(Some(next)),
                        ..Default::default()
                    },
                )
                .await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_upgrade() {
        assert_eq!(
            classify_plan_change(PlanId::Free, PlanId::Pro),
            PlanChange::Upgrade
        );
        assert_eq!(
            classify_plan_change(PlanId::Pro, PlanId::Enterprise),
            PlanChange::Upgrade
        );
    }

    #[test]
    fn test_classify_downgrade() {
        assert_eq!(
            classify_plan_change(PlanId::Business, PlanId::Free),
            PlanChange::Downgrade
        );
        assert_eq!(
            classify_plan_change(PlanId::Pro, PlanId::Free),
            PlanChange::Downgrade
        );
    }

    #[test]
    fn test_classify_lateral() {
        assert_eq!(
            classify_plan_change(PlanId::Pro, PlanId::Pro),
            PlanChange::Lateral
        );
    }

    #[test]
    fn test_initial_status_free_is_active() {
        assert_eq!(initial_status_for(PlanId::Free), SubscriptionStatus::Active);
    }

    #[test]
    fn test_initial_status_paid_is_trialing() {
        assert_eq!(initial_status_for(PlanId::Pro), SubscriptionStatus::Trialing);
        assert_eq!(
            initial_status_for(PlanId::Business),
            SubscriptionStatus::Trialing
        );
        assert_eq!(
            initial_status_for(PlanId::Enterprise),
            SubscriptionStatus::Trialing
        );
    }
}
