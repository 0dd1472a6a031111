//! Payment method registry
//!
//! Soft-deleted rows stay in the table for audit and invoice references.
//! Among an organization's live methods at most one is the default, and the
//! default swap runs in a single transaction.

use sqlx::PgPool;
use uuid::Uuid;

use teamspace_shared::{PaymentMethod, PaymentMethodType};

use crate::error::{BillingError, BillingResult};

/// Details for a new payment method
#[derive(Debug, Clone)]
pub struct NewPaymentMethod {
    pub method_type: PaymentMethodType,
    pub brand: Option<String>,
    pub last4: Option<String>,
    pub exp_month: Option<i32>,
    pub exp_year: Option<i32>,
    pub bank_name: Option<String>,
}

/// Payment method service
#[derive(Clone)]
pub struct PaymentMethods {
    pool: PgPool,
}

impl PaymentMethods {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Register a payment method for an organization
    ///
    /// The first live method becomes the default automatically.
    pub async fn create(
        &self,
        org_id: Uuid,
        user_id: Uuid,
        details: NewPaymentMethod,
    ) -> BillingResult<PaymentMethod> {
        if let Some(last4) = &details.last4 {
            if last4.len() != 4 || !last4.chars().all(|c| c.is_ascii_digit()) {
                return Err(BillingError::Validation(
                    "last4 must be exactly four digits".to_string(),
                ));
            }
        }

        let mut tx = self.pool.begin().await?;

        let live_count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM payment_methods WHERE org_id = $1 AND deleted = FALSE",
        )
        .bind(org_id)
        .fetch_one(&mut *tx)
        .await?;

        let method: PaymentMethod = sqlx::query_as(
            r#"
            INSERT INTO payment_methods
                (id, org_id, user_id, method_type, brand, last4, exp_month,
                 exp_year, bank_name, is_default, deleted, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, FALSE, NOW())
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(org_id)
        .bind(user_id)
        .bind(details.method_type)
        .bind(details.brand)
        .bind(details.last4)
        .bind(details.exp_month)
        .bind(details.exp_year)
        .bind(details.bank_name)
        .bind(live_count == 0)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(method)
    }

    /// Live payment methods for an organization, default first
    pub async fn list_for_org(&self, org_id: Uuid) -> BillingResult<Vec<PaymentMethod>> {
        let methods: Vec<PaymentMethod> = sqlx::query_as(
            r#"
            SELECT * FROM payment_methods
            WHERE org_id = $1 AND deleted = FALSE
            ORDER BY is_default DESC, created_at ASC
            "#,
        )
        .bind(org_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(methods)
    }

    /// Make one method the default and clear the flag on every other live
    /// method in the same statement, so the exactly-one property holds at
    /// every commit point.
    pub async fn set_default(&self, org_id: Uuid, method_id: Uuid) -> BillingResult<PaymentMethod> {
        let mut tx = self.pool.begin().await?;

        let exists: Option<Uuid> = sqlx::query_scalar(
            "SELECT id FROM payment_methods WHERE id = $1 AND org_id = $2 AND deleted = FALSE",
        )
        .bind(method_id)
        .bind(org_id)
        .fetch_optional(&mut *tx)
        .await?;

        if exists.is_none() {
            return Err(BillingError::NotFound("payment method not found".to_string()));
        }

        sqlx::query(
            r#"
            UPDATE payment_methods
            SET is_default = (id = $1)
            WHERE org_id = $2 AND deleted = FALSE
            "#,
        )
        .bind(method_id)
        .bind(org_id)
        .execute(&mut *tx)
        .await?;

        let method: PaymentMethod = sqlx::query_as("SELECT * FROM payment_methods WHERE id = $1")
            .bind(method_id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(method)
    }

    /// Soft-delete a payment method
    ///
    /// Deleting the default while other live methods remain is a `Conflict`;
    /// the caller must pick a new default first. The last live method may be
    /// deleted freely.
    pub async fn delete(&self, org_id: Uuid, method_id: Uuid) -> BillingResult<()> {
        let mut tx = self.pool.begin().await?;

        let method: PaymentMethod = sqlx::query_as(
            "SELECT * FROM payment_methods WHERE id = $1 AND org_id = $2 AND deleted = FALSE FOR UPDATE",
        )
        .bind(method_id)
        .bind(org_id)
        .fetch_one(&mut *tx)
        .await?;

        if method.is_default {
            let others: i64 = sqlx::query_scalar(
                r#"
                SELECT COUNT(*) FROM payment_methods
                WHERE org_id = $1 AND deleted = FALSE AND id <> $2
                "#,
            )
            .bind(org_id)
            .bind(method_id)
            .fetch_one(&mut *tx)
            .await?;

            if others > 0 {
                return Err(BillingError::Conflict(
                    "cannot delete the default payment method while others remain".to_string(),
                ));
            }
        }

        sqlx::query("UPDATE payment_methods SET deleted = TRUE, is_default = FALSE WHERE id = $1")
            .bind(method_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::debug!(org_id = %org_id, method_id = %method_id, "Payment method deleted");

        Ok(())
    }
}
