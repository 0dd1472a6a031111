//! Invoice records
//!
//! Append-only billing history. Invoices are never edited or deleted once
//! written.

use sqlx::PgPool;
use uuid::Uuid;

use teamspace_shared::{Invoice, InvoiceStatus};

use crate::error::{BillingError, BillingResult};

/// Details for a new invoice
#[derive(Debug, Clone)]
pub struct NewInvoice {
    pub subscription_id: Uuid,
    pub amount_cents: i64,
    pub currency: String,
    pub status: InvoiceStatus,
    pub period_start: time::OffsetDateTime,
    pub period_end: time::OffsetDateTime,
}

/// Invoice service
#[derive(Clone)]
pub struct Invoices {
    pool: PgPool,
}

impl Invoices {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Record an invoice for an organization
    pub async fn create(
        &self,
        org_id: Uuid,
        user_id: Uuid,
        details: NewInvoice,
    ) -> BillingResult<Invoice> {
        if details.amount_cents < 0 {
            return Err(BillingError::Validation(
                "invoice amount cannot be negative".to_string(),
            ));
        }

        let invoice: Invoice = sqlx::query_as(
            r#"
            INSERT INTO invoices
                (id, org_id, user_id, subscription_id, amount_cents, currency,
                 status, period_start, period_end, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NOW())
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(org_id)
        .bind(user_id)
        .bind(details.subscription_id)
        .bind(details.amount_cents)
        .bind(details.currency)
        .bind(details.status)
        .bind(details.period_start)
        .bind(details.period_end)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(org_id = %org_id, invoice_id = %invoice.id, amount_cents = invoice.amount_cents, "Invoice recorded");

        Ok(invoice)
    }

    /// Fetch an invoice by id
    pub async fn get(&self, id: Uuid) -> BillingResult<Invoice> {
        let invoice: Invoice = sqlx::query_as("SELECT * FROM invoices WHERE id = $1")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;

        Ok(invoice)
    }

    /// Invoices for an organization, newest first
    pub async fn list_for_org(&self, org_id: Uuid) -> BillingResult<Vec<Invoice>> {
        let invoices: Vec<Invoice> = sqlx::query_as(
            r#"
            SELECT * FROM invoices
            WHERE org_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(org_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(invoices)
    }
}
