//! Teamspace Billing
//!
//! Plan catalog, usage ledger, subscription ledger, payment methods, invoices,
//! and the entitlement evaluator that gates actions by plan limits.

pub mod entitlement;
pub mod error;
pub mod invoices;
pub mod payment_methods;
pub mod plans;
pub mod subscriptions;
pub mod usage;

pub use entitlement::{EntitlementService, MetricEntitlement, OrgEntitlement, UsageBand};
pub use error::{BillingError, BillingResult};
pub use invoices::{Invoices, NewInvoice};
pub use payment_methods::{NewPaymentMethod, PaymentMethods};
pub use plans::{plan, plans, Plan, PlanLimits};
pub use subscriptions::{PlanChange, SubscriptionLedger, SubscriptionPatch};
pub use usage::{CurrentUsage, UsageLedger};
