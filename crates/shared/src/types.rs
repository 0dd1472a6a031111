//! Common types used across Teamspace

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

// =============================================================================
// Enums
// =============================================================================

/// User role within an organization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OrgRole {
    Owner,
    Admin,
    Member,
}

impl Default for OrgRole {
    fn default() -> Self {
        Self::Member
    }
}

impl OrgRole {
    /// Get the permission level for this role (higher = more permissions)
    /// Owner: 2, Admin: 1, Member: 0
    pub fn level(&self) -> u8 {
        match self {
            Self::Owner => 2,
            Self::Admin => 1,
            Self::Member => 0,
        }
    }

    /// Check if this role can administer the organization
    /// Only Owner and Admin can administer
    pub fn can_administer(&self) -> bool {
        self.level() >= 1
    }

    /// Check if this role has owner privileges
    pub fn is_owner(&self) -> bool {
        matches!(self, Self::Owner)
    }
}

impl std::fmt::Display for OrgRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Owner => write!(f, "owner"),
            Self::Admin => write!(f, "admin"),
            Self::Member => write!(f, "member"),
        }
    }
}

impl std::str::FromStr for OrgRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "owner" => Ok(Self::Owner),
            "admin" => Ok(Self::Admin),
            "member" => Ok(Self::Member),
            _ => Err(format!("Invalid organization role: {}", s)),
        }
    }
}

/// Invitation lifecycle status
///
/// Accepted and declined are terminal; a resend forces a declined invitation
/// back to pending with a fresh token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Declined,
}

impl InvitationStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Accepted | Self::Declined)
    }
}

impl std::fmt::Display for InvitationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Accepted => write!(f, "accepted"),
            Self::Declined => write!(f, "declined"),
        }
    }
}

impl std::str::FromStr for InvitationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "accepted" => Ok(Self::Accepted),
            "declined" => Ok(Self::Declined),
            _ => Err(format!("Invalid invitation status: {}", s)),
        }
    }
}

/// Subscription plan identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PlanId {
    Free,
    Pro,
    Business,
    Enterprise,
}

impl Default for PlanId {
    fn default() -> Self {
        Self::Free
    }
}

impl PlanId {
    pub fn is_paid(&self) -> bool {
        !matches!(self, Self::Free)
    }
}

impl std::fmt::Display for PlanId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Free => write!(f, "free"),
            Self::Pro => write!(f, "pro"),
            Self::Business => write!(f, "business"),
            Self::Enterprise => write!(f, "enterprise"),
        }
    }
}

impl std::str::FromStr for PlanId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "free" => Ok(Self::Free),
            "pro" => Ok(Self::Pro),
            "business" => Ok(Self::Business),
            "enterprise" => Ok(Self::Enterprise),
            _ => Err(format!("Invalid plan id: {}", s)),
        }
    }
}

/// Subscription status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Trialing,
    Active,
    PastDue,
    Canceled,
    Incomplete,
}

impl SubscriptionStatus {
    /// Canceled subscriptions never return to service
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Canceled)
    }
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trialing => write!(f, "trialing"),
            Self::Active => write!(f, "active"),
            Self::PastDue => write!(f, "past_due"),
            Self::Canceled => write!(f, "canceled"),
            Self::Incomplete => write!(f, "incomplete"),
        }
    }
}

impl std::str::FromStr for SubscriptionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trialing" => Ok(Self::Trialing),
            "active" => Ok(Self::Active),
            "past_due" => Ok(Self::PastDue),
            "canceled" => Ok(Self::Canceled),
            "incomplete" => Ok(Self::Incomplete),
            _ => Err(format!("Invalid subscription status: {}", s)),
        }
    }
}

/// Invoice status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Draft,
    Open,
    Paid,
    Uncollectible,
    Void,
}

impl Default for InvoiceStatus {
    fn default() -> Self {
        Self::Draft
    }
}

/// Payment method kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethodType {
    Card,
    BankAccount,
}

/// Tracked usage metric
///
/// Each metric is an independent gauge; the current value is the most recent
/// sample for the (org, metric) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UsageMetric {
    Storage,
    Members,
    Organizations,
}

impl UsageMetric {
    /// All tracked metrics, in reporting order
    pub const ALL: [UsageMetric; 3] = [Self::Storage, Self::Members, Self::Organizations];
}

impl std::fmt::Display for UsageMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Storage => write!(f, "storage"),
            Self::Members => write!(f, "members"),
            Self::Organizations => write!(f, "organizations"),
        }
    }
}

impl std::str::FromStr for UsageMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "storage" => Ok(Self::Storage),
            "members" => Ok(Self::Members),
            "organizations" => Ok(Self::Organizations),
            _ => Err(format!("Invalid usage metric: {}", s)),
        }
    }
}

// =============================================================================
// Database Models
// =============================================================================

/// User profile (identity comes from the external auth provider; this row
/// holds display data and the current-organization preference)
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
    pub current_org_id: Option<Uuid>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Organization (tenant) model
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Organization {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub logo_url: Option<String>,
    pub primary_color: Option<String>,
    pub owner_id: Uuid,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Membership row: one (user, role) relationship within one organization
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OrgMember {
    pub id: Uuid,
    pub org_id: Uuid,
    pub user_id: Uuid,
    pub role: OrgRole,
    pub joined_at: OffsetDateTime,
}

/// Invitation model
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Invitation {
    pub id: Uuid,
    pub org_id: Uuid,
    pub org_name: String,
    pub email: String,
    pub role: OrgRole,
    pub invited_by: Uuid,
    pub inviter_name: Option<String>,
    pub status: InvitationStatus,
    #[serde(skip_serializing)]
    pub token: String,
    pub expires_at: OffsetDateTime,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Subscription model
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Subscription {
    pub id: Uuid,
    pub org_id: Uuid,
    pub user_id: Uuid,
    pub plan_id: PlanId,
    pub status: SubscriptionStatus,
    pub current_period_start: OffsetDateTime,
    pub current_period_end: OffsetDateTime,
    pub cancel_at_period_end: bool,
    pub canceled_at: Option<OffsetDateTime>,
    /// Downgrade target, applied at period end
    pub pending_plan_id: Option<PlanId>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Payment method model (soft-deleted via the `deleted` flag; cards are
/// recorded, never charged)
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PaymentMethod {
    pub id: Uuid,
    pub org_id: Uuid,
    pub user_id: Uuid,
    pub method_type: PaymentMethodType,
    pub brand: Option<String>,
    pub last4: Option<String>,
    pub exp_month: Option<i32>,
    pub exp_year: Option<i32>,
    pub bank_name: Option<String>,
    pub is_default: bool,
    pub deleted: bool,
    pub created_at: OffsetDateTime,
}

/// Invoice model (append-only, never mutated after creation)
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Invoice {
    pub id: Uuid,
    pub org_id: Uuid,
    pub user_id: Uuid,
    pub subscription_id: Uuid,
    pub amount_cents: i64,
    pub currency: String,
    pub status: InvoiceStatus,
    pub period_start: OffsetDateTime,
    pub period_end: OffsetDateTime,
    pub created_at: OffsetDateTime,
}

/// Usage sample model: one timestamped observation of a metric's value
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UsageSample {
    pub id: Uuid,
    pub org_id: Uuid,
    pub metric: UsageMetric,
    pub value: f64,
    pub recorded_at: OffsetDateTime,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Allow unwrap() in tests for cleaner test code
mod tests {
    use super::*;

    // =========================================================================
    // OrgRole Tests
    // =========================================================================

    #[test]
    fn test_org_role_default() {
        assert_eq!(OrgRole::default(), OrgRole::Member);
    }

    #[test]
    fn test_org_role_levels() {
        assert_eq!(OrgRole::Member.level(), 0);
        assert_eq!(OrgRole::Admin.level(), 1);
        assert_eq!(OrgRole::Owner.level(), 2);
    }

    #[test]
    fn test_org_role_permissions() {
        assert!(!OrgRole::Member.can_administer());
        assert!(OrgRole::Admin.can_administer());
        assert!(OrgRole::Owner.can_administer());

        assert!(!OrgRole::Member.is_owner());
        assert!(!OrgRole::Admin.is_owner());
        assert!(OrgRole::Owner.is_owner());
    }

    #[test]
    fn test_org_role_display_and_parse() {
        assert_eq!(format!("{}", OrgRole::Owner), "owner");
        assert_eq!("ADMIN".parse::<OrgRole>().unwrap(), OrgRole::Admin);
        assert_eq!("member".parse::<OrgRole>().unwrap(), OrgRole::Member);
        assert!("viewer".parse::<OrgRole>().is_err());
    }

    // =========================================================================
    // InvitationStatus Tests
    // =========================================================================

    #[test]
    fn test_invitation_status_terminal() {
        assert!(!InvitationStatus::Pending.is_terminal());
        assert!(InvitationStatus::Accepted.is_terminal());
        assert!(InvitationStatus::Declined.is_terminal());
    }

    #[test]
    fn test_invitation_status_parse() {
        assert_eq!(
            "pending".parse::<InvitationStatus>().unwrap(),
            InvitationStatus::Pending
        );
        assert_eq!(
            "Accepted".parse::<InvitationStatus>().unwrap(),
            InvitationStatus::Accepted
        );
        assert!("revoked".parse::<InvitationStatus>().is_err());
    }

    // =========================================================================
    // PlanId Tests
    // =========================================================================

    #[test]
    fn test_plan_id_default() {
        assert_eq!(PlanId::default(), PlanId::Free);
    }

    #[test]
    fn test_plan_id_is_paid() {
        assert!(!PlanId::Free.is_paid());
        assert!(PlanId::Pro.is_paid());
        assert!(PlanId::Business.is_paid());
        assert!(PlanId::Enterprise.is_paid());
    }

    #[test]
    fn test_plan_id_display_and_parse() {
        assert_eq!(format!("{}", PlanId::Business), "business");
        assert_eq!("PRO".parse::<PlanId>().unwrap(), PlanId::Pro);
        assert!("platinum".parse::<PlanId>().is_err());
    }

    // =========================================================================
    // SubscriptionStatus Tests
    // =========================================================================

    #[test]
    fn test_subscription_status_display_and_parse() {
        assert_eq!(format!("{}", SubscriptionStatus::PastDue), "past_due");
        assert_eq!(
            "past_due".parse::<SubscriptionStatus>().unwrap(),
            SubscriptionStatus::PastDue
        );
        assert_eq!(
            "trialing".parse::<SubscriptionStatus>().unwrap(),
            SubscriptionStatus::Trialing
        );
        assert!("paused".parse::<SubscriptionStatus>().is_err());
    }

    #[test]
    fn test_subscription_status_terminal() {
        assert!(SubscriptionStatus::Canceled.is_terminal());
        assert!(!SubscriptionStatus::PastDue.is_terminal());
        assert!(!SubscriptionStatus::Active.is_terminal());
    }

    // =========================================================================
    // UsageMetric Tests
    // =========================================================================

    #[test]
    fn test_usage_metric_all() {
        assert_eq!(UsageMetric::ALL.len(), 3);
        assert_eq!(UsageMetric::ALL[0], UsageMetric::Storage);
    }

    #[test]
    fn test_usage_metric_display_and_parse() {
        assert_eq!(format!("{}", UsageMetric::Members), "members");
        assert_eq!(
            "storage".parse::<UsageMetric>().unwrap(),
            UsageMetric::Storage
        );
        assert!("bandwidth".parse::<UsageMetric>().is_err());
    }
}
