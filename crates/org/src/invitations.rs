//! Invitation workflow
//!
//! Email-based invitations with opaque tokens. An invitation moves from
//! pending to accepted or declined; resending revives a declined invitation
//! with a fresh token and expiry. Expiry is enforced at accept time, never by
//! a background sweep; lookups still resolve expired pending invitations so
//! the invitee sees an expired state instead of a dead link.

use rand::RngCore;
use sqlx::PgPool;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use teamspace_shared::{Invitation, InvitationStatus, OrgMember, OrgRole};

use crate::error::{OrgError, OrgResult};
use crate::membership::MembershipStore;

const DEFAULT_EXPIRY_DAYS: i64 = 30;

/// Opaque CSPRNG token, 64 hex characters
fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && email.len() <= 254
}

/// Pure acceptance gate, checked before any mutation
fn validate_acceptable(invitation: &Invitation, now: OffsetDateTime) -> OrgResult<()> {
    if invitation.status != InvitationStatus::Pending {
        return Err(OrgError::InvalidState(format!(
            "invitation is {}",
            invitation.status
        )));
    }
    if now >= invitation.expires_at {
        return Err(OrgError::Expired("invitation has expired".to_string()));
    }
    Ok(())
}

/// Invitation workflow service
#[derive(Clone)]
pub struct InvitationService {
    pool: PgPool,
    membership: MembershipStore,
    expiry_days: i64,
}

impl InvitationService {
    pub fn new(pool: PgPool) -> Self {
        Self {
            membership: MembershipStore::new(pool.clone()),
            pool,
            expiry_days: DEFAULT_EXPIRY_DAYS,
        }
    }

    /// Build the service with the configured invitation expiry
    pub fn from_config(pool: PgPool, config: &teamspace_shared::Config) -> Self {
        Self::new(pool).with_expiry_days(config.invitation_expiry_days)
    }

    pub fn with_expiry_days(mut self, days: i64) -> Self {
        self.expiry_days = days;
        self
    }

    /// Invite an email address to an organization; requires admin or owner
    ///
    /// Rejected with `Conflict` when a pending invitation for the same email
    /// already exists, or when the address already belongs to a member.
    pub async fn create_invitation(
        &self,
        org_id: Uuid,
        acting_user: Uuid,
        email: &str,
        role: OrgRole,
    ) -> OrgResult<Invitation> {
        self.membership.require_admin(org_id, acting_user).await?;

        let email = email.trim().to_lowercase();
        if !is_valid_email(&email) {
            return Err(OrgError::Validation("invalid email address".to_string()));
        }
        if role.is_owner() {
            return Err(OrgError::Validation(
                "cannot invite someone as owner".to_string(),
            ));
        }

        let pending: Option<Uuid> = sqlx::query_scalar(
            "SELECT id FROM invitations WHERE org_id = $1 AND email = $2 AND status = 'pending'",
        )
        .bind(org_id)
        .bind(&email)
        .fetch_optional(&self.pool)
        .await?;
        if pending.is_some() {
            return Err(OrgError::Conflict(
                "a pending invitation already exists for this email".to_string(),
            ));
        }

        let existing_member: Option<Uuid> = sqlx::query_scalar(
            r#"
            SELECT m.id FROM organization_members m
            JOIN users u ON u.id = m.user_id
            WHERE m.org_id = $1 AND LOWER(u.email) = $2
            "#,
        )
        .bind(org_id)
        .bind(&email)
        .fetch_optional(&self.pool)
        .await?;
        if existing_member.is_some() {
            return Err(OrgError::Conflict(
                "that email already belongs to a member".to_string(),
            ));
        }

        // Denormalized so the invitee can see who invited them where without
        // read access to the organization.
        let org = self.membership.get_organization(org_id).await?;
        let inviter_name: Option<String> =
            sqlx::query_scalar("SELECT display_name FROM users WHERE id = $1")
                .bind(acting_user)
                .fetch_optional(&self.pool)
                .await?
                .flatten();

        let invitation: Invitation = sqlx::query_as(
            r#"
            INSERT INTO invitations
                (id, org_id, org_name, email, role, invited_by, inviter_name,
                 status, token, expires_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, 'pending', $8, $9, NOW(), NOW())
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(org_id)
        .bind(&org.name)
        .bind(&email)
        .bind(role)
        .bind(acting_user)
        .bind(inviter_name)
        .bind(generate_token())
        .bind(OffsetDateTime::now_utc() + Duration::days(self.expiry_days))
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(org_id = %org_id, invitation_id = %invitation.id, "Invitation created");

        Ok(invitation)
    }

    /// Look up a pending invitation by its token
    ///
    /// Terminal invitations are not found through this path; the token stops
    /// resolving once used. Expired-but-pending invitations ARE returned so
    /// the invitee can be shown an expired state; expiry is enforced at
    /// accept time.
    pub async fn get_by_token(&self, token: &str) -> OrgResult<Invitation> {
        let invitation: Invitation = sqlx::query_as(
            "SELECT * FROM invitations WHERE token = $1 AND status = 'pending'",
        )
        .bind(token)
        .fetch_one(&self.pool)
        .await?;

        Ok(invitation)
    }

    /// Accept an invitation, joining the organization
    ///
    /// The membership row and the status flip happen in one transaction, and
    /// the update is guarded on `status = 'pending'` so two concurrent accepts
    /// cannot both succeed.
    pub async fn accept(&self, token: &str, user_id: Uuid) -> OrgResult<OrgMember> {
        let invitation: Invitation = sqlx::query_as("SELECT * FROM invitations WHERE token = $1")
            .bind(token)
            .fetch_one(&self.pool)
            .await?;

        validate_acceptable(&invitation, OffsetDateTime::now_utc())?;

        let mut tx = self.pool.begin().await?;

        let member: OrgMember = sqlx::query_as(
            r#"
            INSERT INTO organization_members (id, org_id, user_id, role, joined_at)
            VALUES ($1, $2, $3, $4, NOW())
            ON CONFLICT (org_id, user_id) DO UPDATE
            SET role = EXCLUDED.role
            WHERE organization_members.role <> 'owner'
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(invitation.org_id)
        .bind(user_id)
        .bind(invitation.role)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| OrgError::Conflict("cannot change the owner's role".to_string()))?;

        let updated = sqlx::query(
            r#"
            UPDATE invitations
            SET status = 'accepted', updated_at = NOW()
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(invitation.id)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(OrgError::InvalidState(
                "invitation was already resolved".to_string(),
            ));
        }

        tx.commit().await?;

        tracing::info!(
            org_id = %invitation.org_id,
            user_id = %user_id,
            "Invitation accepted"
        );

        Ok(member)
    }

    /// Decline a pending invitation
    pub async fn decline(&self, token: &str) -> OrgResult<Invitation> {
        let invitation: Invitation = sqlx::query_as(
            r#"
            UPDATE invitations
            SET status = 'declined', updated_at = NOW()
            WHERE token = $1 AND status = 'pending'
            RETURNING *
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| OrgError::InvalidState("invitation is not pending".to_string()))?;

        Ok(invitation)
    }

    /// Withdraw a pending invitation; requires admin or owner
    ///
    /// The inviter-side counterpart of decline: the invitation moves to
    /// declined and its token stops resolving.
    pub async fn cancel(&self, invitation_id: Uuid, acting_user: Uuid) -> OrgResult<Invitation> {
        let invitation: Invitation = sqlx::query_as("SELECT * FROM invitations WHERE id = $1")
            .bind(invitation_id)
            .fetch_one(&self.pool)
            .await?;

        self.membership
            .require_admin(invitation.org_id, acting_user)
            .await?;

        let canceled: Invitation = sqlx::query_as(
            r#"
            UPDATE invitations
            SET status = 'declined', updated_at = NOW()
            WHERE id = $1 AND status = 'pending'
            RETURNING *
            "#,
        )
        .bind(invitation_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| OrgError::InvalidState("invitation is not pending".to_string()))?;

        Ok(canceled)
    }

    /// Reissue an invitation with a fresh token and expiry
    ///
    /// Works for pending and declined invitations; a declined invitation goes
    /// back to pending. Resending an accepted invitation is an error since
    /// the recipient already joined.
    pub async fn resend(&self, invitation_id: Uuid, acting_user: Uuid) -> OrgResult<Invitation> {
        let invitation: Invitation = sqlx::query_as("SELECT * FROM invitations WHERE id = $1")
            .bind(invitation_id)
            .fetch_one(&self.pool)
            .await?;

        self.membership
            .require_admin(invitation.org_id, acting_user)
            .await?;

        if invitation.status == InvitationStatus::Accepted {
            return Err(OrgError::InvalidState(
                "invitation was already accepted".to_string(),
            ));
        }

        let refreshed: Invitation = sqlx::query_as(
            r#"
            UPDATE invitations
            SET status = 'pending', token = $2, expires_at = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(invitation_id)
        .bind(generate_token())
        .bind(OffsetDateTime::now_utc() + Duration::days(self.expiry_days))
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(invitation_id = %invitation_id, "Invitation resent");

        Ok(refreshed)
    }

    /// All invitations for an organization, newest first; requires admin
    pub async fn invitations_for_org(
        &self,
        org_id: Uuid,
        acting_user: Uuid,
    ) -> OrgResult<Vec<Invitation>> {
        self.membership.require_admin(org_id, acting_user).await?;

        let invitations: Vec<Invitation> = sqlx::query_as(
            "SELECT * FROM invitations WHERE org_id = $1 ORDER BY created_at DESC",
        )
        .bind(org_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(invitations)
    }

    /// Pending invitations addressed to an email, expired ones included
    pub async fn pending_for_email(&self, email: &str) -> OrgResult<Vec<Invitation>> {
        let invitations: Vec<Invitation> = sqlx::query_as(
            r#"
            SELECT * FROM invitations
            WHERE LOWER(email) = LOWER($1) AND status = 'pending'
            ORDER BY created_at DESC
            "#,
        )
        .bind(email)
        .fetch_all(&self.pool)
        .await?;

        Ok(invitations)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Allow unwrap() in tests for cleaner test code
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_from_config_applies_expiry() {
        let config = teamspace_shared::Config {
            database_url: "postgres://localhost/teamspace".to_string(),
            database_max_connections: 3,
            invitation_expiry_days: 7,
        };
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy(&config.database_url)
            .unwrap();
        let service = InvitationService::from_config(pool, &config);
        assert_eq!(service.expiry_days, 7);
    }

    fn invitation(status: InvitationStatus, expires_at: OffsetDateTime) -> Invitation {
        Invitation {
            id: Uuid::new_v4(),
            org_id: Uuid::new_v4(),
            org_name: "Acme".to_string(),
            email: "bob@example.com".to_string(),
            role: OrgRole::Member,
            invited_by: Uuid::new_v4(),
            inviter_name: Some("Alice".to_string()),
            status,
            token: generate_token(),
            expires_at,
            created_at: OffsetDateTime::now_utc(),
            updated_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn test_token_is_64_hex_chars() {
        let token = generate_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_tokens_are_unique() {
        assert_ne!(generate_token(), generate_token());
    }

    #[test]
    fn test_valid_emails() {
        assert!(is_valid_email("bob@example.com"));
        assert!(is_valid_email("a.b+c@sub.example.org"));
    }

    #[test]
    fn test_invalid_emails() {
        assert!(!is_valid_email(""));
        assert!(!is_valid_email("bob"));
        assert!(!is_valid_email("bob@"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("bob@nodot"));
        assert!(!is_valid_email("bob@.example.com"));
        assert!(!is_valid_email("bob@example."));
    }

    #[test]
    fn test_pending_unexpired_is_acceptable() {
        let now = OffsetDateTime::now_utc();
        let inv = invitation(InvitationStatus::Pending, now + Duration::days(1));
        assert!(validate_acceptable(&inv, now).is_ok());
    }

    #[test]
    fn test_expired_invitation_rejected() {
        let now = OffsetDateTime::now_utc();
        let inv = invitation(InvitationStatus::Pending, now - Duration::seconds(1));
        assert!(matches!(
            validate_acceptable(&inv, now),
            Err(OrgError::Expired(_))
        ));
    }

    #[test]
    fn test_exactly_at_expiry_rejected() {
        let now = OffsetDateTime::now_utc();
        let inv = invitation(InvitationStatus::Pending, now);
        assert!(matches!(
            validate_acceptable(&inv, now),
            Err(OrgError::Expired(_))
        ));
    }

    #[test]
    fn test_terminal_invitation_rejected() {
        let now = OffsetDateTime::now_utc();
        for status in [InvitationStatus::Accepted, InvitationStatus::Declined] {
            let inv = invitation(status, now + Duration::days(1));
            assert!(matches!(
                validate_acceptable(&inv, now),
                Err(OrgError::InvalidState(_))
            ));
        }
    }
}
