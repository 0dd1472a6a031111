//! Membership store
//!
//! Organization lifecycle plus the membership rows tying users to
//! organizations. The `organization_members` table is the single source of
//! truth: both "organizations for a user" and "members of an organization"
//! are queries over it, so the two views can never disagree.

use sqlx::PgPool;
use uuid::Uuid;

use teamspace_shared::{Organization, OrgMember, OrgRole, UserProfile};

use crate::error::{OrgError, OrgResult};

/// Membership row joined with the member's profile
#[derive(Debug, Clone, serde::Serialize, sqlx::FromRow)]
pub struct MemberView {
    pub id: Uuid,
    pub org_id: Uuid,
    pub user_id: Uuid,
    pub role: OrgRole,
    pub joined_at: time::OffsetDateTime,
    pub email: Option<String>,
    pub display_name: Option<String>,
}

/// Partial update to an organization's details
#[derive(Debug, Clone, Default)]
pub struct OrgUpdate {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub logo_url: Option<Option<String>>,
    pub primary_color: Option<Option<String>>,
}

/// Membership store service
#[derive(Clone)]
pub struct MembershipStore {
    pool: PgPool,
}

impl MembershipStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    // Profiles
    // =========================================================================

    /// Create or refresh a user profile from the identity provider's claims
    pub async fn upsert_profile(
        &self,
        user_id: Uuid,
        email: &str,
        display_name: Option<&str>,
    ) -> OrgResult<UserProfile> {
        let profile: UserProfile = sqlx::query_as(
            r#"
            INSERT INTO users (id, email, display_name)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE
            SET email = EXCLUDED.email,
                display_name = EXCLUDED.display_name,
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(email)
        .bind(display_name)
        .fetch_one(&self.pool)
        .await?;

        Ok(profile)
    }

    pub async fn get_profile(&self, user_id: Uuid) -> OrgResult<UserProfile> {
        let profile: UserProfile = sqlx::query_as("SELECT * FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(profile)
    }

    /// Switch the user's active organization
    ///
    /// Fails with `Unauthorized` if the user is not a member of the target
    /// organization.
    pub async fn set_current_organization(&self, user_id: Uuid, org_id: Uuid) -> OrgResult<()> {
        if self.role_of(org_id, user_id).await?.is_none() {
            return Err(OrgError::Unauthorized(
                "user is not a member of that organization".to_string(),
            ));
        }

        sqlx::query("UPDATE users SET current_org_id = $2, updated_at = NOW() WHERE id = $1")
            .bind(user_id)
            .bind(org_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    // =========================================================================
    // Organizations
    // =========================================================================

    /// Create an organization with the creator as its owner
    ///
    /// The organization row, the owner's membership row, and the creator's
    /// active-organization pointer are written in one transaction.
    pub async fn create_organization(
        &self,
        owner_id: Uuid,
        name: &str,
        description: Option<&str>,
        primary_color: Option<&str>,
    ) -> OrgResult<Organization> {
        let name = name.trim();
        if name.is_empty() || name.len() > 100 {
            return Err(OrgError::Validation(
                "organization name must be 1-100 characters".to_string(),
            ));
        }

        let mut tx = self.pool.begin().await?;

        let org: Organization = sqlx::query_as(
            r#"
            INSERT INTO organizations
                (id, name, description, primary_color, owner_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, NOW(), NOW())
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(description)
        .bind(primary_color)
        .bind(owner_id)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO organization_members (id, org_id, user_id, role, joined_at)
            VALUES ($1, $2, $3, $4, NOW())
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(org.id)
        .bind(owner_id)
        .bind(OrgRole::Owner)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO users (id, current_org_id)
            VALUES ($1, $2)
            ON CONFLICT (id) DO UPDATE
            SET current_org_id = EXCLUDED.current_org_id, updated_at = NOW()
            "#,
        )
        .bind(owner_id)
        .bind(org.id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(org_id = %org.id, owner_id = %owner_id, "Organization created");

        Ok(org)
    }

    pub async fn get_organization(&self, org_id: Uuid) -> OrgResult<Organization> {
        let org: Organization = sqlx::query_as("SELECT * FROM organizations WHERE id = $1")
            .bind(org_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(org)
    }

    /// Organizations the user belongs to, oldest joined first
    pub async fn list_organizations_for_user(&self, user_id: Uuid) -> OrgResult<Vec<Organization>> {
        let orgs: Vec<Organization> = sqlx::query_as(
            r#"
            SELECT o.* FROM organizations o
            JOIN organization_members m ON m.org_id = o.id
            WHERE m.user_id = $1
            ORDER BY m.joined_at ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(orgs)
    }

    /// Update an organization's details; requires admin or owner
    pub async fn update_details(
        &self,
        org_id: Uuid,
        acting_user: Uuid,
        update: OrgUpdate,
    ) -> OrgResult<Organization> {
        self.require_admin(org_id, acting_user).await?;

        if let Some(name) = &update.name {
            let trimmed = name.trim();
            if trimmed.is_empty() || trimmed.len() > 100 {
                return Err(OrgError::Validation(
                    "organization name must be 1-100 characters".to_string(),
                ));
            }
        }

        let mut tx = self.pool.begin().await?;

        let current: Organization =
            sqlx::query_as("SELECT * FROM organizations WHERE id = $1 FOR UPDATE")
                .bind(org_id)
                .fetch_one(&mut *tx)
                .await?;

        let name = update
            .name
            .map(|n| n.trim().to_string())
            .unwrap_or(current.name);
        let description = update.description.unwrap_or(current.description);
        let logo_url = update.logo_url.unwrap_or(current.logo_url);
        let primary_color = update.primary_color.unwrap_or(current.primary_color);

        let org: Organization = sqlx::query_as(
            r#"
            UPDATE organizations
            SET name = $2, description = $3, logo_url = $4, primary_color = $5,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(org_id)
        .bind(name)
        .bind(description)
        .bind(logo_url)
        .bind(primary_color)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(org)
    }

    /// Delete an organization and everything hanging off it; owner only
    pub async fn delete_organization(&self, org_id: Uuid, acting_user: Uuid) -> OrgResult<()> {
        self.require_owner(org_id, acting_user).await?;

        let mut tx = self.pool.begin().await?;

        // Billing records have no foreign keys back to the organization, so
        // the cascade is spelled out here rather than left to the schema.
        for table in [
            "invitations",
            "subscriptions",
            "payment_methods",
            "invoices",
            "usage_samples",
        ] {
            sqlx::query(&format!("DELETE FROM {} WHERE org_id = $1", table))
                .bind(org_id)
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query("UPDATE users SET current_org_id = NULL WHERE current_org_id = $1")
            .bind(org_id)
            .execute(&mut *tx)
            .await?;

        // Membership rows go with the organization via ON DELETE CASCADE.
        sqlx::query("DELETE FROM organizations WHERE id = $1")
            .bind(org_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(org_id = %org_id, "Organization deleted");

        Ok(())
    }

    // =========================================================================
    // Members
    // =========================================================================

    /// Role of a user within an organization, if any
    pub async fn role_of(&self, org_id: Uuid, user_id: Uuid) -> OrgResult<Option<OrgRole>> {
        let role: Option<OrgRole> = sqlx::query_scalar(
            "SELECT role FROM organization_members WHERE org_id = $1 AND user_id = $2",
        )
        .bind(org_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(role)
    }

    pub(crate) async fn require_admin(&self, org_id: Uuid, user_id: Uuid) -> OrgResult<OrgRole> {
        match self.role_of(org_id, user_id).await? {
            Some(role) if role.can_administer() => Ok(role),
            Some(_) => Err(OrgError::Unauthorized(
                "admin or owner role required".to_string(),
            )),
            None => Err(OrgError::Unauthorized(
                "not a member of this organization".to_string(),
            )),
        }
    }

    async fn require_owner(&self, org_id: Uuid, user_id: Uuid) -> OrgResult<OrgRole> {
        match self.role_of(org_id, user_id).await? {
            Some(role) if role.is_owner() => Ok(role),
            Some(_) => Err(OrgError::Unauthorized("owner role required".to_string())),
            None => Err(OrgError::Unauthorized(
                "not a member of this organization".to_string(),
            )),
        }
    }

    /// Members of an organization with their profile details, owner first
    pub async fn members(&self, org_id: Uuid) -> OrgResult<Vec<MemberView>> {
        let members: Vec<MemberView> = sqlx::query_as(
            r#"
            SELECT m.id, m.org_id, m.user_id, m.role, m.joined_at,
                   u.email, u.display_name
            FROM organization_members m
            LEFT JOIN users u ON u.id = m.user_id
            WHERE m.org_id = $1
            ORDER BY m.joined_at ASC
            "#,
        )
        .bind(org_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(members)
    }

    /// Add a user to an organization, or update their role if already present
    ///
    /// This is the upsert primitive behind invitation acceptance; callers
    /// enforce authorization. The owner role is never granted this way.
    pub async fn add_member(
        &self,
        org_id: Uuid,
        user_id: Uuid,
        role: OrgRole,
    ) -> OrgResult<OrgMember> {
        if role.is_owner() {
            return Err(OrgError::Validation(
                "ownership is granted only via transfer".to_string(),
            ));
        }

        // Re-adding an existing member refreshes the role but never
        // demotes the owner.
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
        .bind(org_id)
        .bind(user_id)
        .bind(role)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| OrgError::Conflict("cannot change the owner's role".to_string()))?;

        Ok(member)
    }

    /// Remove a member; requires admin or owner, and the owner cannot be
    /// removed. Removing someone who is not a member is a no-op.
    pub async fn remove_member(
        &self,
        org_id: Uuid,
        acting_user: Uuid,
        user_id: Uuid,
    ) -> OrgResult<()> {
        self.require_admin(org_id, acting_user).await?;

        if let Some(role) = self.role_of(org_id, user_id).await? {
            if role.is_owner() {
                return Err(OrgError::Conflict(
                    "the owner cannot be removed".to_string(),
                ));
            }
        } else {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM organization_members WHERE org_id = $1 AND user_id = $2")
            .bind(org_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("UPDATE users SET current_org_id = NULL WHERE id = $1 AND current_org_id = $2")
            .bind(user_id)
            .bind(org_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(org_id = %org_id, user_id = %user_id, "Member removed");

        Ok(())
    }

    /// Change a member's role between admin and member
    ///
    /// The owner's role is fixed; moving ownership goes through
    /// `transfer_ownership`.
    pub async fn change_role(
        &self,
        org_id: Uuid,
        acting_user: Uuid,
        user_id: Uuid,
        new_role: OrgRole,
    ) -> OrgResult<OrgMember> {
        self.require_admin(org_id, acting_user).await?;

        if new_role.is_owner() {
            return Err(OrgError::Validation(
                "ownership is granted only via transfer".to_string(),
            ));
        }

        match self.role_of(org_id, user_id).await? {
            None => Err(OrgError::NotFound("member not found".to_string())),
            Some(role) if role.is_owner() => Err(OrgError::Conflict(
                "cannot change the owner's role".to_string(),
            )),
            Some(_) => {
                let member: OrgMember = sqlx::query_as(
                    r#"
                    UPDATE organization_members
                    SET role = $3
                    WHERE org_id = $1 AND user_id = $2
                    RETURNING *
                    "#,
                )
                .bind(org_id)
                .bind(user_id)
                .bind(new_role)
                .fetch_one(&self.pool)
                .await?;

                Ok(member)
            }
        }
    }

    /// Atomically move ownership to another existing member
    ///
    /// The old owner becomes an admin, the new owner's membership row and the
    /// organization's owner pointer flip in the same transaction, so there is
    /// exactly one owner at every commit point.
    pub async fn transfer_ownership(
        &self,
        org_id: Uuid,
        acting_user: Uuid,
        new_owner: Uuid,
    ) -> OrgResult<Organization> {
        self.require_owner(org_id, acting_user).await?;

        if acting_user == new_owner {
            return Err(OrgError::Validation(
                "user already owns this organization".to_string(),
            ));
        }

        if self.role_of(org_id, new_owner).await?.is_none() {
            return Err(OrgError::NotFound(
                "new owner must already be a member".to_string(),
            ));
        }

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "UPDATE organization_members SET role = 'admin' WHERE org_id = $1 AND user_id = $2",
        )
        .bind(org_id)
        .bind(acting_user)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE organization_members SET role = 'owner' WHERE org_id = $1 AND user_id = $2",
        )
        .bind(org_id)
        .bind(new_owner)
        .execute(&mut *tx)
        .await?;

        let org: Organization = sqlx::query_as(
            "UPDATE organizations SET owner_id = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(org_id)
        .bind(new_owner)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(org_id = %org_id, new_owner = %new_owner, "Ownership transferred");

        Ok(org)
    }
}
