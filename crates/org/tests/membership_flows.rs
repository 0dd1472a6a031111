//! Membership and invitation flow tests
//!
//! These hit a live PostgreSQL instance and are ignored by default. Run with
//! DATABASE_URL set and `cargo test -- --ignored`.

#![allow(clippy::expect_used)] // Allow expect() in tests for cleaner test code

use uuid::Uuid;

use teamspace_org::{InvitationService, MembershipStore, OrgError};
use teamspace_shared::{db, InvitationStatus, OrgRole};

async fn test_pool() -> sqlx::PgPool {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for ignored tests");
    db::create_pool(&url, 5).await.expect("pool")
}

fn unique_email(tag: &str) -> String {
    format!("{}+{}@example.com", tag, Uuid::new_v4().simple())
}

#[tokio::test]
#[ignore]
async fn invitation_flow_from_create_to_accept() {
    let pool = test_pool().await;
    let store = MembershipStore::new(pool.clone());
    let invitations = InvitationService::new(pool.clone());

    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();
    let bob_email = unique_email("bob");

    store
        .upsert_profile(alice, &unique_email("alice"), Some("Alice"))
        .await
        .expect("alice profile");
    store
        .upsert_profile(bob, &bob_email, Some("Bob"))
        .await
        .expect("bob profile");

    let org = store
        .create_organization(alice, "Acme", None, None)
        .await
        .expect("create org");

    assert_eq!(
        store.role_of(org.id, alice).await.expect("role"),
        Some(OrgRole::Owner)
    );

    let invitation = invitations
        .create_invitation(org.id, alice, &bob_email, OrgRole::Member)
        .await
        .expect("invite bob");
    assert_eq!(invitation.status, InvitationStatus::Pending);

    let member = invitations
        .accept(&invitation.token, bob)
        .await
        .expect("accept");
    assert_eq!(member.role, OrgRole::Member);

    let members = store.members(org.id).await.expect("members");
    assert_eq!(members.len(), 2);
    let roles: Vec<(Uuid, OrgRole)> = members.iter().map(|m| (m.user_id, m.role)).collect();
    assert!(roles.contains(&(alice, OrgRole::Owner)));
    assert!(roles.contains(&(bob, OrgRole::Member)));

    // The token is single-use.
    let again = invitations.accept(&invitation.token, bob).await;
    assert!(matches!(again, Err(OrgError::InvalidState(_))));

    store
        .delete_organization(org.id, alice)
        .await
        .expect("cleanup");
}

#[tokio::test]
#[ignore]
async fn add_member_is_idempotent() {
    let pool = test_pool().await;
    let store = MembershipStore::new(pool.clone());

    let alice = Uuid::new_v4();
    let carol = Uuid::new_v4();

    let org = store
        .create_organization(alice, "Idempotent Inc", None, None)
        .await
        .expect("create org");

    store
        .add_member(org.id, carol, OrgRole::Member)
        .await
        .expect("first add");
    store
        .add_member(org.id, carol, OrgRole::Admin)
        .await
        .expect("second add upgrades role");

    let members = store.members(org.id).await.expect("members");
    assert_eq!(members.len(), 2);
    let carol_row = members.iter().find(|m| m.user_id == carol).expect("carol");
    assert_eq!(carol_row.role, OrgRole::Admin);

    store
        .delete_organization(org.id, alice)
        .await
        .expect("cleanup");
}

#[tokio::test]
#[ignore]
async fn remove_member_restores_prior_state() {
    let pool = test_pool().await;
    let store = MembershipStore::new(pool.clone());

    let alice = Uuid::new_v4();
    let dave = Uuid::new_v4();

    let org = store
        .create_organization(alice, "Symmetric LLC", None, None)
        .await
        .expect("create org");

    let before = store.members(org.id).await.expect("members before");

    store
        .add_member(org.id, dave, OrgRole::Member)
        .await
        .expect("add");
    store
        .remove_member(org.id, alice, dave)
        .await
        .expect("remove");

    let after = store.members(org.id).await.expect("members after");
    assert_eq!(before.len(), after.len());

    // Removing a non-member is a no-op, not an error.
    store
        .remove_member(org.id, alice, dave)
        .await
        .expect("remove again");

    store
        .delete_organization(org.id, alice)
        .await
        .expect("cleanup");
}

#[tokio::test]
#[ignore]
async fn owner_cannot_be_removed_or_demoted() {
    let pool = test_pool().await;
    let store = MembershipStore::new(pool.clone());

    let alice = Uuid::new_v4();
    let org = store
        .create_organization(alice, "Fortress Co", None, None)
        .await
        .expect("create org");

    let removed = store.remove_member(org.id, alice, alice).await;
    assert!(matches!(removed, Err(OrgError::Conflict(_))));

    let demoted = store
        .change_role(org.id, alice, alice, OrgRole::Member)
        .await;
    assert!(matches!(demoted, Err(OrgError::Conflict(_))));

    store
        .delete_organization(org.id, alice)
        .await
        .expect("cleanup");
}

#[tokio::test]
#[ignore]
async fn transfer_ownership_is_atomic() {
    let pool = test_pool().await;
    let store = MembershipStore::new(pool.clone());

    let alice = Uuid::new_v4();
    let erin = Uuid::new_v4();

    let org = store
        .create_organization(alice, "Handover GmbH", None, None)
        .await
        .expect("create org");
    store
        .add_member(org.id, erin, OrgRole::Admin)
        .await
        .expect("add erin");

    let org = store
        .transfer_ownership(org.id, alice, erin)
        .await
        .expect("transfer");
    assert_eq!(org.owner_id, erin);
    assert_eq!(
        store.role_of(org.id, alice).await.expect("alice role"),
        Some(OrgRole::Admin)
    );
    assert_eq!(
        store.role_of(org.id, erin).await.expect("erin role"),
        Some(OrgRole::Owner)
    );

    // The old owner no longer holds owner powers.
    let denied = store.transfer_ownership(org.id, alice, alice).await;
    assert!(matches!(denied, Err(OrgError::Unauthorized(_))));

    store
        .delete_organization(org.id, erin)
        .await
        .expect("cleanup");
}

#[tokio::test]
#[ignore]
async fn member_cannot_administer() {
    let pool = test_pool().await;
    let store = MembershipStore::new(pool.clone());
    let invitations = InvitationService::new(pool.clone());

    let alice = Uuid::new_v4();
    let mallory = Uuid::new_v4();

    let org = store
        .create_organization(alice, "Locked Ltd", None, None)
        .await
        .expect("create org");
    store
        .add_member(org.id, mallory, OrgRole::Member)
        .await
        .expect("add mallory");

    let invite = invitations
        .create_invitation(org.id, mallory, &unique_email("friend"), OrgRole::Member)
        .await;
    assert!(matches!(invite, Err(OrgError::Unauthorized(_))));

    let removed = store.remove_member(org.id, mallory, alice).await;
    assert!(matches!(removed, Err(OrgError::Unauthorized(_))));

    store
        .delete_organization(org.id, alice)
        .await
        .expect("cleanup");
}

#[tokio::test]
#[ignore]
async fn resend_revives_declined_invitation() {
    let pool = test_pool().await;
    let store = MembershipStore::new(pool.clone());
    let invitations = InvitationService::new(pool.clone());

    let alice = Uuid::new_v4();
    let org = store
        .create_organization(alice, "Persistent Corp", None, None)
        .await
        .expect("create org");

    let invitation = invitations
        .create_invitation(org.id, alice, &unique_email("frank"), OrgRole::Member)
        .await
        .expect("invite");

    let declined = invitations
        .decline(&invitation.token)
        .await
        .expect("decline");
    assert_eq!(declined.status, InvitationStatus::Declined);

    let revived = invitations
        .resend(invitation.id, alice)
        .await
        .expect("resend");
    assert_eq!(revived.status, InvitationStatus::Pending);
    assert_ne!(revived.token, invitation.token);
    assert!(revived.expires_at > invitation.expires_at);

    store
        .delete_organization(org.id, alice)
        .await
        .expect("cleanup");
}
