//! Teamspace Organizations
//!
//! Organization lifecycle, the membership store, and the invitation workflow.

pub mod error;
pub mod invitations;
pub mod membership;

pub use error::{OrgError, OrgResult};
pub use invitations::InvitationService;
pub use membership::{MemberView, MembershipStore, OrgUpdate};
