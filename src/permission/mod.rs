//! Role-based access control.
//!
//! Every account has exactly one [`Role`]. Routes declare the [`RoleSet`]
//! allowed to use them and call [`check`] (usually through
//! `ClientCtx::require_roles`) before doing anything else.

use bitflags::bitflags;
use std::fmt;

/// Closed set of account roles. Names match the `roles` reference table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    Administrator,
    Moderator,
    User,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Administrator, Role::Moderator, Role::User];

    /// Name stored in `roles.name`.
    pub fn name(self) -> &'static str {
        match self {
            Role::Administrator => "administrator",
            Role::Moderator => "moderator",
            Role::User => "user",
        }
    }

    /// Human readable description seeded into `roles.description`.
    pub fn description(self) -> &'static str {
        match self {
            Role::Administrator => "Full access",
            Role::Moderator => "Review moderation and book editing",
            Role::User => "Regular reader",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Role::ALL.into_iter().find(|role| role.name() == name)
    }

    /// The single-member set for this role.
    pub fn as_set(self) -> RoleSet {
        match self {
            Role::Administrator => RoleSet::ADMINISTRATOR,
            Role::Moderator => RoleSet::MODERATOR,
            Role::User => RoleSet::USER,
        }
    }

    /// True for roles allowed to act on content they do not own.
    pub fn is_staff(self) -> bool {
        RoleSet::STAFF.contains(self.as_set())
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

bitflags! {
    /// Set of roles a route accepts.
    pub struct RoleSet: u8 {
        const ADMINISTRATOR = 0b001;
        const MODERATOR = 0b010;
        const USER = 0b100;
        /// Book management and review moderation.
        const STAFF = Self::ADMINISTRATOR.bits | Self::MODERATOR.bits;
        /// Any signed-in account.
        const MEMBER = Self::STAFF.bits | Self::USER.bits;
    }
}

impl RoleSet {
    pub fn allows(self, role: Role) -> bool {
        self.contains(role.as_set())
    }
}

/// Outcome of guarding a route.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Access {
    Allow,
    /// No identity; send to the login page and come back afterwards.
    RedirectLogin,
    /// Signed in but the role is not in the required set.
    RedirectDenied,
}

/// Decides whether an identity with `role` (None for guests) may use a route
/// that requires `required`.
pub fn check(role: Option<Role>, required: RoleSet) -> Access {
    match role {
        None => Access::RedirectLogin,
        Some(role) if required.allows(role) => Access::Allow,
        Some(_) => Access::RedirectDenied,
    }
}
