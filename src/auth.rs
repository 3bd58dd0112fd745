//! Role-based authorization of actions.
//!
//! The framework never authenticates anyone. A [`PrincipalSource`] turns each
//! request into a [`Principal`] (a set of role names) and [`authorize`]
//! compares it with what the action declared at registration.
//!
//! | Declared on the action | No roles | Disjoint roles | Overlapping roles |
//! |---|---|---|---|
//! | not registered | deny | deny | deny |
//! | registered, not an action | deny | deny | deny |
//! | action, no role set | permit | permit | permit |
//! | action, `{"*"}` | permit | permit | permit |
//! | action, `{}` | deny | deny | deny |
//! | action, `{"admin"}` | deny | deny | permit |

use std::collections::BTreeSet;

use tracing::info;

use crate::action::ActionDescriptor;
use crate::request::Request;

/// Role name matching every caller.
pub const WILDCARD: &str = "*";

/// The caller's identity as far as authorization cares.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Principal {
    roles: BTreeSet<String>,
}

impl Principal {
    /// A caller with no roles.
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn with_roles<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { roles: roles.into_iter().map(Into::into).collect() }
    }

    pub fn roles(&self) -> &BTreeSet<String> { &self.roles }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }
}

/// Outcome of [`authorize`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Decision {
    Permit,
    Deny(DenyReason),
}

impl Decision {
    pub fn is_permit(self) -> bool {
        matches!(self, Self::Permit)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DenyReason {
    /// Nothing with that name is registered on the controller.
    NoSuchAction,
    /// The name is registered but not as an action.
    NotAnAction,
    /// The action declares an empty role set.
    EmptyRoleSet,
    /// The action declares roles and the caller has none.
    NoRoles,
    /// The caller's roles and the declared roles do not intersect.
    RoleMismatch,
}

/// Decides whether `principal` may invoke the action described by `descriptor`.
///
/// `descriptor` is `None` when the controller has nothing registered under the
/// requested name.
pub fn authorize(descriptor: Option<&ActionDescriptor>, principal: &Principal) -> Decision {
    let Some(descriptor) = descriptor else {
        info!("no such action, will not authorize request");
        return Decision::Deny(DenyReason::NoSuchAction);
    };
    if !descriptor.is_action {
        info!(method = %descriptor.name, "not an action method, will not authorize request");
        return Decision::Deny(DenyReason::NotAnAction);
    }
    let Some(required) = &descriptor.required_roles else {
        return Decision::Permit;
    };

    let decision = if required.is_empty() {
        Decision::Deny(DenyReason::EmptyRoleSet)
    } else if required.contains(WILDCARD) {
        Decision::Permit
    } else if principal.roles.is_empty() {
        Decision::Deny(DenyReason::NoRoles)
    } else if principal.roles.iter().any(|r| required.contains(r)) {
        Decision::Permit
    } else {
        Decision::Deny(DenyReason::RoleMismatch)
    };

    if let Decision::Deny(reason) = decision {
        info!(action = %descriptor.name, ?reason, "will not authorize request");
    }
    decision
}

// ── Principal sources ─────────────────────────────────────────────────────────

/// Produces the [`Principal`] for a request.
///
/// Implemented for any `Fn(&Request) -> Principal`, so a closure reading a
/// cookie or a verified token works as-is.
pub trait PrincipalSource: Send + Sync + 'static {
    fn principal(&self, req: &Request) -> Principal;
}

impl<F> PrincipalSource for F
where
    F: Fn(&Request) -> Principal + Send + Sync + 'static,
{
    fn principal(&self, req: &Request) -> Principal {
        self(req)
    }
}

/// Every request is anonymous. The default source.
#[derive(Clone, Copy, Debug, Default)]
pub struct Anonymous;

impl PrincipalSource for Anonymous {
    fn principal(&self, _req: &Request) -> Principal {
        Principal::anonymous()
    }
}

/// Reads roles from a comma-separated request header.
///
/// Only sound behind a proxy that authenticates the caller and overwrites the
/// header on every request.
#[derive(Clone, Debug)]
pub struct RolesHeader {
    name: String,
}

impl RolesHeader {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl PrincipalSource for RolesHeader {
    fn principal(&self, req: &Request) -> Principal {
        let Some(value) = req.header(&self.name) else {
            return Principal::anonymous();
        };
        Principal::with_roles(
            value.split(',').map(str::trim).filter(|r| !r.is_empty()),
        )
    }
}
