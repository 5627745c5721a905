//! Row-level access checks.
//!
//! Whether a request needs a row-level check is decided by the caller's
//! [`Auther`]; this module only renders the predicate:
//!
//! ```sql
//! EXISTS(SELECT 1 FROM cases.case_acl acl
//!        WHERE acl.dc = $1 AND acl.object = c.case_id
//!          AND acl.subject = ANY($2) AND acl.access & $3::smallint = $4::smallint)
//! ```

use crate::qb::{Expr, Param};
use std::fmt;
use std::ops::BitOr;

/// Access bit mask stored in ACL tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Access(pub i16);

impl Access {
    pub const NONE: Access = Access(0);
    pub const READ: Access = Access(1 << 2);
    pub const WRITE: Access = Access(1 << 1);
    pub const DELETE: Access = Access(1 << 3);

    pub fn contains(self, other: Access) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn bits(self) -> i16 {
        self.0
    }
}

impl BitOr for Access {
    type Output = Access;

    fn bitor(self, rhs: Access) -> Access {
        Access(self.0 | rhs.0)
    }
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = if self.contains(Access::READ) { 'r' } else { '-' };
        let w = if self.contains(Access::WRITE) { 'w' } else { '-' };
        let d = if self.contains(Access::DELETE) { 'd' } else { '-' };
        write!(f, "{r}{w}{d}")
    }
}

/// Authenticated caller, supplied by the transport layer.
pub trait Auther: Send + Sync + fmt::Debug {
    /// Tenant (domain) id.
    fn domain_id(&self) -> i64;
    fn user_id(&self) -> i64;
    /// Subjects the ACL is matched against: the user and its roles.
    fn roles(&self) -> Vec<i64>;
    /// Whether rows of `scope` need an ACL check for `access`.
    fn is_rbac_check_required(&self, scope: &str, access: Access) -> bool;
}

/// Plain [`Auther`] holding its answers.
#[derive(Debug, Clone, Default)]
pub struct AuthContext {
    pub domain_id: i64,
    pub user_id: i64,
    pub roles: Vec<i64>,
    /// Scopes for which row-level checks are enforced
    pub rbac_scopes: Vec<String>,
}

impl AuthContext {
    pub fn new(domain_id: i64, user_id: i64) -> Self {
        Self {
            domain_id,
            user_id,
            roles: vec![user_id],
            rbac_scopes: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_roles(mut self, roles: Vec<i64>) -> Self {
        self.roles = roles;
        self
    }

    #[must_use]
    pub fn with_rbac_scope(mut self, scope: impl Into<String>) -> Self {
        self.rbac_scopes.push(scope.into());
        self
    }
}

impl Auther for AuthContext {
    fn domain_id(&self) -> i64 {
        self.domain_id
    }

    fn user_id(&self) -> i64 {
        self.user_id
    }

    fn roles(&self) -> Vec<i64> {
        self.roles.clone()
    }

    fn is_rbac_check_required(&self, scope: &str, _access: Access) -> bool {
        self.rbac_scopes.iter().any(|s| s == scope)
    }
}

/// `EXISTS` predicate checking that one of the caller's subjects holds
/// `access` on `object` (a qualified id column) in `acl_table`.
pub fn acl_predicate(auth: &dyn Auther, acl_table: &str, object: &str, access: Access) -> Expr {
    Expr::template(
        format!(
            "EXISTS(SELECT 1 FROM {acl_table} acl WHERE acl.dc = ? AND acl.object = {object} \
             AND acl.subject = ANY(?) AND acl.access & ?::smallint = ?::smallint)"
        ),
        vec![
            Param::new(auth.domain_id()),
            Param::new(auth.roles()),
            Param::new(access.bits()),
            Param::new(access.bits()),
        ],
    )
}

/// [`acl_predicate`] when the caller requires a check for `scope`, else `None`.
pub fn rbac_condition(
    auth: &dyn Auther,
    scope: &str,
    access: Access,
    acl_table: &str,
    object: &str,
) -> Option<Expr> {
    auth.is_rbac_check_required(scope, access)
        .then(|| acl_predicate(auth, acl_table, object, access))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qb::ParamList;

    #[test]
    fn access_bits() {
        let rw = Access::READ | Access::WRITE;
        assert!(rw.contains(Access::READ));
        assert!(!rw.contains(Access::DELETE));
        assert_eq!(rw.to_string(), "rw-");
    }

    #[test]
    fn predicate_text() {
        let auth = AuthContext::new(1, 10).with_roles(vec![10, 20]);
        let expr = acl_predicate(&auth, "cases.case_acl", "c.case_id", Access::READ);
        let mut params = ParamList::new();
        params.push(0i64);
        assert_eq!(
            expr.build(&mut params),
            "EXISTS(SELECT 1 FROM cases.case_acl acl WHERE acl.dc = $2 AND acl.object = c.case_id \
             AND acl.subject = ANY($3) AND acl.access & $4::smallint = $5::smallint)"
        );
        let debug: Vec<String> = params.iter().map(|p| format!("{p:?}")).collect();
        assert_eq!(debug, vec!["0", "1", "[10, 20]", "4", "4"]);
    }

    #[test]
    fn condition_only_when_required() {
        let auth = AuthContext::new(1, 10);
        assert!(rbac_condition(&auth, "cases", Access::READ, "cases.case_acl", "c.id").is_none());
        let auth = auth.with_rbac_scope("cases");
        assert!(rbac_condition(&auth, "cases", Access::READ, "cases.case_acl", "c.id").is_some());
    }
}
