use tracing::warn;

use super::domain::{Case, TenantId};

/// Resources that carry an owning tenant.
pub trait TenantScoped {
    fn tenant_id(&self) -> &TenantId;
}

impl TenantScoped for Case {
    fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }
}

/// Outcome of a failed scope check. Deliberately carries no detail: callers
/// surface it as not-found so a foreign tenant cannot probe for existence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("resource not found")]
pub struct ScopeDenied;

/// Check a loaded resource against the caller's tenant.
///
/// Both an absent resource and a foreign-tenant resource come back as
/// `ScopeDenied`; the security-audit event is the only place the two are
/// distinguished.
pub fn require_tenant_scope<T: TenantScoped>(
    resource: Option<T>,
    tenant: &TenantId,
) -> Result<T, ScopeDenied> {
    match resource {
        None => {
            warn!(
                tenant = %tenant.0,
                outcome = "missing",
                "tenant scope check failed: resource absent"
            );
            Err(ScopeDenied)
        }
        Some(resource) if resource.tenant_id() != tenant => {
            warn!(
                tenant = %tenant.0,
                owner = %resource.tenant_id().0,
                outcome = "tenant_mismatch",
                "tenant scope check failed: resource owned by another tenant"
            );
            Err(ScopeDenied)
        }
        Some(resource) => Ok(resource),
    }
}
