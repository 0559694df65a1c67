//! Request-scoped context threaded through every pipeline call.

use uuid::Uuid;

use crate::types::TenantId;

/// Per-request context carrying the resolved tenant.
///
/// Built once per inbound request and passed explicitly to every
/// store read/write, so no tenant state is shared between requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantContext {
    tenant_id: TenantId,
    request_id: Uuid,
}

impl TenantContext {
    /// Creates a context for the given tenant with a fresh request ID.
    pub fn new(tenant_id: TenantId) -> Self {
        Self {
            tenant_id,
            request_id: Uuid::new_v4(),
        }
    }

    /// Returns the tenant this request is scoped to.
    pub fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }

    /// Returns the request correlation ID.
    pub fn request_id(&self) -> Uuid {
        self.request_id
    }
}
