//! Tenant resolution for inbound requests.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use common::{TenantContext, TenantId};
use store::DocumentStore;

use crate::AppState;
use crate::error::ApiError;

/// Header carrying the tenant id.
pub const TENANT_HEADER: &str = "x-tenant-id";

/// The resolved tenant, wrapped in a fresh per-request context.
///
/// Reads `x-tenant-id`, falling back to the configured default tenant.
/// Requests that resolve to no tenant are rejected with 400.
#[derive(Debug, Clone)]
pub struct Tenant(pub TenantContext);

impl<St> FromRequestParts<Arc<AppState<St>>> for Tenant
where
    St: DocumentStore + Clone + 'static,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState<St>>,
    ) -> Result<Self, Self::Rejection> {
        let from_header = match parts.headers.get(TENANT_HEADER) {
            Some(value) => {
                let raw = value
                    .to_str()
                    .map_err(|_| ApiError::BadRequest("invalid x-tenant-id header".into()))?;
                TenantId::new(raw)
            }
            None => None,
        };

        from_header
            .or_else(|| state.default_tenant.clone())
            .map(|tenant| Tenant(TenantContext::new(tenant)))
            .ok_or_else(|| ApiError::BadRequest("tenant could not be resolved".into()))
    }
}
