//! Shared identifiers and the request-scoped tenant context.

pub mod context;
pub mod types;

pub use context::TenantContext;
pub use types::{DocumentId, TenantId};
