pub mod document;
pub mod error;
pub mod filter;
pub mod memory;
pub mod postgres;
pub mod store;

pub use common::{DocumentId, TenantId};
pub use document::Document;
pub use error::{Result, StoreError};
pub use filter::{Condition, Filter};
pub use memory::InMemoryDocumentStore;
pub use postgres::PostgresDocumentStore;
pub use store::{Adjustment, DocumentStore, DocumentStoreExt, IncrementGuard};
