use async_trait::async_trait;
use serde_json::Value;

use crate::{Document, DocumentId, Filter, Result, StoreError, TenantId};

/// Precondition for an atomic numeric increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IncrementGuard {
    /// Always apply the increment.
    #[default]
    None,

    /// Apply only if the current value is at least this much.
    AtLeast(i64),
}

impl IncrementGuard {
    /// Returns true if a field holding `current` passes the guard.
    pub fn allows(&self, current: i64) -> bool {
        match self {
            IncrementGuard::None => true,
            IncrementGuard::AtLeast(min) => current >= *min,
        }
    }
}

/// Outcome of a successful increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Adjustment {
    /// Field value before the increment.
    pub previous: i64,
    /// Field value after the increment.
    pub current: i64,
}

/// Core trait for tenant-scoped document collections.
///
/// Every operation is scoped by a tenant ID; documents of one tenant are
/// never visible to another. Bodies are JSON objects with an `id` field.
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Returns the first document (in insertion order) matching the filter.
    async fn find_one(
        &self,
        tenant: &TenantId,
        collection: &str,
        filter: &Filter,
    ) -> Result<Option<Value>>;

    /// Returns all documents matching the filter, in insertion order.
    async fn find(&self, tenant: &TenantId, collection: &str, filter: &Filter)
    -> Result<Vec<Value>>;

    /// Inserts a new document under the given ID.
    ///
    /// Fails with [`StoreError::Conflict`] if the ID is already taken.
    async fn insert_one(
        &self,
        tenant: &TenantId,
        collection: &str,
        id: DocumentId,
        body: Value,
    ) -> Result<DocumentId>;

    /// Shallow-merges `patch` into the first document matching the filter.
    ///
    /// Returns false if no document matched.
    async fn update_one(
        &self,
        tenant: &TenantId,
        collection: &str,
        filter: &Filter,
        patch: Value,
    ) -> Result<bool>;

    /// Counts the documents matching the filter.
    async fn count(&self, tenant: &TenantId, collection: &str, filter: &Filter) -> Result<u64>;

    /// Atomically adds `delta` to an integer field of one document.
    ///
    /// The guard is evaluated against the current value under the same
    /// lock/row-lock as the write, so a guarded decrement can never drive
    /// the field below the guard. Returns `None` if the document does not
    /// exist or the guard rejected the change. A missing field counts as 0.
    async fn increment(
        &self,
        tenant: &TenantId,
        collection: &str,
        id: DocumentId,
        field: &str,
        delta: i64,
        guard: IncrementGuard,
    ) -> Result<Option<Adjustment>>;
}

/// Typed convenience methods over [`DocumentStore`].
#[async_trait]
pub trait DocumentStoreExt: DocumentStore {
    /// Loads a typed document by ID.
    async fn get<T: Document>(&self, tenant: &TenantId, id: DocumentId) -> Result<Option<T>> {
        self.find_one_as(tenant, &Filter::by_id(id)).await
    }

    /// Loads the first typed document matching the filter.
    async fn find_one_as<T: Document>(
        &self,
        tenant: &TenantId,
        filter: &Filter,
    ) -> Result<Option<T>> {
        match self.find_one(tenant, T::COLLECTION, filter).await? {
            Some(body) => Ok(Some(serde_json::from_value(body)?)),
            None => Ok(None),
        }
    }

    /// Loads every typed document matching the filter.
    async fn find_as<T: Document>(&self, tenant: &TenantId, filter: &Filter) -> Result<Vec<T>> {
        self.find(tenant, T::COLLECTION, filter)
            .await?
            .into_iter()
            .map(|body| serde_json::from_value(body).map_err(StoreError::from))
            .collect()
    }

    /// Inserts a typed document under its own ID.
    async fn insert<T: Document>(&self, tenant: &TenantId, document: &T) -> Result<DocumentId> {
        let body = serde_json::to_value(document)?;
        self.insert_one(tenant, T::COLLECTION, document.id(), body)
            .await
    }

    /// Counts typed documents matching the filter.
    async fn count_of<T: Document>(&self, tenant: &TenantId, filter: &Filter) -> Result<u64> {
        self.count(tenant, T::COLLECTION, filter).await
    }
}

impl<T: DocumentStore + ?Sized> DocumentStoreExt for T {}

/// Checks that a body is a JSON object and stamps its `id` field.
pub(crate) fn prepare_body(id: DocumentId, mut body: Value) -> Result<Value> {
    let object = body
        .as_object_mut()
        .ok_or_else(|| StoreError::InvalidDocument("document body must be an object".into()))?;

    match object.get("id") {
        Some(Value::String(existing)) if existing != &id.to_string() => {
            return Err(StoreError::InvalidDocument(format!(
                "body id {existing} does not match {id}"
            )));
        }
        Some(Value::String(_)) => {}
        Some(_) => {
            return Err(StoreError::InvalidDocument("id must be a string".into()));
        }
        None => {
            object.insert("id".to_string(), Value::String(id.to_string()));
        }
    }

    Ok(body)
}

/// Reads an integer field, treating a missing field as zero.
pub(crate) fn integer_field(body: &Value, field: &str) -> Result<i64> {
    match body.get(field) {
        None | Some(Value::Null) => Ok(0),
        Some(v) => v
            .as_i64()
            .ok_or_else(|| StoreError::InvalidDocument(format!("field {field} is not an integer"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn guard_allows() {
        assert!(IncrementGuard::None.allows(-5));
        assert!(IncrementGuard::AtLeast(2).allows(2));
        assert!(!IncrementGuard::AtLeast(2).allows(1));
    }

    #[test]
    fn prepare_body_stamps_missing_id() {
        let id = DocumentId::new();
        let body = prepare_body(id, json!({"name": "x"})).unwrap();
        assert_eq!(body["id"], json!(id.to_string()));
    }

    #[test]
    fn prepare_body_rejects_mismatched_id() {
        let id = DocumentId::new();
        let other = DocumentId::new();
        let result = prepare_body(id, json!({"id": other.to_string()}));
        assert!(matches!(result, Err(StoreError::InvalidDocument(_))));
    }

    #[test]
    fn prepare_body_rejects_non_objects() {
        let result = prepare_body(DocumentId::new(), json!([1, 2]));
        assert!(matches!(result, Err(StoreError::InvalidDocument(_))));
    }

    #[test]
    fn integer_field_defaults_to_zero() {
        assert_eq!(integer_field(&json!({}), "stock").unwrap(), 0);
        assert_eq!(integer_field(&json!({"stock": 4}), "stock").unwrap(), 4);
        assert!(integer_field(&json!({"stock": "4"}), "stock").is_err());
    }
}
