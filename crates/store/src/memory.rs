use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::store::{integer_field, prepare_body};
use crate::{
    Adjustment, DocumentId, DocumentStore, Filter, IncrementGuard, Result, StoreError, TenantId,
};

type CollectionKey = (TenantId, String);

#[derive(Default)]
struct InMemoryState {
    collections: HashMap<CollectionKey, Vec<Value>>,
    unavailable: HashSet<String>,
}

/// In-memory document store for tests and single-process deployments.
///
/// Provides the same interface and guarantees as the PostgreSQL store:
/// every mutation happens under one write lock, so guarded increments
/// are atomic with respect to concurrent callers.
#[derive(Clone, Default)]
pub struct InMemoryDocumentStore {
    state: Arc<RwLock<InMemoryState>>,
}

impl InMemoryDocumentStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every operation on a collection fail with `Unavailable`.
    pub async fn set_unavailable(&self, collection: &str, unavailable: bool) {
        let mut state = self.state.write().await;
        if unavailable {
            state.unavailable.insert(collection.to_string());
        } else {
            state.unavailable.remove(collection);
        }
    }

    /// Returns the number of documents in a tenant's collection.
    pub async fn document_count(&self, tenant: &TenantId, collection: &str) -> usize {
        self.state
            .read()
            .await
            .collections
            .get(&(tenant.clone(), collection.to_string()))
            .map_or(0, Vec::len)
    }

    /// Clears all documents.
    pub async fn clear(&self) {
        self.state.write().await.collections.clear();
    }
}

fn check_available(state: &InMemoryState, collection: &str) -> Result<()> {
    if state.unavailable.contains(collection) {
        return Err(StoreError::Unavailable(format!(
            "collection {collection} is unreachable"
        )));
    }
    Ok(())
}

fn key(tenant: &TenantId, collection: &str) -> CollectionKey {
    (tenant.clone(), collection.to_string())
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn find_one(
        &self,
        tenant: &TenantId,
        collection: &str,
        filter: &Filter,
    ) -> Result<Option<Value>> {
        let state = self.state.read().await;
        check_available(&state, collection)?;

        Ok(state
            .collections
            .get(&key(tenant, collection))
            .and_then(|docs| docs.iter().find(|doc| filter.matches(doc)))
            .cloned())
    }

    async fn find(
        &self,
        tenant: &TenantId,
        collection: &str,
        filter: &Filter,
    ) -> Result<Vec<Value>> {
        let state = self.state.read().await;
        check_available(&state, collection)?;

        let Some(docs) = state.collections.get(&key(tenant, collection)) else {
            return Ok(Vec::new());
        };

        let matching = docs.iter().filter(|doc| filter.matches(doc)).cloned();
        Ok(match filter.result_limit() {
            Some(limit) => matching.take(limit).collect(),
            None => matching.collect(),
        })
    }

    async fn insert_one(
        &self,
        tenant: &TenantId,
        collection: &str,
        id: DocumentId,
        body: Value,
    ) -> Result<DocumentId> {
        let body = prepare_body(id, body)?;

        let mut state = self.state.write().await;
        check_available(&state, collection)?;

        let docs = state.collections.entry(key(tenant, collection)).or_default();
        if docs.iter().any(|doc| Filter::by_id(id).matches(doc)) {
            return Err(StoreError::Conflict {
                collection: collection.to_string(),
                id,
            });
        }

        docs.push(body);
        Ok(id)
    }

    async fn update_one(
        &self,
        tenant: &TenantId,
        collection: &str,
        filter: &Filter,
        patch: Value,
    ) -> Result<bool> {
        let Value::Object(patch) = patch else {
            return Err(StoreError::InvalidDocument("patch must be an object".into()));
        };
        if patch.contains_key("id") {
            return Err(StoreError::InvalidDocument("patch may not change id".into()));
        }

        let mut state = self.state.write().await;
        check_available(&state, collection)?;

        let target = state
            .collections
            .get_mut(&key(tenant, collection))
            .and_then(|docs| docs.iter_mut().find(|doc| filter.matches(doc)));

        match target.and_then(Value::as_object_mut) {
            Some(object) => {
                object.extend(patch);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn count(&self, tenant: &TenantId, collection: &str, filter: &Filter) -> Result<u64> {
        let state = self.state.read().await;
        check_available(&state, collection)?;

        Ok(state
            .collections
            .get(&key(tenant, collection))
            .map_or(0, |docs| docs.iter().filter(|doc| filter.matches(doc)).count()) as u64)
    }

    async fn increment(
        &self,
        tenant: &TenantId,
        collection: &str,
        id: DocumentId,
        field: &str,
        delta: i64,
        guard: IncrementGuard,
    ) -> Result<Option<Adjustment>> {
        let mut state = self.state.write().await;
        check_available(&state, collection)?;

        let by_id = Filter::by_id(id);
        let Some(doc) = state
            .collections
            .get_mut(&key(tenant, collection))
            .and_then(|docs| docs.iter_mut().find(|doc| by_id.matches(doc)))
        else {
            return Ok(None);
        };

        let previous = integer_field(doc, field)?;
        if !guard.allows(previous) {
            return Ok(None);
        }

        let current = previous + delta;
        if let Some(object) = doc.as_object_mut() {
            object.insert(field.to_string(), Value::from(current));
        }

        Ok(Some(Adjustment { previous, current }))
    }
}
