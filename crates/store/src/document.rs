use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::DocumentId;

/// A typed document stored in a named collection.
///
/// Implementors serialize to a JSON object that carries their own `id`
/// field, so filters like [`Filter::by_id`](crate::Filter::by_id) work
/// against the stored body.
pub trait Document: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Name of the collection this document type lives in.
    const COLLECTION: &'static str;

    /// Returns the document's ID.
    fn id(&self) -> DocumentId;
}
