use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a stored document.
///
/// Wraps a UUID so document ids cannot be mixed up with tenant ids
/// or other UUID-based identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(Uuid);

impl DocumentId {
    /// Creates a new random document ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a document ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Derives a stable ID from another document ID and a namespace label.
    ///
    /// The same inputs always produce the same ID, which lets a follow-up
    /// document (e.g. a commission record) be keyed on the document it
    /// belongs to.
    pub fn derived(from: DocumentId, label: &str) -> Self {
        let namespace = Uuid::new_v5(&Uuid::NAMESPACE_OID, label.as_bytes());
        Self(Uuid::new_v5(&namespace, from.0.as_bytes()))
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }

    /// Parses a document ID from its string form.
    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self)
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for DocumentId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<DocumentId> for Uuid {
    fn from(id: DocumentId) -> Self {
        id.0
    }
}

/// Identifier of a tenant (an isolated merchant store).
///
/// Tenant ids are opaque strings supplied by the tenant resolver.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    /// Creates a tenant ID, returning `None` for blank input.
    pub fn new(id: impl Into<String>) -> Option<Self> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    /// Returns the tenant ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TenantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for TenantId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_id_new_creates_unique_ids() {
        let id1 = DocumentId::new();
        let id2 = DocumentId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn document_id_from_uuid_preserves_value() {
        let uuid = Uuid::new_v4();
        let id = DocumentId::from_uuid(uuid);
        assert_eq!(id.as_uuid(), uuid);
    }

    #[test]
    fn derived_ids_are_stable_per_label() {
        let order = DocumentId::new();
        assert_eq!(
            DocumentId::derived(order, "commission"),
            DocumentId::derived(order, "commission")
        );
        assert_ne!(
            DocumentId::derived(order, "commission"),
            DocumentId::derived(order, "notification")
        );
        assert_ne!(DocumentId::derived(order, "commission"), order);
    }

    #[test]
    fn document_id_parse() {
        let id = DocumentId::new();
        assert_eq!(DocumentId::parse(&id.to_string()), Some(id));
        assert_eq!(DocumentId::parse("not-a-uuid"), None);
    }

    #[test]
    fn tenant_id_rejects_blank() {
        assert!(TenantId::new("").is_none());
        assert!(TenantId::new("   ").is_none());
        assert_eq!(TenantId::new(" shop-1 ").unwrap().as_str(), "shop-1");
    }

    #[test]
    fn tenant_id_serializes_as_string() {
        let id = TenantId::new("shop-1").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"shop-1\"");
    }
}
