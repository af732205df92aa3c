use crate::model::{Entity, EntityKind, EntityStatus, Id, Node};
use anyhow::Result;

/// Raised by a store when a tenant already owns an entity of the same kind
/// and name. Travels inside `anyhow::Error`; find it with `downcast_ref`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} with name '{name}' already exists")]
pub struct DuplicateEntry {
    pub kind: EntityKind,
    pub name: String,
}

/// Persistence of entities and their whole documents.
///
/// Documents are always loaded and saved whole; concurrent writers to the
/// same entity resolve as last writer wins.
#[async_trait::async_trait]
pub trait EntityStore: Send + Sync {
    async fn create_entity(&self, entity: Entity) -> Result<()>;
    async fn get_entity(&self, kind: EntityKind, id: &Id) -> Result<Option<Entity>>;
    async fn list_entities(&self, kind: EntityKind, tenant_id: &str) -> Result<Vec<Entity>>;
    /// Writes name, version, networking and status of an existing entity.
    async fn update_entity(&self, entity: &Entity) -> Result<()>;
    /// Replaces the stored document; `None` clears it.
    async fn save_description(&self, kind: EntityKind, id: &Id, description: Option<&Node>) -> Result<()>;
    async fn set_status(&self, kind: EntityKind, id: &Id, status: EntityStatus) -> Result<()>;
    async fn delete_entity(&self, kind: EntityKind, id: &Id) -> Result<bool>;

    /// The document of an entity; `None` when either is absent.
    async fn load_description(&self, kind: EntityKind, id: &Id) -> Result<Option<Node>> {
        Ok(self.get_entity(kind, id).await?.and_then(|entity| entity.description))
    }
}
