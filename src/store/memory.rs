use anyhow::{anyhow, Result};
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::model::{Entity, EntityKind, EntityStatus, Id, Node};
use crate::store::traits::{DuplicateEntry, EntityStore};

/// Process-local store used for development and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entities: Arc<RwLock<HashMap<(EntityKind, Id), Entity>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entities.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.read().is_empty()
    }

    fn with_entity<T>(&self, kind: EntityKind, id: &Id, f: impl FnOnce(&mut Entity) -> T) -> Result<T> {
        let mut entities = self.entities.write();
        let entity = entities
            .get_mut(&(kind, id.clone()))
            .ok_or_else(|| anyhow!("{} '{}' does not exist", kind, id))?;
        Ok(f(entity))
    }
}

#[async_trait::async_trait]
impl EntityStore for MemoryStore {
    async fn create_entity(&self, entity: Entity) -> Result<()> {
        let mut entities = self.entities.write();

        let duplicate = entities.values().any(|existing| {
            existing.kind == entity.kind
                && existing.tenant_id == entity.tenant_id
                && existing.name == entity.name
        });
        if duplicate {
            return Err(DuplicateEntry {
                kind: entity.kind,
                name: entity.name,
            }
            .into());
        }

        let key = (entity.kind, entity.id.clone());
        if entities.contains_key(&key) {
            return Err(anyhow!("{} '{}' already exists", entity.kind, entity.id));
        }
        entities.insert(key, entity);
        Ok(())
    }

    async fn get_entity(&self, kind: EntityKind, id: &Id) -> Result<Option<Entity>> {
        Ok(self.entities.read().get(&(kind, id.clone())).cloned())
    }

    async fn list_entities(&self, kind: EntityKind, tenant_id: &str) -> Result<Vec<Entity>> {
        let mut entities: Vec<Entity> = self
            .entities
            .read()
            .values()
            .filter(|entity| entity.kind == kind && entity.tenant_id == tenant_id)
            .cloned()
            .collect();
        entities.sort_by(|a, b| a.created.cmp(&b.created).then_with(|| a.name.cmp(&b.name)));
        Ok(entities)
    }

    async fn update_entity(&self, entity: &Entity) -> Result<()> {
        let mut entities = self.entities.write();

        let duplicate = entities.values().any(|existing| {
            existing.kind == entity.kind
                && existing.id != entity.id
                && existing.tenant_id == entity.tenant_id
                && existing.name == entity.name
        });
        if duplicate {
            return Err(DuplicateEntry {
                kind: entity.kind,
                name: entity.name.clone(),
            }
            .into());
        }

        let stored = entities
            .get_mut(&(entity.kind, entity.id.clone()))
            .ok_or_else(|| anyhow!("{} '{}' does not exist", entity.kind, entity.id))?;
        stored.name = entity.name.clone();
        stored.version = entity.version;
        stored.networking = entity.networking.clone();
        stored.status = entity.status;
        stored.updated = Utc::now();
        Ok(())
    }

    async fn save_description(&self, kind: EntityKind, id: &Id, description: Option<&Node>) -> Result<()> {
        self.with_entity(kind, id, |entity| {
            entity.description = description.cloned();
            entity.updated = Utc::now();
        })
    }

    async fn set_status(&self, kind: EntityKind, id: &Id, status: EntityStatus) -> Result<()> {
        self.with_entity(kind, id, |entity| {
            entity.status = status;
            entity.updated = Utc::now();
        })
    }

    async fn delete_entity(&self, kind: EntityKind, id: &Id) -> Result<bool> {
        Ok(self.entities.write().remove(&(kind, id.clone())).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(kind: EntityKind, id: &str, name: &str, tenant: &str) -> Entity {
        Entity::new(kind, id.to_string(), name.to_string(), tenant.to_string(), Node::default())
    }

    #[tokio::test]
    async fn test_duplicate_name_per_tenant_and_kind() {
        let store = MemoryStore::new();
        store.create_entity(entity(EntityKind::Template, "a", "mytemp", "t1")).await.unwrap();

        let err = store
            .create_entity(entity(EntityKind::Template, "b", "mytemp", "t1"))
            .await
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<DuplicateEntry>(),
            Some(&DuplicateEntry {
                kind: EntityKind::Template,
                name: "mytemp".to_string()
            })
        );

        // Other tenants and other kinds may reuse the name.
        store.create_entity(entity(EntityKind::Template, "c", "mytemp", "t2")).await.unwrap();
        store.create_entity(entity(EntityKind::Environment, "d", "mytemp", "t1")).await.unwrap();
        assert_eq!(store.len(), 3);
    }

    #[tokio::test]
    async fn test_list_is_scoped_to_tenant_and_kind() {
        let store = MemoryStore::new();
        store.create_entity(entity(EntityKind::Template, "a", "one", "t1")).await.unwrap();
        store.create_entity(entity(EntityKind::Template, "b", "two", "t2")).await.unwrap();
        store.create_entity(entity(EntityKind::Environment, "c", "three", "t1")).await.unwrap();

        let listed = store.list_entities(EntityKind::Template, "t1").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, "a");
    }

    #[tokio::test]
    async fn test_clear_then_delete() {
        let store = MemoryStore::new();
        let id = "a".to_string();
        store.create_entity(entity(EntityKind::Template, &id, "one", "t1")).await.unwrap();

        store.save_description(EntityKind::Template, &id, None).await.unwrap();
        let cleared = store.get_entity(EntityKind::Template, &id).await.unwrap().unwrap();
        assert!(cleared.description.is_none());
        assert!(store.load_description(EntityKind::Template, &id).await.unwrap().is_none());

        assert!(store.delete_entity(EntityKind::Template, &id).await.unwrap());
        assert!(!store.delete_entity(EntityKind::Template, &id).await.unwrap());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_row_updates_on_missing_entity_fail() {
        let store = MemoryStore::new();
        let missing = "nope".to_string();

        let result = store
            .save_description(EntityKind::Template, &missing, Some(&Node::default()))
            .await;
        assert!(result.is_err());

        let result = store
            .set_status(EntityKind::Environment, &missing, EntityStatus::Deploying)
            .await;
        assert!(result.is_err());
    }
}
