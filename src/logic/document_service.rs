use chrono::Utc;
use log::{debug, error, info};
use serde_json::Value;

use crate::error::{DocumentError, DocumentResult};
use crate::logic::object_model::new_root;
use crate::logic::path::ObjectPath;
use crate::logic::status::{apply_status, SameAsOwner, StatusLookup};
use crate::logic::traverse::TraversalEngine;
use crate::model::{
    generate_id, is_valid_entity_name, Entity, EntityKind, EntityStatus, Envelope, Id, Mapping, Node, COLLECTIONS,
};
use crate::store::traits::EntityStore;

/// Binds an entity to its document: load, resolve, mutate, persist.
///
/// Every call loads a fresh copy of the document from the store it is handed
/// and drops it on return. A failed path operation returns before anything
/// is written back.
pub struct DocumentService;

/// Root envelope key holding the time of the last `put_data`.
pub const UPDATED_KEY: &str = "updated";

impl DocumentService {
    /// Creates an entity whose document starts as `params`.
    ///
    /// `params` must be an object with a valid `name`. Services passed along
    /// are validated and identified like any other insert.
    pub async fn create<S: EntityStore + ?Sized>(
        store: &S,
        kind: EntityKind,
        params: Node,
        tenant_id: &str,
    ) -> DocumentResult<Entity> {
        let mut fields = match params {
            Node::Mapping(mapping) => mapping,
            other => {
                return Err(DocumentError::invalid_entity(format!(
                    "{} body must be an object, got a {}",
                    kind,
                    other.kind()
                )))
            }
        };

        let name = fields
            .get("name")
            .and_then(Node::as_str)
            .map(str::to_string)
            .ok_or_else(|| DocumentError::invalid_entity(format!("{} name is required", kind)))?;
        Self::check_name(kind, &name)?;

        let services = fields.remove("services");
        fields.insert("tenant_id", Node::string(tenant_id));

        let id = generate_id();
        let mut document = new_root(fields, id.clone(), kind.type_tag());
        match services {
            None => {}
            Some(Node::Sequence(items)) if items.is_empty() => {
                if let Some(root) = document.as_mapping_mut() {
                    root.insert("services", Node::Sequence(Vec::new()));
                }
            }
            Some(Node::Sequence(items)) => {
                TraversalEngine::extend(&mut document, "/services", items)?;
            }
            Some(other) => {
                return Err(DocumentError::invalid_entity(format!(
                    "services must be a list, got a {}",
                    other.kind()
                )))
            }
        }

        let entity = Entity::new(kind, id, name, tenant_id.to_string(), document);
        store.create_entity(entity.clone()).await?;

        info!("Created {} '{}' ({}) for tenant {}", kind, entity.name, entity.id, tenant_id);
        Ok(entity)
    }

    pub async fn list<S: EntityStore + ?Sized>(
        store: &S,
        kind: EntityKind,
        tenant_id: &str,
    ) -> DocumentResult<Vec<Entity>> {
        Ok(store.list_entities(kind, tenant_id).await?)
    }

    pub async fn show<S: EntityStore + ?Sized>(store: &S, kind: EntityKind, id: &Id) -> DocumentResult<Entity> {
        store
            .get_entity(kind, id)
            .await?
            .ok_or_else(|| DocumentError::not_found(format!("{} '{}'", kind, id)))
    }

    /// Renames the entity and the `name` field of its document.
    pub async fn rename<S: EntityStore + ?Sized>(
        store: &S,
        kind: EntityKind,
        id: &Id,
        name: &str,
    ) -> DocumentResult<Entity> {
        Self::check_name(kind, name)?;
        let (mut entity, mut document) = Self::load(store, kind, id).await?;

        let mut patch = Mapping::new();
        patch.insert("name", Node::string(name));
        TraversalEngine::update(&mut document, "/", Node::Mapping(patch))?;

        let previous = entity.clone();
        entity.name = name.to_string();
        entity.version += 1;
        entity.touch();
        store.update_entity(&entity).await?;

        // A failed document write puts the row back.
        if let Err(err) = store.save_description(kind, id, Some(&document)).await {
            error!(
                "Failed to save document of {} {} after rename, restoring name '{}'",
                kind, id, previous.name
            );
            if let Err(restore) = store.update_entity(&previous).await {
                error!("{} {} row and document names now differ: {:#}", kind, id, restore);
            }
            return Err(err.into());
        }

        entity.description = Some(document);
        Ok(entity)
    }

    pub async fn set_status<S: EntityStore + ?Sized>(
        store: &S,
        kind: EntityKind,
        id: &Id,
        status: EntityStatus,
    ) -> DocumentResult<()> {
        Self::show(store, kind, id).await?;
        store.set_status(kind, id, status).await?;
        Ok(())
    }

    /// Sub-value at `path`, with every service reporting its owner's status.
    pub async fn get_data<S: EntityStore + ?Sized>(
        store: &S,
        kind: EntityKind,
        id: &Id,
        path: &str,
    ) -> DocumentResult<Node> {
        let (entity, document) = Self::load(store, kind, id).await?;
        let lookup = SameAsOwner(entity.status);
        Self::serve(&entity, document, path, &lookup)
    }

    /// Same as [`DocumentService::get_data`] with a caller supplied status source.
    pub async fn get_data_with<S, L>(
        store: &S,
        kind: EntityKind,
        id: &Id,
        path: &str,
        lookup: &L,
    ) -> DocumentResult<Node>
    where
        S: EntityStore + ?Sized,
        L: StatusLookup + ?Sized,
    {
        let (entity, document) = Self::load(store, kind, id).await?;
        Self::serve(&entity, document, path, lookup)
    }

    /// Inserts `data` at `path`; a list is appended element by element.
    pub async fn post_data<S: EntityStore + ?Sized>(
        store: &S,
        kind: EntityKind,
        id: &Id,
        path: &str,
        data: Node,
    ) -> DocumentResult<Node> {
        debug!("{} {}: post {}", kind, id, path);
        let (_, mut document) = Self::load(store, kind, id).await?;

        let result = match data {
            Node::Sequence(items) => Node::Sequence(TraversalEngine::extend(&mut document, path, items)?),
            value => TraversalEngine::insert(&mut document, path, value)?,
        };

        store.save_description(kind, id, Some(&document)).await?;
        Ok(result)
    }

    pub async fn put_data<S: EntityStore + ?Sized>(
        store: &S,
        kind: EntityKind,
        id: &Id,
        path: &str,
        data: Node,
    ) -> DocumentResult<Node> {
        debug!("{} {}: put {}", kind, id, path);
        let (_, mut document) = Self::load(store, kind, id).await?;

        let result = TraversalEngine::update(&mut document, path, data)?;
        Self::stamp_updated(&mut document);

        store.save_description(kind, id, Some(&document)).await?;
        Ok(result)
    }

    pub async fn delete_data<S: EntityStore + ?Sized>(
        store: &S,
        kind: EntityKind,
        id: &Id,
        path: &str,
    ) -> DocumentResult<()> {
        debug!("{} {}: delete {}", kind, id, path);
        let (_, mut document) = Self::load(store, kind, id).await?;

        TraversalEngine::remove(&mut document, path)?;

        store.save_description(kind, id, Some(&document)).await?;
        Ok(())
    }

    /// Clears the stored document, then removes the entity itself. Readers
    /// in between see an empty entity rather than a half-cleared one.
    pub async fn delete<S: EntityStore + ?Sized>(store: &S, kind: EntityKind, id: &Id) -> DocumentResult<()> {
        Self::show(store, kind, id).await?;

        store.save_description(kind, id, None).await?;
        store.delete_entity(kind, id).await?;

        info!("Deleted {} {}", kind, id);
        Ok(())
    }

    async fn load<S: EntityStore + ?Sized>(
        store: &S,
        kind: EntityKind,
        id: &Id,
    ) -> DocumentResult<(Entity, Node)> {
        let mut entity = Self::show(store, kind, id).await?;
        let document = entity
            .description
            .take()
            .ok_or_else(|| DocumentError::not_found(format!("{} '{}' has no document", kind, id)))?;
        Ok((entity, document))
    }

    fn serve<L: StatusLookup + ?Sized>(
        entity: &Entity,
        mut document: Node,
        path: &str,
        lookup: &L,
    ) -> DocumentResult<Node> {
        if entity.kind == EntityKind::Environment {
            apply_status(&mut document, &entity.id, lookup);
        }

        match TraversalEngine::get(&document, path) {
            Ok(node) => Ok(node.clone()),
            // An untouched collection reads as empty.
            Err(DocumentError::InvalidModel(_)) if Self::is_collection_path(path) => {
                Ok(Node::Sequence(Vec::new()))
            }
            Err(e) => Err(e),
        }
    }

    /// Records the time of the last update in the root envelope.
    fn stamp_updated(document: &mut Node) {
        if let Some(root) = document.as_mapping_mut() {
            let stamp = Utc::now().format("%Y-%m-%d %H:%M:%S%.6f").to_string();
            root.envelope
                .get_or_insert_with(Envelope::default)
                .extra
                .insert(UPDATED_KEY.to_string(), Value::String(stamp));
        }
    }

    fn is_collection_path(path: &str) -> bool {
        let path = ObjectPath::parse(path);
        path.segments().len() == 1 && path.collection().is_some_and(|c| COLLECTIONS.contains(&c))
    }

    fn check_name(kind: EntityKind, name: &str) -> DocumentResult<()> {
        if is_valid_entity_name(name) {
            Ok(())
        } else {
            Err(DocumentError::invalid_entity(format!(
                "{} name must contain only alphanumeric or \"_-\" characters and must start with a letter",
                kind
            )))
        }
    }
}
