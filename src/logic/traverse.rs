use log::debug;

use crate::error::{DocumentError, DocumentResult};
use crate::logic::object_model::{merge_mapping, prepare_batch, prepare_replacement};
use crate::logic::path::{locate, AccessKey, Locator, ObjectPath, Unresolved};
use crate::model::{Node, COLLECTIONS};

/// Path-addressed reads and writes over an in-memory document.
///
/// The engine takes no locks and keeps no state; the caller owns the
/// document for the duration of a call. Every mutating operation resolves
/// and validates first, so a failed call leaves the document as it was.
pub struct TraversalEngine;

impl TraversalEngine {
    /// Node addressed by `path`.
    pub fn get<'a>(doc: &'a Node, path: &str) -> DocumentResult<&'a Node> {
        let path = ObjectPath::parse(path);
        let locator = Self::locate_existing(doc, &path)?;
        locator
            .node(doc)
            .ok_or_else(|| DocumentError::not_found(path.to_string()))
    }

    /// Appends one value to the collection at `path` and returns it with its
    /// identity filled in.
    pub fn insert(doc: &mut Node, path: &str, value: Node) -> DocumentResult<Node> {
        let mut inserted = Self::extend(doc, path, vec![value])?;
        inserted
            .pop()
            .ok_or_else(|| DocumentError::invalid_model("insert produced no element"))
    }

    /// Appends every value, in order, to the collection at `path`. A missing
    /// final key under an existing mapping becomes a new collection.
    pub fn extend(doc: &mut Node, path: &str, values: Vec<Node>) -> DocumentResult<Vec<Node>> {
        let path = ObjectPath::parse(path);
        if values.is_empty() {
            // Still report a bad address, but never create anything.
            return match locate(doc, &path) {
                Ok(_) => Ok(Vec::new()),
                Err(unresolved) if unresolved.is_missing_leaf(&path) => Ok(Vec::new()),
                Err(unresolved) => Err(Self::unresolved_error(&path, unresolved)),
            };
        }

        let target = Self::collection_target(doc, &path)?;
        let prepared = {
            let existing: &[Node] = match &target {
                CollectionTarget::Existing(locator) => locator
                    .node(doc)
                    .and_then(Node::as_sequence)
                    .map(Vec::as_slice)
                    .unwrap_or(&[]),
                CollectionTarget::Create { .. } => &[],
            };
            prepare_batch(values, existing)?
        };

        let collection = match target {
            CollectionTarget::Existing(locator) => locator.node_mut(doc),
            CollectionTarget::Create { parent, key } => parent
                .node_mut(doc)
                .and_then(Node::as_mapping_mut)
                .map(|mapping| {
                    debug!("creating collection '{}' at {}", key, path);
                    mapping
                        .fields
                        .entry(key)
                        .or_insert_with(|| Node::Sequence(Vec::new()))
                }),
        }
        .and_then(Node::as_sequence_mut)
        .ok_or_else(|| DocumentError::invalid_model(format!("{} is not a collection", path)))?;

        collection.extend(prepared.iter().cloned());
        Ok(prepared)
    }

    /// Merges `value` into the existing node at `path`.
    ///
    /// Mappings are merged key by key and keep their envelope identity.
    /// Collections can only be replaced by collections whose elements pass
    /// the same checks as an insert. Any other node is replaced outright.
    /// Nothing is created.
    pub fn update(doc: &mut Node, path: &str, value: Node) -> DocumentResult<Node> {
        let path = ObjectPath::parse(path);
        let locator = Self::locate_existing(doc, &path)?;
        let collections: &[&str] = if locator.is_root() { COLLECTIONS } else { &[] };
        let target = locator
            .node_mut(doc)
            .ok_or_else(|| DocumentError::not_found(path.to_string()))?;

        match (target, value) {
            (Node::Mapping(existing), Node::Mapping(patch)) => {
                merge_mapping(existing, patch, collections)?;
                Ok(Node::Mapping(existing.clone()))
            }
            (Node::Mapping(_), other) => Err(DocumentError::invalid_entity(format!(
                "cannot replace object at {} with a {}",
                path,
                other.kind()
            ))),
            (target, value) => {
                let collection = path.segments().len() == 1
                    && path.collection().is_some_and(|c| COLLECTIONS.contains(&c));
                *target = prepare_replacement(Some(&*target), value, collection)?;
                Ok(target.clone())
            }
        }
    }

    /// Detaches the node at `path` from its container and returns it.
    pub fn remove(doc: &mut Node, path: &str) -> DocumentResult<Node> {
        let path = ObjectPath::parse(path);
        let locator = Self::locate_existing(doc, &path)?;
        let (parent, key) = locator
            .split_last()
            .ok_or_else(|| DocumentError::invalid_model("the document root cannot be removed"))?;
        let key = key.clone();

        let removed = match (parent.node_mut(doc), key) {
            (Some(Node::Mapping(mapping)), AccessKey::Field(key)) => mapping.remove(&key),
            (Some(Node::Sequence(items)), AccessKey::Element(index)) if index < items.len() => {
                Some(items.remove(index))
            }
            _ => None,
        };

        removed.ok_or_else(|| DocumentError::not_found(path.to_string()))
    }

    fn locate_existing(doc: &Node, path: &ObjectPath) -> DocumentResult<Locator> {
        locate(doc, path).map_err(|unresolved| Self::unresolved_error(path, unresolved))
    }

    /// A known top-level collection that was never created is a model error;
    /// everything else is simply not found.
    fn unresolved_error(path: &ObjectPath, unresolved: Unresolved) -> DocumentError {
        if unresolved.depth == 0 && COLLECTIONS.contains(&unresolved.segment.as_str()) {
            DocumentError::invalid_model(format!(
                "document has no '{}' collection",
                unresolved.segment
            ))
        } else {
            DocumentError::not_found(format!("{}: {}", path, unresolved))
        }
    }

    fn collection_target(doc: &Node, path: &ObjectPath) -> DocumentResult<CollectionTarget> {
        match locate(doc, path) {
            Ok(locator) => match locator.node(doc) {
                Some(Node::Sequence(_)) => Ok(CollectionTarget::Existing(locator)),
                Some(other) => Err(DocumentError::invalid_model(format!(
                    "{} is a {}, not a collection",
                    path,
                    other.kind()
                ))),
                None => Err(DocumentError::not_found(path.to_string())),
            },
            Err(unresolved) if unresolved.is_missing_leaf(path) => {
                let (parent_path, key) = path
                    .split_last()
                    .ok_or_else(|| DocumentError::not_found(path.to_string()))?;
                let parent = Self::locate_existing(doc, &parent_path)?;
                match parent.node(doc) {
                    Some(Node::Mapping(_)) => Ok(CollectionTarget::Create {
                        parent,
                        key: key.to_string(),
                    }),
                    // A missing identity inside a sequence cannot be created.
                    _ => Err(DocumentError::not_found(format!("{}: {}", path, unresolved))),
                }
            }
            Err(unresolved) => Err(Self::unresolved_error(path, unresolved)),
        }
    }
}

enum CollectionTarget {
    Existing(Locator),
    Create { parent: Locator, key: String },
}
