use std::collections::HashSet;

use crate::error::{DocumentError, DocumentResult};
use crate::model::{generate_id, Envelope, Mapping, Node};

/// Identities already taken inside one sequence.
pub fn sibling_ids(items: &[Node]) -> HashSet<String> {
    items
        .iter()
        .filter_map(Node::object_id)
        .map(str::to_string)
        .collect()
}

/// Brings a value up to the object model before it joins a sequence.
///
/// The value must be a mapping with an envelope carrying a non-empty `type`.
/// A missing or empty `id` is generated, an explicit one must not collide
/// with `taken`. Any served `status` is dropped. On success the new id is
/// added to `taken`.
pub fn prepare_for_insert(value: Node, taken: &mut HashSet<String>) -> DocumentResult<Node> {
    let mut mapping = match value {
        Node::Mapping(mapping) => mapping,
        other => {
            return Err(DocumentError::invalid_entity(format!(
                "expected an object, got a {}",
                other.kind()
            )))
        }
    };

    let envelope = mapping
        .envelope
        .as_mut()
        .ok_or_else(|| DocumentError::invalid_entity("object has no '?' envelope"))?;

    if envelope.type_name().is_none() {
        return Err(DocumentError::invalid_entity("envelope has no 'type'"));
    }

    let id = match envelope.id() {
        Some(id) => id.to_string(),
        None => {
            let id = generate_id();
            envelope.id = Some(id.clone());
            id
        }
    };

    if !taken.insert(id.clone()) {
        return Err(DocumentError::invalid_entity(format!(
            "an object with id '{}' already exists in this collection",
            id
        )));
    }

    envelope.status = None;
    Ok(Node::Mapping(mapping))
}

/// Validates and identifies a whole batch against `existing` siblings.
/// Nothing is returned unless every value passes.
pub fn prepare_batch(values: Vec<Node>, existing: &[Node]) -> DocumentResult<Vec<Node>> {
    let mut taken = sibling_ids(existing);
    values
        .into_iter()
        .map(|value| prepare_for_insert(value, &mut taken))
        .collect()
}

/// Checks a value about to take the place of `existing` (absent for a new
/// key) and returns it in stored form.
///
/// A sequence stays a sequence. Sequences holding objects, and the known
/// collections named by `collection`, are validated like a fresh batch so
/// every element gets a unique identity. Lists of plain scalars are data.
pub fn prepare_replacement(existing: Option<&Node>, value: Node, collection: bool) -> DocumentResult<Node> {
    let existing_items = existing.and_then(Node::as_sequence);

    match value {
        Node::Sequence(items) => {
            let holds_objects = collection
                || existing_items.is_some_and(|old| old.iter().any(|item| item.as_mapping().is_some()))
                || items.iter().any(|item| !matches!(item, Node::Scalar(_)));
            if holds_objects {
                Ok(Node::Sequence(prepare_batch(items, &[])?))
            } else {
                Ok(Node::Sequence(items))
            }
        }
        other if collection || existing_items.is_some() => Err(DocumentError::invalid_entity(format!(
            "a collection cannot be replaced with a {}",
            other.kind()
        ))),
        other => Ok(other),
    }
}

/// Shallow merge of `patch` into `target`. The envelope's write-once keys
/// are never replaced and keys listed in `collections` must stay sequences.
///
/// Every field is checked before `target` changes.
pub fn merge_mapping(target: &mut Mapping, patch: Mapping, collections: &[&str]) -> DocumentResult<()> {
    let fields = patch
        .fields
        .into_iter()
        .map(|(key, value)| {
            let collection = collections.contains(&key.as_str());
            prepare_replacement(target.get(&key), value, collection)
                .map_err(|err| match err {
                    DocumentError::InvalidEntity(reason) => {
                        DocumentError::invalid_entity(format!("field '{}': {}", key, reason))
                    }
                    other => other,
                })
                .map(|value| (key, value))
        })
        .collect::<DocumentResult<Vec<_>>>()?;

    if let Some(patch_envelope) = patch.envelope {
        let envelope = target.envelope.get_or_insert_with(Envelope::default);
        envelope.extra.extend(patch_envelope.extra);
    }
    target.fields.extend(fields);
    Ok(())
}

/// Root document for a freshly created entity.
pub fn new_root(mut fields: Mapping, id: String, type_tag: &str) -> Node {
    fields.envelope = Some(Envelope::new(id, type_tag));
    Node::Mapping(fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_id_is_generated() {
        let mut taken = HashSet::new();
        let node = prepare_for_insert(
            Node::from(json!({"name": "tomcat", "?": {"type": "io.murano.apps.apache.Tomcat"}})),
            &mut taken,
        )
        .unwrap();

        let id = node.object_id().unwrap().to_string();
        assert!(!id.is_empty());
        assert!(taken.contains(&id));
    }

    #[test]
    fn test_explicit_id_is_kept() {
        let mut taken = HashSet::new();
        let node = prepare_for_insert(
            Node::from(json!({"?": {"type": "t", "id": "tomcat_id"}})),
            &mut taken,
        )
        .unwrap();
        assert_eq!(node.object_id(), Some("tomcat_id"));
    }

    #[test]
    fn test_missing_type_is_rejected() {
        let mut taken = HashSet::new();
        for value in [
            json!({"name": "tomcat"}),
            json!({"name": "tomcat", "?": {"id": "x"}}),
            json!({"name": "tomcat", "?": {"type": ""}}),
            json!("tomcat"),
            json!([{"?": {"type": "t"}}]),
        ] {
            let err = prepare_for_insert(Node::from(value), &mut taken).unwrap_err();
            assert!(matches!(err, DocumentError::InvalidEntity(_)));
        }
        assert!(taken.is_empty());
    }

    #[test]
    fn test_duplicate_id_is_rejected() {
        let existing = vec![Node::from(json!({"?": {"type": "t", "id": "a"}}))];

        let err = prepare_batch(vec![Node::from(json!({"?": {"type": "t", "id": "a"}}))], &existing)
            .unwrap_err();
        assert!(matches!(err, DocumentError::InvalidEntity(_)));

        let err = prepare_batch(
            vec![
                Node::from(json!({"?": {"type": "t", "id": "b"}})),
                Node::from(json!({"?": {"type": "t", "id": "b"}})),
            ],
            &existing,
        )
        .unwrap_err();
        assert!(matches!(err, DocumentError::InvalidEntity(_)));
    }

    #[test]
    fn test_served_status_is_stripped() {
        let mut taken = HashSet::new();
        let node = prepare_for_insert(
            Node::from(json!({"?": {"type": "t", "id": "a", "status": "ready"}})),
            &mut taken,
        )
        .unwrap();
        assert_eq!(node.envelope().unwrap().status, None);
    }

    #[test]
    fn test_merge_keeps_identity() {
        let mut target = Mapping::from(
            json!({"name": "orion", "port": "8080", "?": {"type": "t", "id": "a"}})
                .as_object()
                .cloned()
                .unwrap(),
        );
        let patch = Mapping::from(
            json!({"name": "x", "?": {"type": "other", "id": "b", "hint": 1}})
                .as_object()
                .cloned()
                .unwrap(),
        );

        merge_mapping(&mut target, patch, &[]).unwrap();

        assert_eq!(
            Node::Mapping(target).to_value(),
            json!({"name": "x", "port": "8080", "?": {"type": "t", "id": "a", "hint": 1}})
        );
    }

    fn mapping(value: serde_json::Value) -> Mapping {
        Mapping::from(value.as_object().cloned().unwrap())
    }

    #[test]
    fn test_merge_keeps_collections_as_sequences() {
        let original = json!({
            "name": "henar",
            "services": [{"?": {"type": "t", "id": "a"}}],
            "?": {"type": "io.murano.Template", "id": "root"}
        });

        for patch in [
            json!({"services": null}),
            json!({"services": "oops"}),
            json!({"name": "renamed", "services": {"?": {"type": "t"}}}),
        ] {
            let mut target = mapping(original.clone());
            let err = merge_mapping(&mut target, mapping(patch), &["services"]).unwrap_err();
            assert!(matches!(err, DocumentError::InvalidEntity(_)));
            assert_eq!(Node::Mapping(target).to_value(), original);
        }

        // A collection the root never had still has to arrive as one.
        let mut bare = mapping(json!({"name": "henar"}));
        let err = merge_mapping(&mut bare, mapping(json!({"services": 1})), &["services"]).unwrap_err();
        assert!(matches!(err, DocumentError::InvalidEntity(_)));
    }

    #[test]
    fn test_merge_validates_replacement_collections() {
        let mut target = mapping(json!({"resources": [{"?": {"type": "t", "id": "a"}}]}));

        let err = merge_mapping(
            &mut target,
            mapping(json!({"resources": [
                {"?": {"type": "t", "id": "dup"}},
                {"?": {"type": "t", "id": "dup"}}
            ]})),
            &[],
        )
        .unwrap_err();
        assert!(matches!(err, DocumentError::InvalidEntity(_)));

        merge_mapping(
            &mut target,
            mapping(json!({"resources": [{"?": {"type": "t"}}], "ports": [80, 443]})),
            &[],
        )
        .unwrap();
        let resources = target.get("resources").and_then(Node::as_sequence).unwrap();
        assert_eq!(resources.len(), 1);
        assert!(resources[0].object_id().is_some());
        assert_eq!(target.get("ports").unwrap().to_value(), json!([80, 443]));
    }

    #[test]
    fn test_replacement_of_plain_values() {
        let existing = Node::from(json!("8080"));
        let replaced = prepare_replacement(Some(&existing), Node::from(json!("9090")), false).unwrap();
        assert_eq!(replaced.to_value(), json!("9090"));

        let tags = Node::from(json!(["a", "b"]));
        let replaced = prepare_replacement(Some(&tags), Node::from(json!(["c"])), false).unwrap();
        assert_eq!(replaced.to_value(), json!(["c"]));

        let err = prepare_replacement(Some(&tags), Node::null(), false).unwrap_err();
        assert!(matches!(err, DocumentError::InvalidEntity(_)));
    }
}
