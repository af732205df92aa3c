use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;

use crate::model::Id;

/// Reserved key holding the envelope in the serialized form of a mapping.
pub const ENVELOPE_KEY: &str = "?";

/// Metadata block attached to every domain object in a document.
///
/// Serialized as the `?` entry of the owning mapping. Keys other than `id`,
/// `type` and `status` are kept in `extra` and written back untouched.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Id>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    /// Overlay only. Never part of the stored document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Envelope {
    pub fn new(id: Id, type_name: impl Into<String>) -> Self {
        Self {
            id: Some(id),
            type_name: Some(type_name.into()),
            status: None,
            extra: Map::new(),
        }
    }

    /// Identity, if present and non-empty.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.is_empty())
    }

    /// Type tag, if present and non-empty.
    pub fn type_name(&self) -> Option<&str> {
        self.type_name.as_deref().filter(|t| !t.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
}

/// A keyed node. The envelope lives beside the fields, never inside them.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Mapping {
    pub fields: BTreeMap<String, Node>,
    pub envelope: Option<Envelope>,
}

impl Mapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Node> {
        self.fields.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Node> {
        self.fields.get_mut(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, node: Node) -> Option<Node> {
        self.fields.insert(key.into(), node)
    }

    pub fn remove(&mut self, key: &str) -> Option<Node> {
        self.fields.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn object_id(&self) -> Option<&str> {
        self.envelope.as_ref().and_then(Envelope::id)
    }
}

/// One node of an Object Model document.
///
/// Crosses the JSON boundary through `serde_json::Value`, where a mapping's
/// envelope is folded back into the `?` key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum Node {
    Scalar(Scalar),
    Mapping(Mapping),
    Sequence(Vec<Node>),
}

impl Default for Node {
    fn default() -> Self {
        Node::Mapping(Mapping::new())
    }
}

impl Node {
    pub fn null() -> Self {
        Node::Scalar(Scalar::Null)
    }

    pub fn string(value: impl Into<String>) -> Self {
        Node::Scalar(Scalar::String(value.into()))
    }

    pub fn as_mapping(&self) -> Option<&Mapping> {
        match self {
            Node::Mapping(mapping) => Some(mapping),
            _ => None,
        }
    }

    pub fn as_mapping_mut(&mut self) -> Option<&mut Mapping> {
        match self {
            Node::Mapping(mapping) => Some(mapping),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&Vec<Node>> {
        match self {
            Node::Sequence(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_sequence_mut(&mut self) -> Option<&mut Vec<Node>> {
        match self {
            Node::Sequence(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Node::Scalar(Scalar::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn envelope(&self) -> Option<&Envelope> {
        self.as_mapping().and_then(|m| m.envelope.as_ref())
    }

    /// Envelope identity of a mapping node.
    pub fn object_id(&self) -> Option<&str> {
        self.as_mapping().and_then(Mapping::object_id)
    }

    pub fn get(&self, key: &str) -> Option<&Node> {
        self.as_mapping().and_then(|m| m.get(key))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Node::Scalar(_) => "scalar",
            Node::Mapping(_) => "mapping",
            Node::Sequence(_) => "sequence",
        }
    }

    pub fn to_value(&self) -> Value {
        Value::from(self.clone())
    }
}

impl From<Value> for Node {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Node::Scalar(Scalar::Null),
            Value::Bool(b) => Node::Scalar(Scalar::Bool(b)),
            Value::Number(n) => Node::Scalar(Scalar::Number(n)),
            Value::String(s) => Node::Scalar(Scalar::String(s)),
            Value::Array(items) => Node::Sequence(items.into_iter().map(Node::from).collect()),
            Value::Object(object) => Node::Mapping(Mapping::from(object)),
        }
    }
}

impl From<Map<String, Value>> for Mapping {
    fn from(object: Map<String, Value>) -> Self {
        let mut mapping = Mapping::new();
        for (key, value) in object {
            // A malformed envelope stays an ordinary field so nothing is lost.
            if key == ENVELOPE_KEY && value.is_object() {
                if let Ok(envelope) = serde_json::from_value::<Envelope>(value.clone()) {
                    mapping.envelope = Some(envelope);
                    continue;
                }
            }
            mapping.fields.insert(key, Node::from(value));
        }
        mapping
    }
}

impl From<Node> for Value {
    fn from(node: Node) -> Self {
        match node {
            Node::Scalar(Scalar::Null) => Value::Null,
            Node::Scalar(Scalar::Bool(b)) => Value::Bool(b),
            Node::Scalar(Scalar::Number(n)) => Value::Number(n),
            Node::Scalar(Scalar::String(s)) => Value::String(s),
            Node::Sequence(items) => Value::Array(items.into_iter().map(Value::from).collect()),
            Node::Mapping(mapping) => Value::Object(mapping.into()),
        }
    }
}

impl From<Mapping> for Map<String, Value> {
    fn from(mapping: Mapping) -> Self {
        let mut object: Map<String, Value> = mapping
            .fields
            .into_iter()
            .map(|(key, node)| (key, Value::from(node)))
            .collect();
        if let Some(envelope) = mapping.envelope {
            let value = serde_json::to_value(envelope).unwrap_or(Value::Object(Map::new()));
            object.insert(ENVELOPE_KEY.to_string(), value);
        }
        object
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_is_lifted_out_of_fields() {
        let node = Node::from(json!({
            "name": "tomcat",
            "?": {
                "type": "io.murano.apps.apache.Tomcat",
                "id": "tomcat_id",
                "_26411a1861294160833743e45d0eaad9": {"name": "tomcat"}
            }
        }));

        let mapping = node.as_mapping().unwrap();
        assert!(!mapping.contains_key("?"));
        assert_eq!(mapping.object_id(), Some("tomcat_id"));

        let envelope = mapping.envelope.as_ref().unwrap();
        assert_eq!(envelope.type_name(), Some("io.murano.apps.apache.Tomcat"));
        assert_eq!(
            envelope.extra.get("_26411a1861294160833743e45d0eaad9"),
            Some(&json!({"name": "tomcat"}))
        );
    }

    #[test]
    fn test_serialized_form_keeps_question_mark_key() {
        let original = json!({
            "services": [{
                "instance": {
                    "flavor": "m1.medium",
                    "?": {"type": "io.murano.resources.LinuxMuranoInstance", "id": "ef98"}
                },
                "port": "8080",
                "?": {"type": "io.murano.apps.apache.Tomcat", "id": "tomcat_id"}
            }],
            "name": "template_name",
            "?": {"type": "io.murano.Template", "id": "temp_object_id"}
        });

        let node: Node = serde_json::from_value(original.clone()).unwrap();
        assert_eq!(serde_json::to_value(&node).unwrap(), original);
    }

    #[test]
    fn test_malformed_envelope_is_kept_as_field() {
        let original = json!({"?": {"id": 42}, "name": "x"});
        let node = Node::from(original.clone());

        let mapping = node.as_mapping().unwrap();
        assert!(mapping.envelope.is_none());
        assert!(mapping.contains_key("?"));
        assert_eq!(node.to_value(), original);

        let scalar_marker = json!({"?": "not an envelope"});
        assert_eq!(Node::from(scalar_marker.clone()).to_value(), scalar_marker);
    }

    #[test]
    fn test_empty_id_is_not_an_identity() {
        let node = Node::from(json!({"?": {"id": "", "type": "t"}}));
        assert_eq!(node.object_id(), None);
    }
}
