use crate::model::{Id, Node, ENVIRONMENT_TYPE, TEMPLATE_TYPE};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

static VALID_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z]+[\w-]*$").expect("entity name pattern is valid"));

/// Names must start with a letter and continue with word characters or `-`.
pub fn is_valid_entity_name(name: &str) -> bool {
    VALID_NAME.is_match(name)
}

/// The two kinds of entity that own an Object Model document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Template,
    Environment,
}

impl EntityKind {
    /// Envelope type tag of the root document.
    pub fn type_tag(self) -> &'static str {
        match self {
            EntityKind::Template => TEMPLATE_TYPE,
            EntityKind::Environment => ENVIRONMENT_TYPE,
        }
    }

    pub fn table(self) -> &'static str {
        match self {
            EntityKind::Template => "templates",
            EntityKind::Environment => "environments",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Template => "template",
            EntityKind::Environment => "environment",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of an environment. Services inherit it through the
/// status overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EntityStatus {
    #[default]
    #[serde(rename = "ready")]
    Ready,
    #[serde(rename = "pending")]
    Pending,
    #[serde(rename = "deploying")]
    Deploying,
    #[serde(rename = "deploy failure")]
    DeployFailure,
    #[serde(rename = "deleting")]
    Deleting,
    #[serde(rename = "delete failure")]
    DeleteFailure,
}

impl EntityStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityStatus::Ready => "ready",
            EntityStatus::Pending => "pending",
            EntityStatus::Deploying => "deploying",
            EntityStatus::DeployFailure => "deploy failure",
            EntityStatus::Deleting => "deleting",
            EntityStatus::DeleteFailure => "delete failure",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "ready" => Some(EntityStatus::Ready),
            "pending" => Some(EntityStatus::Pending),
            "deploying" => Some(EntityStatus::Deploying),
            "deploy failure" => Some(EntityStatus::DeployFailure),
            "deleting" => Some(EntityStatus::Deleting),
            "delete failure" => Some(EntityStatus::DeleteFailure),
            _ => None,
        }
    }
}

/// A template or environment row: identity, ownership and the serialized
/// document it owns.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub id: Id,
    pub kind: EntityKind,
    pub name: String,
    pub tenant_id: String,
    pub version: i64,
    pub networking: serde_json::Value,
    pub status: EntityStatus,
    /// `None` once the entity has been logically deleted.
    pub description: Option<Node>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

impl Entity {
    pub fn new(kind: EntityKind, id: Id, name: String, tenant_id: String, description: Node) -> Self {
        let now = Utc::now();
        Self {
            id,
            kind,
            name,
            tenant_id,
            version: 0,
            networking: serde_json::Value::Object(serde_json::Map::new()),
            status: EntityStatus::Ready,
            description: Some(description),
            created: now,
            updated: now,
        }
    }

    pub fn touch(&mut self) {
        self.updated = Utc::now();
    }

    pub fn summary(&self) -> EntitySummary {
        EntitySummary {
            id: self.id.clone(),
            name: self.name.clone(),
            tenant_id: self.tenant_id.clone(),
            version: self.version,
            networking: self.networking.clone(),
            status: match self.kind {
                EntityKind::Environment => Some(self.status),
                EntityKind::Template => None,
            },
            created: self.created.format("%Y-%m-%dT%H:%M:%S%.6f").to_string(),
            updated: self.updated.format("%Y-%m-%dT%H:%M:%S%.6f").to_string(),
        }
    }
}

/// Row-level view of an entity as served to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySummary {
    pub id: Id,
    pub name: String,
    pub tenant_id: String,
    pub version: i64,
    pub networking: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<EntityStatus>,
    pub created: String,
    pub updated: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_name_rules() {
        assert!(is_valid_entity_name("mytemp"));
        assert!(is_valid_entity_name("my_temp-2"));
        assert!(!is_valid_entity_name("2temp"));
        assert!(!is_valid_entity_name("_temp"));
        assert!(!is_valid_entity_name("my temp"));
        assert!(!is_valid_entity_name(""));
    }

    #[test]
    fn test_status_wire_names() {
        let json = serde_json::to_string(&EntityStatus::DeployFailure).unwrap();
        assert_eq!(json, "\"deploy failure\"");
        assert_eq!(EntityStatus::parse("deploying"), Some(EntityStatus::Deploying));
        assert_eq!(EntityStatus::parse("bogus"), None);
    }

    #[test]
    fn test_template_summary_has_no_status() {
        let entity = Entity::new(
            EntityKind::Template,
            "t1".to_string(),
            "mytemp".to_string(),
            "tenant".to_string(),
            Node::default(),
        );
        let summary = serde_json::to_value(entity.summary()).unwrap();
        assert!(summary.get("status").is_none());
        assert_eq!(summary["version"], 0);
        assert_eq!(summary["networking"], serde_json::json!({}));
    }
}
