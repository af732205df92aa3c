use std::fmt;
use std::str::FromStr;

use crate::model::Node;

/// A slash-delimited address inside a document.
///
/// Empty segments are dropped, so `""`, `"/"` and `"//"` all address the root.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ObjectPath {
    segments: Vec<String>,
}

impl ObjectPath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn parse(raw: &str) -> Self {
        Self {
            segments: raw
                .split('/')
                .filter(|segment| !segment.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// First segment, conventionally a collection name.
    pub fn collection(&self) -> Option<&str> {
        self.segments.first().map(String::as_str)
    }

    /// Splits off the final segment, returning the parent path and that segment.
    pub fn split_last(&self) -> Option<(ObjectPath, &str)> {
        let (last, parent) = self.segments.split_last()?;
        Some((
            ObjectPath {
                segments: parent.to_vec(),
            },
            last.as_str(),
        ))
    }
}

impl FromStr for ObjectPath {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl fmt::Display for ObjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return f.write_str("/");
        }
        for segment in &self.segments {
            write!(f, "/{}", segment)?;
        }
        Ok(())
    }
}

/// One concrete step from a container to a child.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessKey {
    /// Key inside a mapping.
    Field(String),
    /// Position inside a sequence, found through the element's identity.
    Element(usize),
}

/// Why a path failed to resolve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnresolvedReason {
    /// The container exists but has no such key or identity.
    Missing,
    /// The path descends into a scalar.
    NotAContainer,
}

/// Resolution failure, pointing at the segment that did not resolve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unresolved {
    pub depth: usize,
    pub segment: String,
    pub reason: UnresolvedReason,
}

impl Unresolved {
    /// True when only the last segment is missing from an existing container.
    pub fn is_missing_leaf(&self, path: &ObjectPath) -> bool {
        self.reason == UnresolvedReason::Missing && self.depth + 1 == path.segments().len()
    }
}

impl fmt::Display for Unresolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.reason {
            UnresolvedReason::Missing => write!(f, "'{}' not found", self.segment),
            UnresolvedReason::NotAContainer => {
                write!(f, "'{}' addresses inside a scalar value", self.segment)
            }
        }
    }
}

/// The concrete steps a path resolves to in a given document.
///
/// Computed against a shared borrow, then replayed against a mutable one.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Locator {
    steps: Vec<AccessKey>,
}

impl Locator {
    pub fn steps(&self) -> &[AccessKey] {
        &self.steps
    }

    pub fn is_root(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn split_last(&self) -> Option<(Locator, &AccessKey)> {
        let (last, parent) = self.steps.split_last()?;
        Some((
            Locator {
                steps: parent.to_vec(),
            },
            last,
        ))
    }

    pub fn node<'a>(&self, root: &'a Node) -> Option<&'a Node> {
        self.steps.iter().try_fold(root, |node, step| step_into(node, step))
    }

    pub fn node_mut<'a>(&self, root: &'a mut Node) -> Option<&'a mut Node> {
        let mut current = root;
        for step in &self.steps {
            current = match (current, step) {
                (Node::Mapping(mapping), AccessKey::Field(key)) => mapping.get_mut(key)?,
                (Node::Sequence(items), AccessKey::Element(index)) => items.get_mut(*index)?,
                _ => return None,
            };
        }
        Some(current)
    }
}

fn step_into<'a>(node: &'a Node, step: &AccessKey) -> Option<&'a Node> {
    match (node, step) {
        (Node::Mapping(mapping), AccessKey::Field(key)) => mapping.get(key),
        (Node::Sequence(items), AccessKey::Element(index)) => items.get(*index),
        _ => None,
    }
}

/// Position of the element whose envelope id equals `id`. Identities are
/// opaque strings; a numeric segment is never read as an index.
pub fn find_by_id(items: &[Node], id: &str) -> Option<usize> {
    items.iter().position(|item| item.object_id() == Some(id))
}

/// Resolves every segment of `path` against `root`.
pub fn locate(root: &Node, path: &ObjectPath) -> Result<Locator, Unresolved> {
    let mut steps = Vec::with_capacity(path.segments().len());
    let mut current = root;

    for (depth, segment) in path.segments().iter().enumerate() {
        let unresolved = |reason| Unresolved {
            depth,
            segment: segment.clone(),
            reason,
        };

        let (step, next) = match current {
            Node::Mapping(mapping) => {
                let next = mapping
                    .get(segment)
                    .ok_or_else(|| unresolved(UnresolvedReason::Missing))?;
                (AccessKey::Field(segment.clone()), next)
            }
            Node::Sequence(items) => {
                let index = find_by_id(items, segment)
                    .ok_or_else(|| unresolved(UnresolvedReason::Missing))?;
                (AccessKey::Element(index), &items[index])
            }
            Node::Scalar(_) => return Err(unresolved(UnresolvedReason::NotAContainer)),
        };

        steps.push(step);
        current = next;
    }

    Ok(Locator { steps })
}

/// A resolved path: the node, plus its container and the key used to reach
/// it (both absent for the root).
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution<'a> {
    pub parent: Option<&'a Node>,
    pub key: Option<AccessKey>,
    pub node: &'a Node,
}

pub fn resolve<'a>(root: &'a Node, path: &ObjectPath) -> Result<Resolution<'a>, Unresolved> {
    let locator = locate(root, path)?;
    let node = locator.node(root).ok_or_else(|| Unresolved {
        depth: 0,
        segment: path.to_string(),
        reason: UnresolvedReason::Missing,
    })?;

    Ok(match locator.split_last() {
        None => Resolution {
            parent: None,
            key: None,
            node,
        },
        Some((parent, key)) => Resolution {
            parent: parent.node(root),
            key: Some(key.clone()),
            node,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document() -> Node {
        Node::from(json!({
            "name": "template_name",
            "services": [
                {
                    "name": "orion",
                    "instance": {"flavor": "m1.medium", "?": {"type": "io.murano.resources.LinuxMuranoInstance", "id": "ef98"}},
                    "?": {"type": "io.murano.apps.apache.Tomcat", "id": "tomcat_id"}
                },
                {
                    "name": "mysql",
                    "?": {"type": "io.murano.apps.database.MySQL", "id": "0"}
                }
            ],
            "?": {"type": "io.murano.Template", "id": "temp_object_id"}
        }))
    }

    #[test]
    fn test_parse_drops_empty_segments() {
        assert!(ObjectPath::parse("").is_root());
        assert!(ObjectPath::parse("/").is_root());
        assert_eq!(ObjectPath::parse("//services/").segments(), &["services".to_string()]);
        assert_eq!(ObjectPath::parse("/services/abc").to_string(), "/services/abc");
        assert_eq!(ObjectPath::root().to_string(), "/");
    }

    #[test]
    fn test_split_last() {
        let path = ObjectPath::parse("/services/abc");
        let (parent, last) = path.split_last().unwrap();
        assert_eq!(parent.to_string(), "/services");
        assert_eq!(last, "abc");
        assert!(ObjectPath::root().split_last().is_none());
    }

    #[test]
    fn test_root_resolves_to_document() {
        let doc = document();
        let resolution = resolve(&doc, &ObjectPath::parse("/")).unwrap();
        assert!(resolution.parent.is_none());
        assert!(resolution.key.is_none());
        assert_eq!(resolution.node, &doc);
    }

    #[test]
    fn test_identity_lookup_in_sequence() {
        let doc = document();
        let resolution = resolve(&doc, &ObjectPath::parse("/services/tomcat_id/instance")).unwrap();
        assert_eq!(resolution.key, Some(AccessKey::Field("instance".to_string())));
        assert_eq!(resolution.node.object_id(), Some("ef98"));
        assert_eq!(resolution.parent.and_then(Node::object_id), Some("tomcat_id"));
    }

    #[test]
    fn test_numeric_segment_is_an_identity_not_an_index() {
        let doc = document();

        let resolution = resolve(&doc, &ObjectPath::parse("/services/0")).unwrap();
        assert_eq!(resolution.key, Some(AccessKey::Element(1)));
        assert_eq!(resolution.node.get("name").and_then(Node::as_str), Some("mysql"));

        let err = locate(&doc, &ObjectPath::parse("/services/1")).unwrap_err();
        assert_eq!(err.reason, UnresolvedReason::Missing);
        assert_eq!(err.depth, 1);
    }

    #[test]
    fn test_unresolved_reports_failing_segment() {
        let doc = document();

        let err = locate(&doc, &ObjectPath::parse("/services/noexists/name")).unwrap_err();
        assert_eq!(err.segment, "noexists");
        assert_eq!(err.depth, 1);
        assert!(!err.is_missing_leaf(&ObjectPath::parse("/services/noexists/name")));

        let err = locate(&doc, &ObjectPath::parse("/name/deeper")).unwrap_err();
        assert_eq!(err.reason, UnresolvedReason::NotAContainer);
    }

    #[test]
    fn test_locator_replays_mutably() {
        let mut doc = document();
        let locator = locate(&doc, &ObjectPath::parse("/services/tomcat_id/name")).unwrap();

        *locator.node_mut(&mut doc).unwrap() = Node::string("renamed");

        let name = resolve(&doc, &ObjectPath::parse("/services/tomcat_id/name")).unwrap().node;
        assert_eq!(name.as_str(), Some("renamed"));
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let doc = document();
        let path = ObjectPath::parse("/services/tomcat_id");
        assert_eq!(locate(&doc, &path), locate(&doc, &path));
    }
}
