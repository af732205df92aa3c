use crate::model::{EntityStatus, Node};

/// Source of per-service status for the overlay.
pub trait StatusLookup {
    fn service_status(&self, owner_id: &str, service_id: &str) -> EntityStatus;
}

impl<F> StatusLookup for F
where
    F: Fn(&str, &str) -> EntityStatus,
{
    fn service_status(&self, owner_id: &str, service_id: &str) -> EntityStatus {
        self(owner_id, service_id)
    }
}

/// Every service reports the status of the environment that owns it.
// TODO: derive deploying/pending per service once deployment reports are stored.
#[derive(Debug, Clone, Copy)]
pub struct SameAsOwner(pub EntityStatus);

impl StatusLookup for SameAsOwner {
    fn service_status(&self, _owner_id: &str, _service_id: &str) -> EntityStatus {
        self.0
    }
}

/// Copy of `doc` with `?.status` set on every identified service.
/// The input is left as loaded.
pub fn with_status<L: StatusLookup + ?Sized>(doc: &Node, owner_id: &str, lookup: &L) -> Node {
    let mut served = doc.clone();
    apply_status(&mut served, owner_id, lookup);
    served
}

/// In-place form of [`with_status`], for documents that are about to be served.
pub fn apply_status<L: StatusLookup + ?Sized>(doc: &mut Node, owner_id: &str, lookup: &L) {
    let Some(services) = doc
        .as_mapping_mut()
        .and_then(|root| root.get_mut("services"))
        .and_then(Node::as_sequence_mut)
    else {
        return;
    };

    for service in services.iter_mut() {
        let Some(envelope) = service.as_mapping_mut().and_then(|m| m.envelope.as_mut()) else {
            continue;
        };
        let Some(id) = envelope.id().map(str::to_string) else {
            continue;
        };
        envelope.status = Some(lookup.service_status(owner_id, &id).as_str().to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const STORED: &str = r#"{
        "name": "env",
        "services": [
            {"name": "tomcat", "?": {"type": "io.murano.apps.apache.Tomcat", "id": "a"}},
            {"name": "anonymous"}
        ],
        "?": {"type": "io.murano.Environment", "id": "env_id"}
    }"#;

    #[test]
    fn test_overlay_sets_status_on_identified_services() {
        let doc: Node = serde_json::from_str(STORED).unwrap();

        let served = with_status(&doc, "env_id", &SameAsOwner(EntityStatus::Deploying));

        let value = served.to_value();
        assert_eq!(value["services"][0]["?"]["status"], json!("deploying"));
        assert!(value["services"][1].get("?").is_none());
        assert!(value["?"].get("status").is_none());
    }

    #[test]
    fn test_overlay_never_touches_stored_form() {
        let first: Node = serde_json::from_str(STORED).unwrap();
        let second: Node = serde_json::from_str(STORED).unwrap();
        let stored_before = serde_json::to_string(&first).unwrap();

        let ready = with_status(&first, "env_id", &SameAsOwner(EntityStatus::Ready));
        let pending = with_status(&second, "env_id", &|_: &str, _: &str| EntityStatus::Pending);

        assert_ne!(ready, pending);
        assert_eq!(serde_json::to_string(&first).unwrap(), stored_before);
        assert_eq!(serde_json::to_string(&second).unwrap(), stored_before);
    }

    #[test]
    fn test_lookup_receives_owner_and_service() {
        let doc: Node = serde_json::from_str(STORED).unwrap();
        let lookup = |owner: &str, service: &str| {
            if owner == "env_id" && service == "a" {
                EntityStatus::DeployFailure
            } else {
                EntityStatus::Ready
            }
        };

        let served = with_status(&doc, "env_id", &lookup);
        assert_eq!(served.to_value()["services"][0]["?"]["status"], json!("deploy failure"));
    }

    #[test]
    fn test_document_without_services_is_unchanged() {
        let doc = Node::from(json!({"name": "env", "?": {"type": "io.murano.Environment", "id": "e"}}));
        assert_eq!(with_status(&doc, "e", &SameAsOwner(EntityStatus::Ready)), doc);
    }
}
