use anyhow::Result;
use log::info;
use serde_json::json;

use crate::error::DocumentError;
use crate::logic::DocumentService;
use crate::model::{EntityKind, Node};
use crate::store::traits::{DuplicateEntry, EntityStore};

pub const DEMO_TENANT: &str = "demo";
pub const DEMO_TEMPLATE: &str = "demotemplate";

/// Creates the demo template unless the demo tenant already has one.
pub async fn load_seed_data<S: EntityStore + ?Sized>(store: &S) -> Result<()> {
    let params = json!({
        "name": DEMO_TEMPLATE,
        "services": [tomcat_service(), mysql_service()]
    });

    match DocumentService::create(store, EntityKind::Template, Node::from(params), DEMO_TENANT).await {
        Ok(template) => {
            info!(
                "Seeded template {} ({}) for tenant {}",
                template.name, template.id, DEMO_TENANT
            );
            Ok(())
        }
        Err(DocumentError::Store(err)) if err.is::<DuplicateEntry>() => {
            info!("Seed template {} already present", DEMO_TEMPLATE);
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}

fn tomcat_service() -> serde_json::Value {
    json!({
        "name": "tomcat",
        "port": "8080",
        "instance": {
            "name": "tomcat-host",
            "flavor": "m1.medium",
            "image": "ubuntu-14.04",
            "assignFloatingIp": "true",
            "?": {"type": "io.murano.resources.LinuxMuranoInstance"}
        },
        "?": {"type": "io.murano.apps.apache.Tomcat"}
    })
}

fn mysql_service() -> serde_json::Value {
    json!({
        "name": "mysql",
        "database": "catalog",
        "username": "catalog",
        "password": "changeme",
        "?": {"type": "io.murano.apps.database.MySQL"}
    })
}
