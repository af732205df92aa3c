use serde::{Deserialize, Serialize};

/// Caller identity extracted from request headers. Every entity is scoped to
/// the tenant recorded here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestContext {
    pub tenant_id: String,
    pub user_id: Option<String>,
}

impl RequestContext {
    pub fn new(tenant_id: String) -> Self {
        Self {
            tenant_id,
            user_id: None,
        }
    }

    pub fn with_user(tenant_id: String, user_id: Option<String>) -> Self {
        Self { tenant_id, user_id }
    }

    /// Tenant used for development when no headers are sent
    pub fn default_tenant() -> Self {
        Self {
            tenant_id: "dev-tenant".to_string(),
            user_id: Some("dev-user".to_string()),
        }
    }

    pub fn owns(&self, tenant_id: &str) -> bool {
        self.tenant_id == tenant_id
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::default_tenant()
    }
}
