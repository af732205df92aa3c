use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap, StatusCode},
};
use crate::model::RequestContext;

/// Axum extractor for RequestContext from request headers
///
/// - X-Tenant-Id: tenant owning the addressed templates and environments
/// - X-User-Id: Optional user identifier, used for logging only
///
/// For development/testing, if no tenant header is present, returns the
/// default development tenant.
#[async_trait]
impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        let headers = &parts.headers;

        match extract_header_value(headers, "x-tenant-id") {
            Some(tenant_id) if !tenant_id.is_empty() => {
                let user_id = extract_header_value(headers, "x-user-id");
                Ok(RequestContext::with_user(tenant_id, user_id))
            }
            Some(_) => Err(StatusCode::BAD_REQUEST),
            // In production the tenant would come from the auth token
            None => Ok(RequestContext::default_tenant()),
        }
    }
}

/// Extract header value as string
fn extract_header_value(headers: &HeaderMap, header_name: &str) -> Option<String> {
    headers
        .get(header_name)
        .and_then(|value| value.to_str().ok())
        .map(|s| s.trim().to_string())
}
