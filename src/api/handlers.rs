use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    Json as RequestJson,
};
use log::{debug, error, info};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::error::DocumentError;
use crate::logic::DocumentService;
use crate::model::{Entity, EntityKind, EntitySummary, Envelope, Id, Node, RequestContext};
use crate::store::traits::{DuplicateEntry, EntityStore};

pub type AppState<S> = Arc<S>;

pub type ApiError = (StatusCode, Json<ErrorResponse>);

/// Selects which entity table a generic handler serves.
pub trait EntityRoute: Send + Sync + 'static {
    const KIND: EntityKind;
}

pub enum Templates {}

pub enum Environments {}

impl EntityRoute for Templates {
    const KIND: EntityKind = EntityKind::Template;
}

impl EntityRoute for Environments {
    const KIND: EntityKind = EntityKind::Environment;
}

/// Simple health check endpoint
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: &str) -> Self {
        Self {
            error: message.to_string(),
        }
    }
}

/// Entity as returned by create, show and update.
#[derive(Debug, Serialize)]
pub struct EntityResponse {
    #[serde(flatten)]
    pub summary: EntitySummary,
    #[serde(rename = "?", skip_serializing_if = "Option::is_none")]
    pub envelope: Option<Envelope>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub services: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct RenameRequest {
    pub name: String,
}

/// Maps core errors onto HTTP statuses.
pub fn error_response(err: DocumentError) -> ApiError {
    let status = match &err {
        DocumentError::NotFound(_) | DocumentError::InvalidModel(_) => {
            info!("{}", err);
            StatusCode::NOT_FOUND
        }
        DocumentError::InvalidEntity(_) => {
            info!("{}", err);
            StatusCode::BAD_REQUEST
        }
        DocumentError::Store(inner) if inner.downcast_ref::<DuplicateEntry>().is_some() => {
            info!("{}", err);
            StatusCode::CONFLICT
        }
        DocumentError::Store(inner) => {
            error!("Store failure: {:#}", inner);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, Json(ErrorResponse::new(&err.to_string())))
}

/// Loads the entity and checks that the caller's tenant owns it.
async fn verify_entity<S: EntityStore>(
    store: &S,
    kind: EntityKind,
    id: &Id,
    ctx: &RequestContext,
) -> Result<Entity, ApiError> {
    let entity = DocumentService::show(store, kind, id)
        .await
        .map_err(error_response)?;

    if !ctx.owns(&entity.tenant_id) {
        info!(
            "Tenant {} is not authorized to access {} {}",
            ctx.tenant_id, kind, id
        );
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse::new(
                "User is not authorized to access this tenant resources",
            )),
        ));
    }

    Ok(entity)
}

fn services_path(path: &str) -> String {
    let path = path.trim_matches('/');
    if path.is_empty() {
        "/services".to_string()
    } else {
        format!("/services/{}", path)
    }
}

// Entity handlers

pub async fn list_entities<S: EntityStore, K: EntityRoute>(
    State(store): State<AppState<S>>,
    ctx: RequestContext,
) -> Result<Json<Value>, ApiError> {
    debug!("{}:List <Tenant: {}>", K::KIND, ctx.tenant_id);

    let entities = DocumentService::list(&*store, K::KIND, &ctx.tenant_id)
        .await
        .map_err(error_response)?;

    let summaries: Vec<EntitySummary> = entities.iter().map(Entity::summary).collect();
    Ok(Json(serde_json::json!({ (K::KIND.table()): summaries })))
}

pub async fn create_entity<S: EntityStore, K: EntityRoute>(
    State(store): State<AppState<S>>,
    ctx: RequestContext,
    RequestJson(body): RequestJson<Value>,
) -> Result<Json<EntityResponse>, ApiError> {
    debug!("{}:Create <Tenant: {}>", K::KIND, ctx.tenant_id);

    let entity = DocumentService::create(&*store, K::KIND, Node::from(body), &ctx.tenant_id)
        .await
        .map_err(error_response)?;

    Ok(Json(EntityResponse {
        summary: entity.summary(),
        envelope: entity.description.as_ref().and_then(Node::envelope).cloned(),
        services: None,
    }))
}

pub async fn show_entity<S: EntityStore, K: EntityRoute>(
    State(store): State<AppState<S>>,
    Path(id): Path<Id>,
    ctx: RequestContext,
) -> Result<Json<EntityResponse>, ApiError> {
    debug!("{}:Show <Id: {}>", K::KIND, id);

    let entity = verify_entity(&*store, K::KIND, &id, &ctx).await?;
    let services = DocumentService::get_data(&*store, K::KIND, &id, "/services")
        .await
        .map_err(error_response)?;

    Ok(Json(EntityResponse {
        summary: entity.summary(),
        envelope: None,
        services: Some(services.into()),
    }))
}

pub async fn rename_entity<S: EntityStore, K: EntityRoute>(
    State(store): State<AppState<S>>,
    Path(id): Path<Id>,
    ctx: RequestContext,
    RequestJson(body): RequestJson<RenameRequest>,
) -> Result<Json<EntityResponse>, ApiError> {
    debug!("{}:Update <Id: {}, Name: {}>", K::KIND, id, body.name);

    verify_entity(&*store, K::KIND, &id, &ctx).await?;
    let entity = DocumentService::rename(&*store, K::KIND, &id, &body.name)
        .await
        .map_err(error_response)?;

    Ok(Json(EntityResponse {
        summary: entity.summary(),
        envelope: None,
        services: None,
    }))
}

pub async fn delete_entity<S: EntityStore, K: EntityRoute>(
    State(store): State<AppState<S>>,
    Path(id): Path<Id>,
    ctx: RequestContext,
) -> Result<StatusCode, ApiError> {
    debug!("{}:Delete <Id: {}>", K::KIND, id);

    verify_entity(&*store, K::KIND, &id, &ctx).await?;
    DocumentService::delete(&*store, K::KIND, &id)
        .await
        .map_err(error_response)?;

    Ok(StatusCode::OK)
}

// Service collection handlers

pub async fn list_services<S: EntityStore, K: EntityRoute>(
    State(store): State<AppState<S>>,
    Path(id): Path<Id>,
    ctx: RequestContext,
) -> Result<Json<Value>, ApiError> {
    get_services_at::<S, K>(&store, id, String::new(), ctx).await
}

pub async fn get_service<S: EntityStore, K: EntityRoute>(
    State(store): State<AppState<S>>,
    Path((id, path)): Path<(Id, String)>,
    ctx: RequestContext,
) -> Result<Json<Value>, ApiError> {
    get_services_at::<S, K>(&store, id, path, ctx).await
}

async fn get_services_at<S: EntityStore, K: EntityRoute>(
    store: &AppState<S>,
    id: Id,
    path: String,
    ctx: RequestContext,
) -> Result<Json<Value>, ApiError> {
    let path = services_path(&path);
    debug!("{}:Services:Get <Id: {}, Path: {}>", K::KIND, id, path);

    verify_entity(&**store, K::KIND, &id, &ctx).await?;
    let node = DocumentService::get_data(&**store, K::KIND, &id, &path)
        .await
        .map_err(error_response)?;

    Ok(Json(node.into()))
}

pub async fn post_services<S: EntityStore, K: EntityRoute>(
    State(store): State<AppState<S>>,
    Path(id): Path<Id>,
    ctx: RequestContext,
    RequestJson(body): RequestJson<Value>,
) -> Result<Json<Value>, ApiError> {
    post_services_at::<S, K>(&store, id, String::new(), ctx, body).await
}

pub async fn post_service_path<S: EntityStore, K: EntityRoute>(
    State(store): State<AppState<S>>,
    Path((id, path)): Path<(Id, String)>,
    ctx: RequestContext,
    RequestJson(body): RequestJson<Value>,
) -> Result<Json<Value>, ApiError> {
    post_services_at::<S, K>(&store, id, path, ctx, body).await
}

async fn post_services_at<S: EntityStore, K: EntityRoute>(
    store: &AppState<S>,
    id: Id,
    path: String,
    ctx: RequestContext,
    body: Value,
) -> Result<Json<Value>, ApiError> {
    let path = services_path(&path);
    debug!("{}:Services:Post <Id: {}, Path: {}>", K::KIND, id, path);

    verify_entity(&**store, K::KIND, &id, &ctx).await?;
    let node = DocumentService::post_data(&**store, K::KIND, &id, &path, Node::from(body))
        .await
        .map_err(error_response)?;

    Ok(Json(node.into()))
}

pub async fn put_service<S: EntityStore, K: EntityRoute>(
    State(store): State<AppState<S>>,
    Path((id, path)): Path<(Id, String)>,
    ctx: RequestContext,
    RequestJson(body): RequestJson<Value>,
) -> Result<Json<Value>, ApiError> {
    let path = services_path(&path);
    debug!("{}:Services:Put <Id: {}, Path: {}>", K::KIND, id, path);

    verify_entity(&*store, K::KIND, &id, &ctx).await?;
    let node = DocumentService::put_data(&*store, K::KIND, &id, &path, Node::from(body))
        .await
        .map_err(error_response)?;

    Ok(Json(node.into()))
}

pub async fn delete_service<S: EntityStore, K: EntityRoute>(
    State(store): State<AppState<S>>,
    Path((id, path)): Path<(Id, String)>,
    ctx: RequestContext,
) -> Result<StatusCode, ApiError> {
    let path = services_path(&path);
    debug!("{}:Services:Delete <Id: {}, Path: {}>", K::KIND, id, path);

    verify_entity(&*store, K::KIND, &id, &ctx).await?;
    DocumentService::delete_data(&*store, K::KIND, &id, &path)
        .await
        .map_err(error_response)?;

    Ok(StatusCode::OK)
}
