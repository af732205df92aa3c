use axum::{
    routing::get,
    Router,
};
use std::sync::Arc;

use crate::api::handlers::{self, EntityRoute, Environments, Templates};
use crate::store::traits::EntityStore;

pub fn create_router<S: EntityStore + 'static>() -> Router<Arc<S>> {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        .nest("/templates", entity_routes::<S, Templates>())
        .nest("/environments", entity_routes::<S, Environments>())
}

/// Routes shared by templates and environments.
fn entity_routes<S: EntityStore + 'static, K: EntityRoute>() -> Router<Arc<S>> {
    Router::new()
        .route(
            "/",
            get(handlers::list_entities::<S, K>).post(handlers::create_entity::<S, K>),
        )
        .route(
            "/:entity_id",
            get(handlers::show_entity::<S, K>)
                .put(handlers::rename_entity::<S, K>)
                .delete(handlers::delete_entity::<S, K>),
        )
        // Object model access below the services collection
        .route(
            "/:entity_id/services",
            get(handlers::list_services::<S, K>).post(handlers::post_services::<S, K>),
        )
        .route(
            "/:entity_id/services/*path",
            get(handlers::get_service::<S, K>)
                .post(handlers::post_service_path::<S, K>)
                .put(handlers::put_service::<S, K>)
                .delete(handlers::delete_service::<S, K>),
        )
}
