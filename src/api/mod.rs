pub mod dto;
pub mod errors;
pub mod handlers;

use axum::{
    routing::{get, post},
    Router,
};
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;

use crate::monitor::MonitorContext;
use handlers::ApiDoc;

pub fn router(ctx: MonitorContext) -> Router {
    let (router, api) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .route("/health", get(handlers::health))
        .route("/api/fridges", get(handlers::list_fridges))
        .route(
            "/api/fridges/{id}",
            get(handlers::get_fridge).put(handlers::update_fridge),
        )
        .route("/api/fridges/{id}/maintenance", post(handlers::log_maintenance))
        .route(
            "/api/fridges/{id}/maintenance/reset",
            post(handlers::reset_maintenance),
        )
        .route("/api/temperature_data/{id}", get(handlers::get_temperature_data))
        .route("/api/stats/{id}", get(handlers::get_stats))
        .route("/api/alerts/{id}", get(handlers::get_alerts))
        .route("/api/alerts/{id}/acknowledge", post(handlers::acknowledge_alert))
        .with_state(ctx)
        .split_for_parts();

    router.route(
        "/api-docs/openapi.json",
        get(move || async move { axum::Json(api) }),
    )
}
