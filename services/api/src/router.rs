//! Axum Router Configuration
//!
//! This module defines the complete HTTP routing for the application,
//! including the assistant endpoint and OpenAPI documentation.

use crate::{
    handlers,
    models::{AssistantForm, HistoryRole, HistoryTurn},
    state::AppState,
};

use axum::{Router, extract::DefaultBodyLimit, routing::post};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(handlers::respond),
    components(schemas(AssistantForm, HistoryTurn, HistoryRole)),
    tags(
        (name = "Concierge API", description = "Voice assistant: transcription, scripted skills, chat and speech")
    )
)]
pub struct ApiDoc;

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    let upload_limit = app_state.max_upload_bytes;

    let api_router = Router::new()
        .route("/api", post(handlers::respond))
        .layer(DefaultBodyLimit::max(upload_limit))
        .with_state(app_state);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api_router)
}
