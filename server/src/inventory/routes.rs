//! HTTP routes for the drone inventory

use super::store::{Device, InventoryError, InventoryStore};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
pub struct AddDevice {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteDevice {
    pub id: String,
}

#[derive(Debug, Serialize)]
struct DeviceChanged {
    success: bool,
    device: Device,
}

impl IntoResponse for InventoryError {
    fn into_response(self) -> Response {
        let status = match &self {
            InventoryError::EmptyName => StatusCode::BAD_REQUEST,
            InventoryError::Duplicate(_) => StatusCode::CONFLICT,
            InventoryError::NotFound(_) => StatusCode::NOT_FOUND,
            InventoryError::Io(_) | InventoryError::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        warn!("Inventory request failed: {}", self);

        let body = json!({ "success": false, "error": self.to_string() });
        (status, Json(body)).into_response()
    }
}

/// Build the inventory router with permissive CORS
pub fn router(store: Arc<InventoryStore>) -> Router {
    Router::new()
        .route("/healthz", get(health_handler))
        .route("/devices", get(list_handler))
        .route("/devices/add", post(add_handler))
        .route("/devices/delete", post(delete_handler))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
                .expose_headers(Any),
        )
        .with_state(store)
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn list_handler(State(store): State<Arc<InventoryStore>>) -> Json<Vec<Device>> {
    Json(store.list().await)
}

async fn add_handler(
    State(store): State<Arc<InventoryStore>>,
    Json(request): Json<AddDevice>,
) -> Result<impl IntoResponse, InventoryError> {
    let device = store.add(&request.name).await?;
    info!("Device added: {}", device.id);
    Ok((
        StatusCode::CREATED,
        Json(DeviceChanged {
            success: true,
            device,
        }),
    ))
}

async fn delete_handler(
    State(store): State<Arc<InventoryStore>>,
    Json(request): Json<DeleteDevice>,
) -> Result<Json<DeviceChanged>, InventoryError> {
    let device = store.remove(&request.id).await?;
    info!("Device removed: {}", device.id);
    Ok(Json(DeviceChanged {
        success: true,
        device,
    }))
}
