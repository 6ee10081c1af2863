use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};
use shared::{
    domain::ExtensionName,
    error::{ApiError, ErrorCode},
    protocol::{ExtensionItem, ExtensionListResponse, RawExtensionItem, EXTENSIONS_ROUTE},
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod api;
mod app_state;
mod config;

use api::{add_extension, list_extensions, remove_extension, ApiContext};
use app_state::AppState;
use config::load_settings;

type ApiResult<T> = Result<T, (StatusCode, Json<ApiError>)>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let settings = load_settings();
    let api = ApiContext::with_items(seed_items(&settings.seed_fixed));
    let app = build_router(Arc::new(AppState { api }));

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, route = EXTENSIONS_ROUTE, "extension store listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn seed_items(seed_fixed: &[String]) -> Vec<ExtensionItem> {
    let mut items: Vec<ExtensionItem> = Vec::new();
    for raw in seed_fixed {
        match ExtensionName::parse(raw) {
            Ok(name) if items.iter().all(|item| item.ext_name != name) => {
                items.push(ExtensionItem::fixed(name))
            }
            Ok(_) => {}
            Err(error) => warn!(entry = %raw, %error, "skipping invalid seed extension"),
        }
    }
    items
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route(
            EXTENSIONS_ROUTE,
            get(http_list_extensions).post(http_add_extension),
        )
        .route(
            &format!("{EXTENSIONS_ROUTE}/:ext_name"),
            delete(http_remove_extension),
        )
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn http_list_extensions(State(state): State<Arc<AppState>>) -> Json<ExtensionListResponse> {
    Json(ExtensionListResponse {
        items: list_extensions(&state.api).await,
    })
}

async fn http_add_extension(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RawExtensionItem>,
) -> ApiResult<StatusCode> {
    let ext_name = req.ext_name.clone();
    let ext_type = req.ext_type;
    add_extension(&state.api, req).await.map_err(|e| {
        warn!(extension = %ext_name, code = ?e.code, "add rejected: {}", e.message);
        (status_for(&e), Json(e))
    })?;
    info!(extension = %ext_name, %ext_type, "extension added");
    Ok(StatusCode::CREATED)
}

async fn http_remove_extension(
    State(state): State<Arc<AppState>>,
    Path(ext_name): Path<String>,
) -> ApiResult<StatusCode> {
    let ext_type = remove_extension(&state.api, &ext_name)
        .await
        .map_err(|e| (status_for(&e), Json(e)))?;
    info!(extension = %ext_name, %ext_type, "extension removed");
    Ok(StatusCode::NO_CONTENT)
}

fn status_for(err: &ApiError) -> StatusCode {
    match err.code {
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Conflict => StatusCode::CONFLICT,
        ErrorCode::Validation => StatusCode::BAD_REQUEST,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
