use std::{net::SocketAddr, sync::Arc};

use ai_integration::MenuImage;
use axum::{
    extract::{
        multipart::{Multipart, MultipartError, MultipartRejection},
        rejection::JsonRejection,
        DefaultBodyLimit, State,
    },
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use server_api::{extract_menu, generate_image, search_image};
use shared::{
    error::{ApiError, ApiException, ErrorCode},
    protocol::{
        ImagePromptRequest, ImageUrlResponse, MenuItemsResponse, GENERATE_IMAGE_ROUTE,
        SEARCH_IMAGE_ROUTE, UPLOAD_FILE_FIELD, UPLOAD_ROUTE,
    },
};
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod app_state;
mod config;

use app_state::AppState;
use config::load_settings;

const FALLBACK_MIME_TYPE: &str = "application/octet-stream";

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = load_settings()?;
    let state = AppState::from_settings(&settings)?;
    let app = build_router(Arc::new(state), settings.max_upload_bytes);

    let addr: SocketAddr = settings.bind_addr.parse()?;
    info!(%addr, "menu server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route(UPLOAD_ROUTE, post(upload_menu))
        .route(SEARCH_IMAGE_ROUTE, post(http_search_image))
        .route(GENERATE_IMAGE_ROUTE, post(http_generate_image))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_upload_bytes))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

fn reject(err: ApiException) -> (StatusCode, Json<ApiError>) {
    let status =
        StatusCode::from_u16(err.code.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(err.into()))
}

async fn upload_menu(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<MenuItemsResponse> {
    info!("upload route started");
    let image = match multipart {
        Ok(mut multipart) => read_menu_image(&mut multipart).await.map_err(reject)?,
        Err(rejection) => {
            warn!(%rejection, "upload was not a multipart form");
            None
        }
    };
    let response = extract_menu(&state.api, image).await.map_err(reject)?;
    Ok(Json(response))
}

/// Returns the first `file` field of the form, or `None` when the form has none.
async fn read_menu_image(multipart: &mut Multipart) -> Result<Option<MenuImage>, ApiException> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(upload_error)?
    {
        if field.name() != Some(UPLOAD_FILE_FIELD) {
            continue;
        }
        let mime_type = field
            .content_type()
            .map(str::trim)
            .filter(|mime| !mime.is_empty())
            .unwrap_or(FALLBACK_MIME_TYPE)
            .to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(upload_error)?;
        return Ok(Some(MenuImage {
            mime_type,
            bytes: bytes.to_vec(),
        }));
    }
    Ok(None)
}

fn upload_error(err: MultipartError) -> ApiException {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiException::new(ErrorCode::PayloadTooLarge, "Uploaded file is too large.")
    } else {
        ApiException::validation(format!("invalid upload: {}", err.body_text()))
    }
}

async fn http_search_image(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ImagePromptRequest>, JsonRejection>,
) -> ApiResult<ImageUrlResponse> {
    let request = prompt_request(payload);
    let response = search_image(&state.api, &request).await.map_err(reject)?;
    Ok(Json(response))
}

async fn http_generate_image(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ImagePromptRequest>, JsonRejection>,
) -> ApiResult<ImageUrlResponse> {
    let request = prompt_request(payload);
    let response = generate_image(&state.api, &request).await.map_err(reject)?;
    Ok(Json(response))
}

/// An unreadable body is handled like a missing prompt.
fn prompt_request(payload: Result<Json<ImagePromptRequest>, JsonRejection>) -> ImagePromptRequest {
    match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            warn!(%rejection, "prompt body could not be read");
            ImagePromptRequest::default()
        }
    }
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
