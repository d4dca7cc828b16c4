use std::{net::SocketAddr, sync::Arc};

use axum::{
    body::Bytes,
    extract::{FromRequest, Path, Query, Request, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get},
    Form, Json, Router,
};
use catalog_api::{
    datagrid::GridQuery,
    routes::{
        families_create_route, families_edit_route, families_index_route,
        families_mass_delete_route, route_path,
    },
    ApiContext, IndexResponse,
};
use serde::Serialize;
use shared::{
    domain::AttributeFamilyId,
    error::{ApiError, ErrorCode},
    protocol::{
        AttributeFamilyInput, CatalogEvent, FamilyFormData, Flash, MassDestroyRequest,
        MessageResponse, PageView, Redirect, RedirectTarget,
    },
};
use storage::Storage;
use tokio::sync::broadcast::{self, error::RecvError};
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing::{error, info, warn};

mod app_state;
mod config;

use app_state::AppState;
use config::{load_settings, prepare_database_url};

type HttpError = (StatusCode, Json<ApiError>);

#[derive(Debug, Serialize)]
struct RedirectBody {
    redirect_to: String,
    flash: Flash,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = load_settings()?;
    tracing_subscriber::fmt()
        .with_env_filter(settings.log_filter.as_str())
        .init();

    let database_url = prepare_database_url(&settings.database_url)?;
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            %error,
            "failed to open SQLite database; verify parent directory exists and permissions are correct"
        );
        error
    })?;
    let api = ApiContext::new(storage);
    tokio::spawn(log_catalog_events(api.events.subscribe()));

    let app = build_router(Arc::new(AppState { api }), settings.max_body_bytes);

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, "catalog admin listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route(families_index_route(), get(http_index))
        .route(
            families_create_route(),
            get(http_create).post(http_store),
        )
        .route(
            families_edit_route(),
            get(http_edit).put(http_update).delete(http_destroy),
        )
        .route(families_mass_delete_route(), any(http_mass_destroy))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
}

async fn log_catalog_events(mut events: broadcast::Receiver<CatalogEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => info!(event = event.name(), "catalog event"),
            Err(RecvError::Lagged(skipped)) => warn!(skipped, "catalog event log lagged"),
            Err(RecvError::Closed) => break,
        }
    }
}

async fn healthz(State(state): State<Arc<AppState>>) -> Result<&'static str, HttpError> {
    state.api.storage.health_check().await.map_err(|e| {
        api_failure(ApiError::new(ErrorCode::Internal, e.to_string()))
    })?;
    Ok("ok")
}

async fn http_index(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(q): Query<GridQuery>,
) -> Result<Json<IndexResponse>, HttpError> {
    let listing = catalog_api::index(&state.api, wants_json(&headers), &q)
        .await
        .map_err(api_failure)?;
    Ok(Json(listing))
}

async fn http_create(
    State(state): State<Arc<AppState>>,
) -> Result<Json<PageView<FamilyFormData>>, HttpError> {
    let view = catalog_api::create(&state.api).await.map_err(api_failure)?;
    Ok(Json(view))
}

async fn http_store(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(input): Json<AttributeFamilyInput>,
) -> Result<Response, HttpError> {
    let redirect = catalog_api::store(&state.api, input)
        .await
        .map_err(api_failure)?;
    Ok(redirect_response(redirect, &headers))
}

async fn http_edit(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
) -> Result<Json<PageView<FamilyFormData>>, HttpError> {
    let family_id = parse_family_id(&raw_id)?;
    let view = catalog_api::edit(&state.api, family_id)
        .await
        .map_err(api_failure)?;
    Ok(Json(view))
}

async fn http_update(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
    headers: HeaderMap,
    Json(input): Json<AttributeFamilyInput>,
) -> Result<Response, HttpError> {
    let family_id = parse_family_id(&raw_id)?;
    let redirect = catalog_api::update(&state.api, family_id, input)
        .await
        .map_err(api_failure)?;
    Ok(redirect_response(redirect, &headers))
}

async fn http_destroy(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
) -> Result<Json<MessageResponse>, HttpError> {
    let family_id = parse_family_id(&raw_id)?;
    let deleted = catalog_api::destroy(&state.api, family_id)
        .await
        .map_err(api_failure)?;
    Ok(Json(deleted))
}

/// Accepts any method so that non-delete requests get the error flash instead of a 405.
/// Methods other than `DELETE` and `POST` are turned away before the body is read.
async fn http_mass_destroy(
    State(state): State<Arc<AppState>>,
    method: Method,
    headers: HeaderMap,
    request: Request,
) -> Result<Response, HttpError> {
    let may_delete = method == Method::DELETE || method == Method::POST;
    let payload = if may_delete {
        read_mass_destroy_body(&headers, request).await
    } else {
        Ok(MassDestroyRequest::default())
    };

    let payload = match payload {
        Ok(payload) => payload,
        Err(reason) if method == Method::DELETE => {
            return Err(api_failure(ApiError::new(
                ErrorCode::Validation,
                format!("invalid mass delete body: {reason}"),
            )));
        }
        // An unreadable POST body carries no `_method` override.
        Err(reason) => {
            warn!(%reason, "unreadable mass delete body");
            MassDestroyRequest::default()
        }
    };

    let redirect = catalog_api::mass_destroy(&state.api, method.as_str(), payload).await;
    Ok(redirect_response(redirect, &headers))
}

/// Form-encoded bodies come from the admin grid, JSON from scripted clients.
async fn read_mass_destroy_body(
    headers: &HeaderMap,
    request: Request,
) -> Result<MassDestroyRequest, String> {
    let is_form = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/x-www-form-urlencoded"));
    if is_form {
        return Form::<MassDestroyRequest>::from_request(request, &())
            .await
            .map(|Form(payload)| payload)
            .map_err(|rejection| rejection.body_text());
    }

    let body = Bytes::from_request(request, &())
        .await
        .map_err(|rejection| rejection.body_text())?;
    if body.is_empty() {
        return Ok(MassDestroyRequest::default());
    }
    serde_json::from_slice(&body).map_err(|e| e.to_string())
}

/// Ids that are not numbers cannot name a family, so they are a 404 like unknown ones.
fn parse_family_id(raw: &str) -> Result<AttributeFamilyId, HttpError> {
    raw.parse::<i64>().map(AttributeFamilyId).map_err(|_| {
        api_failure(ApiError::new(
            ErrorCode::NotFound,
            format!("attribute family {raw} not found"),
        ))
    })
}

fn wants_json(headers: &HeaderMap) -> bool {
    let ajax = headers
        .get("x-requested-with")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("XMLHttpRequest"));
    let accepts_json = headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("application/json"));
    ajax || accepts_json
}

fn redirect_response(redirect: Redirect, headers: &HeaderMap) -> Response {
    let location = match redirect.to {
        RedirectTarget::Route(name) => route_path(&name)
            .unwrap_or_else(families_index_route)
            .to_string(),
        RedirectTarget::Back => headers
            .get(header::REFERER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| families_index_route())
            .to_string(),
    };

    (
        StatusCode::SEE_OTHER,
        [(header::LOCATION, location.clone())],
        Json(RedirectBody {
            redirect_to: location,
            flash: redirect.flash,
        }),
    )
        .into_response()
}

fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::BadRequest => StatusCode::BAD_REQUEST,
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Validation => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn api_failure(err: ApiError) -> HttpError {
    (status_for(err.code), Json(err))
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
