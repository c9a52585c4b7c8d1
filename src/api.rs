//! HTTP surface: routes, auth gate and error-to-status mapping.

use std::sync::Arc;

use axum::extract::{Path, Query, Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use crate::error::ServiceError;
use crate::model::{AssignTags, CreateTranslation, Translation, TranslationId, UpdateTranslation};
use crate::security::is_authorized;
use crate::service::TranslationService;

#[derive(Clone)]
pub struct AppState {
    pub service: TranslationService,
    /// `None` leaves the API open
    pub api_key: Option<Arc<str>>,
}

impl AppState {
    pub fn new(service: TranslationService, api_key: Option<String>) -> Self {
        Self {
            service,
            api_key: api_key.map(Arc::from),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        match self {
            ServiceError::Validation(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({ "error": errors.to_string(), "errors": errors })),
            )
                .into_response(),
            ServiceError::Conflict { .. } => {
                (StatusCode::CONFLICT, Json(json!({ "error": self.to_string() }))).into_response()
            }
            ServiceError::NotFound(_) => {
                (StatusCode::NOT_FOUND, Json(json!({ "error": self.to_string() }))).into_response()
            }
            ServiceError::Store(e) => {
                error!("Store failure: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "An error occurred" })),
                )
                    .into_response()
            }
        }
    }
}

type ApiResult<T> = Result<T, ServiceError>;

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route(
            "/translations",
            get(list_translations).post(create_translation),
        )
        .route("/translations/search", get(search_translations))
        .route("/translations/export", get(export_translations))
        .route("/translations/tags/:tag", get(translations_by_tag))
        .route(
            "/translations/:id",
            get(show_translation)
                .put(update_translation)
                .delete(delete_translation),
        )
        .route("/translations/:id/tags", post(assign_tags))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_api_key,
        ));

    Router::new()
        .route("/health", get(health))
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn require_api_key(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let Some(expected) = state.api_key.as_deref() else {
        return next.run(request).await;
    };

    let header_value = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    if is_authorized(header_value, expected) {
        next.run(request).await
    } else {
        warn!("Rejected unauthorized request to {}", request.uri().path());
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "Unauthorized" })),
        )
            .into_response()
    }
}

async fn health() -> &'static str {
    "OK"
}

async fn list_translations(State(state): State<AppState>) -> ApiResult<Json<Vec<Translation>>> {
    Ok(Json(state.service.get_all_translations().await?))
}

async fn create_translation(
    State(state): State<AppState>,
    Json(input): Json<CreateTranslation>,
) -> ApiResult<(StatusCode, Json<Translation>)> {
    let translation = state.service.create_translation(input).await?;
    Ok((StatusCode::CREATED, Json(translation)))
}

async fn show_translation(
    State(state): State<AppState>,
    Path(id): Path<TranslationId>,
) -> ApiResult<Json<Translation>> {
    Ok(Json(state.service.get_translation_by_id(id).await?))
}

async fn update_translation(
    State(state): State<AppState>,
    Path(id): Path<TranslationId>,
    Json(input): Json<UpdateTranslation>,
) -> ApiResult<Json<Translation>> {
    Ok(Json(state.service.update_translation(id, input).await?))
}

async fn delete_translation(
    State(state): State<AppState>,
    Path(id): Path<TranslationId>,
) -> ApiResult<Json<serde_json::Value>> {
    let message = state.service.delete_translation(id).await?;
    Ok(Json(json!({ "message": message })))
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    query: Option<String>,
}

async fn search_translations(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> ApiResult<Json<Vec<Translation>>> {
    let results = state
        .service
        .search_translations(params.query.as_deref())
        .await?;
    Ok(Json(results))
}

async fn translations_by_tag(
    State(state): State<AppState>,
    Path(tag): Path<String>,
) -> ApiResult<Json<Vec<Translation>>> {
    Ok(Json(state.service.get_translations_by_tag(&tag).await?))
}

async fn assign_tags(
    State(state): State<AppState>,
    Path(id): Path<TranslationId>,
    Json(input): Json<AssignTags>,
) -> ApiResult<Json<Translation>> {
    Ok(Json(state.service.assign_tags_to_translation(id, input).await?))
}

async fn export_translations(State(state): State<AppState>) -> ApiResult<Json<Vec<Translation>>> {
    Ok(Json(state.service.export_translations().await?))
}
