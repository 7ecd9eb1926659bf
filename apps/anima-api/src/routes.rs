use axum::{
	Json, Router,
	extract::{DefaultBodyLimit, State, rejection::JsonRejection},
	http::StatusCode,
	response::{IntoResponse, Response},
	routing::{get, post},
};
use serde::Serialize;

use crate::state::AppState;
use anima_service::{
	CollectionRequest, DeleteBatchRequest, DeleteCollectionRequest, DeleteCollectionResponse,
	DeleteRequest, DeleteResponse, Error as ServiceError, ExistsResponse, ExportRequest,
	ExportResponse, ImportRequest, ImportResponse, InsertRequest, InsertResponse, MergeRequest,
	MergeResponse, QueryRequest, QueryResponse, RebuildRequest, RebuildResponse,
	TestConnectionRequest, TestConnectionResponse, ViewResponse,
};

/// Archives travel base64-encoded inside JSON bodies.
const MAX_BODY_BYTES: usize = 256 * 1024 * 1024;

type Payload<T> = Result<Json<T>, JsonRejection>;

/// Routes nested under `mount_path`. An empty mount path serves them from the root.
pub fn app(state: AppState, mount_path: &str) -> Router {
	let routes = router(state);

	if mount_path.is_empty() { routes } else { Router::new().nest(mount_path, routes) }
}

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/insert", post(insert))
		.route("/query", post(query))
		.route("/list", get(list))
		.route("/view_collection", post(view_collection))
		.route("/delete", post(delete))
		.route("/delete_batch", post(delete_batch))
		.route("/delete_collection", post(delete_collection))
		.route("/merge", post(merge))
		.route("/rebuild_collection", post(rebuild_collection))
		.route("/export_collection", post(export_collection))
		.route("/import_collection", post(import_collection))
		.route("/check_collection_exists", post(check_collection_exists))
		.route("/test_connection", post(test_connection))
		.layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
		.with_state(state)
}

async fn health() -> StatusCode {
	StatusCode::OK
}

async fn insert(
	State(state): State<AppState>,
	payload: Payload<InsertRequest>,
) -> Result<Json<InsertResponse>, ApiError> {
	let Json(payload) = payload?;
	let response = state.service.insert(payload).await?;

	Ok(Json(response))
}

async fn query(
	State(state): State<AppState>,
	payload: Payload<QueryRequest>,
) -> Result<Json<QueryResponse>, ApiError> {
	let Json(payload) = payload?;
	let response = state.service.query(payload).await?;

	Ok(Json(response))
}

async fn list(State(state): State<AppState>) -> Result<Json<Vec<String>>, ApiError> {
	let response = state.service.list().await?;

	Ok(Json(response))
}

async fn view_collection(
	State(state): State<AppState>,
	payload: Payload<CollectionRequest>,
) -> Result<Json<ViewResponse>, ApiError> {
	let Json(payload) = payload?;
	let response = state.service.view(payload).await?;

	Ok(Json(response))
}

async fn delete(
	State(state): State<AppState>,
	payload: Payload<DeleteRequest>,
) -> Result<Json<DeleteResponse>, ApiError> {
	let Json(payload) = payload?;
	let response = state.service.delete(payload).await?;

	Ok(Json(response))
}

async fn delete_batch(
	State(state): State<AppState>,
	payload: Payload<DeleteBatchRequest>,
) -> Result<Json<DeleteResponse>, ApiError> {
	let Json(payload) = payload?;
	let response = state.service.delete_batch(payload).await?;

	Ok(Json(response))
}

async fn delete_collection(
	State(state): State<AppState>,
	payload: Payload<DeleteCollectionRequest>,
) -> Result<Json<DeleteCollectionResponse>, ApiError> {
	let Json(payload) = payload?;
	let response = state.service.delete_collection(payload).await?;

	Ok(Json(response))
}

async fn merge(
	State(state): State<AppState>,
	payload: Payload<MergeRequest>,
) -> Result<Json<MergeResponse>, ApiError> {
	let Json(payload) = payload?;
	let response = state.service.merge(payload).await?;

	Ok(Json(response))
}

async fn rebuild_collection(
	State(state): State<AppState>,
	payload: Payload<RebuildRequest>,
) -> Result<Json<RebuildResponse>, ApiError> {
	let Json(payload) = payload?;
	let response = state.service.rebuild(payload).await?;

	Ok(Json(response))
}

async fn export_collection(
	State(state): State<AppState>,
	payload: Payload<ExportRequest>,
) -> Result<Json<ExportResponse>, ApiError> {
	let Json(payload) = payload?;
	let response = state.service.export(payload).await?;

	Ok(Json(response))
}

async fn import_collection(
	State(state): State<AppState>,
	payload: Payload<ImportRequest>,
) -> Result<Json<ImportResponse>, ApiError> {
	let Json(payload) = payload?;
	let response = state.service.import(payload).await?;

	Ok(Json(response))
}

async fn check_collection_exists(
	State(state): State<AppState>,
	payload: Payload<CollectionRequest>,
) -> Result<Json<ExistsResponse>, ApiError> {
	let Json(payload) = payload?;
	let response = state.service.exists(payload).await?;

	Ok(Json(response))
}

async fn test_connection(
	State(state): State<AppState>,
	payload: Payload<TestConnectionRequest>,
) -> Result<Json<TestConnectionResponse>, ApiError> {
	let Json(payload) = payload?;
	let response = state.service.test_connection(payload).await?;

	Ok(Json(response))
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: String,
	message: String,
	fields: Option<Vec<String>>,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: String,
	message: String,
	fields: Option<Vec<String>>,
}
impl ApiError {
	fn new(
		status: StatusCode,
		error_code: impl Into<String>,
		message: impl Into<String>,
		fields: Option<Vec<String>>,
	) -> Self {
		Self { status, error_code: error_code.into(), message: message.into(), fields }
	}
}

impl From<ServiceError> for ApiError {
	fn from(err: ServiceError) -> Self {
		let (status, code) = match &err {
			ServiceError::InvalidRequest { .. } => (StatusCode::BAD_REQUEST, "invalid_request"),
			ServiceError::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
			ServiceError::Conflict { .. } => (StatusCode::CONFLICT, "conflict"),
			ServiceError::Provider { .. } => (StatusCode::BAD_GATEWAY, "provider_error"),
			ServiceError::Storage { .. } => {
				tracing::error!(error = %err, "Storage failure while serving request.");

				(StatusCode::INTERNAL_SERVER_ERROR, "storage_error")
			},
		};

		json_error(status, code, err.message(), None)
	}
}

impl From<JsonRejection> for ApiError {
	fn from(rejection: JsonRejection) -> Self {
		json_error(StatusCode::BAD_REQUEST, "invalid_request", rejection.body_text(), None)
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body =
			ErrorBody { error_code: self.error_code, message: self.message, fields: self.fields };

		(self.status, Json(body)).into_response()
	}
}

pub fn json_error(
	status: StatusCode,
	code: &str,
	message: impl Into<String>,
	fields: Option<Vec<String>>,
) -> ApiError {
	ApiError::new(status, code, message, fields)
}
