use crate::domain::payment::{CheckStatusRequest, CreatePaymentRequest};
use crate::domain::platform::Platform;
use crate::repo::query_builder::ListPaymentsQuery;
use crate::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Extension, Json};

pub async fn create_payment(
    State(state): State<AppState>,
    Extension(platform): Extension<Platform>,
    Json(req): Json<CreatePaymentRequest>,
) -> impl IntoResponse {
    match state.payment_service.create(&platform, req).await {
        Ok(resp) => (StatusCode::OK, Json(resp)).into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn check_status(
    State(state): State<AppState>,
    Extension(platform): Extension<Platform>,
    Json(req): Json<CheckStatusRequest>,
) -> impl IntoResponse {
    match state.payment_service.check_status(&platform, &req.transaction_id).await {
        Ok(resp) => (StatusCode::OK, Json(resp)).into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn get_payment(
    State(state): State<AppState>,
    Extension(platform): Extension<Platform>,
    Path(transaction_id): Path<String>,
) -> impl IntoResponse {
    match state.payment_service.detail(&platform, &transaction_id).await {
        Ok(resp) => (StatusCode::OK, Json(resp)).into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn list_payments(
    State(state): State<AppState>,
    Extension(platform): Extension<Platform>,
    Query(query): Query<ListPaymentsQuery>,
) -> impl IntoResponse {
    match state.payment_service.list(&platform, &query).await {
        Ok(page) => (StatusCode::OK, Json(page)).into_response(),
        Err(e) => e.into_response(),
    }
}
