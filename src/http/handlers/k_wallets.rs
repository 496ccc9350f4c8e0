use crate::service::k_wallet_service::CreateWalletRequest;
use crate::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

pub async fn create_wallet(
    State(state): State<AppState>,
    Json(req): Json<CreateWalletRequest>,
) -> impl IntoResponse {
    match state.wallet_service.create_wallet(req).await {
        Ok(wallet) => (StatusCode::CREATED, Json(wallet)).into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn get_wallet(
    State(state): State<AppState>,
    Path(no_rekening): Path<String>,
) -> impl IntoResponse {
    match state.wallet_service.lookup(&no_rekening).await {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(e) => e.into_response(),
    }
}
