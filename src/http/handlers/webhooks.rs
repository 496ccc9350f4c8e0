use crate::error::PaymentError;
use crate::gateways::espay::EspayService;
use crate::service::callbacks::{EspayAck, MidtransNotification, SenangpayCallback};
use crate::AppState;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Form, Json};
use serde::de::DeserializeOwned;

pub async fn midtrans(
    State(state): State<AppState>,
    Json(notification): Json<MidtransNotification>,
) -> impl IntoResponse {
    match state.callbacks.midtrans(notification).await {
        Ok(payment) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "transactionId": payment.transaction_id,
                "status": payment.status,
            })),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn senangpay(
    State(state): State<AppState>,
    Form(callback): Form<SenangpayCallback>,
) -> impl IntoResponse {
    match state.callbacks.senangpay(callback).await {
        Ok(_) | Err(PaymentError::Accepted(_)) => (StatusCode::OK, "OK").into_response(),
        Err(e) => e.into_response(),
    }
}

fn ack(reply: EspayAck) -> Response {
    let status = StatusCode::from_u16(reply.http_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(reply.body)).into_response()
}

/// Signature check and body decoding shared by every Espay endpoint.
async fn espay_body<T: DeserializeOwned>(
    state: &AppState,
    service: EspayService,
    uri: &Uri,
    headers: &HeaderMap,
    body: &Bytes,
) -> Result<T, EspayAck> {
    let header = |name: &str| headers.get(name).and_then(|h| h.to_str().ok()).unwrap_or("");
    match state
        .callbacks
        .verify_espay("POST", uri.path(), body, header("X-TIMESTAMP"), header("X-SIGNATURE"))
        .await
    {
        Ok(()) => {}
        Err(PaymentError::Signature(detail)) => return Err(EspayAck::failure(401, service, "00", &detail)),
        Err(_) => return Err(EspayAck::failure(500, service, "01", "")),
    }
    serde_json::from_slice(body).map_err(|e| EspayAck::failure(400, service, "02", &e.to_string()))
}

pub async fn espay_inquiry(State(state): State<AppState>, uri: Uri, headers: HeaderMap, body: Bytes) -> Response {
    match espay_body(&state, EspayService::Inquiry, &uri, &headers, &body).await {
        Ok(inquiry) => ack(state.callbacks.espay_inquiry(inquiry).await),
        Err(reply) => ack(reply),
    }
}

pub async fn espay_payment(State(state): State<AppState>, uri: Uri, headers: HeaderMap, body: Bytes) -> Response {
    match espay_body(&state, EspayService::Payment, &uri, &headers, &body).await {
        Ok(notification) => ack(state.callbacks.espay_payment(notification).await),
        Err(reply) => ack(reply),
    }
}

pub async fn espay_topup(State(state): State<AppState>, uri: Uri, headers: HeaderMap, body: Bytes) -> Response {
    match espay_body(&state, EspayService::Payment, &uri, &headers, &body).await {
        Ok(notification) => ack(state.callbacks.espay_topup(notification).await),
        Err(reply) => ack(reply),
    }
}
