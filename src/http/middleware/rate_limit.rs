use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use redis::AsyncCommands;
use tracing::warn;

#[derive(Clone)]
pub struct RateLimitState {
    pub redis_client: redis::Client,
    pub max_per_minute: i64,
}

/// Platform API key when present, otherwise the first forwarded client IP.
pub fn client_key(headers: &HeaderMap) -> String {
    if let Some(api_key) = headers
        .get("X-API-KEY")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
    {
        return format!("key:{api_key}");
    }
    let ip = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or("unknown");
    format!("ip:{ip}")
}

/// Fixed one-minute window. Redis being unreachable lets the request through.
pub async fn enforce(
    State(state): State<RateLimitState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let key = format!(
        "rate:{}:{}",
        client_key(request.headers()),
        chrono::Utc::now().format("%Y%m%d%H%M")
    );

    match state.redis_client.get_multiplexed_async_connection().await {
        Ok(mut conn) => {
            let count: i64 = conn.incr(&key, 1).await.unwrap_or(1);
            let _: bool = conn.expire(&key, 120).await.unwrap_or(false);
            if count > state.max_per_minute {
                return Response::builder()
                    .status(StatusCode::TOO_MANY_REQUESTS)
                    .body(Body::from("rate limit exceeded"))
                    .unwrap_or_else(|_| Response::new(Body::from("rate limit exceeded")));
            }
        }
        Err(e) => warn!(error = %e, "rate limiter unavailable"),
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn api_key_wins_over_ip() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("10.0.0.1, 10.0.0.2"));
        assert_eq!(client_key(&headers), "ip:10.0.0.1");
        headers.insert("X-API-KEY", HeaderValue::from_static("pk_live"));
        assert_eq!(client_key(&headers), "key:pk_live");
    }
}
