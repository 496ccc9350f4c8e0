use crate::service::platform_cache::PlatformCache;
use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::warn;

/// Resolves the calling platform from `X-API-KEY`/`X-SECRET-KEY` and hands
/// it to handlers as an `Extension<Platform>`.
pub async fn require_platform(
    State(cache): State<PlatformCache>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let (api_key, secret_key) = {
        let headers = request.headers();
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|h| h.to_str().ok())
                .unwrap_or("")
                .to_string()
        };
        (header("X-API-KEY"), header("X-SECRET-KEY"))
    };

    match cache.authenticate(&api_key, &secret_key).await {
        Ok(platform) => {
            request.extensions_mut().insert(platform);
            next.run(request).await
        }
        Err(e) => {
            warn!(path = %request.uri().path(), error = %e, "platform rejected");
            e.into_response()
        }
    }
}
