//! Catch-all handler that forwards admitted requests upstream.

use crate::error::AppError;
use crate::extractors::{Authenticated, ClientIp};
use crate::proxy::Upstream;
use crate::state::AppState;
use axum::{
    body::Body,
    extract::{Request, State},
    response::Response,
};
use gatekeeper_auth::providers::SharedStore;
use http_body_util::{BodyExt, LengthLimitError, Limited};

fn too_large() -> AppError {
    metrics::counter!("gatekeeper_requests_rejected_total", "reason" => "body_too_large").increment(1);
    AppError::payload_too_large("Request body too large")
}

/// Buffer the request body, refusing anything over `max_bytes`.
async fn read_body(request: Request, max_bytes: usize) -> Result<Request, AppError> {
    let (parts, body) = request.into_parts();

    let declared = parts
        .headers
        .get(http::header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    if declared.is_some_and(|len| len > u64::try_from(max_bytes).unwrap_or(u64::MAX)) {
        return Err(too_large());
    }

    let bytes = Limited::new(body, max_bytes)
        .collect()
        .await
        .map_err(|e| {
            if e.is::<LengthLimitError>() {
                too_large()
            } else {
                AppError::bad_request("Failed to read request body")
            }
        })?
        .to_bytes();

    Ok(Request::from_parts(parts, Body::from(bytes)))
}

/// Forward the request to the target, keeping the path below the mount point.
///
/// Mounted under `/protected`, so `/protected/users/1?x=1` reaches the
/// upstream as `<target path>/users/1?x=1`.
///
/// The body is buffered first, up to `max_body_bytes`.
///
/// # Errors
///
/// - 413 if the body is larger than `max_body_bytes`
/// - 502 if the upstream cannot be reached
pub async fn forward<S, U>(
    State(state): State<AppState<S, U>>,
    ClientIp(client_ip): ClientIp,
    Authenticated(ctx): Authenticated,
    request: Request,
) -> Result<Response, AppError>
where
    S: SharedStore,
    U: Upstream,
{
    let suffix = request.uri().path().to_string();
    let method = request.method().clone();

    let request = read_body(request, state.settings.max_body_bytes)
        .await
        .inspect_err(|e| {
            tracing::warn!(
                error = %e,
                path = %suffix,
                user_id = %ctx.identity.user_id,
                "Rejected request body"
            );
        })?;

    let upstream_request = state.director.direct(request, &suffix, client_ip)?;

    let response = state
        .upstream
        .forward(upstream_request)
        .await
        .map_err(|e| {
            metrics::counter!("gatekeeper_upstream_errors_total").increment(1);
            tracing::warn!(
                error = %e,
                method = %method,
                path = %suffix,
                user_id = %ctx.identity.user_id,
                "Upstream request failed"
            );
            AppError::from(e)
        })?;

    tracing::debug!(
        method = %method,
        path = %suffix,
        status = response.status().as_u16(),
        "Proxied request"
    );

    Ok(response)
}
