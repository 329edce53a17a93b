use std::time::Instant;
use warp::filters::BoxedFilter;
use warp::http::{Method, StatusCode};
use warp::path::FullPath;
use warp::reject::Rejection;
use warp::reply::Response;
use warp::Filter;

struct RequestStart {
    path: String,
    method: Method,
    started: Instant,
}

/// Logs method, path, status and latency of every request answered by
/// `filter`. The wrapped filter is expected to have recovered its own
/// rejections already.
pub fn with_request_logging<F>(filter: F) -> BoxedFilter<(Response,)>
where
    F: Filter<Extract = (Response,), Error = Rejection> + Clone + Send + Sync + 'static,
{
    warp::any()
        .and(warp::path::full())
        .and(warp::method())
        .map(|path: FullPath, method: Method| RequestStart {
            path: path.as_str().to_string(),
            method,
            started: Instant::now(),
        })
        .and(filter)
        .map(|start: RequestStart, response: Response| {
            log_response(
                response.status(),
                &start.path,
                start.method.as_str(),
                start.started.elapsed().as_millis(),
            );
            response
        })
        .boxed()
}

/// Log response with status code
pub fn log_response(status: StatusCode, path: &str, method: &str, duration_ms: u128) {
    let duration_ms = u64::try_from(duration_ms).unwrap_or(u64::MAX);
    if status.is_server_error() {
        tracing::error!(
            status = status.as_u16(),
            path = %path,
            method = %method,
            duration_ms,
            "server error"
        );
    } else if status.is_client_error() {
        tracing::info!(
            status = status.as_u16(),
            path = %path,
            method = %method,
            duration_ms,
            "client error"
        );
    } else {
        tracing::debug!(
            status = status.as_u16(),
            path = %path,
            method = %method,
            duration_ms,
            "response sent"
        );
    }
}
