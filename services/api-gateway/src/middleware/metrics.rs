use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::time::Instant;

use crate::AppState;

pub async fn metrics_middleware(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let method = request.method().as_str().to_string();
    let started = Instant::now();

    let response = next.run(request).await;

    state
        .metrics
        .record_request(&method, response.status().as_u16(), started.elapsed());
    response
}
