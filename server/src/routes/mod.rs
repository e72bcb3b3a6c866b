//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! The relay exposes a single websocket endpoint plus a health check. All
//! scene traffic flows over `/ws`; HTTP carries nothing else.

pub mod ws;

use axum::Router;
use axum::http::{HeaderValue, StatusCode};
use axum::routing::get;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::state::AppState;

/// Relay router: `/ws` upgrade and `/healthz`.
pub fn app(state: AppState) -> Router {
    let cors = cors_layer(state.config.frontend_url.as_deref());

    Router::new()
        .route("/ws", get(ws::handle_ws))
        .route("/healthz", get(healthz))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Allow only `frontend_url` when it is set and valid; any origin otherwise.
fn cors_layer(frontend_url: Option<&str>) -> CorsLayer {
    let origin = match frontend_url.map(HeaderValue::from_str) {
        Some(Ok(value)) => AllowOrigin::exact(value),
        Some(Err(e)) => {
            warn!(error = %e, "cors: FRONTEND_URL is not a valid origin, allowing any");
            AllowOrigin::any()
        }
        None => AllowOrigin::any(),
    };
    CorsLayer::new().allow_origin(origin).allow_methods(Any).allow_headers(Any)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}
