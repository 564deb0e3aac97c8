use core::time::Duration;

use axum::{
    Router,
    extract::{Request, State},
    http::{
        StatusCode,
        header::{AUTHORIZATION, COOKIE},
    },
    middleware as ax_middleware,
    response::Response,
    routing::{IntoMakeService, get},
};
use tower::ServiceBuilder;
use tower_http::{
    ServiceBuilderExt as _, request_id::MakeRequestUuid, timeout::TimeoutLayer, trace::TraceLayer,
};

use crate::{
    app::AppState,
    http::{
        index, login,
        server::middleware::{LevelAdjustingOnFailure, secure_headers_middleware},
    },
};

/// Creates the application router. Every route lives below `prefix`, which is
/// expected to start and end with `/`.
pub(crate) fn create_app_router(prefix: &str) -> Router<AppState> {
    let mut router = Router::new()
        .route(prefix, get(index::handle_index))
        .route(&format!("{prefix}healthz"), get(healthz))
        .merge(login::routes(prefix));
    // `/kube` serves the index as well as `/kube/`
    let bare_prefix = prefix.trim_end_matches('/');
    if !bare_prefix.is_empty() {
        router = router.route(bare_prefix, get(index::handle_index));
    }
    router.fallback(not_found)
}

async fn healthz() -> &'static str {
    "ok"
}

#[tracing::instrument(skip_all, fields(uri = %req.uri()))]
async fn not_found(State(state): State<AppState>, req: Request) -> Response {
    tracing::debug!(method = %req.method(), "Unhandled request");
    state.renderer.render_error(
        "Page not found.",
        StatusCode::NOT_FOUND,
        state.config.logo_uri_for(None),
        &state.config.web_path_prefix,
    )
}

/// Builds the router with state and the middleware stack applied.
pub(crate) fn create_app_service(app_state: AppState) -> Router<()> {
    let middleware_stack = ServiceBuilder::new()
        .sensitive_headers([AUTHORIZATION, COOKIE])
        .set_x_request_id(MakeRequestUuid)
        .propagate_x_request_id()
        .layer(TraceLayer::new_for_http().on_failure(LevelAdjustingOnFailure))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(30),
        ))
        .layer(ax_middleware::from_fn(secure_headers_middleware));

    create_app_router(&app_state.config.web_path_prefix)
        .with_state(app_state)
        .layer(middleware_stack)
}

pub(crate) fn create_app(app_state: AppState) -> IntoMakeService<Router<()>> {
    create_app_service(app_state).into_make_service()
}
