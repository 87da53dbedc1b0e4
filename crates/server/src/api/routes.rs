use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use super::middleware::{auth_middleware, hide_working_files, metrics_middleware};
use super::{downloads, handlers};
use crate::metrics::{collect_dynamic_metrics, encode_metrics};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let pipeline = state.coordinator().config();
    let output_dir = pipeline.output_dir.clone();
    let public_path = pipeline.public_path.trim_end_matches('/').to_string();

    // API routes
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        // Pipeline status
        .route("/status", get(handlers::get_status))
        .route("/jobs/{id}", get(handlers::get_job))
        // Downloads
        .route("/download", post(downloads::download))
        .route("/download/stream", get(downloads::stream))
        .route("/download/size", get(downloads::size))
        .route("/download/info", get(downloads::info))
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            auth_middleware,
        ))
        .with_state(Arc::clone(&state));

    let metrics_state = Arc::clone(&state);
    let metrics_route = get(move || {
        let state = Arc::clone(&metrics_state);
        async move {
            collect_dynamic_metrics(&state);
            encode_metrics()
        }
    });

    let router = Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", metrics_route);

    // Artifacts are served from the output directory under the public path.
    let artifacts = Router::new()
        .fallback_service(ServeDir::new(output_dir))
        .layer(middleware::from_fn(hide_working_files));
    let router = if public_path.is_empty() {
        router.fallback_service(artifacts)
    } else {
        router.nest_service(&public_path, artifacts)
    };

    router
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
