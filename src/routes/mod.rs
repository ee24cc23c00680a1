use axum::http::HeaderValue;
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, post},
    Router,
};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::{auth::AuthenticatedUser, state::AppState};

pub mod affiliates;
pub mod documents;
pub mod folders;
pub mod health;
pub mod officers;

/// Room for the multipart framing and metadata part on top of the file.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

pub fn create_router(state: AppState) -> Router<()> {
    let allow_origin = match state.config.cors_allowed_origin.as_ref() {
        Some(origins) => {
            let headers: Vec<HeaderValue> = origins
                .split(',')
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .filter_map(|value| match value.parse::<HeaderValue>() {
                    Ok(header) => Some(header),
                    Err(err) => {
                        tracing::warn!(origin = value, error = %err, "ignoring invalid CORS origin");
                        None
                    }
                })
                .collect();
            AllowOrigin::list(headers)
        }
        None => AllowOrigin::mirror_request(),
    };
    let cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true);

    let documents_routes = Router::new()
        .route(
            "/",
            get(documents::search_documents).post(documents::upload_document),
        )
        .route("/statuses/refresh", post(documents::refresh_statuses))
        .route(
            "/:id",
            get(documents::get_document)
                .patch(documents::update_document)
                .delete(documents::delete_document),
        )
        .route("/:id/download", get(documents::download_document));

    let folders_routes = Router::new()
        .route("/", post(folders::create_folder))
        .route(
            "/:id",
            get(folders::get_folder).patch(folders::rename_folder),
        );

    let affiliates_routes = Router::new()
        .route(
            "/:affiliate_id/folders/:category_group",
            get(folders::get_root_folder),
        )
        .route("/:affiliate_id/employers", get(affiliates::list_employers))
        .route(
            "/:affiliate_id/officers",
            get(officers::list_officers).post(officers::assign_officer),
        )
        .route(
            "/:affiliate_id/officers/eligible-members",
            get(officers::eligible_members),
        )
        .route(
            "/:affiliate_id/officers/:record_id",
            delete(officers::vacate_officer),
        );

    let body_limit = state
        .config
        .max_upload_bytes
        .saturating_add(MULTIPART_OVERHEAD_BYTES);

    let protected_state = state.clone();
    let protected_routes = Router::new()
        .nest("/api/documents", documents_routes)
        .nest("/api/folders", folders_routes)
        .nest("/api/affiliates", affiliates_routes)
        .layer(middleware::from_extractor_with_state::<AuthenticatedUser, _>(protected_state));

    Router::new()
        .merge(protected_routes)
        .route("/api/health", get(health::health_check))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(body_limit))
}
