pub mod auth;
pub mod convert;
pub mod error;
pub mod images;
pub mod listings;
pub mod location;
pub mod messages;
pub mod middleware;
pub mod wardrobes;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{get, patch, post, put},
};
use tower::Layer;
use tower_http::cors::CorsLayer;
use tower_http::normalize_path::{NormalizePath, NormalizePathLayer};
use tower_http::trace::TraceLayer;
use tracing::error;

use rewear_db::Database;

use crate::auth::AppState;
use crate::error::ApiError;

/// Run blocking DB work off the async runtime.
pub(crate) async fn run_db<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(anyhow::anyhow!("database task failed"))
        })?
        .map_err(ApiError::Internal)
}

/// All HTTP routes. Owner-scoped routes sit behind `require_auth`.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/public-listings", get(listings::public_listings))
        .route("/media/listings/{file_name}", get(images::listing_image))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/wardrobes", get(wardrobes::list_wardrobes).post(wardrobes::create_wardrobe))
        .route("/listings", get(listings::list_listings).post(listings::create_listing))
        .route(
            "/listings/{listing_id}/image",
            put(images::upload_listing_image).layer(DefaultBodyLimit::max(images::MAX_IMAGE_BYTES)),
        )
        .route("/nearby-listings", get(listings::nearby_listings))
        .route("/messages", get(messages::list_messages).post(messages::send_message))
        .route("/messages/{message_id}", patch(messages::update_message))
        .route("/inbox", get(messages::inbox))
        .route("/user-location", get(location::get_location).post(location::report_location))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ))
        .with_state(state);

    Router::new().merge(public_routes).merge(protected_routes)
}

/// The served application: `router` plus CORS, request tracing and
/// trailing-slash normalization, so `/listings/` and `/listings` match.
pub fn app(state: AppState) -> NormalizePath<Router> {
    let router = router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());
    NormalizePathLayer::trim_trailing_slash().layer(router)
}
