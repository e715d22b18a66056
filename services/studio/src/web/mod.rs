pub mod auth;
pub mod middleware;
pub mod protocol;
pub mod public;
pub mod rest;
pub mod state;
pub mod ws_handler;

use axum::{
    middleware as axum_middleware,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;

pub use middleware::require_auth;
pub use rest::ApiDoc;
pub use state::AppState;
pub use ws_handler::ws_handler;

/// Builds the API routes. Admin routes sit behind `require_auth`.
pub fn router(app_state: Arc<AppState>) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/auth/login", post(auth::login_handler))
        .route("/auth/logout", post(auth::logout_handler))
        .route("/public/branding", get(public::public_branding_handler))
        .route("/public/courses/{id}", get(public::public_course_handler));

    // Protected routes (auth required)
    let admin_routes = Router::new()
        .route(
            "/courses",
            get(rest::list_courses_handler).post(rest::create_course_handler),
        )
        .route(
            "/courses/{id}",
            get(rest::get_course_handler)
                .put(rest::update_course_handler)
                .delete(rest::delete_course_handler),
        )
        .route("/courses/{id}/modules", post(rest::add_module_handler))
        .route("/courses/{id}/modules/move", post(rest::move_module_handler))
        .route(
            "/courses/{id}/modules/{module_id}",
            put(rest::update_module_handler).delete(rest::remove_module_handler),
        )
        .route("/courses/{id}/assets", post(rest::add_asset_handler))
        .route(
            "/courses/{id}/assets/{asset_id}",
            delete(rest::remove_asset_handler),
        )
        .route("/courses/{id}/save", post(rest::save_course_handler))
        .route("/courses/{id}/share", get(rest::share_course_handler))
        .route(
            "/branding",
            get(rest::get_branding_handler).put(rest::update_branding_handler),
        )
        .route("/branding/save", post(rest::save_branding_handler))
        .route(
            "/mentor",
            get(rest::get_mentor_handler).put(rest::update_mentor_handler),
        )
        .route("/mentor/save", post(rest::save_mentor_handler))
        .route(
            "/settings/remote",
            get(rest::get_remote_settings_handler).put(rest::update_remote_settings_handler),
        )
        .route("/settings/remote/import-link", post(rest::import_link_handler))
        .route("/analytics", get(rest::analytics_handler))
        .route("/ws", get(ws_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(admin_routes)
        .with_state(app_state)
}
