use axum::{
    Router, middleware,
    routing::{get, post},
};

use crate::middleware::require_auth;
use crate::state::AppState;
use crate::{auth, listings, password_reset, users};

/// All API routes. Static file serving and HTTP layers are added by the server.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/forgot-password", post(password_reset::forgot_password))
        .route(
            "/auth/reset-password/{token}",
            get(password_reset::check_reset_token).post(password_reset::reset_password),
        )
        .route("/categories", get(listings::list_categories))
        .route("/listings/{slug}", get(listings::get_listing));

    let protected_routes = Router::new()
        .route("/users/me", get(users::me).patch(users::edit_profile))
        .route("/listings", post(listings::create_listing))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
