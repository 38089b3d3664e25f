//! HTTP surface over the sprout services.

pub mod auth;
pub mod data;
pub mod devices;
pub mod error;
pub mod middleware;

use axum::{
    Router, middleware as mw,
    routing::{get, post},
};

use sprout_services::Services;

/// All routes, with bearer-token auth on everything but sign-up, login and
/// the password reset flow.
pub fn router(services: Services) -> Router {
    let public_routes = Router::new()
        .route("/users", post(auth::create_user))
        .route("/login", post(auth::login))
        .route("/pw/reset", post(auth::forgot_pw))
        .route("/pw/change", get(auth::change_pw_page).post(auth::change_pw));

    let protected_routes = Router::new()
        .route("/logout", post(auth::logout))
        .route("/devices", get(devices::list_devices))
        .route("/devices/provision", post(devices::create_provision))
        .route(
            "/devices/{device_id}",
            get(devices::get_device).patch(devices::rename_device),
        )
        .route("/devices/{device_id}/latest", get(devices::latest_breadcrumb))
        .route("/data/capacitance", get(data::capacitance))
        .route("/data/temperature", get(data::temperature))
        .layer(mw::from_fn_with_state(
            services.clone(),
            middleware::require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(services)
}
