// HTTP request handlers for the OAuth agent
pub mod health;
pub mod login;
pub mod logout;
pub mod refresh;
pub mod request_validation;
pub mod session;


use actix_web::web;

// Re-export the main handler functions
pub use health::{health, not_found};
pub use login::{end_login, start_login};
pub use logout::logout;
pub use refresh::refresh_token;
pub use session::get_session;

/// Register the agent routes under `endpoints_prefix` and the health check at `/ping`
pub fn configure_services(cfg: &mut web::ServiceConfig, endpoints_prefix: &str) {
    cfg.route("/ping", web::get().to(health)).service(
        web::scope(endpoints_prefix)
            .route("/login/start", web::post().to(start_login))
            .route("/login/end", web::post().to(end_login))
            .route("/session", web::get().to(get_session))
            .route("/refresh", web::post().to(refresh_token))
            .route("/logout", web::post().to(logout))
            .default_service(web::route().to(not_found)),
    );
}
