#![warn(clippy::pedantic)]
#![warn(clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use log::info;
use oauth_agent::{
    handlers::{configure_services, request_validation::TOKEN_HANDLER_VERSION_HEADER},
    oauth::{IdTokenValidationConfig, IdTokenValidator, JwksCache, TokenClient},
    session::CookieFactory,
    settings::OAuthAgentSettings,
    VERSION,
};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load configuration from Settings.toml and environment variables
    // This also loads .env file and initializes the logger
    let settings = OAuthAgentSettings::load()
        .map_err(|e| std::io::Error::other(format!("Failed to load settings: {e}")))?;
    settings
        .validate()
        .map_err(|e| std::io::Error::other(format!("Invalid settings: {e}")))?;

    let jwks_cache = JwksCache::from_settings(&settings.oauth)
        .map_err(|e| std::io::Error::other(format!("Failed to create JWKS cache: {e}")))?;
    let validator = IdTokenValidator::new(
        IdTokenValidationConfig::from_settings(&settings.oauth),
        Arc::new(jwks_cache),
    );
    let token_client = TokenClient::new(&settings.oauth)
        .map_err(|e| std::io::Error::other(format!("Failed to create token client: {e}")))?;
    let cookie_factory = CookieFactory::from_settings(&settings);

    start_server(settings, cookie_factory, token_client, validator).await
}

/// Start the HTTP server
///
/// # Errors
///
/// Returns an error if:
/// - Server binding fails
/// - Server fails to start
async fn start_server(
    settings: OAuthAgentSettings,
    cookie_factory: CookieFactory,
    token_client: TokenClient,
    validator: IdTokenValidator,
) -> std::io::Result<()> {
    let bind_address = settings.get_bind_address();
    print_startup_info(&bind_address, &settings);

    let trusted_origins = settings.get_trusted_web_origins();
    let endpoints_prefix = settings.endpoints_prefix().to_string();

    let settings = web::Data::new(settings);
    let cookie_factory = web::Data::new(cookie_factory);
    let token_client = web::Data::new(token_client);
    let validator = web::Data::new(validator);

    HttpServer::new(move || {
        let trusted_origins = trusted_origins.clone();
        let endpoints_prefix = endpoints_prefix.clone();
        let cors = Cors::default()
            .allowed_origin_fn(move |origin, _| {
                trusted_origins
                    .iter()
                    .any(|allowed| allowed == origin.to_str().unwrap_or(""))
            })
            .allowed_methods(vec!["GET", "POST", "OPTIONS"])
            .allowed_headers(vec![TOKEN_HANDLER_VERSION_HEADER, "Content-Type", "Accept"])
            .supports_credentials()
            .max_age(3600);

        App::new()
            .app_data(settings.clone())
            .app_data(cookie_factory.clone())
            .app_data(token_client.clone())
            .app_data(validator.clone())
            .wrap(cors)
            .wrap(Logger::default())
            .configure(|cfg| configure_services(cfg, &endpoints_prefix))
    })
    .bind(&bind_address)?
    .run()
    .await
}

fn print_startup_info(bind_address: &str, settings: &OAuthAgentSettings) {
    let prefix = settings.endpoints_prefix();
    info!("Starting OAuth agent v{VERSION} on http://{bind_address}");
    info!("Public base URL: {}", settings.application.base_url);
    info!("Authorization server issuer: {}", settings.oauth.issuer);
    info!("Trusted web origins: {}", settings.get_trusted_web_origins().join(", "));
    info!("Agent endpoints:");
    info!("  POST {prefix}/login/start - Start a login, returns the authorization request URL");
    info!("  POST {prefix}/login/end   - Finish a login or report the session on page load");
    info!("  GET  {prefix}/session     - Current session and ID token claims");
    info!("  POST {prefix}/refresh     - Refresh the access token cookie");
    info!("  POST {prefix}/logout      - Remove the token cookies, returns the end-session URL");
    info!("System endpoints:");
    info!("  GET  /ping - Health check");
}
