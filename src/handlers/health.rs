use actix_web::HttpResponse;

use crate::models::HealthResponse;
use crate::utils::responses::ResponseBuilder;

/// Health check endpoint
pub async fn health() -> HttpResponse {
    ResponseBuilder::ok().json(&HealthResponse {
        status: "ok".to_string(),
        message: "OAuth agent is running".to_string(),
    })
}

/// JSON 404 for paths the agent does not serve
pub async fn not_found() -> HttpResponse {
    ResponseBuilder::not_found()
        .with_message("The requested endpoint does not exist")
        .build()
}
