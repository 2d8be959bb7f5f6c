#![warn(clippy::pedantic)]
#![warn(clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

/// Version of the oauth-agent application
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod errors;
pub mod handlers;
pub mod models;
pub mod oauth;
pub mod session;
pub mod settings;
pub mod utils;

// Testing utilities for unit tests and, through the `testing` feature, integration tests
#[cfg(any(test, feature = "testing"))]
pub mod testing;

/// Re-export commonly used items
pub use errors::OAuthAgentError;
pub use handlers::{configure_services, end_login, get_session, health, logout, refresh_token, start_login};
pub use models::{IdTokenClaims, SessionState, TokenSet};
pub use oauth::{IdTokenValidator, JwksCache, TokenClient};
pub use session::CookieFactory;
pub use settings::OAuthAgentSettings;
