//! caseguard/crates/cg-api/src/middleware.rs Middleware
//!
//! Request logging and CORS for the JSON API.

use actix_cors::Cors;
use actix_web::middleware::Logger;

// Returns the standard request logger for the CaseGuard API.
pub fn standard_middleware() -> Logger {
    // remote-ip "request-line" status-code response-size "referrer" "user-agent"
    Logger::default()
}

// Configures CORS (Cross-Origin Resource Sharing).
// The registration form is served from a separate origin in development.
pub fn cors_policy() -> Cors {
    Cors::default()
        .allow_any_origin()
        .allow_any_header()
        .allowed_methods(vec!["GET", "POST", "DELETE"])
        .max_age(3600)
}
