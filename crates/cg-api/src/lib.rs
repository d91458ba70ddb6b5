//! # cg-api
//!
//! The web routing and orchestration layer for CaseGuard.

pub mod handlers;
pub mod middleware;

use actix_web::web;

/// Configures the routes for the warranty service.
///
/// # Developer Note
/// We use a scoped configuration so the main binary can mount the API
/// under a different prefix if it is ever deployed behind a gateway.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            // Staff sessions
            .route("/auth/login", web::post().to(handlers::login))
            .route("/auth/logout", web::post().to(handlers::logout))
            // Public: the registration form and its code pre-check
            .route(
                "/product-codes/check/{code}",
                web::get().to(handlers::check_code),
            )
            .route("/warranty/register", web::post().to(handlers::register))
            .route("/warranty/by-email", web::get().to(handlers::by_email))
            // Partner/admin: lookup and claim
            .route("/warranty/search", web::get().to(handlers::search_warranties))
            .route("/warranty/{id}/claim", web::post().to(handlers::claim))
            // Admin: registration management
            .route("/warranty/reset", web::post().to(handlers::reset_warranties))
            .route("/warranty/{id}/unclaim", web::post().to(handlers::unclaim))
            .route("/warranty/{id}", web::delete().to(handlers::delete_warranty))
            .route("/warranty", web::get().to(handlers::list_warranties))
            // Admin: inventory management
            .route("/product-codes/upload", web::post().to(handlers::upload_codes))
            .route("/product-codes/reset", web::post().to(handlers::reset_codes))
            .route("/product-codes/{id}", web::delete().to(handlers::delete_code))
            .route("/product-codes", web::get().to(handlers::list_codes)),
    );
}
