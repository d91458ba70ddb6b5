//! # CaseGuard Binary
//!
//! The entry point that assembles the warranty service from the
//! feature-gated plugin crates.

use std::sync::Arc;

use actix_web::{web, App, HttpServer};
use cg_api::handlers::AppState;
use cg_api::{configure_routes, middleware};
use cg_core::WarrantyService;

#[cfg(feature = "db-sqlite")]
use cg_db_sqlite::{connect, SqliteCodeInventory, SqliteWarrantyStore};

#[cfg(feature = "auth-simple")]
use cg_auth_simple::SimpleAuthProvider;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:caseguard.db?mode=rwc".into());
    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".into());

    // 1. Storage implementation
    #[cfg(feature = "db-sqlite")]
    let pool = connect(&database_url).await?;
    #[cfg(feature = "db-sqlite")]
    let (codes, store) = (
        Arc::new(SqliteCodeInventory::new(pool.clone())),
        Arc::new(SqliteWarrantyStore::new(pool)),
    );

    // 2. Staff identity implementation
    #[cfg(feature = "auth-simple")]
    let auth = match std::env::var("STAFF_ACCOUNTS") {
        Ok(path) => {
            let raw = std::fs::read_to_string(&path)?;
            Arc::new(SimpleAuthProvider::from_json(&raw)?)
        }
        Err(_) => {
            log::warn!("STAFF_ACCOUNTS not set; staff login is disabled");
            Arc::new(SimpleAuthProvider::new(Vec::new()))
        }
    };

    // 3. Wire the core service to the plugins
    let state = web::Data::new(AppState {
        service: WarrantyService::new(codes, store),
        auth,
    });

    log::info!("caseguard listening on http://{bind_addr}");

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(middleware::standard_middleware())
            .wrap(middleware::cors_policy())
            .configure(configure_routes)
    })
    .bind(bind_addr)?
    .run()
    .await?;

    Ok(())
}
