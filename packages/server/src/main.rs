#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web API server for the reunite portal.
//!
//! Serves case intake, candidate-match queries, review actions, and the
//! reporting endpoints backing the dashboard. Authentication happens at an
//! upstream boundary; reviewer identity arrives as an opaque string on
//! review requests.

mod handlers;

use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware, web};
use reunite_database::review::MatchReviewer;
use reunite_database::{db, run_migrations};
use reunite_engine::MatchConfig;
use std::sync::Arc;
use switchy_database::Database;

/// Shared application state.
pub struct AppState {
    /// Database connection for queries and intake.
    pub db: Arc<dyn Database>,
    /// Review transaction applier, on its own dedicated connection.
    pub reviewer: Arc<MatchReviewer>,
    /// Scoring policy used when intake triggers candidate scoring.
    pub config: MatchConfig,
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    pretty_env_logger::init_custom_env("RUST_LOG");

    log::info!("Connecting to database...");
    let db_conn = db::connect_from_env()
        .await
        .expect("Failed to connect to database");

    log::info!("Running migrations...");
    run_migrations(db_conn.as_ref())
        .await
        .expect("Failed to run migrations");

    // Review transactions get their own connection so BEGIN/COMMIT never
    // interleave with intake or query statements.
    let review_conn = db::connect_from_env()
        .await
        .expect("Failed to open review connection");

    let state = web::Data::new(AppState {
        db: Arc::from(db_conn),
        reviewer: Arc::new(MatchReviewer::new(review_conn)),
        config: MatchConfig::from_env().expect("Failed to load match config"),
    });

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);

    log::info!("Starting server on {bind_addr}:{port}");

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .service(
                web::scope("/api")
                    .route("/health", web::get().to(handlers::health))
                    .route(
                        "/missing-persons",
                        web::post().to(handlers::create_missing_person),
                    )
                    .route(
                        "/missing-persons",
                        web::get().to(handlers::list_missing_persons),
                    )
                    .route(
                        "/missing-persons/{id}",
                        web::get().to(handlers::get_missing_person),
                    )
                    .route(
                        "/missing-persons/{id}/matches",
                        web::get().to(handlers::person_matches),
                    )
                    .route(
                        "/missing-persons/{id}/close",
                        web::post().to(handlers::close_missing_person),
                    )
                    .route("/uidb", web::post().to(handlers::create_uidb_record))
                    .route("/uidb", web::get().to(handlers::list_uidb_records))
                    .route("/uidb/{id}", web::get().to(handlers::get_uidb_record))
                    .route(
                        "/uidb/{id}/matches",
                        web::get().to(handlers::uidb_matches),
                    )
                    .route(
                        "/uidb/{id}/identify",
                        web::post().to(handlers::identify_uidb_record),
                    )
                    .route(
                        "/matches/{id}/review",
                        web::post().to(handlers::begin_review),
                    )
                    .route(
                        "/matches/{id}/confirm",
                        web::post().to(handlers::confirm_match),
                    )
                    .route(
                        "/matches/{id}/reject",
                        web::post().to(handlers::reject_match),
                    )
                    .route("/stats", web::get().to(handlers::stats))
                    .route(
                        "/analytics/resolution-times",
                        web::get().to(handlers::resolution_times),
                    )
                    .route(
                        "/analytics/monthly-trends",
                        web::get().to(handlers::monthly_trends),
                    ),
            )
    })
    .bind((bind_addr, port))?
    .run()
    .await
}
