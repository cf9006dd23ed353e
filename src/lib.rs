pub mod application;
pub mod config;
pub mod db;
pub mod domain;
pub mod errors;
pub mod handlers;
pub mod infrastructure;
pub mod openapi;
pub mod schema;

use std::sync::Arc;

use actix_web::{middleware::Logger, web, App, HttpServer};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use application::dispatch_service::DispatchService;
use application::messenger_service::MessengerService;
use application::order_service::OrderService;
use application::packaging_service::PackagingService;
use domain::ports::FulfillmentRepository;

pub use config::AppConfig;
pub use db::{create_pool, DbPool};
pub use infrastructure::memory::InMemoryFulfillmentRepository;
pub use infrastructure::order_repo::DieselFulfillmentRepository;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Run any pending Diesel migrations against the pool's database.
pub fn run_migrations(pool: &DbPool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut conn = pool.get()?;
    conn.run_pending_migrations(MIGRATIONS)?;
    Ok(())
}

/// Mount every fulfillment route over `repo`.
///
/// Shared by `build_server` and the HTTP tests so both see the same wiring.
pub fn configure(cfg: &mut web::ServiceConfig, repo: Arc<dyn FulfillmentRepository>) {
    cfg.app_data(web::Data::new(OrderService::new(repo.clone())))
        .app_data(web::Data::new(PackagingService::new(repo.clone())))
        .app_data(web::Data::new(DispatchService::new(repo.clone())))
        .app_data(web::Data::new(MessengerService::new(repo)))
        .service(
            web::scope("/orders")
                .route("", web::post().to(handlers::orders::create_order))
                .route(
                    "/lines/{line_id}/quantity",
                    web::put().to(handlers::packaging::change_line_quantity),
                )
                .route(
                    "/lines/{line_id}/reset",
                    web::post().to(handlers::packaging::reset_line),
                )
                .route("/{id}", web::get().to(handlers::orders::get_order))
                .route("/{id}/packaging", web::get().to(handlers::packaging::checklist))
                .route(
                    "/{id}/packaging/start",
                    web::post().to(handlers::packaging::begin_packaging),
                )
                .route(
                    "/{id}/packaging/lines/{line_id}/scan",
                    web::post().to(handlers::packaging::record_scan),
                )
                .route(
                    "/{id}/packaging/complete",
                    web::post().to(handlers::packaging::complete_packaging),
                )
                .route(
                    "/{id}/return-to-packaging",
                    web::post().to(handlers::packaging::return_to_packaging),
                ),
        )
        .service(
            web::scope("/dispatch")
                .route("/board", web::get().to(handlers::dispatch::board))
                .route("/pool", web::get().to(handlers::dispatch::messenger_pool))
                .route(
                    "/orders/{id}/assign",
                    web::post().to(handlers::dispatch::assign),
                ),
        )
        .service(
            web::scope("/messengers/{messenger_id}")
                .route("/orders", web::get().to(handlers::messengers::list_orders))
                .route(
                    "/orders/history",
                    web::get().to(handlers::messengers::delivery_history),
                )
                .route(
                    "/orders/{order_id}/accept",
                    web::post().to(handlers::messengers::accept),
                )
                .route(
                    "/orders/{order_id}/reject",
                    web::post().to(handlers::messengers::reject),
                )
                .route(
                    "/orders/{order_id}/start",
                    web::post().to(handlers::messengers::start_delivery),
                )
                .route(
                    "/orders/{order_id}/complete",
                    web::post().to(handlers::messengers::complete_delivery),
                )
                .route(
                    "/orders/{order_id}/fail",
                    web::post().to(handlers::messengers::fail_delivery),
                ),
        );
}

/// Build and return an actix-web `Server` bound to `host:port`.
///
/// The caller is responsible for `.await`-ing (or `tokio::spawn`-ing) the
/// returned server.
pub fn build_server(
    repo: Arc<dyn FulfillmentRepository>,
    host: &str,
    port: u16,
) -> std::io::Result<actix_web::dev::Server> {
    Ok(HttpServer::new(move || {
        let repo = repo.clone();
        App::new()
            .wrap(Logger::default())
            .configure(move |cfg| configure(cfg, repo))
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-docs/openapi.json", openapi::ApiDoc::openapi()),
            )
    })
    .bind((host.to_string(), port))?
    .run())
}
