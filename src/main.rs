use std::io;
use std::sync::Arc;

use dotenvy::dotenv;
use fulfillment_service::{
    build_server, create_pool, run_migrations, AppConfig, DieselFulfillmentRepository,
};

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let config = AppConfig::from_env().map_err(io::Error::other)?;

    let pool = create_pool(&config.database_url, config.db_pool_size).map_err(io::Error::other)?;
    run_migrations(&pool).map_err(io::Error::other)?;

    log::info!(
        "Starting fulfillment service at http://{}:{} (pool size {})",
        config.host,
        config.port,
        config.db_pool_size
    );

    let repo = Arc::new(DieselFulfillmentRepository::new(pool));
    build_server(repo, &config.host, config.port)?.await
}
