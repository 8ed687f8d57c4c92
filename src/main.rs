use std::net::SocketAddr;

use foodgram::{api, Cache, Config};
use log::{error, info, warn};
use sqlx::postgres::PgPoolOptions;
use tokio::signal::{
    ctrl_c,
    unix::{signal, SignalKind},
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("Loading configuration...");
    let config = Config::load()?;

    info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Migrations applied");

    let cache = match &config.redis_url {
        Some(url) => match Cache::connect(url).await {
            Ok(cache) => {
                info!("Caching enabled");
                cache
            }
            Err(_) => {
                warn!("Redis unreachable, caching disabled");
                Cache::disabled()
            }
        },
        None => Cache::disabled(),
    };

    let address = SocketAddr::from(([0, 0, 0, 0], config.port));
    let routes = api::routes(api::Context::new(pool, cache, config));

    let (address, server) =
        warp::serve(routes).try_bind_with_graceful_shutdown(address, shutdown_signal())?;
    info!("Server running on {address}");

    server.await;
    info!("Server shut down");

    Ok(())
}

async fn shutdown_signal() {
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install terminate handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c() => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received terminate signal, shutting down"),
    }
}
