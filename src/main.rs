use evlog::{meta, LogEventConsolePrinter, Logger};
use tokio::net::TcpListener;
use tokio::signal;

use crate::config::Config;
use crate::routes::AppData;
use crate::runtime::{get_logger, set_logger};

mod config;
mod db;
mod error;
mod routes;
mod runtime;
mod support;
mod workflow;

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    let mut logger = Logger::default();
    logger.register(LogEventConsolePrinter::default());
    set_logger(logger);

    let config = Config::load().expect("failed to load configuration");

    let db_client = db::dbclient::shared(&config.database_url, config.max_connections).await
        .expect("failed to connect to database");

    let app = routes::router(AppData::new(db_client));

    let address = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&address).await
        .expect("failed to bind listener");

    get_logger().info("Server running.", meta! {
        "Address" => address,
    });

    if let Err(e) = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await {
        get_logger().error("Server error.", meta! {
            "Error" => e,
        });
    }

    get_logger().info("Server shut down.", meta! {
        "Address" => address,
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => {
                get_logger().info("Received shutdown signal.", meta! {
                    "Signal" => "SIGINT",
                });
            }
            Err(e) => {
                get_logger().error("Failed to listen for Ctrl+C.", meta! {
                    "Error" => e,
                });
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
                get_logger().info("Received shutdown signal.", meta! {
                    "Signal" => "SIGTERM",
                });
            }
            Err(e) => {
                get_logger().error("Failed to install SIGTERM handler.", meta! {
                    "Error" => e,
                });
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
