use actix_web::middleware::Logger;
use actix_web::{App, HttpServer};
use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use flight_search::{AppState, MetricsMiddleware, config};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = config::load().context("Failed to load configuration")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.observability.log_filter.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        name = %config.app.name,
        version = %config.app.version,
        environment = %config.app.environment,
        "Starting flight search service"
    );

    let server_config = config.server.clone();
    let state = AppState::build(config).await?;

    let server = HttpServer::new(move || {
        let state = state.clone();
        App::new()
            .wrap(MetricsMiddleware::new(state.metrics.clone()))
            .wrap(Logger::new("%r %s %Dms"))
            .configure(|app| state.configure(app))
    });

    let server = if server_config.workers > 0 {
        server.workers(server_config.workers)
    } else {
        server
    };

    tracing::info!(host = %server_config.host, port = server_config.port, "Listening");

    server
        .bind((server_config.host.as_str(), server_config.port))
        .with_context(|| format!("Failed to bind {}:{}", server_config.host, server_config.port))?
        .run()
        .await
        .context("HTTP server failed")
}
