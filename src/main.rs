use reqwest::Client;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;
use vacancy_backend::{
    config::{get_config, init_config, LogFormat},
    database::pool::{create_pool, run_migrations},
    routes,
    services::feed_service::ExternalFeedService,
    AppState,
};

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => {
            tracing::error!(error = ?e, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_config()?;
    let config = get_config();
    init_tracing(config.log_format);

    let pool = create_pool().await?;
    run_migrations(&pool).await?;

    let mut app_state = AppState::new(pool);

    if let Some(feed_url) = &config.external_feed_url {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;
        let feed = ExternalFeedService::new(http_client, feed_url.clone());
        app_state = app_state.with_feed(feed.clone());

        let state = app_state.clone();
        let interval = Duration::from_secs(config.feed_sync_interval_secs.max(1));
        info!(feed_url = %feed_url, ?interval, "Starting external vacancy feed worker");
        tokio::spawn(async move {
            loop {
                if let Err(e) = feed.sync(&state.vacancy_service).await {
                    tracing::error!(error = ?e, "External vacancy feed sync failed");
                }
                tokio::time::sleep(interval).await;
            }
        });
    } else {
        info!("EXTERNAL_FEED_URL not set, feed worker disabled");
    }

    let app = routes::router(app_state);

    let addr: SocketAddr = config.server_address.parse()?;
    info!("Server listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
