use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{info, warn};
use video_fetch_api::{AppState, Config, config, cors, router, scratch};

#[tokio::main]
async fn main() {
    // Read `.env` before the subscriber so RUST_LOG from the file applies.
    let dotenv = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(config::log_filter(|name| std::env::var(name).ok()))
        .init();

    match dotenv {
        Ok(path) => info!("Loaded environment from {:?}", path),
        Err(error) if error.not_found() => {}
        Err(error) => warn!("Could not read .env file: {error}"),
    }

    if let Err(error) = run().await {
        eprintln!("Server error: {error:#}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let config = Config::from_env().context("invalid configuration")?;

    scratch::ensure_scratch_dir(&config.scratch_dir)
        .await
        .with_context(|| format!("could not create scratch directory {:?}", config.scratch_dir))?;
    scratch::sweep_stale_files(&config.scratch_dir, config.stale_scratch_secs).await;

    if config.upload_enabled() {
        info!("Upload to object storage enabled.");
    } else {
        warn!("Object storage is not configured; requests with to_s3=true will get 501.");
    }

    let cors = cors::build_cors_layer(&config.allowed_origins)?;
    let addr = config.bind_addr.clone();
    let state = AppState::from_config(config);

    let mut app = router(state);
    if let Some(cors) = cors {
        app = app.layer(cors);
    }

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("could not bind {addr}"))?;

    info!("Video fetch API listening on http://{addr}");

    axum::serve(listener, app)
        .await
        .context("HTTP server error")
}
