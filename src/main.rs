use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use event_registration::api::{create_router, AppState};
use event_registration::config::Config;
use event_registration::registration::{
    CloudinaryUploader, InMemoryStore, JsonDirStore, PipelineSettings, ReferralAggregator,
    RegistrationPipeline, RegistrationStore, SmtpNotifier,
};

#[derive(Parser, Debug)]
struct Args {
    #[clap(long, default_value = "config.toml")]
    config: String,

    /// Overrides `[server] bind`
    #[clap(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("event_registration=info,tower_http=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = Args::parse();
    let mut cfg = Config::load(&args.config).context("load config")?;
    if let Some(bind) = args.bind {
        cfg.server.bind = bind;
    }

    let store: Arc<dyn RegistrationStore> = match &cfg.store.data_dir {
        Some(dir) => Arc::new(JsonDirStore::new(dir).await.context("open registration store")?),
        None => {
            info!("No store.data_dir configured, keeping registrations in memory");
            Arc::new(InMemoryStore::new())
        }
    };

    let uploader = CloudinaryUploader::new(cfg.upload.clone()).context("build image uploader")?;
    let notifier = SmtpNotifier::new(&cfg.mail).context("build SMTP notifier")?;

    let pipeline = RegistrationPipeline::new(
        Arc::new(uploader),
        Arc::clone(&store),
        Arc::new(notifier),
        PipelineSettings::from_config(&cfg),
    );
    let leaderboard = ReferralAggregator::new(store, cfg.store.timeout());

    let app = create_router(AppState {
        pipeline: Arc::new(pipeline),
        leaderboard: Arc::new(leaderboard),
    });

    let listener = TcpListener::bind(&cfg.server.bind)
        .await
        .with_context(|| format!("bind {}", cfg.server.bind))?;
    info!("Registration service listening on {}", cfg.server.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serve")?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
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
