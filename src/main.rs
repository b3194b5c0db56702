use anyhow::Context;
use std::{sync::Arc, time::Duration};
use tracing_subscriber::EnvFilter;

use power_predictor::{
    config::ServeConfig,
    remote,
    server::{router, AppState},
    types::FeatureRequest,
    ArtifactBundle, BundleCell, FsArtifactStore, InferencePipeline,
};

static BUNDLE: std::sync::OnceLock<BundleCell> = std::sync::OnceLock::new();

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cfg = ServeConfig::from_env().context("invalid configuration")?;
    tracing::info!(?cfg, "starting");

    let state = match startup(&cfg).await {
        Ok(state) => state,
        Err(e) => {
            tracing::error!(kind = "artifact_unavailable", "cannot serve predictions: {:#}", e);
            return Err(e);
        }
    };
    serve(state, cfg.port).await
}

/// Fetch (if remote), load and warm up. Any failure here is fatal.
async fn startup(cfg: &ServeConfig) -> anyhow::Result<AppState> {
    if let Some(remote_model) = &cfg.remote_model {
        let client = remote::client(Duration::from_secs(cfg.fetch_timeout_secs))?;
        remote::fetch_artifact(&client, remote_model, &cfg.artifact_dir, cfg.fetch_attempts)
            .await
            .context("model download failed")?;
    }

    let store = FsArtifactStore::new(&cfg.artifact_dir).with_model_file(&cfg.model_file);
    let bundle = BUNDLE
        .get_or_init(BundleCell::new)
        .get_or_load(|| ArtifactBundle::load(&store))
        .with_context(|| format!("loading artifacts from {}", cfg.artifact_dir.display()))?;

    tracing::info!(
        "loaded artifacts; columns[{}]: {:?}",
        bundle.schema.len(),
        bundle.schema.columns()
    );

    let pipeline = InferencePipeline::new(bundle, cfg.unknown_category);

    // Warmup with the form defaults and the default description
    let row = FeatureRequest::default().into_row(pipeline.bundle().categories.default_label());
    let warm = pipeline.predict(&row).context("warmup prediction failed")?;
    tracing::info!("warmup ok: {}", warm.display);

    Ok(AppState {
        pipeline: Arc::new(pipeline),
        log_pred: cfg.log_pred,
    })
}

async fn serve(state: AppState, port: u16) -> anyhow::Result<()> {
    let app = router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
