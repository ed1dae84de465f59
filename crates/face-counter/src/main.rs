//! Face Counter - Main Entry Point

use anyhow::Context;
use clap::Parser;
use face_counter::{
    init_logging, serve, AppState, CountLoop, CountSink, CounterConfig, FaceDetector,
    StillImageSource,
};
use signal_clients::FaceCountClient;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "face-counter", version, about = "Count faces and serve the latest count")]
struct Args {
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Only serve the face-count API
    #[arg(long)]
    api_only: bool,

    /// Image re-read as every frame
    #[arg(long)]
    image: Option<PathBuf>,

    /// ONNX heatmap model
    #[arg(long)]
    model_path: Option<PathBuf>,

    #[arg(long)]
    host: Option<String>,

    #[arg(long)]
    port: Option<u16>,

    #[arg(long)]
    camera_id: Option<u32>,

    /// Publish counts to this endpoint instead of the local API
    #[arg(long)]
    publish_url: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = CounterConfig::load(args.config.as_deref())?;
    if let Some(path) = args.model_path {
        config.model_path = Some(path);
    }
    if let Some(host) = args.host {
        config.api_host = host;
    }
    if let Some(port) = args.port {
        config.api_port = port;
    }
    if let Some(camera_id) = args.camera_id {
        config.camera_id = camera_id;
    }
    if let Some(url) = args.publish_url {
        config.publish_url = Some(url);
    }

    init_logging(&config.log_level, config.log_json);
    info!("=== Face Counter v{} ===", env!("CARGO_PKG_VERSION"));

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupt received, shutting down");
                shutdown.cancel();
            }
            Err(e) => warn!("Could not listen for Ctrl-C: {}", e),
        }
    });

    let state = AppState::shared();
    let listener = tokio::net::TcpListener::bind(config.api_addr())
        .await
        .with_context(|| format!("binding {}", config.api_addr()))?;
    let server = tokio::spawn(serve(listener, state.clone(), cancel.clone()));

    match (args.api_only, args.image) {
        (true, _) => info!("API-only mode"),
        (false, None) => warn!("No --image given; serving the API only"),
        (false, Some(image)) => {
            let detector = FaceDetector::from_path(config.model_path.as_deref(), config.decoder)?;
            let sink: Box<dyn CountSink> = match &config.publish_url {
                Some(url) => Box::new(FaceCountClient::new(url)),
                None => Box::new(state.clone()),
            };
            let counter = CountLoop::new(Arc::new(detector), sink)
                .with_camera_id(config.camera_id)
                .with_publish_interval(config.publish_interval())
                .with_frame_interval(config.frame_interval());

            let mut source = StillImageSource::new(image);
            counter.run(&mut source, cancel.clone()).await;
        }
    }

    server.await??;
    info!("Face counter stopped");
    Ok(())
}
