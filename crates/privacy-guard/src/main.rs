//! Privacy Guard - Main Entry Point

use clap::Parser;
use privacy_guard::{init_logging, init_metrics, DecisionEngine, GuardConfig, PollLoop, SignalHub};
use signal_clients::{create_actuator, ActuatorKind};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "privacy-guard", version, about = "Dim the screen when onlookers can see sensitive content")]
struct Args {
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Face-count API URL
    #[arg(long)]
    face_api_url: Option<String>,

    /// Browser extension central server URL
    #[arg(long)]
    browser_server_url: Option<String>,

    /// Chat completion URL used for sensitivity checks
    #[arg(long)]
    llm_url: Option<String>,

    /// Check interval in seconds
    #[arg(long)]
    check_interval: Option<f64>,

    /// Brightness while dimmed (percent)
    #[arg(long)]
    dimmed_brightness: Option<u8>,

    /// Use a simulated display instead of the real backlight
    #[arg(long)]
    simulate: bool,

    /// Run a single cycle and exit; the original brightness is restored before exiting
    #[arg(long)]
    test_once: bool,
}

impl Args {
    fn apply(self, config: &mut GuardConfig) {
        if let Some(url) = self.face_api_url {
            config.face_api_url = url;
        }
        if let Some(url) = self.browser_server_url {
            config.browser_server_url = url;
        }
        if let Some(url) = self.llm_url {
            config.llm_url = url;
        }
        if let Some(interval) = self.check_interval {
            config.interval_secs = interval;
        }
        if let Some(brightness) = self.dimmed_brightness {
            config.dimmed_brightness = brightness;
        }
        if self.simulate {
            config.actuator = ActuatorKind::Simulated;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let test_once = args.test_once;

    let mut config = GuardConfig::load(args.config.as_deref())?;
    args.apply(&mut config);
    config.validate()?;

    init_logging(&config.log_level, config.log_json);
    info!("=== Privacy Guard v{} ===", env!("CARGO_PKG_VERSION"));
    info!(
        "Face API {}, browser server {}, LLM {}",
        config.face_api_url, config.browser_server_url, config.llm_url
    );

    if let Some(addr) = config.metrics_addr {
        init_metrics(addr)?;
    }

    let actuator = create_actuator(config.actuator).await?;
    let engine = DecisionEngine::new(actuator, config.dimmed_brightness).await;
    let hub = SignalHub::from_config(&config);

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

    let summary = PollLoop::new(engine, hub, config.interval())
        .single_shot(test_once)
        .run(cancel)
        .await;

    if let Some(last) = summary.last.filter(|_| test_once) {
        info!(
            "Test cycle: {} face(s), {:?} ({})",
            last.face_count, last.verdict.decision, last.verdict.reason
        );
    }
    Ok(())
}
