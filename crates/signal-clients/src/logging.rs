//! Logging setup shared by the face counter and the privacy guard

use tracing::Level;
use tracing_subscriber::FmtSubscriber;

fn parse_level(level: &str) -> Level {
    level.parse::<Level>().unwrap_or(Level::INFO)
}

/// Initialize logging
pub fn init_logging(level: &str, json: bool) {
    let builder = FmtSubscriber::builder()
        .with_max_level(parse_level(level))
        .with_target(true);

    if json {
        tracing::subscriber::set_global_default(builder.json().finish())
            .expect("Failed to set tracing subscriber");
    } else {
        tracing::subscriber::set_global_default(builder.finish())
            .expect("Failed to set tracing subscriber");
    }
}
