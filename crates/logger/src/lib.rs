use std::env;

use tracing::level_filters::LevelFilter;
use tracing_subscriber::{filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt, Layer};

/// Initialize the global tracing subscriber at INFO by default;
/// `RUST_LOG` overrides per target, `RUST_LOG_FORMAT=json` switches to
/// structured output.
pub fn init() {
    init_with(LevelFilter::INFO);
}

pub fn init_with(level: LevelFilter) {
    let env_filter = EnvFilter::builder().with_default_directive(level.into()).from_env_lossy();

    let format = env::var("RUST_LOG_FORMAT").unwrap_or_default();
    let layer = match format.as_str() {
        "json" => tracing_subscriber::fmt::layer().json().with_filter(env_filter).boxed(),
        _ => tracing_subscriber::fmt::layer()
            .compact()
            .with_target(true)
            .with_filter(env_filter)
            .boxed(),
    };

    tracing_subscriber::registry().with(layer).init();
}
