//! Tracing subscriber setup driven by the `[log]` config section.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LogConfig;

/// Installs the global subscriber. `RUST_LOG` wins over the configured
/// level so ad-hoc debugging does not need a config edit.
pub fn init(cfg: &LogConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cfg.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt = tracing_subscriber::fmt::layer()
        .with_file(cfg.with_caller)
        .with_line_number(cfg.with_caller);

    if cfg.disable_console {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt.with_writer(std::io::sink))
            .init();
    } else {
        tracing_subscriber::registry().with(filter).with(fmt).init();
    }
}
