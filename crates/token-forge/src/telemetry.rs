use std::sync::Once;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static INIT: Once = Once::new();

/// Install the global subscriber. Logs go to stderr so stdout stays free for
/// the launch result. `RUST_LOG` overrides the default `info` filter.
pub fn setup_telemetry() {
    INIT.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        let stderr_layer = fmt::Layer::new()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_filter(env_filter);

        tracing_subscriber::registry().with(stderr_layer).init();
    });
}
