//! cli::logging
//!
//! Structured logging for library diagnostics.
//!
//! User-facing messages go through [`crate::ui::output`]; this subscriber
//! only carries the `tracing` events emitted by the git, forge and publish
//! layers. The filter comes from `AUTOPROPOSE_LOG` and defaults to `warn`,
//! or `debug` with `--debug`. Output goes to stderr.
//!
//! ```bash
//! AUTOPROPOSE_LOG=autopropose::publish=debug ap run <url> <script>
//! ```

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable holding the log filter.
pub const LOG_ENV: &str = "AUTOPROPOSE_LOG";

/// Install the global subscriber. Later calls are no-ops.
pub fn init(debug: bool) {
    let default = if debug { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .try_init();
}
