// Logging setup: a tracing subscriber writing to stderr, filtered by
// `MOCKFACTORY_LOG` or the `-v` count.

use tracing_subscriber::{fmt, EnvFilter};

/// Environment variable holding a tracing filter directive, e.g. `debug`.
pub const LOG_ENV_VAR: &str = "MOCKFACTORY_LOG";

/// Log to stderr so stdout stays clean for command output.
/// `MOCKFACTORY_LOG` wins over the `-v` count.
pub fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let env_filter =
        EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
