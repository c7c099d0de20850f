//! Logger setup for binaries and tests embedding the crate.

/// Environment variable holding the log filter, e.g. `redeem_linear=debug`.
pub const LOG_ENV: &str = "REDEEM_LINEAR_LOG";

/// Install an `env_logger` logger, `info` unless `REDEEM_LINEAR_LOG` says
/// otherwise. Calls after the first (or after another logger was
/// installed) are no-ops.
pub fn init_logging() {
    let _ = env_logger::Builder::default()
        .parse_env(env_logger::Env::default().filter_or(LOG_ENV, "info"))
        .try_init();
}
