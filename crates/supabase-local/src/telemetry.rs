//! Log output for the supabase-local binary.
//!
//! [`init_tracing`] installs the global subscriber. Only the first call in a
//! process takes effect.

use crate::config::RunConfig;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// Filter applied when `RUST_LOG` is unset: `--verbose` lowers it to debug
/// for this crate's modules only, keeping dependency noise at info.
fn default_directives(cfg: &RunConfig) -> &'static str {
    if cfg.verbose {
        "info,supabase_local=debug"
    } else {
        "info"
    }
}

/// Install the global subscriber for a run of `cfg`.
///
/// `json` switches to newline-delimited JSON records. `RUST_LOG`, when set,
/// overrides the verbosity derived from `cfg`.
pub fn init_tracing(cfg: &RunConfig, json: bool) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(cfg)));

    let output = fmt::layer().with_target(false);
    let output = if json {
        output.json().boxed()
    } else {
        output.boxed()
    };

    tracing_subscriber::registry()
        .with(output)
        .with(env_filter)
        .try_init()
        .ok();
}
