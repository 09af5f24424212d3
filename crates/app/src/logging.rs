use anyhow::anyhow;
use tracing_subscriber::EnvFilter;

/// Environment variable selecting the log format (`json` or human-readable).
pub const LOG_FORMAT_ENV: &str = "CADENCE_LOG_FORMAT";

/// Install the global subscriber.
///
/// The filter comes from `RUST_LOG` and defaults to `info`.
pub fn init() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);

    let result = if json_requested(std::env::var(LOG_FORMAT_ENV).ok().as_deref()) {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    result.map_err(|err| anyhow!("failed to install tracing subscriber: {err}"))
}

fn json_requested(format: Option<&str>) -> bool {
    format.is_some_and(|format| format.trim().eq_ignore_ascii_case("json"))
}
