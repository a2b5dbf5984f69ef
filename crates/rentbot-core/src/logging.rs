use tracing_subscriber::{fmt, EnvFilter};

use crate::{errors::Error, Result};

/// Initialize tracing for the bot process.
///
/// Default: info for our crates, warn for teloxide and everything else.
/// Can be overridden with `RUST_LOG`.
pub fn init(service_name: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warn,{service_name}=info,rentbot_core=info,rentbot_openai=info,rentbot_telegram=info"
        ))
    });

    // Containers capture stdout; ANSI colors only make `docker compose logs` noisy.
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(false)
        .try_init()
        .map_err(|e| Error::Config(format!("failed to init logging: {e}")))
}
