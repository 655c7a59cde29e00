pub mod config;
pub mod error;
pub mod prefs;

pub use config::{Config, ValidationResult, WeatherConfig};
pub use error::{
    AppError, ConfigError, NetworkError, ReqwestErrorExt, StorageError, WeatherError,
};
pub use prefs::{load_city, save_city, FilePreferenceStore, MemoryPreferenceStore, PreferenceStore};

use anyhow::Result;

/// Install the tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise the level is `info`, or `debug` when
/// `verbose` is true.
pub fn init(verbose: bool) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install logger: {}", e))?;

    tracing::debug!("SkyCard core initialized");
    Ok(())
}
