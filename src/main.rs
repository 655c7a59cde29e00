mod args;
mod error_mapping;
mod render;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use skycard_core::{
    load_city, save_city, AppError, Config, ConfigError, FilePreferenceStore, PreferenceStore,
};
use skycard_weather::{
    resolve, resolve_or_default, supported_cities, Clock, LocationIdentifiers, RetryConfig,
    SystemClock, WeatherAggregator, WeatherCache, WeatherProvider,
};

use crate::args::Args;
use crate::error_mapping::weather_to_app_error;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    skycard_core::init(args.verbose)?;

    if args.list_cities {
        for loc in supported_cities() {
            println!("{}\t{}", loc.city_name, loc.observation_station_name);
        }
        return Ok(());
    }

    let (config, _) = Config::load_validated(args.config.as_deref())?;
    if resolve(&config.weather.default_city).is_none() {
        tracing::warn!(
            "Config default city {:?} is not supported",
            config.weather.default_city
        );
    }

    let api_key = match config.weather.api_key.clone() {
        Some(key) => key,
        None => {
            let err = AppError::from(ConfigError::MissingSetting("weather.api_key".into()));
            eprintln!("{}", err.user_message());
            return Err(err.into());
        }
    };

    let prefs = FilePreferenceStore::new(&config.config_dir);
    let location = select_location(&prefs, args.city.as_deref(), &config.weather.default_city);
    tracing::info!("SkyCard started for {}", location.city_name);

    let retry = RetryConfig {
        max_retries: config.weather.max_retries,
        ..RetryConfig::default()
    };
    let provider = WeatherProvider::new(&api_key, Duration::from_secs(config.weather.timeout_secs))
        .map_err(weather_to_app_error)?
        .with_base_url(&config.weather.base_url)
        .with_retry_config(retry);

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let aggregator = WeatherAggregator::with_cache(
        provider,
        location,
        clock.clone(),
        WeatherCache::new(&config.config_dir),
    );

    if args.watch {
        let interval = Duration::from_secs(u64::from(config.weather.refresh_minutes) * 60);
        watch(&aggregator, clock.as_ref(), interval).await
    } else {
        once(&aggregator, clock.as_ref()).await
    }
}

/// Pick the city: an explicit `--city` (persisted), else the saved one, else the config default.
fn select_location(
    prefs: &dyn PreferenceStore,
    requested: Option<&str>,
    default_city: &str,
) -> &'static LocationIdentifiers {
    match requested {
        Some(city) => {
            if resolve(city).is_none() {
                let err = AppError::from(skycard_core::WeatherError::UnsupportedCity(city.into()));
                eprintln!("{}", err.user_message());
            }
            let location = resolve_or_default(city);
            if let Err(e) = save_city(prefs, location.city_name) {
                tracing::warn!("Failed to save city: {}", e);
                eprintln!("{}", AppError::from(e).user_message());
            }
            location
        }
        None => resolve_or_default(&load_city(prefs, default_city)),
    }
}

/// One cycle, one card. Exits non-zero if the cycle failed.
async fn once(aggregator: &WeatherAggregator, clock: &dyn Clock) -> Result<()> {
    let outcome = aggregator.start().await.context("Refresh task panicked")?;

    let state = aggregator.current();
    print!("{}", render::card(&state, aggregator.location(), clock.now()));
    aggregator.shutdown();

    match outcome {
        Ok(_) => Ok(()),
        Err(e) => {
            let err = weather_to_app_error(e);
            tracing::error!("{}", err);
            eprintln!("{}", err.user_message());
            Err(err.into())
        }
    }
}

/// Re-render on every settled state until Ctrl-C.
async fn watch(aggregator: &WeatherAggregator, clock: &dyn Clock, interval: Duration) -> Result<()> {
    let mut rx = aggregator.subscribe();
    let _first = aggregator.start();
    let ticker = (!interval.is_zero()).then(|| aggregator.spawn_auto_refresh(interval));

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, shutting down");
                break;
            }
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = rx.borrow_and_update().clone();
                if !state.view.is_loading {
                    println!("{}", render::card(&state, aggregator.location(), clock.now()));
                }
            }
        }
    }

    aggregator.shutdown();
    if let Some(ticker) = ticker {
        ticker.await.context("Auto refresh task panicked")?;
    }
    Ok(())
}
