//! Maps weather-crate errors to `skycard_core::AppError` for user-facing messages.

use skycard_core::{AppError, ReqwestErrorExt, WeatherError as CoreWeatherError};
use skycard_weather::WeatherError;

pub fn weather_to_app_error(e: WeatherError) -> AppError {
    match e {
        WeatherError::Network(err) => AppError::Network(err.into_network_error()),
        WeatherError::Http {
            status: 401 | 403, ..
        } => AppError::Weather(CoreWeatherError::InvalidApiKey),
        WeatherError::Http { status, .. } if status >= 500 => {
            AppError::Weather(CoreWeatherError::ServiceUnavailable)
        }
        e @ WeatherError::Http { .. } => AppError::Weather(CoreWeatherError::ApiError(e.to_string())),
        WeatherError::Shape { origin, detail } => AppError::Weather(
            CoreWeatherError::UnexpectedData(format!("{}: {}", origin, detail)),
        ),
        WeatherError::Client(s) => AppError::Weather(CoreWeatherError::ApiError(s)),
        e @ (WeatherError::Cancelled | WeatherError::Superseded) => AppError::Other(e.into()),
    }
}
