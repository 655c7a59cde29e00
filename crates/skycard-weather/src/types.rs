use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// Weather categories mapped from CWA `Wx` weather codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WeatherKind {
    Thunderstorm,
    #[default]
    Clear,
    CloudyFog,
    Cloudy,
    Fog,
    PartiallyClearWithRain,
    Snowing,
}

impl WeatherKind {
    /// Convert a CWA `Wx` parameter value to a WeatherKind
    pub fn from_code(code: u8) -> Self {
        match code {
            15..=18 | 21 | 22 | 33..=36 | 41 => Self::Thunderstorm,
            1 => Self::Clear,
            25..=28 => Self::CloudyFog,
            2..=7 => Self::Cloudy,
            24 => Self::Fog,
            8..=14 | 19 | 20 | 29..=32 | 38 | 39 => Self::PartiallyClearWithRain,
            23 | 37 | 42 => Self::Snowing,
            _ => Self::Clear, // Unknown codes default to clear
        }
    }

    /// Get a human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            Self::Thunderstorm => "Thunderstorm",
            Self::Clear => "Clear",
            Self::CloudyFog => "Cloudy with fog",
            Self::Cloudy => "Cloudy",
            Self::Fog => "Fog",
            Self::PartiallyClearWithRain => "Partially clear with rain",
            Self::Snowing => "Snowing",
        }
    }
}

/// Day or night at the selected location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Moment {
    #[default]
    Day,
    Night,
}

impl Moment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Moment::Day => "day",
            Moment::Night => "night",
        }
    }
}

impl std::fmt::Display for Moment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The three upstream datasets a refresh cycle reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Observation,
    Forecast,
    SunriseSunset,
}

impl Source {
    /// CWA dataset identifier used in the request path.
    pub fn dataset(&self) -> &'static str {
        match self {
            Source::Observation => "O-A0003-001",
            Source::Forecast => "F-C0032-001",
            Source::SunriseSunset => "A-B0062-001",
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Source::Observation => "observation",
            Source::Forecast => "forecast",
            Source::SunriseSunset => "sunrise/sunset",
        };
        f.write_str(name)
    }
}

/// Fields pulled from the current-observation dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationFragment {
    pub observation_time: DateTime<FixedOffset>,
    pub location_name: String,
    pub temperature: f64,
    pub wind_speed: f64,
    pub humidity: f64,
}

/// Fields pulled from the 36-hour forecast dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastFragment {
    pub description: String,
    pub weather_code: u8,
    pub rain_probability: u8,
    pub comfort_level: String,
}

/// Sunrise and sunset for the requested date.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SunTimesFragment {
    pub sunrise: DateTime<FixedOffset>,
    pub sunset: DateTime<FixedOffset>,
}

/// Reconciled weather state consumed by presentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherViewModel {
    pub observation_time: Option<DateTime<FixedOffset>>,
    pub location_name: String,
    pub humidity: f64,
    pub temperature: f64,
    pub wind_speed: f64,
    pub description: String,
    pub weather_code: u8,
    pub rain_probability: u8,
    pub comfort_level: String,
    pub sunrise: Option<DateTime<FixedOffset>>,
    pub sunset: Option<DateTime<FixedOffset>>,
    pub is_loading: bool,
}

impl Default for WeatherViewModel {
    /// Placeholder shown before the first cycle completes.
    fn default() -> Self {
        Self {
            observation_time: None,
            location_name: String::new(),
            humidity: 0.0,
            temperature: 0.0,
            wind_speed: 0.0,
            description: String::new(),
            weather_code: 0,
            rain_probability: 0,
            comfort_level: String::new(),
            sunrise: None,
            sunset: None,
            is_loading: true,
        }
    }
}

impl WeatherViewModel {
    /// Merge the three per-source fragments into a finished view model.
    pub fn from_fragments(
        observation: ObservationFragment,
        forecast: ForecastFragment,
        sun: SunTimesFragment,
    ) -> Self {
        Self {
            observation_time: Some(observation.observation_time),
            location_name: observation.location_name,
            humidity: observation.humidity,
            temperature: observation.temperature,
            wind_speed: observation.wind_speed,
            description: forecast.description,
            weather_code: forecast.weather_code,
            rain_probability: forecast.rain_probability,
            comfort_level: forecast.comfort_level,
            sunrise: Some(sun.sunrise),
            sunset: Some(sun.sunset),
            is_loading: false,
        }
    }

    /// True once at least one cycle has filled the placeholders.
    pub fn has_data(&self) -> bool {
        self.observation_time.is_some()
    }

    pub fn kind(&self) -> WeatherKind {
        WeatherKind::from_code(self.weather_code)
    }
}

/// Failure categories surfaced to consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Network,
    Upstream,
    Shape,
}

/// Why the latest cycle did not produce new data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchFailure {
    pub kind: FailureKind,
    pub source: Option<Source>,
    pub message: String,
}

/// What the aggregator publishes after every transition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeatherState {
    pub view: WeatherViewModel,
    pub failure: Option<FetchFailure>,
    /// Sequence number of the cycle that last touched this state.
    pub cycle: u64,
}

/// Weather provider errors
#[derive(Debug, thiserror::Error)]
pub enum WeatherError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("{origin} request failed with status {status}")]
    Http { origin: Source, status: u16 },
    #[error("Unexpected {origin} response: {detail}")]
    Shape { origin: Source, detail: String },
    #[error("Refresh cycle cancelled")]
    Cancelled,
    #[error("Refresh cycle superseded by a newer one")]
    Superseded,
    #[error("Client error: {0}")]
    Client(String),
}

impl WeatherError {
    pub(crate) fn shape(origin: Source, detail: impl Into<String>) -> Self {
        Self::Shape {
            origin,
            detail: detail.into(),
        }
    }

    /// Category reported to consumers, or `None` for cancellation outcomes.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::Network(_) | Self::Client(_) => Some(FailureKind::Network),
            Self::Http { .. } => Some(FailureKind::Upstream),
            Self::Shape { .. } => Some(FailureKind::Shape),
            Self::Cancelled | Self::Superseded => None,
        }
    }

    pub fn source(&self) -> Option<Source> {
        match self {
            Self::Http { origin, .. } | Self::Shape { origin, .. } => Some(*origin),
            _ => None,
        }
    }

    pub fn to_failure(&self) -> Option<FetchFailure> {
        self.failure_kind().map(|kind| FetchFailure {
            kind,
            source: self.source(),
            message: self.to_string(),
        })
    }
}
