//! Weather service for SkyCard
//!
//! Fetches current conditions, the city forecast and sunrise/sunset times
//! from the Taiwan Central Weather Administration open-data API and merges
//! them into one view model.

pub mod aggregator;
pub mod cache;
pub mod clock;
pub mod extract;
pub mod location;
pub mod moment;
pub mod provider;
pub mod retry;
pub mod types;

pub use aggregator::WeatherAggregator;
pub use cache::{CachedWeather, WeatherCache};
pub use clock::{Clock, FixedClock, SystemClock};
pub use location::{resolve, resolve_or_default, supported_cities, LocationIdentifiers, DEFAULT_CITY};
pub use moment::{classify, moment_of};
pub use provider::WeatherProvider;
pub use retry::RetryConfig;
pub use types::*;
