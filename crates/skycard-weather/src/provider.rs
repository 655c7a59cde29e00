//! CWA open-data client.

use std::time::Duration;

use chrono::NaiveDate;
use reqwest::Client;
use tracing::instrument;

use crate::extract::{extract_forecast, extract_observation, extract_sun_times};
use crate::retry::{with_retry, RetryConfig};
use crate::types::{ForecastFragment, ObservationFragment, Source, SunTimesFragment, WeatherError};

pub const CWA_API_BASE: &str = "https://opendata.cwa.gov.tw/api/v1/rest/datastore";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
const USER_AGENT: &str = concat!("skycard/", env!("CARGO_PKG_VERSION"));

/// Fetches one dataset per call and hands the body to the matching extractor.
#[derive(Debug, Clone)]
pub struct WeatherProvider {
    client: Client,
    api_key: String,
    base_url: String,
    retry: RetryConfig,
}

impl WeatherProvider {
    pub fn new(api_key: &str, timeout: Duration) -> Result<Self, WeatherError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            api_key: api_key.to_string(),
            base_url: CWA_API_BASE.to_string(),
            retry: RetryConfig::default(),
        })
    }

    /// Point the client at another host (a mirror, or a mock server in tests).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Current observation for a weather station.
    #[instrument(skip(self), level = "debug")]
    pub async fn fetch_observation(&self, station: &str) -> Result<ObservationFragment, WeatherError> {
        let url = self.dataset_url(
            Source::Observation,
            &[("locationName", station)],
        );
        let body = self.get(Source::Observation, &url).await?;
        extract_observation(&body, station)
    }

    /// Current slot of the 36-hour city forecast.
    #[instrument(skip(self), level = "debug")]
    pub async fn fetch_forecast(&self, city: &str) -> Result<ForecastFragment, WeatherError> {
        let url = self.dataset_url(Source::Forecast, &[("locationName", city)]);
        let body = self.get(Source::Forecast, &url).await?;
        extract_forecast(&body, city)
    }

    /// Sunrise and sunset for a county on `date`.
    #[instrument(skip(self), level = "debug")]
    pub async fn fetch_sun_times(
        &self,
        county: &str,
        date: NaiveDate,
    ) -> Result<SunTimesFragment, WeatherError> {
        let date_param = date.format("%Y-%m-%d").to_string();
        let url = self.dataset_url(
            Source::SunriseSunset,
            &[("CountyName", county), ("Date", &date_param)],
        );
        let body = self.get(Source::SunriseSunset, &url).await?;
        extract_sun_times(&body, county, date)
    }

    fn dataset_url(&self, source: Source, params: &[(&str, &str)]) -> String {
        let mut url = format!(
            "{}/{}?Authorization={}",
            self.base_url,
            source.dataset(),
            urlencoding::encode(&self.api_key)
        );
        for (key, value) in params {
            url.push_str(&format!("&{}={}", key, urlencoding::encode(value)));
        }
        url
    }

    async fn get(&self, source: Source, url: &str) -> Result<String, WeatherError> {
        let response = with_retry(&self.retry, || self.client.get(url).send()).await?;
        let status = response.status();

        if !status.is_success() {
            tracing::warn!("{} request returned {}", source, status);
            return Err(WeatherError::Http {
                origin: source,
                status: status.as_u16(),
            });
        }

        Ok(response.text().await?)
    }
}
