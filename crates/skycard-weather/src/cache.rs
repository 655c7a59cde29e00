//! Last-known-good weather, persisted as JSON in the config directory.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::types::WeatherViewModel;

const CACHE_FILE: &str = "weather_cache.json";

/// Entries older than this are never shown.
pub const CACHE_EXPIRY_HOURS: i64 = 24;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedWeather {
    pub city_name: String,
    pub view: WeatherViewModel,
    pub fetched_at: DateTime<FixedOffset>,
}

impl CachedWeather {
    /// Older than one refresh interval.
    pub fn is_stale(&self, now: DateTime<FixedOffset>, max_age: Duration) -> bool {
        now - self.fetched_at >= max_age
    }

    pub fn is_expired(&self, now: DateTime<FixedOffset>) -> bool {
        self.is_stale(now, Duration::hours(CACHE_EXPIRY_HOURS))
    }
}

#[derive(Debug, Clone)]
pub struct WeatherCache {
    cache_path: PathBuf,
    data: Option<CachedWeather>,
}

impl WeatherCache {
    pub fn new(config_dir: &Path) -> Self {
        Self {
            cache_path: config_dir.join(CACHE_FILE),
            data: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.cache_path
    }

    /// Read the cache file. A missing file leaves the cache empty; a corrupt
    /// one is logged and ignored.
    pub fn load(&mut self) -> Result<()> {
        if !self.cache_path.exists() {
            self.data = None;
            return Ok(());
        }

        let json = fs::read_to_string(&self.cache_path)
            .with_context(|| format!("Failed to read {}", self.cache_path.display()))?;

        self.data = match serde_json::from_str(&json) {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!("Ignoring unreadable weather cache: {}", e);
                None
            }
        };
        Ok(())
    }

    /// Replace the cached entry. Call [`save`](Self::save) to persist it.
    pub fn update(&mut self, city_name: &str, view: &WeatherViewModel, fetched_at: DateTime<FixedOffset>) {
        self.data = Some(CachedWeather {
            city_name: city_name.to_string(),
            view: view.clone(),
            fetched_at,
        });
    }

    pub fn save(&self) -> Result<()> {
        let Some(entry) = &self.data else {
            return Ok(());
        };

        if let Some(parent) = self.cache_path.parent() {
            fs::create_dir_all(parent).context("Failed to create cache directory")?;
        }
        let json = serde_json::to_string_pretty(entry).context("Failed to serialize weather cache")?;
        fs::write(&self.cache_path, json)
            .with_context(|| format!("Failed to write {}", self.cache_path.display()))?;

        tracing::debug!("Saved weather cache for {}", entry.city_name);
        Ok(())
    }

    pub fn get(&self) -> Option<&CachedWeather> {
        self.data.as_ref()
    }

    /// The cached entry, if it belongs to `city_name` and has not expired.
    pub fn get_for(&self, city_name: &str, now: DateTime<FixedOffset>) -> Option<&CachedWeather> {
        self.data
            .as_ref()
            .filter(|entry| entry.city_name == city_name && !entry.is_expired(now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn at(s: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(s).unwrap()
    }

    fn view() -> WeatherViewModel {
        WeatherViewModel {
            location_name: "臺北".into(),
            temperature: 22.4,
            observation_time: Some(at("2024-03-01T11:50:00+08:00")),
            is_loading: false,
            ..WeatherViewModel::default()
        }
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let fetched = at("2024-03-01T12:00:00+08:00");

        let mut cache = WeatherCache::new(dir.path());
        cache.update("臺北市", &view(), fetched);
        cache.save().unwrap();
        assert!(cache.path().exists());

        let mut reloaded = WeatherCache::new(dir.path());
        reloaded.load().unwrap();
        let entry = reloaded.get().unwrap();
        assert_eq!(entry.city_name, "臺北市");
        assert_eq!(entry.view, view());
        assert_eq!(entry.fetched_at, fetched);
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let mut cache = WeatherCache::new(dir.path());
        cache.load().unwrap();
        assert!(cache.get().is_none());
    }

    #[test]
    fn test_corrupt_file_is_ignored() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(CACHE_FILE), "{not json").unwrap();
        let mut cache = WeatherCache::new(dir.path());
        cache.load().unwrap();
        assert!(cache.get().is_none());
    }

    #[test]
    fn test_save_without_data_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let cache = WeatherCache::new(dir.path());
        cache.save().unwrap();
        assert!(!cache.path().exists());
    }

    #[test]
    fn test_get_for_checks_city_and_expiry() {
        let dir = TempDir::new().unwrap();
        let mut cache = WeatherCache::new(dir.path());
        cache.update("臺北市", &view(), at("2024-03-01T12:00:00+08:00"));

        assert!(cache.get_for("臺北市", at("2024-03-01T13:00:00+08:00")).is_some());
        assert!(cache.get_for("高雄市", at("2024-03-01T13:00:00+08:00")).is_none());
        assert!(cache.get_for("臺北市", at("2024-03-02T12:00:00+08:00")).is_none());
    }

    #[test]
    fn test_staleness() {
        let entry = CachedWeather {
            city_name: "臺北市".into(),
            view: view(),
            fetched_at: at("2024-03-01T12:00:00+08:00"),
        };
        let ten_minutes = Duration::minutes(10);
        assert!(!entry.is_stale(at("2024-03-01T12:05:00+08:00"), ten_minutes));
        assert!(entry.is_stale(at("2024-03-01T12:10:00+08:00"), ten_minutes));
        assert!(!entry.is_expired(at("2024-03-01T23:59:00+08:00")));
        assert!(entry.is_expired(at("2024-03-02T12:00:00+08:00")));
    }
}
