//! End-to-end refresh cycles against a mock CWA server.

use std::sync::Arc;
use std::time::Duration;

use chrono::DateTime;
use skycard_weather::{
    moment_of, resolve, FailureKind, FixedClock, Moment, RetryConfig, Source, WeatherAggregator,
    WeatherCache, WeatherError, WeatherProvider,
};
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn clock() -> Arc<FixedClock> {
    Arc::new(FixedClock(
        DateTime::parse_from_rfc3339("2024-03-01T12:00:00+08:00").unwrap(),
    ))
}

fn provider(server: &MockServer) -> WeatherProvider {
    WeatherProvider::new("CWA-TEST-KEY", Duration::from_secs(5))
        .unwrap()
        .with_base_url(&server.uri())
        .with_retry_config(RetryConfig::none())
}

/// Mount all three datasets for one city; `delay` applies to each response.
async fn mount_city(server: &MockServer, city: &str, station: &str, temperature: &str, delay: Duration) {
    Mock::given(method("GET"))
        .and(path("/O-A0003-001"))
        .and(query_param("locationName", station))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(delay)
                .set_body_json(serde_json::json!({
                    "records": { "location": [{
                        "locationName": station,
                        "time": { "obsTime": "2024-03-01 11:50:00" },
                        "weatherElement": [
                            { "elementName": "TEMP", "elementValue": temperature },
                            { "elementName": "WDSD", "elementValue": "1.4" },
                            { "elementName": "HUMD", "elementValue": "58" }
                        ]
                    }]}
                })),
        )
        .mount(server)
        .await;

    mount_forecast(server, city, delay).await;

    Mock::given(method("GET"))
        .and(path("/A-B0062-001"))
        .and(query_param("CountyName", city))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(delay)
                .set_body_json(serde_json::json!({
                    "records": { "locations": { "location": [{
                        "CountyName": city,
                        "time": [{ "Date": "2024-03-01", "SunRiseTime": "06:00", "SunSetTime": "18:00" }]
                    }]}}
                })),
        )
        .mount(server)
        .await;
}

async fn mount_forecast(server: &MockServer, city: &str, delay: Duration) {
    Mock::given(method("GET"))
        .and(path("/F-C0032-001"))
        .and(query_param("locationName", city))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(delay)
                .set_body_json(serde_json::json!({
                    "records": { "location": [{
                        "locationName": city,
                        "weatherElement": [
                            { "elementName": "Wx", "time": [{ "parameter": { "parameterName": "多雲時晴", "parameterValue": "2" } }] },
                            { "elementName": "PoP", "time": [{ "parameter": { "parameterName": "10" } }] },
                            { "elementName": "CI", "time": [{ "parameter": { "parameterName": "舒適" } }] }
                        ]
                    }]}
                })),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_taipei_cycle_publishes_merged_view() {
    let server = MockServer::start().await;
    mount_city(&server, "臺北市", "臺北", "22.4", Duration::ZERO).await;

    let agg = WeatherAggregator::new(provider(&server), resolve("臺北市").unwrap(), clock());
    let view = agg.refresh_now().await.unwrap();

    assert_eq!(view.temperature, 22.4);
    assert_eq!(view.humidity, 58.0);
    assert_eq!(view.wind_speed, 1.4);
    assert_eq!(view.description, "多雲時晴");
    assert_eq!(view.weather_code, 2);
    assert_eq!(view.rain_probability, 10);
    assert_eq!(view.comfort_level, "舒適");
    assert!(!view.is_loading);

    let state = agg.current();
    assert_eq!(state.view, view);
    assert!(state.failure.is_none());
    assert_eq!(state.cycle, 1);

    let noon = DateTime::parse_from_rfc3339("2024-03-01T12:00:00+08:00").unwrap();
    let evening = DateTime::parse_from_rfc3339("2024-03-01T20:00:00+08:00").unwrap();
    assert_eq!(moment_of(&state.view, noon), Moment::Day);
    assert_eq!(moment_of(&state.view, evening), Moment::Night);
}

#[tokio::test]
async fn test_loading_published_before_fetch_completes() {
    let server = MockServer::start().await;
    mount_city(&server, "臺北市", "臺北", "22.4", Duration::from_millis(300)).await;

    let agg = WeatherAggregator::new(provider(&server), resolve("臺北市").unwrap(), clock());
    let handle = agg.refresh();
    assert!(agg.current().view.is_loading);

    handle.await.unwrap().unwrap();
    assert!(!agg.current().view.is_loading);
}

#[tokio::test]
async fn test_newer_city_wins_over_slow_older_cycle() {
    let server = MockServer::start().await;
    mount_city(&server, "臺北市", "臺北", "22.4", Duration::from_millis(800)).await;
    mount_city(&server, "高雄市", "高雄", "27.1", Duration::ZERO).await;

    let agg = WeatherAggregator::new(provider(&server), resolve("臺北市").unwrap(), clock());
    let slow = agg.refresh();
    agg.set_location("高雄市");
    let fast = agg.refresh();

    assert!(matches!(slow.await.unwrap(), Err(WeatherError::Superseded)));
    let view = fast.await.unwrap().unwrap();
    assert_eq!(view.temperature, 27.1);

    let mut rx = agg.subscribe();
    let state = rx.wait_for(|s| !s.view.is_loading).await.unwrap().clone();
    assert_eq!(state.view.location_name, "高雄");
    assert_eq!(state.view.temperature, 27.1);
    assert_eq!(state.cycle, 3);
}

#[tokio::test]
async fn test_failed_cycle_keeps_last_known_good() {
    let server = MockServer::start().await;
    mount_city(&server, "臺北市", "臺北", "22.4", Duration::ZERO).await;

    let agg = WeatherAggregator::new(provider(&server), resolve("臺北市").unwrap(), clock());
    agg.refresh_now().await.unwrap();

    server.reset().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = agg.refresh_now().await.unwrap_err();
    assert!(matches!(err, WeatherError::Http { status: 503, .. }));

    let state = agg.current();
    assert_eq!(state.view.temperature, 22.4);
    assert!(!state.view.is_loading);
    let failure = state.failure.unwrap();
    assert_eq!(failure.kind, FailureKind::Upstream);
    assert_eq!(state.cycle, 2);
}

#[tokio::test]
async fn test_mismatched_record_is_shape_failure() {
    let server = MockServer::start().await;
    mount_city(&server, "臺北市", "臺北", "22.4", Duration::ZERO).await;
    // Forecast answers with the wrong city.
    Mock::given(method("GET"))
        .and(path("/F-C0032-001"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "records": { "location": [{ "locationName": "新北市", "weatherElement": [] }] }
        })))
        .with_priority(1)
        .mount(&server)
        .await;

    let agg = WeatherAggregator::new(provider(&server), resolve("臺北市").unwrap(), clock());
    let err = agg.refresh_now().await.unwrap_err();
    assert!(matches!(err, WeatherError::Shape { origin: Source::Forecast, .. }));

    let state = agg.current();
    assert!(!state.view.has_data());
    assert!(!state.view.is_loading);
    assert_eq!(state.failure.unwrap().source, Some(Source::Forecast));
}

#[tokio::test]
async fn test_shutdown_cancels_in_flight_cycle() {
    let server = MockServer::start().await;
    mount_city(&server, "臺北市", "臺北", "22.4", Duration::from_secs(5)).await;

    let agg = WeatherAggregator::new(provider(&server), resolve("臺北市").unwrap(), clock());
    let handle = agg.refresh();
    tokio::time::sleep(Duration::from_millis(50)).await;
    agg.shutdown();

    assert!(matches!(handle.await.unwrap(), Err(WeatherError::Cancelled)));
    let state = agg.current();
    assert!(!state.view.has_data());
    assert!(state.failure.is_none());

    assert!(matches!(agg.refresh_now().await, Err(WeatherError::Cancelled)));
    assert_eq!(agg.current().cycle, 1);
}

#[tokio::test]
async fn test_cache_written_and_used_to_seed() {
    let server = MockServer::start().await;
    mount_city(&server, "臺北市", "臺北", "22.4", Duration::ZERO).await;
    let dir = TempDir::new().unwrap();

    let agg = WeatherAggregator::with_cache(
        provider(&server),
        resolve("臺北市").unwrap(),
        clock(),
        WeatherCache::new(dir.path()),
    );
    agg.refresh_now().await.unwrap();
    assert!(dir.path().join("weather_cache.json").exists());

    server.reset().await;
    mount_city(&server, "臺北市", "臺北", "23.0", Duration::from_millis(300)).await;

    let restarted = WeatherAggregator::with_cache(
        provider(&server),
        resolve("臺北市").unwrap(),
        clock(),
        WeatherCache::new(dir.path()),
    );
    let handle = restarted.start();

    let seeded = restarted.current();
    assert!(seeded.view.is_loading);
    assert_eq!(seeded.view.temperature, 22.4);

    let view = handle.await.unwrap().unwrap();
    assert_eq!(view.temperature, 23.0);
}

#[tokio::test]
async fn test_auto_refresh_runs_until_shutdown() {
    let server = MockServer::start().await;
    mount_city(&server, "臺北市", "臺北", "22.4", Duration::ZERO).await;

    let agg = WeatherAggregator::new(provider(&server), resolve("臺北市").unwrap(), clock());
    let ticker = agg.spawn_auto_refresh(Duration::from_millis(20));

    let mut rx = agg.subscribe();
    rx.wait_for(|s| s.cycle >= 2 && !s.view.is_loading).await.unwrap();

    agg.shutdown();
    ticker.await.unwrap();
}
