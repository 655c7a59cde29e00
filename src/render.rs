//! Plain-text weather card.

use std::fmt::Write;

use chrono::{DateTime, FixedOffset};
use skycard_weather::{moment_of, LocationIdentifiers, Moment, WeatherState};

const TIME_FORMAT: &str = "%H:%M";

fn clock(time: Option<DateTime<FixedOffset>>) -> String {
    time.map(|t| t.format(TIME_FORMAT).to_string())
        .unwrap_or_else(|| "--:--".to_string())
}

pub fn card(
    state: &WeatherState,
    location: &LocationIdentifiers,
    now: DateTime<FixedOffset>,
) -> String {
    let view = &state.view;
    let mut out = String::new();

    let moment = moment_of(view, now);
    let badge = match moment {
        Moment::Day => "☀",
        Moment::Night => "☾",
    };
    let _ = writeln!(out, "{} {} ({})", badge, location.display_city_name, moment);

    if !view.has_data() {
        let _ = writeln!(out, "  {}", if view.is_loading { "Loading…" } else { "No data yet" });
    } else {
        let _ = writeln!(
            out,
            "  {}  {:.1}°C  [{}]",
            view.description,
            view.temperature,
            view.kind().description()
        );
        let _ = writeln!(
            out,
            "  Humidity {:.0}%  Wind {:.1} m/s  Rain {}%  {}",
            view.humidity, view.wind_speed, view.rain_probability, view.comfort_level
        );
        let _ = writeln!(
            out,
            "  Sunrise {}  Sunset {}",
            clock(view.sunrise),
            clock(view.sunset)
        );
        let _ = writeln!(
            out,
            "  Observed at {} {}{}",
            view.location_name,
            clock(view.observation_time),
            if view.is_loading { "  (refreshing…)" } else { "" }
        );
    }

    if let Some(failure) = &state.failure {
        let _ = writeln!(out, "  ! Last refresh failed: {}", failure.message);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use skycard_weather::{resolve, FailureKind, FetchFailure, WeatherViewModel};

    fn at(s: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(s).unwrap()
    }

    fn taipei_state() -> WeatherState {
        WeatherState {
            view: WeatherViewModel {
                observation_time: Some(at("2024-03-01T11:50:00+08:00")),
                location_name: "臺北".into(),
                humidity: 58.0,
                temperature: 22.4,
                wind_speed: 1.4,
                description: "多雲時晴".into(),
                weather_code: 2,
                rain_probability: 10,
                comfort_level: "舒適".into(),
                sunrise: Some(at("2024-03-01T06:00:00+08:00")),
                sunset: Some(at("2024-03-01T18:00:00+08:00")),
                is_loading: false,
            },
            failure: None,
            cycle: 1,
        }
    }

    #[test]
    fn test_card_at_noon() {
        let loc = resolve("臺北市").unwrap();
        let text = card(&taipei_state(), loc, at("2024-03-01T12:00:00+08:00"));
        assert!(text.starts_with("☀ 臺北市 (day)"));
        assert!(text.contains("22.4°C"));
        assert!(text.contains("Rain 10%"));
        assert!(text.contains("Sunrise 06:00  Sunset 18:00"));
        assert!(!text.contains("refreshing"));
    }

    #[test]
    fn test_card_at_night() {
        let loc = resolve("臺北市").unwrap();
        let text = card(&taipei_state(), loc, at("2024-03-01T20:00:00+08:00"));
        assert!(text.starts_with("☾ 臺北市 (night)"));
    }

    #[test]
    fn test_placeholder_and_failure() {
        let loc = resolve("臺北市").unwrap();
        let state = WeatherState {
            view: WeatherViewModel {
                is_loading: false,
                ..WeatherViewModel::default()
            },
            failure: Some(FetchFailure {
                kind: FailureKind::Network,
                source: None,
                message: "Network error: connection refused".into(),
            }),
            cycle: 1,
        };
        let text = card(&state, loc, at("2024-03-01T20:00:00+08:00"));
        assert!(text.contains("No data yet"));
        assert!(text.contains("Last refresh failed: Network error"));
    }
}
