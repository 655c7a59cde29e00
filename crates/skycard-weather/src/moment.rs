//! Day/night classification.

use chrono::{DateTime, FixedOffset};

use crate::types::{Moment, WeatherViewModel};

/// Day when `sunrise <= now <= sunset`, night otherwise.
///
/// Instants are compared absolutely, so the offsets of the three values
/// need not agree.
pub fn classify(
    sunrise: DateTime<FixedOffset>,
    sunset: DateTime<FixedOffset>,
    now: DateTime<FixedOffset>,
) -> Moment {
    if sunrise <= now && now <= sunset {
        Moment::Day
    } else {
        Moment::Night
    }
}

/// Classify `now` against a view model. Placeholders without sun times read as day.
pub fn moment_of(view: &WeatherViewModel, now: DateTime<FixedOffset>) -> Moment {
    match (view.sunrise, view.sunset) {
        (Some(sunrise), Some(sunset)) => classify(sunrise, sunset, now),
        _ => Moment::Day,
    }
}
