//! Per-dataset response parsing.
//!
//! Each CWA dataset has its own JSON shape. These functions turn a raw
//! response body into a fragment of the view model, and fail with
//! [`WeatherError::Shape`] when the record for the requested location or one
//! of its fields is missing.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::clock::{taipei_datetime, taipei_from_naive};
use crate::types::{ForecastFragment, ObservationFragment, Source, SunTimesFragment, WeatherError};

/// CWA marks instrument gaps with -99 / -990 style values.
const MISSING_VALUE_THRESHOLD: f64 = -98.0;

/// Element value that CWA sends either as a JSON number or a string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Scalar {
    Number(f64),
    Text(String),
}

impl Scalar {
    fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Number(n) => Some(*n),
            Scalar::Text(s) => s.trim().parse().ok(),
        }
    }
}

// ---- O-A0003-001 -----------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ObservationResponse {
    records: ObservationRecords,
}

#[derive(Debug, Deserialize)]
struct ObservationRecords {
    #[serde(default)]
    location: Vec<ObservationLocation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObservationLocation {
    location_name: String,
    time: ObservationTime,
    #[serde(default)]
    weather_element: Vec<ObservationElement>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObservationTime {
    obs_time: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObservationElement {
    element_name: String,
    element_value: Scalar,
}

// ---- F-C0032-001 -----------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    records: ForecastRecords,
}

#[derive(Debug, Deserialize)]
struct ForecastRecords {
    #[serde(default)]
    location: Vec<ForecastLocation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ForecastLocation {
    location_name: String,
    #[serde(default)]
    weather_element: Vec<ForecastElement>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ForecastElement {
    element_name: String,
    #[serde(default)]
    time: Vec<ForecastSlot>,
}

#[derive(Debug, Deserialize)]
struct ForecastSlot {
    parameter: ForecastParameter,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ForecastParameter {
    parameter_name: String,
    parameter_value: Option<String>,
}

// ---- A-B0062-001 -----------------------------------------------------------

#[derive(Debug, Deserialize)]
struct SunResponse {
    records: SunRecords,
}

#[derive(Debug, Deserialize)]
struct SunRecords {
    locations: SunLocations,
}

#[derive(Debug, Deserialize)]
struct SunLocations {
    #[serde(default)]
    location: Vec<SunLocation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SunLocation {
    county_name: String,
    #[serde(default)]
    time: Vec<SunDay>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SunDay {
    date: String,
    sun_rise_time: String,
    sun_set_time: String,
}

fn parse_body<T: DeserializeOwned>(source: Source, body: &str) -> Result<T, WeatherError> {
    serde_json::from_str(body).map_err(|e| WeatherError::shape(source, format!("invalid JSON: {}", e)))
}

/// Pick the single record named `wanted`. Zero or several matches are shape errors.
fn single_match<'a, T>(
    source: Source,
    records: &'a [T],
    wanted: &str,
    name_of: impl Fn(&T) -> &str,
) -> Result<&'a T, WeatherError> {
    let mut matches = records.iter().filter(|r| name_of(r) == wanted);
    match (matches.next(), matches.next()) {
        (Some(record), None) => Ok(record),
        (None, _) => Err(WeatherError::shape(source, format!("no record for {}", wanted))),
        (Some(_), Some(_)) => Err(WeatherError::shape(
            source,
            format!("more than one record for {}", wanted),
        )),
    }
}

fn parse_observation_time(raw: &str) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt);
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .ok()
        .and_then(taipei_from_naive)
}

fn parse_clock_time(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .ok()
}

/// Extract temperature, wind speed and humidity for `station`.
pub fn extract_observation(body: &str, station: &str) -> Result<ObservationFragment, WeatherError> {
    let source = Source::Observation;
    let response: ObservationResponse = parse_body(source, body)?;
    let record = single_match(source, &response.records.location, station, |l| {
        l.location_name.as_str()
    })?;

    let element = |name: &str| -> Result<f64, WeatherError> {
        let value = record
            .weather_element
            .iter()
            .find(|e| e.element_name == name)
            .ok_or_else(|| WeatherError::shape(source, format!("missing element {}", name)))?
            .element_value
            .as_f64()
            .ok_or_else(|| WeatherError::shape(source, format!("{} is not numeric", name)))?;
        if value <= MISSING_VALUE_THRESHOLD {
            return Err(WeatherError::shape(source, format!("{} reported as missing", name)));
        }
        Ok(value)
    };

    let observation_time = parse_observation_time(&record.time.obs_time).ok_or_else(|| {
        WeatherError::shape(source, format!("bad obsTime {:?}", record.time.obs_time))
    })?;

    Ok(ObservationFragment {
        observation_time,
        location_name: record.location_name.clone(),
        temperature: element("TEMP")?,
        wind_speed: element("WDSD")?,
        humidity: element("HUMD")?,
    })
}

/// Parameter of `name` in its first (current) time slot.
fn current_parameter<'a>(
    record: &'a ForecastLocation,
    name: &str,
) -> Result<&'a ForecastParameter, WeatherError> {
    let source = Source::Forecast;
    record
        .weather_element
        .iter()
        .find(|e| e.element_name == name)
        .ok_or_else(|| WeatherError::shape(source, format!("missing element {}", name)))?
        .time
        .first()
        .map(|slot| &slot.parameter)
        .ok_or_else(|| WeatherError::shape(source, format!("{} has no time slots", name)))
}

/// Extract description, weather code, rain probability and comfort for `city`.
pub fn extract_forecast(body: &str, city: &str) -> Result<ForecastFragment, WeatherError> {
    let source = Source::Forecast;
    let response: ForecastResponse = parse_body(source, body)?;
    let record = single_match(source, &response.records.location, city, |l| {
        l.location_name.as_str()
    })?;

    let wx = current_parameter(record, "Wx")?;
    let weather_code = wx
        .parameter_value
        .as_deref()
        .and_then(|v| v.trim().parse::<u8>().ok())
        .ok_or_else(|| WeatherError::shape(source, "Wx has no numeric parameterValue"))?;

    let pop = current_parameter(record, "PoP")?;
    let rain_probability = pop
        .parameter_name
        .trim()
        .parse::<u8>()
        .map_err(|_| WeatherError::shape(source, format!("bad PoP {:?}", pop.parameter_name)))?;

    let ci = current_parameter(record, "CI")?;

    Ok(ForecastFragment {
        description: wx.parameter_name.clone(),
        weather_code,
        rain_probability,
        comfort_level: ci.parameter_name.clone(),
    })
}

/// Extract sunrise and sunset for `county` on `date`.
///
/// The entry for `date` is preferred; if the dataset does not carry that day
/// the first entry's clock times are used. Either way the times are anchored
/// to `date` in Taiwan local time.
pub fn extract_sun_times(
    body: &str,
    county: &str,
    date: NaiveDate,
) -> Result<SunTimesFragment, WeatherError> {
    let source = Source::SunriseSunset;
    let response: SunResponse = parse_body(source, body)?;
    let record = single_match(source, &response.records.locations.location, county, |l| {
        l.county_name.as_str()
    })?;

    let wanted = date.format("%Y-%m-%d").to_string();
    let day = record
        .time
        .iter()
        .find(|d| d.date == wanted)
        .or_else(|| record.time.first())
        .ok_or_else(|| WeatherError::shape(source, format!("no dates for {}", county)))?;

    let anchor = |raw: &str, label: &str| -> Result<DateTime<FixedOffset>, WeatherError> {
        parse_clock_time(raw)
            .and_then(|time| taipei_datetime(date, time))
            .ok_or_else(|| WeatherError::shape(source, format!("bad {} time {:?}", label, raw)))
    };

    Ok(SunTimesFragment {
        sunrise: anchor(&day.sun_rise_time, "sunrise")?,
        sunset: anchor(&day.sun_set_time, "sunset")?,
    })
}
