//! City lookup: maps a user-facing city name to the identifiers each
//! upstream dataset expects.

/// Identifiers for one supported city.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocationIdentifiers {
    /// Lookup key, as picked in settings (e.g. "臺北市")
    pub city_name: &'static str,
    /// Station name for the current-observation dataset
    pub observation_station_name: &'static str,
    /// City name for the forecast dataset
    pub forecast_city_name: &'static str,
    /// County name for the sunrise/sunset dataset
    pub sunrise_county_name: &'static str,
    pub display_city_name: &'static str,
}

/// City used when a lookup misses.
pub const DEFAULT_CITY: &str = "臺北市";

const fn city(
    city_name: &'static str,
    observation_station_name: &'static str,
) -> LocationIdentifiers {
    LocationIdentifiers {
        city_name,
        observation_station_name,
        forecast_city_name: city_name,
        sunrise_county_name: city_name,
        display_city_name: city_name,
    }
}

static LOCATIONS: [LocationIdentifiers; 22] = [
    city("嘉義縣", "阿里山"),
    city("新北市", "板橋"),
    city("嘉義市", "嘉義"),
    city("新竹縣", "新竹"),
    city("新竹市", "新竹"),
    city("臺北市", "臺北"),
    city("臺南市", "臺南"),
    city("宜蘭縣", "宜蘭"),
    city("苗栗縣", "後龍"),
    city("雲林縣", "古坑"),
    city("花蓮縣", "花蓮"),
    city("臺中市", "臺中"),
    city("臺東縣", "臺東"),
    city("桃園市", "新屋"),
    city("南投縣", "日月潭"),
    city("高雄市", "高雄"),
    city("金門縣", "金門"),
    city("屏東縣", "恆春"),
    city("基隆市", "基隆"),
    city("澎湖縣", "澎湖"),
    city("彰化縣", "彰師大"),
    city("連江縣", "馬祖"),
];

/// All supported cities, in settings-list order.
pub fn supported_cities() -> impl Iterator<Item = &'static LocationIdentifiers> {
    LOCATIONS.iter()
}

/// Look up a city. Surrounding whitespace is ignored and 台 is read as 臺.
pub fn resolve(city_name: &str) -> Option<&'static LocationIdentifiers> {
    let normalized = city_name.trim().replace('台', "臺");
    LOCATIONS.iter().find(|loc| loc.city_name == normalized)
}

/// Look up a city, falling back to [`DEFAULT_CITY`] on a miss.
pub fn resolve_or_default(city_name: &str) -> &'static LocationIdentifiers {
    match resolve(city_name) {
        Some(loc) => loc,
        None => {
            tracing::warn!(
                "Unsupported city {:?}, falling back to {}",
                city_name,
                DEFAULT_CITY
            );
            default_location()
        }
    }
}

pub fn default_location() -> &'static LocationIdentifiers {
    // LOCATIONS[5] is DEFAULT_CITY; the test below pins it.
    &LOCATIONS[5]
}
