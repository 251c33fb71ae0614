//! Current-weather resource for an OpenWeatherMap-compatible API
//!
//! Looks a city up by name on the `weather` endpoint and parses the answer
//! into our `Weather` structure.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::fetch::RequestDescriptor;
use crate::repository::RemoteResource;

/// Base URL of the public OpenWeatherMap API
pub const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org/data/2.5";

/// Endpoint for current conditions by city name
const CURRENT_WEATHER_ENDPOINT: &str = "weather";

/// Weather conditions for a city at fetch time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Weather {
    /// City name as reported by the API
    pub city: String,
    /// ISO country code, if reported
    pub country: Option<String>,
    /// Current temperature in the requested unit system
    pub temperature: f64,
    /// Feels-like temperature in the requested unit system
    pub feels_like: f64,
    /// Current weather condition
    pub condition: WeatherCondition,
    /// Free-text description, e.g. "light rain"
    pub description: String,
    /// Relative humidity percentage (0-100)
    pub humidity: u8,
    /// Wind speed (m/s for metric, mph for imperial)
    pub wind: f64,
    /// When this data was fetched
    pub fetched_at: DateTime<Utc>,
}

/// Types of weather conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WeatherCondition {
    Clear,
    PartlyCloudy,
    Cloudy,
    Rain,
    Showers,
    Thunderstorm,
    Snow,
    Fog,
}

/// Errors that can occur when decoding a weather response
#[derive(Debug, Error)]
pub enum WeatherError {
    /// Failed to parse JSON response
    #[error("Failed to parse JSON response: {0}")]
    ParseError(#[from] serde_json::Error),

    /// Missing expected field in response
    #[error("Missing expected field in response: {0}")]
    MissingField(String),
}

/// Current conditions looked up by city name
#[derive(Debug, Clone, Copy, Default)]
pub struct CurrentWeather;

impl RemoteResource for CurrentWeather {
    type Value = Weather;
    type DecodeError = WeatherError;

    fn kind(&self) -> &'static str {
        "weather"
    }

    fn descriptor(&self, identifier: &str) -> RequestDescriptor {
        let city = identifier.trim();
        RequestDescriptor::get(CURRENT_WEATHER_ENDPOINT)
            .query("q", city)
            .lookup(city)
    }

    fn decode(&self, identifier: &str, body: &[u8]) -> Result<Weather, WeatherError> {
        let response: OpenWeatherResponse = serde_json::from_slice(body)?;
        parse_response(response, identifier)
    }
}

/// Parse the API response into a Weather struct
fn parse_response(response: OpenWeatherResponse, identifier: &str) -> Result<Weather, WeatherError> {
    let current = response
        .weather
        .first()
        .ok_or_else(|| WeatherError::MissingField("weather".to_string()))?;

    let city = if response.name.trim().is_empty() {
        identifier.trim().to_string()
    } else {
        response.name
    };

    Ok(Weather {
        city,
        country: response.sys.and_then(|sys| sys.country),
        temperature: response.main.temp,
        feels_like: response.main.feels_like,
        condition: condition_code_to_condition(current.id),
        description: current.description.clone(),
        humidity: response.main.humidity.clamp(0.0, 100.0) as u8,
        wind: response.wind.map(|wind| wind.speed).unwrap_or(0.0),
        fetched_at: Utc::now(),
    })
}

/// Map an OpenWeatherMap condition code to WeatherCondition
///
/// Code groups:
/// - 2xx: Thunderstorm
/// - 3xx: Drizzle
/// - 500-504: Rain
/// - 511: Freezing rain
/// - 520-531: Shower rain
/// - 6xx: Snow
/// - 7xx: Mist, smoke, haze, fog and other atmosphere
/// - 800: Clear sky
/// - 801-802: Few/scattered clouds
/// - 803-804: Broken/overcast clouds
pub fn condition_code_to_condition(code: u16) -> WeatherCondition {
    match code {
        200..=299 => WeatherCondition::Thunderstorm,
        300..=399 | 500..=504 => WeatherCondition::Rain,
        511 | 520..=531 => WeatherCondition::Showers,
        600..=699 => WeatherCondition::Snow,
        700..=799 => WeatherCondition::Fog,
        800 => WeatherCondition::Clear,
        801 | 802 => WeatherCondition::PartlyCloudy,
        _ => WeatherCondition::Cloudy, // 803/804 and unknown codes
    }
}

/// OpenWeatherMap current-weather response
#[derive(Debug, Deserialize)]
struct OpenWeatherResponse {
    #[serde(default)]
    name: String,
    sys: Option<SystemInfo>,
    main: MainReadings,
    wind: Option<WindReadings>,
    #[serde(default)]
    weather: Vec<ConditionEntry>,
}

#[derive(Debug, Deserialize)]
struct SystemInfo {
    country: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MainReadings {
    temp: f64,
    feels_like: f64,
    humidity: f64,
}

#[derive(Debug, Deserialize)]
struct WindReadings {
    speed: f64,
}

#[derive(Debug, Deserialize)]
struct ConditionEntry {
    id: u16,
    #[serde(default)]
    description: String,
}
