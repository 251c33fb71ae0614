//! Concrete remote resources
//!
//! Each resource describes how to request and decode one kind of data; the
//! repository takes care of caching and fallback.

pub mod weather;

pub use weather::{CurrentWeather, Weather, WeatherCondition, WeatherError, DEFAULT_BASE_URL};
