//! Rendering of resolved weather for the terminal
//!
//! Text for people, JSON for scripts. Errors are rendered by kind so a
//! script can branch on the `kind` field instead of the message.

use serde::Serialize;

use crate::data::{Weather, WeatherCondition};
use crate::error::{Error, ErrorKind};
use crate::repository::{Origin, Resolved};

/// Output format selected on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// What happened to one requested city
#[derive(Debug)]
pub struct CityOutcome {
    pub requested: String,
    pub result: Result<Resolved<Weather>, Error>,
}

impl CityOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

#[derive(Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
enum JsonEntry<'a> {
    Ok {
        requested: &'a str,
        origin: Origin,
        weather: &'a Weather,
    },
    Error {
        requested: &'a str,
        kind: ErrorKind,
        message: &'a str,
    },
}

impl<'a> From<&'a CityOutcome> for JsonEntry<'a> {
    fn from(outcome: &'a CityOutcome) -> Self {
        match &outcome.result {
            Ok(resolved) => JsonEntry::Ok {
                requested: &outcome.requested,
                origin: resolved.origin,
                weather: &resolved.value,
            },
            Err(e) => JsonEntry::Error {
                requested: &outcome.requested,
                kind: e.kind(),
                message: e.message(),
            },
        }
    }
}

pub fn render_outcomes(outcomes: &[CityOutcome], units: &str, format: OutputFormat) -> serde_json::Result<String> {
    match format {
        OutputFormat::Text => Ok(render_text(outcomes, units)),
        OutputFormat::Json => {
            let entries: Vec<JsonEntry<'_>> = outcomes.iter().map(JsonEntry::from).collect();
            serde_json::to_string_pretty(&entries)
        }
    }
}

fn render_text(outcomes: &[CityOutcome], units: &str) -> String {
    let mut out = String::new();
    for outcome in outcomes {
        match &outcome.result {
            Ok(resolved) => out.push_str(&weather_block(resolved, units)),
            Err(e) => out.push_str(&format!("\u{2717}  {}: {e}\n", outcome.requested)),
        }
    }
    out
}

fn weather_block(resolved: &Resolved<Weather>, units: &str) -> String {
    let w = &resolved.value;
    let place = match &w.country {
        Some(country) => format!("{}, {country}", w.city),
        None => w.city.clone(),
    };
    let temp = temperature_suffix(units);

    let mut block = format!(
        "{}  {place}  {:.0}{temp} (feels {:.0}{temp})  {}\n",
        condition_icon(w.condition),
        w.temperature,
        w.feels_like,
        w.description
    );
    block.push_str(&format!(
        "   Wind: {:.1} {}  Humidity: {}%",
        w.wind,
        wind_suffix(units),
        w.humidity
    ));
    match resolved.origin {
        Origin::Network => {}
        Origin::Cache => block.push_str("  (cached)"),
        Origin::StaleFallback => block.push_str("  (cached, fetch failed)"),
    }
    block.push('\n');
    block
}

pub fn render_history(entries: &[String], format: OutputFormat) -> serde_json::Result<String> {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(entries),
        OutputFormat::Text if entries.is_empty() => Ok("No recent searches\n".to_string()),
        OutputFormat::Text => Ok(entries
            .iter()
            .enumerate()
            .map(|(i, city)| format!("{:>2}. {city}\n", i + 1))
            .collect()),
    }
}

/// Returns an icon character for the weather condition
fn condition_icon(condition: WeatherCondition) -> &'static str {
    match condition {
        WeatherCondition::Clear => "\u{2600}",        // ☀
        WeatherCondition::PartlyCloudy => "\u{26C5}", // ⛅
        WeatherCondition::Cloudy => "\u{2601}",       // ☁
        WeatherCondition::Rain => "\u{1F327}",        // 🌧
        WeatherCondition::Showers => "\u{1F326}",     // 🌦
        WeatherCondition::Thunderstorm => "\u{26C8}", // ⛈
        WeatherCondition::Snow => "\u{2744}",         // ❄
        WeatherCondition::Fog => "\u{1F32B}",         // 🌫
    }
}

fn temperature_suffix(units: &str) -> &'static str {
    match units {
        "imperial" => "\u{B0}F",
        "standard" => "K",
        _ => "\u{B0}C",
    }
}

fn wind_suffix(units: &str) -> &'static str {
    match units {
        "imperial" => "mph",
        _ => "m/s",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::Value;

    fn paris(origin: Origin) -> CityOutcome {
        CityOutcome {
            requested: "paris".to_string(),
            result: Ok(Resolved {
                identifier: "paris".to_string(),
                value: Weather {
                    city: "Paris".to_string(),
                    country: Some("FR".to_string()),
                    temperature: 18.4,
                    feels_like: 17.6,
                    condition: WeatherCondition::Clear,
                    description: "clear sky".to_string(),
                    humidity: 64,
                    wind: 4.1,
                    fetched_at: Utc::now(),
                },
                origin,
            }),
        }
    }

    fn tokyo_offline() -> CityOutcome {
        CityOutcome {
            requested: "Tokyo".to_string(),
            result: Err(Error::network("no connectivity and no cached data for 'Tokyo'")),
        }
    }

    #[test]
    fn test_text_output_for_network_result() {
        let text = render_outcomes(&[paris(Origin::Network)], "metric", OutputFormat::Text).unwrap();

        assert!(text.contains("Paris, FR"));
        assert!(text.contains("18\u{B0}C"));
        assert!(text.contains("(feels 18\u{B0}C)"));
        assert!(text.contains("Humidity: 64%"));
        assert!(!text.contains("cached"));
    }

    #[test]
    fn test_text_output_marks_cached_origins() {
        let cached = render_outcomes(&[paris(Origin::Cache)], "metric", OutputFormat::Text).unwrap();
        assert!(cached.contains("(cached)"));

        let stale = render_outcomes(&[paris(Origin::StaleFallback)], "imperial", OutputFormat::Text).unwrap();
        assert!(stale.contains("fetch failed"));
        assert!(stale.contains("\u{B0}F"));
        assert!(stale.contains("mph"));
    }

    #[test]
    fn test_text_output_for_error() {
        let text = render_outcomes(&[tokyo_offline()], "metric", OutputFormat::Text).unwrap();
        assert!(text.contains("Tokyo: Network error: no connectivity"));
    }

    #[test]
    fn test_json_output_tags_results_and_errors() {
        let json = render_outcomes(
            &[paris(Origin::StaleFallback), tokyo_offline()],
            "metric",
            OutputFormat::Json,
        )
        .unwrap();
        let parsed: Value = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed[0]["status"], "ok");
        assert_eq!(parsed[0]["origin"], "stale-fallback");
        assert_eq!(parsed[0]["weather"]["city"], "Paris");
        assert_eq!(parsed[1]["status"], "error");
        assert_eq!(parsed[1]["kind"], "network");
        assert_eq!(parsed[1]["requested"], "Tokyo");
    }

    #[test]
    fn test_history_rendering() {
        let entries = vec!["Paris".to_string(), "london".to_string()];

        let text = render_history(&entries, OutputFormat::Text).unwrap();
        assert_eq!(text, " 1. Paris\n 2. london\n");

        assert_eq!(render_history(&[], OutputFormat::Text).unwrap(), "No recent searches\n");

        let json = render_history(&entries, OutputFormat::Json).unwrap();
        let parsed: Vec<String> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, entries);
    }
}
