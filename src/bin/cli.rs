//! Sensor Server CLI
//!
//! Command-line client for a running sensor server:
//! - Push readings and events
//! - Query latest values, history and events
//! - Relay readings from a JSON weather source
//! - Print a default config file

use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand};
use reqwest::Url;
use serde_json::Value;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sensorctl")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Command-line client for the sensor server")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Sensor server URL
    #[arg(long, default_value = "http://localhost:3001", global = true)]
    pub api_url: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Store a reading
    Push {
        /// Sensor id
        sensor: String,
        /// Temperature in degrees Celsius
        #[arg(allow_hyphen_values = true)]
        temperature: f64,
        /// Relative humidity in percent
        humidity: f64,
    },

    /// Record an event
    Event {
        /// Event type, e.g. DoorOpen
        event_type: String,
    },

    /// Show the latest reading of a sensor
    Latest {
        /// Sensor id
        sensor: String,
        /// Output format (json, arduino)
        #[arg(short, long, default_value = "json")]
        format: String,
    },

    /// Show all readings of a sensor
    Data {
        /// Sensor id
        sensor: String,
        /// Only readings at or after this date (YYYY-MM-DD, RFC 3339)
        #[arg(short, long)]
        since: Option<String>,
        /// Print raw JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show events of the given types
    Events {
        /// Event types (comma-separated or multiple args)
        #[arg(required = true)]
        types: Vec<String>,
    },

    /// Fetch current conditions from a JSON source and store them
    Relay {
        /// URL returning a JSON document with temperature and humidity
        source_url: String,
        /// Sensor id to store the reading under
        sensor: String,
        /// JSON pointer to the temperature value
        #[arg(long, default_value = "/main/temp")]
        temperature_pointer: String,
        /// JSON pointer to the humidity value
        #[arg(long, default_value = "/main/humidity")]
        humidity_pointer: String,
    },

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match cli.command {
        Commands::Push {
            sensor,
            temperature,
            humidity,
        } => {
            push_reading(&client, &cli.api_url, &sensor, temperature, humidity).await?;
            println!("Stored {}: T={} H={}", sensor, temperature, humidity);
        }

        Commands::Event { event_type } => {
            let response = client
                .put(endpoint(&cli.api_url, &["events"])?)
                .json(&serde_json::json!({ "eventType": event_type }))
                .send()
                .await
                .with_context(|| connect_hint(&cli.api_url))?;

            ensure_success(response).await?;
            println!("Recorded event {}", event_type);
        }

        Commands::Latest { sensor, format } => {
            let response = client
                .get(endpoint(&cli.api_url, &["sensors", sensor.as_str(), "latest"])?)
                .query(&[("format", format.as_str())])
                .send()
                .await
                .with_context(|| connect_hint(&cli.api_url))?;

            let response = ensure_success(response).await?;
            if format.eq_ignore_ascii_case("arduino") {
                println!("{}", response.text().await?);
            } else {
                let latest: Value = response.json().await?;
                if latest.as_object().map_or(true, |o| o.is_empty()) {
                    println!("No data for sensor {}", sensor);
                } else {
                    println!("{}", serde_json::to_string_pretty(&latest)?);
                }
            }
        }

        Commands::Data {
            sensor,
            since,
            json,
        } => {
            let mut request = client.get(endpoint(&cli.api_url, &["sensors", sensor.as_str(), "data"])?);
            if let Some(since) = &since {
                request = request.query(&[("startDate", since.as_str())]);
            }

            let response = request
                .send()
                .await
                .with_context(|| connect_hint(&cli.api_url))?;
            let rows: Vec<Value> = ensure_success(response).await?.json().await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else {
                print_readings(&rows);
            }
        }

        Commands::Events { types } => {
            let types = flatten_list(&types);
            let response = client
                .get(endpoint(&cli.api_url, &["events"])?)
                .query(&[("eventTypes", types.join(","))])
                .send()
                .await
                .with_context(|| connect_hint(&cli.api_url))?;

            let events: Vec<Value> = ensure_success(response).await?.json().await?;
            if events.is_empty() {
                println!("No events of type {}", types.join(", "));
            } else {
                println!("{:<25} {}", "Timestamp", "Event");
                println!("{}", "-".repeat(45));
                for event in events {
                    println!(
                        "{:<25} {}",
                        event["timestamp"].as_str().unwrap_or("-"),
                        event["eventType"].as_str().unwrap_or("-")
                    );
                }
            }
        }

        Commands::Relay {
            source_url,
            sensor,
            temperature_pointer,
            humidity_pointer,
        } => {
            let document: Value = client
                .get(&source_url)
                .send()
                .await
                .with_context(|| format!("Cannot reach source {}", source_url))?
                .error_for_status()?
                .json()
                .await
                .context("Source did not return JSON")?;

            let temperature = extract_number(&document, &temperature_pointer)?;
            let humidity = extract_number(&document, &humidity_pointer)?;

            if is_bogus_sample(temperature, humidity) {
                bail!(
                    "Source returned an invalid sample (T={} H={}), nothing stored",
                    temperature,
                    humidity
                );
            }

            push_reading(&client, &cli.api_url, &sensor, temperature, humidity).await?;
            println!("Relayed {}: T={} H={}", sensor, temperature, humidity);
        }

        Commands::Config { output } => {
            let config = sensorserver::config::generate_default_config();

            match output {
                Some(path) => {
                    if let Some(parent) = path.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    std::fs::write(&path, &config)?;
                    println!("Config written to {:?}", path);
                }
                None => {
                    print!("{}", config);
                }
            }
        }
    }

    Ok(())
}

async fn push_reading(
    client: &reqwest::Client,
    api_url: &str,
    sensor: &str,
    temperature: f64,
    humidity: f64,
) -> anyhow::Result<()> {
    let response = client
        .put(endpoint(api_url, &["sensors", sensor, "data"])?)
        .json(&serde_json::json!({
            "temperature": temperature,
            "humidity": humidity,
        }))
        .send()
        .await
        .with_context(|| connect_hint(api_url))?;

    ensure_success(response).await?;
    Ok(())
}

async fn ensure_success(response: reqwest::Response) -> anyhow::Result<reqwest::Response> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Value>(&text)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or(text);

    Err(anyhow!("Request failed ({}): {}", status, message))
}

/// Server URL with `segments` appended, each percent-encoded as one path segment
fn endpoint(api_url: &str, segments: &[&str]) -> anyhow::Result<Url> {
    let mut url =
        Url::parse(api_url).with_context(|| format!("Invalid server URL {}", api_url))?;
    url.path_segments_mut()
        .map_err(|_| anyhow!("Server URL {} cannot take a path", api_url))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

fn connect_hint(api_url: &str) -> String {
    format!(
        "Cannot connect to sensor server at {} (is `sensorserver` running?)",
        api_url
    )
}

/// Accept both `A,B` and `A B` style lists
fn flatten_list(items: &[String]) -> Vec<String> {
    items
        .iter()
        .flat_map(|i| i.split(','))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Read a number at a JSON pointer; numeric strings are accepted too
fn extract_number(document: &Value, pointer: &str) -> anyhow::Result<f64> {
    let value = document
        .pointer(pointer)
        .ok_or_else(|| anyhow!("Source document has no value at {}", pointer))?;

    match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| anyhow!("Value at {} is not a finite number", pointer)),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .with_context(|| format!("Value at {} is not numeric: {:?}", pointer, s)),
        other => bail!("Value at {} is not numeric: {}", pointer, other),
    }
}

/// Weather sources report absolute zero or zero humidity when they have no data
fn is_bogus_sample(temperature: f64, humidity: f64) -> bool {
    temperature == -273.15 || humidity == 0.0
}

fn print_readings(rows: &[Value]) {
    if rows.is_empty() {
        println!("No data");
        return;
    }

    println!("{:<25} {:>12} {:>10}", "Timestamp", "Temperature", "Humidity");
    println!("{}", "-".repeat(49));

    for row in rows {
        let humidity = match &row["humidity"] {
            Value::Number(n) => n.to_string(),
            _ => "-".to_string(),
        };
        println!(
            "{:<25} {:>12} {:>10}",
            row["timestamp"].as_str().unwrap_or("-"),
            row["temperature"]
                .as_f64()
                .map(|v| format!("{:.1}", v))
                .unwrap_or_else(|| "-".to_string()),
            humidity
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_number() {
        let doc = json!({"main": {"temp": 21.5, "humidity": "47"}, "name": "x"});

        assert_eq!(extract_number(&doc, "/main/temp").unwrap(), 21.5);
        assert_eq!(extract_number(&doc, "/main/humidity").unwrap(), 47.0);
        assert!(extract_number(&doc, "/main/pressure").is_err());
        assert!(extract_number(&doc, "/name").is_err());
    }

    #[test]
    fn test_endpoint_encodes_sensor_id() {
        let url = endpoint("http://localhost:3001", &["sensors", "a/b?c#d", "data"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:3001/sensors/a%2Fb%3Fc%23d/data");

        let url = endpoint("http://host:8080/base/", &["events"]).unwrap();
        assert_eq!(url.as_str(), "http://host:8080/base/events");

        assert!(endpoint("not a url", &["events"]).is_err());
    }

    #[test]
    fn test_bogus_samples() {
        assert!(is_bogus_sample(-273.15, 50.0));
        assert!(is_bogus_sample(20.0, 0.0));
        assert!(!is_bogus_sample(-5.0, 80.0));
    }

    #[test]
    fn test_flatten_list() {
        let items = vec!["DoorOpen,DoorClosed".to_string(), " Alarm ".to_string(), ",".to_string()];
        assert_eq!(flatten_list(&items), vec!["DoorOpen", "DoorClosed", "Alarm"]);
    }
}
