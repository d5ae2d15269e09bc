use anyhow::{Context, Result};
use chrono::TimeDelta;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    /// Prefix of the sensor endpoints listed in fetch plans.
    pub sensor_api_base_url: String,
    /// A sensor is online when its last reading is at most this old.
    pub online_threshold: TimeDelta,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any key lookup; `from_env` passes the process
    /// environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let optional = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_owned());

        let online_threshold_mins: i64 = optional("ONLINE_THRESHOLD_MINS", "15")
            .parse()
            .context("ONLINE_THRESHOLD_MINS must be an integer number of minutes")?;
        anyhow::ensure!(
            online_threshold_mins > 0,
            "ONLINE_THRESHOLD_MINS must be positive, got {online_threshold_mins}"
        );
        let online_threshold = TimeDelta::try_minutes(online_threshold_mins)
            .context("ONLINE_THRESHOLD_MINS is out of range")?;

        Ok(Self {
            server_host: optional("SERVER_HOST", "0.0.0.0"),
            server_port: optional("SERVER_PORT", "8080")
                .parse()
                .context("SERVER_PORT must be a valid port number")?,
            sensor_api_base_url: optional("SENSOR_API_BASE_URL", "http://localhost:8080"),
            online_threshold,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_host: "0.0.0.0".to_owned(),
            server_port: 8080,
            sensor_api_base_url: "http://localhost:8080".to_owned(),
            online_threshold: TimeDelta::minutes(15),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let c = config(&[]).unwrap();
        assert_eq!(c.server_host, "0.0.0.0");
        assert_eq!(c.server_port, 8080);
        assert_eq!(c.sensor_api_base_url, "http://localhost:8080");
        assert_eq!(c.online_threshold, TimeDelta::minutes(15));
    }

    #[test]
    fn overrides_are_read() {
        let c = config(&[
            ("SERVER_PORT", "9090"),
            ("SENSOR_API_BASE_URL", "https://greenhouse.example"),
            ("ONLINE_THRESHOLD_MINS", "5"),
        ])
        .unwrap();
        assert_eq!(c.server_port, 9090);
        assert_eq!(c.sensor_api_base_url, "https://greenhouse.example");
        assert_eq!(c.online_threshold, TimeDelta::minutes(5));
    }

    #[test]
    fn invalid_port_errors() {
        let err = config(&[("SERVER_PORT", "http")]).unwrap_err();
        assert!(err.to_string().contains("SERVER_PORT"));
    }

    #[test]
    fn non_positive_threshold_errors() {
        let err = config(&[("ONLINE_THRESHOLD_MINS", "0")]).unwrap_err();
        assert!(err.to_string().contains("must be positive"));
        assert!(config(&[("ONLINE_THRESHOLD_MINS", "soon")]).is_err());
    }

    #[test]
    fn out_of_range_threshold_errors() {
        let err = config(&[("ONLINE_THRESHOLD_MINS", "9223372036854775807")]).unwrap_err();
        assert!(err.to_string().contains("out of range"));
    }
}
