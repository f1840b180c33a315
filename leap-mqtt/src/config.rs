//! Bridge configuration loaded from the environment
//!
//! | Variable | Required | Default |
//! |---|---|---|
//! | `BRIDGE_IP` | yes | |
//! | `BRIDGE_PORT` | no | `8081` |
//! | `BRIDGE_CA_PATH` | yes | |
//! | `BRIDGE_CERT_PATH` | yes | |
//! | `BRIDGE_KEY_PATH` | yes | |
//! | `MQTT_HOST` | yes | port `1883` when none is given |
//! | `MQTT_CLIENT_ID` | no | `leap-bridge` |
//! | `TOPIC_PREFIX` | no | `leap` |
//! | `PROBE_INTERVAL_SECS` | no | `30` |
//! | `EXIT_ON_DISCONNECT` | no | `false` |

use std::path::PathBuf;
use std::time::Duration;

use leap_connection::{ConnectionConfig, CredentialBundle, DEFAULT_LEAP_PORT};
use rumqttc::{LastWill, MqttOptions, QoS};
use tracing::warn;

use crate::error::ConfigError;
use crate::topics::Topics;

pub const DEFAULT_MQTT_PORT: u16 = 1883;
pub const DEFAULT_TOPIC_PREFIX: &str = "leap";
pub const DEFAULT_CLIENT_ID: &str = "leap-bridge";

/// Everything `run_bridge` needs.
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeConfig {
    pub gateway_address: String,
    pub gateway_port: u16,
    pub ca_path: PathBuf,
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
    pub mqtt_host: String,
    pub mqtt_port: u16,
    pub mqtt_client_id: String,
    pub mqtt_keep_alive: Duration,
    /// Topic prefix without leading or trailing `/`
    pub topic_prefix: String,
    pub probe_interval: Duration,
    /// Stop the bridge on the first gateway disconnect instead of waiting for
    /// the supervisor to reconnect
    pub exit_on_disconnect: bool,
}

impl BridgeConfig {
    /// Load from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load using `lookup` to resolve variable names.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        let require = |name: &'static str| get(name).ok_or(ConfigError::Missing(name));

        let gateway_address = require("BRIDGE_IP")?.trim().to_string();
        let gateway_port = match get("BRIDGE_PORT") {
            Some(port) => parse_number("BRIDGE_PORT", &port)?,
            None => DEFAULT_LEAP_PORT,
        };

        let ca_path = PathBuf::from(require("BRIDGE_CA_PATH")?);
        let cert_path = PathBuf::from(require("BRIDGE_CERT_PATH")?);
        let key_path = PathBuf::from(require("BRIDGE_KEY_PATH")?);

        let (mqtt_host, mqtt_port) = parse_mqtt_url(&require("MQTT_HOST")?)?;
        let mqtt_client_id = get("MQTT_CLIENT_ID").unwrap_or_else(|| DEFAULT_CLIENT_ID.to_string());

        let topic_prefix = match get("TOPIC_PREFIX") {
            Some(prefix) => normalize_prefix(&prefix),
            None => {
                warn!(prefix = DEFAULT_TOPIC_PREFIX, "TOPIC_PREFIX not set, using default");
                DEFAULT_TOPIC_PREFIX.to_string()
            }
        };

        let probe_interval = match get("PROBE_INTERVAL_SECS") {
            Some(secs) => Duration::from_secs(parse_number("PROBE_INTERVAL_SECS", &secs)?),
            None => ConnectionConfig::default().probe_interval,
        };

        let exit_on_disconnect = match get("EXIT_ON_DISCONNECT") {
            Some(flag) => parse_flag("EXIT_ON_DISCONNECT", &flag)?,
            None => false,
        };

        let config = Self {
            gateway_address,
            gateway_port,
            ca_path,
            cert_path,
            key_path,
            mqtt_host,
            mqtt_port,
            mqtt_client_id,
            mqtt_keep_alive: Duration::from_secs(30),
            topic_prefix,
            probe_interval,
            exit_on_disconnect,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration and return any issues
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.topic_prefix.is_empty() {
            return Err(ConfigError::Invalid {
                var: "TOPIC_PREFIX",
                reason: "prefix is empty".to_string(),
            });
        }

        if self.topic_prefix.contains(['+', '#']) {
            return Err(ConfigError::Invalid {
                var: "TOPIC_PREFIX",
                reason: "prefix must not contain MQTT wildcards".to_string(),
            });
        }

        if self.probe_interval == Duration::ZERO {
            return Err(ConfigError::Invalid {
                var: "PROBE_INTERVAL_SECS",
                reason: "must be greater than 0".to_string(),
            });
        }

        if self.mqtt_client_id.is_empty() {
            return Err(ConfigError::Invalid {
                var: "MQTT_CLIENT_ID",
                reason: "client id is empty".to_string(),
            });
        }

        Ok(())
    }

    /// Read the PEM files named by the configuration.
    pub fn load_credentials(&self) -> Result<CredentialBundle, ConfigError> {
        Ok(CredentialBundle::from_pem_files(
            self.gateway_address.clone(),
            self.gateway_port,
            &self.ca_path,
            &self.cert_path,
            &self.key_path,
        )?)
    }

    /// Gateway connection settings derived from this configuration.
    pub fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig::default().with_probe_interval(self.probe_interval)
    }

    pub fn topics(&self) -> Topics {
        Topics::new(&self.topic_prefix)
    }

    /// Broker options with keep-alive and an availability last will.
    pub fn mqtt_options(&self) -> MqttOptions {
        let mut options = MqttOptions::new(&self.mqtt_client_id, &self.mqtt_host, self.mqtt_port);
        options.set_keep_alive(self.mqtt_keep_alive);
        options.set_last_will(LastWill::new(
            self.topics().availability(),
            "0",
            QoS::AtLeastOnce,
            true,
        ));
        options
    }
}

/// Split `MQTT_HOST` into host and port.
///
/// Accepts `host`, `host:port`, `mqtt://host:port` and `tcp://host:port`.
pub fn parse_mqtt_url(url: &str) -> Result<(String, u16), ConfigError> {
    let trimmed = url.trim();
    let stripped = trimmed
        .strip_prefix("mqtt://")
        .or_else(|| trimmed.strip_prefix("tcp://"))
        .unwrap_or(trimmed)
        .trim_end_matches('/');

    let (host, port) = match stripped.rsplit_once(':') {
        Some((host, port)) => (host, parse_number("MQTT_HOST", port)?),
        None => (stripped, DEFAULT_MQTT_PORT),
    };

    if host.is_empty() {
        return Err(ConfigError::Invalid {
            var: "MQTT_HOST",
            reason: format!("no host in {url:?}"),
        });
    }

    Ok((host.to_string(), port))
}

/// `/leap/` and `leap` both become `leap`.
fn normalize_prefix(prefix: &str) -> String {
    prefix.trim().trim_matches('/').to_string()
}

fn parse_number<T: std::str::FromStr>(var: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        var,
        reason: format!("{value:?} is not a valid number"),
    })
}

fn parse_flag(var: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            var,
            reason: format!("{value:?} is not a boolean"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::HashMap;

    fn base_env() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("BRIDGE_IP", "192.168.1.20"),
            ("BRIDGE_CA_PATH", "/certs/ca.crt"),
            ("BRIDGE_CERT_PATH", "/certs/client.crt"),
            ("BRIDGE_KEY_PATH", "/certs/client.key"),
            ("MQTT_HOST", "mqtt://broker.local:1884"),
        ])
    }

    fn load(env: &HashMap<&'static str, &'static str>) -> Result<BridgeConfig, ConfigError> {
        BridgeConfig::from_lookup(|name| env.get(name).map(|value| value.to_string()))
    }

    #[test]
    fn test_defaults() {
        let config = load(&base_env()).unwrap();

        assert_eq!(config.gateway_address, "192.168.1.20");
        assert_eq!(config.gateway_port, 8081);
        assert_eq!(config.mqtt_host, "broker.local");
        assert_eq!(config.mqtt_port, 1884);
        assert_eq!(config.mqtt_client_id, "leap-bridge");
        assert_eq!(config.topic_prefix, "leap");
        assert_eq!(config.probe_interval, Duration::from_secs(30));
        assert!(!config.exit_on_disconnect);
        assert_eq!(config.key_path, PathBuf::from("/certs/client.key"));
    }

    #[rstest]
    #[case("BRIDGE_IP")]
    #[case("BRIDGE_CA_PATH")]
    #[case("BRIDGE_CERT_PATH")]
    #[case("BRIDGE_KEY_PATH")]
    #[case("MQTT_HOST")]
    fn test_missing_required(#[case] var: &'static str) {
        let mut env = base_env();
        env.remove(var);
        assert!(matches!(load(&env), Err(ConfigError::Missing(missing)) if missing == var));
    }

    #[test]
    fn test_blank_value_counts_as_missing() {
        let mut env = base_env();
        env.insert("BRIDGE_IP", "  ");
        assert!(matches!(load(&env), Err(ConfigError::Missing("BRIDGE_IP"))));
    }

    #[test]
    fn test_overrides() {
        let mut env = base_env();
        env.insert("BRIDGE_PORT", "9000");
        env.insert("TOPIC_PREFIX", "/home/lutron/");
        env.insert("MQTT_CLIENT_ID", "lutron-1");
        env.insert("PROBE_INTERVAL_SECS", "5");
        env.insert("EXIT_ON_DISCONNECT", "true");

        let config = load(&env).unwrap();
        assert_eq!(config.gateway_port, 9000);
        assert_eq!(config.topic_prefix, "home/lutron");
        assert_eq!(config.mqtt_client_id, "lutron-1");
        assert_eq!(config.probe_interval, Duration::from_secs(5));
        assert!(config.exit_on_disconnect);
        assert_eq!(config.connection_config().probe_interval, Duration::from_secs(5));
    }

    #[rstest]
    #[case("BRIDGE_PORT", "eighty")]
    #[case("PROBE_INTERVAL_SECS", "0")]
    #[case("EXIT_ON_DISCONNECT", "maybe")]
    #[case("TOPIC_PREFIX", "leap/#")]
    #[case("TOPIC_PREFIX", "///")]
    fn test_invalid_values(#[case] var: &'static str, #[case] value: &'static str) {
        let mut env = base_env();
        env.insert(var, value);
        assert!(matches!(load(&env), Err(ConfigError::Invalid { .. })));
    }

    #[rstest]
    #[case("broker", "broker", 1883)]
    #[case("broker:1884", "broker", 1884)]
    #[case("mqtt://10.0.0.5:1883", "10.0.0.5", 1883)]
    #[case("tcp://broker.local", "broker.local", 1883)]
    #[case("mqtt://broker/", "broker", 1883)]
    fn test_parse_mqtt_url(#[case] url: &str, #[case] host: &str, #[case] port: u16) {
        assert_eq!(parse_mqtt_url(url).unwrap(), (host.to_string(), port));
    }

    #[rstest]
    #[case("mqtt://broker:port")]
    #[case("mqtt://:1883")]
    fn test_parse_mqtt_url_invalid(#[case] url: &str) {
        assert!(parse_mqtt_url(url).is_err());
    }

    #[test]
    fn test_missing_credential_file() {
        let mut env = base_env();
        env.insert("BRIDGE_CA_PATH", "/nonexistent/leap-bridge/ca.crt");
        let config = load(&env).unwrap();

        assert!(matches!(
            config.load_credentials(),
            Err(ConfigError::Credentials(_))
        ));
    }

    #[test]
    fn test_mqtt_options() {
        let config = load(&base_env()).unwrap();
        let options = config.mqtt_options();

        assert_eq!(options.broker_address(), ("broker.local".to_string(), 1884));
        assert_eq!(options.keep_alive(), Duration::from_secs(30));
        let will = options.last_will().expect("last will");
        assert_eq!(will.topic, "leap/bridge/connected");
        assert!(will.retain);
    }
}
