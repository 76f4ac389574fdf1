use config::{Config, ConfigError, Environment};
use serde::{Deserialize, Serialize};

use fieldgate_domain::ContentEncoding;
use fieldgate_replay::IndexPolicy;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServiceConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    // CSE configuration
    /// HTTP base URL of the CSE, including the CSE base resource name
    #[serde(default = "default_cse_base_url")]
    pub cse_base_url: String,

    /// Originator identifier sent as X-M2M-Origin
    #[serde(default = "default_cse_origin")]
    pub cse_origin: String,

    /// CSE identifier used in MQTT request topics and 'to' paths
    #[serde(default = "default_cse_id")]
    pub cse_id: String,

    /// HTTP request timeout in milliseconds
    #[serde(default = "default_cse_timeout_ms")]
    pub cse_timeout_ms: u64,

    /// Application Entity resource name under the CSE base
    #[serde(default = "default_ae_name")]
    pub ae_name: String,

    /// Region (container) name grouping the sensor containers
    #[serde(default = "default_region")]
    pub region: String,

    /// How CIN content is carried: "stringified" or "embedded"
    #[serde(default = "default_content_encoding")]
    pub content_encoding: String,

    // Provisioning
    /// Create the AE/container/subscription tree at startup
    #[serde(default)]
    pub provision_enabled: bool,

    /// Path to the YAML provision plan
    #[serde(default = "default_provision_plan")]
    pub provision_plan: String,

    // MQTT configuration
    #[serde(default = "default_mqtt_broker")]
    pub mqtt_broker: String,

    #[serde(default = "default_mqtt_port")]
    pub mqtt_port: u16,

    /// QoS level for publishes and subscriptions (0, 1, or 2)
    #[serde(default = "default_mqtt_qos")]
    pub mqtt_qos: u8,

    #[serde(default = "default_mqtt_client_id_prefix")]
    pub mqtt_client_id_prefix: String,

    // Feeder configuration
    /// Replay CSV rows as CIN-create primitives over MQTT
    #[serde(default)]
    pub feeder_enabled: bool,

    /// CSV file for Sensor1 (empty disables the source)
    #[serde(default)]
    pub feeder_sensor1_csv: String,

    /// CSV file for Sensor2 (empty disables the source)
    #[serde(default)]
    pub feeder_sensor2_csv: String,

    /// CSV file for Sensor3 (empty disables the source)
    #[serde(default)]
    pub feeder_sensor3_csv: String,

    /// Milliseconds between replay ticks
    #[serde(default = "default_feeder_rate_ms")]
    pub feeder_rate_ms: u64,

    /// Milliseconds to wait before the first tick
    #[serde(default = "default_feeder_initial_delay_ms")]
    pub feeder_initial_delay_ms: u64,

    /// Wrap around when a source runs out of rows; otherwise hold the last row
    #[serde(default = "default_feeder_loop")]
    pub feeder_loop: bool,

    // Bridge configuration
    /// Forward broker sensor topics to the CSE over HTTP
    #[serde(default)]
    pub bridge_enabled: bool,

    /// Prefix of the underscore-delimited sensor topics
    #[serde(default = "default_bridge_topic_prefix")]
    pub bridge_topic_prefix: String,

    /// Comma-separated list of topics to subscribe
    #[serde(default)]
    pub bridge_topics: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

// CSE defaults
fn default_cse_base_url() -> String {
    "http://127.0.0.1:7579/Mobius".to_string()
}

fn default_cse_origin() -> String {
    "CAdmin".to_string()
}

fn default_cse_id() -> String {
    "Mobius".to_string()
}

fn default_cse_timeout_ms() -> u64 {
    2000
}

fn default_ae_name() -> String {
    "FieldGate".to_string()
}

fn default_region() -> String {
    "12".to_string()
}

fn default_content_encoding() -> String {
    "stringified".to_string()
}

fn default_provision_plan() -> String {
    "config/provision.yaml".to_string()
}

// MQTT defaults
fn default_mqtt_broker() -> String {
    "127.0.0.1".to_string()
}

fn default_mqtt_port() -> u16 {
    1883
}

fn default_mqtt_qos() -> u8 {
    1
}

fn default_mqtt_client_id_prefix() -> String {
    "fieldgate".to_string()
}

// Feeder defaults
fn default_feeder_rate_ms() -> u64 {
    5000
}

fn default_feeder_initial_delay_ms() -> u64 {
    1000
}

fn default_feeder_loop() -> bool {
    true
}

// Bridge defaults
fn default_bridge_topic_prefix() -> String {
    "Meta-Sejong".to_string()
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(Environment::with_prefix("FIELDGATE"))
            .build()?
            .try_deserialize()
    }

    pub fn content_encoding(&self) -> Result<ContentEncoding, ConfigError> {
        match self.content_encoding.as_str() {
            "stringified" => Ok(ContentEncoding::Stringified),
            "embedded" => Ok(ContentEncoding::Embedded),
            other => Err(ConfigError::Message(format!(
                "content_encoding must be \"stringified\" or \"embedded\", got \"{}\"",
                other
            ))),
        }
    }

    pub fn index_policy(&self) -> IndexPolicy {
        if self.feeder_loop {
            IndexPolicy::Loop
        } else {
            IndexPolicy::Clamp
        }
    }

    /// The three replay sources in sensor order; empty paths are disabled.
    pub fn feeder_sources(&self) -> Vec<(u32, String)> {
        [
            (1, &self.feeder_sensor1_csv),
            (2, &self.feeder_sensor2_csv),
            (3, &self.feeder_sensor3_csv),
        ]
        .into_iter()
        .filter(|(_, path)| !path.trim().is_empty())
        .map(|(no, path)| (no, path.clone()))
        .collect()
    }
}
