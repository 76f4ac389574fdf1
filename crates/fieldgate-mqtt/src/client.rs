use std::time::Duration;

use rumqttc::{AsyncClient, EventLoop, MqttOptions, QoS};
use tracing::info;

use fieldgate_domain::{DomainError, DomainResult};

/// Broker connection settings shared by the producer and the bridge.
#[derive(Debug, Clone)]
pub struct MqttSettings {
    pub broker: String,
    pub port: u16,
    pub client_id_prefix: String,
}

/// Creates the MQTT client and its event loop. The connection is
/// established lazily once the event loop is polled.
pub fn connect(settings: &MqttSettings) -> (AsyncClient, EventLoop) {
    let client_id = format!("{}-{}", settings.client_id_prefix, uuid::Uuid::new_v4());
    let mut options = MqttOptions::new(client_id, &settings.broker, settings.port);
    options.set_keep_alive(Duration::from_secs(30));
    options.set_clean_session(true);

    info!(
        broker = %settings.broker,
        port = settings.port,
        "Created MQTT client"
    );

    AsyncClient::new(options, 100)
}

pub fn qos_from_level(level: u8) -> DomainResult<QoS> {
    match level {
        0 => Ok(QoS::AtMostOnce),
        1 => Ok(QoS::AtLeastOnce),
        2 => Ok(QoS::ExactlyOnce),
        other => Err(DomainError::InvalidConfig(format!(
            "Invalid MQTT QoS level: {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qos_levels() {
        assert_eq!(qos_from_level(0).unwrap(), QoS::AtMostOnce);
        assert_eq!(qos_from_level(1).unwrap(), QoS::AtLeastOnce);
        assert_eq!(qos_from_level(2).unwrap(), QoS::ExactlyOnce);
        assert!(qos_from_level(3).is_err());
    }
}
