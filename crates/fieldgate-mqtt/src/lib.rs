mod bridge;
mod cin_producer;
mod client;
mod topic;

pub use bridge::{run_event_loop, BridgeOutcome, SensorBridge};
pub use cin_producer::{MqttCinProducer, MqttCinProducerConfig};
pub use client::{connect, qos_from_level, MqttSettings};
pub use topic::{parse_sensor_topic, ParsedTopic};
