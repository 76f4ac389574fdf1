use anyhow::Context;
use async_trait::async_trait;
use rumqttc::{AsyncClient, QoS};
use serde_json::{Map, Value};
use tracing::debug;

use fieldgate_domain::{
    request_topic, sensor_data_path, CinProducer, ContentEncoding, ContentNormalizer,
    DomainError, DomainResult, RequestEnvelope,
};

#[derive(Debug, Clone)]
pub struct MqttCinProducerConfig {
    pub origin: String,
    pub cse_id: String,
    pub ae_name: String,
    pub region: String,
    pub qos: QoS,
    pub encoding: ContentEncoding,
}

/// Publishes sensor readings as oneM2M CIN-create request primitives on
/// the CSE's request topic.
pub struct MqttCinProducer {
    client: AsyncClient,
    topic: String,
    config: MqttCinProducerConfig,
    normalizer: ContentNormalizer,
}

impl MqttCinProducer {
    pub fn new(client: AsyncClient, config: MqttCinProducerConfig) -> Self {
        let topic = request_topic(&config.origin, &config.cse_id);
        let normalizer = ContentNormalizer::new(config.region.clone());
        Self {
            client,
            topic,
            config,
            normalizer,
        }
    }
}

#[async_trait]
impl CinProducer for MqttCinProducer {
    async fn publish_row(&self, sensor_no: u32, fields: Map<String, Value>) -> DomainResult<()> {
        let con = self.normalizer.normalize(sensor_no, &fields);
        let to = sensor_data_path(
            &self.config.cse_id,
            &self.config.ae_name,
            &self.config.region,
            sensor_no,
        );
        let envelope =
            RequestEnvelope::create_cin(to, self.config.origin.clone(), &con, self.config.encoding)?;
        let payload = serde_json::to_vec(&envelope)
            .map_err(|e| DomainError::Parse(format!("Failed to serialize envelope: {}", e)))?;

        self.client
            .publish(self.topic.clone(), self.config.qos, false, payload)
            .await
            .context("MQTT publish failed")?;

        debug!(
            topic = %self.topic,
            to = %envelope.to,
            rqi = %envelope.rqi,
            sensor_no = sensor_no,
            "Published CIN request"
        );
        Ok(())
    }
}
