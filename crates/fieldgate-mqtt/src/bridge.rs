use std::sync::Arc;
use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, Packet, QoS};
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use fieldgate_domain::{DomainError, DomainResult, SensorDataSink};

use crate::topic::parse_sensor_topic;

/// Marker field carried by CSE notification frames. Forwarding such a
/// frame would create a notify/re-publish cycle.
const NOTIFICATION_MARKER: &str = "m2m:sgn";

/// Explicit result of handling one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeOutcome {
    Forwarded { region: String, sensor_no: u32 },
    SkippedTopic,
    SkippedNotification,
}

/// Forwards live MQTT sensor telemetry to the CSE over HTTP.
pub struct SensorBridge {
    sink: Arc<dyn SensorDataSink>,
    topic_prefix: String,
    topics: Vec<String>,
}

impl SensorBridge {
    pub fn new(sink: Arc<dyn SensorDataSink>, topic_prefix: String, topics: Vec<String>) -> Self {
        Self {
            sink,
            topic_prefix,
            topics,
        }
    }

    /// Builds a bridge from the comma-separated topic list in the
    /// configuration.
    pub fn from_topic_list(
        sink: Arc<dyn SensorDataSink>,
        topic_prefix: String,
        topic_list: &str,
    ) -> Self {
        let topics = topic_list
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();
        Self::new(sink, topic_prefix, topics)
    }

    pub fn topics(&self) -> &[String] {
        &self.topics
    }

    /// Handles one inbound message. Unrecognized topics and notification
    /// frames are skipped; malformed payloads are errors the dispatch
    /// loop logs and moves past.
    pub async fn handle_message(
        &self,
        topic: &str,
        payload: &[u8],
    ) -> DomainResult<BridgeOutcome> {
        let parsed = match parse_sensor_topic(topic, &self.topic_prefix) {
            Ok(parsed) => parsed,
            Err(_) => return Ok(BridgeOutcome::SkippedTopic),
        };

        let root: Value = serde_json::from_slice(payload)
            .map_err(|e| DomainError::Parse(format!("Invalid JSON payload: {}", e)))?;

        if root.get(NOTIFICATION_MARKER).is_some() {
            return Ok(BridgeOutcome::SkippedNotification);
        }

        let temp = root
            .get("temp")
            .and_then(Value::as_f64)
            .ok_or_else(|| DomainError::Parse("Missing numeric temp field".to_string()))?;
        let ts = root
            .get("ts")
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| chrono::Local::now().to_rfc3339());
        let sid = root
            .get("sid")
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("R{}-S{}", parsed.region, parsed.sensor_no));

        let mut con = Map::new();
        con.insert("temp".to_string(), Value::from(temp));
        con.insert("ts".to_string(), Value::from(ts));
        con.insert("sid".to_string(), Value::from(sid));

        self.sink
            .post_sensor_data(&parsed.region, parsed.sensor_no, con)
            .await?;

        Ok(BridgeOutcome::Forwarded {
            region: parsed.region,
            sensor_no: parsed.sensor_no,
        })
    }
}

/// Drives the shared MQTT event loop: flushes queued producer requests,
/// re-subscribes the bridge topics on every (re)connect, and dispatches
/// inbound publishes to the bridge.
///
/// One message's failure never stops the loop.
pub async fn run_event_loop(
    client: AsyncClient,
    mut eventloop: EventLoop,
    bridge: Option<Arc<SensorBridge>>,
    qos: QoS,
    token: CancellationToken,
) -> anyhow::Result<()> {
    loop {
        tokio::select! {
            _ = token.cancelled() => {
                debug!("MQTT event loop cancelled");
                let _ = client.disconnect().await;
                return Ok(());
            }
            event = eventloop.poll() => {
                match event {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        info!("Connected to MQTT broker");
                        if let Some(bridge) = &bridge {
                            for topic in bridge.topics() {
                                match client.subscribe(topic.clone(), qos).await {
                                    Ok(()) => info!(topic = %topic, "Subscribed sensor topic"),
                                    Err(e) => error!(topic = %topic, error = %e, "Subscribe failed"),
                                }
                            }
                        }
                    }
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        if let Some(bridge) = &bridge {
                            match bridge.handle_message(&publish.topic, &publish.payload).await {
                                Ok(BridgeOutcome::Forwarded { region, sensor_no }) => {
                                    debug!(
                                        topic = %publish.topic,
                                        region = %region,
                                        sensor_no = sensor_no,
                                        "Forwarded sensor message to CSE"
                                    );
                                }
                                Ok(BridgeOutcome::SkippedTopic) => {
                                    debug!(topic = %publish.topic, "Skip: unrecognized topic");
                                }
                                Ok(BridgeOutcome::SkippedNotification) => {
                                    debug!(topic = %publish.topic, "Skip: notification frame");
                                }
                                Err(e) => {
                                    warn!(topic = %publish.topic, error = %e, "Bridge message failed");
                                }
                            }
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!(error = %e, "MQTT event loop error");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        }
    }
}
