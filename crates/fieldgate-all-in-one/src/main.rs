mod config;
mod telemetry;

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use config::ServiceConfig;
use fieldgate_domain::{CinProducer, CseAdminPort, SensorDataSink, SensorRow};
use fieldgate_mqtt::{
    connect, qos_from_level, run_event_loop, MqttCinProducer, MqttCinProducerConfig,
    MqttSettings, SensorBridge,
};
use fieldgate_onem2m::{load_plan, CseHttpClient, Provisioner};
use fieldgate_replay::{load_rows, ScheduledFeeder};
use fieldgate_runner::Runner;
use telemetry::init_telemetry;

#[tokio::main]
async fn main() {
    let config = match ServiceConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_telemetry(&config.log_level);

    info!(
        cse_base_url = %config.cse_base_url,
        ae_name = %config.ae_name,
        region = %config.region,
        provision_enabled = config.provision_enabled,
        feeder_enabled = config.feeder_enabled,
        bridge_enabled = config.bridge_enabled,
        "Starting fieldgate"
    );

    let encoding = match config.content_encoding() {
        Ok(encoding) => encoding,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    let cse_client = match CseHttpClient::new(
        &config.cse_base_url,
        &config.cse_origin,
        &config.ae_name,
        Duration::from_millis(config.cse_timeout_ms),
    ) {
        Ok(client) => Arc::new(client.with_encoding(encoding)),
        Err(e) => {
            error!("Failed to create CSE client: {}", e);
            std::process::exit(1);
        }
    };

    if config.provision_enabled {
        if let Err(e) = provision(&config, cse_client.clone()).await {
            error!("Provisioning failed: {}", e);
            std::process::exit(1);
        }
    }

    if !config.feeder_enabled && !config.bridge_enabled {
        info!("Neither feeder nor bridge enabled, nothing left to run");
        return;
    }

    let qos = match qos_from_level(config.mqtt_qos) {
        Ok(qos) => qos,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    let (mqtt_client, eventloop) = connect(&MqttSettings {
        broker: config.mqtt_broker.clone(),
        port: config.mqtt_port,
        client_id_prefix: config.mqtt_client_id_prefix.clone(),
    });

    let mut runner = Runner::new();

    if config.feeder_enabled {
        let producer = MqttCinProducer::new(
            mqtt_client.clone(),
            MqttCinProducerConfig {
                origin: config.cse_origin.clone(),
                cse_id: config.cse_id.clone(),
                ae_name: config.ae_name.clone(),
                region: config.region.clone(),
                qos,
                encoding,
            },
        );
        let feeder = Arc::new(ScheduledFeeder::new(
            Arc::new(producer) as Arc<dyn CinProducer>,
            config.index_policy(),
            load_sources(&config),
        ));

        let rate = Duration::from_millis(config.feeder_rate_ms);
        let initial_delay = Duration::from_millis(config.feeder_initial_delay_ms);
        runner = runner.with_named_process("feeder", move |token| async move {
            feeder.run(rate, initial_delay, token).await
        });
    }

    let bridge = if config.bridge_enabled {
        let bridge = Arc::new(SensorBridge::from_topic_list(
            cse_client.clone() as Arc<dyn SensorDataSink>,
            config.bridge_topic_prefix.clone(),
            &config.bridge_topics,
        ));
        if bridge.topics().is_empty() {
            warn!("Bridge enabled but no topics configured");
        }
        Some(bridge)
    } else {
        None
    };

    runner = runner.with_named_process("mqtt_event_loop", move |token| async move {
        run_event_loop(mqtt_client, eventloop, bridge, qos, token).await
    });

    if let Err(e) = runner.with_closer_timeout(Duration::from_secs(10)).run().await {
        error!("Service stopped with error: {:#}", e);
        std::process::exit(1);
    }
    info!("Service stopped");
}

async fn provision(config: &ServiceConfig, admin: Arc<CseHttpClient>) -> anyhow::Result<()> {
    let plan = load_plan(&config.provision_plan)?;
    let provisioner = Provisioner::new(admin as Arc<dyn CseAdminPort>);
    provisioner.provision(&plan).await?;
    Ok(())
}

/// Loads every configured replay CSV. A file that fails to load becomes an
/// empty source so the remaining sensors still feed.
fn load_sources(config: &ServiceConfig) -> Vec<(u32, Vec<SensorRow>)> {
    config
        .feeder_sources()
        .into_iter()
        .map(|(sensor_no, path)| {
            let rows = match load_rows(&path) {
                Ok(rows) => rows,
                Err(e) => {
                    warn!(sensor_no = sensor_no, path = %path, error = %e, "Failed to load replay CSV");
                    Vec::new()
                }
            };
            (sensor_no, rows)
        })
        .collect()
}
