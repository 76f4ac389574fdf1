use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::DomainResult;
use crate::plan::{AeSpec, ContainerSpec, SubscriptionSpec};

/// Result of a resource create against the CSE. A conflict response means
/// the resource is already provisioned and is not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Created,
    AlreadyExists,
}

/// Publishes one sensor reading as a CIN-create request over the broker
/// transport.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait CinProducer: Send + Sync {
    async fn publish_row(&self, sensor_no: u32, fields: Map<String, Value>) -> DomainResult<()>;
}

/// Posts normalized sensor content to the CSE over HTTP.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait SensorDataSink: Send + Sync {
    async fn post_sensor_data(
        &self,
        region: &str,
        sensor_no: u32,
        con: Map<String, Value>,
    ) -> DomainResult<()>;
}

/// Administrative resource creation against the CSE, used by the
/// provisioner.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait CseAdminPort: Send + Sync {
    async fn create_ae(&self, spec: &AeSpec) -> DomainResult<CreateOutcome>;

    async fn create_container(
        &self,
        parent_path: &str,
        spec: &ContainerSpec,
    ) -> DomainResult<CreateOutcome>;

    async fn create_subscription(
        &self,
        container_path: &str,
        spec: &SubscriptionSpec,
    ) -> DomainResult<CreateOutcome>;
}
