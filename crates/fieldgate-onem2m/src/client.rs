use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::StatusCode;
use serde_json::{Map, Value};
use tracing::{debug, info};

use fieldgate_domain::{
    cin_body, sensor_data_http_path, AeSpec, ContainerSpec, ContentEncoding, CreateOutcome,
    CseAdminPort, DomainError, DomainResult, SensorDataSink, SubscriptionSpec, RELEASE_VERSION,
    TY_AE, TY_CONTAINER, TY_CONTENT_INSTANCE, TY_SUBSCRIPTION,
};

/// HTTP client for a oneM2M CSE, covering both the administrative plane
/// (AE/container/subscription creation) and the data plane (CIN creation).
///
/// All calls are bounded by the configured request timeout; a slow CSE
/// delays only the call in flight.
pub struct CseHttpClient {
    http: reqwest::Client,
    base_url: String,
    origin: String,
    ae_name: String,
    encoding: ContentEncoding,
}

impl CseHttpClient {
    pub fn new(
        base_url: &str,
        origin: &str,
        ae_name: &str,
        timeout: Duration,
    ) -> DomainResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        info!(base_url = %base_url, origin = %origin, "Created CSE HTTP client");

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            origin: origin.to_string(),
            ae_name: ae_name.to_string(),
            encoding: ContentEncoding::default(),
        })
    }

    pub fn with_encoding(mut self, encoding: ContentEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    fn headers(&self, ty: u8) -> DomainResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "X-M2M-Origin",
            HeaderValue::from_str(&self.origin)
                .map_err(|e| DomainError::InvalidConfig(format!("Invalid originator: {}", e)))?,
        );
        headers.insert(
            "X-M2M-RI",
            HeaderValue::from_str(&uuid::Uuid::new_v4().to_string())
                .context("Invalid request id header")?,
        );
        headers.insert("X-M2M-RVI", HeaderValue::from_static(RELEASE_VERSION));
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_str(&format!("application/json;ty={}", ty))
                .context("Invalid content type header")?,
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    /// POSTs a resource body and maps the response to an explicit outcome:
    /// success is `Created`, a 409 conflict is `AlreadyExists`, everything
    /// else is an error.
    async fn create_resource(
        &self,
        path_and_query: &str,
        ty: u8,
        body: &Value,
    ) -> DomainResult<CreateOutcome> {
        let url = format!("{}{}", self.base_url, path_and_query);
        debug!(url = %url, ty = ty, "CSE create");

        let response = self
            .http
            .post(&url)
            .headers(self.headers(ty)?)
            .json(body)
            .send()
            .await
            .with_context(|| format!("CSE request failed: {}", url))?;

        let status = response.status();
        if status.is_success() {
            debug!(url = %url, status = %status, "CSE resource created");
            Ok(CreateOutcome::Created)
        } else if status == StatusCode::CONFLICT {
            debug!(url = %url, "CSE resource already exists");
            Ok(CreateOutcome::AlreadyExists)
        } else {
            Err(DomainError::CseRejected {
                status: status.as_u16(),
                path: path_and_query.to_string(),
            })
        }
    }
}

#[async_trait]
impl CseAdminPort for CseHttpClient {
    async fn create_ae(&self, spec: &AeSpec) -> DomainResult<CreateOutcome> {
        self.create_resource(&format!("?ty={}", TY_AE), TY_AE, &spec.resource_body())
            .await
    }

    async fn create_container(
        &self,
        parent_path: &str,
        spec: &ContainerSpec,
    ) -> DomainResult<CreateOutcome> {
        self.create_resource(
            &format!("{}?ty={}", parent_path, TY_CONTAINER),
            TY_CONTAINER,
            &spec.resource_body(),
        )
        .await
    }

    async fn create_subscription(
        &self,
        container_path: &str,
        spec: &SubscriptionSpec,
    ) -> DomainResult<CreateOutcome> {
        self.create_resource(
            &format!("{}?ty={}", container_path, TY_SUBSCRIPTION),
            TY_SUBSCRIPTION,
            &spec.resource_body(),
        )
        .await
    }
}

#[async_trait]
impl SensorDataSink for CseHttpClient {
    async fn post_sensor_data(
        &self,
        region: &str,
        sensor_no: u32,
        con: Map<String, Value>,
    ) -> DomainResult<()> {
        let path = sensor_data_http_path(&self.ae_name, region, sensor_no);
        let body = cin_body(&con, self.encoding)?;

        match self
            .create_resource(&path, TY_CONTENT_INSTANCE, &body)
            .await?
        {
            CreateOutcome::Created => Ok(()),
            // A CIN create should never conflict; treat it as done anyway.
            CreateOutcome::AlreadyExists => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = CseHttpClient::new(
            "http://127.0.0.1:7579/Mobius/",
            "CAdmin",
            "fd",
            Duration::from_millis(2000),
        )
        .unwrap();
        assert_eq!(client.base_url, "http://127.0.0.1:7579/Mobius");
    }

    #[test]
    fn test_headers_carry_origin_and_type() {
        let client = CseHttpClient::new(
            "http://127.0.0.1:7579/Mobius",
            "CAdmin",
            "fd",
            Duration::from_millis(2000),
        )
        .unwrap();
        let headers = client.headers(TY_CONTENT_INSTANCE).unwrap();
        assert_eq!(headers.get("X-M2M-Origin").unwrap(), "CAdmin");
        assert_eq!(headers.get("X-M2M-RVI").unwrap(), "3");
        assert_eq!(
            headers.get(CONTENT_TYPE).unwrap(),
            "application/json;ty=4"
        );
        assert!(!headers.get("X-M2M-RI").unwrap().is_empty());
    }

    #[test]
    fn test_fresh_request_id_per_call() {
        let client = CseHttpClient::new(
            "http://127.0.0.1:7579/Mobius",
            "CAdmin",
            "fd",
            Duration::from_millis(2000),
        )
        .unwrap();
        let a = client.headers(TY_AE).unwrap();
        let b = client.headers(TY_AE).unwrap();
        assert_ne!(a.get("X-M2M-RI").unwrap(), b.get("X-M2M-RI").unwrap());
    }
}
