use serde::Serialize;
use serde_json::{Map, Value};

use crate::content::{cin_body, ContentEncoding};
use crate::error::DomainResult;

pub const TY_AE: u8 = 2;
pub const TY_CONTAINER: u8 = 3;
pub const TY_CONTENT_INSTANCE: u8 = 4;
pub const TY_SUBSCRIPTION: u8 = 23;

pub const RELEASE_VERSION: &str = "3";

/// oneM2M request primitive for the broker transport.
///
/// Serialized field order matches the wire convention:
/// op, to, fr, rqi, rvi, ty, pc.
#[derive(Debug, Clone, Serialize)]
pub struct RequestEnvelope {
    pub op: u8,
    pub to: String,
    pub fr: String,
    pub rqi: String,
    pub rvi: String,
    pub ty: u8,
    pub pc: Value,
}

impl RequestEnvelope {
    /// Builds a CIN-create request. `rqi` is a fresh correlation id per call,
    /// used for tracing only.
    pub fn create_cin(
        to: impl Into<String>,
        fr: impl Into<String>,
        con: &Map<String, Value>,
        encoding: ContentEncoding,
    ) -> DomainResult<Self> {
        Ok(Self {
            op: 1,
            to: to.into(),
            fr: fr.into(),
            rqi: uuid::Uuid::new_v4().to_string(),
            rvi: RELEASE_VERSION.to_string(),
            ty: TY_CONTENT_INSTANCE,
            pc: cin_body(con, encoding)?,
        })
    }
}

/// Outbound request topic: `/oneM2M/req/<originator>/<cseId>/json`.
pub fn request_topic(origin: &str, cse_id: &str) -> String {
    format!("/oneM2M/req/{}/{}/json", origin, cse_id)
}

/// Broker-form target path: `/<cseId>/<AE>/<region>/Sensor<n>/data`.
pub fn sensor_data_path(cse_id: &str, ae: &str, region: &str, sensor_no: u32) -> String {
    format!("/{}/{}/{}/Sensor{}/data", cse_id, ae, region, sensor_no)
}

/// HTTP-form path relative to the CSE base URL, including the resource-type
/// query: `/<AE>/<region>/Sensor<n>/data?ty=4`.
pub fn sensor_data_http_path(ae: &str, region: &str, sensor_no: u32) -> String {
    let ae = ae.trim_start_matches('/');
    format!(
        "/{}/{}/Sensor{}/data?ty={}",
        ae, region, sensor_no, TY_CONTENT_INSTANCE
    )
}
