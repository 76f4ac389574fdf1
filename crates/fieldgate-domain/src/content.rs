use serde_json::{Map, Value};

use crate::error::{DomainError, DomainResult};

/// How the CIN `con` value is encoded on the wire.
///
/// `Stringified` wraps the content object in a JSON string, which some CSE
/// deployments handle more reliably than an embedded object. It is the
/// default for that reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContentEncoding {
    Embedded,
    #[default]
    Stringified,
}

/// Normalizes sensor field maps into the canonical CIN content shape.
///
/// Rules:
/// - `temp` is rounded to one decimal place when numeric
/// - `fire_alarm` becomes an integer, defaulting to 0 when absent or unusable
/// - `ts` defaults to the current local time (RFC 3339) when absent or blank
/// - `sid` defaults to `<region>-S<sensor_no>` when absent or blank
///
/// Normalizing an already-normalized map yields the same map.
#[derive(Debug, Clone)]
pub struct ContentNormalizer {
    region: String,
}

impl ContentNormalizer {
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
        }
    }

    pub fn normalize(&self, sensor_no: u32, fields: &Map<String, Value>) -> Map<String, Value> {
        let mut con = fields.clone();

        if let Some(temp) = con.get("temp").and_then(Value::as_f64) {
            let rounded = (temp * 10.0).round() / 10.0;
            if let Some(n) = serde_json::Number::from_f64(rounded) {
                con.insert("temp".to_string(), Value::Number(n));
            }
        }

        let fire_alarm = match con.get("fire_alarm") {
            Some(v) if v.is_i64() || v.is_u64() => v.clone(),
            Some(v) => Value::from(v.as_f64().map(|f| f as i64).unwrap_or(0)),
            None => Value::from(0),
        };
        con.insert("fire_alarm".to_string(), fire_alarm);

        if is_absent_or_blank(con.get("ts")) {
            con.insert(
                "ts".to_string(),
                Value::from(chrono::Local::now().to_rfc3339()),
            );
        }

        if is_absent_or_blank(con.get("sid")) {
            con.insert(
                "sid".to_string(),
                Value::from(format!("{}-S{}", self.region, sensor_no)),
            );
        }

        con
    }

    pub fn region(&self) -> &str {
        &self.region
    }
}

fn is_absent_or_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(_) => false,
    }
}

/// Builds the `m2m:cin` request body around normalized content.
pub fn cin_body(con: &Map<String, Value>, encoding: ContentEncoding) -> DomainResult<Value> {
    let con_value = match encoding {
        ContentEncoding::Embedded => Value::Object(con.clone()),
        ContentEncoding::Stringified => {
            let raw = serde_json::to_string(con)
                .map_err(|e| DomainError::Parse(format!("Failed to stringify con: {}", e)))?;
            Value::from(raw)
        }
    };

    Ok(serde_json::json!({
        "m2m:cin": {
            "cnf": "application/json",
            "con": con_value,
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(entries: &[(&str, Value)]) -> Map<String, Value> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_temp_rounded_to_one_decimal() {
        let normalizer = ContentNormalizer::new("12");
        let con = normalizer.normalize(1, &fields(&[("temp", Value::from(21.34))]));
        assert_eq!(con.get("temp").and_then(Value::as_f64), Some(21.3));
    }

    #[test]
    fn test_fire_alarm_defaults_to_zero() {
        let normalizer = ContentNormalizer::new("12");
        let con = normalizer.normalize(1, &fields(&[("temp", Value::from(20.0))]));
        assert_eq!(con.get("fire_alarm").and_then(Value::as_i64), Some(0));
    }

    #[test]
    fn test_fire_alarm_kept_when_present() {
        let normalizer = ContentNormalizer::new("12");
        let con = normalizer.normalize(
            1,
            &fields(&[("temp", Value::from(20.0)), ("fire_alarm", Value::from(1))]),
        );
        assert_eq!(con.get("fire_alarm").and_then(Value::as_i64), Some(1));
    }

    #[test]
    fn test_ts_and_sid_defaults() {
        let normalizer = ContentNormalizer::new("12");
        let con = normalizer.normalize(3, &fields(&[("temp", Value::from(20.0))]));
        assert!(con.get("ts").and_then(Value::as_str).is_some());
        assert_eq!(con.get("sid").and_then(Value::as_str), Some("12-S3"));
    }

    #[test]
    fn test_present_ts_and_sid_pass_through() {
        let normalizer = ContentNormalizer::new("12");
        let con = normalizer.normalize(
            3,
            &fields(&[
                ("temp", Value::from(20.0)),
                ("ts", Value::from("2025-01-01T00:00:00+09:00")),
                ("sid", Value::from("station-7")),
            ]),
        );
        assert_eq!(
            con.get("ts").and_then(Value::as_str),
            Some("2025-01-01T00:00:00+09:00")
        );
        assert_eq!(con.get("sid").and_then(Value::as_str), Some("station-7"));
    }

    #[test]
    fn test_blank_sid_is_replaced() {
        let normalizer = ContentNormalizer::new("12");
        let con = normalizer.normalize(
            2,
            &fields(&[("temp", Value::from(20.0)), ("sid", Value::from("  "))]),
        );
        assert_eq!(con.get("sid").and_then(Value::as_str), Some("12-S2"));
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let normalizer = ContentNormalizer::new("12");
        let once = normalizer.normalize(
            1,
            &fields(&[
                ("temp", Value::from(21.34)),
                ("ts", Value::from("2025-01-01T00:00:00+09:00")),
            ]),
        );
        let twice = normalizer.normalize(1, &once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_extra_fields_preserved() {
        let normalizer = ContentNormalizer::new("12");
        let con = normalizer.normalize(
            1,
            &fields(&[("temp", Value::from(20.0)), ("humidity", Value::from(55))]),
        );
        assert_eq!(con.get("humidity").and_then(Value::as_i64), Some(55));
    }

    #[test]
    fn test_cin_body_embedded() {
        let con = fields(&[("temp", Value::from(21.3))]);
        let body = cin_body(&con, ContentEncoding::Embedded).unwrap();
        assert_eq!(body["m2m:cin"]["cnf"], "application/json");
        assert_eq!(body["m2m:cin"]["con"]["temp"], 21.3);
    }

    #[test]
    fn test_cin_body_stringified() {
        let con = fields(&[("temp", Value::from(21.3))]);
        let body = cin_body(&con, ContentEncoding::Stringified).unwrap();
        let raw = body["m2m:cin"]["con"].as_str().unwrap();
        let parsed: Value = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed["temp"], 21.3);
    }
}
