use serde_json::{Map, Value};

/// One replay record: an ordered mapping of field name to a best-effort
/// typed value. Canonical keys are `temp` (always present, numeric),
/// `fire_alarm` (integer) and `ts` (string); other source columns are
/// carried through untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorRow {
    pub fields: Map<String, Value>,
}

impl SensorRow {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    pub fn temp(&self) -> Option<f64> {
        self.fields.get("temp").and_then(Value::as_f64)
    }
}

/// Coerces a raw CSV cell into a typed value: integer first, then float,
/// then string. Blank cells coerce to nothing.
pub fn coerce_field(raw: &str) -> Option<Value> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(i) = raw.parse::<i64>() {
        return Some(Value::from(i));
    }
    if let Ok(f) = raw.parse::<f64>() {
        return Some(Value::from(f));
    }
    Some(Value::from(raw))
}
