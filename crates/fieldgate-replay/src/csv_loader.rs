use serde_json::{Map, Value};
use tracing::{info, warn};

use fieldgate_domain::{coerce_field, DomainError, DomainResult, SensorRow};

const TS_HEADERS: [&str; 4] = ["ts", "time", "timestamp", "datetime"];

/// Loads one replay CSV into an immutable row list.
///
/// The temperature column is detected by prefix (`temperature`/`temp`);
/// `fire_alarm` matches exactly and defaults to 0 when the column is
/// absent; the timestamp column is any of ts/time/timestamp/datetime.
/// Rows without a usable temperature are skipped with a warning. A file
/// without a temperature column yields an empty list.
pub fn load_rows(path: &str) -> DomainResult<Vec<SensorRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)
        .map_err(|e| DomainError::Parse(format!("CSV open failed {}: {}", path, e)))?;

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| DomainError::Parse(format!("CSV header read failed {}: {}", path, e)))?
        .iter()
        .map(str::to_string)
        .collect();

    let temp_idx = headers.iter().position(|h| {
        let h = h.to_lowercase();
        h.starts_with("temperature") || h.starts_with("temp")
    });
    let fire_idx = headers
        .iter()
        .position(|h| h.to_lowercase() == "fire_alarm");
    let ts_idx = headers
        .iter()
        .position(|h| TS_HEADERS.contains(&h.to_lowercase().as_str()));

    let Some(temp_idx) = temp_idx else {
        warn!(path = %path, headers = ?headers, "Temperature column not found");
        return Ok(Vec::new());
    };
    if fire_idx.is_none() {
        info!(path = %path, "No fire_alarm column, defaulting to 0");
    }

    let mut rows = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                warn!(path = %path, line = line + 2, error = %e, "Skip unreadable line");
                continue;
            }
        };

        let temp = record
            .get(temp_idx)
            .and_then(coerce_field)
            .filter(Value::is_number);
        let Some(temp) = temp else {
            warn!(path = %path, line = line + 2, "Skip malformed line");
            continue;
        };

        let mut fields = Map::new();
        fields.insert("temp".to_string(), temp);

        let fire_alarm = fire_idx
            .and_then(|idx| record.get(idx))
            .and_then(coerce_field)
            .filter(|v| v.is_i64() || v.is_u64())
            .unwrap_or_else(|| Value::from(0));
        fields.insert("fire_alarm".to_string(), fire_alarm);

        if let Some(ts) = ts_idx.and_then(|idx| record.get(idx)).map(str::trim) {
            if !ts.is_empty() {
                fields.insert("ts".to_string(), Value::from(ts));
            }
        }

        for (idx, header) in headers.iter().enumerate() {
            if idx == temp_idx || Some(idx) == fire_idx || Some(idx) == ts_idx {
                continue;
            }
            if let Some(value) = record.get(idx).and_then(coerce_field) {
                fields.insert(header.clone(), value);
            }
        }

        rows.push(SensorRow::new(fields));
    }

    info!(path = %path, rows = rows.len(), "CSV loaded");
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    #[test]
    fn test_load_rows_with_all_columns() {
        let file = write_csv("temperature,fire_alarm,ts\n21.34,0,T1\n22.0,1,T2\n");
        let rows = load_rows(file.path().to_str().unwrap()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].temp(), Some(21.34));
        assert_eq!(rows[0].fields["fire_alarm"], Value::from(0));
        assert_eq!(rows[0].fields["ts"], Value::from("T1"));
        assert_eq!(rows[1].fields["fire_alarm"], Value::from(1));
    }

    #[test]
    fn test_fire_alarm_defaults_when_column_missing() {
        let file = write_csv("temp\n20.5\n");
        let rows = load_rows(file.path().to_str().unwrap()).unwrap();
        assert_eq!(rows[0].fields["fire_alarm"], Value::from(0));
        assert!(!rows[0].fields.contains_key("ts"));
    }

    #[test]
    fn test_malformed_temperature_rows_skipped() {
        let file = write_csv("temp,ts\nnot-a-number,T1\n21.0,T2\n,T3\n");
        let rows = load_rows(file.path().to_str().unwrap()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].fields["ts"], Value::from("T2"));
    }

    #[test]
    fn test_missing_temperature_column_yields_empty_list() {
        let file = write_csv("humidity,ts\n55,T1\n");
        let rows = load_rows(file.path().to_str().unwrap()).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_extra_columns_preserved_with_typing() {
        let file = write_csv("temp,humidity,label\n21.0,55,north\n");
        let rows = load_rows(file.path().to_str().unwrap()).unwrap();
        assert_eq!(rows[0].fields["humidity"], Value::from(55));
        assert_eq!(rows[0].fields["label"], Value::from("north"));
        let keys: Vec<&str> = rows[0].fields.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["temp", "fire_alarm", "humidity", "label"]);
    }

    #[test]
    fn test_missing_file_is_error() {
        assert!(load_rows("/nonexistent/rows.csv").is_err());
    }
}
