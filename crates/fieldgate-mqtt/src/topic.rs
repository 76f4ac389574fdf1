use fieldgate_domain::{DomainError, DomainResult};

/// Region and sensor number extracted from an inbound sensor topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTopic {
    pub region: String,
    pub sensor_no: u32,
}

/// Parses a sensor data topic of the form
/// `<prefix>_<region>_Sensor<n>_data`, where region is numeric.
pub fn parse_sensor_topic(topic: &str, prefix: &str) -> DomainResult<ParsedTopic> {
    let invalid = || DomainError::Parse(format!("Unrecognized sensor topic: {}", topic));

    let rest = topic
        .strip_prefix(prefix)
        .and_then(|r| r.strip_prefix('_'))
        .ok_or_else(invalid)?;
    let rest = rest.strip_suffix("_data").ok_or_else(invalid)?;
    let (region, sensor_part) = rest.rsplit_once('_').ok_or_else(invalid)?;

    if region.is_empty() || !region.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }

    let sensor_no = sensor_part
        .strip_prefix("Sensor")
        .and_then(|n| n.parse::<u32>().ok())
        .ok_or_else(invalid)?;

    Ok(ParsedTopic {
        region: region.to_string(),
        sensor_no,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_topic() {
        let parsed = parse_sensor_topic("Meta-Sejong_12_Sensor3_data", "Meta-Sejong").unwrap();
        assert_eq!(parsed.region, "12");
        assert_eq!(parsed.sensor_no, 3);
    }

    #[test]
    fn test_unrelated_topic_rejected() {
        assert!(parse_sensor_topic("unrelated/topic", "Meta-Sejong").is_err());
    }

    #[test]
    fn test_wrong_prefix_rejected() {
        assert!(parse_sensor_topic("Other_12_Sensor3_data", "Meta-Sejong").is_err());
    }

    #[test]
    fn test_missing_data_suffix_rejected() {
        assert!(parse_sensor_topic("Meta-Sejong_12_Sensor3", "Meta-Sejong").is_err());
    }

    #[test]
    fn test_non_numeric_region_rejected() {
        assert!(parse_sensor_topic("Meta-Sejong_ab_Sensor3_data", "Meta-Sejong").is_err());
    }

    #[test]
    fn test_malformed_sensor_segment_rejected() {
        assert!(parse_sensor_topic("Meta-Sejong_12_Sonsor3_data", "Meta-Sejong").is_err());
        assert!(parse_sensor_topic("Meta-Sejong_12_Sensor_data", "Meta-Sejong").is_err());
    }
}
