/*!
Typed summaries produced for each autonomous system.

The serialized field names follow the published JSON output format, e.g.:

```json
{
  "AutonomousSystem": 6830,
  "AutonomousSystemPaths": [
    {
      "ModificationTime": 1474983369,
      "FromIP": "212.25.27.44",
      "FromASN": 8758,
      "Prefix": "0.0.0.0/0",
      "AutonomousSystemPath": [8758, 6830]
    }
  ],
  "Prefixes": ["0.0.0.0/0"]
}
```
*/
use serde::{Deserialize, Serialize};

/// One observed route for an AS: who told us, when, for which prefix, and over which path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeenAsPath {
    /// Unix timestamp of the table entry.
    #[serde(rename = "ModificationTime")]
    pub modification_time: i64,
    #[serde(rename = "FromIP")]
    pub from_ip: String,
    #[serde(rename = "FromASN")]
    pub from_asn: u32,
    #[serde(rename = "Prefix")]
    pub prefix: String,
    /// AS path with any AS-SET members flattened in place.
    #[serde(rename = "AutonomousSystemPath")]
    pub as_path: Vec<u32>,
}

/// Everything distilled for a single AS. Built once during emission and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatedRecord {
    #[serde(rename = "AutonomousSystem")]
    pub autonomous_system: u32,
    #[serde(rename = "AutonomousSystemPaths")]
    pub autonomous_system_paths: Vec<SeenAsPath>,
    /// Distinct prefixes in the order they were first seen.
    #[serde(rename = "Prefixes")]
    pub prefixes: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_serialized_field_names() {
        let record = AggregatedRecord {
            autonomous_system: 6830,
            autonomous_system_paths: vec![SeenAsPath {
                modification_time: 1474983369,
                from_ip: "212.25.27.44".to_string(),
                from_asn: 8758,
                prefix: "0.0.0.0/0".to_string(),
                as_path: vec![8758, 6830],
            }],
            prefixes: vec!["0.0.0.0/0".to_string()],
        };

        assert_eq!(
            serde_json::to_value(&record).unwrap(),
            json!({
                "AutonomousSystem": 6830,
                "AutonomousSystemPaths": [{
                    "ModificationTime": 1474983369,
                    "FromIP": "212.25.27.44",
                    "FromASN": 8758,
                    "Prefix": "0.0.0.0/0",
                    "AutonomousSystemPath": [8758, 6830],
                }],
                "Prefixes": ["0.0.0.0/0"],
            })
        );
    }

    #[test]
    fn test_empty_path_is_array() {
        let seen = SeenAsPath::default();
        let value = serde_json::to_value(&seen).unwrap();
        assert_eq!(value["AutonomousSystemPath"], json!([]));
        assert_eq!(value["ModificationTime"], json!(0));
    }
}
