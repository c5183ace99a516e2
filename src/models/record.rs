use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One record as returned by Zoho, field names and types as-is.
///
/// Fields may be absent, null, or typed inconsistently between records of
/// the same module; nothing here is trusted until it passes the mapper.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceRecord(pub serde_json::Map<String, Value>);

impl SourceRecord {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Zoho record id, used for error descriptors and as the upsert key source.
    pub fn id(&self) -> Option<&str> {
        self.0.get("id").and_then(Value::as_str)
    }
}

/// A typed cell destined for one BigQuery column.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum CellValue {
    Null,
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Timestamp(DateTime<Utc>),
    Date(NaiveDate),
    /// Serialized JSON for Zoho lookup/object fields (Owner, Created_By, ...)
    Json(String),
}

/// A fully mapped row matching the target table schema.
///
/// Columns are kept in schema order so the warehouse client can build
/// positional query parameters without re-sorting.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetRow {
    pub key: String,
    pub last_modified: DateTime<Utc>,
    pub columns: Vec<(String, CellValue)>,
}

impl TargetRow {
    pub fn get(&self, column: &str) -> Option<&CellValue> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }
}

#[cfg(test)]
pub(crate) mod test_helpers {
    use super::*;
    use chrono::TimeZone;

    pub(crate) fn mock_datetime(year: i32, month: u32, day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, day, 10, 0, 0).unwrap()
    }

    pub(crate) fn mock_record(id: &str, modified: DateTime<Utc>) -> SourceRecord {
        let mut map = serde_json::Map::new();
        map.insert("id".to_string(), Value::String(id.to_string()));
        map.insert(
            "Modified_Time".to_string(),
            Value::String(modified.to_rfc3339()),
        );
        map.insert(
            "Last_Name".to_string(),
            Value::String(format!("mock record: {id}")),
        );
        SourceRecord(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_helpers::{mock_datetime, mock_record};

    #[test]
    fn test_record_id_accessor() {
        let record = mock_record("rec_1", mock_datetime(2025, 1, 1));
        assert_eq!(record.id(), Some("rec_1"));
        assert!(record.get("Last_Name").is_some());
        assert!(record.get("Missing_Field").is_none());
    }

    #[test]
    fn test_record_id_missing_or_non_string() {
        let record = SourceRecord(serde_json::Map::new());
        assert_eq!(record.id(), None);

        let mut map = serde_json::Map::new();
        map.insert("id".to_string(), Value::from(42));
        assert_eq!(SourceRecord(map).id(), None);
    }

    #[test]
    fn test_target_row_column_lookup() {
        let row = TargetRow {
            key: "rec_1".to_string(),
            last_modified: mock_datetime(2025, 1, 1),
            columns: vec![
                ("lead_id".to_string(), CellValue::String("rec_1".to_string())),
                ("email".to_string(), CellValue::Null),
            ],
        };
        assert_eq!(
            row.get("lead_id"),
            Some(&CellValue::String("rec_1".to_string()))
        );
        assert_eq!(row.get("email"), Some(&CellValue::Null));
        assert_eq!(row.get("phone"), None);
    }
}
