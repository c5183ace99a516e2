use crate::error::{AppError, Result};
use crate::models::{CellValue, SourceRecord, TargetRow};
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;

/// Zoho field carrying the record's modification time, present on every module.
pub const MODIFIED_TIME_FIELD: &str = "Modified_Time";

/// Value written to the `sync_source` metadata column on every row.
pub const SYNC_SOURCE: &str = "zoho-bigquery-sync";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    String,
    Integer,
    Float,
    Boolean,
    Timestamp,
    Date,
    /// Zoho lookup/object fields, stored as serialized JSON
    Json,
}

/// What to write when the source field is absent or null.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnDefault {
    Null,
    /// Type zero-value: "" / 0 / 0.0 / false. Falls back to null for
    /// timestamp, date and json columns, which have no sensible zero.
    ZeroValue,
}

#[derive(Debug, Clone)]
pub struct ColumnSpec {
    pub source_field: &'static str,
    pub column: &'static str,
    pub ty: ColumnType,
    pub default: ColumnDefault,
}

impl ColumnSpec {
    pub const fn nullable(
        source_field: &'static str,
        column: &'static str,
        ty: ColumnType,
    ) -> Self {
        Self {
            source_field,
            column,
            ty,
            default: ColumnDefault::Null,
        }
    }

    pub const fn zeroed(source_field: &'static str, column: &'static str, ty: ColumnType) -> Self {
        Self {
            source_field,
            column,
            ty,
            default: ColumnDefault::ZeroValue,
        }
    }
}

/// Fixed mapping from one Zoho module to one BigQuery table.
#[derive(Debug, Clone)]
pub struct SourceSpec {
    pub id: &'static str,
    pub zoho_module: &'static str,
    pub table: &'static str,
    pub key_column: &'static str,
    pub columns: Vec<ColumnSpec>,
}

/// Map one source record into a target row.
///
/// Pure given its arguments: the caller supplies `synced_at` for the
/// `sync_timestamp` metadata column. A coercion failure marks only this
/// record invalid; the caller excludes it and continues with the batch.
pub fn map_record(
    spec: &SourceSpec,
    record: &SourceRecord,
    synced_at: DateTime<Utc>,
) -> Result<TargetRow> {
    let record_id = record
        .id()
        .ok_or_else(|| AppError::Mapping {
            record_id: "<unknown>".to_string(),
            field: "id".to_string(),
            message: "record has no string id".to_string(),
        })?
        .to_string();

    let last_modified = match record.get(MODIFIED_TIME_FIELD) {
        Some(value) => match coerce(value, ColumnType::Timestamp) {
            Ok(CellValue::Timestamp(ts)) => ts,
            Ok(_) | Err(_) => {
                return Err(mapping_error(
                    &record_id,
                    MODIFIED_TIME_FIELD,
                    format!("unparseable modification time: {}", value),
                ));
            }
        },
        None => {
            return Err(mapping_error(
                &record_id,
                MODIFIED_TIME_FIELD,
                "record has no modification time".to_string(),
            ));
        }
    };

    let mut columns = Vec::with_capacity(spec.columns.len() + 3);
    columns.push((
        spec.key_column.to_string(),
        CellValue::String(record_id.clone()),
    ));

    for column in &spec.columns {
        let cell = match record.get(column.source_field) {
            None | Some(Value::Null) => default_cell(column),
            Some(value) => coerce(value, column.ty).map_err(|message| {
                mapping_error(&record_id, column.source_field, message)
            })?,
        };
        columns.push((column.column.to_string(), cell));
    }

    columns.push(("sync_timestamp".to_string(), CellValue::Timestamp(synced_at)));
    columns.push((
        "sync_source".to_string(),
        CellValue::String(SYNC_SOURCE.to_string()),
    ));

    Ok(TargetRow {
        key: record_id,
        last_modified,
        columns,
    })
}

fn mapping_error(record_id: &str, field: &str, message: String) -> AppError {
    AppError::Mapping {
        record_id: record_id.to_string(),
        field: field.to_string(),
        message,
    }
}

fn default_cell(column: &ColumnSpec) -> CellValue {
    match column.default {
        ColumnDefault::Null => CellValue::Null,
        ColumnDefault::ZeroValue => match column.ty {
            ColumnType::String => CellValue::String(String::new()),
            ColumnType::Integer => CellValue::Integer(0),
            ColumnType::Float => CellValue::Float(0.0),
            ColumnType::Boolean => CellValue::Bool(false),
            ColumnType::Timestamp | ColumnType::Date | ColumnType::Json => CellValue::Null,
        },
    }
}

fn coerce(value: &Value, ty: ColumnType) -> std::result::Result<CellValue, String> {
    match ty {
        ColumnType::String => match value {
            Value::String(s) => Ok(CellValue::String(s.clone())),
            Value::Number(n) => Ok(CellValue::String(n.to_string())),
            Value::Bool(b) => Ok(CellValue::String(b.to_string())),
            other => Err(format!("cannot coerce {} to string", type_name(other))),
        },
        ColumnType::Integer => match value {
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(CellValue::Integer(i))
                } else if let Some(f) = n.as_f64() {
                    if f.fract() == 0.0 {
                        Ok(CellValue::Integer(f as i64))
                    } else {
                        Err(format!("non-integral value {} for integer column", f))
                    }
                } else {
                    Err(format!("numeric value {} out of integer range", n))
                }
            }
            Value::String(s) => s
                .trim()
                .parse::<i64>()
                .map(CellValue::Integer)
                .map_err(|_| format!("non-numeric value '{}' for integer column", s)),
            other => Err(format!("cannot coerce {} to integer", type_name(other))),
        },
        ColumnType::Float => match value {
            Value::Number(n) => n
                .as_f64()
                .map(CellValue::Float)
                .ok_or_else(|| format!("numeric value {} out of float range", n)),
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .map(CellValue::Float)
                .map_err(|_| format!("non-numeric value '{}' for float column", s)),
            other => Err(format!("cannot coerce {} to float", type_name(other))),
        },
        ColumnType::Boolean => match value {
            Value::Bool(b) => Ok(CellValue::Bool(*b)),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" => Ok(CellValue::Bool(true)),
                "false" | "no" => Ok(CellValue::Bool(false)),
                other => Err(format!("non-boolean value '{}' for boolean column", other)),
            },
            other => Err(format!("cannot coerce {} to boolean", type_name(other))),
        },
        ColumnType::Timestamp => match value {
            Value::String(s) => DateTime::parse_from_rfc3339(s)
                .map(|ts| CellValue::Timestamp(ts.with_timezone(&Utc)))
                .map_err(|e| format!("invalid timestamp '{}': {}", s, e)),
            other => Err(format!("cannot coerce {} to timestamp", type_name(other))),
        },
        ColumnType::Date => match value {
            Value::String(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                .map(CellValue::Date)
                .map_err(|e| format!("invalid date '{}': {}", s, e)),
            other => Err(format!("cannot coerce {} to date", type_name(other))),
        },
        ColumnType::Json => match value {
            Value::Object(_) | Value::Array(_) | Value::String(_) => serde_json::to_string(value)
                .map(CellValue::Json)
                .map_err(|e| format!("unserializable json value: {}", e)),
            other => Err(format!("cannot coerce {} to json", type_name(other))),
        },
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
