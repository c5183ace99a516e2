//! Pure builders for BigQuery schema payloads and the parameterized
//! MERGE statement the loader runs per chunk.

use crate::mapping::{ColumnType, SourceSpec};
use crate::models::{CellValue, TargetRow};
use chrono::SecondsFormat;
use serde_json::{Value, json};
use std::collections::{HashMap, HashSet};

/// One field in a table schema payload.
#[derive(Debug, Clone, PartialEq)]
pub struct TableField {
    pub name: String,
    pub field_type: &'static str,
    pub mode: &'static str,
}

/// Table schema type for a mapped column.
fn field_type(ty: ColumnType) -> &'static str {
    match ty {
        ColumnType::String => "STRING",
        ColumnType::Integer => "INTEGER",
        ColumnType::Float => "FLOAT",
        ColumnType::Boolean => "BOOLEAN",
        ColumnType::Timestamp => "TIMESTAMP",
        ColumnType::Date => "DATE",
        ColumnType::Json => "JSON",
    }
}

/// Standard SQL type used when binding the column as a query parameter.
/// JSON columns are bound as STRING and parsed inside the MERGE.
fn parameter_type(ty: ColumnType) -> &'static str {
    match ty {
        ColumnType::String | ColumnType::Json => "STRING",
        ColumnType::Integer => "INT64",
        ColumnType::Float => "FLOAT64",
        ColumnType::Boolean => "BOOL",
        ColumnType::Timestamp => "TIMESTAMP",
        ColumnType::Date => "DATE",
    }
}

/// Column name/type pairs in table order: key, mapped columns, sync metadata.
fn column_layout(spec: &SourceSpec) -> Vec<(String, ColumnType)> {
    let mut layout = Vec::with_capacity(spec.columns.len() + 3);
    layout.push((spec.key_column.to_string(), ColumnType::String));
    for column in &spec.columns {
        layout.push((column.column.to_string(), column.ty));
    }
    layout.push(("sync_timestamp".to_string(), ColumnType::Timestamp));
    layout.push(("sync_source".to_string(), ColumnType::String));
    layout
}

/// Full desired schema for a source's table.
pub fn table_fields(spec: &SourceSpec) -> Vec<TableField> {
    column_layout(spec)
        .into_iter()
        .map(|(name, ty)| {
            let mode = if name == spec.key_column {
                "REQUIRED"
            } else {
                "NULLABLE"
            };
            TableField {
                name,
                field_type: field_type(ty),
                mode,
            }
        })
        .collect()
}

pub fn fields_json(fields: &[TableField]) -> Value {
    Value::Array(
        fields
            .iter()
            .map(|f| json!({ "name": f.name, "type": f.field_type, "mode": f.mode }))
            .collect(),
    )
}

/// Desired fields not present in the live table. These get appended via a
/// schema patch; nothing is ever removed or retyped.
pub fn missing_fields(existing_names: &HashSet<String>, desired: &[TableField]) -> Vec<TableField> {
    desired
        .iter()
        .filter(|f| !existing_names.contains(&f.name))
        .cloned()
        .collect()
}

/// The per-chunk MERGE. Rows arrive as an ARRAY<STRUCT> named parameter;
/// matched keys have every non-key column replaced, new keys are inserted.
pub fn merge_sql(project_id: &str, dataset_id: &str, spec: &SourceSpec) -> String {
    let layout = column_layout(spec);
    let table_ref = format!("{}.{}.{}", project_id, dataset_id, spec.table);

    let assignments = layout
        .iter()
        .filter(|(name, _)| name != spec.key_column)
        .map(|(name, ty)| format!("T.`{}` = {}", name, source_expr(name, *ty)))
        .collect::<Vec<_>>()
        .join(", ");

    let insert_columns = layout
        .iter()
        .map(|(name, _)| format!("`{}`", name))
        .collect::<Vec<_>>()
        .join(", ");

    let insert_values = layout
        .iter()
        .map(|(name, ty)| source_expr(name, *ty))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "MERGE `{}` T USING (SELECT * FROM UNNEST(@rows)) S \
         ON T.`{key}` = S.`{key}` \
         WHEN MATCHED THEN UPDATE SET {} \
         WHEN NOT MATCHED THEN INSERT ({}) VALUES ({})",
        table_ref,
        assignments,
        insert_columns,
        insert_values,
        key = spec.key_column,
    )
}

fn source_expr(name: &str, ty: ColumnType) -> String {
    match ty {
        ColumnType::Json => format!("SAFE.PARSE_JSON(S.`{}`)", name),
        _ => format!("S.`{}`", name),
    }
}

/// MERGE rejects a source carrying the same key twice, so a chunk keeps only
/// the last row per key. Pages arrive in Modified_Time order, which makes
/// this last-write-wins.
fn dedup_last_wins(rows: &[TargetRow]) -> Vec<&TargetRow> {
    let mut seen: HashMap<&str, usize> = HashMap::new();
    let mut deduped: Vec<&TargetRow> = Vec::with_capacity(rows.len());
    for row in rows {
        match seen.get(row.key.as_str()) {
            Some(&i) => deduped[i] = row,
            None => {
                seen.insert(row.key.as_str(), deduped.len());
                deduped.push(row);
            }
        }
    }
    deduped
}

/// Named query parameter `@rows` carrying one chunk of target rows.
pub fn rows_parameter(spec: &SourceSpec, rows: &[TargetRow]) -> Value {
    let layout = column_layout(spec);

    let struct_types: Vec<Value> = layout
        .iter()
        .map(|(name, ty)| json!({ "name": name, "type": { "type": parameter_type(*ty) } }))
        .collect();

    let array_values: Vec<Value> = dedup_last_wins(rows)
        .into_iter()
        .map(|row| {
            let struct_values: serde_json::Map<String, Value> = layout
                .iter()
                .map(|(name, _)| {
                    let cell = row.get(name).unwrap_or(&CellValue::Null);
                    (name.clone(), json!({ "value": cell_parameter_value(cell) }))
                })
                .collect();
            json!({ "structValues": struct_values })
        })
        .collect();

    json!({
        "name": "rows",
        "parameterType": {
            "type": "ARRAY",
            "arrayType": { "type": "STRUCT", "structTypes": struct_types }
        },
        "parameterValue": { "arrayValues": array_values }
    })
}

fn cell_parameter_value(cell: &CellValue) -> Value {
    match cell {
        CellValue::Null => Value::Null,
        CellValue::String(s) | CellValue::Json(s) => Value::String(s.clone()),
        CellValue::Integer(i) => Value::String(i.to_string()),
        CellValue::Float(f) => Value::String(f.to_string()),
        CellValue::Bool(b) => Value::String(b.to_string()),
        CellValue::Timestamp(ts) => {
            Value::String(ts.to_rfc3339_opts(SecondsFormat::Micros, true))
        }
        CellValue::Date(d) => Value::String(d.format("%Y-%m-%d").to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{ColumnSpec, SourceSpec};
    use crate::models::record::test_helpers::mock_datetime;

    fn test_spec() -> SourceSpec {
        SourceSpec {
            id: "deals",
            zoho_module: "Deals",
            table: "zoho_deals",
            key_column: "deal_id",
            columns: vec![
                ColumnSpec::nullable("Stage", "stage", ColumnType::String),
                ColumnSpec::nullable("Amount", "amount", ColumnType::Float),
                ColumnSpec::nullable("Owner", "owner", ColumnType::Json),
            ],
        }
    }

    #[test]
    fn test_table_fields_layout() {
        let fields = table_fields(&test_spec());
        let names: Vec<_> = fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["deal_id", "stage", "amount", "owner", "sync_timestamp", "sync_source"]
        );
        assert_eq!(fields[0].mode, "REQUIRED");
        assert_eq!(fields[1].mode, "NULLABLE");
        assert_eq!(fields[2].field_type, "FLOAT");
        assert_eq!(fields[3].field_type, "JSON");
        assert_eq!(fields[4].field_type, "TIMESTAMP");
    }

    #[test]
    fn test_missing_fields_is_additive_only() {
        let desired = table_fields(&test_spec());
        let existing: HashSet<String> = ["deal_id", "stage", "legacy_column"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let missing = missing_fields(&existing, &desired);
        let names: Vec<_> = missing.iter().map(|f| f.name.as_str()).collect();
        // legacy_column is left alone; only genuinely new fields are added
        assert_eq!(names, vec!["amount", "owner", "sync_timestamp", "sync_source"]);
    }

    #[test]
    fn test_merge_sql_shape() {
        let sql = merge_sql("my-project", "zoho_crm", &test_spec());

        assert!(sql.starts_with("MERGE `my-project.zoho_crm.zoho_deals` T"));
        assert!(sql.contains("ON T.`deal_id` = S.`deal_id`"));
        // Key column is never reassigned on match
        let set_clause = sql
            .split("UPDATE SET ")
            .nth(1)
            .unwrap()
            .split(" WHEN NOT MATCHED")
            .next()
            .unwrap();
        assert!(!set_clause.contains("deal_id"));
        assert!(sql.contains("T.`stage` = S.`stage`"));
        // JSON columns are parsed from their string parameter
        assert!(sql.contains("T.`owner` = SAFE.PARSE_JSON(S.`owner`)"));
        assert!(sql.contains(
            "INSERT (`deal_id`, `stage`, `amount`, `owner`, `sync_timestamp`, `sync_source`)"
        ));
        assert!(sql.ends_with(
            "VALUES (S.`deal_id`, S.`stage`, S.`amount`, SAFE.PARSE_JSON(S.`owner`), \
             S.`sync_timestamp`, S.`sync_source`)"
        ));
    }

    #[test]
    fn test_rows_parameter_values() {
        let spec = test_spec();
        let row = TargetRow {
            key: "deal_1".to_string(),
            last_modified: mock_datetime(2025, 6, 1),
            columns: vec![
                ("deal_id".to_string(), CellValue::String("deal_1".to_string())),
                ("stage".to_string(), CellValue::Null),
                ("amount".to_string(), CellValue::Float(1500.5)),
                ("owner".to_string(), CellValue::Json("{\"id\":\"o1\"}".to_string())),
                (
                    "sync_timestamp".to_string(),
                    CellValue::Timestamp(mock_datetime(2025, 6, 1)),
                ),
                ("sync_source".to_string(), CellValue::String("test".to_string())),
            ],
        };

        let param = rows_parameter(&spec, &[row]);
        assert_eq!(param["name"], "rows");
        assert_eq!(param["parameterType"]["type"], "ARRAY");
        let struct_types = param["parameterType"]["arrayType"]["structTypes"]
            .as_array()
            .unwrap();
        assert_eq!(struct_types[0]["name"], "deal_id");
        assert_eq!(struct_types[2]["type"]["type"], "FLOAT64");
        assert_eq!(struct_types[3]["type"]["type"], "STRING");

        let values = &param["parameterValue"]["arrayValues"][0]["structValues"];
        assert_eq!(values["deal_id"]["value"], "deal_1");
        assert_eq!(values["stage"]["value"], Value::Null);
        assert_eq!(values["amount"]["value"], "1500.5");
        assert_eq!(values["owner"]["value"], "{\"id\":\"o1\"}");
        assert_eq!(values["sync_timestamp"]["value"], "2025-06-01T10:00:00.000000Z");
    }

    #[test]
    fn test_rows_parameter_keeps_last_row_per_key() {
        let spec = test_spec();
        let row = |key: &str, stage: &str| TargetRow {
            key: key.to_string(),
            last_modified: mock_datetime(2025, 6, 1),
            columns: vec![
                ("deal_id".to_string(), CellValue::String(key.to_string())),
                ("stage".to_string(), CellValue::String(stage.to_string())),
            ],
        };

        let param = rows_parameter(
            &spec,
            &[
                row("deal_1", "Proposal"),
                row("deal_2", "Negotiation"),
                row("deal_1", "Closed Won"),
            ],
        );

        let values = param["parameterValue"]["arrayValues"].as_array().unwrap();
        assert_eq!(values.len(), 2);
        // deal_1 keeps its position but carries the later row's values
        assert_eq!(values[0]["structValues"]["deal_id"]["value"], "deal_1");
        assert_eq!(values[0]["structValues"]["stage"]["value"], "Closed Won");
        assert_eq!(values[1]["structValues"]["deal_id"]["value"], "deal_2");
    }

    #[test]
    fn test_rows_parameter_fills_absent_columns_with_null() {
        let spec = test_spec();
        let row = TargetRow {
            key: "deal_2".to_string(),
            last_modified: mock_datetime(2025, 6, 1),
            columns: vec![(
                "deal_id".to_string(),
                CellValue::String("deal_2".to_string()),
            )],
        };

        let param = rows_parameter(&spec, &[row]);
        let values = &param["parameterValue"]["arrayValues"][0]["structValues"];
        assert_eq!(values["stage"]["value"], Value::Null);
        assert_eq!(values["sync_source"]["value"], Value::Null);
    }
}
