//! # Value Bridge
//!
//! Conversions between host values and script values.
//!
//! ## Responsibilities
//! - **Host → script**: JSON values, byte sequences and result sets.
//! - **Script → host**: JSON values and SQL statement parameters.
//!
//! Scalars pass by value and byte sequences are defensively copied, so a
//! script can never mutate a host original. The one deliberate exception is
//! the entry function's argument map, which is shared as an in/out channel;
//! see [`shared_map`].

use rhai::{Array, Blob, Dynamic, Map};

use crate::db::{ResultSet, SqlValue};
use crate::errors::ScriptError;

/// Convert a JSON value into a script value.
pub fn json_to_dynamic(value: &serde_json::Value) -> Result<Dynamic, ScriptError> {
    rhai::serde::to_dynamic(value).map_err(|e| ScriptError::ValueConversion(e.to_string()))
}

/// Convert a script value back into a JSON value.
pub fn dynamic_to_json(value: &Dynamic) -> Result<serde_json::Value, ScriptError> {
    rhai::serde::from_dynamic(value).map_err(|e| ScriptError::ValueConversion(e.to_string()))
}

/// Wrap a map so that script-side mutation is visible to the host.
///
/// This is the mechanism that makes entry-function arguments an in/out
/// channel: keep a clone of the returned value and read it back after the
/// run.
pub fn shared_map(map: Map) -> Dynamic {
    Dynamic::from_map(map).into_shared()
}

/// Copy a byte sequence into a script blob.
pub fn blob(bytes: &[u8]) -> Dynamic {
    Dynamic::from_blob(bytes.to_vec())
}

/// Convert script-side positional arguments into SQL statement parameters.
///
/// Unit maps to NULL. Anything that is not a scalar, string or blob is
/// rejected with a descriptive error instead of being stringified.
pub fn to_sql_params(args: &[Dynamic]) -> Result<Vec<rusqlite::types::Value>, ScriptError> {
    args.iter().map(to_sql_param).collect()
}

fn to_sql_param(arg: &Dynamic) -> Result<rusqlite::types::Value, ScriptError> {
    use rusqlite::types::Value;

    let arg = arg.clone().flatten();
    if arg.is_unit() {
        return Ok(Value::Null);
    }
    if let Ok(b) = arg.as_bool() {
        return Ok(Value::Integer(b as i64));
    }
    if let Ok(i) = arg.as_int() {
        return Ok(Value::Integer(i));
    }
    if let Ok(f) = arg.as_float() {
        return Ok(Value::Real(f));
    }
    if let Ok(c) = arg.as_char() {
        return Ok(Value::Text(c.to_string()));
    }
    if arg.is_string() {
        // into_immutable_string cannot fail after the is_string check
        let s = arg.into_immutable_string().unwrap_or_default();
        return Ok(Value::Text(s.to_string()));
    }
    if arg.is_blob() {
        let b = arg.try_cast::<Blob>().unwrap_or_default();
        return Ok(Value::Blob(b));
    }
    Err(ScriptError::ValueConversion(format!(
        "cannot use script value of type {} as a SQL parameter",
        arg.type_name()
    )))
}

/// Present a [`ResultSet`] to the script.
///
/// Shape: `#{ ColumnNames, ColumnTypes, RowCount, Rows }`, where each row is
/// a map from canonical column name to `#{ Value, IsNull }`. Everything is a
/// defensive copy; mutating it in the script leaves the host result alone.
pub fn result_set_to_dynamic(rs: &ResultSet) -> Dynamic {
    let mut root = Map::new();

    let names: Array = rs
        .column_names
        .iter()
        .map(|n| Dynamic::from(n.clone()))
        .collect();
    root.insert("ColumnNames".into(), names.into());

    let types: Array = rs
        .column_types
        .iter()
        .map(|t| Dynamic::from(t.to_string()))
        .collect();
    root.insert("ColumnTypes".into(), types.into());

    root.insert("RowCount".into(), Dynamic::from(rs.row_count as i64));

    let rows: Array = rs
        .rows
        .iter()
        .map(|row| {
            let mut record = Map::new();
            for (name, field) in row {
                let mut cell = Map::new();
                cell.insert("Value".into(), sql_value_to_dynamic(&field.value));
                cell.insert("IsNull".into(), Dynamic::from(field.is_null));
                record.insert(name.as_str().into(), cell.into());
            }
            Dynamic::from_map(record)
        })
        .collect();
    root.insert("Rows".into(), rows.into());

    Dynamic::from_map(root)
}

fn sql_value_to_dynamic(value: &SqlValue) -> Dynamic {
    match value {
        SqlValue::Bool(b) => Dynamic::from(*b),
        SqlValue::Byte(b) => Dynamic::from(*b as i64),
        SqlValue::Int16(i) => Dynamic::from(*i as i64),
        SqlValue::Int32(i) => Dynamic::from(*i as i64),
        SqlValue::Int64(i) => Dynamic::from(*i),
        SqlValue::Float64(f) => Dynamic::from(*f),
        SqlValue::Time(t) => Dynamic::from(t.clone()),
        SqlValue::Text(t) => Dynamic::from(t.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Field, LogicalType};
    use std::collections::BTreeMap;

    #[test]
    fn sql_params_cover_scalars() {
        use rusqlite::types::Value;

        let args = vec![
            Dynamic::UNIT,
            Dynamic::from(true),
            Dynamic::from(42_i64),
            Dynamic::from(1.5_f64),
            Dynamic::from("hello".to_string()),
            Dynamic::from_blob(vec![1, 2, 3]),
        ];
        let params = to_sql_params(&args).unwrap();
        assert_eq!(
            params,
            vec![
                Value::Null,
                Value::Integer(1),
                Value::Integer(42),
                Value::Real(1.5),
                Value::Text("hello".into()),
                Value::Blob(vec![1, 2, 3]),
            ]
        );
    }

    #[test]
    fn sql_params_reject_composites() {
        let err = to_sql_params(&[Dynamic::from_map(Map::new())]).unwrap_err();
        assert!(matches!(err, ScriptError::ValueConversion(_)));
        assert!(err.to_string().contains("map"));
    }

    #[test]
    fn json_round_trip() {
        let json = serde_json::json!({"a": 1, "b": [true, "x"]});
        let dynamic = json_to_dynamic(&json).unwrap();
        assert_eq!(dynamic_to_json(&dynamic).unwrap(), json);
    }

    #[test]
    fn blob_is_a_copy() {
        let original = vec![1_u8, 2, 3];
        let dynamic = blob(&original);
        let mut copied = dynamic.try_cast::<Blob>().unwrap();
        copied[0] = 9;
        assert_eq!(original, vec![1, 2, 3]);
    }

    #[test]
    fn result_set_shape() {
        let mut row = BTreeMap::new();
        row.insert(
            "ID".to_string(),
            Field {
                value: SqlValue::Int64(7),
                is_null: false,
            },
        );
        row.insert(
            "NAME".to_string(),
            Field {
                value: SqlValue::Text(String::new()),
                is_null: true,
            },
        );
        let rs = ResultSet {
            column_names: vec!["ID".into(), "NAME".into()],
            column_types: vec![LogicalType::Int64, LogicalType::String],
            row_count: 1,
            rows: vec![row],
        };

        let dynamic = result_set_to_dynamic(&rs);
        let map = dynamic.try_cast::<Map>().unwrap();
        assert_eq!(map.get("RowCount").unwrap().as_int().unwrap(), 1);

        let types = map.get("ColumnTypes").unwrap().clone().try_cast::<Array>().unwrap();
        assert_eq!(types[0].to_string(), "Int64");

        let rows = map.get("Rows").unwrap().clone().try_cast::<Array>().unwrap();
        let record = rows[0].clone().try_cast::<Map>().unwrap();
        let id = record.get("ID").unwrap().clone().try_cast::<Map>().unwrap();
        assert_eq!(id.get("Value").unwrap().as_int().unwrap(), 7);
        assert!(!id.get("IsNull").unwrap().as_bool().unwrap());

        let name = record.get("NAME").unwrap().clone().try_cast::<Map>().unwrap();
        assert!(name.get("IsNull").unwrap().as_bool().unwrap());
        assert_eq!(name.get("Value").unwrap().to_string(), "");
    }
}
