use std::collections::BTreeMap;
use std::path::Path;

use calamine::Reader;
use serde_json::Value;

use crate::error::{ReconError, Result};
use crate::models::{CellValue, ExternalDataset};
use crate::sheet::cell_from_data;

/// Column the ERP procedure uses to nest its result rows.
const ENTRIES_COLUMN: &str = "Entries";

fn cell_from_json(value: &Value) -> CellValue {
    match value {
        Value::Null => CellValue::Empty,
        Value::Bool(b) => CellValue::Bool(*b),
        Value::Number(n) => n.as_f64().map(CellValue::Number).unwrap_or_default(),
        Value::String(s) => CellValue::Text(s.clone()),
        other => CellValue::Text(other.to_string()),
    }
}

/// Flatten nested objects into dotted keys: `{"a": {"b": 1}}` → `a.b = 1`.
fn flatten_into(prefix: &str, value: &Value, out: &mut BTreeMap<String, CellValue>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let key = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                flatten_into(&key, child, out);
            }
        }
        _ => {
            out.insert(prefix.to_string(), cell_from_json(value));
        }
    }
}

fn flatten_row(value: &Value) -> BTreeMap<String, CellValue> {
    let mut row = BTreeMap::new();
    match value {
        Value::Object(_) => flatten_into("", value, &mut row),
        other => {
            row.insert("value".to_string(), cell_from_json(other));
        }
    }
    row
}

/// `{"col": [v1, v2], ...}` → one row per index.
fn rows_from_columns(map: &serde_json::Map<String, Value>) -> Vec<Value> {
    let len = map
        .values()
        .map(|v| v.as_array().map_or(1, Vec::len))
        .max()
        .unwrap_or(0);
    (0..len)
        .map(|i| {
            let row = map
                .iter()
                .map(|(k, v)| {
                    let cell = match v {
                        Value::Array(items) => items.get(i).cloned().unwrap_or(Value::Null),
                        scalar => scalar.clone(),
                    };
                    (k.clone(), cell)
                })
                .collect();
            Value::Object(row)
        })
        .collect()
}

fn expand_entries(rows: Vec<Value>) -> Vec<Value> {
    let has_entries = rows
        .iter()
        .any(|r| r.as_object().is_some_and(|o| o.contains_key(ENTRIES_COLUMN)));
    if !has_entries {
        return rows;
    }
    let mut expanded = Vec::new();
    for row in rows {
        match row.get(ENTRIES_COLUMN) {
            Some(Value::Array(items)) => {
                for item in items {
                    match item {
                        Value::Array(inner) => expanded.extend(inner.iter().cloned()),
                        other => expanded.push(other.clone()),
                    }
                }
            }
            Some(Value::Object(_)) => expanded.push(row[ENTRIES_COLUMN].clone()),
            _ => {}
        }
    }
    expanded
}

/// Parse a procedure-endpoint response body into a dataset.
///
/// Accepts a top-level array, an object wrapping the rows in `data`, `results` or `rows`, or a
/// column-oriented object. Rows carrying an `Entries` column are replaced by their entries.
pub fn parse_response(body: &Value) -> Result<ExternalDataset> {
    let rows: Vec<Value> = match body {
        Value::Array(items) => items.clone(),
        Value::Object(map) => {
            if let Some(Value::Array(items)) = ["data", "results", "rows"]
                .iter()
                .find_map(|key| map.get(*key))
            {
                items.clone()
            } else {
                rows_from_columns(map)
            }
        }
        _ => {
            return Err(ReconError::Dataset(
                "Unexpected data format received from API".to_string(),
            ))
        }
    };

    let mut dataset = ExternalDataset::default();
    for row in expand_entries(rows) {
        dataset.push_row(flatten_row(&row));
    }
    Ok(dataset)
}

pub fn load_json(path: &Path) -> Result<ExternalDataset> {
    let content = std::fs::read_to_string(path)?;
    let body: Value = serde_json::from_str(&content)?;
    parse_response(&body)
}

pub fn load_csv(path: &Path) -> Result<ExternalDataset> {
    let file = std::fs::File::open(path)?;
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(std::io::BufReader::new(file));
    let headers: Vec<String> = rdr.headers()?.iter().map(|h| h.trim().to_string()).collect();
    let mut dataset = ExternalDataset::default();
    dataset.columns = headers.clone();
    for result in rdr.records() {
        let record = result?;
        let row = headers
            .iter()
            .zip(record.iter())
            .map(|(h, v)| (h.clone(), CellValue::text(v.trim())))
            .collect();
        dataset.push_row(row);
    }
    Ok(dataset)
}

/// First worksheet, first row as header.
pub fn load_spreadsheet(path: &Path) -> Result<ExternalDataset> {
    let mut workbook = calamine::open_workbook_auto(path)
        .map_err(|e| ReconError::Workbook(format!("Failed to open {}: {e}", path.display())))?;
    let Some(name) = workbook.sheet_names().first().cloned() else {
        return Ok(ExternalDataset::default());
    };
    let range = workbook
        .worksheet_range(&name)
        .map_err(|e| ReconError::Workbook(format!("Failed to read sheet '{name}': {e}")))?;
    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        return Ok(ExternalDataset::default());
    };
    let headers: Vec<String> = header
        .iter()
        .map(|c| cell_from_data(c).to_string().trim().to_string())
        .collect();
    let mut dataset = ExternalDataset::default();
    dataset.columns = headers.iter().filter(|h| !h.is_empty()).cloned().collect();
    for row in rows {
        let row = headers
            .iter()
            .zip(row.iter())
            .filter(|(h, _)| !h.is_empty())
            .map(|(h, c)| (h.clone(), cell_from_data(c)))
            .collect();
        dataset.push_row(row);
    }
    Ok(dataset)
}

/// Load an exported API result by file extension.
pub fn load_dataset(path: &Path) -> Result<ExternalDataset> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    let dataset = match ext.as_str() {
        "json" => load_json(path)?,
        "csv" => load_csv(path)?,
        "xlsx" | "xlsm" | "xls" | "ods" => load_spreadsheet(path)?,
        other => {
            return Err(ReconError::Dataset(format!(
                "Unsupported dataset format '{other}' ({})",
                path.display()
            )))
        }
    };
    log::debug!(
        "loaded {} API rows with columns {:?} from {}",
        dataset.len(),
        dataset.columns,
        path.display()
    );
    Ok(dataset)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_parse_top_level_array() {
        let ds = parse_response(&json!([
            {"ORDER_ID": "12-1", "KUNDENNR": 10023, "BELEGNR": "RE-1"},
            {"ORDER_ID": "12-2", "KUNDENNR": null, "BELEGNR": "RE-2"}
        ]))
        .unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.value(0, "KUNDENNR"), Some(&CellValue::Number(10023.0)));
        assert_eq!(ds.value(1, "KUNDENNR"), None);
        assert!(ds.has_column("BELEGNR"));
    }

    #[test]
    fn test_parse_wrapped_rows() {
        for key in ["data", "results", "rows"] {
            let body = json!({ key: [{"ORDER_ID": "1"}], "count": 1 });
            let ds = parse_response(&body).unwrap();
            assert_eq!(ds.len(), 1, "wrapper {key}");
            assert_eq!(ds.value(0, "ORDER_ID"), Some(&CellValue::text("1")));
        }
    }

    #[test]
    fn test_parse_column_oriented_object() {
        let body = json!({"ORDER_ID": ["1", "2"], "KUNDENNR": ["K1", "K2"]});
        let ds = parse_response(&body).unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.value(1, "KUNDENNR"), Some(&CellValue::text("K2")));
    }

    #[test]
    fn test_entries_objects_and_lists_are_expanded() {
        let ds = parse_response(&json!([
            {"Entries": {"ORDER_ID": "1", "Kunde": {"KUNDENNR": "K1"}}},
            {"Entries": [[{"ORDER_ID": "2"}, {"ORDER_ID": "3"}], {"ORDER_ID": "4"}]}
        ]))
        .unwrap();
        assert_eq!(ds.len(), 4);
        assert_eq!(ds.value(0, "Kunde.KUNDENNR"), Some(&CellValue::text("K1")));
        assert_eq!(ds.value(3, "ORDER_ID"), Some(&CellValue::text("4")));
        assert!(!ds.has_column("Entries"));
    }

    #[test]
    fn test_scalar_body_is_rejected() {
        let err = parse_response(&json!("oops")).unwrap_err();
        assert!(matches!(err, ReconError::Dataset(_)));
    }

    #[test]
    fn test_load_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("api.csv");
        std::fs::write(&path, "ORDER_ID,KUNDENNR,BELEGNR\n12-1,K1,R1\n12-2,,R2\n").unwrap();
        let ds = load_dataset(&path).unwrap();
        assert_eq!(ds.columns, vec!["ORDER_ID", "KUNDENNR", "BELEGNR"]);
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.value(1, "KUNDENNR"), None);
        assert_eq!(ds.value(1, "BELEGNR"), Some(&CellValue::text("R2")));
    }

    #[test]
    fn test_load_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("api.JSON");
        std::fs::write(&path, r#"{"data": [{"ORDER_ID": "9", "BELEGNR": "R9"}]}"#).unwrap();
        let ds = load_dataset(&path).unwrap();
        assert_eq!(ds.value(0, "BELEGNR"), Some(&CellValue::text("R9")));
    }

    #[test]
    fn test_load_spreadsheet() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("api.xlsx");
        let mut wb = rust_xlsxwriter::Workbook::new();
        let ws = wb.add_worksheet();
        ws.write_string(0, 0, "ORDER_ID").unwrap();
        ws.write_string(0, 1, "KUNDENNR").unwrap();
        ws.write_string(1, 0, "12-1").unwrap();
        ws.write_number(1, 1, 10023).unwrap();
        wb.save(&path).unwrap();
        let ds = load_dataset(&path).unwrap();
        assert_eq!(ds.len(), 1);
        assert_eq!(ds.value(0, "KUNDENNR"), Some(&CellValue::Number(10023.0)));
    }

    #[test]
    fn test_unknown_extension() {
        let err = load_dataset(Path::new("api.txt")).unwrap_err();
        assert!(err.to_string().contains("Unsupported dataset format"));
    }
}
