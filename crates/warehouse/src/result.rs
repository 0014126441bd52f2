use indexmap::IndexMap;
use lakedash_core::Value;
use serde::{Deserialize, Serialize};

/// Column definition returned by a statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Column name as declared in the result set.
    pub name: String,
    /// Warehouse type name (e.g. "LONG", "DOUBLE", "STRING", "DATE", "DECIMAL").
    pub type_name: String,
}

impl Column {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
        }
    }

    /// Whether the declared type is numeric.
    pub fn is_numeric(&self) -> bool {
        let base = self.type_name.split('(').next().unwrap_or_default().trim();
        matches!(
            base.to_ascii_uppercase().as_str(),
            "BYTE" | "TINYINT" | "SHORT" | "SMALLINT" | "INT" | "INTEGER" | "LONG" | "BIGINT"
                | "FLOAT" | "REAL" | "DOUBLE" | "DECIMAL" | "DEC" | "NUMERIC"
        )
    }
}

/// Execution metadata for a completed statement.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryMetadata {
    /// Warehouse statement ID, when the statement reached the warehouse.
    pub statement_id: Option<String>,
    /// Rows returned.
    pub row_count: u64,
    /// The warehouse cut the result short (inline result size limit).
    pub truncated: bool,
    /// Wall-clock time from submit to last chunk, in milliseconds.
    pub elapsed_ms: u64,
}

/// Tabular statement result.
///
/// Column order is preserved; each row has one [`Value`] per column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    /// Column definitions in result-set order.
    pub columns: Vec<Column>,
    /// Row data. Each inner vector has the same length as `columns`.
    pub rows: Vec<Vec<Value>>,
    pub metadata: QueryMetadata,
}

impl QueryResult {
    pub fn new(columns: Vec<Column>, rows: Vec<Vec<Value>>) -> Self {
        let metadata = QueryMetadata {
            row_count: rows.len() as u64,
            ..QueryMetadata::default()
        };
        Self { columns, rows, metadata }
    }

    /// Returns the number of data rows in the result set.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Returns the number of columns in the result set.
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Returns `true` if the result set contains no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Finds the zero-based index of a column by name (case-sensitive).
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Retrieves the value at the given row index and column name.
    pub fn get_value(&self, row: usize, col: &str) -> Option<&Value> {
        let col_idx = self.column_index(col)?;
        self.rows.get(row)?.get(col_idx)
    }

    /// First row as a column → value map; handy for single-row KPI queries.
    pub fn first_record(&self) -> Option<IndexMap<String, Value>> {
        self.rows.first().map(|row| self.record(row))
    }

    /// Every row as an ordered column → value map.
    pub fn records(&self) -> Vec<IndexMap<String, Value>> {
        self.rows.iter().map(|row| self.record(row)).collect()
    }

    fn record(&self, row: &[Value]) -> IndexMap<String, Value> {
        self.columns
            .iter()
            .zip(row.iter())
            .map(|(c, v)| (c.name.clone(), v.clone()))
            .collect()
    }

    /// Names of numeric columns, in result order.
    ///
    /// A column counts as numeric when its declared type is numeric, or when
    /// the type is unknown and every non-null cell is a number.
    pub fn numeric_columns(&self) -> Vec<&str> {
        self.columns
            .iter()
            .enumerate()
            .filter(|(i, c)| {
                c.is_numeric()
                    || (c.type_name.is_empty()
                        && self.rows.iter().any(|r| r.get(*i).is_some_and(Value::is_numeric))
                        && self
                            .rows
                            .iter()
                            .all(|r| r.get(*i).map_or(true, |v| v.is_null() || v.is_numeric())))
            })
            .map(|(_, c)| c.name.as_str())
            .collect()
    }

    /// Render as RFC 4180 CSV with a header row.
    pub fn to_csv(&self) -> String {
        let mut lines = Vec::with_capacity(self.rows.len() + 1);
        lines.push(
            self.columns
                .iter()
                .map(|c| escape_csv(&c.name))
                .collect::<Vec<_>>()
                .join(","),
        );
        for row in &self.rows {
            lines.push(
                row.iter()
                    .map(|v| escape_csv(&v.to_string()))
                    .collect::<Vec<_>>()
                    .join(","),
            );
        }
        let mut out = lines.join("\r\n");
        out.push_str("\r\n");
        out
    }
}

/// Quote a CSV field when it contains a delimiter, quote or line break.
pub fn escape_csv(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_result() -> QueryResult {
        let mut r = QueryResult::new(
            vec![
                Column::new("id", "LONG"),
                Column::new("name", "STRING"),
                Column::new("score", "DOUBLE"),
            ],
            vec![
                vec![Value::Int(1), "alice".into(), Value::Float(9.5)],
                vec![Value::Int(2), "bob".into(), Value::Null],
                vec![Value::Int(3), Value::Null, Value::Float(7.0)],
            ],
        );
        r.metadata.statement_id = Some("01ef-1".into());
        r.metadata.elapsed_ms = 420;
        r
    }

    #[test]
    fn construction_and_accessors() {
        let r = sample_result();
        assert_eq!(r.row_count(), 3);
        assert_eq!(r.column_count(), 3);
        assert_eq!(r.metadata.row_count, 3);
        assert!(!r.is_empty());
        assert_eq!(r.column_index("score"), Some(2));
        assert_eq!(r.column_index("missing"), None);
        assert_eq!(r.get_value(0, "name"), Some(&Value::Text("alice".into())));
        assert_eq!(r.get_value(1, "score"), Some(&Value::Null));
        assert_eq!(r.get_value(99, "id"), None);
    }

    #[test]
    fn records_preserve_column_order() {
        let r = sample_result();
        let records = r.records();
        assert_eq!(records.len(), 3);
        let keys: Vec<&String> = records[0].keys().collect();
        assert_eq!(keys, vec!["id", "name", "score"]);
        assert_eq!(r.first_record().unwrap()["name"], Value::Text("alice".into()));

        let json = serde_json::to_string(&records[1]).unwrap();
        assert_eq!(json, r#"{"id":2,"name":"bob","score":null}"#);
    }

    #[test]
    fn numeric_columns_by_type_and_content() {
        let r = sample_result();
        assert_eq!(r.numeric_columns(), vec!["id", "score"]);

        let untyped = QueryResult::new(
            vec![Column::new("a", ""), Column::new("b", "")],
            vec![vec![Value::Int(1), "x".into()], vec![Value::Null, "y".into()]],
        );
        assert_eq!(untyped.numeric_columns(), vec!["a"]);
    }

    #[test]
    fn decimal_types_are_numeric() {
        assert!(Column::new("x", "DECIMAL(18,2)").is_numeric());
        assert!(!Column::new("x", "TIMESTAMP").is_numeric());
    }

    #[test]
    fn csv_escapes_fields() {
        let r = QueryResult::new(
            vec![Column::new("name", "STRING"), Column::new("note", "STRING")],
            vec![
                vec!["Customer#1".into(), "says \"hi\", twice".into()],
                vec!["plain".into(), Value::Null],
            ],
        );
        assert_eq!(
            r.to_csv(),
            "name,note\r\nCustomer#1,\"says \"\"hi\"\", twice\"\r\nplain,\r\n"
        );
    }
}
