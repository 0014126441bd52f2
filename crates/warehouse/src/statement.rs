use indexmap::IndexMap;
use lakedash_core::Value;
use serde::Serialize;

/// Named statement parameters, bound to `:name` markers in the SQL text.
pub type Params = IndexMap<String, Value>;

/// One SQL text plus its named parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Params,
}

impl Statement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Params::new(),
        }
    }

    pub fn with_params(sql: impl Into<String>, params: Params) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    /// Bind a value to `:name`.
    pub fn bind(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub(crate) fn wire_parameters(&self) -> Vec<WireParameter<'_>> {
        self.params
            .iter()
            .map(|(name, value)| WireParameter::new(name, value))
            .collect()
    }
}

/// Parameter as the statement execution API expects it: the value always
/// travels as a string, the type tells the warehouse how to cast it.
#[derive(Debug, Serialize, PartialEq)]
pub(crate) struct WireParameter<'a> {
    pub name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_name: Option<&'static str>,
}

impl<'a> WireParameter<'a> {
    fn new(name: &'a str, value: &Value) -> Self {
        let type_name = match value {
            Value::Null => None,
            Value::Bool(_) => Some("BOOLEAN"),
            Value::Int(_) => Some("BIGINT"),
            Value::Float(_) => Some("DOUBLE"),
            Value::Text(_) => Some("STRING"),
        };
        let value = (!value.is_null()).then(|| value.to_string());
        Self { name, value, type_name }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_keeps_insertion_order() {
        let stmt = Statement::new("SELECT :a, :b")
            .bind("b", 2_i64)
            .bind("a", "x");
        let names: Vec<&str> = stmt.params.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[test]
    fn wire_parameters_are_typed_strings() {
        let stmt = Statement::new("q")
            .bind("year", 1994_i64)
            .bind("fare", 12.5)
            .bind("status", "O")
            .bind("flag", true)
            .bind("nothing", Value::Null);
        let json = serde_json::to_value(stmt.wire_parameters()).unwrap();
        assert_eq!(
            json,
            serde_json::json!([
                {"name": "year", "value": "1994", "type": "BIGINT"},
                {"name": "fare", "value": "12.5", "type": "DOUBLE"},
                {"name": "status", "value": "O", "type": "STRING"},
                {"name": "flag", "value": "true", "type": "BOOLEAN"},
                {"name": "nothing"}
            ])
        );
    }
}
