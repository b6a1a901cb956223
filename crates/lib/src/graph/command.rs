//! Positional command tokens for `GRAPH.QUERY`.
//!
//! Layout: `[graph, cypher]`, followed by `PARAMS k1 v1 k2 v2 ...` when parameters are given.
//! Parameter order is the caller's insertion order.

use super::GraphError;
use serde_json::Value;

/// Marker token that introduces the parameter pairs.
pub const PARAMS_MARKER: &str = "PARAMS";

/// Supported parameter kinds and their wire text.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    /// Sent verbatim at the top level; quoted and escaped inside lists.
    Str(String),
    List(Vec<ParamValue>),
}

impl ParamValue {
    /// Wire text for a top-level parameter value.
    pub fn to_wire(&self) -> Result<String, GraphError> {
        match self {
            ParamValue::Str(s) => Ok(s.clone()),
            other => other.to_literal(),
        }
    }

    /// Cypher literal syntax: `null`, `true`, `42`, `1.5`, `"text"`, `[1, "a"]`.
    pub fn to_literal(&self) -> Result<String, GraphError> {
        match self {
            ParamValue::Null => Ok("null".to_string()),
            ParamValue::Bool(b) => Ok(b.to_string()),
            ParamValue::Int(n) => Ok(n.to_string()),
            ParamValue::Float(f) => float_literal(*f),
            ParamValue::Str(s) => Ok(quote(s)),
            ParamValue::List(items) => {
                let parts = items
                    .iter()
                    .map(ParamValue::to_literal)
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(format!("[{}]", parts.join(", ")))
            }
        }
    }
}

fn float_literal(f: f64) -> Result<String, GraphError> {
    if !f.is_finite() {
        return Err(GraphError::Encode(format!("non-finite float {}", f)));
    }
    let s = f.to_string();
    if s.contains('.') {
        Ok(s)
    } else {
        Ok(format!("{}.0", s))
    }
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        ParamValue::Str(s.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(s: String) -> Self {
        ParamValue::Str(s)
    }
}

impl From<i64> for ParamValue {
    fn from(n: i64) -> Self {
        ParamValue::Int(n)
    }
}

impl From<f64> for ParamValue {
    fn from(f: f64) -> Self {
        ParamValue::Float(f)
    }
}

impl From<bool> for ParamValue {
    fn from(b: bool) -> Self {
        ParamValue::Bool(b)
    }
}

impl TryFrom<&Value> for ParamValue {
    type Error = GraphError;

    /// Objects have no parameter form and are rejected.
    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        match value {
            Value::Null => Ok(ParamValue::Null),
            Value::Bool(b) => Ok(ParamValue::Bool(*b)),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Ok(ParamValue::Int(i)),
                None => n
                    .as_f64()
                    .map(ParamValue::Float)
                    .ok_or_else(|| GraphError::Encode(format!("unsupported number {}", n))),
            },
            Value::String(s) => Ok(ParamValue::Str(s.clone())),
            Value::Array(items) => items
                .iter()
                .map(ParamValue::try_from)
                .collect::<Result<Vec<_>, _>>()
                .map(ParamValue::List),
            Value::Object(_) => Err(GraphError::Encode(
                "objects are not supported as query parameters".to_string(),
            )),
        }
    }
}

/// A Cypher query bound to a graph, with ordered parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphCommand {
    pub graph: String,
    pub cypher: String,
    pub params: Vec<(String, ParamValue)>,
}

impl GraphCommand {
    pub fn new(graph: impl Into<String>, cypher: impl Into<String>) -> Self {
        Self {
            graph: graph.into(),
            cypher: cypher.into(),
            params: Vec::new(),
        }
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    pub fn tokens(&self) -> Result<Vec<String>, GraphError> {
        build_command(&self.graph, &self.cypher, &self.params)
    }
}

/// Build the token sequence. Fails only when a parameter cannot be encoded.
pub fn build_command(
    graph: &str,
    cypher: &str,
    params: &[(String, ParamValue)],
) -> Result<Vec<String>, GraphError> {
    let mut tokens = Vec::with_capacity(2 + if params.is_empty() { 0 } else { 1 + params.len() * 2 });
    tokens.push(graph.to_string());
    tokens.push(cypher.to_string());
    if !params.is_empty() {
        tokens.push(PARAMS_MARKER.to_string());
        for (key, value) in params {
            tokens.push(key.clone());
            tokens.push(value.to_wire()?);
        }
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn no_params_is_graph_and_query() {
        assert_eq!(
            build_command("g", "MATCH (n) RETURN n", &[]).unwrap(),
            vec!["g", "MATCH (n) RETURN n"]
        );
    }

    #[test]
    fn params_follow_marker_in_order() {
        let cmd = GraphCommand::new("g", "MATCH (n) RETURN n").param("a", "1");
        assert_eq!(
            cmd.tokens().unwrap(),
            vec!["g", "MATCH (n) RETURN n", "PARAMS", "a", "1"]
        );

        let cmd = GraphCommand::new("g", "q")
            .param("z", 3_i64)
            .param("a", true)
            .param("m", 2.0_f64);
        assert_eq!(
            cmd.tokens().unwrap(),
            vec!["g", "q", "PARAMS", "z", "3", "a", "true", "m", "2.0"]
        );
    }

    #[test]
    fn literal_syntax_for_every_kind() {
        assert_eq!(ParamValue::Null.to_literal().unwrap(), "null");
        assert_eq!(ParamValue::Bool(false).to_literal().unwrap(), "false");
        assert_eq!(ParamValue::Int(-7).to_literal().unwrap(), "-7");
        assert_eq!(ParamValue::Float(1.5).to_literal().unwrap(), "1.5");
        assert_eq!(
            ParamValue::Str(r#"say "hi" \o/"#.to_string()).to_literal().unwrap(),
            r#""say \"hi\" \\o/""#
        );
        let list = ParamValue::List(vec![
            ParamValue::Int(1),
            ParamValue::Str("a".to_string()),
            ParamValue::Null,
            ParamValue::List(vec![]),
        ]);
        assert_eq!(list.to_wire().unwrap(), r#"[1, "a", null, []]"#);
    }

    #[test]
    fn non_finite_float_is_a_construction_error() {
        let err = build_command("g", "q", &[("x".to_string(), ParamValue::Float(f64::NAN))]);
        assert!(matches!(err, Err(GraphError::Encode(_))));
    }

    #[test]
    fn json_values_convert() {
        let v = json!([1, 2.5, "x", null, false]);
        assert_eq!(
            ParamValue::try_from(&v).unwrap().to_wire().unwrap(),
            r#"[1, 2.5, "x", null, false]"#
        );
        assert!(matches!(
            ParamValue::try_from(&json!({"a": 1})),
            Err(GraphError::Encode(_))
        ));
        assert!(matches!(
            ParamValue::try_from(&json!([{"a": 1}])),
            Err(GraphError::Encode(_))
        ));
    }
}
