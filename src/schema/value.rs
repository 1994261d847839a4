use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A dynamic value parsed from a content file.
///
/// Deserializes from any self-describing format (JSON, RON maps), so one
/// record type serves every content format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Seq(Vec<Value>),
    Map(IndexMap<String, Value>),
}

impl Value {
    /// Short kind name used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Int(_) => "integer",
            Self::Float(_) => "float",
            Self::String(_) => "text",
            Self::Seq(_) => "sequence",
            Self::Map(_) => "mapping",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Numeric view; integers widen to floats.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(n) => Some(*n as f64),
            Self::Float(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_seq(&self) -> Option<&[Value]> {
        match self {
            Self::Seq(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_values() {
        let v: Value = serde_json::from_str(
            r#"{"name": "Hall", "n": 3, "f": 0.5, "ok": true, "list": [1, "a"], "none": null}"#,
        )
        .unwrap();
        let map = v.as_map().unwrap();
        assert_eq!(map["name"].as_str(), Some("Hall"));
        assert_eq!(map["n"], Value::Int(3));
        assert_eq!(map["f"].as_f64(), Some(0.5));
        assert_eq!(map["ok"].as_bool(), Some(true));
        assert_eq!(map["list"].as_seq().map(|s| s.len()), Some(2));
        assert_eq!(map["none"], Value::Null);
    }

    #[test]
    fn ron_map_values() {
        let v: Value = ron::from_str(r#"{"name": "Hall", "items": {"torch": 2}, "exits": []}"#).unwrap();
        let map = v.as_map().unwrap();
        assert_eq!(map["items"].as_map().unwrap()["torch"], Value::Int(2));
        assert_eq!(map["exits"].kind(), "sequence");
    }

    #[test]
    fn key_order_preserved() {
        let v: Value = serde_json::from_str(r#"{"b": 1, "a": 2, "c": 3}"#).unwrap();
        let keys: Vec<&str> = v.as_map().unwrap().keys().map(|k| k.as_str()).collect();
        assert_eq!(keys, vec!["b", "a", "c"]);
    }

    #[test]
    fn int_widens_to_float() {
        assert_eq!(Value::Int(2).as_f64(), Some(2.0));
        assert_eq!(Value::String("2".into()).as_f64(), None);
    }
}
