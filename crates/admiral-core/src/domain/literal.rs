use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A typed input or output value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Literal {
    /// Signed integer
    Integer(i64),
    /// Floating point number
    Float(f64),
    /// UTF-8 string
    String(String),
    /// Boolean
    Boolean(bool),
    /// Point in time
    Datetime(DateTime<Utc>),
    /// Ordered list
    Collection(Vec<Literal>),
    /// Nested named values
    Map(LiteralMap),
}

impl Literal {
    /// The timestamp carried by a datetime literal
    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            Literal::Datetime(value) => Some(*value),
            _ => None,
        }
    }
}

/// Named literals, e.g. the inputs of an execution
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LiteralMap {
    /// Values keyed by input name
    #[serde(default)]
    pub literals: BTreeMap<String, Literal>,
}

impl LiteralMap {
    /// Create an empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, name: impl Into<String>, value: Literal) -> Self {
        self.literals.insert(name.into(), value);
        self
    }

    /// Insert or replace a value
    pub fn insert(&mut self, name: impl Into<String>, value: Literal) -> Option<Literal> {
        self.literals.insert(name.into(), value)
    }

    /// Look up a value
    pub fn get(&self, name: &str) -> Option<&Literal> {
        self.literals.get(name)
    }

    /// Whether a value exists for the name
    pub fn contains(&self, name: &str) -> bool {
        self.literals.contains_key(name)
    }

    /// Number of values
    pub fn len(&self) -> usize {
        self.literals.len()
    }

    /// True when there are no values
    pub fn is_empty(&self) -> bool {
        self.literals.is_empty()
    }
}

impl FromIterator<(String, Literal)> for LiteralMap {
    fn from_iter<T: IntoIterator<Item = (String, Literal)>>(iter: T) -> Self {
        Self {
            literals: iter.into_iter().collect(),
        }
    }
}

/// Declared input of a launch plan
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    /// Whether callers must supply a value when no default exists
    #[serde(default)]
    pub required: bool,
    /// Value used when the caller omits the input
    #[serde(default)]
    pub default: Option<Literal>,
}

impl Parameter {
    /// An input that must be supplied
    pub fn required() -> Self {
        Self {
            required: true,
            default: None,
        }
    }

    /// An optional input with a default value
    pub fn with_default(value: Literal) -> Self {
        Self {
            required: false,
            default: Some(value),
        }
    }
}

/// Declared inputs keyed by name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterMap {
    /// Parameters keyed by input name
    #[serde(default)]
    pub parameters: BTreeMap<String, Parameter>,
}

impl ParameterMap {
    /// Builder-style insert
    pub fn with(mut self, name: impl Into<String>, parameter: Parameter) -> Self {
        self.parameters.insert(name.into(), parameter);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_serde_shape() {
        let map = LiteralMap::new()
            .with("count", Literal::Integer(3))
            .with("tags", Literal::Collection(vec![Literal::String("gpu".to_string())]));

        let json = serde_json::to_value(&map).unwrap();
        assert_eq!(json["literals"]["count"]["type"], "integer");
        assert_eq!(json["literals"]["count"]["value"], 3);

        let back: LiteralMap = serde_json::from_value(json).unwrap();
        assert_eq!(back, map);
    }

    #[test]
    fn test_as_datetime() {
        let now = Utc::now();
        assert_eq!(Literal::Datetime(now).as_datetime(), Some(now));
        assert_eq!(Literal::Integer(1).as_datetime(), None);
    }
}
