//! Flat key -> primitive payload map carried by every envelope.

use std::collections::BTreeMap;

use crate::error::CoreError;

/// Primitive payload value. Lists and structured data travel as JSON text
/// inside `Str`, keeping the map itself flat.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    Bool(bool),
    Int(i64),
    Double(f64),
}

/// Flat payload map. Typed getters reject missing or mistyped fields with
/// `InvalidArgument` so command decoding is all-or-nothing.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Payload(BTreeMap<String, Value>);

impl Payload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn set_str(mut self, key: &str, value: impl Into<String>) -> Self {
        self.0.insert(key.to_string(), Value::Str(value.into()));
        self
    }

    pub fn set_bool(mut self, key: &str, value: bool) -> Self {
        self.0.insert(key.to_string(), Value::Bool(value));
        self
    }

    pub fn set_i64(mut self, key: &str, value: i64) -> Self {
        self.0.insert(key.to_string(), Value::Int(value));
        self
    }

    pub fn set_f64(mut self, key: &str, value: f64) -> Self {
        self.0.insert(key.to_string(), Value::Double(value));
        self
    }

    fn missing(key: &str) -> CoreError {
        CoreError::InvalidArgument(format!("missing payload field '{key}'"))
    }

    fn mistyped(key: &str, expected: &str) -> CoreError {
        CoreError::InvalidArgument(format!("payload field '{key}' is not a {expected}"))
    }

    pub fn get_str(&self, key: &str) -> Result<&str, CoreError> {
        match self.0.get(key) {
            Some(Value::Str(s)) => Ok(s),
            Some(_) => Err(Self::mistyped(key, "string")),
            None => Err(Self::missing(key)),
        }
    }

    pub fn get_bool(&self, key: &str) -> Result<bool, CoreError> {
        match self.0.get(key) {
            Some(Value::Bool(b)) => Ok(*b),
            Some(_) => Err(Self::mistyped(key, "bool")),
            None => Err(Self::missing(key)),
        }
    }

    pub fn get_i64(&self, key: &str) -> Result<i64, CoreError> {
        match self.0.get(key) {
            Some(Value::Int(v)) => Ok(*v),
            Some(_) => Err(Self::mistyped(key, "integer")),
            None => Err(Self::missing(key)),
        }
    }

    pub fn get_f64(&self, key: &str) -> Result<f64, CoreError> {
        match self.0.get(key) {
            Some(Value::Double(v)) => Ok(*v),
            Some(_) => Err(Self::mistyped(key, "double")),
            None => Err(Self::missing(key)),
        }
    }
}
