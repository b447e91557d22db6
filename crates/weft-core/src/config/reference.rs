//! Upstream output references.
//!
//! A parameter value may reference an upstream output with the string form
//! `steps.<step>.outputs.parameters.<name>` or the tagged-object form
//! `{"__ref__": "steps.<step>.outputs.parameters.<name>"}`. Everything else
//! is a literal.
use std::fmt;

use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Key of the tagged-object reference form
pub const REF_TAG: &str = "__ref__";

/// A reference to one upstream output
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OutputRef {
    pub step: String,
    pub output: String,
}

impl OutputRef {
    /// Parse the `steps.<step>.outputs.parameters.<name>` form
    pub fn parse(text: &str) -> Option<Self> {
        let mut parts = text.split('.');
        let (head, step, outputs, parameters, output) = (
            parts.next()?,
            parts.next()?,
            parts.next()?,
            parts.next()?,
            parts.next()?,
        );
        if parts.next().is_some() {
            return None;
        }
        if head != "steps" || outputs != "outputs" || parameters != "parameters" {
            return None;
        }
        if step.is_empty() || output.is_empty() {
            return None;
        }
        Some(Self {
            step: step.to_string(),
            output: output.to_string(),
        })
    }

    /// The catalog dataset name this reference resolves to
    pub fn dataset_name(&self) -> String {
        format!("{}__{}", self.step, self.output)
    }
}

impl fmt::Display for OutputRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "steps.{}.outputs.parameters.{}", self.step, self.output)
    }
}

/// A step parameter value: a literal, or a reference to an upstream output
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Literal(Value),
    Ref(OutputRef),
}

impl ParamValue {
    /// Classify a raw JSON value into literal or reference
    pub fn from_value(value: Value) -> Self {
        if let Value::String(text) = &value {
            if let Some(output_ref) = OutputRef::parse(text) {
                return ParamValue::Ref(output_ref);
            }
        }
        if let Value::Object(map) = &value {
            if map.len() == 1 {
                if let Some(Value::String(text)) = map.get(REF_TAG) {
                    if let Some(output_ref) = OutputRef::parse(text) {
                        return ParamValue::Ref(output_ref);
                    }
                }
            }
        }
        ParamValue::Literal(value)
    }

    pub fn as_ref(&self) -> Option<&OutputRef> {
        match self {
            ParamValue::Ref(output_ref) => Some(output_ref),
            ParamValue::Literal(_) => None,
        }
    }

    pub fn as_literal(&self) -> Option<&Value> {
        match self {
            ParamValue::Literal(value) => Some(value),
            ParamValue::Ref(_) => None,
        }
    }
}

impl<'de> Deserialize<'de> for ParamValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(ParamValue::from_value(value))
    }
}

impl Serialize for ParamValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            ParamValue::Literal(value) => value.serialize(serializer),
            ParamValue::Ref(output_ref) => serializer.serialize_str(&output_ref.to_string()),
        }
    }
}
