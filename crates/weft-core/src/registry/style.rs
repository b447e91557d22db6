//! Input-style validation of method calls.
//!
//! The `ORCH_INPUT_STYLE` environment variable controls how strictly the
//! primary (chain) input of a method call is checked against the shape the
//! method declares.
use serde_json::Value;

use crate::registry::error::RegistrySystemError;

/// Environment variable controlling input-style validation
pub const INPUT_STYLE_ENV: &str = "ORCH_INPUT_STYLE";

/// Declared shape of a method's primary input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputShape {
    /// The method accepts any primary input
    #[default]
    Any,
    /// The method expects a single value
    Single,
    /// The method expects a list
    List,
}

/// Validation policy, parsed from `ORCH_INPUT_STYLE`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputStylePolicy {
    /// Reject a one-element list disguising a single value
    #[default]
    StrictSingle,
    /// Accept both shapes, unwrapping or wrapping one-element lists as needed
    AllowList,
    /// Require the primary input to be a list
    EnforceList,
}

impl InputStylePolicy {
    /// Read the policy from the environment; unset or unrecognized values
    /// fall back to `strict_single`.
    pub fn from_env() -> Self {
        match std::env::var(INPUT_STYLE_ENV) {
            Ok(value) => Self::parse(&value).unwrap_or_default(),
            Err(_) => Self::default(),
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "strict_single" => Some(InputStylePolicy::StrictSingle),
            "allow_list" => Some(InputStylePolicy::AllowList),
            "enforce_list" => Some(InputStylePolicy::EnforceList),
            _ => None,
        }
    }

    /// Validate (and possibly adapt) a primary input against the declared
    /// shape. Returns the value to pass to the callable.
    pub fn check_primary(
        &self,
        full_key: &str,
        shape: InputShape,
        value: Value,
    ) -> std::result::Result<Value, RegistrySystemError> {
        match shape {
            InputShape::Any => Ok(value),
            InputShape::Single => self.check_single(full_key, value),
            InputShape::List => self.check_list(full_key, value),
        }
    }

    fn check_single(
        &self,
        full_key: &str,
        value: Value,
    ) -> std::result::Result<Value, RegistrySystemError> {
        match (self, value) {
            (InputStylePolicy::StrictSingle, Value::Array(items)) => {
                let reason = if items.len() == 1 {
                    "one-element list passed to a single-value method".to_string()
                } else {
                    format!("list of {} passed to a single-value method", items.len())
                };
                Err(RegistrySystemError::InputStyle {
                    full_key: full_key.to_string(),
                    reason,
                })
            }
            (InputStylePolicy::AllowList, Value::Array(mut items)) => {
                if items.len() == 1 {
                    Ok(items.remove(0))
                } else {
                    Err(RegistrySystemError::InputStyle {
                        full_key: full_key.to_string(),
                        reason: format!(
                            "list of {} cannot be unwrapped for a single-value method",
                            items.len()
                        ),
                    })
                }
            }
            (InputStylePolicy::EnforceList, Value::Array(mut items)) => {
                if items.len() == 1 {
                    Ok(items.remove(0))
                } else {
                    Err(RegistrySystemError::InputStyle {
                        full_key: full_key.to_string(),
                        reason: format!(
                            "list of {} cannot be unwrapped for a single-value method",
                            items.len()
                        ),
                    })
                }
            }
            (InputStylePolicy::EnforceList, _) => Err(RegistrySystemError::InputStyle {
                full_key: full_key.to_string(),
                reason: "primary input must be a list under enforce_list".to_string(),
            }),
            (_, value) => Ok(value),
        }
    }

    fn check_list(
        &self,
        full_key: &str,
        value: Value,
    ) -> std::result::Result<Value, RegistrySystemError> {
        match (self, value) {
            (_, value @ Value::Array(_)) => Ok(value),
            (InputStylePolicy::AllowList, value) => Ok(Value::Array(vec![value])),
            (_, _) => Err(RegistrySystemError::InputStyle {
                full_key: full_key.to_string(),
                reason: "primary input must be a list".to_string(),
            }),
        }
    }
}
