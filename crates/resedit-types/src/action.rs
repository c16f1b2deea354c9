//! Custom actions: backend operations with a declared argument schema.
//!
//! Arguments are collected from the user at invocation time and sent as a
//! positional list matching [`CustomAction::args`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{AsRefStr, Display, EnumString};
use thiserror::Error;

/// A named backend-side operation runnable on a block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomAction {
    /// Backend method name.
    pub method: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub args: Vec<ActionArg>,
}

/// One declared argument of a [`CustomAction`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionArg {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type", default)]
    pub arg_type: ArgType,
}

/// JSON type an argument must have.
///
/// Types this crate does not know decode as [`ArgType::Any`] and are not
/// checked.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ArgType {
    Bool,
    Number,
    String,
    #[default]
    #[serde(other)]
    Any,
}

impl ArgType {
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            Self::Bool => value.is_boolean(),
            Self::Number => value.is_number(),
            Self::String => value.is_string(),
            Self::Any => true,
        }
    }
}

/// Arguments that do not match an action's schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionArgError {
    #[error("expected {expected} arguments, got {got}")]
    Arity { expected: usize, got: usize },

    #[error("argument {arg} must be of type {expected}")]
    Type { arg: String, expected: ArgType },
}

impl CustomAction {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            title: String::new(),
            description: String::new(),
            args: Vec::new(),
        }
    }

    pub fn with_arg(mut self, id: impl Into<String>, arg_type: ArgType) -> Self {
        self.args.push(ActionArg {
            id: id.into(),
            title: String::new(),
            description: String::new(),
            arg_type,
        });
        self
    }

    /// Check a positional argument list against the declared schema.
    pub fn validate_args(&self, args: &[Value]) -> Result<(), ActionArgError> {
        if args.len() != self.args.len() {
            return Err(ActionArgError::Arity {
                expected: self.args.len(),
                got: args.len(),
            });
        }
        for (decl, value) in self.args.iter().zip(args) {
            if !decl.arg_type.accepts(value) {
                return Err(ActionArgError::Type {
                    arg: decl.id.clone(),
                    expected: decl.arg_type,
                });
            }
        }
        Ok(())
    }

    /// Title for menus, falling back to the method name.
    pub fn display_title(&self) -> &str {
        if self.title.is_empty() {
            &self.method
        } else {
            &self.title
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scale() -> CustomAction {
        CustomAction::new("scale_car")
            .with_arg("scale", ArgType::Number)
            .with_arg("keep_wheels", ArgType::Bool)
    }

    #[test]
    fn test_valid_args() {
        assert!(scale().validate_args(&[json!(1.5), json!(true)]).is_ok());
    }

    #[test]
    fn test_arity_mismatch() {
        let err = scale().validate_args(&[json!(1.5)]).unwrap_err();
        assert_eq!(err, ActionArgError::Arity { expected: 2, got: 1 });
    }

    #[test]
    fn test_type_mismatch() {
        let err = scale().validate_args(&[json!("big"), json!(true)]).unwrap_err();
        assert_eq!(
            err,
            ActionArgError::Type {
                arg: "scale".into(),
                expected: ArgType::Number
            }
        );
        assert_eq!(err.to_string(), "argument scale must be of type number");
    }

    #[test]
    fn test_any_accepts_everything() {
        let action = CustomAction::new("dump").with_arg("payload", ArgType::Any);
        assert!(action.validate_args(&[json!({"a": [1]})]).is_ok());
    }

    #[test]
    fn test_unknown_arg_type_is_unchecked() {
        let action: CustomAction = serde_json::from_value(json!({
            "method": "pick",
            "args": [{"id": "mode", "type": "enum"}]
        }))
        .unwrap();
        assert_eq!(action.args[0].arg_type, ArgType::Any);
        assert!(action.validate_args(&[json!(3)]).is_ok());
    }

    #[test]
    fn test_wire_shape() {
        let action: CustomAction = serde_json::from_value(json!({
            "method": "flip",
            "title": "Flip horizontally",
            "args": [{"id": "axis", "type": "string"}]
        }))
        .unwrap();
        assert_eq!(action.args[0].arg_type, ArgType::String);
        assert_eq!(action.display_title(), "Flip horizontally");
        assert_eq!(CustomAction::new("flip").display_title(), "flip");
    }
}
