//! Typed argument values shared by global options and task arguments.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::LazyLock;

use crate::{HardhatError, Result};

/// camelCase identifier used for option and argument names.
static ARGUMENT_NAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z][a-zA-Z0-9]*$").expect("argument name pattern is valid")
});

/// Task path segment, dashes allowed after the first character.
static TASK_SEGMENT_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z][a-zA-Z0-9-]*$").expect("task segment pattern is valid")
});

static INTEGER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[+-]?[0-9]+$").expect("integer pattern is valid"));

/// Declared type of an option or argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArgumentType {
    String,
    Boolean,
    /// Boolean that defaults to `false` and is enabled by presence.
    Flag,
    Int,
    #[serde(rename = "BIGINT")]
    BigInt,
    Float,
    File,
}

impl std::fmt::Display for ArgumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::String => write!(f, "STRING"),
            Self::Boolean => write!(f, "BOOLEAN"),
            Self::Flag => write!(f, "FLAG"),
            Self::Int => write!(f, "INT"),
            Self::BigInt => write!(f, "BIGINT"),
            Self::Float => write!(f, "FLOAT"),
            Self::File => write!(f, "FILE"),
        }
    }
}

/// A resolved option or argument value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArgumentValue {
    Boolean(bool),
    Int(i64),
    BigInt(i128),
    Float(f64),
    String(String),
    File(PathBuf),
    List(Vec<ArgumentValue>),
}

impl ArgumentValue {
    /// Check whether this value already has the representation of `kind`.
    pub fn matches(&self, kind: ArgumentType) -> bool {
        matches!(
            (kind, self),
            (ArgumentType::String, Self::String(_))
                | (ArgumentType::Boolean | ArgumentType::Flag, Self::Boolean(_))
                | (ArgumentType::Int, Self::Int(_))
                | (ArgumentType::BigInt, Self::BigInt(_))
                | (ArgumentType::Float, Self::Float(_))
                | (ArgumentType::File, Self::File(_))
        )
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_bigint(&self) -> Option<i128> {
        match self {
            Self::BigInt(value) => Some(*value),
            Self::Int(value) => Some(i128::from(*value)),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_path(&self) -> Option<&std::path::Path> {
        match self {
            Self::File(path) => Some(path),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[ArgumentValue]> {
        match self {
            Self::List(values) => Some(values),
            _ => None,
        }
    }
}

impl std::fmt::Display for ArgumentValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Boolean(value) => write!(f, "{}", value),
            Self::Int(value) => write!(f, "{}", value),
            Self::BigInt(value) => write!(f, "{}", value),
            Self::Float(value) => write!(f, "{}", value),
            Self::String(value) => write!(f, "{}", value),
            Self::File(path) => write!(f, "{}", path.display()),
            Self::List(values) => {
                let parts: Vec<String> = values.iter().map(ToString::to_string).collect();
                write!(f, "[{}]", parts.join(", "))
            }
        }
    }
}

impl From<bool> for ArgumentValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i64> for ArgumentValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for ArgumentValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for ArgumentValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for ArgumentValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<PathBuf> for ArgumentValue {
    fn from(value: PathBuf) -> Self {
        Self::File(value)
    }
}

/// Parse the textual form of a value (command line, environment) into `kind`.
///
/// Booleans accept exactly `true` and `false`. Integers must be a signed
/// decimal literal that fits the target width.
pub fn parse_argument_value(name: &str, kind: ArgumentType, raw: &str) -> Result<ArgumentValue> {
    let invalid = || HardhatError::invalid_value(name, raw, kind);

    match kind {
        ArgumentType::String => Ok(ArgumentValue::String(raw.to_string())),
        ArgumentType::File => Ok(ArgumentValue::File(PathBuf::from(raw))),
        ArgumentType::Boolean | ArgumentType::Flag => match raw {
            "true" => Ok(ArgumentValue::Boolean(true)),
            "false" => Ok(ArgumentValue::Boolean(false)),
            _ => Err(invalid()),
        },
        ArgumentType::Int => {
            if !INTEGER_REGEX.is_match(raw) {
                return Err(invalid());
            }
            raw.parse::<i64>()
                .map(ArgumentValue::Int)
                .map_err(|_| invalid())
        }
        ArgumentType::BigInt => {
            if !INTEGER_REGEX.is_match(raw) {
                return Err(invalid());
            }
            raw.parse::<i128>()
                .map(ArgumentValue::BigInt)
                .map_err(|_| invalid())
        }
        ArgumentType::Float => match raw.parse::<f64>() {
            Ok(value) if value.is_finite() => Ok(ArgumentValue::Float(value)),
            _ => Err(invalid()),
        },
    }
}

/// Coerce a caller-supplied value to `kind`.
///
/// Strings go through [`parse_argument_value`]; values already in the right
/// representation pass unchanged; integers widen to big integers and floats.
pub fn coerce_argument_value(
    name: &str,
    kind: ArgumentType,
    value: ArgumentValue,
) -> Result<ArgumentValue> {
    if value.matches(kind) {
        return Ok(value);
    }

    match (kind, value) {
        (_, ArgumentValue::String(raw)) => parse_argument_value(name, kind, &raw),
        (ArgumentType::BigInt, ArgumentValue::Int(value)) => {
            Ok(ArgumentValue::BigInt(i128::from(value)))
        }
        (ArgumentType::Float, ArgumentValue::Int(value)) => Ok(ArgumentValue::Float(value as f64)),
        (_, other) => Err(HardhatError::invalid_value(name, other.to_string(), kind)),
    }
}

/// Validate a declared default against `kind` and return it in the
/// representation of `kind`.
///
/// Defaults read from configuration lose their exact variant (a big integer
/// arrives as `Int`, a path as `String`), so they are coerced rather than
/// matched. Flags always default to `false`.
pub fn normalize_default(
    name: &str,
    kind: ArgumentType,
    default: ArgumentValue,
) -> Result<ArgumentValue> {
    let value = coerce_argument_value(name, kind, default)?;
    if kind == ArgumentType::Flag && value != ArgumentValue::Boolean(false) {
        return Err(HardhatError::invalid_value(name, value.to_string(), kind));
    }
    Ok(value)
}

/// Check an option or argument name against the identifier grammar.
pub fn is_valid_argument_name(name: &str) -> bool {
    ARGUMENT_NAME_REGEX.is_match(name)
}

/// Check a task path segment against the identifier grammar.
pub fn is_valid_task_segment(segment: &str) -> bool {
    TASK_SEGMENT_REGEX.is_match(segment)
}
