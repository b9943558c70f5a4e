//! Tool registry
//!
//! A [`ToolSpec`] describes one tool: its unique name, a description for the
//! remote model, typed parameters, its side-effect class and the handler that
//! runs it. [`ToolRegistry`] owns the specs, rejects duplicate names, and
//! preserves registration order for listing.
//!
//! Parameters are validated before any handler runs. Validation is strict:
//!
//! - required parameters must be present (null counts as absent)
//! - unknown parameter names are rejected
//! - integers accept integral floats (`3.0`) but nothing else
//! - numeric bounds, enumerations and non-empty lists are enforced
//! - defaults are filled in for absent optional parameters
//!
//! The same parameter table renders the JSON Schema advertised to clients,
//! so the schema and the validator cannot drift apart.

use std::{collections::HashMap, fmt, sync::Arc};

use serde_json::{Map, Value, json};

use crate::{
    error::{RegistryError, ToolError, ToolResult},
    model::{ArgValue, Arguments},
    tools::ToolHandler,
};

/// Parameter type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    /// Whole number
    Integer,
    /// Any number
    Number,
    /// String
    String,
    /// Boolean
    Boolean,
    /// List of strings
    StringArray,
}

impl ParamType {
    fn schema_type(&self) -> &'static str {
        match self {
            ParamType::Integer => "integer",
            ParamType::Number => "number",
            ParamType::String => "string",
            ParamType::Boolean => "boolean",
            ParamType::StringArray => "array",
        }
    }
}

/// What kind of side effect a tool has
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SideEffect {
    /// Only observes the desktop
    ReadOnly,
    /// Synthesizes pointer or keyboard input
    InputInjection,
    /// Spawns a process
    ProcessSpawn,
}

impl SideEffect {
    /// Returns the side-effect class name
    pub fn as_str(&self) -> &'static str {
        match self {
            SideEffect::ReadOnly => "read_only",
            SideEffect::InputInjection => "input_injection",
            SideEffect::ProcessSpawn => "process_spawn",
        }
    }
}

/// One tool parameter
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    /// Parameter name
    pub name: &'static str,
    /// Parameter type
    pub ty: ParamType,
    /// Description shown in the schema
    pub description: &'static str,
    /// Whether the parameter must be present
    pub required: bool,
    /// Value used when the parameter is absent
    pub default: Option<ArgValue>,
    /// Inclusive lower bound for numbers
    pub minimum: Option<f64>,
    /// Inclusive upper bound for numbers
    pub maximum: Option<f64>,
    /// Allowed string values
    pub allowed: Option<&'static [&'static str]>,
    /// Strings and lists must not be empty
    pub non_empty: bool,
}

impl ParamSpec {
    fn new(name: &'static str, ty: ParamType, description: &'static str) -> Self {
        Self {
            name,
            ty,
            description,
            required: true,
            default: None,
            minimum: None,
            maximum: None,
            allowed: None,
            non_empty: false,
        }
    }

    /// Required integer parameter
    pub fn integer(name: &'static str, description: &'static str) -> Self {
        Self::new(name, ParamType::Integer, description)
    }

    /// Required number parameter
    pub fn number(name: &'static str, description: &'static str) -> Self {
        Self::new(name, ParamType::Number, description)
    }

    /// Required string parameter
    pub fn string(name: &'static str, description: &'static str) -> Self {
        Self::new(name, ParamType::String, description)
    }

    /// Required boolean parameter
    pub fn boolean(name: &'static str, description: &'static str) -> Self {
        Self::new(name, ParamType::Boolean, description)
    }

    /// Required string list parameter
    pub fn string_array(name: &'static str, description: &'static str) -> Self {
        Self::new(name, ParamType::StringArray, description)
    }

    /// Makes the parameter optional with a default
    pub fn default(mut self, value: ArgValue) -> Self {
        self.required = false;
        self.default = Some(value);
        self
    }

    /// Inclusive numeric range
    pub fn range(mut self, minimum: f64, maximum: f64) -> Self {
        self.minimum = Some(minimum);
        self.maximum = Some(maximum);
        self
    }

    /// Inclusive lower bound
    pub fn min(mut self, minimum: f64) -> Self {
        self.minimum = Some(minimum);
        self
    }

    /// Restricts a string to fixed values
    pub fn one_of(mut self, allowed: &'static [&'static str]) -> Self {
        self.allowed = Some(allowed);
        self
    }

    /// Requires a string or list to be non-empty
    pub fn non_empty(mut self) -> Self {
        self.non_empty = true;
        self
    }

    /// Checks one present value against this parameter
    fn check(&self, value: &Value) -> ToolResult<ArgValue> {
        let mismatch = || {
            ToolError::invalid_argument(
                self.name,
                format!("expected {}, got {}", self.type_label(), json_type_name(value)),
            )
        };

        let arg = match (self.ty, value) {
            (ParamType::Integer, Value::Number(n)) => match n.as_i64() {
                Some(i) => ArgValue::Int(i),
                None => match n.as_f64() {
                    Some(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => ArgValue::Int(f as i64),
                    _ => return Err(mismatch()),
                },
            },
            (ParamType::Number, Value::Number(n)) => match n.as_f64() {
                Some(f) => ArgValue::Float(f),
                None => return Err(mismatch()),
            },
            (ParamType::String, Value::String(s)) => {
                if self.non_empty && s.is_empty() {
                    return Err(ToolError::invalid_argument(self.name, "must not be empty"));
                }
                ArgValue::Str(s.clone())
            }
            (ParamType::Boolean, Value::Bool(b)) => ArgValue::Bool(*b),
            (ParamType::StringArray, Value::Array(items)) => {
                let strings = items
                    .iter()
                    .map(|item| match item {
                        Value::String(s) => Ok(ArgValue::Str(s.clone())),
                        other => Err(ToolError::invalid_argument(
                            self.name,
                            format!("expected array of strings, found {}", json_type_name(other)),
                        )),
                    })
                    .collect::<ToolResult<Vec<_>>>()?;
                if self.non_empty && strings.is_empty() {
                    return Err(ToolError::invalid_argument(
                        self.name,
                        "must contain at least one item",
                    ));
                }
                ArgValue::Array(strings)
            }
            _ => return Err(mismatch()),
        };

        let numeric = match &arg {
            ArgValue::Int(i) => Some(*i as f64),
            ArgValue::Float(f) => Some(*f),
            _ => None,
        };
        if let Some(n) = numeric {
            if let Some(min) = self.minimum {
                if n < min {
                    return Err(ToolError::invalid_argument(
                        self.name,
                        format!("{} is below the minimum of {}", n, min),
                    ));
                }
            }
            if let Some(max) = self.maximum {
                if n > max {
                    return Err(ToolError::invalid_argument(
                        self.name,
                        format!("{} is above the maximum of {}", n, max),
                    ));
                }
            }
        }

        if let (Some(allowed), ArgValue::Str(s)) = (self.allowed, &arg) {
            if !allowed.contains(&s.as_str()) {
                return Err(ToolError::invalid_argument(
                    self.name,
                    format!("'{}' is not one of {}", s, allowed.join(", ")),
                ));
            }
        }

        Ok(arg)
    }

    fn type_label(&self) -> &'static str {
        match self.ty {
            ParamType::StringArray => "array of strings",
            other => other.schema_type(),
        }
    }

    /// JSON Schema for this parameter
    pub fn schema(&self) -> Value {
        let mut schema = Map::new();
        schema.insert("type".into(), json!(self.ty.schema_type()));
        schema.insert("description".into(), json!(self.description));
        if self.ty == ParamType::String && self.non_empty {
            schema.insert("minLength".into(), json!(1));
        }
        if self.ty == ParamType::StringArray {
            schema.insert("items".into(), json!({"type": "string"}));
            if self.non_empty {
                schema.insert("minItems".into(), json!(1));
            }
        }
        if let Some(min) = self.minimum {
            schema.insert("minimum".into(), number_json(min));
        }
        if let Some(max) = self.maximum {
            schema.insert("maximum".into(), number_json(max));
        }
        if let Some(allowed) = self.allowed {
            schema.insert("enum".into(), json!(allowed));
        }
        if let Some(default) = &self.default {
            schema.insert("default".into(), default.to_json());
        }
        Value::Object(schema)
    }
}

fn number_json(n: f64) -> Value {
    if n.fract() == 0.0 {
        json!(n as i64)
    } else {
        json!(n)
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A registered tool
#[derive(Clone)]
pub struct ToolSpec {
    /// Unique tool name
    pub name: &'static str,
    /// Description shown to the remote model
    pub description: &'static str,
    /// Parameters in schema order
    pub params: Vec<ParamSpec>,
    /// Side-effect class
    pub side_effect: SideEffect,
    /// Handler invoked with validated arguments
    pub handler: Arc<dyn ToolHandler>,
}

impl fmt::Debug for ToolSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolSpec")
            .field("name", &self.name)
            .field("params", &self.params.len())
            .field("side_effect", &self.side_effect)
            .finish_non_exhaustive()
    }
}

impl ToolSpec {
    /// Creates a spec with no parameters
    pub fn new(
        name: &'static str,
        description: &'static str,
        side_effect: SideEffect,
        handler: Arc<dyn ToolHandler>,
    ) -> Self {
        Self {
            name,
            description,
            params: Vec::new(),
            side_effect,
            handler,
        }
    }

    /// Appends a parameter
    pub fn param(mut self, param: ParamSpec) -> Self {
        self.params.push(param);
        self
    }

    /// Validates raw arguments and fills in defaults
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::ErrorKind::InvalidArgument`] naming the first
    /// offending parameter.
    pub fn validate(&self, raw: &Map<String, Value>) -> ToolResult<Arguments> {
        for name in raw.keys() {
            if !self.params.iter().any(|p| p.name == name) {
                return Err(ToolError::invalid_argument(name, "unknown argument"));
            }
        }

        let mut args = Arguments::new();
        for param in &self.params {
            match raw.get(param.name) {
                Some(value) if !value.is_null() => {
                    args.insert(param.name, param.check(value)?);
                }
                _ => match &param.default {
                    Some(default) => args.insert(param.name, default.clone()),
                    None if param.required => {
                        return Err(ToolError::invalid_argument(
                            param.name,
                            "missing required argument",
                        ));
                    }
                    None => {}
                },
            }
        }
        Ok(args)
    }

    /// JSON Schema object describing the tool's input
    pub fn input_schema(&self) -> Map<String, Value> {
        let properties: Map<String, Value> = self
            .params
            .iter()
            .map(|p| (p.name.to_string(), p.schema()))
            .collect();
        let required: Vec<&str> = self
            .params
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name)
            .collect();

        let mut schema = Map::new();
        schema.insert("type".into(), json!("object"));
        schema.insert("properties".into(), Value::Object(properties));
        schema.insert("required".into(), json!(required));
        schema.insert("additionalProperties".into(), json!(false));
        schema
    }
}

/// Registered tools, in registration order
#[derive(Debug, Default)]
pub struct ToolRegistry {
    specs: Vec<Arc<ToolSpec>>,
    index: HashMap<&'static str, usize>,
}

impl ToolRegistry {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a tool
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateTool`] if the name is taken; the
    /// registry is left unchanged.
    pub fn register(&mut self, spec: ToolSpec) -> Result<(), RegistryError> {
        if self.index.contains_key(spec.name) {
            return Err(RegistryError::DuplicateTool {
                name: spec.name.to_string(),
            });
        }
        self.index.insert(spec.name, self.specs.len());
        self.specs.push(Arc::new(spec));
        Ok(())
    }

    /// Looks up a tool by name
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownTool`] if no tool has this name.
    pub fn resolve(&self, name: &str) -> Result<Arc<ToolSpec>, RegistryError> {
        self.index
            .get(name)
            .map(|&i| self.specs[i].clone())
            .ok_or_else(|| RegistryError::UnknownTool {
                name: name.to_string(),
            })
    }

    /// All tools in registration order
    pub fn list(&self) -> &[Arc<ToolSpec>] {
        &self.specs
    }

    /// Number of registered tools
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    /// Whether no tools are registered
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}
