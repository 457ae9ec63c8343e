use std::fmt;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// Placeholder image record. No pixels are stored; operations are only
/// recorded in the log so a pipeline run can be inspected afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    pub width: u32,
    pub height: u32,
    pub title: Option<String>,
    operations: Vec<String>,
}

impl Image {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            title: None,
            operations: Vec::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Append an operation name to the log. The log is append-only.
    pub fn record_operation(&mut self, operation: impl Into<String>) {
        self.operations.push(operation.into());
    }

    pub fn operations(&self) -> &[String] {
        &self.operations
    }
}

/// Port type identifier for connection validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PortType {
    String,
    Bool,
    Int,
    Float,
    Image,
}

impl PortType {
    /// Parse an upper-case type tag as written in node templates.
    pub fn parse(tag: &str) -> Result<Self> {
        match tag {
            "STRING" => Ok(Self::String),
            "BOOL" => Ok(Self::Bool),
            "INT" => Ok(Self::Int),
            "FLOAT" => Ok(Self::Float),
            "IMAGE" => Ok(Self::Image),
            other => bail!("no such type {other}"),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::String => "STRING",
            Self::Bool => "BOOL",
            Self::Int => "INT",
            Self::Float => "FLOAT",
            Self::Image => "IMAGE",
        }
    }

    pub fn is_compatible(&self, other: &PortType) -> bool {
        self == other
    }

    /// Exact membership test; no coercion between kinds.
    pub fn accepts(&self, data: &PortData) -> bool {
        data.port_type() == *self
    }
}

impl fmt::Display for PortType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Data types that can flow between node ports.
///
/// `Clone` is a deep copy, so every fan-out destination owns its own image log.
#[derive(Debug, Clone, PartialEq)]
pub enum PortData {
    Str(String),
    Bool(bool),
    Int(i64),
    Float(f64),
    Image(Image),
}

impl PortData {
    pub fn port_type(&self) -> PortType {
        match self {
            Self::Str(_) => PortType::String,
            Self::Bool(_) => PortType::Bool,
            Self::Int(_) => PortType::Int,
            Self::Float(_) => PortType::Float,
            Self::Image(_) => PortType::Image,
        }
    }

    /// Decode a JSON literal from a pipeline description.
    ///
    /// The kind follows the literal itself: `3` is INT, `3.0` is FLOAT.
    pub fn from_json_literal(value: &serde_json::Value) -> Result<Self> {
        match value {
            serde_json::Value::String(v) => Ok(Self::Str(v.clone())),
            serde_json::Value::Bool(v) => Ok(Self::Bool(*v)),
            serde_json::Value::Number(n) => {
                if let Some(v) = n.as_i64() {
                    Ok(Self::Int(v))
                } else if n.is_f64() {
                    match n.as_f64() {
                        Some(v) => Ok(Self::Float(v)),
                        None => bail!("unsupported numeric literal {n}"),
                    }
                } else {
                    bail!("integer literal {n} does not fit in INT")
                }
            }
            serde_json::Value::Null => bail!("null is not a valid constant"),
            serde_json::Value::Array(_) => bail!("arrays are not valid constants"),
            serde_json::Value::Object(_) => bail!("objects are not valid constants"),
        }
    }
}

impl fmt::Display for PortData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(v) => f.write_str(v),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Image(image) => write!(
                f,
                "Image({}x{}, title={}, operations=[{}])",
                image.width,
                image.height,
                image.title.as_deref().unwrap_or("untitled"),
                image.operations().join(", ")
            ),
        }
    }
}
