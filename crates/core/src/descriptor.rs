//! Node descriptors: the `kind<TYPE name, ...>` strings used in pipeline
//! descriptions to pick a node kind and, for parameterized kinds, its extra
//! typed ports.

use std::fmt;

use anyhow::{bail, Result};

use crate::types::PortType;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeDescriptor {
    pub kind: String,
    pub template: Option<String>,
}

impl NodeDescriptor {
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        let Some((kind, rest)) = raw.split_once('<') else {
            if raw.is_empty() {
                bail!("empty node descriptor");
            }
            return Ok(Self {
                kind: raw.to_string(),
                template: None,
            });
        };

        let Some(template) = rest.strip_suffix('>') else {
            bail!("node descriptor '{raw}' is missing a closing '>'");
        };

        let kind = kind.trim();
        if kind.is_empty() {
            bail!("node descriptor '{raw}' has no kind");
        }

        Ok(Self {
            kind: kind.to_string(),
            template: Some(template.to_string()),
        })
    }
}

impl fmt::Display for NodeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.template {
            Some(template) => write!(f, "{}<{}>", self.kind, template),
            None => f.write_str(&self.kind),
        }
    }
}

/// One `TYPE name` entry of a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateParam {
    pub port_type: PortType,
    pub name: String,
}

/// Parse `"INT index, STRING title"` into typed parameters, in order.
pub fn parse_template(template: &str) -> Result<Vec<TemplateParam>> {
    if template.trim().is_empty() {
        return Ok(Vec::new());
    }

    template
        .split(',')
        .map(|entry| {
            let tokens: Vec<&str> = entry.split_whitespace().collect();
            let [tag, name] = tokens.as_slice() else {
                bail!("malformed template entry '{}', expected 'TYPE name'", entry.trim());
            };
            Ok(TemplateParam {
                port_type: PortType::parse(tag)?,
                name: (*name).to_string(),
            })
        })
        .collect()
}
