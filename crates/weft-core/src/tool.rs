//! Tool definitions a model can be offered

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CoreError;

/// A tool the model may ask to call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    /// Unique tool name
    pub name: String,
    /// Human-readable description shown to the model
    pub description: String,
    /// JSON Schema of the tool's parameters
    pub parameters: Value,
}

impl Tool {
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

/// A named group of tools handed around as a unit
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Toolset {
    tools: Vec<Tool>,
}

impl Toolset {
    pub const fn new(tools: Vec<Tool>) -> Self {
        Self { tools }
    }

    pub fn add(&mut self, tool: Tool) {
        self.tools.push(tool);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Tool> {
        self.tools.iter()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl<'a> IntoIterator for &'a Toolset {
    type Item = &'a Tool;
    type IntoIter = std::slice::Iter<'a, Tool>;

    fn into_iter(self) -> Self::IntoIter {
        self.tools.iter()
    }
}

/// Tools supplied either as a plain list or as a toolset
///
/// A list serializes as a JSON array, a toolset as `{"tools": [...]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Tools {
    List(Vec<Tool>),
    Toolset(Toolset),
}

impl Tools {
    /// Flattened view of the tools
    pub fn as_slice(&self) -> &[Tool] {
        match self {
            Self::List(tools) => tools,
            Self::Toolset(toolset) => &toolset.tools,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }
}

impl From<Vec<Tool>> for Tools {
    fn from(tools: Vec<Tool>) -> Self {
        Self::List(tools)
    }
}

impl From<Toolset> for Tools {
    fn from(toolset: Toolset) -> Self {
        Self::Toolset(toolset)
    }
}

/// Reject tool collections where two tools share a name
pub fn check_duplicate_tool_names(tools: &[Tool]) -> Result<(), CoreError> {
    let mut seen = BTreeSet::new();
    let duplicates: BTreeSet<&str> = tools
        .iter()
        .filter(|tool| !seen.insert(tool.name.as_str()))
        .map(|tool| tool.name.as_str())
        .collect();

    if duplicates.is_empty() {
        return Ok(());
    }

    let names = duplicates.into_iter().collect::<Vec<_>>().join(", ");
    Err(CoreError::config(format!("duplicate tool names found: {names}")))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn tool(name: &str) -> Tool {
        Tool::new(name, format!("{name} tool"), json!({"type": "object", "properties": {}}))
    }

    #[test]
    fn unique_names_pass() {
        assert!(check_duplicate_tool_names(&[tool("a"), tool("b")]).is_ok());
        assert!(check_duplicate_tool_names(&[]).is_ok());
    }

    #[test]
    fn duplicate_names_are_reported() {
        let err = check_duplicate_tool_names(&[tool("a"), tool("b"), tool("a")]).unwrap_err();
        assert!(matches!(err, CoreError::InvalidConfig(_)));
        assert!(err.to_string().contains("duplicate tool names found: a"));
    }

    #[test]
    fn list_and_toolset_serialize_differently() {
        let list = Tools::from(vec![tool("a")]);
        let set = Tools::from(Toolset::new(vec![tool("a")]));

        assert!(serde_json::to_value(&list).unwrap().is_array());
        assert!(serde_json::to_value(&set).unwrap()["tools"].is_array());

        let restored: Tools = serde_json::from_value(serde_json::to_value(&set).unwrap()).unwrap();
        assert_eq!(restored, set);
        assert_eq!(restored.as_slice().len(), 1);
    }
}
