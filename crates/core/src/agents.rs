// Subagent definitions and their tool scopes

use crate::error::{AgentError, AgentResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Model alias a subagent runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubagentModel {
    Sonnet,
    Opus,
    Haiku,
    /// Use the parent agent's model
    Inherit,
}

/// A named configuration the primary agent may delegate a sub-task to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubagentDefinition {
    /// When the primary agent should use this subagent.
    pub description: String,
    /// System prompt for the subagent.
    pub prompt: String,
    /// Tools the subagent may call. `None` inherits every tool the parent may use.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<SubagentModel>,
}

impl SubagentDefinition {
    pub fn new(description: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            prompt: prompt.into(),
            tools: None,
            model: None,
        }
    }

    pub fn with_tools<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tools = Some(tools.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_model(mut self, model: SubagentModel) -> Self {
        self.model = Some(model);
        self
    }

    /// Whether this subagent's scope admits the tool.
    pub fn permits(&self, tool: &str) -> bool {
        match &self.tools {
            Some(tools) => tools.iter().any(|t| t == tool),
            None => true,
        }
    }
}

/// Registered subagents, keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubagentRegistry {
    agents: BTreeMap<String, SubagentDefinition>,
}

impl SubagentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, definition: SubagentDefinition) {
        self.agents.insert(name.into(), definition);
    }

    pub fn get(&self, name: &str) -> Option<&SubagentDefinition> {
        self.agents.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &SubagentDefinition)> {
        self.agents.iter()
    }

    /// Check that a tool call made in a subagent's context stays inside its scope.
    pub fn check_tool(&self, agent: &str, tool: &str) -> AgentResult<()> {
        let definition = self.agents.get(agent).ok_or_else(|| {
            AgentError::permission_denied(tool, format!("unknown subagent '{}'", agent))
        })?;

        if definition.permits(tool) {
            Ok(())
        } else {
            tracing::warn!(agent, tool, "Subagent attempted a tool outside its scope");
            Err(AgentError::permission_denied(
                tool,
                format!("subagent '{}' is not allowed to use this tool", agent),
            ))
        }
    }

    /// Reject empty names and blank prompts.
    pub fn validate(&self) -> AgentResult<()> {
        for (name, definition) in &self.agents {
            if name.trim().is_empty() {
                return Err(AgentError::Configuration(
                    "subagent name must not be empty".to_string(),
                ));
            }
            if definition.prompt.trim().is_empty() {
                return Err(AgentError::Configuration(format!(
                    "subagent '{}' has an empty prompt",
                    name
                )));
            }
        }
        Ok(())
    }
}

impl<S: Into<String>> FromIterator<(S, SubagentDefinition)> for SubagentRegistry {
    fn from_iter<T: IntoIterator<Item = (S, SubagentDefinition)>>(iter: T) -> Self {
        Self {
            agents: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> SubagentRegistry {
        [(
            "reviewer",
            SubagentDefinition::new("Expert code reviewer", "You review code.")
                .with_tools(["Read", "Grep"])
                .with_model(SubagentModel::Sonnet),
        )]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_reviewer_scope() {
        let agents = registry();

        assert!(agents.check_tool("reviewer", "Read").is_ok());
        assert!(agents.check_tool("reviewer", "Grep").is_ok());

        for tool in ["Write", "Bash", "mcp__calc__add"] {
            let err = agents.check_tool("reviewer", tool).unwrap_err();
            assert!(matches!(err, AgentError::PermissionDenied { .. }));
        }
    }

    #[test]
    fn test_unknown_subagent_is_denied() {
        let err = registry().check_tool("ghost", "Read").unwrap_err();
        assert!(matches!(err, AgentError::PermissionDenied { ref reason, .. } if reason.contains("ghost")));
    }

    #[test]
    fn test_unscoped_subagent_inherits_tools() {
        let mut agents = SubagentRegistry::new();
        agents.insert("helper", SubagentDefinition::new("General helper", "Help out."));
        assert!(agents.check_tool("helper", "Bash").is_ok());
    }

    #[test]
    fn test_serialized_shape() {
        let value = serde_json::to_value(registry()).unwrap();
        assert_eq!(value["reviewer"]["tools"], serde_json::json!(["Read", "Grep"]));
        assert_eq!(value["reviewer"]["model"], "sonnet");
        assert_eq!(value["reviewer"]["description"], "Expert code reviewer");
    }

    #[test]
    fn test_validate_rejects_blank_prompt() {
        let mut agents = SubagentRegistry::new();
        agents.insert("empty", SubagentDefinition::new("desc", "  "));
        assert!(matches!(agents.validate(), Err(AgentError::Configuration(_))));
    }
}
