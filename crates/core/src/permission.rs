// Permission policy for tool calls requested by the agent

use crate::agents::SubagentRegistry;
use crate::error::{AgentError, AgentResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

/// How tool calls that are not pre-approved are treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PermissionMode {
    /// Ask for every call that is not pre-approved
    #[default]
    Default,
    /// Auto-approve file edits
    AcceptEdits,
    /// Read-only planning; anything that acts is denied
    Plan,
    /// Allow everything
    BypassPermissions,
    /// Deny anything that is not pre-approved
    DontAsk,
}

impl PermissionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::AcceptEdits => "acceptEdits",
            Self::Plan => "plan",
            Self::BypassPermissions => "bypassPermissions",
            Self::DontAsk => "dontAsk",
        }
    }
}

const EDIT_TOOLS: &[&str] = &["Edit", "MultiEdit", "Write", "NotebookEdit"];
const READ_ONLY_TOOLS: &[&str] = &["Read", "Grep", "Glob", "LS", "WebFetch", "WebSearch"];

/// Policy decision
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionDecision {
    Allow,
    Deny { reason: String },
    Ask,
}

/// A tool call awaiting a permission decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermissionRequest {
    pub tool_name: String,
    #[serde(default)]
    pub input: serde_json::Value,
    /// Subagent on whose behalf the call is made, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
}

impl PermissionRequest {
    pub fn new(tool_name: impl Into<String>, input: serde_json::Value) -> Self {
        Self {
            tool_name: tool_name.into(),
            input,
            agent: None,
        }
    }

    pub fn for_agent(mut self, agent: impl Into<String>) -> Self {
        self.agent = Some(agent.into());
        self
    }
}

/// Static allow/deny policy derived from session options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionPolicy {
    mode: PermissionMode,
    allowed_tools: BTreeSet<String>,
    disallowed_tools: BTreeSet<String>,
}

impl PermissionPolicy {
    pub fn new(mode: PermissionMode) -> Self {
        Self {
            mode,
            ..Default::default()
        }
    }

    pub fn with_allowed<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_tools.extend(tools.into_iter().map(Into::into));
        self
    }

    pub fn with_disallowed<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.disallowed_tools.extend(tools.into_iter().map(Into::into));
        self
    }

    pub fn mode(&self) -> PermissionMode {
        self.mode
    }

    /// Evaluate a tool name against the policy.
    pub fn evaluate(&self, tool: &str) -> PermissionDecision {
        if matches_any(&self.disallowed_tools, tool) {
            return PermissionDecision::Deny {
                reason: "tool is disallowed".to_string(),
            };
        }

        if self.mode == PermissionMode::BypassPermissions || matches_any(&self.allowed_tools, tool) {
            return PermissionDecision::Allow;
        }

        match self.mode {
            PermissionMode::AcceptEdits if EDIT_TOOLS.contains(&tool) => PermissionDecision::Allow,
            PermissionMode::Plan if READ_ONLY_TOOLS.contains(&tool) => PermissionDecision::Allow,
            PermissionMode::Plan => PermissionDecision::Deny {
                reason: "plan mode only permits read-only tools".to_string(),
            },
            PermissionMode::DontAsk => PermissionDecision::Deny {
                reason: "tool is not in the allowed list".to_string(),
            },
            _ => PermissionDecision::Ask,
        }
    }
}

/// `mcp__calc` grants every tool of the `calc` server.
fn matches_any(patterns: &BTreeSet<String>, tool: &str) -> bool {
    patterns.contains(tool)
        || patterns.iter().any(|pattern| {
            pattern.starts_with("mcp__")
                && pattern.matches("__").count() == 1
                && tool
                    .strip_prefix(pattern.as_str())
                    .is_some_and(|rest| rest.starts_with("__"))
        })
}

/// Resolves calls the policy could not decide on its own.
#[async_trait::async_trait]
pub trait PermissionHandler: Send + Sync {
    async fn decide(&self, request: &PermissionRequest) -> PermissionDecision;
}

/// Combined check: subagent scope, then policy, then the interactive handler.
#[derive(Clone)]
pub struct PermissionGate {
    policy: PermissionPolicy,
    subagents: SubagentRegistry,
    handler: Option<Arc<dyn PermissionHandler>>,
}

impl PermissionGate {
    pub fn new(policy: PermissionPolicy, subagents: SubagentRegistry) -> Self {
        Self {
            policy,
            subagents,
            handler: None,
        }
    }

    pub fn with_handler(mut self, handler: Arc<dyn PermissionHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    pub async fn check(&self, request: &PermissionRequest) -> AgentResult<()> {
        let tool = request.tool_name.as_str();

        if let Some(agent) = &request.agent {
            self.subagents.check_tool(agent, tool)?;
        }

        let decision = match self.policy.evaluate(tool) {
            PermissionDecision::Ask => match &self.handler {
                Some(handler) => handler.decide(request).await,
                None => PermissionDecision::Deny {
                    reason: "no permission handler available to approve the call".to_string(),
                },
            },
            decided => decided,
        };

        match decision {
            PermissionDecision::Allow => {
                tracing::debug!(tool, "Tool call allowed");
                Ok(())
            }
            PermissionDecision::Deny { reason } => {
                tracing::info!(tool, %reason, "Tool call denied");
                Err(AgentError::permission_denied(tool, reason))
            }
            PermissionDecision::Ask => Err(AgentError::permission_denied(
                tool,
                "permission handler deferred the decision",
            )),
        }
    }
}

impl std::fmt::Debug for PermissionGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionGate")
            .field("policy", &self.policy)
            .field("subagents", &self.subagents)
            .field("handler", &self.handler.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::SubagentDefinition;
    use serde_json::json;

    #[test]
    fn test_mode_wire_names() {
        assert_eq!(
            serde_json::to_value(PermissionMode::BypassPermissions).unwrap(),
            json!("bypassPermissions")
        );
        assert_eq!(PermissionMode::AcceptEdits.as_str(), "acceptEdits");
        assert_eq!(PermissionMode::default(), PermissionMode::Default);
    }

    #[test]
    fn test_default_mode_asks_for_unlisted_tools() {
        let policy = PermissionPolicy::new(PermissionMode::Default).with_allowed(["Read"]);
        assert_eq!(policy.evaluate("Read"), PermissionDecision::Allow);
        assert_eq!(policy.evaluate("Bash"), PermissionDecision::Ask);
    }

    #[test]
    fn test_disallowed_wins_over_bypass() {
        let policy = PermissionPolicy::new(PermissionMode::BypassPermissions).with_disallowed(["Bash"]);
        assert!(matches!(policy.evaluate("Bash"), PermissionDecision::Deny { .. }));
        assert_eq!(policy.evaluate("Write"), PermissionDecision::Allow);
    }

    #[test]
    fn test_server_prefix_grants_all_server_tools() {
        let policy = PermissionPolicy::new(PermissionMode::DontAsk).with_allowed(["mcp__calc"]);
        assert_eq!(policy.evaluate("mcp__calc__add"), PermissionDecision::Allow);
        assert_eq!(policy.evaluate("mcp__calc__power"), PermissionDecision::Allow);
        assert!(matches!(policy.evaluate("mcp__calculator__add"), PermissionDecision::Deny { .. }));
        assert!(matches!(policy.evaluate("Read"), PermissionDecision::Deny { .. }));
    }

    #[test]
    fn test_accept_edits_and_plan_modes() {
        let edits = PermissionPolicy::new(PermissionMode::AcceptEdits);
        assert_eq!(edits.evaluate("Write"), PermissionDecision::Allow);
        assert_eq!(edits.evaluate("Bash"), PermissionDecision::Ask);

        let plan = PermissionPolicy::new(PermissionMode::Plan);
        assert_eq!(plan.evaluate("Grep"), PermissionDecision::Allow);
        assert!(matches!(plan.evaluate("Write"), PermissionDecision::Deny { .. }));
    }

    struct ApproveReads;

    #[async_trait::async_trait]
    impl PermissionHandler for ApproveReads {
        async fn decide(&self, request: &PermissionRequest) -> PermissionDecision {
            if request.tool_name == "Bash" {
                PermissionDecision::Deny {
                    reason: "no shell".to_string(),
                }
            } else {
                PermissionDecision::Allow
            }
        }
    }

    #[tokio::test]
    async fn test_gate_consults_handler_when_policy_asks() {
        let gate = PermissionGate::new(PermissionPolicy::default(), SubagentRegistry::new())
            .with_handler(Arc::new(ApproveReads));

        assert!(gate.check(&PermissionRequest::new("Glob", json!({}))).await.is_ok());
        let err = gate
            .check(&PermissionRequest::new("Bash", json!({"command": "ls"})))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::PermissionDenied { ref reason, .. } if reason == "no shell"));
    }

    #[tokio::test]
    async fn test_gate_without_handler_denies_asks() {
        let gate = PermissionGate::new(PermissionPolicy::default(), SubagentRegistry::new());
        assert!(gate.check(&PermissionRequest::new("Bash", json!({}))).await.is_err());
    }

    #[tokio::test]
    async fn test_gate_enforces_subagent_scope_before_policy() {
        let mut agents = SubagentRegistry::new();
        agents.insert(
            "reviewer",
            SubagentDefinition::new("Reviewer", "Review code.").with_tools(["Read", "Grep"]),
        );
        let gate = PermissionGate::new(PermissionPolicy::new(PermissionMode::BypassPermissions), agents);

        let read = PermissionRequest::new("Read", json!({"file_path": "src/lib.rs"})).for_agent("reviewer");
        assert!(gate.check(&read).await.is_ok());

        let write = PermissionRequest::new("Write", json!({})).for_agent("reviewer");
        let err = gate.check(&write).await.unwrap_err();
        assert!(matches!(err, AgentError::PermissionDenied { .. }));

        // The same tool outside the subagent context is fine under bypass
        assert!(gate.check(&PermissionRequest::new("Write", json!({}))).await.is_ok());
    }
}
