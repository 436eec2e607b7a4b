use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

// ============================================================================
// Agent Card and Discovery Types
// ============================================================================

/// Error returned when a deserialized card fails validation.
#[derive(Debug, Error)]
#[error("agent card is missing required field `{0}`")]
pub struct InvalidAgentCard(pub &'static str);

/// A distinct capability or function that an agent can perform.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentSkill {
    /// A unique identifier for the agent's skill.
    pub id: String,
    /// A human-readable name for the skill.
    pub name: String,
    /// Keywords describing the skill's capabilities.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub tags: Vec<String>,
    /// A detailed description of the skill.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl AgentSkill {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            tags: Vec::new(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn add_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }
}

/// The AgentCard is a self-describing manifest for an agent, served at the
/// well-known descriptor path.
///
/// `name`, `url` and `protocolVersion` are required; a descriptor missing any
/// of them fails deserialization or [`AgentCard::validate`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentCard {
    /// A human-readable name for the agent.
    pub name: String,
    /// The endpoint URL for interacting with the agent.
    pub url: String,
    /// The version of the A2A protocol this agent supports.
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    /// A human-readable description of the agent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Named boolean capability flags (e.g. "streaming", "pushNotifications").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<HashMap<String, bool>>,
    /// The set of skills that the agent can perform.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub skills: Vec<AgentSkill>,
}

impl AgentCard {
    /// Create a new card with the required fields.
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        protocol_version: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            protocol_version: protocol_version.into(),
            description: None,
            capabilities: None,
            skills: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set a named capability flag.
    pub fn with_capability(mut self, name: impl Into<String>, enabled: bool) -> Self {
        self.capabilities
            .get_or_insert_with(HashMap::new)
            .insert(name.into(), enabled);
        self
    }

    pub fn add_skill(mut self, skill: AgentSkill) -> Self {
        self.skills.push(skill);
        self
    }

    /// True if the card declares the named capability flag as enabled.
    pub fn has_capability(&self, name: &str) -> bool {
        self.capabilities
            .as_ref()
            .and_then(|caps| caps.get(name).copied())
            .unwrap_or(false)
    }

    /// True if the card lists a skill with the given id.
    pub fn has_skill(&self, skill_id: &str) -> bool {
        self.skills.iter().any(|skill| skill.id == skill_id)
    }

    /// Check the required fields are non-empty.
    pub fn validate(&self) -> Result<(), InvalidAgentCard> {
        if self.name.is_empty() {
            return Err(InvalidAgentCard("name"));
        }
        if self.url.is_empty() {
            return Err(InvalidAgentCard("url"));
        }
        if self.protocol_version.is_empty() {
            return Err(InvalidAgentCard("protocolVersion"));
        }
        Ok(())
    }
}
