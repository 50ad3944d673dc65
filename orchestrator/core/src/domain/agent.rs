// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Longest display name accepted for an agent.
pub const MAX_NAME_LEN: usize = 64;

/// Stable identifier of a deployed agent, derived from its display name.
///
/// `"Sentiment Bot"` becomes `"sentiment_bot"`: trimmed, lower-cased and
/// every whitespace character replaced by an underscore.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(String);

impl AgentId {
    pub fn from_name(name: &str) -> Self {
        let id = name
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| if c.is_whitespace() { '_' } else { c })
            .collect();
        Self(id)
    }

    /// Wrap an identifier received from a caller (e.g. a URL path segment).
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Metadata declared by the submitter alongside the source code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentMetadata {
    pub name: String,
    pub description: String,
    #[serde(default = "default_version")]
    pub version: String,
    pub model_type: String,
    #[serde(default = "default_io_type")]
    pub input_type: String,
    #[serde(default = "default_io_type")]
    pub output_type: String,
    #[serde(default = "default_true")]
    pub is_public: bool,
    #[serde(default = "default_token_price")]
    pub token_price: f64,
    /// Extra pip requirement specifiers installed next to gradio
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requirements: Vec<String>,
}

impl AgentMetadata {
    pub fn new(name: impl Into<String>, description: impl Into<String>, model_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            version: default_version(),
            model_type: model_type.into(),
            input_type: default_io_type(),
            output_type: default_io_type(),
            is_public: true,
            token_price: default_token_price(),
            requirements: Vec::new(),
        }
    }

    pub fn agent_id(&self) -> AgentId {
        AgentId::from_name(&self.name)
    }

    /// Enforce the allowed-character policy for values that end up in
    /// generated source, image tags and container names.
    pub fn validate(&self) -> Result<(), MetadataError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(MetadataError::EmptyName);
        }
        if name.chars().count() > MAX_NAME_LEN {
            return Err(MetadataError::NameTooLong(MAX_NAME_LEN));
        }
        if let Some(c) = name
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, ' ' | '-' | '_')))
        {
            return Err(MetadataError::InvalidNameCharacter(c));
        }
        if self.version.trim().is_empty() {
            return Err(MetadataError::EmptyVersion);
        }
        if !self.token_price.is_finite() || self.token_price < 0.0 {
            return Err(MetadataError::InvalidPrice(self.token_price));
        }
        for requirement in &self.requirements {
            let malformed = requirement.is_empty()
                || requirement.starts_with('-')
                || requirement.chars().any(|c| c.is_whitespace() || c.is_control());
            if malformed {
                return Err(MetadataError::InvalidRequirement(requirement.clone()));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MetadataError {
    #[error("Agent name cannot be empty")]
    EmptyName,

    #[error("Agent name exceeds maximum length of {0} characters")]
    NameTooLong(usize),

    #[error("Agent name contains invalid character {0:?} (allowed: letters, digits, space, '-', '_')")]
    InvalidNameCharacter(char),

    #[error("Agent version cannot be empty")]
    EmptyVersion,

    #[error("Token price must be a non-negative number, got {0}")]
    InvalidPrice(f64),

    #[error("Invalid requirement specifier: {0:?}")]
    InvalidRequirement(String),
}

fn default_version() -> String {
    "1.0.0".to_string()
}

fn default_io_type() -> String {
    "text".to_string()
}

fn default_true() -> bool {
    true
}

fn default_token_price() -> f64 {
    1.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_id_from_name() {
        assert_eq!(AgentId::from_name("Sentiment Bot").as_str(), "sentiment_bot");
        assert_eq!(AgentId::from_name("  Echo\tAgent ").as_str(), "echo_agent");
        assert_eq!(AgentId::from_name("already_lower").as_str(), "already_lower");
    }

    #[test]
    fn test_metadata_defaults_from_json() {
        let metadata: AgentMetadata = serde_json::from_str(
            r#"{"name": "Sentiment Bot", "description": "Scores text", "model_type": "nlp"}"#,
        )
        .unwrap();

        assert_eq!(metadata.version, "1.0.0");
        assert_eq!(metadata.input_type, "text");
        assert_eq!(metadata.output_type, "text");
        assert!(metadata.is_public);
        assert_eq!(metadata.token_price, 1.0);
        assert!(metadata.requirements.is_empty());
        assert_eq!(metadata.agent_id().as_str(), "sentiment_bot");
    }

    #[test]
    fn test_metadata_validation() {
        let mut metadata = AgentMetadata::new("Sentiment Bot", "Scores text", "nlp");
        assert!(metadata.validate().is_ok());

        metadata.name = "   ".to_string();
        assert_eq!(metadata.validate(), Err(MetadataError::EmptyName));

        metadata.name = "bad\"name".to_string();
        assert_eq!(metadata.validate(), Err(MetadataError::InvalidNameCharacter('"')));

        metadata.name = "x".repeat(MAX_NAME_LEN + 1);
        assert_eq!(metadata.validate(), Err(MetadataError::NameTooLong(MAX_NAME_LEN)));

        metadata.name = "ok".to_string();
        metadata.token_price = -1.0;
        assert!(matches!(metadata.validate(), Err(MetadataError::InvalidPrice(_))));

        metadata.token_price = 0.0;
        metadata.requirements = vec!["numpy==1.26".to_string()];
        assert!(metadata.validate().is_ok());

        metadata.requirements = vec!["--index-url=http://evil".to_string()];
        assert!(matches!(metadata.validate(), Err(MetadataError::InvalidRequirement(_))));

        metadata.requirements = vec!["numpy\nrequests".to_string()];
        assert!(matches!(metadata.validate(), Err(MetadataError::InvalidRequirement(_))));
    }
}
