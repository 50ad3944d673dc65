// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Wrapper Synthesizer
//!
//! Turns validated agent source plus its metadata into a self-contained
//! service, using Handlebars for placeholder substitution.
//!
//! # Generated Files
//!
//! - `agent.py` - the submitted source embedded verbatim, an `api_wrapper`
//!   adapter producing the standard envelope, and a gradio `Interface`
//!   bound to that adapter
//! - `Dockerfile` - build descriptor launching `agent.py`
//! - `requirements.txt` - gradio plus the declared requirements
//!
//! # Substitution Policy
//!
//! Metadata values are only ever substituted as escaped Python string
//! literals (see [`python_string_literal`]), and names must already satisfy
//! [`AgentMetadata::validate`]. HTML escaping is disabled since the output is
//! Python and Dockerfile syntax.

use handlebars::Handlebars;
use serde::Serialize;
use std::fmt::Write as _;
use thiserror::Error;

use crate::domain::agent::{AgentMetadata, MetadataError};
use crate::domain::envelope::PROCESSING_ERROR;

const WRAPPER_TEMPLATE: &str = include_str!("../../templates/agent_wrapper.py.hbs");
const DOCKERFILE_TEMPLATE: &str = include_str!("../../templates/Dockerfile.hbs");

/// Framework requirement every agent image installs. Pinned below 4 so the
/// `/api/predict` endpoint keeps its `{"data": [...]}` contract.
pub const FRAMEWORK_REQUIREMENT: &str = "gradio>=3.50,<4";

#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("Invalid metadata: {0}")]
    Metadata(#[from] MetadataError),

    #[error("Failed to render {template}: {message}")]
    Template { template: &'static str, message: String },
}

/// Files making up one agent build context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildBundle {
    pub agent_source: String,
    pub dockerfile: String,
    pub requirements: String,
}

impl BuildBundle {
    pub const AGENT_FILE: &'static str = "agent.py";
    pub const DOCKERFILE: &'static str = "Dockerfile";
    pub const REQUIREMENTS_FILE: &'static str = "requirements.txt";

    /// `(file name, contents)` pairs in a fixed order.
    pub fn files(&self) -> [(&'static str, &str); 3] {
        [
            (Self::AGENT_FILE, self.agent_source.as_str()),
            (Self::DOCKERFILE, self.dockerfile.as_str()),
            (Self::REQUIREMENTS_FILE, self.requirements.as_str()),
        ]
    }
}

#[derive(Serialize)]
struct WrapperContext<'a> {
    agent_id: &'a str,
    source: &'a str,
    name: String,
    description: String,
    error_code: &'a str,
    port: u16,
}

#[derive(Serialize)]
struct DockerfileContext<'a> {
    base_image: &'a str,
    port: u16,
}

pub struct WrapperSynthesizer {
    handlebars: Handlebars<'static>,
    base_image: String,
    internal_port: u16,
}

impl WrapperSynthesizer {
    pub fn new(base_image: impl Into<String>, internal_port: u16) -> Self {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(true);
        handlebars.register_escape_fn(handlebars::no_escape);

        Self {
            handlebars,
            base_image: base_image.into(),
            internal_port,
        }
    }

    /// Produce the wrapped service source. Deterministic: identical inputs
    /// always yield identical output.
    pub fn synthesize(&self, source: &str, metadata: &AgentMetadata) -> Result<String, SynthesisError> {
        metadata.validate()?;

        let agent_id = metadata.agent_id();
        let context = WrapperContext {
            agent_id: agent_id.as_str(),
            source,
            name: python_string_literal(metadata.name.trim()),
            description: python_string_literal(&metadata.description),
            error_code: PROCESSING_ERROR,
            port: self.internal_port,
        };

        self.handlebars
            .render_template(WRAPPER_TEMPLATE, &context)
            .map_err(|e| SynthesisError::Template {
                template: BuildBundle::AGENT_FILE,
                message: e.to_string(),
            })
    }

    pub fn dockerfile(&self) -> Result<String, SynthesisError> {
        let context = DockerfileContext {
            base_image: &self.base_image,
            port: self.internal_port,
        };

        self.handlebars
            .render_template(DOCKERFILE_TEMPLATE, &context)
            .map_err(|e| SynthesisError::Template {
                template: BuildBundle::DOCKERFILE,
                message: e.to_string(),
            })
    }

    /// Wrapper source, build descriptor and dependency list for one agent.
    pub fn bundle(&self, source: &str, metadata: &AgentMetadata) -> Result<BuildBundle, SynthesisError> {
        Ok(BuildBundle {
            agent_source: self.synthesize(source, metadata)?,
            dockerfile: self.dockerfile()?,
            requirements: requirements_txt(&metadata.requirements),
        })
    }
}

/// `gradio` first, then the declared requirements in order, without duplicates.
pub fn requirements_txt(declared: &[String]) -> String {
    let mut seen: Vec<&str> = vec![FRAMEWORK_REQUIREMENT];
    for requirement in declared {
        let requirement = requirement.trim();
        let is_framework = requirement == "gradio"
            || requirement.starts_with("gradio=")
            || requirement.starts_with("gradio<")
            || requirement.starts_with("gradio>");
        if !requirement.is_empty() && !is_framework && !seen.contains(&requirement) {
            seen.push(requirement);
        }
    }

    let mut out = seen.join("\n");
    out.push('\n');
    out
}

/// Render `value` as a double-quoted Python string literal that evaluates
/// back to exactly `value`.
pub fn python_string_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() || c == '\u{2028}' || c == '\u{2029}' => {
                let _ = write!(out, "\\U{:08x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
