//! Structured error types shared across MPP crates.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured payload attached to every [`MppError`] variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable machine readable error code.
    pub code: String,
    /// Human readable diagnostic message.
    pub message: String,
    /// Contextual key value pairs (mark ids, sizes, etc.).
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    /// Optional hint that may help the caller resolve the issue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorInfo {
    /// Creates a new error payload with the provided code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            context: BTreeMap::new(),
            hint: None,
        }
    }

    /// Adds a context entry to the payload.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Sets a human readable hint for remediation.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Canonical error type for the sampler.
///
/// Every variant is an abnormal failure. Ordinary proposal rejections are
/// never expressed through this type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "family", content = "detail")]
pub enum MppError {
    /// Mark geometry and rasterization errors.
    #[error("geometry error: {0}")]
    Geometry(ErrorInfo),
    /// Energy evaluation errors (non-finite totals, bad stacks).
    #[error("energy error: {0}")]
    Energy(ErrorInfo),
    /// Proposer contract violations.
    #[error("proposal error: {0}")]
    Proposal(ErrorInfo),
    /// Secondary index inconsistencies.
    #[error("index error: {0}")]
    Index(ErrorInfo),
    /// Invalid sampler configuration.
    #[error("config error: {0}")]
    Config(ErrorInfo),
    /// Randomness and seeding errors.
    #[error("rng error: {0}")]
    Rng(ErrorInfo),
    /// Serialization and schema errors.
    #[error("serde error: {0}")]
    Serde(ErrorInfo),
}

impl Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code: {})", self.message, self.code)?;
        if !self.context.is_empty() {
            write!(f, " | context: [")?;
            for (idx, (key, value)) in self.context.iter().enumerate() {
                if idx > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{key}={value}")?;
            }
            write!(f, "]")?;
        }
        if let Some(hint) = &self.hint {
            write!(f, " | hint: {hint}")?;
        }
        Ok(())
    }
}

impl MppError {
    /// Returns a reference to the payload describing the error.
    pub fn info(&self) -> &ErrorInfo {
        match self {
            MppError::Geometry(info)
            | MppError::Energy(info)
            | MppError::Proposal(info)
            | MppError::Index(info)
            | MppError::Config(info)
            | MppError::Rng(info)
            | MppError::Serde(info) => info,
        }
    }

    /// Shorthand for a non-finite numeric result detected in `what`.
    pub fn non_finite(what: &str, value: f64) -> Self {
        MppError::Energy(
            ErrorInfo::new("non-finite", format!("{what} is not finite"))
                .with_context("value", value.to_string()),
        )
    }
}
