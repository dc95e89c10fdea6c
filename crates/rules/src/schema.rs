//! Rule document envelope and kind dispatch.
//!
//! Every rule file shares a header (`apiVersion`, `kind`, `metadata`); the
//! `spec` section is kind-specific. Loading is two-pass: read the envelope to
//! learn the kind, then deserialize the concrete document.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::detection_config::DetectionConfigRule;
use crate::feature_config::FeatureConfigRule;
use crate::scoring_config::ScoringConfigRule;

// ── Rule kind enum ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RuleKind {
    FeatureConfig,
    DetectionConfig,
    ScoringConfig,
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleKind::FeatureConfig => write!(f, "FeatureConfig"),
            RuleKind::DetectionConfig => write!(f, "DetectionConfig"),
            RuleKind::ScoringConfig => write!(f, "ScoringConfig"),
        }
    }
}

impl FromStr for RuleKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "FeatureConfig" => Ok(RuleKind::FeatureConfig),
            "DetectionConfig" => Ok(RuleKind::DetectionConfig),
            "ScoringConfig" => Ok(RuleKind::ScoringConfig),
            other => Err(format!("unknown rule kind: '{}'", other)),
        }
    }
}

// ── Metadata ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct CommonMetadata {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Parent rule ID for inheritance. The loader deep-merges the parent's
    /// spec into this rule, with child fields taking precedence.
    #[serde(default)]
    pub extends: Option<String>,
}

pub(crate) fn default_true() -> bool {
    true
}

impl CommonMetadata {
    /// Metadata for a built-in default document.
    pub(crate) fn builtin(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: Some("built-in default".to_string()),
            tags: None,
            enabled: true,
            extends: None,
        }
    }
}

// ── Rule envelope (first-pass) ──────────────────────────────────────

/// Lightweight first-pass deserializer that reads only the header fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleEnvelope {
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    pub kind: String,
    pub metadata: CommonMetadata,
    /// Remaining fields captured as raw YAML for second-pass deserialization.
    #[serde(flatten)]
    pub rest: serde_yaml::Value,
}

impl RuleEnvelope {
    pub fn rule_kind(&self) -> std::result::Result<RuleKind, String> {
        self.kind.parse()
    }

    /// Two-pass: reconstruct the full YAML and deserialize into the concrete type.
    pub fn parse_full(&self) -> std::result::Result<RuleDocument, String> {
        let yaml = serde_yaml::to_string(self).map_err(|e| e.to_string())?;
        RuleDocument::from_yaml_kind(self.rule_kind()?, &yaml)
    }
}

// ── Rule document (multi-kind container) ────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum RuleDocument {
    /// Window lengths, clinical thresholds and artifact filter parameters.
    FeatureConfig(FeatureConfigRule),
    /// Severity rule thresholds and alert gate thresholds.
    DetectionConfig(DetectionConfigRule),
    /// Outlier estimators, hybrid weights, risk scoring and drift thresholds.
    ScoringConfig(ScoringConfigRule),
}

impl RuleDocument {
    pub fn from_yaml_kind(kind: RuleKind, yaml: &str) -> std::result::Result<Self, String> {
        match kind {
            RuleKind::FeatureConfig => serde_yaml::from_str(yaml)
                .map(RuleDocument::FeatureConfig)
                .map_err(|e| e.to_string()),
            RuleKind::DetectionConfig => serde_yaml::from_str(yaml)
                .map(RuleDocument::DetectionConfig)
                .map_err(|e| e.to_string()),
            RuleKind::ScoringConfig => serde_yaml::from_str(yaml)
                .map(RuleDocument::ScoringConfig)
                .map_err(|e| e.to_string()),
        }
    }

    pub fn kind(&self) -> RuleKind {
        match self {
            RuleDocument::FeatureConfig(_) => RuleKind::FeatureConfig,
            RuleDocument::DetectionConfig(_) => RuleKind::DetectionConfig,
            RuleDocument::ScoringConfig(_) => RuleKind::ScoringConfig,
        }
    }

    pub fn metadata(&self) -> &CommonMetadata {
        match self {
            RuleDocument::FeatureConfig(r) => &r.metadata,
            RuleDocument::DetectionConfig(r) => &r.metadata,
            RuleDocument::ScoringConfig(r) => &r.metadata,
        }
    }
}
