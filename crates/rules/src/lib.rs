//! YAML rule documents that parameterize the triage pipeline.
//!
//! This crate provides:
//! - Typed rule kinds (`FeatureConfig`, `DetectionConfig`, `ScoringConfig`)
//!   with serde deserialization and defaults matching the shipped documents
//! - A filesystem loader with `extends` inheritance
//! - Structural validation run before any config reaches the pipeline

pub mod detection_config;
pub mod feature_config;
pub mod loader;
pub mod schema;
pub mod scoring_config;
pub mod validation;

pub use loader::{RuleError, RuleLoader, TriageRules};
