//! Filesystem rule loader.
//!
//! Scans the rules directory (recursively) for YAML documents, resolves
//! `extends` inheritance, dispatches each document to its concrete kind and
//! validates it. [`TriageRules`] then picks the active document of each kind,
//! falling back to the built-in defaults for kinds with none.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::detection_config::{CompiledDetectionConfig, DetectionConfigRule};
use crate::feature_config::{CompiledFeatureConfig, FeatureConfigRule};
use crate::schema::{RuleDocument, RuleEnvelope, RuleKind};
use crate::scoring_config::{CompiledScoringConfig, ScoringConfigRule};
use crate::validation::validate_document;

// ── Deep-merge for `extends` inheritance ────────────────────────────

/// Maximum inheritance chain depth to prevent infinite loops.
const MAX_EXTENDS_DEPTH: usize = 5;

/// Deep-merge two YAML `Value` maps: child fields win, arrays replace entirely.
pub fn deep_merge(parent: &serde_yaml::Value, child: &serde_yaml::Value) -> serde_yaml::Value {
    match (parent, child) {
        (serde_yaml::Value::Mapping(pm), serde_yaml::Value::Mapping(cm)) => {
            let mut merged = pm.clone();
            for (key, child_val) in cm {
                let value = match pm.get(key) {
                    Some(parent_val) => deep_merge(parent_val, child_val),
                    None => child_val.clone(),
                };
                merged.insert(key.clone(), value);
            }
            serde_yaml::Value::Mapping(merged)
        }
        (_, child) => child.clone(),
    }
}

/// Resolve `extends` chains: every document with `metadata.extends` is
/// deep-merged over its (recursively resolved) parent.
pub fn resolve_extends(
    raw_values: &HashMap<String, serde_yaml::Value>,
) -> std::result::Result<HashMap<String, serde_yaml::Value>, String> {
    let mut resolved = HashMap::new();
    let mut in_progress = HashSet::new();

    for id in raw_values.keys() {
        resolve_single(id, raw_values, &mut resolved, &mut in_progress, 0)?;
    }

    Ok(resolved)
}

fn resolve_single(
    id: &str,
    raw_values: &HashMap<String, serde_yaml::Value>,
    resolved: &mut HashMap<String, serde_yaml::Value>,
    in_progress: &mut HashSet<String>,
    depth: usize,
) -> std::result::Result<serde_yaml::Value, String> {
    if let Some(val) = resolved.get(id) {
        return Ok(val.clone());
    }
    if in_progress.contains(id) {
        return Err(format!("circular extends chain detected for rule '{}'", id));
    }
    if depth > MAX_EXTENDS_DEPTH {
        return Err(format!(
            "extends chain exceeds maximum depth ({}) for rule '{}'",
            MAX_EXTENDS_DEPTH, id
        ));
    }

    let raw = raw_values
        .get(id)
        .ok_or_else(|| format!("rule '{}' not found for extends resolution", id))?
        .clone();

    let result = match metadata_str(&raw, "extends") {
        Some(parent_id) => {
            in_progress.insert(id.to_string());
            let parent_val = resolve_single(&parent_id, raw_values, resolved, in_progress, depth + 1)?;
            in_progress.remove(id);
            deep_merge(&parent_val, &raw)
        }
        None => raw,
    };

    resolved.insert(id.to_string(), result.clone());
    Ok(result)
}

fn metadata_str(value: &serde_yaml::Value, key: &str) -> Option<String> {
    value
        .get("metadata")
        .and_then(|meta| meta.get(key))
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

// ── Error type ──────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("unknown rule kind: {0}")]
    UnknownKind(String),

    /// `extends` chain is circular, too deep or names a missing parent.
    #[error("extends resolution failed: {0}")]
    Extends(String),

    /// Document failed validation, or the set of documents is ambiguous.
    #[error("invalid rule: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, RuleError>;

// ── Load result types ───────────────────────────────────────────────

/// Outcome of loading a single rule file.
#[derive(Debug)]
pub struct LoadResult {
    pub path: PathBuf,
    pub status: LoadStatus,
}

#[derive(Debug)]
pub enum LoadStatus {
    Loaded { rule_id: String, kind: RuleKind },
    /// Dotfile, non-YAML file, or disabled document.
    Skipped { reason: String },
    /// Parse, dispatch or validation error.
    Failed { error: String },
}

// ── Rule loader ─────────────────────────────────────────────────────

/// Filesystem-backed rule loader.
///
/// Holds the documents of the last [`load_all`](Self::load_all) keyed by
/// `metadata.id`.
pub struct RuleLoader {
    rules_dir: PathBuf,
    documents: HashMap<String, RuleDocument>,
}

impl RuleLoader {
    pub fn new(rules_dir: impl Into<PathBuf>) -> Self {
        Self {
            rules_dir: rules_dir.into(),
            documents: HashMap::new(),
        }
    }

    pub fn rules_dir(&self) -> &Path {
        &self.rules_dir
    }

    /// Scan the rules directory and load every YAML document.
    ///
    /// Per-file parse and validation errors are reported in the results and
    /// do not abort the scan. A broken `extends` chain does.
    pub fn load_all(&mut self) -> Result<Vec<LoadResult>> {
        let mut results = Vec::new();
        let mut files = Vec::new();
        collect_files(&self.rules_dir, &mut files, &mut results)?;
        files.sort();

        // Pass 1: raw YAML values keyed by id.
        let mut raw_values = HashMap::new();
        let mut paths: HashMap<String, PathBuf> = HashMap::new();
        for path in files {
            match read_raw(&path) {
                Ok((id, value)) => {
                    if let Some(previous) = paths.get(&id) {
                        let error = format!(
                            "duplicate rule id '{}' (already defined in {})",
                            id,
                            previous.display()
                        );
                        warn!(path = %path.display(), %error, "failed to load rule file");
                        results.push(LoadResult { path, status: LoadStatus::Failed { error } });
                        continue;
                    }
                    raw_values.insert(id.clone(), value);
                    paths.insert(id, path);
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to load rule file");
                    results.push(LoadResult {
                        path,
                        status: LoadStatus::Failed { error: e.to_string() },
                    });
                }
            }
        }

        let resolved = resolve_extends(&raw_values).map_err(RuleError::Extends)?;

        // Pass 2: dispatch to concrete kinds and validate.
        let mut ids: Vec<&String> = resolved.keys().collect();
        ids.sort();
        self.documents.clear();
        for id in ids {
            let path = paths.get(id).cloned().unwrap_or_default();
            match parse_document(&resolved[id]) {
                Ok(doc) if !doc.metadata().enabled => {
                    debug!(rule_id = %id, "rule disabled, skipping");
                    self.documents.insert(id.clone(), doc);
                    results.push(LoadResult {
                        path,
                        status: LoadStatus::Skipped { reason: "disabled".to_string() },
                    });
                }
                Ok(doc) => {
                    let kind = doc.kind();
                    info!(rule_id = %id, %kind, path = %path.display(), "loaded rule");
                    self.documents.insert(id.clone(), doc);
                    results.push(LoadResult {
                        path,
                        status: LoadStatus::Loaded { rule_id: id.clone(), kind },
                    });
                }
                Err(e) => {
                    warn!(rule_id = %id, path = %path.display(), error = %e, "rejected rule");
                    results.push(LoadResult {
                        path,
                        status: LoadStatus::Failed { error: e.to_string() },
                    });
                }
            }
        }

        Ok(results)
    }

    /// Parse and validate a single standalone file (no `extends` resolution).
    pub fn load_file(&self, path: &Path) -> Result<RuleDocument> {
        let (_, value) = read_raw(path)?;
        parse_document(&value)
    }

    pub fn documents(&self) -> &HashMap<String, RuleDocument> {
        &self.documents
    }
}

fn collect_files(dir: &Path, files: &mut Vec<PathBuf>, results: &mut Vec<LoadResult>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();

        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            if name.starts_with('.') {
                results.push(LoadResult {
                    path,
                    status: LoadStatus::Skipped { reason: "dotfile".to_string() },
                });
                continue;
            }
        }

        if path.is_dir() {
            collect_files(&path, files, results)?;
            continue;
        }

        let is_yaml = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e == "yml" || e == "yaml")
            .unwrap_or(false);

        if is_yaml {
            files.push(path);
        } else {
            results.push(LoadResult {
                path,
                status: LoadStatus::Skipped { reason: "not a YAML file".to_string() },
            });
        }
    }
    Ok(())
}

fn read_raw(path: &Path) -> Result<(String, serde_yaml::Value)> {
    let contents = fs::read_to_string(path)?;
    let value: serde_yaml::Value = serde_yaml::from_str(&contents)?;
    match metadata_str(&value, "id") {
        Some(id) if !id.is_empty() => Ok((id, value)),
        _ => Err(RuleError::Invalid(
            "rule metadata.id must be a non-empty string".to_string(),
        )),
    }
}

fn parse_document(value: &serde_yaml::Value) -> Result<RuleDocument> {
    let envelope: RuleEnvelope = serde_yaml::from_value(value.clone())?;
    let kind = envelope.rule_kind().map_err(RuleError::UnknownKind)?;
    let doc = RuleDocument::from_yaml_kind(kind, &serde_yaml::to_string(value)?)
        .map_err(RuleError::Invalid)?;
    let validation = validate_document(&doc);
    for w in &validation.warnings {
        warn!(rule_id = %doc.metadata().id, path = %w.path, "{}", w.message);
    }
    if !validation.valid {
        return Err(RuleError::Invalid(validation.summary()));
    }
    Ok(doc)
}

// ── Active rule set ─────────────────────────────────────────────────

/// The compiled configuration the pipeline runs with, one per kind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TriageRules {
    pub features: CompiledFeatureConfig,
    pub detection: CompiledDetectionConfig,
    pub scoring: CompiledScoringConfig,
}

impl TriageRules {
    /// Load the rules directory and select the active documents.
    ///
    /// A missing directory yields the built-in defaults. Any file that fails
    /// to parse or validate aborts the load.
    pub fn load(rules_dir: &Path) -> Result<Self> {
        if !rules_dir.exists() {
            warn!(path = %rules_dir.display(), "rules directory not found, using built-in defaults");
            return Ok(Self::default());
        }
        let mut loader = RuleLoader::new(rules_dir);
        let results = loader.load_all()?;
        let failed: Vec<String> = results
            .iter()
            .filter_map(|r| match &r.status {
                LoadStatus::Failed { error } => Some(format!("{}: {}", r.path.display(), error)),
                _ => None,
            })
            .collect();
        if !failed.is_empty() {
            return Err(RuleError::Invalid(format!(
                "{} rule file(s) failed to load: {}",
                failed.len(),
                failed.join("; ")
            )));
        }
        Self::from_documents(loader.documents().values())
    }

    /// Select one enabled document per kind.
    ///
    /// Documents that another document `extends` are bases and never
    /// selected. More than one remaining candidate of a kind is an error.
    pub fn from_documents<'a>(docs: impl IntoIterator<Item = &'a RuleDocument>) -> Result<Self> {
        let docs: Vec<&RuleDocument> = docs.into_iter().collect();
        let bases: HashSet<&str> = docs
            .iter()
            .filter_map(|d| d.metadata().extends.as_deref())
            .collect();

        let mut features: Option<&FeatureConfigRule> = None;
        let mut detection: Option<&DetectionConfigRule> = None;
        let mut scoring: Option<&ScoringConfigRule> = None;

        for doc in docs {
            let meta = doc.metadata();
            if !meta.enabled || bases.contains(meta.id.as_str()) {
                continue;
            }
            match doc {
                RuleDocument::FeatureConfig(r) => select(&mut features, r)?,
                RuleDocument::DetectionConfig(r) => select(&mut detection, r)?,
                RuleDocument::ScoringConfig(r) => select(&mut scoring, r)?,
            }
        }

        Ok(Self {
            features: active_or_default(features, RuleKind::FeatureConfig, FeatureConfigRule::compile),
            detection: active_or_default(detection, RuleKind::DetectionConfig, DetectionConfigRule::compile),
            scoring: active_or_default(scoring, RuleKind::ScoringConfig, ScoringConfigRule::compile),
        })
    }
}

trait HasId {
    fn id(&self) -> &str;
}

impl HasId for FeatureConfigRule {
    fn id(&self) -> &str {
        &self.metadata.id
    }
}

impl HasId for DetectionConfigRule {
    fn id(&self) -> &str {
        &self.metadata.id
    }
}

impl HasId for ScoringConfigRule {
    fn id(&self) -> &str {
        &self.metadata.id
    }
}

fn select<'a, T: HasId>(slot: &mut Option<&'a T>, rule: &'a T) -> Result<()> {
    if let Some(existing) = slot {
        let mut pair = [existing.id(), rule.id()];
        pair.sort_unstable();
        return Err(RuleError::Invalid(format!(
            "more than one active document of the same kind: '{}' and '{}'",
            pair[0], pair[1]
        )));
    }
    *slot = Some(rule);
    Ok(())
}

fn active_or_default<T, C: Default>(rule: Option<&T>, kind: RuleKind, compile: fn(&T) -> C) -> C {
    match rule {
        Some(r) => compile(r),
        None => {
            warn!(%kind, "no active document, using built-in defaults");
            C::default()
        }
    }
}
