// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Cognition Configuration Types
//
// Kubernetes-style manifest (apiVersion/kind/metadata/spec) configuring:
// - the plan/execute/critique loop bounds and agent strategy
// - policy guard reliability thresholds
// - scheduler admission caps
// - capability token lifetimes
// - per-provider LLM concurrency gates
// - logging

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::domain::agents::AgentStrategy;

pub const API_VERSION: &str = "100monkeys.ai/v1";
pub const KIND: &str = "CognitionConfig";
pub const CONFIG_PATH_ENV: &str = "AEGIS_COGNITION_CONFIG";

/// Top-level cognition configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CognitionConfigManifest {
    /// API version (must be "100monkeys.ai/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "CognitionConfig")
    pub kind: String,

    pub metadata: ManifestMetadata,

    #[serde(default)]
    pub spec: CognitionConfigSpec,
}

/// Manifest metadata (Kubernetes-style)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CognitionConfigSpec {
    #[serde(default, rename = "loop")]
    pub cognitive_loop: LoopConfig,

    #[serde(default)]
    pub policy: PolicyConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub tokens: TokenConfig,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopConfig {
    /// Only cooperative stop bound for a session
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Evidence cards requested per iteration before self-model scaling
    #[serde(default = "default_base_evidence_limit")]
    pub base_evidence_limit: usize,

    #[serde(default)]
    pub agent_strategy: AgentStrategy,

    /// Tool the heuristic planner routes evidence retrieval through
    #[serde(default = "default_evidence_tool")]
    pub evidence_tool: String,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            base_evidence_limit: default_base_evidence_limit(),
            agent_strategy: AgentStrategy::default(),
            evidence_tool: default_evidence_tool(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Tools below this 30-day success rate require justification
    #[serde(default = "default_reliability_threshold")]
    pub reliability_threshold: f64,

    /// Reliability is only trusted with at least this many samples
    #[serde(default = "default_min_reliability_samples")]
    pub min_reliability_samples: u32,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            reliability_threshold: default_reliability_threshold(),
            min_reliability_samples: default_min_reliability_samples(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_max_running_per_org")]
    pub max_running_per_org: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_running_per_org: default_max_running_per_org(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenConfig {
    #[serde(default = "default_token_ttl", with = "humantime_serde")]
    pub default_ttl: Duration,

    #[serde(default = "default_agent_ttl", with = "humantime_serde")]
    pub agent_ttl: Duration,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            default_ttl: default_token_ttl(),
            agent_ttl: default_agent_ttl(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmGateConfig {
    /// Provider name (e.g., "openai", "ollama-local")
    pub name: String,

    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    #[serde(default = "default_llm_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub gates: Vec<LlmGateConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            gates: Vec::new(),
            max_tokens: Some(2048),
            temperature: Some(0.2),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (e.g., "info", "debug", "trace")
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Output format ("json" or "compact")
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

// Default value functions
fn default_max_iterations() -> u32 {
    3
}

fn default_base_evidence_limit() -> usize {
    10
}

fn default_evidence_tool() -> String {
    "memory.search".to_string()
}

fn default_reliability_threshold() -> f64 {
    0.80
}

fn default_min_reliability_samples() -> u32 {
    3
}

fn default_max_running_per_org() -> usize {
    2
}

fn default_token_ttl() -> Duration {
    Duration::from_secs(3600)
}

fn default_agent_ttl() -> Duration {
    Duration::from_secs(300)
}

fn default_max_concurrency() -> usize {
    4
}

fn default_llm_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "compact".to_string()
}

impl Default for CognitionConfigManifest {
    fn default() -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: "aegis-cognition".to_string(),
                version: Some("1.0.0".to_string()),
                labels: None,
            },
            spec: CognitionConfigSpec::default(),
        }
    }
}

impl CognitionConfigManifest {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to YAML file
    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Parse configuration from YAML string
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Discover configuration file using precedence order
    /// 1. AEGIS_COGNITION_CONFIG environment variable
    /// 2. ./aegis-cognition.yaml (working directory)
    /// 3. ~/.aegis/cognition.yaml (user home)
    /// 4. /etc/aegis/cognition.yaml (system)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./aegis-cognition.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".aegis").join("cognition.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        let system_config = PathBuf::from("/etc/aegis/cognition.yaml");
        if system_config.exists() {
            return Some(system_config);
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(explicit_path: Option<PathBuf>) -> anyhow::Result<Self> {
        let mut config = if let Some(path) = explicit_path {
            // Explicit path must exist and parse
            tracing::info!("Loading cognition configuration from explicit path: {:?}", path);
            Self::from_yaml_file(&path).map_err(|e| {
                anyhow::anyhow!("Failed to load config at {:?}: {}", path, e)
            })?
        } else if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading cognition configuration from discovered path: {:?}", config_path);
            Self::from_yaml_file(config_path)?
        } else {
            tracing::warn!("No cognition configuration found in standard locations. Using defaults.");
            Self::default()
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup. Unparseable values are
    /// logged and ignored.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup("AEGIS_MAX_ITERATIONS") {
            match val.trim().parse::<u32>() {
                Ok(n) => {
                    tracing::info!("Environment override: AEGIS_MAX_ITERATIONS={}", n);
                    self.spec.cognitive_loop.max_iterations = n;
                }
                Err(_) => tracing::warn!(
                    "Invalid value for AEGIS_MAX_ITERATIONS: '{}'. Ignoring.",
                    val
                ),
            }
        }

        if let Some(val) = lookup("AEGIS_MAX_RUNNING_PER_ORG") {
            match val.trim().parse::<usize>() {
                Ok(n) => {
                    tracing::info!("Environment override: AEGIS_MAX_RUNNING_PER_ORG={}", n);
                    self.spec.scheduler.max_running_per_org = n;
                }
                Err(_) => tracing::warn!(
                    "Invalid value for AEGIS_MAX_RUNNING_PER_ORG: '{}'. Ignoring.",
                    val
                ),
            }
        }

        if let Some(val) = lookup("AEGIS_AGENT_STRATEGY") {
            match val.parse::<AgentStrategy>() {
                Ok(strategy) => {
                    tracing::info!("Environment override: AEGIS_AGENT_STRATEGY={:?}", strategy);
                    self.spec.cognitive_loop.agent_strategy = strategy;
                }
                Err(e) => tracing::warn!("{}. Ignoring AEGIS_AGENT_STRATEGY.", e),
            }
        }

        if let Some(val) = lookup("AEGIS_LOG_LEVEL") {
            if !val.trim().is_empty() {
                self.spec.observability.log_level = val.trim().to_string();
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!(
                "Invalid apiVersion: '{}'. Must be '{}'",
                self.api_version,
                API_VERSION
            );
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        let spec = &self.spec;
        if spec.cognitive_loop.max_iterations == 0 {
            anyhow::bail!("spec.loop.max_iterations must be at least 1");
        }

        if spec.cognitive_loop.evidence_tool.trim().is_empty() {
            anyhow::bail!("spec.loop.evidence_tool cannot be empty");
        }

        if spec.scheduler.max_running_per_org == 0 {
            anyhow::bail!("spec.scheduler.max_running_per_org must be at least 1");
        }

        if !(0.0..=1.0).contains(&spec.policy.reliability_threshold) {
            anyhow::bail!(
                "spec.policy.reliability_threshold must be within [0, 1], got {}",
                spec.policy.reliability_threshold
            );
        }

        if spec.tokens.default_ttl.is_zero() || spec.tokens.agent_ttl.is_zero() {
            anyhow::bail!("spec.tokens TTLs must be non-zero");
        }

        if let Some(temperature) = spec.llm.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                anyhow::bail!("spec.llm.temperature must be within [0, 2], got {}", temperature);
            }
        }

        let mut seen = HashSet::new();
        for gate in &spec.llm.gates {
            if gate.name.is_empty() {
                anyhow::bail!("LLM gate name cannot be empty");
            }
            if !seen.insert(gate.name.as_str()) {
                anyhow::bail!("Duplicate LLM gate: {}", gate.name);
            }
            if gate.max_concurrency == 0 {
                anyhow::bail!("LLM gate '{}' must allow at least one concurrent call", gate.name);
            }
            if gate.timeout.is_zero() {
                anyhow::bail!("LLM gate '{}' timeout must be non-zero", gate.name);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_manifest() {
        let manifest = CognitionConfigManifest::default();
        assert_eq!(manifest.api_version, API_VERSION);
        assert_eq!(manifest.kind, KIND);
        assert_eq!(manifest.spec.cognitive_loop.max_iterations, 3);
        assert_eq!(manifest.spec.cognitive_loop.base_evidence_limit, 10);
        assert_eq!(manifest.spec.scheduler.max_running_per_org, 2);
        assert_eq!(manifest.spec.tokens.agent_ttl, Duration::from_secs(300));
        assert!(manifest.validate().is_ok());
    }

    #[test]
    fn test_parse_yaml_with_humantime() {
        let yaml = r#"
apiVersion: 100monkeys.ai/v1
kind: CognitionConfig
metadata:
  name: prod-cognition
spec:
  loop:
    max_iterations: 5
    agent_strategy: llm
  policy:
    reliability_threshold: 0.9
  tokens:
    default_ttl: 30m
    agent_ttl: 90s
  llm:
    gates:
      - name: openai
        max_concurrency: 8
        timeout: 45s
"#;
        let manifest = CognitionConfigManifest::from_yaml_str(yaml).unwrap();
        assert!(manifest.validate().is_ok());
        let spec = &manifest.spec;
        assert_eq!(spec.cognitive_loop.max_iterations, 5);
        assert_eq!(spec.cognitive_loop.agent_strategy, AgentStrategy::Llm);
        assert_eq!(spec.cognitive_loop.evidence_tool, "memory.search");
        assert_eq!(spec.policy.min_reliability_samples, 3);
        assert_eq!(spec.tokens.default_ttl, Duration::from_secs(1800));
        assert_eq!(spec.tokens.agent_ttl, Duration::from_secs(90));
        assert_eq!(spec.llm.gates[0].max_concurrency, 8);
        assert_eq!(spec.llm.gates[0].timeout, Duration::from_secs(45));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "apiVersion: 100monkeys.ai/v1\nkind: CognitionConfig\nmetadata:\n  name: file-config\nspec:\n  scheduler:\n    max_running_per_org: 7\n"
        )
        .unwrap();

        let manifest = CognitionConfigManifest::from_yaml_file(file.path()).unwrap();
        assert_eq!(manifest.metadata.name, "file-config");
        assert_eq!(manifest.spec.scheduler.max_running_per_org, 7);
    }

    #[test]
    fn test_explicit_missing_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.yaml");
        assert!(CognitionConfigManifest::load_or_default(Some(missing)).is_err());
    }

    #[test]
    fn test_yaml_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cognition.yaml");
        let mut manifest = CognitionConfigManifest::default();
        manifest.spec.llm.gates.push(LlmGateConfig {
            name: "ollama".into(),
            max_concurrency: 2,
            timeout: Duration::from_secs(10),
        });
        manifest.to_yaml_file(&path).unwrap();

        let parsed = CognitionConfigManifest::from_yaml_file(&path).unwrap();
        assert_eq!(parsed.spec.llm.gates.len(), 1);
        assert_eq!(parsed.spec.llm.gates[0].timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_overrides() {
        let mut manifest = CognitionConfigManifest::default();
        let env: HashMap<&str, &str> = HashMap::from([
            ("AEGIS_MAX_ITERATIONS", "6"),
            ("AEGIS_MAX_RUNNING_PER_ORG", "not-a-number"),
            ("AEGIS_AGENT_STRATEGY", "llm"),
            ("AEGIS_LOG_LEVEL", "debug"),
        ]);
        manifest.apply_overrides_from(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(manifest.spec.cognitive_loop.max_iterations, 6);
        assert_eq!(manifest.spec.scheduler.max_running_per_org, 2);
        assert_eq!(manifest.spec.cognitive_loop.agent_strategy, AgentStrategy::Llm);
        assert_eq!(manifest.spec.observability.log_level, "debug");
    }

    #[test]
    fn test_validation() {
        let mut manifest = CognitionConfigManifest::default();

        manifest.kind = "NodeConfig".to_string();
        assert!(manifest.validate().is_err());
        manifest.kind = KIND.to_string();

        manifest.spec.cognitive_loop.max_iterations = 0;
        assert!(manifest.validate().is_err());
        manifest.spec.cognitive_loop.max_iterations = 3;

        manifest.spec.scheduler.max_running_per_org = 0;
        assert!(manifest.validate().is_err());
        manifest.spec.scheduler.max_running_per_org = 1;

        manifest.spec.policy.reliability_threshold = 1.5;
        assert!(manifest.validate().is_err());
        manifest.spec.policy.reliability_threshold = 0.8;

        manifest.spec.tokens.agent_ttl = Duration::ZERO;
        assert!(manifest.validate().is_err());
        manifest.spec.tokens.agent_ttl = Duration::from_secs(60);

        let gate = LlmGateConfig {
            name: "openai".into(),
            max_concurrency: 1,
            timeout: Duration::from_secs(5),
        };
        manifest.spec.llm.gates = vec![gate.clone(), gate];
        assert!(manifest.validate().is_err());

        manifest.spec.llm.gates.truncate(1);
        manifest.spec.llm.gates[0].max_concurrency = 0;
        assert!(manifest.validate().is_err());

        manifest.spec.llm.gates[0].max_concurrency = 1;
        assert!(manifest.validate().is_ok());
    }
}
