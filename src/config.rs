use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;

use crate::driver::TextEncoding;
use crate::error::HarnessError;
use crate::executor::ExecutableSpec;
use crate::generator::ShapePolicy;

/// Largest accepted `generator.max_dim`. One complex operand at this size is
/// already ~12 MB of wire text.
pub const MAX_DIM_LIMIT: usize = 1000;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    #[serde(default)]
    pub harness: HarnessConfig,
}

/// Everything one comparison session needs, passed down explicitly.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct HarnessConfig {
    pub generator: GeneratorConfig,
    pub reference: ExecutableSpec,
    pub candidate: ExecutableSpec,
    pub encoding: TextEncoding,
    /// Per-executable wall-clock bound for one round
    pub round_timeout_ms: u64,
    /// `None` runs until a finding or Ctrl-C
    pub max_rounds: Option<u64>,
    /// `None` seeds the session from OS entropy
    pub seed: Option<u64>,
    /// Emit an info summary every N rounds (0 disables)
    pub progress_log_interval: u64,
    /// When set, findings are also written to disk under this directory
    pub artifact_dir: Option<String>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            generator: GeneratorConfig::default(),
            reference: ExecutableSpec::new("GenericMatrixDriver"),
            candidate: ExecutableSpec::new("test.out"),
            encoding: TextEncoding::Ascii,
            round_timeout_ms: 10_000,
            max_rounds: None,
            seed: None,
            progress_log_interval: 1000,
            artifact_dir: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct GeneratorConfig {
    pub max_dim: usize,
    pub min_value: i64,
    pub max_value: i64,
    pub shape_policy: ShapePolicy,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            max_dim: 10,
            min_value: -10,
            max_value: 10,
            shape_policy: ShapePolicy::Independent,
        }
    }
}

impl HarnessConfig {
    pub fn round_timeout(&self) -> Duration {
        Duration::from_millis(self.round_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), HarnessError> {
        let g = &self.generator;
        if g.max_dim == 0 {
            return Err(HarnessError::Config("generator.max_dim must be >= 1".into()));
        }
        if g.max_dim > MAX_DIM_LIMIT {
            return Err(HarnessError::Config(format!(
                "generator.max_dim ({}) exceeds the limit of {}",
                g.max_dim, MAX_DIM_LIMIT
            )));
        }
        if g.min_value > g.max_value {
            return Err(HarnessError::Config(format!(
                "generator.min_value ({}) exceeds generator.max_value ({})",
                g.min_value, g.max_value
            )));
        }
        if self.round_timeout_ms == 0 {
            return Err(HarnessError::Config("round_timeout_ms must be > 0".into()));
        }
        for (name, spec) in [("reference", &self.reference), ("candidate", &self.candidate)] {
            if spec.program.trim().is_empty() {
                return Err(HarnessError::Config(format!("{name}.program is empty")));
            }
        }
        Ok(())
    }
}

/// Where the config came from on the command line. Replay hints repeat it so
/// `generate` reads the same generator settings as the session did.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConfigSource {
    /// `config/dev.yaml`, selected by default
    #[default]
    DefaultEnv,
    Env(String),
    File(String),
}

impl ConfigSource {
    pub const DEFAULT_ENV: &'static str = "dev";

    /// `--config` wins over `--env`, as in `AppConfig` loading.
    pub fn from_cli(env: &str, config: Option<&str>) -> Self {
        match config {
            Some(path) => Self::File(path.to_string()),
            None if env == Self::DEFAULT_ENV => Self::DefaultEnv,
            None => Self::Env(env.to_string()),
        }
    }

    pub fn load(&self) -> Result<AppConfig, HarnessError> {
        match self {
            Self::DefaultEnv => AppConfig::load(Self::DEFAULT_ENV),
            Self::Env(env) => AppConfig::load(env),
            Self::File(path) => AppConfig::from_file(path),
        }
    }

    /// Command-line arguments that select this source again.
    pub fn cli_args(&self) -> Vec<String> {
        match self {
            Self::DefaultEnv => Vec::new(),
            Self::Env(env) => vec!["--env".into(), env.clone()],
            Self::File(path) => vec!["--config".into(), path.clone()],
        }
    }
}

impl AppConfig {
    pub fn load(env: &str) -> Result<Self, HarnessError> {
        Self::from_file(&format!("config/{}.yaml", env))
    }

    pub fn from_file(path: &str) -> Result<Self, HarnessError> {
        let content = fs::read_to_string(path)
            .map_err(|e| HarnessError::Config(format!("Failed to read {}: {}", path, e)))?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, HarnessError> {
        let config: AppConfig =
            serde_yaml::from_str(content).map_err(|e| HarnessError::Config(e.to_string()))?;
        config.harness.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_config_deserialize() {
        let yaml = r#"
log_level: "info"
log_dir: "./logs"
log_file: "matrix_diff.log"
use_json: false
rotation: "daily"
harness:
  generator:
    max_dim: 4
    min_value: -3
    max_value: 3
    shape_policy: compatible
  reference:
    program: "./school"
  candidate:
    program: "sh"
    args: ["-c", "cat"]
  round_timeout_ms: 2500
  max_rounds: 50
  seed: 7
"#;

        let config = AppConfig::from_yaml(yaml).unwrap();

        assert_eq!(config.rotation, "daily");
        let h = &config.harness;
        assert_eq!(h.generator.max_dim, 4);
        assert_eq!(h.generator.shape_policy, ShapePolicy::Compatible);
        assert_eq!(h.reference.program, "./school");
        assert!(h.reference.args.is_empty());
        assert_eq!(h.candidate.args, vec!["-c", "cat"]);
        assert_eq!(h.round_timeout(), Duration::from_millis(2500));
        assert_eq!(h.max_rounds, Some(50));
        assert_eq!(h.seed, Some(7));
        // unspecified fields fall back to defaults
        assert_eq!(h.encoding, TextEncoding::Ascii);
        assert_eq!(h.progress_log_interval, 1000);
    }

    #[test]
    fn test_harness_defaults() {
        let h = HarnessConfig::default();
        assert_eq!(h.generator.max_dim, 10);
        assert_eq!((h.generator.min_value, h.generator.max_value), (-10, 10));
        assert_eq!(h.generator.shape_policy, ShapePolicy::Independent);
        assert_eq!(h.reference.program, "GenericMatrixDriver");
        assert_eq!(h.candidate.program, "test.out");
        assert!(h.max_rounds.is_none());
        assert!(h.seed.is_none());
        assert!(h.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_ranges() {
        let mut h = HarnessConfig::default();
        h.generator.min_value = 5;
        h.generator.max_value = -5;
        assert!(matches!(h.validate(), Err(HarnessError::Config(_))));

        let mut h = HarnessConfig::default();
        h.generator.max_dim = 0;
        assert!(h.validate().is_err());

        let mut h = HarnessConfig::default();
        h.generator.max_dim = MAX_DIM_LIMIT;
        assert!(h.validate().is_ok());
        h.generator.max_dim = MAX_DIM_LIMIT + 1;
        assert!(matches!(h.validate(), Err(HarnessError::Config(_))));
        h.generator.max_dim = usize::MAX;
        assert!(h.validate().is_err());

        let mut h = HarnessConfig::default();
        h.round_timeout_ms = 0;
        assert!(h.validate().is_err());

        let mut h = HarnessConfig::default();
        h.candidate.program = "  ".into();
        assert!(h.validate().is_err());
    }

    #[test]
    fn test_yaml_with_oversized_max_dim_is_rejected() {
        let yaml = r#"
log_level: "info"
log_dir: "./logs"
log_file: "matrix_diff.log"
use_json: false
rotation: "never"
harness:
  generator:
    max_dim: 18446744073709551615
"#;
        assert!(matches!(AppConfig::from_yaml(yaml), Err(HarnessError::Config(_))));
    }

    #[test]
    fn test_config_source_from_cli() {
        assert_eq!(ConfigSource::from_cli("dev", None), ConfigSource::DefaultEnv);
        assert!(ConfigSource::DefaultEnv.cli_args().is_empty());

        let env = ConfigSource::from_cli("ci", None);
        assert_eq!(env.cli_args(), vec!["--env", "ci"]);

        let file = ConfigSource::from_cli("ci", Some("run.yaml"));
        assert_eq!(file, ConfigSource::File("run.yaml".into()));
        assert_eq!(file.cli_args(), vec!["--config", "run.yaml"]);
    }
}
