//! Emulator configuration, assembled step by step by the launch orchestrator.

use crate::engine::scenario::{Scenario, ScenarioError};
use crate::model::StopCondition;
use crate::transport::{Input, Output};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

const DEFAULT_INTERVAL_SECS: f64 = 1.0;

#[derive(Debug, Error)]
pub enum ConfigFileError {
    #[error("failed to read config file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Protocol a field belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Text,
    Hex,
}

/// How the values of one field are produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ScenarioSpec {
    Sequence {
        values: Vec<serde_yaml::Value>,
    },
    Constant {
        value: serde_yaml::Value,
        #[serde(default = "default_count")]
        count: u32,
    },
    Range {
        start: i64,
        end: i64,
        #[serde(default = "default_step")]
        step: i64,
    },
}

fn default_count() -> u32 {
    1
}

fn default_step() -> i64 {
    1
}

fn default_interval() -> f64 {
    DEFAULT_INTERVAL_SECS
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Text protocol label, or hex register for hex fields
    pub label: String,
    pub protocol: Protocol,
    /// Seconds between generated values in timed mode
    #[serde(default = "default_interval")]
    pub interval: f64,
    pub scenario: ScenarioSpec,
}

/// Parsed contents of the emulator config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
}

impl ConfigFile {
    pub fn load(path: &Path) -> Result<Self, ConfigFileError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigFileError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&content).map_err(|source| ConfigFileError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Snapshot of the configuration, logged for diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigFields {
    pub config_file: Option<PathBuf>,
    pub input: Option<String>,
    pub output: Option<String>,
    pub delay_secs: f64,
    pub stop_condition: StopCondition,
    pub bit_error_rate: f64,
    pub timed: bool,
    pub fields: Vec<FieldSpec>,
}

#[derive(Debug, Clone)]
pub struct EmulatorConfig {
    config_path: Option<PathBuf>,
    file: Option<ConfigFile>,
    input: Option<Input>,
    output: Option<Output>,
    delay: Duration,
    stop_condition: StopCondition,
    bit_error_rate: f64,
    timed: bool,
    scenarios: Vec<Scenario>,
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            config_path: None,
            file: None,
            input: None,
            output: None,
            delay: Duration::from_secs(1),
            stop_condition: StopCondition::Text,
            bit_error_rate: 0.0,
            timed: false,
            scenarios: Vec::new(),
        }
    }
}

impl EmulatorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the config file. Must run before [`EmulatorConfig::create_scenarios`].
    pub fn set_config_file(&mut self, path: impl AsRef<Path>) -> Result<(), ConfigFileError> {
        let path = path.as_ref();
        self.file = Some(ConfigFile::load(path)?);
        self.config_path = Some(path.to_path_buf());
        Ok(())
    }

    pub fn set_input(&mut self, input: Input) {
        self.input = Some(input);
    }

    pub fn set_output(&mut self, output: Output) {
        self.output = Some(output);
    }

    pub fn set_delay(&mut self, delay: Duration) {
        self.delay = delay;
    }

    pub fn set_stop_condition(&mut self, stop_condition: StopCondition) {
        self.stop_condition = stop_condition;
    }

    pub fn set_bit_error_rate(&mut self, rate: f64) {
        self.bit_error_rate = rate;
    }

    pub fn set_timed(&mut self, timed: bool) {
        self.timed = timed;
    }

    /// Build one scenario per configured field.
    pub fn create_scenarios(&mut self) -> Result<(), ScenarioError> {
        let file = self.file.as_ref().ok_or(ScenarioError::NoConfigFile)?;
        let mut seen = HashSet::new();
        let mut scenarios = Vec::with_capacity(file.fields.len());
        for field in &file.fields {
            if !seen.insert((field.protocol, field.label.as_str())) {
                return Err(ScenarioError::DuplicateLabel(field.label.clone()));
            }
            scenarios.push(Scenario::from_spec(field)?);
        }
        self.scenarios = scenarios;
        Ok(())
    }

    pub fn fields(&self) -> ConfigFields {
        ConfigFields {
            config_file: self.config_path.clone(),
            input: self.input.as_ref().map(ToString::to_string),
            output: self.output.as_ref().map(ToString::to_string),
            delay_secs: self.delay.as_secs_f64(),
            stop_condition: self.stop_condition,
            bit_error_rate: self.bit_error_rate,
            timed: self.timed,
            fields: self
                .file
                .as_ref()
                .map(|f| f.fields.clone())
                .unwrap_or_default(),
        }
    }

    pub fn input(&self) -> Option<&Input> {
        self.input.as_ref()
    }

    pub fn output(&self) -> Option<&Output> {
        self.output.as_ref()
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn stop_condition(&self) -> StopCondition {
        self.stop_condition
    }

    pub fn bit_error_rate(&self) -> f64 {
        self.bit_error_rate
    }

    pub fn timed(&self) -> bool {
        self.timed
    }

    pub fn scenarios(&self) -> &[Scenario] {
        &self.scenarios
    }

    pub fn into_scenarios(self) -> Vec<Scenario> {
        self.scenarios
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    const TWO_FIELDS: &str = r#"
fields:
  - label: V
    protocol: text
    scenario:
      kind: sequence
      values: [12800, "12850"]
  - label: "0100"
    protocol: hex
    interval: 0.5
    scenario:
      kind: range
      start: 1
      end: 3
"#;

    #[test]
    fn parses_fields_with_defaults() {
        let file = write_config(TWO_FIELDS);
        let parsed = ConfigFile::load(file.path()).unwrap();
        assert_eq!(parsed.fields.len(), 2);
        assert_eq!(parsed.fields[0].interval, DEFAULT_INTERVAL_SECS);
        assert_eq!(parsed.fields[1].protocol, Protocol::Hex);
        assert_eq!(
            parsed.fields[1].scenario,
            ScenarioSpec::Range {
                start: 1,
                end: 3,
                step: 1
            }
        );
    }

    #[test]
    fn malformed_yaml_is_a_parse_error() {
        let file = write_config("fields: [label: {");
        let err = EmulatorConfig::new()
            .set_config_file(file.path())
            .unwrap_err();
        assert!(matches!(err, ConfigFileError::Parse { .. }));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = EmulatorConfig::new()
            .set_config_file(dir.path().join("nope.yaml"))
            .unwrap_err();
        assert!(matches!(err, ConfigFileError::Read { .. }));
    }

    #[test]
    fn scenarios_require_a_config_file() {
        let err = EmulatorConfig::new().create_scenarios().unwrap_err();
        assert!(matches!(err, ScenarioError::NoConfigFile));
    }

    #[test]
    fn creates_one_scenario_per_field() {
        let file = write_config(TWO_FIELDS);
        let mut config = EmulatorConfig::new();
        config.set_config_file(file.path()).unwrap();
        config.create_scenarios().unwrap();
        let labels: Vec<_> = config.scenarios().iter().map(|s| s.label()).collect();
        assert_eq!(labels, ["V", "0100"]);
    }

    #[test]
    fn duplicate_labels_are_rejected() {
        let file = write_config(
            r#"
fields:
  - { label: V, protocol: text, scenario: { kind: constant, value: 1 } }
  - { label: V, protocol: text, scenario: { kind: constant, value: 2 } }
"#,
        );
        let mut config = EmulatorConfig::new();
        config.set_config_file(file.path()).unwrap();
        let err = config.create_scenarios().unwrap_err();
        assert!(matches!(err, ScenarioError::DuplicateLabel(label) if label == "V"));
    }

    #[test]
    fn field_snapshot_reflects_setters() {
        let mut config = EmulatorConfig::new();
        config.set_output(Output::Standard);
        config.set_delay(Duration::from_millis(250));
        config.set_stop_condition(StopCondition::TextHex);
        config.set_bit_error_rate(0.5);
        config.set_timed(true);

        let fields = config.fields();
        assert_eq!(fields.output.as_deref(), Some("standard output"));
        assert_eq!(fields.input, None);
        assert_eq!(fields.delay_secs, 0.25);
        assert_eq!(fields.stop_condition, StopCondition::TextHex);
        assert_eq!(fields.bit_error_rate, 0.5);
        assert!(fields.timed);
        assert_eq!(config.delay(), Duration::from_millis(250));
    }
}
