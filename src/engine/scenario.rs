use crate::engine::config::{FieldSpec, Protocol, ScenarioSpec};
use std::time::Duration;
use thiserror::Error;

/// Upper bound on values materialised for a single field.
const MAX_SCENARIO_VALUES: usize = 1_000_000;

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("scenarios can only be created after a config file has been parsed")]
    NoConfigFile,
    #[error("field `{0}` is defined more than once")]
    DuplicateLabel(String),
    #[error("field `{label}` has no values")]
    Empty { label: String },
    #[error("field `{label}` contains a value that is not a scalar")]
    NonScalarValue { label: String },
    #[error("field `{label}` has a range step of zero")]
    ZeroStep { label: String },
    #[error("field `{label}` range {start}..={end} never reaches its end with step {step}")]
    UnreachableEnd {
        label: String,
        start: i64,
        end: i64,
        step: i64,
    },
    #[error("field `{label}` would generate more than {MAX_SCENARIO_VALUES} values")]
    TooManyValues { label: String },
    #[error("field `{label}` has an invalid interval of {interval} seconds")]
    InvalidInterval { label: String, interval: f64 },
}

/// Value stream of a single protocol field.
///
/// Once every value has been handed out the scenario is exhausted and keeps
/// reporting its last value.
#[derive(Debug, Clone, PartialEq)]
pub struct Scenario {
    label: String,
    protocol: Protocol,
    interval: Duration,
    values: Vec<String>,
    cursor: usize,
}

impl Scenario {
    pub fn from_spec(field: &FieldSpec) -> Result<Self, ScenarioError> {
        let label = field.label.clone();
        let interval = Duration::try_from_secs_f64(field.interval)
            .ok()
            .filter(|d| !d.is_zero())
            .ok_or_else(|| ScenarioError::InvalidInterval {
                label: label.clone(),
                interval: field.interval,
            })?;

        let values = match &field.scenario {
            ScenarioSpec::Sequence { values } => values
                .iter()
                .map(|v| scalar_to_string(v, &label))
                .collect::<Result<Vec<_>, _>>()?,
            ScenarioSpec::Constant { value, count } => {
                let count = *count as usize;
                if count > MAX_SCENARIO_VALUES {
                    return Err(ScenarioError::TooManyValues { label });
                }
                vec![scalar_to_string(value, &label)?; count]
            }
            ScenarioSpec::Range { start, end, step } => {
                expand_range(&label, field.protocol, *start, *end, *step)?
            }
        };
        if values.is_empty() {
            return Err(ScenarioError::Empty { label });
        }

        Ok(Self {
            label,
            protocol: field.protocol,
            interval,
            values,
            cursor: 0,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// The most recently generated value, or the first one if none was generated yet.
    pub fn current(&self) -> &str {
        let idx = self.cursor.saturating_sub(1);
        &self.values[idx]
    }

    /// Generate the next value.
    pub fn next_value(&mut self) -> &str {
        if self.cursor < self.values.len() {
            self.cursor += 1;
        }
        self.current()
    }

    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.values.len()
    }
}

fn scalar_to_string(value: &serde_yaml::Value, label: &str) -> Result<String, ScenarioError> {
    match value {
        serde_yaml::Value::String(s) => Ok(s.clone()),
        serde_yaml::Value::Number(n) => Ok(n.to_string()),
        serde_yaml::Value::Bool(b) => Ok(if *b { "ON" } else { "OFF" }.to_string()),
        _ => Err(ScenarioError::NonScalarValue {
            label: label.to_string(),
        }),
    }
}

fn expand_range(
    label: &str,
    protocol: Protocol,
    start: i64,
    end: i64,
    step: i64,
) -> Result<Vec<String>, ScenarioError> {
    if step == 0 {
        return Err(ScenarioError::ZeroStep {
            label: label.to_string(),
        });
    }
    if (end > start && step < 0) || (end < start && step > 0) {
        return Err(ScenarioError::UnreachableEnd {
            label: label.to_string(),
            start,
            end,
            step,
        });
    }
    let steps = end.abs_diff(start) / step.unsigned_abs();
    if steps >= MAX_SCENARIO_VALUES as u64 {
        return Err(ScenarioError::TooManyValues {
            label: label.to_string(),
        });
    }
    let len = steps as usize + 1;

    Ok((0..len as i64)
        .map(|i| start + i * step)
        .map(|v| match protocol {
            Protocol::Text => v.to_string(),
            Protocol::Hex => format!("{:04X}", v),
        })
        .collect())
}
