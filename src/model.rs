use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where the emulator reads hex protocol requests from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum InputKind {
    File,
    Serial,
}

/// Where the emulator writes protocol messages to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum OutputKind {
    File,
    Standard,
    Serial,
}

/// Determines when the emulation process terminates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum StopCondition {
    /// Terminate after all text field values have finished generating
    Text,
    /// Terminate after all hex field values have finished generating
    Hex,
    /// Terminate after all text and all hex values have finished generating
    TextHex,
    /// Never terminate; useful to keep answering hex protocol requests
    None,
}

impl StopCondition {
    /// Whether exhausted hex scenarios are required to stop.
    pub fn waits_for_hex(self) -> bool {
        matches!(self, StopCondition::Hex | StopCondition::TextHex)
    }

    /// Evaluate the condition against the current scenario progress.
    pub fn is_met(self, text_done: bool, hex_done: bool) -> bool {
        match self {
            StopCondition::Text => text_done,
            StopCondition::Hex => hex_done,
            StopCondition::TextHex => text_done && hex_done,
            StopCondition::None => false,
        }
    }
}

/// Options for a single `emulate` invocation, already validated by the parser.
#[derive(Debug, Clone, PartialEq)]
pub struct LaunchOptions {
    pub config_path: PathBuf,
    pub input_locator: Option<String>,
    pub input_kind: InputKind,
    pub output_locator: Option<String>,
    pub output_kind: OutputKind,
    /// Seconds between text protocol messages
    pub message_delay: f64,
    pub stop_condition: StopCondition,
    pub bit_error_rate: f64,
    pub timed: bool,
}
